use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Guide, APP_ID, DEMO_EMAIL, DEMO_PASSWORD};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn error_message(response: axum::response::Response) -> String {
    let body: Value = body_json(response).await;
    body["errors"][0]["message"].as_str().unwrap().to_string()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn json_request(uri: &str, headers: &[(&str, &str)], body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(body.to_string()).unwrap()
}

fn credentials() -> String {
    format!(r#"{{"email":"{DEMO_EMAIL}","password":"{DEMO_PASSWORD}"}}"#)
}

// --- categories ---

#[tokio::test]
async fn categories_hierarchy_skips_stubs() {
    let resp = app().oneshot(get_request("/api/2.0/categories")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let tree: Value = body_json(resp).await;
    assert!(tree["Mac"].get("Mac Laptop").is_some());
    assert!(tree.get("Unsorted").is_none());
}

#[tokio::test]
async fn categories_all_is_flat_and_includes_stubs() {
    let resp = app().oneshot(get_request("/api/2.0/categories/all")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let names: Vec<String> = body_json(resp).await;
    assert_eq!(names, vec!["Examples", "Mac", "Mac Laptop", "Unsorted"]);
}

#[tokio::test]
async fn category_detail_decodes_name() {
    let resp = app()
        .oneshot(get_request("/api/2.0/categories/Mac%20Laptop"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let category: Value = body_json(resp).await;
    assert_eq!(category["wiki_title"], "Mac Laptop");
    assert_eq!(category["parent"], "Mac");
    assert_eq!(category["guides"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_category_returns_404_with_errors() {
    let resp = app()
        .oneshot(get_request("/api/2.0/categories/Nope"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_message(resp).await, "Category 'Nope' not found");
}

// --- guides ---

#[tokio::test]
async fn list_guides_returns_summaries() {
    let resp = app().oneshot(get_request("/api/2.0/guides")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let guides: Vec<Value> = body_json(resp).await;
    assert_eq!(guides.len(), 2);
    assert_eq!(guides[0]["guideid"], 1);
}

#[tokio::test]
async fn get_guide_not_found() {
    let resp = app().oneshot(get_request("/api/2.0/guides/99")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_message(resp).await, "Guide 99 not found");
}

#[tokio::test]
async fn get_guide_bad_id_returns_400() {
    let resp = app().oneshot(get_request("/api/2.0/guides/abc")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_guide_requires_token() {
    let resp = app()
        .oneshot(json_request(
            "/api/2.0/guides",
            &[("X-App-Id", APP_ID)],
            r#"{"category":"Examples","type":"repair"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(resp).await, "Authentication required");
}

// --- work log ---

#[tokio::test]
async fn work_log_list_and_detail() {
    let resp = app().oneshot(get_request("/api/2.0/work_log")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let entries: Vec<Value> = body_json(resp).await;
    assert_eq!(entries.len(), 1);

    let resp = app().oneshot(get_request("/api/2.0/work_log/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let entry: Value = body_json(resp).await;
    assert_eq!(entry["action"], "edit");

    let resp = app().oneshot(get_request("/api/2.0/work_log/7")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- search ---

#[tokio::test]
async fn search_matches_titles_case_insensitively() {
    let resp = app()
        .oneshot(get_request("/api/2.0/search/battery"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["totalResults"], 1);
    assert_eq!(body["results"][0]["guideid"], 1);
    assert_eq!(body["results"][0]["dataType"], "guide");
}

#[tokio::test]
async fn search_honours_filter_offset_and_limit() {
    let resp = app()
        .oneshot(get_request("/api/2.0/search/mac?filter=category&offset=1&limit=1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["totalResults"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["title"], "Mac Laptop");
    assert_eq!(body["moreResults"], false);
}

#[tokio::test]
async fn search_rejects_bad_limit_and_filter() {
    let resp = app()
        .oneshot(get_request("/api/2.0/search/mac?limit=500"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app()
        .oneshot(get_request("/api/2.0/search/mac?filter=bogus"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(resp).await, "unknown filter 'bogus'");
}

// --- user/token ---

#[tokio::test]
async fn token_requires_app_id() {
    let resp = app()
        .oneshot(json_request("/api/2.0/user/token", &[], &credentials()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(resp).await, "Missing X-App-Id");
}

#[tokio::test]
async fn token_rejects_bad_password() {
    let resp = app()
        .oneshot(json_request(
            "/api/2.0/user/token",
            &[("X-App-Id", APP_ID)],
            &format!(r#"{{"email":"{DEMO_EMAIL}","password":"wrong"}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(resp).await, "Invalid login");
}

// --- full authenticated flow ---

#[tokio::test]
async fn token_then_create_guide() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "/api/2.0/user/token",
            &[("X-App-Id", APP_ID)],
            &credentials(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token: Value = body_json(resp).await;
    let auth = format!("api {}", token["authToken"].as_str().unwrap());
    assert_eq!(token["username"], "demo");

    // unknown category
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "/api/2.0/guides",
            &[("X-App-Id", APP_ID), ("Authorization", auth.as_str())],
            r#"{"category":"Phones","type":"repair"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "/api/2.0/guides",
            &[("X-App-Id", APP_ID), ("Authorization", auth.as_str())],
            r#"{"category":"Examples","type":"repair","subject":"Hinge"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Guide = body_json(resp).await;
    assert_eq!(created.guideid, 3);
    assert_eq!(created.title, "Examples Hinge repair");
    assert_eq!(created.userid, 1);

    // fetch it back
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/api/2.0/guides/3"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Guide = body_json(resp).await;
    assert_eq!(fetched.category, "Examples");

    // the creation shows up in the work log
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/api/2.0/work_log"))
        .await
        .unwrap();
    let entries: Vec<Value> = body_json(resp).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["action"], "create");
    assert_eq!(entries[1]["guideid"], 3);
}
