use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

/// App id the seeded site issues.
pub const APP_ID: &str = "mock-app-id";
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "hunter2";

const MAX_SEARCH_LIMIT: u32 = 200;
const SEARCH_FILTERS: [&str; 8] = [
    "guide", "teardown", "wiki", "category", "item", "info", "question", "product",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub title: String,
    pub parent: Option<String>,
    pub description: String,
    #[serde(default)]
    pub stub: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Guide {
    pub guideid: u64,
    pub title: String,
    pub category: String,
    #[serde(rename = "type")]
    pub guide_type: String,
    pub subject: String,
    pub summary: String,
    pub introduction: String,
    pub conclusion: String,
    pub public: bool,
    pub userid: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkLogEntry {
    pub entryid: u64,
    pub guideid: u64,
    pub userid: u64,
    pub action: String,
    pub date: u64,
}

#[derive(Clone, Debug)]
pub struct User {
    pub userid: u64,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct NewGuide {
    pub category: String,
    #[serde(rename = "type")]
    pub guide_type: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default = "default_public")]
    pub public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub filter: Option<String>,
}

/// In-memory site contents.
#[derive(Debug, Default)]
pub struct Site {
    pub categories: BTreeMap<String, Category>,
    pub guides: Vec<Guide>,
    pub work_log: Vec<WorkLogEntry>,
    pub users: Vec<User>,
    pub tokens: HashMap<String, u64>,
}

pub type Db = Arc<RwLock<Site>>;

impl Site {
    /// A small site with a category tree, two guides, a stub category and
    /// one user.
    pub fn seeded() -> Self {
        let mut site = Site::default();
        for (title, parent, stub) in [
            ("Examples", None, false),
            ("Mac", None, false),
            ("Mac Laptop", Some("Mac"), false),
            ("Unsorted", None, true),
        ] {
            site.categories.insert(
                title.to_string(),
                Category {
                    title: title.to_string(),
                    parent: parent.map(str::to_string),
                    description: format!("All about {title}."),
                    stub,
                },
            );
        }

        site.users.push(User {
            userid: 1,
            username: "demo".to_string(),
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
        });

        site.guides.push(Guide {
            guideid: 1,
            title: "Mac Laptop Battery Replacement".to_string(),
            category: "Mac Laptop".to_string(),
            guide_type: "replacement".to_string(),
            subject: "Battery".to_string(),
            summary: "Swap a worn battery.".to_string(),
            introduction: String::new(),
            conclusion: String::new(),
            public: true,
            userid: 1,
        });
        site.guides.push(Guide {
            guideid: 2,
            title: "Example Teardown".to_string(),
            category: "Examples".to_string(),
            guide_type: "teardown".to_string(),
            subject: String::new(),
            summary: "Take it all apart.".to_string(),
            introduction: String::new(),
            conclusion: String::new(),
            public: true,
            userid: 1,
        });

        site.work_log.push(WorkLogEntry {
            entryid: 1,
            guideid: 1,
            userid: 1,
            action: "edit".to_string(),
            date: 1_500_000_000,
        });
        site
    }

    fn next_guide_id(&self) -> u64 {
        self.guides.iter().map(|g| g.guideid).max().unwrap_or(0) + 1
    }

    fn next_entry_id(&self) -> u64 {
        self.work_log.iter().map(|e| e.entryid).max().unwrap_or(0) + 1
    }

    /// Nested `{title: {child: {...}}}` map of non-stub categories.
    fn hierarchy(&self, parent: Option<&str>) -> Value {
        let children = self
            .categories
            .values()
            .filter(|c| !c.stub && c.parent.as_deref() == parent)
            .map(|c| (c.title.clone(), self.hierarchy(Some(&c.title))))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(children)
    }
}

/// Error response in the API's `{"errors":[{"message":...}]}` shape.
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({"errors": [{"message": self.message}]});
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with(Site::seeded())
}

pub fn app_with(site: Site) -> Router {
    let db: Db = Arc::new(RwLock::new(site));
    let api = Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/all", get(list_categories_flat))
        .route("/categories/{name}", get(get_category))
        .route("/guides", get(list_guides).post(create_guide))
        .route("/guides/{id}", get(get_guide))
        .route("/work_log", get(list_work_log))
        .route("/work_log/{id}", get(get_work_log))
        .route("/search/{query}", get(search))
        .route("/user/token", post(issue_token));
    Router::new().nest("/api/2.0", api).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_categories(State(db): State<Db>) -> Json<Value> {
    Json(db.read().await.hierarchy(None))
}

async fn list_categories_flat(State(db): State<Db>) -> Json<Vec<String>> {
    Json(db.read().await.categories.keys().cloned().collect())
}

async fn get_category(
    State(db): State<Db>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiFailure> {
    debug!(%name, "category lookup");
    let site = db.read().await;
    let category = site
        .categories
        .get(&name)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, format!("Category '{name}' not found")))?;
    let guides: Vec<Value> = site
        .guides
        .iter()
        .filter(|g| g.category == name)
        .map(guide_summary)
        .collect();
    let children: Vec<&str> = site
        .categories
        .values()
        .filter(|c| c.parent.as_deref() == Some(name.as_str()))
        .map(|c| c.title.as_str())
        .collect();
    Ok(Json(json!({
        "wiki_title": category.title,
        "parent": category.parent,
        "contents_raw": category.description,
        "children": children,
        "guides": guides,
    })))
}

async fn list_guides(State(db): State<Db>) -> Json<Vec<Value>> {
    let site = db.read().await;
    Json(site.guides.iter().filter(|g| g.public).map(guide_summary).collect())
}

async fn get_guide(State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Guide>, ApiFailure> {
    let site = db.read().await;
    site.guides
        .iter()
        .find(|g| g.guideid == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, format!("Guide {id} not found")))
}

async fn create_guide(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<NewGuide>,
) -> Result<Json<Guide>, ApiFailure> {
    let mut site = db.write().await;
    let userid = authorized_user(&site, &headers)?;

    if input.category.trim().is_empty() || input.guide_type.trim().is_empty() {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "category and type are required",
        ));
    }
    if !site.categories.contains_key(&input.category) {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            format!("Category '{}' does not exist", input.category),
        ));
    }

    let guideid = site.next_guide_id();
    let title = input.title.unwrap_or_else(|| {
        [input.category.as_str(), input.subject.as_str(), input.guide_type.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    });
    let guide = Guide {
        guideid,
        title,
        category: input.category,
        guide_type: input.guide_type,
        subject: input.subject,
        summary: input.summary,
        introduction: input.introduction,
        conclusion: input.conclusion,
        public: input.public,
        userid,
    };
    let entryid = site.next_entry_id();
    site.work_log.push(WorkLogEntry {
        entryid,
        guideid,
        userid,
        action: "create".to_string(),
        date: 1_500_000_000 + entryid,
    });
    site.guides.push(guide.clone());
    debug!(guideid, "guide created");
    Ok(Json(guide))
}

async fn list_work_log(State(db): State<Db>) -> Json<Vec<WorkLogEntry>> {
    Json(db.read().await.work_log.clone())
}

async fn get_work_log(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<Json<WorkLogEntry>, ApiFailure> {
    let site = db.read().await;
    site.work_log
        .iter()
        .find(|e| e.entryid == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, format!("Entry {id} not found")))
}

async fn search(
    State(db): State<Db>,
    Path(query): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiFailure> {
    let offset = params.offset.unwrap_or(0) as usize;
    let limit = params.limit.unwrap_or(20);
    if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {MAX_SEARCH_LIMIT}"),
        ));
    }
    let filters: Vec<String> = params
        .filter
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(bad) = filters.iter().find(|f| !SEARCH_FILTERS.contains(&f.as_str())) {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            format!("unknown filter '{bad}'"),
        ));
    }

    let site = db.read().await;
    let needle = query.to_lowercase();
    let wanted = |kind: &str| filters.is_empty() || filters.iter().any(|f| f == kind);

    let mut matches: Vec<Value> = Vec::new();
    for guide in site.guides.iter().filter(|g| g.public) {
        let kind = if guide.guide_type == "teardown" { "teardown" } else { "guide" };
        if wanted(kind) && guide.title.to_lowercase().contains(&needle) {
            let mut result = guide_summary(guide);
            result["dataType"] = json!(kind);
            matches.push(result);
        }
    }
    for category in site.categories.values().filter(|c| !c.stub) {
        if wanted("category") && category.title.to_lowercase().contains(&needle) {
            matches.push(json!({"dataType": "category", "title": category.title}));
        }
    }

    let total = matches.len();
    let results: Vec<Value> = matches.into_iter().skip(offset).take(limit as usize).collect();
    debug!(%query, total, "search");
    Ok(Json(json!({
        "search": query,
        "offset": offset,
        "limit": limit,
        "totalResults": total,
        "moreResults": offset + results.len() < total,
        "results": results,
    })))
}

async fn issue_token(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<Credentials>,
) -> Result<Json<Value>, ApiFailure> {
    let app_id = headers
        .get("x-app-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if app_id.is_empty() {
        return Err(ApiFailure::new(StatusCode::UNAUTHORIZED, "Missing X-App-Id"));
    }

    let mut site = db.write().await;
    let user = site
        .users
        .iter()
        .find(|u| u.email == input.email && u.password == input.password)
        .cloned()
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "Invalid login"))?;

    let token = Uuid::new_v4().simple().to_string();
    site.tokens.insert(token.clone(), user.userid);
    debug!(userid = user.userid, "token issued");
    Ok(Json(json!({
        "authToken": token,
        "userid": user.userid,
        "username": user.username,
    })))
}

/// Resolve `Authorization: api {token}` to a user id.
fn authorized_user(site: &Site, headers: &HeaderMap) -> Result<u64, ApiFailure> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("api "))
        .and_then(|token| site.tokens.get(token).copied())
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "Authentication required"))
}

fn guide_summary(guide: &Guide) -> Value {
    json!({
        "guideid": guide.guideid,
        "title": guide.title,
        "category": guide.category,
        "type": guide.guide_type,
        "subject": guide.subject,
        "summary": guide.summary,
    })
}
