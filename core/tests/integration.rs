//! End-to-end flow against the live mock server.
//!
//! Starts the mock server on a random port, then exercises every resource
//! method over real HTTP through the default `ureq` transport.

use std::net::SocketAddr;
use std::time::Duration;

use dozuki_core::{
    ClientConfig, ClientError, DozukiClient, NewGuide, SearchFilter, SearchOptions,
    UreqTransport,
};
use mock_server::{APP_ID, DEMO_EMAIL, DEMO_PASSWORD};

/// Start the mock server on its own runtime thread and return its address.
fn start_mock_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn api_message(err: ClientError) -> (u16, String) {
    match err {
        ClientError::Api {
            status, message, ..
        } => (status, message),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[test]
fn full_api_flow() {
    let addr = start_mock_server();
    let config = ClientConfig::new(&format!("http://{addr}"), Some(APP_ID)).unwrap();
    let mut client = DozukiClient::new(config);

    // Step 1: categories.
    let tree = client.list_categories().unwrap();
    assert!(tree["Mac"].get("Mac Laptop").is_some());
    assert!(tree.get("Unsorted").is_none(), "stubs are excluded");

    let flat = client.list_categories_flat().unwrap();
    assert_eq!(flat.as_array().unwrap().len(), 4);

    let category = client.get_category("Mac%20Laptop").unwrap();
    assert_eq!(category["wiki_title"], "Mac Laptop");

    let err = client.get_category("Nope").unwrap_err();
    assert_eq!(api_message(err), (404, "Category 'Nope' not found".to_string()));

    // Step 2: guides.
    let guides = client.list_guides().unwrap();
    assert_eq!(guides.as_array().unwrap().len(), 2);

    let guide = client.get_guide(1).unwrap();
    assert_eq!(guide["title"], "Mac Laptop Battery Replacement");

    let err = client.get_guide(99).unwrap_err();
    assert_eq!(api_message(err), (404, "Guide 99 not found".to_string()));

    // Step 3: search, including paging and filters.
    let results = client.search("battery", &SearchOptions::default()).unwrap();
    assert_eq!(results["totalResults"], 1);
    assert_eq!(results["limit"], 20);

    let options = SearchOptions {
        offset: 1,
        limit: 1,
        filters: vec![SearchFilter::Category],
    };
    let results = client.search("mac", &options).unwrap();
    assert_eq!(results["totalResults"], 2);
    assert_eq!(results["results"][0]["title"], "Mac Laptop");

    let results = client.search("mac laptop", &SearchOptions::default()).unwrap();
    assert_eq!(results["search"], "mac laptop");

    // Step 4: writes need a token.
    let new_guide = NewGuide {
        subject: Some("Hinge".to_string()),
        ..NewGuide::new("Examples", "repair")
    };
    let err = client.create_guide(&new_guide).unwrap_err();
    assert_eq!(api_message(err), (401, "Authentication required".to_string()));

    // Step 5: bad credentials leave the client unauthenticated.
    let err = client.authenticate(DEMO_EMAIL, "wrong").unwrap_err();
    match err {
        ClientError::Authentication { reason, .. } => assert_eq!(reason, "Invalid login"),
        other => panic!("expected Authentication error, got {other:?}"),
    }
    assert!(client.auth_token().is_none());

    // Step 6: authenticate and create.
    client.authenticate(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
    assert!(client.auth_token().is_some());

    let created = client.create_guide(&new_guide).unwrap();
    assert_eq!(created["guideid"], 3);
    assert_eq!(created["title"], "Examples Hinge repair");

    let err = client
        .create_guide(&NewGuide::new("Phones", "repair"))
        .unwrap_err();
    assert_eq!(api_message(err), (400, "Category 'Phones' does not exist".to_string()));

    // Step 7: the creation is in the work log.
    let entries = client.list_work_logs().unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 2);

    let entry = client.get_work_log(2).unwrap();
    assert_eq!(entry["action"], "create");
    assert_eq!(entry["guideid"], 3);

    let err = client.get_work_log(50).unwrap_err();
    assert_eq!(api_message(err).0, 404);
}

#[test]
fn unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(&format!("http://{addr}"), Some(APP_ID)).unwrap();
    let client =
        DozukiClient::with_transport(config, UreqTransport::with_timeout(Duration::from_secs(5)));

    let err = client.list_guides().unwrap_err();
    match err {
        ClientError::Transport { url, .. } => {
            assert_eq!(url, format!("http://{addr}/api/2.0/guides"));
        }
        other => panic!("expected Transport error, got {other:?}"),
    }
}
