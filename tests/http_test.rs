mod common;

use common::{P1, USER, fixture_storage};
use pretty_assertions::assert_eq;
use pubgraph::server::{ServerState, serve};
use pubgraph::{Authenticated, Subgraph};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

// Start the subgraph on an ephemeral port and return its base URL
async fn start_server() -> String {
    let subgraph = Subgraph::with_storage(fixture_storage().await, Arc::new(Authenticated)).unwrap();
    let state = Arc::new(ServerState {
        subgraph: Arc::new(subgraph),
        principal_header: "x-user-id".to_string(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state));
    format!("http://{addr}")
}

async fn post_graphql(base: &str, principal: Option<&str>, body: Value) -> reqwest::Response {
    let mut request = reqwest::Client::new()
        .post(format!("{base}/graphql"))
        .json(&body);
    if let Some(principal) = principal {
        request = request.header("x-user-id", principal);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_graphql_over_http() {
    let base = start_server().await;

    let response = post_graphql(
        &base,
        Some(USER),
        json!({
            "query": "query Get($id: UUID!) { publicationById(id: $id) { name authors { order } } }",
            "variables": { "id": P1 },
            "operationName": "Get",
        }),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["publicationById"]["name"], "Federated data");
    assert_eq!(
        body["data"]["publicationById"]["authors"],
        json!([{ "order": 1 }, { "order": 2 }])
    );
}

#[tokio::test]
async fn test_principal_header_drives_permissions() {
    let base = start_server().await;
    let query = json!({ "query": "{ publicationPage { id } }" });

    let anonymous: Value = post_graphql(&base, None, query.clone())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(anonymous["data"]["publicationPage"], Value::Null);
    assert_eq!(anonymous["errors"][0]["extensions"]["code"], "FORBIDDEN");

    let malformed: Value = post_graphql(&base, Some("not-a-uuid"), query.clone())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(malformed["errors"][0]["extensions"]["code"], "FORBIDDEN");

    let identified: Value = post_graphql(&base, Some(USER), query)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(identified["data"]["publicationPage"], json!([{ "id": P1 }]));
}

#[tokio::test]
async fn test_request_level_errors() {
    let base = start_server().await;

    let invalid_json = reqwest::Client::new()
        .post(format!("{base}/graphql"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(invalid_json.status(), 400);

    let syntax = post_graphql(&base, Some(USER), json!({ "query": "{ publicationPage { id " })).await;
    assert_eq!(syntax.status(), 200);
    let body: Value = syntax.json().await.unwrap();
    assert!(body.get("data").is_none());
    assert!(body["errors"][0]["message"].as_str().unwrap().contains("syntax"));
}

#[tokio::test]
async fn test_graphiql_cors_and_routing() {
    let base = start_server().await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let page = client.get(format!("{base}/graphiql")).send().await.unwrap();
    assert_eq!(page.status(), 200);
    let html = page.text().await.unwrap();
    assert!(html.contains("x-user-id"));
    assert!(!html.contains("__PRINCIPAL_HEADER__"));

    let root = client.get(&base).send().await.unwrap();
    assert_eq!(root.status(), 302);
    assert_eq!(root.headers()["location"], "/graphiql");

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{base}/graphql"))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 200);
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");
    assert!(
        preflight.headers()["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .contains("x-user-id")
    );

    let missing = client.get(format!("{base}/nowhere")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
}
