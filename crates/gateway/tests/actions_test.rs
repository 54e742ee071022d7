use std::sync::Arc;

use advice_core::mocks::{InMemoryPermissionDirectory, RecordingAdviceService};
use advice_gateway::{AdviceGateway, GatewayConfig, GatewayServer, GatewaySettings};
use advice_model_gateway::AdviceEnhancer;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    directory: Arc<InMemoryPermissionDirectory>,
    advice: Arc<RecordingAdviceService>,
    app: Router,
}

fn harness(directory: InMemoryPermissionDirectory) -> Harness {
    let directory = Arc::new(directory);
    let advice = Arc::new(RecordingAdviceService::answering(
        "Refinance once rates drop a full point. Keep closing costs under 2%.",
    ));
    let gateway = AdviceGateway::new(
        directory.clone(),
        advice.clone(),
        Arc::new(AdviceEnhancer::local_only()),
        GatewaySettings::default(),
    );
    let app = GatewayServer::new(GatewayConfig::default(), Arc::new(gateway)).build_router();
    Harness {
        directory,
        advice,
        app,
    }
}

fn default_harness() -> Harness {
    harness(
        InMemoryPermissionDirectory::new()
            .with_user("john", &["advice-agent"])
            .with_profile("new_user"),
    )
}

async fn call(app: &Router, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/actions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn properties(action: &str, params: &[(&str, &str)]) -> String {
    let params: Vec<Value> = params
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    json!({
        "apiPath": action,
        "requestBody": { "content": { "application/json": { "properties": params } } }
    })
    .to_string()
}

#[tokio::test]
async fn test_get_advice_action() {
    let h = default_harness();

    let (status, json) = call(
        &h.app,
        properties(
            "/getAdvice",
            &[("user_id", "john"), ("question", "Should I refinance?")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["action"], "getAdvice");
    assert_eq!(json["result"]["user_id"], "john");
    assert!(json["result"]["advice"]
        .as_str()
        .unwrap()
        .starts_with("TL;DR: Refinance once rates drop a full point."));
    assert_eq!(h.advice.call_count(), 1);
}

#[tokio::test]
async fn test_get_advice_action_reports_subscription_offer() {
    let h = default_harness();

    let (status, json) = call(
        &h.app,
        properties("getAdvice", &[("user_id", "new_user"), ("question", "Where do I start?")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ERROR");
    assert_eq!(json["result"]["code"], "SUBSCRIPTION_REQUIRED");
    assert!(json["result"]["subscription_info"]["url"]
        .as_str()
        .unwrap()
        .ends_with("/permissions/new_user/agents"));
    assert_eq!(h.advice.call_count(), 0);
}

#[tokio::test]
async fn test_get_advice_action_requires_question() {
    let h = default_harness();

    let (_, json) = call(&h.app, properties("getAdvice", &[("user_id", "john")])).await;

    assert_eq!(json["status"], "ERROR");
    assert_eq!(json["result"]["code"], "INVALID_REQUEST");
    assert_eq!(json["result"]["error"], "question is required");
    assert_eq!(h.directory.call_count(), 0);
}

#[tokio::test]
async fn test_subscribe_action_defaults_agent_name() {
    let h = default_harness();
    let body = json!({
        "action": "subscribeToAgent",
        "parameters": [{ "name": "user_id", "value": "new_user" }]
    })
    .to_string();

    let (_, json) = call(&h.app, body.clone()).await;
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["result"]["agent_name"], "advice-agent");
    assert_eq!(json["result"]["already_subscribed"], false);

    let (_, json) = call(&h.app, body).await;
    assert_eq!(json["result"]["already_subscribed"], true);
}

#[tokio::test]
async fn test_check_user_action() {
    let h = default_harness();

    let body = |user: &str| {
        json!({
            "function": "checkUser",
            "parameters": [{ "name": "user_id", "value": user }]
        })
        .to_string()
    };

    let (_, json) = call(&h.app, body("new_user")).await;
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["result"]["user_exists"], true);

    let (_, json) = call(&h.app, body("ghost")).await;
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["result"]["user_exists"], false);
}

#[tokio::test]
async fn test_check_permissions_action() {
    let h = default_harness();

    let body = |user: &str| {
        json!({
            "function": "checkPermissions",
            "parameters": [{ "name": "user_id", "value": user }]
        })
        .to_string()
    };

    let (_, json) = call(&h.app, body("john")).await;
    assert_eq!(json["result"]["permitted"], true);
    assert_eq!(json["result"]["permitted_agents"], json!(["advice-agent"]));

    let (_, json) = call(&h.app, body("new_user")).await;
    assert_eq!(json["result"]["permitted"], false);
    assert_eq!(json["result"]["user_exists"], true);
    assert_eq!(json["result"]["permitted_agents"], json!([]));

    let (_, json) = call(&h.app, body("ghost")).await;
    assert_eq!(json["result"]["user_exists"], false);
}

#[tokio::test]
async fn test_check_actions_on_directory_outage() {
    let h = harness(InMemoryPermissionDirectory::unavailable());

    let (status, json) = call(
        &h.app,
        json!({
            "function": "checkPermissions",
            "parameters": [{ "name": "user_id", "value": "john" }]
        })
        .to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ERROR");
    assert_eq!(json["result"]["code"], "SERVICE_ERROR");
    assert_eq!(json["result"]["details"]["upstream"], "permission_directory");
}

#[tokio::test]
async fn test_check_action_requires_user_id() {
    let h = default_harness();

    let (_, json) = call(&h.app, json!({ "function": "checkUser" }).to_string()).await;

    assert_eq!(json["status"], "ERROR");
    assert_eq!(json["result"]["error"], "user_id is required");
    assert_eq!(h.directory.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_action() {
    let h = default_harness();

    let (status, json) = call(&h.app, json!({ "action": "/deleteUser" }).to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ERROR");
    assert_eq!(json["result"]["error"], "Unknown action: deleteUser");
}

#[tokio::test]
async fn test_malformed_action_body() {
    let h = default_harness();

    let (status, json) = call(&h.app, "{not json".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "ERROR");
    assert_eq!(json["result"]["code"], "INVALID_REQUEST");
}
