use std::sync::Arc;
use std::time::Duration;

use advice_core::config::{AdviceConfig, AppConfig, FailurePolicy, PermissionConfig};
use advice_core::mocks::MockLlm;
use advice_gateway::{AdviceGateway, GatewayConfig, GatewayServer, GatewaySettings};
use advice_model_gateway::AdviceEnhancer;
use advice_upstream::{HttpAdviceService, HttpPermissionDirectory};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Stack assembly
// =============================================================================

struct Upstreams {
    directory: MockServer,
    advice: MockServer,
}

impl Upstreams {
    async fn start() -> Self {
        let directory = MockServer::start().await;
        let advice = MockServer::start().await;

        // john: profile and advice-agent grant
        mount_get(&directory, "/dev/profiles/john", 200, json!({"user_id": "john"})).await;
        mount_get(
            &directory,
            "/dev/permissions/john",
            200,
            json!({"data": {"permitted_agents": ["advice-agent"]}}),
        )
        .await;

        // new_user: profile, no permissions yet
        let not_found = json!({"error": "not found"});
        mount_get(&directory, "/dev/profiles/new_user", 200, json!({"user_id": "new_user"})).await;
        mount_get(&directory, "/dev/permissions/new_user", 404, not_found.clone()).await;

        // ghost: unknown
        mount_get(&directory, "/dev/profiles/ghost", 404, not_found).await;

        Self { directory, advice }
    }

    fn config(&self, advice_timeout_secs: u64) -> AppConfig {
        AppConfig {
            permission: PermissionConfig {
                base_url: format!("{}/dev", self.directory.uri()),
                timeout_secs: 2,
                ..Default::default()
            },
            advice: AdviceConfig {
                url: format!("{}/advise", self.advice.uri()),
                timeout_secs: advice_timeout_secs,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

async fn mount_get(server: &MockServer, route: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

fn build_app(config: &AppConfig, llm: Arc<MockLlm>, policy: FailurePolicy) -> Router {
    let directory = Arc::new(HttpPermissionDirectory::new(&config.permission).unwrap());
    let advice = Arc::new(HttpAdviceService::new(&config.advice).unwrap());
    let enhancer = AdviceEnhancer::new(llm, policy, Duration::from_secs(5));
    let gateway = AdviceGateway::new(
        directory,
        advice,
        Arc::new(enhancer),
        GatewaySettings::from_config(config),
    );
    GatewayServer::new(GatewayConfig::from(&config.server), Arc::new(gateway)).build_router()
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_full_advice_flow() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .and(body_json(json!({
            "user_id": "john",
            "question": "Should I pay off my mortgage early?",
            "context": "4% rate",
            "length": "long",
            "temperature": 0.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "advice": "## Mortgage\n* At 4% the guaranteed return is modest.\n\
                       * Compare it with expected market returns."
        })))
        .expect(1)
        .mount(&upstreams.advice)
        .await;

    let llm = Arc::new(MockLlm::constant(
        "TL;DR: A 4% mortgage offers a modest guaranteed return. \
         Compare it with expected market returns.\n\n\
         Paying down a 4% mortgage early yields a guaranteed 4%, \
         which you should weigh against expected market returns.",
    ));
    let app = build_app(&upstreams.config(5), llm.clone(), FailurePolicy::Strict);

    let (status, json) = post(
        &app,
        "/advice",
        json!({
            "user_id": "john",
            "question": "Should I pay off my mortgage early?",
            "context": "4% rate"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["user_id"], "john");
    assert!(json["data"]["advice"]
        .as_str()
        .unwrap()
        .starts_with("TL;DR: A 4% mortgage offers a modest guaranteed return."));

    // The raw advice reached the model verbatim.
    let prompts = llm.prompts();
    assert!(prompts[0].contains("* At 4% the guaranteed return is modest."));
}

#[tokio::test]
async fn test_new_user_is_offered_subscription() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .respond_with(ResponseTemplate::new(200).set_body_string("never requested"))
        .expect(0)
        .mount(&upstreams.advice)
        .await;

    let app = build_app(
        &upstreams.config(5),
        Arc::new(MockLlm::constant("unused")),
        FailurePolicy::Fallback,
    );

    let (status, json) = post(
        &app,
        "/advice",
        json!({"user_id": "new_user", "question": "Where do I start?"}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "SUBSCRIPTION_REQUIRED");
    let url = json["error"]["subscription_info"]["url"].as_str().unwrap();
    assert_eq!(
        url,
        format!("{}/dev/permissions/new_user/agents", upstreams.directory.uri())
    );
}

#[tokio::test]
async fn test_unknown_user_is_profile_not_found() {
    let upstreams = Upstreams::start().await;
    let app = build_app(
        &upstreams.config(5),
        Arc::new(MockLlm::constant("unused")),
        FailurePolicy::Fallback,
    );

    let (status, json) = post(
        &app,
        "/advice",
        json!({"user_id": "ghost", "question": "Where do I start?"}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "PROFILE_NOT_FOUND");
}

#[tokio::test]
async fn test_slow_advice_service_is_service_error() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"advice": "Arrives after the deadline."}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&upstreams.advice)
        .await;

    let llm = Arc::new(MockLlm::constant("unused"));
    let app = build_app(&upstreams.config(1), llm.clone(), FailurePolicy::Fallback);

    let (status, json) = post(
        &app,
        "/advice",
        json!({"user_id": "john", "question": "Where do I start?"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "SERVICE_ERROR");
    assert_eq!(json["error"]["details"]["timeout"], true);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_advice_error_payload_is_service_error() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "model overloaded"})),
        )
        .mount(&upstreams.advice)
        .await;

    let app = build_app(
        &upstreams.config(5),
        Arc::new(MockLlm::constant("unused")),
        FailurePolicy::Fallback,
    );

    let (status, json) = post(
        &app,
        "/advice",
        json!({"user_id": "john", "question": "Where do I start?"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "SERVICE_ERROR");
}

#[tokio::test]
async fn test_directory_outage_is_service_error() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .and(path("/dev/profiles/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstreams.directory)
        .await;

    let app = build_app(
        &upstreams.config(5),
        Arc::new(MockLlm::constant("unused")),
        FailurePolicy::Fallback,
    );

    let (status, json) = post(
        &app,
        "/advice",
        json!({"user_id": "broken", "question": "Where do I start?"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "SERVICE_ERROR");
    assert_eq!(json["error"]["details"]["status"], 503);
}

#[tokio::test]
async fn test_subscription_round_trip() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/permissions/new_user/agents"))
        .and(body_json(json!({"agent_name": "advice-agent"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&upstreams.directory)
        .await;
    Mock::given(method("POST"))
        .and(path("/dev/permissions/new_user/agents"))
        .and(body_json(json!({"agent_name": "no-such-agent"})))
        .respond_with(ResponseTemplate::new(400))
        .mount(&upstreams.directory)
        .await;

    let app = build_app(
        &upstreams.config(5),
        Arc::new(MockLlm::constant("unused")),
        FailurePolicy::Fallback,
    );

    let advice_agent = json!({"agent_name": "advice-agent"});
    let (status, json) = post(&app, "/subscribe/new_user", advice_agent.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["already_subscribed"], false);

    let unknown_agent = json!({"agent_name": "no-such-agent"});
    let (status, json) = post(&app, "/subscribe/new_user", unknown_agent).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_AGENT");

    let (status, json) = post(&app, "/subscribe/john", advice_agent).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["already_subscribed"], true);
}
