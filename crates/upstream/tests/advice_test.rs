use std::time::Duration;

use advice_core::config::AdviceConfig;
use advice_core::{AdviceRequest, AdviceService, UpstreamService};
use advice_upstream::HttpAdviceService;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_for(server: &MockServer, timeout_secs: u64) -> HttpAdviceService {
    HttpAdviceService::new(&AdviceConfig {
        url: format!("{}/advise", server.uri()),
        timeout_secs,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_sends_question_and_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .and(body_json(json!({
            "user_id": "john",
            "question": "Should I refinance?",
            "context": "rates dropped 1%",
            "length": "long",
            "temperature": 0.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "advice": "## Refinance\n* Compare closing costs with monthly savings."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = AdviceRequest::new("john", "Should I refinance?")
        .unwrap()
        .with_context(Some("rates dropped 1%".into()));

    let advice = service_for(&server, 5).get_advice(&request).await.unwrap();
    assert!(advice.contains("Compare closing costs"));
}

#[tokio::test]
async fn test_omits_absent_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .and(body_json(json!({
            "user_id": "john",
            "question": "Should I refinance?",
            "length": "long",
            "temperature": 0.5
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Refinancing pays off past the break-even month."),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = AdviceRequest::new("john", "Should I refinance?").unwrap();
    let advice = service_for(&server, 5).get_advice(&request).await.unwrap();
    assert_eq!(advice, "Refinancing pays off past the break-even month.");
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad question"))
        .mount(&server)
        .await;

    let request = AdviceRequest::new("john", "?").unwrap();
    let err = service_for(&server, 5).get_advice(&request).await.unwrap_err();

    assert_eq!(err.service(), Some(UpstreamService::AdviceService));
    assert_eq!(err.upstream_http_status(), Some(422));
    assert!(err.to_string().contains("bad question"));
}

#[tokio::test]
async fn test_slow_advice_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/advise"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Too late to matter anyway.")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let request = AdviceRequest::new("john", "Anything?").unwrap();
    let err = service_for(&server, 1).get_advice(&request).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_unreachable_service_is_a_transport_error() {
    let service = HttpAdviceService::new(&AdviceConfig {
        // Port 9 (discard) on localhost is closed in test environments.
        url: "http://127.0.0.1:9/advise".into(),
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let request = AdviceRequest::new("john", "Anything?").unwrap();
    let err = service.get_advice(&request).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.upstream_http_status(), None);
}
