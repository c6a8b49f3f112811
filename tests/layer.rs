use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing_error_report::context::with_request_url;
use tracing_error_report::layer::ReportLayer;
use tracing_error_report::reporter::Reporter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct RuntimeError(String);

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<Request> {
    for _ in 0..50 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn error_events_reach_the_collector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/errors/collect"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let reporter = Reporter::new("ak_layer", &server.uri(), "site-3", "production");
    let subscriber = Registry::default().with(ReportLayer::new(Arc::new(reporter)));

    {
        let _guard = tracing::subscriber::set_default(subscriber);
        tracing::info!("not reported");
        let err = RuntimeError("DB connection lost".into());
        with_request_url("https://shop.test/checkout", async {
            tracing::error!(
                target: "orders",
                error = &err as &(dyn Error + 'static),
                tags.user_id = 42,
                "order could not be saved"
            );
        })
        .await;
    }

    let requests = wait_for_requests(&server, 1).await;
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = requests[0].body_json().expect("json body");
    assert_eq!(body["type"], "RuntimeError");
    assert_eq!(body["message"], "DB connection lost");
    assert_eq!(body["url"], "https://shop.test/checkout");
    assert_eq!(body["tags"]["user_id"], "42");
    assert_eq!(body["tags"]["log_channel"], "orders");
    assert!(body["source"].as_str().unwrap_or_default().ends_with("layer.rs"));
}

#[tokio::test]
async fn failing_collector_does_not_disturb_logging() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let reporter = Reporter::new("ak_layer", &server.uri(), "site-3", "production");
    let subscriber = Registry::default().with(ReportLayer::new(Arc::new(reporter)));

    {
        let _guard = tracing::subscriber::set_default(subscriber);
        tracing::error!("first");
        tracing::error!("second");
    }

    // Each event gets exactly one attempt, failures are not retried.
    let requests = wait_for_requests(&server, 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 2);
}
