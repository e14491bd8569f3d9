//! End-to-end tests: a real gateway server in front of a wiremock upstream

use async_trait::async_trait;
use bytes::Bytes;
use media_gate::config::GatewayConfig;
use media_gate::error::GatewayError;
use media_gate::extract::MediaExtractor;
use media_gate::handler::DownloadHandler;
use media_gate::models::{ErrorBody, FetchLimits, FetchOutcome, FetchedMedia};
use media_gate::server::GatewayServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

fn test_config() -> GatewayConfig {
    GatewayConfig {
        api_key: Some(API_KEY.to_string()),
        max_bytes: 4096,
        fetch_timeout_ms: 500,
        denied_hostnames: vec!["*.internal".to_string(), "localhost".to_string()],
        ..Default::default()
    }
}

async fn start_gateway(handler: DownloadHandler) -> (String, Arc<DownloadHandler>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    let server = GatewayServer::new(Arc::clone(&handler), addr);
    tokio::spawn(server.serve(listener));
    (format!("http://{}", addr), handler)
}

async fn gateway() -> (String, Arc<DownloadHandler>) {
    start_gateway(DownloadHandler::new(Arc::new(test_config())).unwrap()).await
}

async fn post_json(
    endpoint: &str,
    key: Option<&str>,
    body: serde_json::Value,
) -> reqwest::Response {
    let mut request = reqwest::Client::new().post(endpoint).json(&body);
    if let Some(key) = key {
        request = request.header("x-api-key", key);
    }
    request.send().await.unwrap()
}

async fn error_message(response: reqwest::Response) -> String {
    response.json::<ErrorBody>().await.unwrap().error
}

#[tokio::test]
async fn test_download_success() {
    let upstream = MockServer::start().await;
    let payload = vec![42u8; 2048];
    Mock::given(method("GET"))
        .and(path("/videos/My%20Clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload.clone(), "video/mp4"))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, handler) = gateway().await;
    let target = format!("{}/videos/My%20Clip.mp4", upstream.uri());
    let response = post_json(
        &format!("{}/download", base),
        Some(API_KEY),
        serde_json::json!({ "url": target }),
    )
    .await;

    assert_eq!(response.status(), 200);
    let headers = response.headers().clone();
    assert_eq!(headers["content-type"], "video/mp4");
    assert_eq!(headers["content-length"], "2048");
    assert_eq!(
        headers["content-disposition"],
        "attachment; filename=\"My%20Clip.mp4\""
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(body.as_ref(), payload.as_slice());

    let stats = handler.metrics().get_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_transfers, 1);
    assert_eq!(stats.bytes_to_client, 2048);
}

#[tokio::test]
async fn test_wrong_key_never_contacts_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8; 4], "image/png"))
        .expect(0)
        .mount(&upstream)
        .await;

    let (base, _) = gateway().await;
    let target = format!("{}/a.png", upstream.uri());

    for key in [None, Some("wrong"), Some(""), Some("TEST-KEY")] {
        let response = post_json(
            &format!("{}/download", base),
            key,
            serde_json::json!({ "url": target }),
        )
        .await;
        assert_eq!(response.status(), 401, "key {:?}", key);
        assert_eq!(error_message(response).await, "Unauthorized - Invalid API key");
    }
}

#[tokio::test]
async fn test_invalid_urls_are_rejected() {
    let (base, _) = gateway().await;
    let endpoint = format!("{}/download", base);

    for url in [
        serde_json::json!("ftp://x/y"),
        serde_json::json!("javascript:alert(1)"),
        serde_json::json!("not a url"),
        serde_json::json!(""),
        serde_json::json!(12),
        serde_json::Value::Null,
    ] {
        let response = post_json(&endpoint, Some(API_KEY), serde_json::json!({ "url": url })).await;
        assert_eq!(response.status(), 400, "url {}", url);
        assert_eq!(error_message(response).await, "Invalid URL");
    }
}

#[tokio::test]
async fn test_malformed_body() {
    let (base, _) = gateway().await;
    let response = reqwest::Client::new()
        .post(format!("{}/download", base))
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json")
        .body("{\"url\":")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(error_message(response).await, "Invalid request body");
}

#[tokio::test]
async fn test_denied_hosts() {
    let (base, handler) = gateway().await;
    let endpoint = format!("{}/download", base);

    for url in [
        "http://metadata.internal/latest",
        "http://LOCALHOST/x.png",
        "http://localhost./x.png",
        "http://a.b.INTERNAL/v.mp4",
    ] {
        let response = post_json(&endpoint, Some(API_KEY), serde_json::json!({ "url": url })).await;
        assert_eq!(response.status(), 400, "url {}", url);
        assert_eq!(error_message(response).await, "Host not allowed");
    }

    let stats = handler.metrics().get_stats();
    assert_eq!(stats.successful_transfers, 0);
    assert_eq!(stats.total_failures(), 4);
}

#[tokio::test]
async fn test_upstream_failures_map_to_client_errors() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp4"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html/>", "text/html"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/big.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 4097], "video/mp4"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0u8; 8], "video/mp4")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&upstream)
        .await;

    let (base, _) = gateway().await;
    let endpoint = format!("{}/download", base);
    let cases = [
        ("/gone.mp4", 400u16, "Failed to fetch resource: 410"),
        ("/page", 400, "Not video/image"),
        ("/big.mp4", 400, "File too large"),
        ("/slow.mp4", 408, "Timeout fetching resource"),
    ];

    for (target, status, message) in cases {
        let url = format!("{}{}", upstream.uri(), target);
        let response = post_json(&endpoint, Some(API_KEY), serde_json::json!({ "url": url })).await;
        assert_eq!(response.status(), status, "target {}", target);
        assert_eq!(error_message(response).await, message);
    }
}

#[tokio::test]
async fn test_method_and_route_handling() {
    let (base, _) = gateway().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/download", base)).send().await.unwrap();
    assert_eq!(response.status(), 405);
    assert_eq!(error_message(response).await, "Method not allowed");

    let response = client.put(format!("{}/extract", base)).send().await.unwrap();
    assert_eq!(response.status(), 405);

    let response = client.get(format!("{}/elsewhere", base)).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let response = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let health: serde_json::Value = response.json().await.unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_failures() {
    let (base, _) = gateway().await;
    post_json(
        &format!("{}/download", base),
        Some("nope"),
        serde_json::json!({ "url": "https://example.com/a.png" }),
    )
    .await;

    let body = reqwest::get(format!("{}/metrics", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("media_gate_requests_total 1"));
    assert!(body.contains("media_gate_failures_total{kind=\"unauthorized\"} 1"));
}

#[tokio::test]
async fn test_extract_disabled_returns_service_unavailable() {
    let (base, _) = gateway().await;
    let response = post_json(
        &format!("{}/extract", base),
        Some(API_KEY),
        serde_json::json!({ "url": "https://video.example.com/watch?v=1" }),
    )
    .await;

    assert_eq!(response.status(), 503);
}

struct CannedExtractor;

#[async_trait]
impl MediaExtractor for CannedExtractor {
    async fn extract(&self, url: &Url, limits: &FetchLimits) -> FetchOutcome {
        if url.path().ends_with("/huge") {
            return Err(GatewayError::TooLarge {
                limit: limits.max_bytes,
            });
        }
        Ok(FetchedMedia::new(
            Bytes::from_static(b"webm-bytes"),
            "video/webm",
            "Some Talk.webm",
        ))
    }
}

#[tokio::test]
async fn test_extract_through_extractor() {
    let handler = DownloadHandler::new(Arc::new(test_config()))
        .unwrap()
        .with_extractor(Arc::new(CannedExtractor));
    let (base, _) = start_gateway(handler).await;
    let endpoint = format!("{}/extract", base);

    let response = post_json(
        &endpoint,
        Some(API_KEY),
        serde_json::json!({ "url": "https://video.example.com/watch" }),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "video/webm");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"Some Talk.webm\""
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"webm-bytes");

    let response = post_json(
        &endpoint,
        Some(API_KEY),
        serde_json::json!({ "url": "https://video.example.com/huge" }),
    )
    .await;
    assert_eq!(response.status(), 400);
    assert_eq!(error_message(response).await, "File too large");

    let response = post_json(
        &endpoint,
        Some("wrong"),
        serde_json::json!({ "url": "https://video.example.com/watch" }),
    )
    .await;
    assert_eq!(response.status(), 401);
}
