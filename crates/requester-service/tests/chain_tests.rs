//! End-to-end tests for a two-hop chain: requester -> basic.
//!
//! Both fixtures run for real on ephemeral ports. A forced failure at the
//! basic hop must look the same to the caller as one at the first hop.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fixture_test_utils::{TestBasicServer, TestRequesterServer};
use proto_gen::basic::basic_service_client::BasicServiceClient;
use proto_gen::basic::BasicRequest;
use std::time::{Duration, Instant};
use tonic::Code;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn chain() -> Result<(TestBasicServer, TestRequesterServer), anyhow::Error> {
    let basic = TestBasicServer::spawn().await?;
    let requester = TestRequesterServer::spawn(&basic.url(), &basic.grpc_url()).await?;
    Ok((basic, requester))
}

/// A URL with nothing listening behind it.
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn test_http_forced_status_is_transparent() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;

    for code in [404_u16, 500, 503] {
        let direct = reqwest::get(format!("{}/request?force_ret={code}", basic.url())).await?;
        let relayed =
            reqwest::get(format!("{}/request?force_ret={code}", requester.url())).await?;

        assert_eq!(relayed.status(), code);
        assert_eq!(relayed.status(), direct.status());
        assert_eq!(relayed.bytes().await?, direct.bytes().await?);
    }

    assert_eq!(basic.publisher().attempts(), 0);

    Ok(())
}

#[tokio::test]
async fn test_http_delay_honored_downstream() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;
    let start = Instant::now();

    let response = reqwest::get(format!(
        "{}/request?force_delay=60&force_ret=503",
        requester.url()
    ))
    .await?;

    assert_eq!(response.status(), 503);
    assert!(start.elapsed() >= Duration::from_millis(60));
    assert_eq!(basic.publisher().attempts(), 0);

    Ok(())
}

#[tokio::test]
async fn test_http_success_relays_downstream_body() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;

    let response = reqwest::get(format!("{}/request", requester.url())).await?;

    assert_eq!(response.status(), 200);
    assert!(response.bytes().await?.is_empty());
    let events = basic.publisher().events();
    assert_eq!(
        events.first().map(|e| e.message.clone()),
        Some("Received http request with delay: 0, return code: 0".to_string())
    );

    Ok(())
}

#[tokio::test]
async fn test_two_forwarding_hops() -> Result<(), anyhow::Error> {
    let (_basic, first) = chain().await?;
    let second = TestRequesterServer::spawn(&first.url(), &first.grpc_url()).await?;
    let start = Instant::now();

    let response = reqwest::get(format!(
        "{}/request?force_delay=40&force_ret=502",
        second.url()
    ))
    .await?;

    assert_eq!(response.status(), 502);
    assert!(start.elapsed() >= Duration::from_millis(40));

    let mut client = BasicServiceClient::connect(second.grpc_url()).await?;
    let status = client
        .request(BasicRequest {
            force_delay: 0,
            force_ret: 9,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);

    Ok(())
}

#[tokio::test]
async fn test_http_relays_stub_body_and_query() -> Result<(), anyhow::Error> {
    let stub = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/deep/path"))
        .and(query_param("force_delay", "5"))
        .respond_with(
            ResponseTemplate::new(418)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"teapot":true}"#),
        )
        .expect(1)
        .mount(&stub)
        .await;

    let requester = TestRequesterServer::spawn(&stub.uri(), &unreachable_url()).await?;

    let response = reqwest::get(format!(
        "{}/deep/path?force_delay=5&ignored=1",
        requester.url()
    ))
    .await?;

    assert_eq!(response.status(), 418);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
    assert_eq!(response.text().await?, r#"{"teapot":true}"#);

    Ok(())
}

#[tokio::test]
async fn test_http_unreachable_downstream_is_generic_error() -> Result<(), anyhow::Error> {
    let requester = TestRequesterServer::spawn(&unreachable_url(), &unreachable_url()).await?;

    let response = reqwest::get(format!(
        "{}/request?force_ret=404&force_delay=10",
        requester.url()
    ))
    .await?;

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["message"], "An internal error occurred");

    Ok(())
}

#[tokio::test]
async fn test_grpc_forced_status_is_transparent() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;
    let mut client = BasicServiceClient::connect(requester.grpc_url()).await?;
    let start = Instant::now();

    let status = client
        .request(BasicRequest {
            force_delay: 30,
            force_ret: 5,
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "forced error");
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(basic.publisher().attempts(), 0);

    Ok(())
}

#[tokio::test]
async fn test_grpc_success_relayed() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;
    let mut client = BasicServiceClient::connect(requester.grpc_url()).await?;

    client
        .request(BasicRequest {
            force_delay: 0,
            force_ret: 0,
        })
        .await?;

    assert!(
        basic
            .publisher()
            .wait_for_attempts(1, Duration::from_secs(1))
            .await
    );

    Ok(())
}

#[tokio::test]
async fn test_grpc_unreachable_downstream_is_unavailable() -> Result<(), anyhow::Error> {
    let requester = TestRequesterServer::spawn(&unreachable_url(), &unreachable_url()).await?;
    let mut client = BasicServiceClient::connect(requester.grpc_url()).await?;

    let status = client
        .request(BasicRequest {
            force_delay: 0,
            force_ret: 3,
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(status.message(), "couldn't connect to downstream");

    Ok(())
}

#[tokio::test]
async fn test_grpc_downstream_lost_after_success_is_unavailable() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;
    let mut client = BasicServiceClient::connect(requester.grpc_url()).await?;

    // Warm the requester's channel to the basic hop
    client
        .request(BasicRequest {
            force_delay: 0,
            force_ret: 0,
        })
        .await?;

    drop(basic);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = client
        .request(BasicRequest {
            force_delay: 0,
            force_ret: 5,
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(status.message(), "couldn't connect to downstream");

    Ok(())
}

#[tokio::test]
async fn test_http_downstream_lost_after_success_is_generic_error() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;

    let response = reqwest::get(format!("{}/request", requester.url())).await?;
    assert_eq!(response.status(), 200);

    drop(basic);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = reqwest::get(format!("{}/request?force_ret=404", requester.url())).await?;

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["message"], "An internal error occurred");

    Ok(())
}

#[tokio::test]
async fn test_grpc_delay_longer_than_connect_timeout_is_relayed() -> Result<(), anyhow::Error> {
    let (basic, requester) = chain().await?;
    let mut client = BasicServiceClient::connect(requester.grpc_url()).await?;
    let connect_timeout = requester.config().downstream_connect_timeout;
    let delay = connect_timeout + Duration::from_millis(500);
    let start = Instant::now();

    client
        .request(BasicRequest {
            force_delay: i32::try_from(delay.as_millis())?,
            force_ret: 0,
        })
        .await?;

    assert!(start.elapsed() >= delay);
    assert!(
        basic
            .publisher()
            .wait_for_attempts(1, Duration::from_secs(1))
            .await
    );

    Ok(())
}
