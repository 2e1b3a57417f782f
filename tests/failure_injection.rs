//! Failure injection tests: unreachable, hanging, slow and stalling backends,
//! and clients that go away.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use edge_gateway::config::RouteConfig;

mod common;

#[tokio::test]
async fn closed_backend_is_bad_gateway() {
    let dead = common::closed_port().await;
    let gateway = common::spawn_gateway(vec![RouteConfig::backend("/", dead.to_string())], |_| {}).await;

    let start = Instant::now();
    let res = gateway.client().get(gateway.url("/api/status")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(start.elapsed() < Duration::from_secs(2), "should fail within the connect timeout");
    assert_eq!(res.headers()["x-frame-options"], "DENY");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn backend_hanging_up_is_bad_gateway() {
    let hangup = common::start_hangup_backend().await;
    let gateway = common::spawn_gateway(vec![RouteConfig::backend("/", hangup.to_string())], |_| {}).await;

    let res = gateway.client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn slow_backend_is_gateway_timeout() {
    let slow = common::start_slow_backend(Duration::from_secs(5)).await;
    let gateway = common::spawn_gateway(vec![RouteConfig::backend("/", slow.to_string())], |config| {
        config.timeouts.response_secs = 1;
    })
    .await;

    let start = Instant::now();
    let res = gateway.client().get(gateway.url("/bg3/slow")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(start.elapsed() < Duration::from_secs(4));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn one_failing_route_does_not_affect_others() {
    let dead = common::closed_port().await;
    let healthy = common::start_mock_backend("alive").await;
    let gateway = common::spawn_gateway(
        vec![
            RouteConfig::backend("/bg3/", dead.to_string()).with_strip_prefix(),
            RouteConfig::backend("/", healthy.to_string()),
        ],
        |_| {},
    )
    .await;
    let client = gateway.client();

    let res = client.get(gateway.url("/bg3/items")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    let res = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "alive");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn failed_handshake_does_not_stop_the_listener() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let backend = common::start_mock_backend("ok").await;
    let gateway = common::spawn_gateway(vec![RouteConfig::backend("/", backend.to_string())], |_| {}).await;

    // Plain HTTP on the TLS port fails the handshake.
    let mut plain = tokio::net::TcpStream::connect(gateway.https_addr).await.unwrap();
    plain.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), plain.read_to_end(&mut buf)).await;

    let res = gateway.client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn backend_stalling_mid_body_is_cut_off() {
    let stalled = common::start_stalling_backend("HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n0123456789").await;
    let gateway = common::spawn_gateway(vec![RouteConfig::backend("/", stalled.to_string())], |config| {
        config.timeouts.response_secs = 1;
        config.timeouts.body_idle_secs = 1;
    })
    .await;

    let res = gateway.client().get(gateway.url("/download")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let start = Instant::now();
    let body = tokio::time::timeout(Duration::from_secs(5), res.bytes())
        .await
        .expect("gateway should end a stalled body");
    assert!(body.is_err(), "a truncated body must not look complete");
    assert!(start.elapsed() < Duration::from_secs(4));

    // The listener keeps serving after the aborted stream.
    let again = gateway.client().get(gateway.url("/download")).send().await.unwrap();
    assert_eq!(again.status(), StatusCode::OK);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn client_disconnect_closes_backend_connection() {
    let (backend, mut closed) = common::start_disconnect_recording_backend().await;
    let gateway = common::spawn_gateway(vec![RouteConfig::backend("/", backend.to_string())], |config| {
        config.timeouts.response_secs = 30;
    })
    .await;

    let client = gateway.client();
    let pending = tokio::time::timeout(Duration::from_millis(500), client.get(gateway.url("/slow")).send()).await;
    assert!(pending.is_err(), "backend never answers");
    drop(client);

    tokio::time::timeout(Duration::from_secs(3), closed.recv())
        .await
        .expect("backend connection should close soon after the client leaves")
        .unwrap();

    gateway.shutdown.trigger();
}
