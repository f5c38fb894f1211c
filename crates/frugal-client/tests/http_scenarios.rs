use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use frugal_client::http_transport::HttpTransport;
use frugal_client::transport::BaseTransport;
use frugal_core::error::{FrugalError, TransportErrorKind};
use frugal_proto::Context;
use tokio::net::TcpListener;

async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/rpc")
}

#[tokio::test]
async fn s3_oversize_response_surfaces_response_too_large() {
    let router = Router::new().route(
        "/rpc",
        post(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "too big") }),
    );
    let url = spawn_server(router).await;

    let transport = HttpTransport::new(url, 0, 1024);
    let mut ctx = Context::new(None);
    let err = transport
        .request(&mut ctx, bytes::Bytes::from_static(b"ping"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FrugalError::Transport { kind: TransportErrorKind::ResponseTooLarge, .. }
    ));
}

#[tokio::test]
async fn s4_server_exceeding_timeout_surfaces_timed_out() {
    let router = Router::new().route(
        "/rpc",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            "unreachable"
        }),
    );
    let url = spawn_server(router).await;

    let transport = HttpTransport::new(url, 0, 0);
    let mut ctx = Context::new(None);
    ctx.set_timeout_ms(50);

    let err = transport
        .request(&mut ctx, bytes::Bytes::from_static(b"ping"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FrugalError::Transport { kind: TransportErrorKind::TimedOut, .. }
    ));
}

#[tokio::test]
async fn zero_length_body_is_treated_as_a_oneway_reply() {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    let router = Router::new().route("/rpc", post(|| async { BASE64.encode([0u8, 0, 0, 0]) }));
    let url = spawn_server(router).await;

    let transport = HttpTransport::new(url, 0, 0);
    let mut ctx = Context::new(None);
    let reply = transport
        .request(&mut ctx, bytes::Bytes::from_static(b"ping"))
        .await
        .unwrap();
    assert!(reply.is_empty());
}
