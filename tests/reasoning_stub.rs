//! Exercises `ReasoningClient` against a locally bound `TcpListener` stub
//! instead of a full mock-server dependency (documented decision in
//! DESIGN.md): the engine's own HTTP contract is one POST to one endpoint,
//! simple enough to fake by hand.

use std::time::Duration;

use orchestrate::reasoning::client::{CompletionParams, ReasoningClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn spawn_stub(response_body: &'static str, status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
                response_body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}")
}

fn params() -> CompletionParams {
    CompletionParams {
        model: "mistral".to_string(),
        max_tokens: 32,
        temperature: 0.1,
        stop: vec![],
    }
}

#[tokio::test]
async fn successful_completion_returns_response_field() {
    let base_url = spawn_stub(r#"{"response":"turn up the volume with pactl","done":true}"#, "HTTP/1.1 200 OK").await;
    let client = ReasoningClient::new(base_url).unwrap();
    let result = client.complete("my volume is low", &params()).await;
    assert_eq!(result.as_deref(), Some("turn up the volume with pactl"));
}

#[tokio::test]
async fn non_2xx_status_collapses_to_unavailable() {
    let base_url = spawn_stub(r#"{"error":"model not loaded"}"#, "HTTP/1.1 503 Service Unavailable").await;
    let client = ReasoningClient::new(base_url).unwrap();
    let result = client.complete("anything", &params()).await;
    assert_eq!(result, None);
}

#[tokio::test]
async fn malformed_body_collapses_to_unavailable() {
    let base_url = spawn_stub("not json", "HTTP/1.1 200 OK").await;
    let client = ReasoningClient::new(base_url).unwrap();
    let result = client.complete("anything", &params()).await;
    assert_eq!(result, None);
}

#[tokio::test]
async fn connection_refused_is_unavailable_not_a_panic() {
    // Nothing is listening on this freshly-bound-then-dropped port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = ReasoningClient::new(format!("http://{addr}")).unwrap();
    assert!(!client.healthy().await);
    let result = tokio::time::timeout(Duration::from_secs(5), client.complete("anything", &params()))
        .await
        .expect("complete should not hang on a refused connection");
    assert_eq!(result, None);
}
