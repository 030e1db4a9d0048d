use core_client::{ClientError, HttpInferenceClient, InferenceClient, InferenceRequest};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one HTTP exchange and hand back the raw request body.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let (header_end, content_len) = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                break (pos + 4, len);
            }
        };
        while buf.len() < header_end + content_len {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed mid-body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let response = format!(
            "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8(buf[header_end..header_end + content_len].to_vec()).unwrap()
    });
    (format!("http://{addr}/ask"), handle)
}

fn request() -> InferenceRequest {
    InferenceRequest {
        question: "how are you?\n".into(),
        model: "test-model".into(),
        system_prompt: "be kind".into(),
        temperature: 0.7,
        max_tokens: 500,
    }
}

#[tokio::test]
async fn posts_json_and_reads_answer() {
    let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"answer":"fine"}"#).await;
    let client = HttpInferenceClient::new(url, Duration::from_secs(5)).unwrap();
    let response = client.ask(&request()).await.unwrap();
    assert_eq!(response.answer.as_deref(), Some("fine"));

    let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["question"], "how are you?\n");
    assert_eq!(sent["model"], "test-model");
    assert_eq!(sent["system_prompt"], "be kind");
    assert_eq!(sent["max_tokens"], 500);
}

#[tokio::test]
async fn missing_answer_is_not_an_error() {
    let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"tokens":3}"#).await;
    let client = HttpInferenceClient::new(url, Duration::from_secs(5)).unwrap();
    let response = client.ask(&request()).await.unwrap();
    assert_eq!(response.answer, None);
    server.await.unwrap();
}

#[tokio::test]
async fn non_success_status_carries_error_field() {
    let (url, server) =
        serve_once("HTTP/1.1 500 Internal Server Error", r#"{"error":"model not loaded"}"#).await;
    let client = HttpInferenceClient::new(url, Duration::from_secs(5)).unwrap();
    let err = client.ask(&request()).await.unwrap_err();
    match err {
        ClientError::Status { status, ref details } => {
            assert_eq!(status, 500);
            assert_eq!(details, "model not loaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpInferenceClient::new(format!("http://{addr}/ask"), Duration::from_secs(5)).unwrap();
    let err = client.ask(&request()).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}
