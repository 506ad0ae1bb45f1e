//! Integration tests for the HTTP client against a one-shot local server.
//!
//! Each test binds 127.0.0.1:0, serves exactly one canned response, and
//! hands back the raw request it received.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use vc_client::{ClientError, CodegenClient};
use vc_protocol::{ChatRole, HistoryQuery, StreamEvent};

/// Serve one response whose body is written in the given chunks.
async fn serve_once(status: &'static str, body_chunks: Vec<Vec<u8>>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let head = format!("HTTP/1.1 {status}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n");
        socket.write_all(head.as_bytes()).await.unwrap();
        for chunk in body_chunks {
            socket.write_all(&chunk).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        socket.shutdown().await.unwrap();
        request
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn chunks(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

#[tokio::test]
async fn generate_streams_events_in_order() {
    let (base, server) = serve_once(
        "200 OK",
        chunks(&[
            "data: {\"type\":\"chat\",\"message\":{\"role\":\"bot\",\"content\":\"Sure\"}}\n\n",
            "data: {\"type\":\"code_line\",\"line\":\"let x=1;\"}\n\n",
            "data: {\"type\":\"code_line\",\"line\":\"console.log(x);\"}\n\n",
            "data: {\"type\":\"complete\",\"code\":\"let x=1;\\nconsole.log(x);\"}\n\n",
        ]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let events: Vec<_> = client.generate("a counter").collect().await;
    let events: Vec<StreamEvent> = events.into_iter().map(|e| e.unwrap()).collect();

    assert_eq!(events.len(), 4);
    assert_eq!(events[0], StreamEvent::chat("Sure"));
    assert_eq!(events[1], StreamEvent::code_line("let x=1;"));
    assert_eq!(events[2], StreamEvent::code_line("console.log(x);"));
    assert!(matches!(events[3], StreamEvent::Complete { .. }));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /generate_code HTTP/1.1"));
    assert!(request.contains(r#"{"prompt":"a counter"}"#));
}

#[tokio::test]
async fn generate_reassembles_records_split_across_writes() {
    let (base, _server) = serve_once(
        "200 OK",
        vec![
            b"data: {\"type\":\"code_line\",\"li".to_vec(),
            b"ne\":\"caf\xC3".to_vec(),
            b"\xA9\"}\n".to_vec(),
            b"\ndata: {\"type\":\"complete\"}\n\n".to_vec(),
        ],
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let events: Vec<_> = client.generate("menu").collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::code_line("café"));
    assert_eq!(events[1].as_ref().unwrap(), &StreamEvent::complete());
}

#[tokio::test]
async fn generate_ignores_records_without_prefix() {
    let (base, _server) = serve_once(
        "200 OK",
        chunks(&[": ping\n\n", "event: noise\n\n", "data: {\"type\":\"complete\"}\n\n"]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let events: Vec<_> = client.generate("x").collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::complete());
}

#[tokio::test]
async fn generate_server_error_with_message() {
    let (base, _server) = serve_once(
        "500 Internal Server Error",
        chunks(&[r#"{"error":"rate limited"}"#]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let events: Vec<_> = client.generate("x").collect().await;

    assert_eq!(events.len(), 1);
    let err = events.into_iter().next().unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 500, .. }));
    assert_eq!(err.user_message(), "rate limited");
}

#[tokio::test]
async fn generate_server_error_unparsable_body() {
    let (base, _server) = serve_once("500 Internal Server Error", chunks(&["oops"])).await;

    let client = CodegenClient::new(base).unwrap();
    let events: Vec<_> = client.generate("x").collect().await;

    let err = events.into_iter().next().unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Server { message: None, .. }));
    assert_eq!(err.user_message(), vc_client::GENERIC_FAILURE);
}

#[tokio::test]
async fn generate_malformed_record_ends_stream() {
    let (base, _server) = serve_once(
        "200 OK",
        chunks(&[
            "data: {\"type\":\"code_line\",\"line\":\"a\"}\n\n",
            "data: {not json\n\n",
            "data: {\"type\":\"complete\"}\n\n",
        ]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let events: Vec<_> = client.generate("x").collect().await;

    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    assert!(matches!(events[1], Err(ClientError::Json(_))));
}

#[tokio::test]
async fn generate_connection_refused() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = CodegenClient::new(format!("http://{addr}")).unwrap();
    let events: Vec<_> = client.generate("x").collect().await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(ClientError::Http(_))));
}

#[tokio::test]
async fn chat_history_sends_query_and_parses_entries() {
    let (base, server) = serve_once(
        "200 OK",
        chunks(&[r#"[{"role":"bot","content":"Here you go"},{"role":"user","content":"make a page"}]"#]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let query = HistoryQuery::default().with_limit(20).with_role(ChatRole::User);
    let history = client.chat_history(&query).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ChatRole::Bot);
    assert_eq!(history[1].content, "make a page");

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /chat_history?limit=20&role=user HTTP/1.1"));
}

#[tokio::test]
async fn reset_chat_posts() {
    let (base, server) = serve_once(
        "200 OK",
        chunks(&[r#"{"success":true,"message":"Chat history reset."}"#]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let ack = client.reset_chat().await.unwrap();
    assert!(ack.success);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /reset_chat HTTP/1.1"));
}

#[tokio::test]
async fn save_changes_sends_code_and_timestamp() {
    let (base, server) = serve_once(
        "200 OK",
        chunks(&[r#"{"success":true,"message":"Changes saved and logged."}"#]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let ack = client.save_changes("<h1>hi</h1>", ts).await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("Changes saved and logged."));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /save_changes HTTP/1.1"));
    assert!(request.contains(r#""code":"<h1>hi</h1>""#));
    assert!(request.contains(r#""timestamp":"2024-05-01T12:00:00.000Z""#));
}

#[tokio::test]
async fn save_changes_missing_fields_error() {
    let (base, _server) = serve_once(
        "400 Bad Request",
        chunks(&[r#"{"error":"Missing required fields: code and timestamp"}"#]),
    )
    .await;

    let client = CodegenClient::new(base).unwrap();
    let err = client.save_changes("", Utc::now()).await.unwrap_err();
    assert_eq!(err.user_message(), "Missing required fields: code and timestamp");
}
