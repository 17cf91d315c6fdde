//! Loopback HTTP server and STOMP broker for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

pub const TOPIC: &str = "/topic/environment";

pub fn sample_json(id: &str, timestamp: &str, temperature: f64, humidity: f64) -> String {
    format!(
        r#"{{"id":"{id}","timestamp":"{timestamp}","temperatureCelsius":{temperature},"humidityPercent":{humidity},"sensor":"DHT22","device":"esp32-salon","location":"Salon","dataSource":"mqtt"}}"#
    )
}

/// Serve every request with `handler(request_target) -> (status, body)`.
/// Returns the API base url.
pub async fn serve_http<F>(handler: F) -> String
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&request);
                let target = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = handler(&target);
                let response = format!(
                    "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{addr}/api")
}

/// Listener for a fake broker plus the WebSocket url pointing at it
pub async fn broker() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/websocket", listener.local_addr().unwrap());
    (listener, url)
}

/// Accept one client and complete CONNECT / SUBSCRIBE.
/// Returns the socket and the subscription id the client chose.
pub async fn accept_subscriber(
    listener: &TcpListener,
) -> (WebSocketStream<TcpStream>, String) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    let connect = next_text(&mut ws).await.expect("CONNECT frame");
    assert!(connect.starts_with("CONNECT\n"), "got {connect:?}");
    send_text(&mut ws, "CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0").await;

    let subscribe = next_text(&mut ws).await.expect("SUBSCRIBE frame");
    assert!(subscribe.starts_with("SUBSCRIBE\n"), "got {subscribe:?}");
    assert!(subscribe.contains(&format!("destination:{TOPIC}\n")));
    let id = subscribe
        .lines()
        .find_map(|line| line.strip_prefix("id:"))
        .expect("subscription id")
        .to_string();

    (ws, id)
}

pub async fn send_message(ws: &mut WebSocketStream<TcpStream>, subscription: &str, body: &str) {
    let frame = format!(
        "MESSAGE\nsubscription:{subscription}\ndestination:{TOPIC}\nmessage-id:m-1\ncontent-type:application/json\n\n{body}\0"
    );
    send_text(ws, &frame).await;
}

pub async fn send_text(ws: &mut WebSocketStream<TcpStream>, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Next text message, skipping heart-beats. `None` once the client is gone.
pub async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .ok()??
            .ok()?;
        match msg {
            Message::Text(text) if text.trim().is_empty() => continue,
            Message::Text(text) => return Some(text.to_string()),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}
