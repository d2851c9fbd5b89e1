use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use synapse_core::net::messages::{ClientEvent, ConnectionId, JoinMsg, ServerEvent};
use synapse_core::net::protocol::{decode_server_event, encode_client_event};

use synapse_server::build_app;
use synapse_server::config::{AuthFileConfig, ServerConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no auth.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server whose HTTP API requires a bearer token.
    pub async fn with_auth(token: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                bearer_token: Some(token.to_string()),
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}/api/v1{path}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client and consume its `connected` greeting.
pub async fn ws_connect(url: &str) -> (WsStream, ConnectionId) {
    let (mut stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    match ws_read_event(&mut stream).await {
        ServerEvent::Connected(c) => (stream, c.connection_id),
        other => panic!("Expected Connected, got: {other:?}"),
    }
}

pub async fn ws_send(stream: &mut WsStream, event: &ClientEvent) {
    let encoded = encode_client_event(event).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Join a room and wait for the roster broadcast that confirms it.
/// Returns the roster.
pub async fn ws_join(stream: &mut WsStream, room_code: &str, name: &str) -> Vec<String> {
    ws_send(
        stream,
        &ClientEvent::Join(JoinMsg {
            room_code: room_code.to_string(),
            display_name: name.to_string(),
        }),
    )
    .await;
    match ws_read_until(stream, |e| matches!(e, ServerEvent::Participants(_))).await {
        ServerEvent::Participants(names) => names,
        _ => unreachable!(),
    }
}

/// Read the next text frame (5s timeout).
pub async fn ws_read_text(stream: &mut WsStream) -> String {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next ServerEvent (5s timeout).
pub async fn ws_read_event(stream: &mut WsStream) -> ServerEvent {
    let text = ws_read_text(stream).await;
    decode_server_event(&text).unwrap()
}

/// Try to read a ServerEvent, returning None on timeout.
pub async fn ws_try_read_event(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerEvent> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_server_event(text.as_str()).unwrap(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Skip events until one matches `pred` (5s timeout each).
pub async fn ws_read_until(
    stream: &mut WsStream,
    pred: impl Fn(&ServerEvent) -> bool,
) -> ServerEvent {
    loop {
        let event = ws_read_event(stream).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Assert nothing arrives within a short window.
pub async fn ws_expect_silence(stream: &mut WsStream) {
    if let Some(event) = ws_try_read_event(stream, 200).await {
        panic!("Expected no message, got: {event:?}");
    }
}
