use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{ClientMessage, PresenceHub, PresenceSession};

pub fn presence_routes() -> Router<Arc<PresenceHub>> {
    Router::new().route("/presence", get(presence_socket))
}

async fn presence_socket(ws: WebSocketUpgrade, State(hub): State<Arc<PresenceHub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<PresenceHub>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = PresenceSession::new(hub, tx);
    let connection = session.id();

    tracing::debug!(connection, "Presence connection opened");

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode presence message");
                    continue;
                },
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => session.handle(message).await,
                Err(e) => tracing::debug!(connection, error = %e, "Ignoring malformed presence message"),
            },
            Message::Close(_) => break,
            _ => {},
        }
    }

    session.close().await;
    writer.abort();

    tracing::debug!(connection, "Presence connection closed");
}
