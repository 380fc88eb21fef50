//! The single WebSocket endpoint: origin gate at upgrade time, then one
//! read task feeding the dispatcher and one writer task draining the
//! client's outbound queue.

use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::{dispatch, session};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use beacon_core::SignalPacket;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// Game identifier the connection is scoped under; empty when absent.
    #[serde(default)]
    pub ugi: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(server): State<Arc<Server>>,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !server.origin_allowed(origin) {
        info!(origin, "origin rejected during connect");
        return StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, server, query.ugi))
}

async fn handle_socket(socket: WebSocket, server: Arc<Server>, game_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let client = session::open(&server, game_id, tx);

    let writer_token = client.shutdown_token();
    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        if sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = writer_token.cancelled() => {
                    // Flush whatever teardown queued before closing.
                    rx.close();
                    while let Some(msg) = rx.recv().await {
                        if sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            }
        }
        let _ = sender.close().await;
    });

    let read_token = client.shutdown_token();
    loop {
        tokio::select! {
            _ = read_token.cancelled() => break,
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !ingest(&server, &client, text.as_bytes()) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    // An abnormal transport error still only costs this
                    // one connection.
                    warn!(id = %client.id(), error = %e, "websocket receive error");
                    break;
                }
            },
        }
    }

    session::close(&server, &client).await;
    let _ = (&mut writer).await;
    info!(id = %client.id(), "websocket disconnected");
}

/// Decodes and schema-checks one frame, then hands it to a fresh dispatch
/// task. Returns false when the connection must terminate.
fn ingest(server: &Arc<Server>, client: &Arc<Client>, raw: &[u8]) -> bool {
    let packet = match serde_json::from_slice::<SignalPacket>(raw) {
        Ok(packet) => packet.normalize(),
        Err(_) => {
            let _ = message::code(
                client,
                "VIOLATION",
                Some(Value::String("Packet decoding error".to_owned())),
                None,
                None,
            );
            return false;
        }
    };
    if packet.opcode.is_empty() {
        let _ = message::code(
            client,
            "VIOLATION",
            Some(Value::String("Missing required field: opcode".to_owned())),
            None,
            None,
        );
        return false;
    }

    tokio::spawn(dispatch(server.clone(), client.clone(), packet));
    true
}
