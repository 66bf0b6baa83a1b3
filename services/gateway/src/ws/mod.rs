//! WebSocket transport: upgrade handling and the per-session pump.
//!
//! The route is layered behind `authenticate`, so every socket belongs
//! to a verified principal. Each session gets a send task (hub ->
//! socket) and a receive task (socket -> join/leave/ping protocol);
//! whichever finishes first tears the other down, and the hub
//! unregister in the common exit path guarantees membership cleanup
//! runs exactly once per connection.

pub mod hub;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::auth::Principal;
use crate::AppState;

use hub::RoomMessage;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Join { room: String },
    Leave { room: String },
    Ping,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

async fn handle_socket(socket: WebSocket, state: AppState, principal: Principal) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.hub.register(session_id.clone(), tx);

    tracing::info!(session = %session_id, user = %principal.id, "websocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                RoomMessage::Text(text) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                },
                RoomMessage::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                },
            }
        }
    });

    let recv_state = state.clone();
    let recv_session = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_client_message(&recv_state, &recv_session, text.as_str());
                },
                Message::Close(_) => break,
                _ => {},
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Single exit path for both pump tasks: leave_all + sender removal.
    state.hub.unregister(&session_id);
    tracing::info!(session = %session_id, "websocket disconnected");
}

fn handle_client_message(state: &AppState, session_id: &str, raw: &str) {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(raw) else {
        reply(
            state,
            session_id,
            json!({"type": "error", "message": "unrecognized message"}),
        );
        return;
    };

    match msg {
        ClientMessage::Join { room } => match state.hub.join(session_id, &room) {
            Ok(()) => reply(state, session_id, json!({"type": "joined", "room": room})),
            Err(err) => reply(
                state,
                session_id,
                json!({"type": "error", "code": err.error_code(), "room": room}),
            ),
        },
        ClientMessage::Leave { room } => {
            state.hub.leave(session_id, &room);
            reply(state, session_id, json!({"type": "left", "room": room}));
        },
        ClientMessage::Ping => {
            reply(
                state,
                session_id,
                json!({"type": "pong", "timestamp": chrono::Utc::now().to_rfc3339()}),
            );
        },
    }
}

fn reply(state: &AppState, session_id: &str, payload: serde_json::Value) {
    state
        .hub
        .send_to(session_id, RoomMessage::Text(payload.to_string()));
}
