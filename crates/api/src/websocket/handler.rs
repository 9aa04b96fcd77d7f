//! WebSocket handler for Axum
//!
//! Upgrades the connection, runs the socket loop, and routes inbound events
//! to the lifecycle manager. Connections start anonymous; agent consoles
//! identify themselves with an `agent:join` event.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use trailtalk_shared::{ClientEvent, ServerEvent};

use crate::state::AppState;

use super::connection::Connection;
use super::lifecycle::SessionLifecycle;

/// WebSocket handler - upgrades HTTP connection to WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Channel for queueing events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = Arc::new(Connection::new(tx));
    let connection_id = conn.connection_id;

    tracing::info!(connection_id = %connection_id, "websocket connection opened");

    let _ = conn.send(ServerEvent::Connected { connection_id });

    // Drain queued events onto the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        break; // connection closed
                    }
                }
                Err(err) => {
                    tracing::error!(error = ?err, "failed to serialize event");
                }
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    dispatch(event, &conn, &state.lifecycle).await;
                }
                Err(err) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        error = ?err,
                        "failed to parse client event"
                    );
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Message::Close(_) => {
                tracing::info!(connection_id = %connection_id, "close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum answers pings automatically
            }
            _ => {} // ignore binary frames
        }
    }

    tracing::info!(connection_id = %connection_id, "websocket connection closing");
    state.lifecycle.handle_disconnect(&conn).await;
    send_task.abort();
}

/// Route one inbound event to its lifecycle handler.
async fn dispatch(event: ClientEvent, conn: &Arc<Connection>, lifecycle: &SessionLifecycle) {
    use ClientEvent::*;

    match event {
        AgentJoin {
            agent_id,
            name,
            email,
        } => lifecycle.agent_join(conn, agent_id, name, email).await,

        StartSession {
            user_id,
            user_name,
            user_email,
        } => {
            lifecycle
                .start_session(conn, user_id, user_name, user_email)
                .await
        }

        AcceptSession { session_id } => lifecycle.accept_session(conn, session_id).await,

        SendMessage {
            session_id,
            message,
            sender_type,
            sender_name,
        } => {
            lifecycle
                .send_message(conn, session_id, message, sender_type, sender_name)
                .await
        }

        TypingStart { session_id, name } => {
            lifecycle.set_typing(conn, session_id, name, true).await
        }

        TypingStop { session_id, name } => {
            lifecycle.set_typing(conn, session_id, name, false).await
        }

        CloseSession { session_id } => lifecycle.close_session(conn, session_id).await,
    }
}
