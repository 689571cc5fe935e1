//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaHandle, ArenaInput, CombatantId};
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("WebSocket send failed: {0}")]
    Send(#[from] axum::Error),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let id: CombatantId = Uuid::new_v4();
    info!(combatant_id = %id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before joining so the first update including us is not missed
    let update_rx = state.arena.subscribe();

    let welcome = ServerMsg::Welcome {
        id,
        server_time: unix_millis(),
        arena: state.arena_info.as_ref().clone(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(combatant_id = %id, error = %e, "Failed to send welcome");
        return;
    }

    state.sessions.register(id);
    if !state.arena.send(ArenaInput::Join { id }).await {
        error!(combatant_id = %id, "Arena is not running");
        state.sessions.unregister(&id);
        return;
    }

    run_session(id, ws_sink, ws_stream, state.arena.clone(), update_rx).await;

    // Cleanup on disconnect
    let _ = state.arena.send(ArenaInput::Leave { id }).await;
    let connected_ms = state.sessions.unregister(&id).unwrap_or(0);

    info!(combatant_id = %id, connected_ms, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    id: CombatantId,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    arena: ArenaHandle,
    update_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = SessionRateLimiter::new();

    // Replies meant only for this client (parse errors)
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMsg>(8);

    let writer_handle = tokio::spawn(write_loop(id, ws_sink, update_rx, reply_rx));

    // Reader loop: WebSocket -> arena
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(combatant_id = %id, "Rate limited input message");
                    continue;
                }

                match parse_client_frame(id, &text) {
                    Ok(input) => {
                        if !arena.send(input).await {
                            debug!(combatant_id = %id, "Arena input channel closed");
                            break;
                        }
                    }
                    Err(reply) => {
                        warn!(combatant_id = %id, "Failed to parse client message");
                        let _ = reply_tx.try_send(reply);
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(combatant_id = %id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(combatant_id = %id, "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(combatant_id = %id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(combatant_id = %id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Turn a text frame into an arena input, or the error reply owed to the sender
pub fn parse_client_frame(id: CombatantId, text: &str) -> Result<ArenaInput, ServerMsg> {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(ClientMsg::Shoot { angle, power }) => Ok(ArenaInput::Shoot { id, angle, power }),
        Err(e) => Err(ServerMsg::Error {
            code: "bad_message".to_string(),
            message: e.to_string(),
        }),
    }
}

/// Forward arena broadcasts and direct replies to the socket
async fn write_loop(
    id: CombatantId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut update_rx: broadcast::Receiver<ServerMsg>,
    mut reply_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            update = update_rx.recv() => match update {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        combatant_id = %id,
                        lagged_count = n,
                        "Client lagged, skipping {} updates", n
                    );
                    // Continue - don't disconnect for lag
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(combatant_id = %id, "Update channel closed");
                    break;
                }
            },
            Some(reply) = reply_rx.recv() => reply,
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(combatant_id = %id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), SessionError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
