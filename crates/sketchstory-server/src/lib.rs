//! SketchStory WebSocket Relay Server
//!
//! Relays sync events between the participants of a shared drawing session.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "session": "session-id" }
//! { "type": "publish", "event": { "payload": { "type": "stroke", "path": { ... } }, "timestamp": 0, "author_id": "a", "seq": 1 } }
//! { "type": "leave" }
//! ```
//!
//! The server answers a join with `joined` (peer count plus the session's
//! stroke history), forwards every published event to the other peers as
//! `event`, and reports malformed input as `error`.

pub mod config;
pub mod state;

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use sketchstory_core::sync::protocol::{ClientMessage, ServerMessage};
use sketchstory_core::sync::{EventPayload, SyncEvent};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use config::{Cli, ServerConfig};
pub use state::AppState;

use state::RoomMessage;

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "SketchStory Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection session membership.
struct Membership {
    session: String,
    rx: broadcast::Receiver<RoomMessage>,
    /// Collaborator announced by this connection and not yet departed.
    announced: Option<String>,
}

impl Membership {
    /// Leave the session, telling the others if a collaborator was announced
    /// and never said goodbye.
    fn leave(self, state: &AppState, peer_id: &str) {
        if let Some(collaborator_id) = self.announced {
            let event = SyncEvent::left(collaborator_id, 0);
            state.broadcast(
                &self.session,
                peer_id,
                ServerMessage::Event {
                    session: self.session.clone(),
                    event,
                },
            );
        }
        state.leave_room(&self.session, peer_id);
        info!("Peer {} left session {}", peer_id, self.session);
    }
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode server message: {}", e);
            true
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut membership: Option<Membership> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                if !send(&mut sender, &err).await {
                                    break;
                                }
                                continue;
                            }
                        };

                        match client_msg {
                            ClientMessage::Join { session } => {
                                if let Some(old) = membership.take() {
                                    old.leave(&state, &peer_id);
                                }

                                let joined = state.join_room(&session, &peer_id);
                                let reply = ServerMessage::Joined {
                                    session: session.clone(),
                                    peer_count: joined.peer_count,
                                    history: joined.history,
                                };
                                membership = Some(Membership {
                                    session: session.clone(),
                                    rx: joined.rx,
                                    announced: None,
                                });
                                if !send(&mut sender, &reply).await {
                                    break;
                                }
                                info!("Peer {} joined session {}", peer_id, session);
                            }
                            ClientMessage::Leave => {
                                if let Some(old) = membership.take() {
                                    old.leave(&state, &peer_id);
                                }
                            }
                            ClientMessage::Publish { event } => {
                                let Some(current) = membership.as_mut() else {
                                    let err = ServerMessage::Error {
                                        message: "Not in a session".to_string(),
                                    };
                                    if !send(&mut sender, &err).await {
                                        break;
                                    }
                                    continue;
                                };

                                match &event.payload {
                                    EventPayload::Joined { collaborator } => {
                                        current.announced = Some(collaborator.id.clone());
                                    }
                                    EventPayload::Left { collaborator_id } => {
                                        if current.announced.as_deref() == Some(collaborator_id.as_str()) {
                                            current.announced = None;
                                        }
                                    }
                                    EventPayload::Stroke { .. } => {}
                                }

                                debug!("Peer {} published {:?} to {}", peer_id, event.kind(), current.session);
                                state.record(&current.session, &event);
                                state.broadcast(&current.session, &peer_id, ServerMessage::Event {
                                    session: current.session.clone(),
                                    event,
                                });
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary, ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Handle broadcast messages from the session
            msg = async {
                match &mut membership {
                    Some(current) => current.rx.recv().await,
                    None => {
                        // No session joined, just wait forever
                        std::future::pending::<Result<RoomMessage, broadcast::error::RecvError>>().await
                    }
                }
            } => {
                match msg {
                    Ok((from, server_msg)) => {
                        // Don't echo back to sender
                        if from != peer_id && !send(&mut sender, &server_msg).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Peer {} lagged behind, {} message(s) skipped", peer_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        membership = None;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(current) = membership.take() {
        current.leave(&state, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}
