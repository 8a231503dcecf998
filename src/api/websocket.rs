//! WebSocket handler for real-time game notifications
//!
//! Push-only transport: clients connect per game and receive turn starts,
//! resolved actions, and game-over notices as they happen. Client text
//! frames are treated as keep-alives.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use super::AppState;
use crate::engine::ActionResult;
use crate::registry::Notice;

/// A connected spectator or agent session
#[derive(Debug)]
pub struct GameSession {
    pub session_id: String,
    pub game_id: String,
    pub character_id: String,
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Connection manager for all active WebSocket connections
#[derive(Default)]
pub struct ConnectionManager {
    sessions: RwLock<HashMap<String, GameSession>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session
    pub async fn register(&self, session: GameSession) {
        let session_id = session.session_id.clone();
        self.sessions.write().await.insert(session_id, session);
    }

    /// Remove a session
    pub async fn unregister(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Broadcast a message to every session watching a game
    pub async fn broadcast_game(&self, game_id: &str, msg: ServerMessage) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            if session.game_id == game_id && session.sender.send(msg.clone()).await.is_err() {
                warn!(session_id = %session.session_id, "failed to deliver notification");
            }
        }
    }

    /// Number of sessions watching a game
    pub async fn session_count(&self, game_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.game_id == game_id)
            .count()
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Acknowledgement on connect
    #[serde(rename = "connected")]
    Connected {
        game_id: String,
        character_id: String,
    },
    /// A new turn has started
    #[serde(rename = "turn_start")]
    TurnStart {
        character_id: String,
        round_number: u32,
    },
    /// An action was resolved
    #[serde(rename = "action_result")]
    Action {
        character_id: String,
        #[serde(flatten)]
        result: ActionResult,
    },
    /// The game reached a terminal state
    #[serde(rename = "game_over")]
    GameOver { winner_id: Option<String> },
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        match notice {
            Notice::TurnStart {
                character_id,
                round_number,
                ..
            } => ServerMessage::TurnStart {
                character_id,
                round_number,
            },
            Notice::Action {
                character_id,
                result,
                ..
            } => ServerMessage::Action {
                character_id,
                result,
            },
            Notice::GameOver { winner_id, .. } => ServerMessage::GameOver { winner_id },
        }
    }
}

/// Forward registry notices to the sessions watching each game
pub async fn forward_notices(
    mut notices: broadcast::Receiver<Notice>,
    connections: std::sync::Arc<ConnectionManager>,
) {
    loop {
        match notices.recv().await {
            Ok(notice) => {
                let game_id = notice.game_id().to_string();
                connections
                    .broadcast_game(&game_id, ServerMessage::from(notice))
                    .await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "notice forwarder lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Connection query params
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub character_id: String,
}

/// Handle WebSocket upgrade for a game
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    if !state.registry.contains(&game_id).await {
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, game_id, params.character_id))
}

/// Handle an individual WebSocket connection
async fn handle_socket(
    mut socket: WebSocket,
    state: AppState,
    game_id: String,
    character_id: String,
) {
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);
    let session_id = uuid::Uuid::new_v4().to_string();

    info!(game_id = %game_id, character_id = %character_id, "WebSocket connected");

    state
        .connections
        .register(GameSession {
            session_id: session_id.clone(),
            game_id: game_id.clone(),
            character_id: character_id.clone(),
            sender: tx,
        })
        .await;

    let connected = ServerMessage::Connected {
        game_id: game_id.clone(),
        character_id,
    };
    if let Ok(json) = serde_json::to_string(&connected) {
        let _ = socket.send(Message::Text(json.into())).await;
    }

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    // Client frames are keep-alives only
                    Some(Ok(Message::Text(text))) => {
                        debug!(game_id = %game_id, "client frame: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.connections.unregister(&session_id).await;
    info!(game_id = %game_id, "WebSocket disconnected");
}
