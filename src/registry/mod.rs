//! Game registry
//!
//! Owns every live game and enforces single-writer-per-game discipline:
//! each game's state sits behind its own async mutex, action processing and
//! the turn-timeout timer contend for the same lock, and games are fully
//! independent of each other. Push notifications flow out through a
//! broadcast channel consumed by the transport layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::combat::{self, TurnOutcome};
use crate::engine::{
    ActionKind, ActionRequest, ActionResult, Character, EngineError, GameEvent, GameState,
    GameStatus, Position, Roller, TurnState,
};

/// Push notifications emitted by the registry
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Notice {
    /// A new turn has started
    #[serde(rename = "turn_start")]
    TurnStart {
        game_id: String,
        character_id: String,
        round_number: u32,
    },
    /// An action was resolved
    #[serde(rename = "action_result")]
    Action {
        game_id: String,
        character_id: String,
        #[serde(flatten)]
        result: ActionResult,
    },
    /// The game reached a terminal state
    #[serde(rename = "game_over")]
    GameOver {
        game_id: String,
        winner_id: Option<String>,
    },
}

impl Notice {
    pub fn game_id(&self) -> &str {
        match self {
            Notice::TurnStart { game_id, .. }
            | Notice::Action { game_id, .. }
            | Notice::GameOver { game_id, .. } => game_id,
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub turn_timeout: Duration,
    /// Seed for per-game dice, for reproducible runs
    pub rng_seed: Option<u64>,
    /// Place a practice-dummy golem at the grid center of every new game
    pub spawn_golem: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 20,
            turn_timeout: Duration::from_secs(30),
            rng_seed: None,
            spawn_golem: false,
        }
    }
}

/// One live game: its state behind the per-game lock, its dice, and its
/// turn-timeout timer
struct GameHandle {
    state: Mutex<GameState>,
    roller: Roller,
    /// Bumped whenever the timer is re-armed or cancelled; a sleeping timer
    /// task that wakes with a stale generation does nothing
    timer_generation: AtomicU64,
    timer_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Summary of a game for listing and metadata queries
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub game_id: String,
    pub name: String,
    pub status: GameStatus,
    pub round_number: u32,
    pub characters: Vec<CharacterSummary>,
    pub initiative_order: Vec<String>,
    pub winner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterSummary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub position: Option<Position>,
    pub is_alive: bool,
}

/// Registry of all live games
pub struct GameRegistry {
    games: RwLock<HashMap<String, Arc<GameHandle>>>,
    config: RegistryConfig,
    notices: broadcast::Sender<Notice>,
}

impl GameRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        let (notices, _) = broadcast::channel(256);
        Self {
            games: RwLock::new(HashMap::new()),
            config,
            notices,
        }
    }

    /// Create a shared instance
    pub fn shared(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Subscribe to push notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    fn notify(&self, notice: Notice) {
        // Receivers are optional; dropping notices with no subscribers is fine
        let _ = self.notices.send(notice);
    }

    async fn handle(&self, game_id: &str) -> Result<Arc<GameHandle>, EngineError> {
        self.games
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or_else(|| EngineError::GameNotFound(game_id.to_string()))
    }

    /// Create a new game in the waiting state, returning its id
    pub async fn create_game(&self, name: &str) -> String {
        let game_id = uuid::Uuid::new_v4().to_string();
        let mut state =
            GameState::new(&game_id, name, self.config.grid_width, self.config.grid_height);
        if self.config.spawn_golem {
            // The grid is empty at creation, so the center is always free
            let center = Position::new(self.config.grid_width / 2, self.config.grid_height / 2);
            if let Err(e) = state.place_character(crate::engine::golem(), center) {
                warn!(game_id = %game_id, error = %e, "golem spawn failed");
            }
        }
        let roller = match self.config.rng_seed {
            Some(seed) => Roller::seeded(seed),
            None => Roller::new(),
        };
        let handle = Arc::new(GameHandle {
            state: Mutex::new(state),
            roller,
            timer_generation: AtomicU64::new(0),
            timer_task: parking_lot::Mutex::new(None),
        });
        self.games.write().await.insert(game_id.clone(), handle);
        info!(game_id = %game_id, name = %name, "game created");
        game_id
    }

    /// Place a character in a waiting game
    pub async fn add_character(
        &self,
        game_id: &str,
        character: Character,
        position: Position,
    ) -> Result<String, EngineError> {
        let handle = self.handle(game_id).await?;
        let mut state = handle.state.lock().await;
        let character_id = character.id.clone();
        combat::add_character(&mut state, character, position)?;
        info!(game_id = %game_id, character_id = %character_id, "character joined");
        Ok(character_id)
    }

    /// Start combat, fixing the initiative order and arming the first timer
    pub async fn start_combat(
        self: &Arc<Self>,
        game_id: &str,
    ) -> Result<Vec<String>, EngineError> {
        let handle = self.handle(game_id).await?;
        let mut state = handle.state.lock().await;
        let order = combat::start_combat(&mut state, &handle.roller, self.config.turn_timeout)?;

        if let Some(actor) = state.current_character_id() {
            self.notify(Notice::TurnStart {
                game_id: game_id.to_string(),
                character_id: actor.to_string(),
                round_number: state.round_number,
            });
        }
        if let Some(deadline) = state.turn_deadline {
            self.arm_turn_timer(game_id, &handle, deadline);
        }
        Ok(order)
    }

    /// Validate, resolve, and apply an action for a character
    ///
    /// Serialized per game: the state lock is held across validation and
    /// mutation, so the timer can never interleave with an in-flight action.
    pub async fn submit_action(
        self: &Arc<Self>,
        game_id: &str,
        character_id: &str,
        request: &ActionRequest,
    ) -> Result<ActionResult, EngineError> {
        let handle = self.handle(game_id).await?;
        let mut state = handle.state.lock().await;
        let (result, outcome) = combat::process_action(
            &mut state,
            &handle.roller,
            character_id,
            request,
            self.config.turn_timeout,
        )?;

        self.notify(Notice::Action {
            game_id: game_id.to_string(),
            character_id: character_id.to_string(),
            result: result.clone(),
        });
        self.settle_outcome(game_id, &handle, &state, outcome);
        Ok(result)
    }

    /// Emit turn/game-over notices and manage the timer after an action
    fn settle_outcome(
        self: &Arc<Self>,
        game_id: &str,
        handle: &Arc<GameHandle>,
        state: &GameState,
        outcome: TurnOutcome,
    ) {
        match outcome {
            TurnOutcome::Continued => {}
            TurnOutcome::Advanced => {
                if let Some(actor) = state.current_character_id() {
                    self.notify(Notice::TurnStart {
                        game_id: game_id.to_string(),
                        character_id: actor.to_string(),
                        round_number: state.round_number,
                    });
                }
                if let Some(deadline) = state.turn_deadline {
                    self.arm_turn_timer(game_id, handle, deadline);
                }
            }
            TurnOutcome::Completed => {
                self.cancel_turn_timer(handle);
                self.notify(Notice::GameOver {
                    game_id: game_id.to_string(),
                    winner_id: state.winner_id.clone(),
                });
            }
        }
    }

    /// Arm (or re-arm) the per-game turn timer for a deadline
    ///
    /// The timer task sleeps to the deadline, then takes the same game lock
    /// as action processing and forfeits the current turn if nothing has
    /// re-armed the timer in the meantime.
    fn arm_turn_timer(
        self: &Arc<Self>,
        game_id: &str,
        handle: &Arc<GameHandle>,
        deadline: DateTime<Utc>,
    ) {
        let generation = handle.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let registry = Arc::clone(self);
        let game_id = game_id.to_string();
        let handle_clone = Arc::clone(handle);

        let task = tokio::spawn(async move {
            let wait = (deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            registry
                .force_end_turn(&game_id, &handle_clone, generation)
                .await;
        });

        let mut slot = handle.timer_task.lock();
        if let Some(old) = slot.replace(task) {
            old.abort();
        }
    }

    fn cancel_turn_timer(&self, handle: &Arc<GameHandle>) {
        handle.timer_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = handle.timer_task.lock().take() {
            task.abort();
        }
    }

    /// Forfeit the current turn after a timeout
    async fn force_end_turn(
        self: &Arc<Self>,
        game_id: &str,
        handle: &Arc<GameHandle>,
        generation: u64,
    ) {
        let mut state = handle.state.lock().await;

        // A re-arm or cancellation since this timer was set makes it stale
        if handle.timer_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if state.status != GameStatus::Active {
            return;
        }
        let Some(actor) = state.current_character_id().map(str::to_string) else {
            return;
        };

        warn!(game_id = %game_id, character_id = %actor, "turn timed out, forfeiting");
        match combat::forfeit_turn(&mut state, &handle.roller, self.config.turn_timeout) {
            Ok((result, outcome)) => {
                self.notify(Notice::Action {
                    game_id: game_id.to_string(),
                    character_id: actor,
                    result,
                });
                self.settle_outcome(game_id, handle, &state, outcome);
            }
            Err(e) => {
                debug!(game_id = %game_id, error = %e, "forfeit skipped");
            }
        }
    }

    /// Consistent snapshot of a game's turn state for one character
    pub async fn turn_state(
        &self,
        game_id: &str,
        character_id: &str,
    ) -> Result<TurnState, EngineError> {
        let handle = self.handle(game_id).await?;
        let state = handle.state.lock().await;
        let character = state.character(character_id)?.clone();

        let visible: Vec<Character> = state
            .characters
            .values()
            .filter(|c| c.id != character_id)
            .cloned()
            .collect();

        let is_your_turn = state.current_character_id() == Some(character_id);
        let available_actions = if !character.is_alive {
            vec![ActionKind::EndTurn]
        } else if is_your_turn && state.action_used {
            vec![ActionKind::Move, ActionKind::EndTurn]
        } else {
            vec![
                ActionKind::Move,
                ActionKind::Attack,
                ActionKind::Dodge,
                ActionKind::Dash,
                ActionKind::Disengage,
                ActionKind::EndTurn,
            ]
        };

        Ok(TurnState {
            game_id: game_id.to_string(),
            round_number: state.round_number,
            is_your_turn,
            your_character: character,
            visible_characters: visible,
            available_actions,
            turn_deadline: state.turn_deadline,
        })
    }

    /// The ordered event log of a game
    pub async fn game_log(&self, game_id: &str) -> Result<Vec<GameEvent>, EngineError> {
        let handle = self.handle(game_id).await?;
        let state = handle.state.lock().await;
        Ok(state.event_log.clone())
    }

    /// Game metadata and character roster
    pub async fn game_summary(&self, game_id: &str) -> Result<GameSummary, EngineError> {
        let handle = self.handle(game_id).await?;
        let state = handle.state.lock().await;

        let characters: Vec<CharacterSummary> = state
            .join_order
            .iter()
            .filter_map(|id| state.characters.get(id))
            .map(|c| CharacterSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                owner_id: c.owner_id.clone(),
                current_hp: c.current_hp,
                max_hp: c.max_hp,
                position: c.position,
                is_alive: c.is_alive,
            })
            .collect();

        Ok(GameSummary {
            game_id: state.game_id.clone(),
            name: state.name.clone(),
            status: state.status,
            round_number: state.round_number,
            characters,
            initiative_order: state.initiative_order.clone(),
            winner_id: state.winner_id.clone(),
        })
    }

    /// Whether a game exists
    pub async fn contains(&self, game_id: &str) -> bool {
        self.games.read().await.contains_key(game_id)
    }

    /// Number of live games
    pub async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }
}
