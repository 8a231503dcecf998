//! Combat engine
//!
//! The rules-enforcing core: dice, the battle grid, action validation and
//! resolution, and turn/round orchestration. Everything here is synchronous
//! and operates on plain state; scheduling and locking live in `registry`.

pub mod action;
pub mod character;
pub mod combat;
pub mod dice;
pub mod grid;
pub mod npc;
pub mod rules;
pub mod state;

use thiserror::Error;

pub use action::{ActionKind, ActionRequest, ActionResult, TurnState};
pub use character::{AbilityScores, Attack, Character, Condition, DEFAULT_SPEED};
pub use dice::{DiceRoll, RandomSource, RollResult, Roller, SequenceSource};
pub use grid::{Grid, GridCell, Position, Reachable, Terrain, FEET_PER_SQUARE};
pub use npc::{golem, npc_action, GOLEM_NAME, NPC_OWNER_ID};
pub use state::{GameEvent, GameState, GameStatus};

/// Errors produced by the combat engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid dice expression: {0}")]
    InvalidExpression(String),

    #[error("position ({0}, {1}) is out of bounds")]
    OutOfBounds(u32, u32),

    #[error("position ({0}, {1}) is not an open cell")]
    CellOccupied(u32, u32),

    #[error("destination is not reachable with remaining movement")]
    Unreachable,

    #[error("game is not active")]
    GameNotActive,

    #[error("game has already started")]
    GameAlreadyActive,

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("principal action already used this turn")]
    ActionAlreadyUsed,

    #[error("target is out of range ({distance}ft, max {max}ft)")]
    TargetOutOfRange { distance: u32, max: u32 },

    #[error("no line of sight to target")]
    TargetNotVisible,

    #[error("target is already dead")]
    TargetDead,

    #[error("unknown target: {0}")]
    TargetUnknown(String),

    #[error("unknown weapon: {0}")]
    UnknownWeapon(String),

    #[error("character has no attacks")]
    NoAttacks,

    #[error("need at least two characters to start combat")]
    InsufficientPlayers,

    #[error("move action requires a target position")]
    MissingTargetPosition,

    #[error("attack action requires a target")]
    MissingTarget,

    #[error("character has no position on the grid")]
    NotPlaced,

    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("character not found: {0}")]
    CharacterNotFound(String),
}
