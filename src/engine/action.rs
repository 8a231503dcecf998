//! Action requests and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::grid::Position;
use super::EngineError;

/// Kinds of action an agent can take on its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Attack,
    Dodge,
    /// Double movement for this turn
    Dash,
    /// Reserved: move without reactive penalties
    Disengage,
    EndTurn,
}

impl ActionKind {
    /// Whether this spends the character's one principal action per turn
    pub fn is_principal(&self) -> bool {
        matches!(
            self,
            ActionKind::Attack | ActionKind::Dodge | ActionKind::Dash | ActionKind::Disengage
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::Move => "move",
            ActionKind::Attack => "attack",
            ActionKind::Dodge => "dodge",
            ActionKind::Dash => "dash",
            ActionKind::Disengage => "disengage",
            ActionKind::EndTurn => "end_turn",
        };
        write!(f, "{}", s)
    }
}

/// An agent's requested action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: ActionKind,
    /// Target character for attacks
    #[serde(default)]
    pub target_id: Option<String>,
    /// Destination for movement
    #[serde(default)]
    pub target_position: Option<Position>,
    /// Weapon selection for attacks; defaults to the first attack
    #[serde(default)]
    pub weapon_name: Option<String>,
}

impl ActionRequest {
    pub fn end_turn() -> Self {
        Self {
            action: ActionKind::EndTurn,
            target_id: None,
            target_position: None,
            weapon_name: None,
        }
    }

    pub fn movement(to: Position) -> Self {
        Self {
            action: ActionKind::Move,
            target_id: None,
            target_position: Some(to),
            weapon_name: None,
        }
    }

    pub fn attack(target_id: &str) -> Self {
        Self {
            action: ActionKind::Attack,
            target_id: Some(target_id.to_string()),
            target_position: None,
            weapon_name: None,
        }
    }

    pub fn simple(action: ActionKind) -> Self {
        Self {
            action,
            target_id: None,
            target_position: None,
            weapon_name: None,
        }
    }
}

/// The engine's response after processing an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action: ActionKind,
    /// Human-readable narrative
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_roll: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_dealt: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_hp_remaining: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_path: Option<Vec<Position>>,
    /// Set when the action was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    /// A successful result with a narrative only
    pub fn ok(action: ActionKind, description: String) -> Self {
        Self {
            success: true,
            action,
            description,
            attack_roll: None,
            hit: None,
            damage_dealt: None,
            target_hp_remaining: None,
            movement_path: None,
            error: None,
        }
    }

    /// A failed result carrying the rejection reason; no state was mutated
    pub fn rejected(action: ActionKind, error: &EngineError) -> Self {
        Self {
            success: false,
            action,
            description: error.to_string(),
            attack_roll: None,
            hit: None,
            damage_dealt: None,
            target_hp_remaining: None,
            movement_path: None,
            error: Some(error.to_string()),
        }
    }
}

/// What an agent sees when querying its turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    pub game_id: String,
    pub round_number: u32,
    pub is_your_turn: bool,
    pub your_character: Character,
    /// All other characters; no fog of war in this phase
    pub visible_characters: Vec<Character>,
    pub available_actions: Vec<ActionKind>,
    pub turn_deadline: Option<DateTime<Utc>>,
}
