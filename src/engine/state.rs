//! Game state tracking
//!
//! The full state of one game: lifecycle status, the grid, characters,
//! initiative order, turn/round bookkeeping, and the append-only event log.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::character::{Character, Condition};
use super::grid::{Grid, Position, Terrain};
use super::EngineError;

/// Lifecycle status of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Lobby, waiting for characters to join
    Waiting,
    /// Combat in progress
    Active,
    /// Game over (terminal)
    Completed,
}

/// A logged event, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub round: u32,
    pub character_id: String,
    pub action: String,
    pub description: String,
    /// Rolls, damage, movement paths, etc.
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// The full state of a game
///
/// Owned exclusively by the registry's per-game lock once created; mutated
/// only through the orchestrator in `engine::combat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    pub name: String,
    pub status: GameStatus,
    pub grid: Grid,
    pub characters: HashMap<String, Character>,
    /// Character ids in join order; initiative ties fall back to this
    pub join_order: Vec<String>,
    /// Fixed once combat starts, never re-sorted; membership never changes
    /// even as characters die
    pub initiative_order: Vec<String>,
    pub current_turn_index: usize,
    pub round_number: u32,
    /// Defined only while the game is active
    pub turn_deadline: Option<DateTime<Utc>>,
    pub event_log: Vec<GameEvent>,
    pub winner_id: Option<String>,
    /// Movement spent by the current actor this turn, in feet
    pub movement_used: u32,
    /// Whether the current actor has spent its principal action this turn
    pub action_used: bool,
}

impl GameState {
    /// Create an empty game in the waiting state
    pub fn new(game_id: &str, name: &str, width: u32, height: u32) -> Self {
        Self {
            game_id: game_id.to_string(),
            name: name.to_string(),
            status: GameStatus::Waiting,
            grid: Grid::new(width, height),
            characters: HashMap::new(),
            join_order: Vec::new(),
            initiative_order: Vec::new(),
            current_turn_index: 0,
            round_number: 1,
            turn_deadline: None,
            event_log: Vec::new(),
            winner_id: None,
            movement_used: 0,
            action_used: false,
        }
    }

    /// Get a character by id
    pub fn character(&self, character_id: &str) -> Result<&Character, EngineError> {
        self.characters
            .get(character_id)
            .ok_or_else(|| EngineError::CharacterNotFound(character_id.to_string()))
    }

    /// Get a character by id, mutably
    pub fn character_mut(&mut self, character_id: &str) -> Result<&mut Character, EngineError> {
        self.characters
            .get_mut(character_id)
            .ok_or_else(|| EngineError::CharacterNotFound(character_id.to_string()))
    }

    /// Id of the character whose turn it is, if the game is active
    pub fn current_character_id(&self) -> Option<&str> {
        if self.status != GameStatus::Active {
            return None;
        }
        self.initiative_order
            .get(self.current_turn_index)
            .map(String::as_str)
    }

    /// Movement budget for the current actor this turn, in feet
    ///
    /// Dashing doubles the budget for the turn it was taken.
    pub fn movement_budget(&self, character: &Character) -> u32 {
        if character.has_condition(Condition::Dashing) {
            character.speed * 2
        } else {
            character.speed
        }
    }

    /// Place a character on the grid and register it
    pub fn place_character(
        &mut self,
        mut character: Character,
        position: Position,
    ) -> Result<(), EngineError> {
        let cell = self
            .grid
            .cell(position)
            .ok_or(EngineError::OutOfBounds(position.x, position.y))?;
        if cell.occupant_id.is_some() || cell.terrain == Terrain::Wall {
            return Err(EngineError::CellOccupied(position.x, position.y));
        }

        character.position = Some(position);
        let id = character.id.clone();
        if let Some(cell) = self.grid.cell_mut(position) {
            cell.occupant_id = Some(id.clone());
        }
        self.join_order.push(id.clone());
        self.characters.insert(id, character);
        Ok(())
    }

    /// Move a character to a destination reachable within its remaining
    /// movement budget this turn
    ///
    /// Atomically swaps grid occupancy and updates the stored position.
    /// Returns the path taken, starting cell first.
    pub fn move_character(
        &mut self,
        character_id: &str,
        destination: Position,
    ) -> Result<Vec<Position>, EngineError> {
        let character = self.character(character_id)?;
        let start = character.position.ok_or(EngineError::NotPlaced)?;
        let budget = self.movement_budget(character);
        let remaining = budget.saturating_sub(self.movement_used);

        if !self.grid.in_bounds(destination) {
            return Err(EngineError::OutOfBounds(destination.x, destination.y));
        }

        let reachable = self.grid.valid_moves(start, remaining);
        let reach = reachable.get(&destination).ok_or(EngineError::Unreachable)?;
        let path = reach.path.clone();
        let cost = reach.cost;

        if let Some(cell) = self.grid.cell_mut(start) {
            cell.occupant_id = None;
        }
        if let Some(cell) = self.grid.cell_mut(destination) {
            cell.occupant_id = Some(character_id.to_string());
        }
        if let Some(character) = self.characters.get_mut(character_id) {
            character.position = Some(destination);
        }
        self.movement_used += cost;

        Ok(path)
    }

    /// Apply damage to a character, flooring health at zero and updating
    /// the liveness flag
    ///
    /// A surviving NPC is marked provoked so its AI retaliates on its next
    /// turn.
    pub fn apply_damage(&mut self, character_id: &str, damage: i32) -> Result<i32, EngineError> {
        let character = self.character_mut(character_id)?;
        character.current_hp = (character.current_hp - damage).max(0);
        if character.current_hp == 0 {
            character.is_alive = false;
        } else if character.is_npc {
            character.conditions.insert(Condition::Provoked);
        }
        Ok(character.current_hp)
    }

    /// Owners that still have at least one living character
    ///
    /// NPCs are part of the environment, not a team, and are excluded.
    pub fn living_owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self
            .characters
            .values()
            .filter(|c| c.is_alive && !c.is_npc)
            .map(|c| c.owner_id.clone())
            .collect();
        owners.sort();
        owners.dedup();
        owners
    }

    /// Append an event to the log
    pub fn log_event(&mut self, character_id: &str, action: &str, description: &str, details: serde_json::Value) {
        self.event_log.push(GameEvent {
            round: self.round_number,
            character_id: character_id.to_string(),
            action: action.to_string(),
            description: description.to_string(),
            details,
            timestamp: Utc::now(),
        });
    }
}
