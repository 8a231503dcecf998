//! Characters and their combat statistics

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::grid::{Position, FEET_PER_SQUARE};

/// Default movement speed in feet per turn
pub const DEFAULT_SPEED: u32 = 6 * FEET_PER_SQUARE;

/// The six core ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// A weapon or natural attack a character can make
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    /// e.g. "Longsword"
    pub name: String,
    /// Added to the d20 roll
    pub attack_bonus: i32,
    /// Damage expression, e.g. "1d8"
    pub damage_dice: String,
    /// Added to the damage roll
    pub damage_bonus: i32,
    /// e.g. "slashing"
    pub damage_type: String,
    /// Reach in feet (5 for melee)
    #[serde(default = "default_reach")]
    pub reach: u32,
    /// Normal range in feet for ranged weapons
    #[serde(default)]
    pub range_normal: Option<u32>,
    /// Long range in feet for ranged weapons
    #[serde(default)]
    pub range_long: Option<u32>,
}

fn default_reach() -> u32 {
    FEET_PER_SQUARE
}

impl Attack {
    /// Maximum distance in feet at which this attack may target a character
    pub fn max_range(&self) -> u32 {
        self.range_normal.unwrap_or(self.reach)
    }
}

/// Named per-turn conditions
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Incoming attack rolls have disadvantage until the character's next turn
    Dodging,
    /// Movement budget is doubled for this turn
    Dashing,
    /// Reserved: suppresses reactive-movement penalties
    Disengaging,
    /// An NPC has taken damage and will retaliate on its next turn
    Provoked,
}

impl Condition {
    /// Whether the condition expires at the start of the owner's next turn
    pub fn is_transient(&self) -> bool {
        matches!(self, Condition::Dodging | Condition::Dashing | Condition::Disengaging)
    }
}

/// A character on the battlefield
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    /// Unique identifier
    pub id: String,
    pub name: String,
    /// The agent that controls this character; win conditions are evaluated
    /// per owner
    pub owner_id: String,
    #[serde(default)]
    pub ability_scores: AbilityScores,
    pub max_hp: i32,
    pub current_hp: i32,
    pub armor_class: i32,
    /// Movement speed in feet per turn
    #[serde(default = "default_speed")]
    pub speed: u32,
    /// Grid position, unset before placement
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub initiative: i32,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    /// Server-controlled environment piece; excluded from win evaluation
    /// and resolved automatically on its turn
    #[serde(default)]
    pub is_npc: bool,
    #[serde(default)]
    pub conditions: BTreeSet<Condition>,
    /// Available attacks
    #[serde(default)]
    pub attacks: Vec<Attack>,
}

fn default_speed() -> u32 {
    DEFAULT_SPEED
}

fn default_true() -> bool {
    true
}

impl Character {
    /// Create a character with full health and no position
    pub fn new(id: &str, name: &str, owner_id: &str, max_hp: i32, armor_class: i32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            ability_scores: AbilityScores::default(),
            max_hp,
            current_hp: max_hp,
            armor_class,
            speed: DEFAULT_SPEED,
            position: None,
            initiative: 0,
            is_alive: true,
            is_npc: false,
            conditions: BTreeSet::new(),
            attacks: Vec::new(),
        }
    }

    pub fn with_npc(mut self) -> Self {
        self.is_npc = true;
        self
    }

    pub fn with_scores(mut self, scores: AbilityScores) -> Self {
        self.ability_scores = scores;
        self
    }

    pub fn with_attack(mut self, attack: Attack) -> Self {
        self.attacks.push(attack);
        self
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }

    /// Find an attack by name, case-insensitively
    pub fn find_attack(&self, name: &str) -> Option<&Attack> {
        self.attacks
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Drop conditions that expire at the start of this character's turn
    pub fn clear_transient_conditions(&mut self) {
        self.conditions.retain(|c| !c.is_transient());
    }
}
