//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "4d6-2". All
//! randomness flows through an injected [`RandomSource`] so resolution is
//! reproducible for a fixed seed or a scripted sequence.

use std::collections::VecDeque;
use std::str::FromStr;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::EngineError;

/// A parsed dice roll specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// Number of dice to roll (>= 1)
    pub count: u32,
    /// Number of sides per die (>= 2)
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self { count, sides, modifier }
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        self.count as i32 + self.modifier
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        (self.count * self.sides) as i32 + self.modifier
    }
}

impl FromStr for DiceRoll {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

/// Parse dice notation of the form `<count>d<sides>[+|-<modifier>]`
pub fn parse_dice(notation: &str) -> Result<DiceRoll, EngineError> {
    let trimmed = notation.trim().to_lowercase();
    let invalid = || EngineError::InvalidExpression(notation.to_string());

    let d_pos = trimmed.find('d').ok_or_else(invalid)?;

    let count: u32 = trimmed[..d_pos].parse().map_err(|_| invalid())?;
    if count == 0 {
        return Err(invalid());
    }

    let rest = &trimmed[d_pos + 1..];

    // Split sides from an optional signed modifier
    let (sides_str, modifier) = if let Some(plus_pos) = rest.find('+') {
        let modifier: i32 = rest[plus_pos + 1..].parse().map_err(|_| invalid())?;
        (&rest[..plus_pos], modifier)
    } else if let Some(minus_pos) = rest.find('-') {
        // Keep the sign so "1d6-2" parses the modifier as -2
        let modifier: i32 = rest[minus_pos..].parse().map_err(|_| invalid())?;
        (&rest[..minus_pos], modifier)
    } else {
        (rest, 0)
    };

    let sides: u32 = sides_str.parse().map_err(|_| invalid())?;
    if sides < 2 {
        return Err(invalid());
    }

    Ok(DiceRoll { count, sides, modifier })
}

/// Outcome of rolling a dice expression
#[derive(Debug, Clone, Serialize)]
pub struct RollResult {
    /// The notation that was rolled
    pub notation: String,
    /// Individual die faces
    pub rolls: Vec<u32>,
    /// Flat modifier
    pub modifier: i32,
    /// Sum of faces plus modifier
    pub total: i32,
}

/// Source of die faces
///
/// The live implementation is [`RngSource`]; tests use [`SequenceSource`]
/// to script exact faces.
pub trait RandomSource: Send {
    /// Roll a single die, returning a face in 1..=sides
    fn die(&mut self, sides: u32) -> u32;
}

/// Randomness from an `StdRng`, optionally seeded
#[derive(Debug)]
pub struct RngSource {
    rng: StdRng,
}

impl RngSource {
    /// Create a source from OS entropy
    pub fn new() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }

    /// Create a seeded source for reproducible rolls
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for RngSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for RngSource {
    fn die(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides)
    }
}

/// A scripted source that replays a fixed sequence of faces, cycling when
/// exhausted. Test utility for deterministic resolution.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    script: Vec<u32>,
    pending: VecDeque<u32>,
}

impl SequenceSource {
    /// Create a source replaying the given faces
    pub fn new(faces: &[u32]) -> Self {
        Self {
            script: faces.to_vec(),
            pending: faces.iter().copied().collect(),
        }
    }
}

impl RandomSource for SequenceSource {
    fn die(&mut self, _sides: u32) -> u32 {
        if self.pending.is_empty() {
            self.pending = self.script.iter().copied().collect();
        }
        self.pending.pop_front().unwrap_or(1)
    }
}

/// Shared dice roller wrapping an injected randomness source
pub struct Roller {
    source: Mutex<Box<dyn RandomSource>>,
}

impl std::fmt::Debug for Roller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roller").finish()
    }
}

impl Roller {
    /// Create a roller from OS entropy
    pub fn new() -> Self {
        Self::with_source(Box::new(RngSource::new()))
    }

    /// Create a seeded roller for reproducible games
    pub fn seeded(seed: u64) -> Self {
        Self::with_source(Box::new(RngSource::seeded(seed)))
    }

    /// Create a roller from any randomness source
    pub fn with_source(source: Box<dyn RandomSource>) -> Self {
        Self { source: Mutex::new(source) }
    }

    /// Parse and roll a dice expression
    pub fn roll(&self, notation: &str) -> Result<RollResult, EngineError> {
        let spec: DiceRoll = notation.parse()?;
        let mut source = self.source.lock();

        let rolls: Vec<u32> = (0..spec.count).map(|_| source.die(spec.sides)).collect();
        let sum: u32 = rolls.iter().sum();

        Ok(RollResult {
            notation: spec.to_string(),
            rolls,
            modifier: spec.modifier,
            total: sum as i32 + spec.modifier,
        })
    }

    /// Roll a d20, optionally with advantage or disadvantage
    ///
    /// Advantage rolls two dice and keeps the higher, disadvantage keeps the
    /// lower. Both flags together cancel to a single straight roll.
    pub fn d20(&self, advantage: bool, disadvantage: bool) -> u32 {
        let mut source = self.source.lock();

        if advantage == disadvantage {
            return source.die(20);
        }

        let first = source.die(20);
        let second = source.die(20);
        if advantage {
            first.max(second)
        } else {
            first.min(second)
        }
    }
}

impl Default for Roller {
    fn default() -> Self {
        Self::new()
    }
}
