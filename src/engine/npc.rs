//! Server-controlled NPCs
//!
//! NPCs are environment pieces: they carry the reserved owner id, never
//! count toward win evaluation, and act through `npc_action` when the
//! turn order reaches them.

use uuid::Uuid;

use super::action::ActionRequest;
use super::character::{AbilityScores, Attack, Character, Condition};
use super::grid::is_adjacent;
use super::state::GameState;

/// Reserved owner id for all server NPCs; no agent can register under it
pub const NPC_OWNER_ID: &str = "__npc__";

pub const GOLEM_NAME: &str = "GOLEM";

/// A stationary practice dummy
///
/// Tough enough to absorb a long fight (100 hp), trivially easy to hit
/// (AC 8), unable to move, and armed with a token Stone Fist it only
/// swings back with after being struck.
pub fn golem() -> Character {
    Character::new(
        &Uuid::new_v4().to_string(),
        GOLEM_NAME,
        NPC_OWNER_ID,
        100,
        8,
    )
    .with_npc()
    .with_speed(0)
    .with_scores(AbilityScores {
        strength: 18,
        dexterity: 6,
        constitution: 20,
        intelligence: 3,
        wisdom: 10,
        charisma: 1,
    })
    .with_attack(Attack {
        name: "Stone Fist".to_string(),
        attack_bonus: 6,
        // Minimal damage; the dice grammar bottoms out at d2
        damage_dice: "1d2".to_string(),
        damage_bonus: 0,
        damage_type: "bludgeoning".to_string(),
        reach: 5,
        range_normal: None,
        range_long: None,
    })
}

/// Decide what an NPC does on its turn
///
/// The GOLEM retaliates against the first adjacent living character if it
/// was provoked since its last turn, otherwise it passes. Each provocation
/// buys exactly one retaliation; the flag clears here either way.
pub fn npc_action(state: &mut GameState, npc_id: &str) -> ActionRequest {
    let Some(npc) = state.characters.get(npc_id) else {
        return ActionRequest::end_turn();
    };
    if npc.name != GOLEM_NAME || !npc.has_condition(Condition::Provoked) {
        return ActionRequest::end_turn();
    }

    let npc_position = npc.position;
    let target = state.characters.values().find(|c| {
        c.id != npc_id
            && c.is_alive
            && match (npc_position, c.position) {
                (Some(a), Some(b)) => is_adjacent(a, b),
                _ => false,
            }
    });
    let request = match target {
        Some(target) => ActionRequest::attack(&target.id),
        None => ActionRequest::end_turn(),
    };

    if let Some(npc) = state.characters.get_mut(npc_id) {
        npc.conditions.remove(&Condition::Provoked);
    }
    request
}
