//! Combat orchestration: turns, initiative, win conditions
//!
//! The turn/round state machine. Functions here take `&mut GameState` and a
//! `Roller`; all locking and scheduling is the registry's concern.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::{debug, info};

use super::action::{ActionKind, ActionRequest, ActionResult};
use super::character::{Character, Condition};
use super::dice::Roller;
use super::grid::Position;
use super::npc::npc_action;
use super::rules::{ability_modifier, resolve_attack, roll_initiative, validate_action};
use super::state::{GameState, GameStatus};
use super::EngineError;

/// Outcome of a processed action, for the caller to schedule around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The actor's turn continues
    Continued,
    /// The turn ended and play advanced to the next living character
    Advanced,
    /// The game reached a terminal state
    Completed,
}

/// Millisecond-precise deadline so sub-second timeouts survive intact
fn deadline_after(timeout: Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::milliseconds(timeout.as_millis() as i64)
}

/// Place a character in a waiting game
pub fn add_character(
    state: &mut GameState,
    character: Character,
    position: Position,
) -> Result<(), EngineError> {
    if state.status != GameStatus::Waiting {
        return Err(EngineError::GameAlreadyActive);
    }
    state.place_character(character, position)
}

/// Roll initiative for every character and begin combat
///
/// Orders descending by initiative total; ties break by higher dexterity
/// modifier, then by registration order. The resulting order is fixed for
/// the rest of the game.
pub fn start_combat(
    state: &mut GameState,
    roller: &Roller,
    turn_timeout: Duration,
) -> Result<Vec<String>, EngineError> {
    if state.status != GameStatus::Waiting {
        return Err(EngineError::GameAlreadyActive);
    }
    // NPCs roll initiative and take turns but cannot carry a game alone
    if state.characters.values().filter(|c| !c.is_npc).count() < 2 {
        return Err(EngineError::InsufficientPlayers);
    }

    // Roll in registration order so ties are deterministic
    let ids: Vec<String> = state.join_order.clone();
    for id in &ids {
        let initiative = {
            let character = state.character(id)?;
            roll_initiative(roller, character)
        };
        state.character_mut(id)?.initiative = initiative;
    }

    // Stable sort keeps registration order as the final tie-break
    let mut order = ids;
    order.sort_by_key(|id| {
        let c = &state.characters[id];
        (
            std::cmp::Reverse(c.initiative),
            std::cmp::Reverse(ability_modifier(c.ability_scores.dexterity)),
        )
    });

    state.initiative_order = order.clone();
    state.current_turn_index = 0;
    state.round_number = 1;
    state.winner_id = None;
    state.movement_used = 0;
    state.action_used = false;
    state.status = GameStatus::Active;
    state.turn_deadline = Some(deadline_after(turn_timeout));

    begin_turn(state);

    info!(game_id = %state.game_id, order = ?state.initiative_order, "combat started");

    // An NPC may have won the top of the order; its turn runs inline
    if let Some(npc_id) = state
        .current_character_id()
        .filter(|id| state.characters.get(*id).is_some_and(|c| c.is_npc))
        .map(str::to_string)
    {
        resolve_npc_turn(state, roller, &npc_id);
        advance_turn(state, roller, turn_timeout);
    }

    Ok(order)
}

/// Clear the new actor's expiring conditions and reset turn bookkeeping
fn begin_turn(state: &mut GameState) {
    state.movement_used = 0;
    state.action_used = false;
    if let Some(id) = state.current_character_id().map(str::to_string) {
        if let Some(character) = state.characters.get_mut(&id) {
            character.clear_transient_conditions();
        }
    }
}

/// Validate and resolve an action
///
/// Rejections return the error without mutating state. On success the
/// mutation is applied, an event is appended, the win condition is
/// evaluated, and the turn advances if the request ended it. A principal
/// action marks the turn's action as spent but does not end the turn;
/// movement may continue until `end_turn` or timeout.
pub fn process_action(
    state: &mut GameState,
    roller: &Roller,
    character_id: &str,
    request: &ActionRequest,
    turn_timeout: Duration,
) -> Result<(ActionResult, TurnOutcome), EngineError> {
    // Structural check first so unknown ids surface as boundary errors
    if state.status == GameStatus::Active {
        state.character(character_id)?;
    }

    validate_action(request, character_id, state)?;

    let name = state.character(character_id)?.name.clone();

    let result = match request.action {
        ActionKind::Move => {
            // Destination presence was validated; reachability is checked here
            let destination = request
                .target_position
                .ok_or(EngineError::MissingTargetPosition)?;
            let path = state.move_character(character_id, destination)?;
            ActionResult {
                movement_path: Some(path),
                ..ActionResult::ok(
                    ActionKind::Move,
                    format!("{} moves to {}.", name, destination),
                )
            }
        }
        ActionKind::Attack => {
            let target_id = request.target_id.as_deref().ok_or(EngineError::MissingTarget)?;
            let result = resolve_attack(
                roller,
                character_id,
                target_id,
                request.weapon_name.as_deref(),
                state,
            )?;
            state.action_used = true;
            result
        }
        ActionKind::Dodge => {
            state
                .character_mut(character_id)?
                .conditions
                .insert(Condition::Dodging);
            state.action_used = true;
            ActionResult::ok(
                ActionKind::Dodge,
                format!("{} takes the Dodge action. Attacks against them have disadvantage.", name),
            )
        }
        ActionKind::Dash => {
            let speed = state.character(character_id)?.speed;
            state
                .character_mut(character_id)?
                .conditions
                .insert(Condition::Dashing);
            state.action_used = true;
            ActionResult::ok(
                ActionKind::Dash,
                format!("{} takes the Dash action, gaining {}ft extra movement.", name, speed),
            )
        }
        ActionKind::Disengage => {
            state
                .character_mut(character_id)?
                .conditions
                .insert(Condition::Disengaging);
            state.action_used = true;
            ActionResult::ok(
                ActionKind::Disengage,
                format!("{} takes the Disengage action.", name),
            )
        }
        ActionKind::EndTurn => {
            ActionResult::ok(ActionKind::EndTurn, format!("{} ends their turn.", name))
        }
    };

    log_action(state, character_id, &result);

    // Win detection runs after every resolved action so a killing blow ends
    // the game immediately
    if let Some(outcome) = settle_win_condition(state) {
        return Ok((result, outcome));
    }

    let outcome = if request.action == ActionKind::EndTurn {
        advance_turn(state, roller, turn_timeout)
    } else {
        TurnOutcome::Continued
    };

    Ok((result, outcome))
}

fn log_action(state: &mut GameState, character_id: &str, result: &ActionResult) {
    let details = match result.action {
        ActionKind::Attack => json!({
            "attack_roll": result.attack_roll,
            "hit": result.hit,
            "damage_dealt": result.damage_dealt,
            "target_hp_remaining": result.target_hp_remaining,
        }),
        ActionKind::Move => json!({ "movement_path": result.movement_path }),
        _ => json!({}),
    };
    let action = result.action.to_string();
    state.log_event(character_id, &action, &result.description, details);
}

/// Move to the next living character in initiative order
///
/// Dead entries are skipped; wrapping past the end increments the round.
/// NPC turns are resolved inline without an agent request, so this keeps
/// advancing until a player holds the turn or the game completes.
pub fn advance_turn(state: &mut GameState, roller: &Roller, turn_timeout: Duration) -> TurnOutcome {
    let order_len = state.initiative_order.len();
    if order_len == 0 {
        return TurnOutcome::Advanced;
    }

    loop {
        for _ in 0..order_len {
            state.current_turn_index = (state.current_turn_index + 1) % order_len;
            if state.current_turn_index == 0 {
                state.round_number += 1;
            }
            let next_id = &state.initiative_order[state.current_turn_index];
            if state.characters.get(next_id).is_some_and(|c| c.is_alive) {
                break;
            }
        }

        begin_turn(state);
        state.turn_deadline = Some(deadline_after(turn_timeout));
        debug!(
            game_id = %state.game_id,
            turn_index = state.current_turn_index,
            round = state.round_number,
            "turn advanced"
        );

        let npc_id = match state.current_character_id() {
            Some(id) if state.characters.get(id).is_some_and(|c| c.is_npc) => id.to_string(),
            _ => return TurnOutcome::Advanced,
        };
        if resolve_npc_turn(state, roller, &npc_id) == TurnOutcome::Completed {
            return TurnOutcome::Completed;
        }
    }
}

/// Run an NPC's turn: ask its AI for one action, resolve it, and log it
fn resolve_npc_turn(state: &mut GameState, roller: &Roller, npc_id: &str) -> TurnOutcome {
    let request = npc_action(state, npc_id);
    let result = match (request.action, request.target_id.as_deref()) {
        (ActionKind::Attack, Some(target_id)) => {
            resolve_attack(roller, npc_id, target_id, None, state)
                .unwrap_or_else(|err| ActionResult::rejected(ActionKind::Attack, &err))
        }
        _ => {
            let name = state
                .characters
                .get(npc_id)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            ActionResult::ok(ActionKind::EndTurn, format!("{} ends their turn.", name))
        }
    };
    log_action(state, npc_id, &result);
    settle_win_condition(state).unwrap_or(TurnOutcome::Advanced)
}

/// Forfeit the current turn after its deadline passed
///
/// Synthesized by the scheduler, never requested by an agent. The event
/// carries a distinct narrative and a `forfeit` detail so a timeout is
/// never mistaken for a voluntary end of turn.
pub fn forfeit_turn(
    state: &mut GameState,
    roller: &Roller,
    turn_timeout: Duration,
) -> Result<(ActionResult, TurnOutcome), EngineError> {
    if state.status != GameStatus::Active {
        return Err(EngineError::GameNotActive);
    }
    let character_id = state
        .current_character_id()
        .map(str::to_string)
        .ok_or(EngineError::GameNotActive)?;
    let name = state.character(&character_id)?.name.clone();

    let result = ActionResult::ok(
        ActionKind::EndTurn,
        format!("{} ran out of time; their turn is forfeited.", name),
    );
    state.log_event(
        &character_id,
        "end_turn",
        &result.description,
        json!({ "forfeit": true }),
    );
    info!(game_id = %state.game_id, character_id = %character_id, "turn forfeited");

    let outcome = advance_turn(state, roller, turn_timeout);
    Ok((result, outcome))
}

/// The winning owner, if exactly one owner still has living characters
pub fn check_win_condition(state: &GameState) -> Option<String> {
    let owners = state.living_owners();
    if owners.len() == 1 {
        return owners.into_iter().next();
    }
    None
}

/// Evaluate the win condition and complete the game if it holds
///
/// Returns `Some(Completed)` when the game just ended: either one owner
/// remains (a winner) or none do (mutual destruction, no winner).
fn settle_win_condition(state: &mut GameState) -> Option<TurnOutcome> {
    let owners = state.living_owners();
    match owners.len() {
        0 => {
            state.winner_id = None;
            complete(state);
            Some(TurnOutcome::Completed)
        }
        1 => {
            state.winner_id = owners.into_iter().next();
            complete(state);
            Some(TurnOutcome::Completed)
        }
        _ => None,
    }
}

fn complete(state: &mut GameState) {
    state.status = GameStatus::Completed;
    state.turn_deadline = None;
    info!(game_id = %state.game_id, winner = ?state.winner_id, "game completed");
}
