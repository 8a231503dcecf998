//! Combat rules: action validation and attack resolution
//!
//! Validation is pure and never mutates state; resolution mutates only
//! after validation succeeds. The two phases are never interleaved.

use super::action::{ActionKind, ActionRequest, ActionResult};
use super::character::{Attack, Character, Condition};
use super::dice::Roller;
use super::grid::distance;
use super::state::{GameState, GameStatus};
use super::EngineError;

/// Ability modifier from a score: floor((score - 10) / 2)
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Roll initiative for a character: d20 + dexterity modifier
pub fn roll_initiative(roller: &Roller, character: &Character) -> i32 {
    let dex_mod = ability_modifier(character.ability_scores.dexterity);
    roller.d20(false, false) as i32 + dex_mod
}

/// Resolve the weapon an attack request refers to
pub fn select_weapon<'a>(
    character: &'a Character,
    weapon_name: Option<&str>,
) -> Result<&'a Attack, EngineError> {
    match weapon_name {
        Some(name) => character
            .find_attack(name)
            .ok_or_else(|| EngineError::UnknownWeapon(name.to_string())),
        None => character.attacks.first().ok_or(EngineError::NoAttacks),
    }
}

/// Check whether an action is legal for the given character
///
/// Pure: returns `Ok(())` or the rejection reason, with no mutation. A
/// rejected request is safe to retry after correction.
pub fn validate_action(
    request: &ActionRequest,
    character_id: &str,
    state: &GameState,
) -> Result<(), EngineError> {
    if state.status != GameStatus::Active {
        return Err(EngineError::GameNotActive);
    }

    if state.current_character_id() != Some(character_id) {
        return Err(EngineError::NotYourTurn);
    }

    let character = state.character(character_id)?;
    let position = character.position.ok_or(EngineError::NotPlaced)?;

    if request.action.is_principal() && state.action_used {
        return Err(EngineError::ActionAlreadyUsed);
    }

    match request.action {
        ActionKind::EndTurn | ActionKind::Dodge | ActionKind::Dash | ActionKind::Disengage => {
            Ok(())
        }
        ActionKind::Move => {
            if request.target_position.is_none() {
                return Err(EngineError::MissingTargetPosition);
            }
            Ok(())
        }
        ActionKind::Attack => {
            let target_id = request.target_id.as_deref().ok_or(EngineError::MissingTarget)?;
            let target = state
                .characters
                .get(target_id)
                .ok_or_else(|| EngineError::TargetUnknown(target_id.to_string()))?;
            if !target.is_alive {
                return Err(EngineError::TargetDead);
            }
            let target_position = target.position.ok_or(EngineError::NotPlaced)?;

            let weapon = select_weapon(character, request.weapon_name.as_deref())?;

            let dist = distance(position, target_position);
            let max = weapon.max_range();
            if dist > max {
                return Err(EngineError::TargetOutOfRange { distance: dist, max });
            }

            if !state.grid.line_of_sight(position, target_position) {
                return Err(EngineError::TargetNotVisible);
            }

            Ok(())
        }
    }
}

/// Advantage/disadvantage on an attack roll from the combatants' conditions
///
/// Dodging targets impose disadvantage on incoming attacks. No condition in
/// the current rule set grants advantage; the hook is wired through so the
/// d20 roll handles cancellation uniformly.
fn attack_modifiers(_attacker: &Character, target: &Character) -> (bool, bool) {
    let advantage = false;
    let disadvantage = target.has_condition(Condition::Dodging);
    (advantage, disadvantage)
}

/// Resolve an attack: roll to hit, roll damage on a hit, apply damage
///
/// Call only after `validate_action` has succeeded.
pub fn resolve_attack(
    roller: &Roller,
    attacker_id: &str,
    target_id: &str,
    weapon_name: Option<&str>,
    state: &mut GameState,
) -> Result<ActionResult, EngineError> {
    let attacker = state.character(attacker_id)?;
    let target = state.character(target_id)?;

    let attacker_name = attacker.name.clone();
    let target_name = target.name.clone();
    let target_ac = target.armor_class;

    let weapon = select_weapon(attacker, weapon_name)?.clone();
    let (advantage, disadvantage) = attack_modifiers(attacker, target);

    let attack_roll = roller.d20(advantage, disadvantage) as i32;
    let total_attack = attack_roll + weapon.attack_bonus;
    let hit = total_attack >= target_ac;

    if !hit {
        let description = format!(
            "{} attacks {} with {}! Roll: {}+{}={} vs AC {} -- MISS!",
            attacker_name,
            target_name,
            weapon.name,
            attack_roll,
            weapon.attack_bonus,
            total_attack,
            target_ac,
        );
        let target_hp = state.character(target_id)?.current_hp;
        return Ok(ActionResult {
            attack_roll: Some(total_attack),
            hit: Some(false),
            damage_dealt: Some(0),
            target_hp_remaining: Some(target_hp),
            ..ActionResult::ok(ActionKind::Attack, description)
        });
    }

    let damage_roll = roller.roll(&weapon.damage_dice)?;
    let total_damage = (damage_roll.total + weapon.damage_bonus).max(0);
    let remaining_hp = state.apply_damage(target_id, total_damage)?;
    let slain = !state.character(target_id)?.is_alive;

    let mut description = format!(
        "{} attacks {} with {}! Roll: {}+{}={} vs AC {} -- HIT! \
         Damage: {}+{}={} {}. {} has {} HP remaining.",
        attacker_name,
        target_name,
        weapon.name,
        attack_roll,
        weapon.attack_bonus,
        total_attack,
        target_ac,
        damage_roll.total,
        weapon.damage_bonus,
        total_damage,
        weapon.damage_type,
        target_name,
        remaining_hp,
    );
    if slain {
        description.push_str(&format!(" {} has been slain!", target_name));
    }

    Ok(ActionResult {
        attack_roll: Some(total_attack),
        hit: Some(true),
        damage_dealt: Some(total_damage),
        target_hp_remaining: Some(remaining_hp),
        ..ActionResult::ok(ActionKind::Attack, description)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dice::SequenceSource;
    use crate::engine::grid::{Position, Terrain};
    use crate::engine::AbilityScores;

    fn scripted(faces: &[u32]) -> Roller {
        Roller::with_source(Box::new(SequenceSource::new(faces)))
    }

    fn sword() -> Attack {
        Attack {
            name: "Longsword".into(),
            attack_bonus: 5,
            damage_dice: "1d8".into(),
            damage_bonus: 3,
            damage_type: "slashing".into(),
            reach: 5,
            range_normal: None,
            range_long: None,
        }
    }

    fn bow() -> Attack {
        Attack {
            name: "Shortbow".into(),
            attack_bonus: 4,
            damage_dice: "1d6".into(),
            damage_bonus: 2,
            damage_type: "piercing".into(),
            reach: 5,
            range_normal: Some(80),
            range_long: Some(320),
        }
    }

    fn arena() -> GameState {
        let mut state = GameState::new("g1", "Arena", 20, 20);
        state
            .place_character(
                Character::new("a", "Brynn", "o1", 20, 15).with_attack(sword()).with_attack(bow()),
                Position::new(0, 0),
            )
            .unwrap();
        state
            .place_character(
                Character::new("b", "Kara", "o2", 20, 15).with_attack(sword()),
                Position::new(1, 0),
            )
            .unwrap();
        state.status = GameStatus::Active;
        state.initiative_order = vec!["a".into(), "b".into()];
        state.current_turn_index = 0;
        state
    }

    #[test]
    fn test_ability_modifier() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(16), 3);
        assert_eq!(ability_modifier(15), 2);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(7), -2);
        assert_eq!(ability_modifier(1), -5);
        assert_eq!(ability_modifier(30), 10);
    }

    #[test]
    fn test_roll_initiative_adds_dex_modifier() {
        let roller = scripted(&[13]);
        let character = Character::new("a", "Brynn", "o1", 20, 15).with_scores(AbilityScores {
            dexterity: 16,
            ..AbilityScores::default()
        });
        assert_eq!(roll_initiative(&roller, &character), 16);
    }

    #[test]
    fn test_validate_requires_active_game() {
        let mut state = arena();
        state.status = GameStatus::Waiting;
        let err = validate_action(&ActionRequest::end_turn(), "a", &state).unwrap_err();
        assert_eq!(err, EngineError::GameNotActive);

        state.status = GameStatus::Completed;
        let err = validate_action(&ActionRequest::end_turn(), "a", &state).unwrap_err();
        assert_eq!(err, EngineError::GameNotActive);
    }

    #[test]
    fn test_validate_rejects_out_of_turn() {
        let state = arena();
        let err = validate_action(&ActionRequest::end_turn(), "b", &state).unwrap_err();
        assert_eq!(err, EngineError::NotYourTurn);
    }

    #[test]
    fn test_validate_rejects_second_principal_action() {
        let mut state = arena();
        state.action_used = true;
        let err = validate_action(&ActionRequest::simple(ActionKind::Dodge), "a", &state).unwrap_err();
        assert_eq!(err, EngineError::ActionAlreadyUsed);

        // Movement and end-turn are still allowed
        validate_action(&ActionRequest::movement(Position::new(1, 1)), "a", &state).unwrap();
        validate_action(&ActionRequest::end_turn(), "a", &state).unwrap();
    }

    #[test]
    fn test_validate_attack_target_checks() {
        let mut state = arena();

        let err = validate_action(&ActionRequest::attack("ghost"), "a", &state).unwrap_err();
        assert_eq!(err, EngineError::TargetUnknown("ghost".into()));

        state.apply_damage("b", 99).unwrap();
        let err = validate_action(&ActionRequest::attack("b"), "a", &state).unwrap_err();
        assert_eq!(err, EngineError::TargetDead);
    }

    #[test]
    fn test_validate_attack_out_of_reach() {
        let mut state = arena();
        // Move the target well beyond melee reach
        state.grid.cell_mut(Position::new(1, 0)).unwrap().occupant_id = None;
        state.characters.get_mut("b").unwrap().position = Some(Position::new(10, 0));
        state.grid.cell_mut(Position::new(10, 0)).unwrap().occupant_id = Some("b".into());

        let mut request = ActionRequest::attack("b");
        request.weapon_name = Some("Longsword".into());
        let err = validate_action(&request, "a", &state).unwrap_err();
        assert_eq!(err, EngineError::TargetOutOfRange { distance: 50, max: 5 });

        // The bow reaches 80ft
        request.weapon_name = Some("Shortbow".into());
        validate_action(&request, "a", &state).unwrap();
    }

    #[test]
    fn test_validate_attack_needs_line_of_sight() {
        let mut state = arena();
        state.grid.cell_mut(Position::new(1, 0)).unwrap().occupant_id = None;
        state.characters.get_mut("b").unwrap().position = Some(Position::new(4, 0));
        state.grid.cell_mut(Position::new(4, 0)).unwrap().occupant_id = Some("b".into());
        state.grid.set_terrain(Position::new(2, 0), Terrain::Wall).unwrap();

        let mut request = ActionRequest::attack("b");
        request.weapon_name = Some("Shortbow".into());
        let err = validate_action(&request, "a", &state).unwrap_err();
        assert_eq!(err, EngineError::TargetNotVisible);
    }

    #[test]
    fn test_validate_unknown_weapon() {
        let state = arena();
        let mut request = ActionRequest::attack("b");
        request.weapon_name = Some("Halberd".into());
        let err = validate_action(&request, "a", &state).unwrap_err();
        assert_eq!(err, EngineError::UnknownWeapon("Halberd".into()));
    }

    #[test]
    fn test_resolve_attack_hit_math() {
        // d20 = 12, +5 = 17 vs AC 15: hit. Damage die 6, +3 = 9.
        let roller = scripted(&[12, 6]);
        let mut state = arena();

        let result = resolve_attack(&roller, "a", "b", Some("Longsword"), &mut state).unwrap();
        assert!(result.success);
        assert_eq!(result.attack_roll, Some(17));
        assert_eq!(result.hit, Some(true));
        assert_eq!(result.damage_dealt, Some(9));
        assert_eq!(result.target_hp_remaining, Some(11));
        assert_eq!(state.character("b").unwrap().current_hp, 11);
    }

    #[test]
    fn test_resolve_attack_miss_deals_no_damage() {
        // d20 = 9, +5 = 14 vs AC 15: miss.
        let roller = scripted(&[9]);
        let mut state = arena();

        let result = resolve_attack(&roller, "a", "b", Some("Longsword"), &mut state).unwrap();
        assert_eq!(result.hit, Some(false));
        assert_eq!(result.damage_dealt, Some(0));
        assert_eq!(state.character("b").unwrap().current_hp, 20);
    }

    #[test]
    fn test_resolve_attack_hit_on_exact_ac() {
        // d20 = 10, +5 = 15 vs AC 15: meets it, beats it.
        let roller = scripted(&[10, 1]);
        let mut state = arena();

        let result = resolve_attack(&roller, "a", "b", Some("Longsword"), &mut state).unwrap();
        assert_eq!(result.hit, Some(true));
    }

    #[test]
    fn test_resolve_attack_kills_at_zero() {
        let roller = scripted(&[20, 8]);
        let mut state = arena();
        state.characters.get_mut("b").unwrap().current_hp = 5;

        let result = resolve_attack(&roller, "a", "b", Some("Longsword"), &mut state).unwrap();
        assert_eq!(result.target_hp_remaining, Some(0));
        assert!(!state.character("b").unwrap().is_alive);
        assert!(result.description.contains("slain"));
    }

    #[test]
    fn test_dodging_target_imposes_disadvantage() {
        // Disadvantage consumes two dice and keeps the lower: min(18, 4) = 4.
        let roller = scripted(&[18, 4]);
        let mut state = arena();
        state
            .characters
            .get_mut("b")
            .unwrap()
            .conditions
            .insert(Condition::Dodging);

        let result = resolve_attack(&roller, "a", "b", Some("Longsword"), &mut state).unwrap();
        assert_eq!(result.attack_roll, Some(9));
        assert_eq!(result.hit, Some(false));
    }

    #[test]
    fn test_damage_clamped_non_negative() {
        let mut state = arena();
        state.characters.get_mut("a").unwrap().attacks[0] = Attack {
            damage_bonus: -10,
            ..sword()
        };
        let roller = scripted(&[12, 2]);
        let result = resolve_attack(&roller, "a", "b", None, &mut state).unwrap();
        assert_eq!(result.damage_dealt, Some(0));
        assert_eq!(state.character("b").unwrap().current_hp, 20);
    }
}
