use rand::Rng;

use crate::{
    combat_error::CombatRefusal,
    combat_system::Engagement,
    combatant::{Combatant, CombatantId},
    event_writer::EventWriter,
    game_logic,
    game_room::resolve_target_in_room,
    game_state::GameState,
    id::Id,
    line::{span, Color, Line},
    player::Player,
    rewards::xp_for_next_level,
    tick::TickDuration,
};

fn refuse(player_id: Id<Player>, refusal: CombatRefusal, writer: &mut EventWriter) {
    writer.tell(player_id, Line::str(&refusal.to_string()));
}

fn tell_self_and_room(
    player_id: Id<Player>,
    msg_self: &str,
    msg_others: &str,
    writer: &mut EventWriter,
    state: &GameState,
) {
    writer.tell(player_id, span(msg_self).color(Color::LightCyan).line());
    if let Some(player) = state.players.get(&player_id) {
        writer.tell_room_except(
            &state.players,
            player.room_id,
            player_id,
            span(msg_others).color(Color::Cyan).line(),
        );
    }
}

fn name_of_player(player_id: Id<Player>, state: &GameState) -> String {
    state.players.get(&player_id).map_or_else(String::new, |player| player.name.clone())
}

fn ability_name(ability_id: &str, state: &GameState) -> String {
    state
        .abilities
        .get(ability_id)
        .map_or_else(|| ability_id.to_string(), |def| def.name.clone())
}

/// Starts or redirects a fight. Returns whether the player is now fighting
/// `target`; any refusal has already been told.
fn engage(
    player_id: Id<Player>,
    target: CombatantId,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<bool, String> {
    let (combat, world) = state.combat_and_world();
    let engagement = combat.engage_combat(CombatantId::Player(player_id), target, &world);
    let target_name = world.combatant(target).map(|target| target.display_name());
    let player_name = world.players.get(&player_id).ok_or("engage: Self not found")?.name.clone();

    match (engagement, target_name) {
        (Ok(Engagement::AlreadyFighting), Some(target_name)) => {
            writer.tell(player_id, Line::str(&format!("You are already fighting {}.", target_name)));
            Ok(true)
        }
        (Ok(_), Some(target_name)) => {
            tell_self_and_room(
                player_id,
                &format!("You attack {}.", target_name),
                &format!("{} attacks {}.", player_name, target_name),
                writer,
                state,
            );
            Ok(true)
        }
        (Ok(_), None) => Err("engage: Target vanished".to_string()),
        (Err(refusal), _) => {
            refuse(player_id, refusal, writer);
            Ok(false)
        }
    }
}

fn resolve_target(
    player_id: Id<Player>,
    args: &[&str],
    state: &GameState,
) -> Result<Option<CombatantId>, String> {
    let player = state.players.get(&player_id).ok_or("Self not found")?;
    Ok(resolve_target_in_room(&args.join(" "), player.room_id, player_id, state))
}

pub fn kill(
    player_id: Id<Player>,
    args: Vec<&str>,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<(), String> {
    if args.is_empty() {
        refuse(player_id, CombatRefusal::SpecifyTarget("Attack"), writer);
        return Ok(());
    }
    let target = match resolve_target(player_id, &args, state)? {
        Some(target) => target,
        None => {
            refuse(player_id, CombatRefusal::TargetNotFound, writer);
            return Ok(());
        }
    };
    if engage(player_id, target, writer, state)?
        && state.combat.deactivate_combat_ability(player_id).is_some()
    {
        writer.tell(player_id, Line::str("You switch back to your weapon."));
    }
    Ok(())
}

/// `bash <target>` engages with bash on; plain `bash` toggles it mid-fight.
pub fn bash(
    player_id: Id<Player>,
    args: Vec<&str>,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<(), String> {
    let was_bashing = state.combat.is_bashing(player_id);
    let bashing = if args.is_empty() {
        if !state.combat.is_in_combat(CombatantId::Player(player_id)) {
            refuse(player_id, CombatRefusal::SpecifyTarget("Bash"), writer);
            return Ok(());
        }
        !was_bashing
    } else {
        let target = match resolve_target(player_id, &args, state)? {
            Some(target) => target,
            None => {
                refuse(player_id, CombatRefusal::TargetNotFound, writer);
                return Ok(());
            }
        };
        if state.combat.target_of(CombatantId::Player(player_id)) != Some(target)
            && !engage(player_id, target, writer, state)?
        {
            return Ok(());
        }
        true
    };

    match state.combat.set_bashing(player_id, bashing) {
        Ok(ended) => {
            if let Some(activation) = ended {
                let name = ability_name(&activation.ability_id, state);
                writer.tell(player_id, Line::str(&format!("You stop channelling {}.", name)));
                writer.tell(player_id, Line::str("You switch back to your weapon."));
            }
            let player_name = name_of_player(player_id, state);
            match (was_bashing, bashing) {
                (true, true) => writer.tell(player_id, Line::str("You are already bashing.")),
                (_, true) => tell_self_and_room(
                    player_id,
                    "You start bashing. (Double damage, half as often, no critical hits.)",
                    &format!("{} starts bashing.", player_name),
                    writer,
                    state,
                ),
                (_, false) => tell_self_and_room(
                    player_id,
                    "You stop bashing.",
                    &format!("{} stops bashing.", player_name),
                    writer,
                    state,
                ),
            }
        }
        Err(refusal) => refuse(player_id, refusal, writer),
    }
    Ok(())
}

/// `cast magic missile goblin`: the longest leading run of words that names
/// an ability is the ability, the rest is the target.
pub fn cast(
    player_id: Id<Player>,
    args: Vec<&str>,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<(), String> {
    if args.is_empty() {
        writer.tell(player_id, Line::str("Cast what?"));
        return Ok(());
    }
    let split = (1..=args.len())
        .rev()
        .find(|n| state.abilities.find(&args[..*n].join(" ")).is_some());
    match split {
        Some(n) => cast_ability(player_id, &args[..n].join(" "), args[n..].to_vec(), writer, state),
        None => {
            refuse(player_id, CombatRefusal::UnknownAbility(args.join(" ")), writer);
            Ok(())
        }
    }
}

pub fn cast_ability(
    player_id: Id<Player>,
    ability: &str,
    target_args: Vec<&str>,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<(), String> {
    let now = state.ticks;
    let checked =
        state.combat.can_use_ability(player_id, ability, &state.abilities, &state.world(), now);
    let definition = match checked {
        Ok(definition) => definition.clone(),
        Err(refusal) => {
            refuse(player_id, refusal, writer);
            return Ok(());
        }
    };

    let combatant = CombatantId::Player(player_id);
    if !target_args.is_empty() {
        let target = match resolve_target(player_id, &target_args, state)? {
            Some(target) => target,
            None => {
                refuse(player_id, CombatRefusal::TargetNotFound, writer);
                return Ok(());
            }
        };
        if state.combat.target_of(combatant) != Some(target)
            && !engage(player_id, target, writer, state)?
        {
            return Ok(());
        }
    } else if !state.combat.is_in_combat(combatant) {
        refuse(player_id, CombatRefusal::SpecifyTarget("Cast"), writer);
        return Ok(());
    }

    let was_bashing = state.combat.is_bashing(player_id);
    match state.combat.activate_combat_ability(player_id, &definition, None) {
        Ok(replaced) => {
            if let Some(replaced) = replaced.filter(|r| r.ability_id != definition.id) {
                let name = ability_name(&replaced.ability_id, state);
                writer.tell(player_id, Line::str(&format!("You stop channelling {}.", name)));
            }
            if was_bashing {
                writer.tell(player_id, Line::str("You stop bashing."));
            }
            if definition.cooldown_rounds > 0 {
                let round = TickDuration::from_secs(state.config.combat.round_secs);
                let ready_at = now + round.times(definition.cooldown_rounds);
                state.players.modify(&player_id, |player| {
                    player.ability_ready_at.insert(definition.id.clone(), ready_at)
                });
            }
            let player_name = name_of_player(player_id, state);
            tell_self_and_room(
                player_id,
                &format!("You begin channelling {}.", definition.name),
                &format!("{} begins channelling {}.", player_name, definition.name),
                writer,
                state,
            );
        }
        Err(refusal) => refuse(player_id, refusal, writer),
    }
    Ok(())
}

pub fn stop(player_id: Id<Player>, writer: &mut EventWriter, state: &mut GameState) {
    match state.combat.deactivate_combat_ability(player_id) {
        Some(activation) => {
            let name = ability_name(&activation.ability_id, state);
            writer.tell(player_id, Line::str(&format!("You stop channelling {}.", name)));
            writer.tell(player_id, Line::str("You switch back to your weapon."));
        }
        None => writer.tell(player_id, Line::str("You aren't channelling anything.")),
    }
}

/// Leaves the fight but stays put. NPCs that still bear a grudge will pick
/// the player up again next round.
pub fn disengage(player_id: Id<Player>, writer: &mut EventWriter, state: &mut GameState) {
    if state.combat.break_combat(CombatantId::Player(player_id)) {
        let player_name = name_of_player(player_id, state);
        tell_self_and_room(
            player_id,
            "You step back from the fight.",
            &format!("{} steps back from the fight.", player_name),
            writer,
            state,
        );
    } else {
        refuse(player_id, CombatRefusal::NotInCombat, writer);
    }
}

/// Runs out through a random exit. Leaving the room ends the fight and
/// every grudge held against the player.
pub fn flee(
    player_id: Id<Player>,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<(), String> {
    if !state.combat.is_in_combat(CombatantId::Player(player_id)) {
        refuse(player_id, CombatRefusal::NotInCombat, writer);
        return Ok(());
    }
    let player = state.players.get(&player_id).ok_or("flee: Self not found")?;
    let room = state.rooms.get(&player.room_id).ok_or("flee: Room not found")?;
    if room.exits.is_empty() {
        writer.tell(player_id, Line::str("There is nowhere to run!"));
        return Ok(());
    }
    let index = state.rng.gen_range(0..room.exits.len());
    let (direction, to_room_id) = room
        .exits
        .iter()
        .nth(index)
        .map(|(direction, to)| (direction.clone(), *to))
        .ok_or("flee: Exit vanished")?;
    let player_name = player.name.clone();

    tell_self_and_room(
        player_id,
        &format!("You flee {}!", direction),
        &format!("{} flees!", player_name),
        writer,
        state,
    );
    game_logic::move_player(player_id, to_room_id, &direction, writer, state)
}

pub fn score(player_id: Id<Player>, writer: &mut EventWriter, state: &GameState) -> Result<(), String> {
    let player = state.players.get(&player_id).ok_or("score: Self not found")?;
    let mut lines = vec![
        span(&format!("{}, level {}", player.name, player.level)).bold().line(),
        Line::str(&format!(
            "Health {}/{}  Mana {}/{}  Experience {}/{}",
            player.hp,
            player.max_hp,
            player.mana,
            player.max_mana,
            player.xp,
            xp_for_next_level(player.level)
        )),
        Line::str(&format!(
            "Attack {}  Defense {}  Weapon: {} ({}-{})",
            player.attack,
            player.defense,
            player.weapon.name,
            player.weapon.min_damage,
            player.weapon.max_damage
        )),
    ];
    if player.unconscious {
        lines.push(span("You are unconscious.").color(Color::DarkGrey).line());
    }
    if let Some(tracker) = state.combat.energy_tracker(player_id) {
        let target = state
            .combat
            .target_of(CombatantId::Player(player_id))
            .and_then(|target| state.world().combatant(target))
            .map_or_else(|| "nobody".to_string(), |target| target.display_name());
        let bashing = if tracker.is_bashing() { ", bashing" } else { "" };
        lines.push(
            span(&format!("Fighting {} (energy {}{})", target, tracker.energy(), bashing))
                .color(Color::LightRed)
                .line(),
        );
    }
    if let Some(activation) = state.combat.active_combat_ability(player_id) {
        lines.push(Line::str(&format!(
            "Channelling {} ({} rounds left)",
            ability_name(&activation.ability_id, state),
            activation.remaining_rounds
        )));
    }
    if !player.inventory.is_empty() {
        lines.push(Line::str(&format!("Carrying: {}", player.inventory.join(", "))));
    }
    writer.tell_lines(player_id, &lines);
    Ok(())
}

/// Debug view of every fight in the player's room.
pub fn combats(player_id: Id<Player>, writer: &mut EventWriter, state: &GameState) -> Result<(), String> {
    let player = state.players.get(&player_id).ok_or("combats: Self not found")?;
    let world = state.world();
    let name_of = |id: CombatantId| {
        world.combatant(id).map_or_else(|| id.to_string(), |combatant| combatant.display_name())
    };

    let sessions = state.combat.active_combats_in_room(player.room_id);
    if sessions.is_empty() {
        writer.tell(player_id, Line::str("No fights here."));
    }
    for session_id in sessions {
        let round = state.combat.combat_round(session_id).unwrap_or_default();
        let entities = state.combat.combat_entities(session_id);
        writer.tell(
            player_id,
            span(&format!("Combat {:?}, round {}, {} combatants", session_id, round, entities.len()))
                .bold()
                .line(),
        );
        for (attacker, target) in state.combat.target_map(session_id) {
            writer.tell(player_id, Line::str(&format!("  {} → {}", name_of(attacker), name_of(target))));
        }
    }
    for mob in state.mobs.in_room(player.room_id) {
        if let Some(table) = state.combat.aggression(mob.id) {
            let names = table.names().collect::<Vec<_>>();
            writer.tell(
                player_id,
                Line::str(&format!("  {} remembers {}", mob.display_name(), names.join(", "))),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        add_player, goblin_id, shopkeeper_template, spawn_mob, spawn_template, test_state, ARENA,
        TEMPLE,
    };

    #[test]
    fn kill_starts_a_fight_and_tells_the_room() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let bob = add_player(&mut state, "Bob");
        let goblin = goblin_id(&state);
        let mut writer = EventWriter::new();

        kill(alice, vec!["gob"], &mut writer, &mut state).unwrap();

        assert_eq!(writer.text_for(alice), vec!["You attack the goblin."]);
        assert_eq!(writer.text_for(bob), vec!["Alice attacks the goblin."]);
        assert_eq!(state.combat.target_of(CombatantId::Player(alice)), Some(CombatantId::Mob(goblin)));
        assert_eq!(state.combat.target_of(CombatantId::Mob(goblin)), Some(CombatantId::Player(alice)));
        assert!(state.combat.aggression(goblin).unwrap().contains("alice"));
    }

    #[test]
    fn kill_refusals_are_told_not_raised() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        spawn_template(&mut state, Id::new(ARENA), shopkeeper_template());
        let mut writer = EventWriter::new();

        kill(alice, vec![], &mut writer, &mut state).unwrap();
        kill(alice, vec!["dragon"], &mut writer, &mut state).unwrap();
        kill(alice, vec!["shopkeeper"], &mut writer, &mut state).unwrap();
        kill(alice, vec!["me"], &mut writer, &mut state).unwrap();

        assert_eq!(
            writer.text_for(alice),
            vec![
                "Attack whom?",
                "You do not see that here.",
                "You cannot attack the shopkeeper.",
                "You can't attack yourself.",
            ]
        );
        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
    }

    #[test]
    fn nothing_starts_in_a_safe_room() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.remove(&alice);
        state.players.insert(Player::new(alice, "Alice".to_string(), Id::new(TEMPLE)));
        spawn_mob(&mut state, Id::new(TEMPLE));
        let mut writer = EventWriter::new();

        kill(alice, vec!["goblin"], &mut writer, &mut state).unwrap();
        cast(alice, vec!["mm", "goblin"], &mut writer, &mut state).unwrap();

        assert_eq!(writer.text_for(alice), vec!["You can't fight here.", "You can't fight here."]);
        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
    }

    #[test]
    fn bash_without_a_fight_asks_whom() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let mut writer = EventWriter::new();

        bash(alice, vec![], &mut writer, &mut state).unwrap();

        assert_eq!(writer.text_for(alice), vec!["Bash whom?"]);
        assert!(!state.combat.is_bashing(alice));
    }

    #[test]
    fn bash_with_a_target_engages_and_toggles_off_again() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let mut writer = EventWriter::new();

        bash(alice, vec!["goblin"], &mut writer, &mut state).unwrap();
        assert!(state.combat.is_bashing(alice));
        assert_eq!(
            writer.text_for(alice),
            vec![
                "You attack the goblin.",
                "You start bashing. (Double damage, half as often, no critical hits.)",
            ]
        );

        bash(alice, vec![], &mut writer, &mut state).unwrap();
        assert!(!state.combat.is_bashing(alice));
    }

    #[test]
    fn casting_replaces_bash_and_attacking_replaces_the_ability() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let mut writer = EventWriter::new();

        bash(alice, vec!["goblin"], &mut writer, &mut state).unwrap();
        cast(alice, vec!["magic", "missile"], &mut writer, &mut state).unwrap();
        assert!(!state.combat.is_bashing(alice));
        assert!(state.combat.has_active_combat_ability(alice));

        let mut writer = EventWriter::new();
        kill(alice, vec!["goblin"], &mut writer, &mut state).unwrap();
        assert!(!state.combat.has_active_combat_ability(alice));
        assert_eq!(
            writer.text_for(alice),
            vec!["You are already fighting the goblin.", "You switch back to your weapon."]
        );
    }

    #[test]
    fn cast_splits_ability_from_target() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let mut writer = EventWriter::new();

        cast(alice, vec!["magic", "missile", "goblin"], &mut writer, &mut state).unwrap();

        assert_eq!(
            writer.text_for(alice),
            vec!["You attack the goblin.", "You begin channelling magic missile."]
        );
        let activation = state.combat.active_combat_ability(alice).unwrap();
        assert_eq!(activation.ability_id, "magic-missile");
        assert_eq!(activation.remaining_rounds, 5);
    }

    #[test]
    fn cast_without_mana_is_refused() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.modify(&alice, |player| player.mana = 0);
        let mut writer = EventWriter::new();

        cast(alice, vec!["mm", "goblin"], &mut writer, &mut state).unwrap();

        assert_eq!(writer.text_for(alice), vec!["You don't have enough mana."]);
        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
    }

    #[test]
    fn flee_leaves_the_room_and_the_grudge() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        let mut writer = EventWriter::new();

        kill(alice, vec!["goblin"], &mut writer, &mut state).unwrap();
        flee(alice, &mut writer, &mut state).unwrap();

        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
        assert_ne!(state.players.get(&alice).unwrap().room_id, Id::new(ARENA));
        assert!(state.combat.aggression(goblin).map_or(true, |table| table.is_empty()));
    }

    #[test]
    fn bashing_mid_channel_switches_back_to_the_weapon() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        cast(alice, vec!["mm", "goblin"], &mut EventWriter::new(), &mut state).unwrap();
        let mut writer = EventWriter::new();

        bash(alice, vec![], &mut writer, &mut state).unwrap();

        assert!(state.combat.is_bashing(alice));
        assert!(!state.combat.has_active_combat_ability(alice));
        assert_eq!(
            writer.text_for(alice),
            vec![
                "You stop channelling magic missile.",
                "You switch back to your weapon.",
                "You start bashing. (Double damage, half as often, no critical hits.)",
            ]
        );
    }

    #[test]
    fn a_grudging_goblin_pulls_a_disengaged_player_back_in() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        let mut writer = EventWriter::new();

        kill(alice, vec!["goblin"], &mut writer, &mut state).unwrap();
        disengage(alice, &mut writer, &mut state);
        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
        assert!(state.combat.aggression(goblin).unwrap().contains("alice"));

        let mut writer = EventWriter::new();
        crate::round_scheduler::resolve_combat_round(&mut state, &mut writer);

        assert_eq!(state.combat.target_of(CombatantId::Mob(goblin)), Some(CombatantId::Player(alice)));
        assert_eq!(state.combat.target_of(CombatantId::Player(alice)), Some(CombatantId::Mob(goblin)));
        assert!(writer.text_for(alice).iter().any(|line| line == "The goblin turns to attack you."));
    }

    #[test]
    fn disengage_outside_a_fight() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let mut writer = EventWriter::new();

        disengage(alice, &mut writer, &mut state);
        stop(alice, &mut writer, &mut state);

        assert_eq!(
            writer.text_for(alice),
            vec!["You aren't fighting anyone.", "You aren't channelling anything."]
        );
    }
}
