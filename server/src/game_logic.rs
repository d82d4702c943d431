use std::mem;

use log::{debug, info};

use crate::{
    combatant::CombatantId,
    event_writer::EventWriter,
    game_alias, game_combat, game_help,
    game_room::{describe_room, describe_target},
    game_state::{GameState, Room},
    id::Id,
    line::{line, span, Color, Line},
    mob::{MobInstance, MobTemplate},
    named::Named,
    player::Player,
    rewards::{self, apply_reward, Reward},
    round_scheduler::{resolve_combat_round, CombatEvent},
    text_util::{are, capitalize, plural},
    tick::TickDuration,
};

/// Populates every room with its starting mobs.
pub fn initialize(state: &mut GameState) {
    let mut spawns = state
        .rooms
        .values()
        .flat_map(|room| room.mob_spawns.iter().map(move |spawn| (room.id, spawn.mob_template_id)))
        .collect::<Vec<_>>();
    spawns.sort();
    let count = spawns.len();
    for (room_id, template_id) in spawns {
        spawn_mob(room_id, template_id, state);
    }
    info!("Spawned {} mobs", count);
}

fn spawn_mob(
    room_id: Id<Room>,
    template_id: Id<MobTemplate>,
    state: &mut GameState,
) -> Option<Id<MobInstance>> {
    let template = state.mob_templates.get(&template_id)?.clone();
    let id = state.mob_id_source.next();
    state.mobs.insert(MobInstance::spawn(id, room_id, template));
    Some(id)
}

/// Returns false, leaving the state alone, if someone by that name is
/// already online.
pub fn on_player_connect(mut player: Player, writer: &mut EventWriter, state: &mut GameState) -> bool {
    if state.players.id_by_name(&player.name).is_some() {
        return false;
    }
    if !state.rooms.contains_key(&player.room_id) {
        player.room_id = state.start_room();
    }
    let player_id = player.id;
    let room_id = player.room_id;
    let name = player.name.clone();

    writer.tell_lines(
        player_id,
        &[
            span(&format!("Welcome, {}!", &name)).line(),
            line(vec![
                span("Try to "),
                span("look").color(Color::White),
                span(" around, or check the "),
                span("help").color(Color::White),
                span(" to get your bearings."),
            ]),
            span(&format_player_count(state.players.len() + 1)).line(),
        ],
    );
    writer.tell_room(&state.players, room_id, span(&format!("{} appears.", &name)).line());
    if !state.players.insert(player) {
        return false;
    }
    if let Some(room) = state.rooms.get(&room_id) {
        describe_room(player_id, room, writer, state);
    }
    true
}

/// Takes the player out of the world and out of every fight. Rewards still
/// waiting on them are applied so the returned player is what gets saved.
pub fn on_player_disconnect(
    player_id: Id<Player>,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Option<Player> {
    let mut player = state.players.remove(&player_id)?;
    state.combat.handle_player_disconnect(player_id, &player.name);
    for reward in state.pending_rewards.remove(&player_id).unwrap_or_default() {
        apply_reward(&mut player, reward);
    }
    writer.tell_room(
        &state.players,
        player.room_id,
        span(&format!("{} disappears.", player.name)).line(),
    );
    Some(player)
}

pub fn on_command(
    player_id: Id<Player>,
    command: &str,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<(), String> {
    let words = game_alias::resolve_aliases(command.split_whitespace().collect());
    let (command_head, args) = match words.split_first() {
        Some((head, args)) => (head.to_ascii_lowercase(), args.to_vec()),
        None => return Err("Empty command".to_string()),
    };

    let player = state.players.get(&player_id).ok_or("Self player not found")?;
    let room_id = player.room_id;
    if player.unconscious
        && !matches!(command_head.as_str(), "look" | "who" | "help" | "alias" | "score")
    {
        writer.tell(player_id, span("You are unconscious.").color(Color::DarkGrey).line());
        return Ok(());
    }

    match command_head.as_str() {
        "look" => look(player_id, &args, writer, state),
        "who" => {
            list_players(player_id, writer, state);
            Ok(())
        }
        "help" => {
            game_help::help(player_id, writer);
            Ok(())
        }
        "alias" => {
            game_alias::alias(player_id, writer);
            Ok(())
        }
        "score" => game_combat::score(player_id, writer, state),
        "kill" => game_combat::kill(player_id, args, writer, state),
        "bash" => game_combat::bash(player_id, args, writer, state),
        "cast" => game_combat::cast(player_id, args, writer, state),
        "magic-missile" => game_combat::cast_ability(player_id, "magic-missile", args, writer, state),
        "stop" => {
            game_combat::stop(player_id, writer, state);
            Ok(())
        }
        "flee" => game_combat::flee(player_id, writer, state),
        "disengage" => {
            game_combat::disengage(player_id, writer, state);
            Ok(())
        }
        "combats" if state.config.debug_commands => game_combat::combats(player_id, writer, state),
        potential_exit => {
            let exit = state
                .rooms
                .get(&room_id)
                .and_then(|room| room.exits.get(potential_exit).copied());
            match exit {
                Some(_) if state.combat.is_in_combat(CombatantId::Player(player_id)) => {
                    writer.tell(player_id, Line::str("You are fighting! Try to flee."));
                    Ok(())
                }
                Some(exit_room_id) => {
                    move_player(player_id, exit_room_id, potential_exit, writer, state)
                }
                None => {
                    writer.tell(player_id, span("Unknown command.").line());
                    Ok(())
                }
            }
        }
    }
}

fn look(
    player_id: Id<Player>,
    args: &[&str],
    writer: &mut EventWriter,
    state: &GameState,
) -> Result<(), String> {
    let player = state.players.get(&player_id).ok_or("look: Self not found")?;
    if !args.is_empty() {
        describe_target(player_id, &args.join(" "), player.room_id, writer, state);
        return Ok(());
    }
    let room = state.rooms.get(&player.room_id).ok_or("look: Room not found")?;
    describe_room(player_id, room, writer, state);
    writer.tell_room_except(
        &state.players,
        room.id,
        player_id,
        span(&format!("{} looks around.", &player.name)).line(),
    );
    Ok(())
}

/// Walking out of a room ends the player's fight there and every grudge
/// held against them.
pub fn move_player(
    player_id: Id<Player>,
    to_room_id: Id<Room>,
    exit: &str,
    writer: &mut EventWriter,
    state: &mut GameState,
) -> Result<(), String> {
    let player = state.players.get(&player_id).ok_or("move: Self player not found")?;
    let from_room_id = player.room_id;
    let player_name = player.name.clone();
    if !state.rooms.contains_key(&to_room_id) {
        return Err("move: Room not found".to_string());
    }

    state.combat.release_player(player_id, &player_name);
    state.players.modify(&player_id, |player| player.room_id = to_room_id);

    writer.tell_room(
        &state.players,
        from_room_id,
        span(&format!("{} leaves {}.", &player_name, exit)).line(),
    );
    let to_room = state.rooms.get(&to_room_id).ok_or("move: Room not found")?;
    let arrival = match to_room.exit_direction_to(from_room_id) {
        Some(reverse_exit) => format!("{} arrives from {}.", &player_name, reverse_exit),
        None => format!("{} appears.", &player_name),
    };
    writer.tell_room_except(&state.players, to_room_id, player_id, span(&arrival).line());

    describe_room(player_id, to_room, writer, state);
    Ok(())
}

pub fn on_tick(writer: &mut EventWriter, state: &mut GameState) {
    state.ticks = state.ticks.increase();

    spawn_scheduled_mobs(writer, state);

    let round = TickDuration::from_secs(state.config.combat.round_secs);
    if state.ticks.is_on_division(round, TickDuration::zero()) {
        let report = resolve_combat_round(state, writer);
        apply_combat_events(report.events, writer, state);
    }

    let regen = TickDuration::from_secs(state.config.regen_secs);
    if state.ticks.is_on_division(regen, TickDuration::zero()) {
        regenerate(writer, state);
    }

    rewards::flush_pending_rewards(state, writer);
}

fn spawn_scheduled_mobs(writer: &mut EventWriter, state: &mut GameState) {
    let later = state.scheduled_mob_spawns.split_off(&state.ticks.increase());
    let due = mem::replace(&mut state.scheduled_mob_spawns, later);
    for (room_id, template_id) in due.into_values().flatten() {
        if let Some(mob_id) = spawn_mob(room_id, template_id, state) {
            if let Some(mob) = state.mobs.get(&mob_id) {
                let msg = format!("{} arrives.", capitalize(&format!("a {}", mob.template.get_name())));
                writer.tell_room(&state.players, room_id, span(&msg).color(Color::Red).line());
            }
        }
    }
}

pub fn apply_combat_events(events: Vec<CombatEvent>, writer: &mut EventWriter, state: &mut GameState) {
    for event in events {
        match event {
            CombatEvent::MobSlain { room_id, template_id, killer, xp_shares, loot } => {
                let respawn_at =
                    state.ticks + TickDuration::from_secs(state.config.combat.mob_respawn_secs);
                state.scheduled_mob_spawns.entry(respawn_at).or_default().push((room_id, template_id));

                for (player_id, xp) in xp_shares {
                    rewards::grant(player_id, Reward::Xp(xp), state, writer);
                }
                if let Some(killer) = killer {
                    for item in loot {
                        rewards::grant(killer, Reward::Item(item), state, writer);
                    }
                }
            }
            CombatEvent::PlayerKnockedOut { player_id } => {
                debug!("Player {} is unconscious", player_id);
            }
            CombatEvent::PlayerSlain { player_id } => respawn_player(player_id, writer, state),
        }
    }
}

fn respawn_player(player_id: Id<Player>, writer: &mut EventWriter, state: &mut GameState) {
    let start_room_id = state.start_room();
    let moved = state.players.modify(&player_id, |player| {
        player.room_id = start_room_id;
        player.hp = player.max_hp;
        player.unconscious = false;
        player.name.clone()
    });
    let Some(name) = moved else { return };
    writer.tell_room_except(
        &state.players,
        start_room_id,
        player_id,
        span(&format!("{} appears, looking pale.", name)).line(),
    );
    if let Some(room) = state.rooms.get(&start_room_id) {
        describe_room(player_id, room, writer, state);
    }
}

/// Out of combat, players slowly recover. The unconscious come to once
/// their health is above zero again.
fn regenerate(writer: &mut EventWriter, state: &mut GameState) {
    let resting = state
        .players
        .by_id()
        .values()
        .filter(|player| !state.combat.is_in_combat(CombatantId::Player(player.id)))
        .filter(|player| player.hp < player.max_hp || player.mana < player.max_mana)
        .map(|player| player.id)
        .collect::<Vec<_>>();

    for player_id in resting {
        let woke = state.players.modify(&player_id, |player| {
            player.hp = (player.hp + (player.max_hp / 20).max(1)).min(player.max_hp);
            player.mana = (player.mana + (player.max_mana / 10).max(1)).min(player.max_mana);
            let woke = player.unconscious && player.hp > 0;
            if woke {
                player.unconscious = false;
            }
            woke.then(|| (player.name.clone(), player.room_id))
        });
        if let Some(Some((name, room_id))) = woke {
            writer.tell(player_id, span("You come to.").color(Color::Green).line());
            writer.tell_room_except(
                &state.players,
                room_id,
                player_id,
                span(&format!("{} comes to.", name)).line(),
            );
        }
    }
}

fn format_player_count(count: usize) -> String {
    format!("There {} {} {} online.", are(count), count, plural(count, "player"))
}

fn list_players(player_id: Id<Player>, writer: &mut EventWriter, state: &GameState) {
    let mut lines = vec![span(&format_player_count(state.players.len())).line()];
    lines.extend(state.players.by_id().values().map(|player| {
        let fighting = state.combat.is_in_combat(CombatantId::Player(player.id));
        let suffix = if fighting { " (fighting)" } else { "" };
        span(&format!("{}{}", player.name, suffix)).line()
    }));
    writer.tell_lines(player_id, &lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_player, goblin_id, test_state, ARENA, CELLAR, TEMPLE};

    #[test]
    fn a_second_connection_with_the_same_name_is_refused() {
        let mut state = test_state();
        let mut writer = EventWriter::new();
        let first = Player::new(Id::new(1), "Alice".to_string(), Id::new(TEMPLE));
        let second = Player::new(Id::new(2), "alice".to_string(), Id::new(TEMPLE));

        assert!(on_player_connect(first, &mut writer, &mut state));
        assert!(!on_player_connect(second, &mut writer, &mut state));
        assert_eq!(state.players.len(), 1);
        assert!(writer.text_for(Id::new(2)).is_empty());
    }

    #[test]
    fn players_in_a_missing_room_start_over() {
        let mut state = test_state();
        let mut writer = EventWriter::new();
        let player = Player::new(Id::new(1), "Alice".to_string(), Id::new(99));

        assert!(on_player_connect(player, &mut writer, &mut state));
        assert_eq!(state.players.get(&Id::new(1)).unwrap().room_id, Id::new(TEMPLE));
    }

    #[test]
    fn disconnect_leaves_no_combat_state_behind() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        let mut writer = EventWriter::new();
        on_command(alice, "kill goblin", &mut writer, &mut state).unwrap();
        on_command(alice, "mm", &mut writer, &mut state).unwrap();
        assert!(state.combat.has_active_combat_ability(alice));

        let player = on_player_disconnect(alice, &mut writer, &mut state).unwrap();

        assert_eq!(player.name, "Alice");
        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
        assert!(state.combat.energy_tracker(alice).is_none());
        assert!(state.combat.active_combat_ability(alice).is_none());
        assert!(!state.combat.is_in_combat(CombatantId::Mob(goblin)));
        assert!(state.combat.aggression(goblin).map_or(true, |table| !table.contains("alice")));
    }

    #[test]
    fn walking_is_refused_mid_fight() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let mut writer = EventWriter::new();

        on_command(alice, "k goblin", &mut writer, &mut state).unwrap();
        on_command(alice, "d", &mut writer, &mut state).unwrap();

        assert_eq!(state.players.get(&alice).unwrap().room_id, Id::new(ARENA));
        assert_eq!(writer.text_for(alice).last().unwrap(), "You are fighting! Try to flee.");
    }

    #[test]
    fn walking_moves_the_player_and_describes_the_room() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let mut writer = EventWriter::new();

        on_command(alice, "down", &mut writer, &mut state).unwrap();

        assert_eq!(state.players.get(&alice).unwrap().room_id, Id::new(CELLAR));
        assert_eq!(writer.text_for(alice)[0], "Cellar");
    }

    #[test]
    fn unconscious_players_can_only_look_around() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.modify(&alice, |player| {
            player.hp = -3;
            player.unconscious = true;
        });
        let mut writer = EventWriter::new();

        on_command(alice, "kill goblin", &mut writer, &mut state).unwrap();
        on_command(alice, "west", &mut writer, &mut state).unwrap();

        assert_eq!(writer.text_for(alice), vec!["You are unconscious.", "You are unconscious."]);
        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
    }

    #[test]
    fn regeneration_wakes_the_unconscious() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.modify(&alice, |player| {
            player.hp = 0;
            player.unconscious = true;
        });
        let mut writer = EventWriter::new();

        regenerate(&mut writer, &mut state);

        let player = state.players.get(&alice).unwrap();
        assert_eq!(player.hp, 5);
        assert!(!player.unconscious);
        assert_eq!(writer.text_for(alice), vec!["You come to."]);
    }

    #[test]
    fn slain_mobs_pay_out_after_the_fight_and_respawn_later() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        state.mobs.get_mut(&goblin).unwrap().hp = 1;
        let mut writer = EventWriter::new();
        on_command(alice, "kill goblin", &mut writer, &mut state).unwrap();

        // Two-second rounds at eight ticks a second.
        let mut writer = EventWriter::new();
        for _ in 0..16 {
            on_tick(&mut writer, &mut state);
        }

        let player = state.players.get(&alice).unwrap();
        assert_eq!(player.xp, 20);
        assert_eq!(player.inventory, vec!["rusty dagger".to_string()]);
        assert!(state.mobs.get(&goblin).is_none());
        assert_eq!(state.scheduled_mob_spawns.values().flatten().count(), 1);
        let text = writer.text_for(alice);
        assert!(text.contains(&"The goblin dies.".to_string()));
        assert!(text.contains(&"You gain 20 experience.".to_string()));
    }

    #[test]
    fn slain_players_wake_up_in_the_start_room() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.modify(&alice, |player| player.hp = -50);
        let mut writer = EventWriter::new();

        apply_combat_events(vec![CombatEvent::PlayerSlain { player_id: alice }], &mut writer, &mut state);

        let player = state.players.get(&alice).unwrap();
        assert_eq!(player.room_id, Id::new(TEMPLE));
        assert_eq!(player.hp, player.max_hp);
        assert_eq!(writer.text_for(alice)[0], "Temple (safe)");
    }
}
