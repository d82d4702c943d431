use crate::{
    combatant::{Combatant, CombatantId},
    event_writer::EventWriter,
    game_state::{GameState, Room},
    id::Id,
    line::{line, span, Color},
    named::Named,
    player::Player,
    text_util::{and_list_span, are, capitalize, health_status},
};

/// Finds what a player means by `name` in their room: NPCs first (exact,
/// then prefix), then other players.
pub fn resolve_target_in_room(
    name: &str,
    room_id: Id<Room>,
    self_id: Id<Player>,
    state: &GameState,
) -> Option<CombatantId> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let mob = state
        .mobs
        .in_room(room_id)
        .find(|mob| mob.template.matches(name))
        .or_else(|| state.mobs.in_room(room_id).find(|mob| mob.template.matches_prefix(name)));
    if let Some(mob) = mob {
        return Some(CombatantId::Mob(mob.id));
    }
    if name.eq_ignore_ascii_case("self") || name.eq_ignore_ascii_case("me") {
        return Some(CombatantId::Player(self_id));
    }
    state
        .players
        .in_room(room_id)
        .find(|player| player.name.eq_ignore_ascii_case(name))
        .map(|player| CombatantId::Player(player.id))
}

pub fn describe_room(self_id: Id<Player>, room: &Room, writer: &mut EventWriter, state: &GameState) {
    let mut lines = Vec::new();
    let mut title = span(&room.name).bold().line();
    if room.safe {
        title = title.push(span(" (safe)").color(Color::Green));
    }
    lines.push(title);
    lines.push(span(&room.description).line());

    for mob in state.mobs.in_room(room.id) {
        let fighting = match state.combat.target_of(CombatantId::Mob(mob.id)) {
            Some(CombatantId::Player(id)) if id == self_id => ", fighting you".to_string(),
            Some(CombatantId::Player(id)) => state
                .players
                .get(&id)
                .map_or_else(String::new, |player| format!(", fighting {}", player.name)),
            _ => String::new(),
        };
        let text = format!(
            "{} is here. It {}{}.",
            capitalize(&format!("a {}", mob.template.name)),
            health_status(mob.hp(), mob.max_hp()),
            fighting
        );
        lines.push(span(&text).color(Color::Red).line());
    }

    let players = state
        .players
        .in_room(room.id)
        .filter(|player| player.id != self_id)
        .map(|player| {
            let name = if player.unconscious {
                format!("{} (unconscious)", player.name)
            } else {
                player.name.clone()
            };
            span(&name).color(Color::Blue)
        })
        .collect::<Vec<_>>();
    if !players.is_empty() {
        let len = players.len();
        lines.push(line(and_list_span(players)).push(span(&format!(" {} here.", are(len)))));
    }

    lines.push(if room.exits.is_empty() {
        span("There are no exits here.").line()
    } else {
        span("You can go ")
            .line()
            .extend(and_list_span(
                room.exits.keys().map(|dir| span(dir).color(Color::Blue)).collect(),
            ))
            .push(span(" from here."))
    });

    writer.tell_lines(self_id, &lines);
}

/// A closer look at one NPC or player in the room.
pub fn describe_target(
    self_id: Id<Player>,
    name: &str,
    room_id: Id<Room>,
    writer: &mut EventWriter,
    state: &GameState,
) {
    let text = match resolve_target_in_room(name, room_id, self_id, state) {
        Some(CombatantId::Mob(mob_id)) => state.mobs.get(&mob_id).map(|mob| {
            format!("{} It {}.", mob.template.description, health_status(mob.hp(), mob.max_hp()))
        }),
        Some(CombatantId::Player(player_id)) => state.players.get(&player_id).map(|player| {
            format!("{} {}.", player.name, health_status(player.hp(), player.max_hp()))
        }),
        None => None,
    };
    let text = text.unwrap_or_else(|| "You do not see that here.".to_string());
    writer.tell(self_id, span(&text).line());
}
