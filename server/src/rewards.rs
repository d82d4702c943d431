use crate::{
    combatant::CombatantId,
    event_writer::EventWriter,
    game_state::GameState,
    id::Id,
    line::{span, Color, Line},
    player::Player,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reward {
    Xp(u32),
    Item(String),
}

pub fn xp_for_next_level(level: u32) -> u32 {
    level * 100
}

/// Applies one reward, levelling up as many times as the XP allows.
pub fn apply_reward(player: &mut Player, reward: Reward) -> Vec<Line> {
    let mut lines = Vec::new();
    match reward {
        Reward::Xp(xp) => {
            player.xp += xp;
            lines.push(span(&format!("You gain {} experience.", xp)).color(Color::Green).line());
            while player.xp >= xp_for_next_level(player.level) {
                player.xp -= xp_for_next_level(player.level);
                player.level += 1;
                player.max_hp += 10;
                player.attack += 1;
                lines.push(
                    span(&format!("You are now level {}!", player.level))
                        .color(Color::Green)
                        .bold()
                        .line(),
                );
            }
        }
        Reward::Item(item) => {
            lines.push(span(&format!("You take the {}.", item)).color(Color::Green).line());
            player.inventory.push(item);
        }
    }
    lines
}

/// Stats belong to the combat engine while a player is fighting, so rewards
/// earned mid-fight wait until the player is out.
pub fn grant(player_id: Id<Player>, reward: Reward, state: &mut GameState, writer: &mut EventWriter) {
    if state.combat.is_in_combat(CombatantId::Player(player_id)) {
        state.pending_rewards.entry(player_id).or_default().push(reward);
    } else if let Some(lines) =
        state.players.modify(&player_id, |player| apply_reward(player, reward))
    {
        writer.tell_lines(player_id, &lines);
    }
}

pub fn flush_pending_rewards(state: &mut GameState, writer: &mut EventWriter) {
    let GameState { players, combat, pending_rewards, .. } = state;
    pending_rewards.retain(|player_id, rewards| {
        if !players.by_id().contains_key(player_id) {
            return false;
        }
        if combat.is_in_combat(CombatantId::Player(*player_id)) {
            return true;
        }
        for reward in rewards.drain(..) {
            if let Some(lines) = players.modify(player_id, |player| apply_reward(player, reward)) {
                writer.tell_lines(*player_id, &lines);
            }
        }
        false
    });
}
