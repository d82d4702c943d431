use log::{debug, warn};
use rand::Rng;

use crate::{
    ability::{AbilityCatalog, AbilityDefinition},
    aggression::Candidate,
    combat_error::CombatError,
    combat_roll::{roll_ability, roll_weapon_attack, AttackRoll},
    combat_session::CombatSession,
    combat_system::{CombatSystem, World},
    combatant::{Combatant, CombatantId},
    event_writer::EventWriter,
    game_state::{GameState, Room},
    id::{Id, IdMap},
    line::{span, Color},
    mob::{MobInstance, MobTemplate},
    mob_coll::MobColl,
    player::Player,
    player_coll::PlayerColl,
    text_util::capitalize,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Weapon(AttackRoll),
    Ability { ability_id: String, damage: i32, critical: bool, mana_spent: i32 },
}

/// One resolved action, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRecord {
    pub session: Id<CombatSession>,
    pub round: u64,
    pub actor: CombatantId,
    pub target: CombatantId,
    pub kind: ActionKind,
}

/// Side effects the round leaves for other subsystems to carry out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CombatEvent {
    MobSlain {
        room_id: Id<Room>,
        template_id: Id<MobTemplate>,
        killer: Option<Id<Player>>,
        xp_shares: Vec<(Id<Player>, u32)>,
        loot: Vec<String>,
    },
    PlayerKnockedOut {
        player_id: Id<Player>,
    },
    PlayerSlain {
        player_id: Id<Player>,
    },
}

#[derive(Clone, Debug, Default)]
pub struct RoundReport {
    pub actions: Vec<ActionRecord>,
    pub events: Vec<CombatEvent>,
}

struct RoundContext<'a, R: Rng> {
    combat: &'a mut CombatSystem,
    players: &'a mut PlayerColl,
    mobs: &'a mut MobColl,
    rooms: &'a IdMap<Room>,
    abilities: &'a AbilityCatalog,
    rng: &'a mut R,
    writer: &'a mut EventWriter,
    report: RoundReport,
}

/// Advances every live session by one round. A session that fails to resolve
/// is torn down on its own; the others still get their round.
pub fn resolve_combat_round(state: &mut GameState, writer: &mut EventWriter) -> RoundReport {
    let GameState { combat, players, mobs, rooms, abilities, rng, .. } = state;
    let mut ctx = RoundContext {
        combat,
        players,
        mobs,
        rooms,
        abilities,
        rng,
        writer,
        report: RoundReport::default(),
    };

    wake_grudging_mobs(&mut ctx);
    for session_id in ctx.combat.session_ids() {
        if let Err(err) = resolve_session(session_id, &mut ctx) {
            warn!("Combat round failed, ending that fight: {}", err);
            ctx.combat.dissolve(session_id);
        }
    }
    ctx.combat.finish_round();
    ctx.report
}

/// NPCs outside any fight that still bear a grudge look around their room.
/// A resented player standing there is attacked again; one gone long enough
/// is forgotten.
fn wake_grudging_mobs<R: Rng>(ctx: &mut RoundContext<R>) {
    let forget_after = ctx.combat.config().aggression_forget_rounds;
    let round = ctx.combat.aggression_round();

    for mob_id in ctx.combat.idle_grudges() {
        let Some(mob) = ctx.mobs.get(&mob_id) else {
            ctx.combat.drop_aggression(mob_id);
            continue;
        };
        let room_id = mob.room_id;
        let policy = mob.template.target_policy;
        let mob_name = mob.display_name();
        if !mob.can_fight() {
            continue;
        }

        let candidates = ctx
            .players
            .in_room(room_id)
            .filter(|player| player.can_fight())
            .map(|player| Candidate { name: &player.name, hp: player.hp })
            .collect::<Vec<_>>();
        let Some(table) = ctx.combat.aggression_mut(mob_id) else { continue };
        for name in table.refresh(candidates.iter().map(|c| c.name), round, forget_after) {
            debug!("{} forgets about {}", mob_name, name);
        }
        if table.is_empty() {
            ctx.combat.drop_aggression(mob_id);
            continue;
        }
        let chosen = table.select_target(policy, &candidates).and_then(|name| ctx.players.id_by_name(name));
        let Some(player_id) = chosen else { continue };

        let world = World { rooms: ctx.rooms, players: &*ctx.players, mobs: &*ctx.mobs };
        let engaged =
            ctx.combat.engage_combat(CombatantId::Mob(mob_id), CombatantId::Player(player_id), &world);
        match engaged {
            Ok(_) => announce_new_target(&mob_name, player_id, room_id, ctx),
            Err(refusal) => debug!("{} holds back: {}", mob_name, refusal),
        }
    }
}

fn announce_new_target<R: Rng>(
    mob_name: &str,
    player_id: Id<Player>,
    room_id: Id<Room>,
    ctx: &mut RoundContext<R>,
) {
    let Some(player) = ctx.players.get(&player_id) else { return };
    let msg_target = format!("{} turns to attack you.", capitalize(mob_name));
    ctx.writer.tell(player_id, span(&msg_target).color(Color::LightRed).line());
    let msg_others = format!("{} turns to attack {}.", capitalize(mob_name), player.name);
    ctx.writer.tell_room_except(
        ctx.players,
        room_id,
        player_id,
        span(&msg_others).color(Color::Red).line(),
    );
}

fn resolve_session<R: Rng>(
    session_id: Id<CombatSession>,
    ctx: &mut RoundContext<R>,
) -> Result<(), CombatError> {
    let session = ctx.combat.session(session_id).ok_or(CombatError::SessionMissing(session_id))?;
    let room_id = session.room_id();
    if !ctx.rooms.contains_key(&room_id) {
        return Err(CombatError::RoomMissing { session: session_id, room: room_id });
    }
    for combatant in session.participants() {
        if ctx.combat.session_id_of(*combatant) != Some(session_id) {
            return Err(CombatError::IndexMismatch { session: session_id, combatant: *combatant });
        }
    }

    prune_absent(session_id, room_id, ctx);
    update_mob_targets(session_id, room_id, ctx);
    update_player_targets(session_id, ctx);

    let order = participants(ctx.combat, session_id);
    let mut any_action = false;
    for actor in order {
        any_action |= act(session_id, room_id, actor, ctx);
    }

    if let Some(session) = ctx.combat.session_mut(session_id) {
        session.finish_round(any_action);
    }
    ctx.combat.dissolve_if_over(session_id);
    Ok(())
}

fn participants(combat: &CombatSystem, session_id: Id<CombatSession>) -> Vec<CombatantId> {
    combat.session(session_id).map_or_else(Vec::new, |session| session.participants().to_vec())
}

fn world<'a, R: Rng>(ctx: &'a RoundContext<R>) -> World<'a> {
    World { rooms: ctx.rooms, players: &*ctx.players, mobs: &*ctx.mobs }
}

/// Anyone who vanished, walked off or can no longer fight since the last
/// round is dropped before anything resolves.
fn prune_absent<R: Rng>(session_id: Id<CombatSession>, room_id: Id<Room>, ctx: &mut RoundContext<R>) {
    for combatant in participants(ctx.combat, session_id) {
        let present = world(ctx)
            .combatant(combatant)
            .map(|c| c.room_id() == room_id && c.can_fight());
        match present {
            Some(true) => (),
            Some(false) => {
                debug!("{} left the fight in room {:?}", combatant, room_id);
                release(combatant, ctx);
            }
            None => {
                warn!("{} vanished from combat {:?}", combatant, session_id);
                ctx.combat.detach(combatant);
            }
        }
    }
}

fn release<R: Rng>(combatant: CombatantId, ctx: &mut RoundContext<R>) {
    match combatant {
        CombatantId::Player(player_id) => {
            ctx.combat.detach(combatant);
            if let Some(player) = ctx.players.get(&player_id) {
                ctx.combat.forget_player(&player.name);
            }
        }
        CombatantId::Mob(mob_id) => {
            ctx.combat.mob_died(mob_id);
        }
    }
}

/// Each NPC picks, from the players it holds a grudge against and who are
/// standing in its room, the one its template's policy prefers. Players not
/// yet in this fight get pulled in.
fn update_mob_targets<R: Rng>(
    session_id: Id<CombatSession>,
    room_id: Id<Room>,
    ctx: &mut RoundContext<R>,
) {
    let forget_after = ctx.combat.config().aggression_forget_rounds;
    let round = ctx.combat.aggression_round();

    for combatant in participants(ctx.combat, session_id) {
        let Some(mob_id) = combatant.mob() else { continue };
        let Some(mob) = ctx.mobs.get(&mob_id) else { continue };
        let policy = mob.template.target_policy;
        let mob_name = mob.display_name();

        let candidates = ctx
            .players
            .in_room(room_id)
            .filter(|player| player.can_fight())
            .filter(|player| {
                let in_session = ctx.combat.session_id_of(CombatantId::Player(player.id));
                in_session.is_none() || in_session == Some(session_id)
            })
            .map(|player| Candidate { name: &player.name, hp: player.hp })
            .collect::<Vec<_>>();

        let chosen = match ctx.combat.aggression_mut(mob_id) {
            Some(table) => {
                for name in table.refresh(candidates.iter().map(|c| c.name), round, forget_after) {
                    debug!("{} forgets about {}", mob_name, name);
                }
                table.select_target(policy, &candidates).and_then(|name| ctx.players.id_by_name(name))
            }
            None => None,
        };

        let Some(player_id) = chosen else {
            if let Some(session) = ctx.combat.session_mut(session_id) {
                session.clear_target(combatant);
            }
            continue;
        };
        let target = CombatantId::Player(player_id);
        if ctx.combat.session_id_of(target).is_none() {
            ctx.combat.add_to_session(session_id, target);
        }
        let Some(session) = ctx.combat.session_mut(session_id) else { return };
        if session.target_of(target).is_none() {
            session.set_target(target, combatant);
        }
        if session.target_of(combatant) != Some(target) {
            session.set_target(combatant, target);
            announce_new_target(&mob_name, player_id, room_id, ctx);
        }
    }
}

/// Players whose target fell pick the next NPC in the fight that is
/// after them.
fn update_player_targets<R: Rng>(session_id: Id<CombatSession>, ctx: &mut RoundContext<R>) {
    let order = participants(ctx.combat, session_id);
    for combatant in &order {
        let Some(player_id) = combatant.player() else { continue };
        let Some(session) = ctx.combat.session(session_id) else { return };
        if session.target_of(*combatant).is_some() {
            continue;
        }
        let next = order
            .iter()
            .filter(|other| !other.is_player())
            .find(|other| session.target_of(**other) == Some(*combatant))
            .copied();
        if let Some(next) = next {
            if let Some(session) = ctx.combat.session_mut(session_id) {
                session.set_target(*combatant, next);
            }
            if let Some(mob) = next.mob().and_then(|mob_id| ctx.mobs.get(&mob_id)) {
                let msg = format!("You turn to attack {}.", mob.display_name());
                ctx.writer.tell(player_id, span(&msg).color(Color::LightCyan).line());
            }
        }
    }
}

/// Resolves one combatant's action for the round. Returns true if they
/// attempted anything.
fn act<R: Rng>(
    session_id: Id<CombatSession>,
    room_id: Id<Room>,
    actor: CombatantId,
    ctx: &mut RoundContext<R>,
) -> bool {
    let Some(session) = ctx.combat.session(session_id) else { return false };
    // Fell earlier this round.
    if !session.contains(actor) {
        return false;
    }
    let Some(target) = session.target_of(actor) else { return false };
    let target_ok = session.contains(target)
        && world(ctx).combatant(target).map_or(false, |t| t.can_fight() && t.room_id() == room_id);
    if !target_ok {
        if let Some(session) = ctx.combat.session_mut(session_id) {
            session.clear_target(actor);
        }
        return false;
    }
    let round = session.round();

    if session.activation(actor).is_some() {
        if let Some(acted) = channel_ability(session_id, room_id, round, actor, target, ctx) {
            return acted;
        }
    }
    swing_weapon(session_id, room_id, round, actor, target, ctx)
}

/// Counts the activation down, then lands it if the caster can pay. Returns
/// `None` when they are out of mana and should swing instead.
fn channel_ability<R: Rng>(
    session_id: Id<CombatSession>,
    room_id: Id<Room>,
    round: u64,
    actor: CombatantId,
    target: CombatantId,
    ctx: &mut RoundContext<R>,
) -> Option<bool> {
    let abilities = ctx.abilities;
    let player_id = actor.player()?;
    let session = ctx.combat.session_mut(session_id)?;
    let activation = session.activation(actor)?.clone();
    let Some(definition) = abilities.get(&activation.ability_id) else {
        warn!("Unknown active ability {} on {}", activation.ability_id, actor);
        session.clear_activation(actor);
        return None;
    };
    let expired = session.activation_mut(actor).map_or(true, |activation| activation.count_down());

    let mana = ctx.players.get(&player_id).map_or(0, |player| player.mana);
    let landed = match activation.charge_for(mana) {
        Some(charge) => {
            cast(session_id, room_id, round, actor, target, definition, charge, ctx);
            Some(true)
        }
        None => {
            debug!("{} is out of mana for {}", actor, definition.id);
            None
        }
    };

    if expired {
        if let Some(session) = ctx.combat.session_mut(session_id) {
            session.clear_activation(actor);
        }
        let msg = format!("Your {} fades.", definition.name);
        ctx.writer.tell(player_id, span(&msg).color(Color::Magenta).line());
    }
    landed
}

#[allow(clippy::too_many_arguments)]
fn cast<R: Rng>(
    session_id: Id<CombatSession>,
    room_id: Id<Room>,
    round: u64,
    actor: CombatantId,
    target: CombatantId,
    definition: &AbilityDefinition,
    charge: i32,
    ctx: &mut RoundContext<R>,
) {
    let Some(player_id) = actor.player() else { return };
    ctx.players.modify(&player_id, |player| player.mana -= charge);

    let (damage, critical) = roll_ability(&mut *ctx.rng, definition);
    let caster = target_name(actor, ctx);
    let target_name = target_name(target, ctx);
    let crit = if critical { " Critical!" } else { "" };
    let msg_self =
        format!("Your {} strikes {} for {} damage.{}", definition.name, target_name, damage, crit);
    ctx.writer.tell(player_id, span(&msg_self).color(Color::Magenta).line());
    if let Some(target_player) = target.player() {
        let msg = format!("{}'s {} strikes you for {} damage.{}", caster, definition.name, damage, crit);
        ctx.writer.tell(target_player, span(&msg).color(Color::LightRed).line());
    }
    let msg_others =
        format!("{}'s {} strikes {} for {} damage.", caster, definition.name, target_name, damage);
    let watchers = ctx
        .players
        .ids_in_room(room_id)
        .filter(|id| *id != player_id && Some(*id) != target.player())
        .collect::<Vec<_>>();
    ctx.writer.tell_many(watchers, span(&msg_others).color(Color::Magenta).line());

    ctx.report.actions.push(ActionRecord {
        session: session_id,
        round,
        actor,
        target,
        kind: ActionKind::Ability {
            ability_id: definition.id.clone(),
            damage,
            critical,
            mana_spent: charge,
        },
    });
    damage_target(session_id, room_id, actor, target, damage, ctx);
}

fn swing_weapon<R: Rng>(
    session_id: Id<CombatSession>,
    room_id: Id<Room>,
    round: u64,
    actor: CombatantId,
    target: CombatantId,
    ctx: &mut RoundContext<R>,
) -> bool {
    let rules = ctx.combat.rules();
    let Some((attack, weapon)) = world(ctx).combatant(actor).map(|c| (c.attack(), c.weapon().clone()))
    else {
        return false;
    };
    let defense = world(ctx).combatant(target).map_or(0, |c| c.defense());

    let Some(tracker) = ctx.combat.session_mut(session_id).and_then(|s| s.tracker_mut(actor)) else {
        return false;
    };
    let bashing = tracker.is_bashing();
    let ready = tracker.try_spend(rules);
    tracker.accrue(weapon.speed, rules);
    if !ready {
        return false;
    }

    let roll = roll_weapon_attack(&mut *ctx.rng, ctx.combat.config(), attack, &weapon, defense, bashing);
    narrate_swing(room_id, actor, target, &roll, ctx);
    ctx.report.actions.push(ActionRecord {
        session: session_id,
        round,
        actor,
        target,
        kind: ActionKind::Weapon(roll),
    });
    if roll.hit {
        damage_target(session_id, room_id, actor, target, roll.damage, ctx);
    }
    true
}

fn target_name<R: Rng>(combatant: CombatantId, ctx: &RoundContext<R>) -> String {
    world(ctx).combatant(combatant).map_or_else(|| "someone".to_string(), |c| c.display_name())
}

fn narrate_swing<R: Rng>(
    room_id: Id<Room>,
    actor: CombatantId,
    target: CombatantId,
    roll: &AttackRoll,
    ctx: &mut RoundContext<R>,
) {
    let attacker = target_name(actor, ctx);
    let defender = target_name(target, ctx);
    let (verb, verbs) = match (roll.hit, roll.bashing, roll.critical) {
        (false, _, _) => ("miss", "misses"),
        (true, true, _) => ("bash", "bashes"),
        (true, false, true) => ("critically hit", "critically hits"),
        (true, false, false) => ("hit", "hits"),
    };
    let amount = if roll.hit { format!(" for {} damage", roll.damage) } else { String::new() };
    let bang = if roll.critical { "!" } else { "." };

    if let Some(player_id) = actor.player() {
        let msg = format!("You {} {}{}{}", verb, defender, amount, bang);
        ctx.writer.tell(player_id, span(&msg).color(Color::LightCyan).line());
    }
    if let Some(player_id) = target.player() {
        let msg = format!("{} {} you{}{}", capitalize(&attacker), verbs, amount, bang);
        ctx.writer.tell(player_id, span(&msg).color(Color::LightRed).line());
    }
    let msg_others = format!("{} {} {}{}{}", capitalize(&attacker), verbs, defender, amount, bang);
    let color = if actor.is_player() { Color::Cyan } else { Color::Red };
    let watchers = ctx
        .players
        .ids_in_room(room_id)
        .filter(|id| Some(*id) != actor.player() && Some(*id) != target.player())
        .collect::<Vec<_>>();
    ctx.writer.tell_many(watchers, span(&msg_others).color(color).line());
}

fn damage_target<R: Rng>(
    session_id: Id<CombatSession>,
    room_id: Id<Room>,
    attacker: CombatantId,
    target: CombatantId,
    damage: i32,
    ctx: &mut RoundContext<R>,
) {
    let hp = match target {
        CombatantId::Player(player_id) => ctx.players.modify(&player_id, |player| {
            player.apply_damage(damage);
            player.hp
        }),
        CombatantId::Mob(mob_id) => ctx.mobs.get_mut(&mob_id).map(|mob| {
            mob.apply_damage(damage);
            mob.hp
        }),
    };
    match hp {
        Some(hp) if hp <= 0 => defeat(session_id, room_id, attacker, target, hp, ctx),
        Some(_) => (),
        None => warn!("{} vanished while being hit", target),
    }
}

/// Takes a fallen combatant out of the fight immediately, so nobody later
/// in the round can hit it or be hit by it.
fn defeat<R: Rng>(
    session_id: Id<CombatSession>,
    room_id: Id<Room>,
    attacker: CombatantId,
    target: CombatantId,
    hp: i32,
    ctx: &mut RoundContext<R>,
) {
    match target {
        CombatantId::Mob(mob_id) => {
            let grudges = ctx.combat.mob_died(mob_id);
            let Some(mob) = ctx.mobs.remove(&mob_id) else { return };
            mob_slain(room_id, attacker, mob, grudges.names().map(str::to_string).collect(), ctx);
        }
        CombatantId::Player(player_id) => {
            ctx.combat.detach(target);
            let Some(player) = ctx.players.get(&player_id) else { return };
            let name = player.name.clone();
            ctx.combat.forget_player(&name);

            let margin = ctx.combat.config().unconscious_margin;
            if hp > -margin {
                ctx.players.modify(&player_id, |player| player.unconscious = true);
                ctx.writer.tell(player_id, span("You fall unconscious.").color(Color::DarkGrey).line());
                ctx.writer.tell_room_except(
                    ctx.players,
                    room_id,
                    player_id,
                    span(&format!("{} collapses, unconscious.", name)).color(Color::DarkGrey).line(),
                );
                ctx.report.events.push(CombatEvent::PlayerKnockedOut { player_id });
            } else {
                ctx.writer.tell(player_id, span("You die.").color(Color::DarkGrey).line());
                ctx.writer.tell_room_except(
                    ctx.players,
                    room_id,
                    player_id,
                    span(&format!("{} dies.", name)).color(Color::DarkGrey).line(),
                );
                ctx.report.events.push(CombatEvent::PlayerSlain { player_id });
            }
        }
    }
    debug!("{} fell in combat {:?}", target, session_id);
}

fn mob_slain<R: Rng>(
    room_id: Id<Room>,
    killer: CombatantId,
    mob: MobInstance,
    grudges: Vec<String>,
    ctx: &mut RoundContext<R>,
) {
    let msg = format!("{} dies.", capitalize(&mob.display_name()));
    ctx.writer.tell_room(ctx.players, room_id, span(&msg).color(Color::DarkGrey).line());

    let earners = grudges
        .iter()
        .filter_map(|name| ctx.players.id_by_name(name))
        .filter(|id| ctx.players.get(id).map_or(false, |player| player.room_id == room_id))
        .collect::<Vec<_>>();
    let share = match earners.len() {
        0 => 0,
        len => (mob.template.xp / len as u32).max(1),
    };
    let xp_shares = if mob.template.xp == 0 {
        Vec::new()
    } else {
        earners.iter().map(|id| (*id, share)).collect()
    };
    let killer = killer.player();
    let loot = if killer.is_some() { mob.template.loot.clone() } else { Vec::new() };

    ctx.report.events.push(CombatEvent::MobSlain {
        room_id,
        template_id: mob.template.id,
        killer,
        xp_shares,
        loot,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        combatant::CombatantId,
        test_support::{add_player, goblin_id, test_state, CELLAR},
    };

    fn attack(state: &mut GameState, player: Id<Player>, mob: Id<MobInstance>) {
        let (combat, world) = state.combat_and_world();
        let result = combat.engage_combat(CombatantId::Player(player), CombatantId::Mob(mob), &world);
        assert!(result.is_ok(), "{:?}", result);
    }

    fn weapon_actions(report: &RoundReport, actor: CombatantId) -> Vec<AttackRoll> {
        report
            .actions
            .iter()
            .filter(|action| action.actor == actor)
            .filter_map(|action| match action.kind {
                ActionKind::Weapon(roll) => Some(roll),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn bashing_costs_double_energy_and_deals_double_damage() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        attack(&mut state, alice, goblin);
        let alice_c = CombatantId::Player(alice);
        let mut writer = EventWriter::new();

        let round_1 = resolve_combat_round(&mut state, &mut writer);
        assert_eq!(state.combat.energy_tracker(alice).map(|t| t.energy()), Some(10));
        let swings = weapon_actions(&round_1, alice_c);
        assert_eq!(swings.len(), 1);
        assert_eq!(swings[0].damage, 4);

        state.combat.set_bashing(alice, true).unwrap();
        let round_2 = resolve_combat_round(&mut state, &mut writer);
        assert!(weapon_actions(&round_2, alice_c).is_empty());
        assert_eq!(state.combat.energy_tracker(alice).map(|t| t.energy()), Some(20));

        let round_3 = resolve_combat_round(&mut state, &mut writer);
        let swings = weapon_actions(&round_3, alice_c);
        assert_eq!(swings, vec![AttackRoll { hit: true, damage: 8, critical: false, bashing: true }]);
        assert_eq!(state.combat.energy_tracker(alice).map(|t| t.energy()), Some(10));
    }

    #[test]
    fn channelled_ability_replaces_the_swing_until_mana_runs_out() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.modify(&alice, |player| player.mana = 2);
        let goblin = goblin_id(&state);
        attack(&mut state, alice, goblin);

        let definition = state.abilities.get("magic-missile").cloned().unwrap();
        state.combat.activate_combat_ability(alice, &definition, None).unwrap();
        assert_eq!(state.players.get(&alice).unwrap().mana, 2);

        let mut writer = EventWriter::new();
        let round_1 = resolve_combat_round(&mut state, &mut writer);
        let alice_actions =
            round_1.actions.iter().filter(|a| a.actor == CombatantId::Player(alice)).collect::<Vec<_>>();
        assert_eq!(alice_actions.len(), 1);
        assert!(matches!(
            alice_actions[0].kind,
            ActionKind::Ability { mana_spent: 2, .. }
        ));
        assert_eq!(state.players.get(&alice).unwrap().mana, 0);
        // The swing was skipped, so the tracker is untouched.
        assert_eq!(state.combat.energy_tracker(alice).map(|t| t.energy()), Some(10));

        let round_2 = resolve_combat_round(&mut state, &mut writer);
        assert_eq!(weapon_actions(&round_2, CombatantId::Player(alice)).len(), 1);
        assert!(state.combat.has_active_combat_ability(alice));
        assert_eq!(state.players.get(&alice).unwrap().mana, 0);
    }

    #[test]
    fn ability_expires_after_its_duration() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        attack(&mut state, alice, goblin);
        let definition = state.abilities.get("magic-missile").cloned().unwrap();
        state.combat.activate_combat_ability(alice, &definition, Some(2)).unwrap();

        let mut writer = EventWriter::new();
        resolve_combat_round(&mut state, &mut writer);
        assert!(state.combat.has_active_combat_ability(alice));
        resolve_combat_round(&mut state, &mut writer);
        assert!(!state.combat.has_active_combat_ability(alice));
        assert!(writer.text_for(alice).iter().any(|line| line == "Your magic missile fades."));
    }

    #[test]
    fn the_dead_do_not_act_later_in_the_same_round() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let bob = add_player(&mut state, "Bob");
        let goblin = goblin_id(&state);
        state.mobs.get_mut(&goblin).unwrap().hp = 1;
        attack(&mut state, alice, goblin);
        attack(&mut state, bob, goblin);
        let session = state.combat.session_id_of(CombatantId::Player(alice)).unwrap();
        assert_eq!(
            state.combat.combat_entities(session),
            vec![CombatantId::Player(alice), CombatantId::Mob(goblin), CombatantId::Player(bob)]
        );

        let mut writer = EventWriter::new();
        let report = resolve_combat_round(&mut state, &mut writer);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].actor, CombatantId::Player(alice));
        assert!(state.mobs.get(&goblin).is_none());
        assert!(state.combat.active_combats_in_room(Id::new(1)).is_empty());
        assert!(!state.combat.is_in_combat(CombatantId::Player(bob)));
        assert!(matches!(
            report.events.as_slice(),
            [CombatEvent::MobSlain { killer: Some(k), xp_shares, .. }]
                if *k == alice && xp_shares.len() == 2
        ));
        assert!(writer.text_for(bob).iter().any(|line| line == "The goblin dies."));
    }

    #[test]
    fn npc_skips_a_disconnected_aggressor() {
        let mut state = test_state();
        let p1 = add_player(&mut state, "P1");
        let p2 = add_player(&mut state, "P2");
        state.players.modify(&p1, |player| player.hp = 10);
        let goblin = goblin_id(&state);
        attack(&mut state, p1, goblin);
        attack(&mut state, p2, goblin);
        let names = state.combat.aggression(goblin).unwrap().names().collect::<Vec<_>>();
        assert_eq!(names, vec!["p1", "p2"]);

        state.combat.handle_player_disconnect(p1, "P1");
        state.players.remove(&p1);

        let mut writer = EventWriter::new();
        resolve_combat_round(&mut state, &mut writer);
        assert_eq!(
            state.combat.target_of(CombatantId::Mob(goblin)),
            Some(CombatantId::Player(p2))
        );
        let names = state.combat.aggression(goblin).unwrap().names().collect::<Vec<_>>();
        assert_eq!(names, vec!["p2"]);
    }

    #[test]
    fn low_hp_player_is_knocked_out_not_killed() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.modify(&alice, |player| player.hp = 1);
        let goblin = goblin_id(&state);
        let (combat, world) = state.combat_and_world();
        combat.engage_combat(CombatantId::Mob(goblin), CombatantId::Player(alice), &world).unwrap();

        let mut writer = EventWriter::new();
        let report = resolve_combat_round(&mut state, &mut writer);
        assert_eq!(report.events, vec![CombatEvent::PlayerKnockedOut { player_id: alice }]);
        assert!(state.players.get(&alice).unwrap().unconscious);
        assert!(state.combat.aggression(goblin).is_none());
        assert!(!state.combat.is_in_combat(CombatantId::Mob(goblin)));
    }

    #[test]
    fn a_fight_where_nobody_can_act_is_reaped() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        state.players.modify(&alice, |player| player.weapon.speed = 0);
        let goblin = goblin_id(&state);
        state.mobs.get_mut(&goblin).unwrap().template.weapon.speed = 0;
        attack(&mut state, alice, goblin);
        let session = state.combat.session_id_of(CombatantId::Player(alice)).unwrap();
        let reap_after = state.combat.config().idle_reap_rounds;

        // Only the opening swings are affordable.
        let mut writer = EventWriter::new();
        for _ in 0..reap_after {
            resolve_combat_round(&mut state, &mut writer);
        }
        assert_eq!(state.combat.session(session).map(|s| s.idle_rounds()), Some(reap_after - 1));

        resolve_combat_round(&mut state, &mut writer);
        assert!(state.combat.session(session).is_none());
        assert!(!state.combat.is_in_combat(CombatantId::Player(alice)));
        assert!(!state.combat.is_in_combat(CombatantId::Mob(goblin)));
    }

    #[test]
    fn a_grudge_fades_once_the_player_stays_away() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        attack(&mut state, alice, goblin);
        state.combat.break_combat(CombatantId::Player(alice));
        state.players.modify(&alice, |player| player.room_id = Id::new(CELLAR));
        let forget_after = state.combat.config().aggression_forget_rounds;

        let mut writer = EventWriter::new();
        for _ in 0..=forget_after {
            resolve_combat_round(&mut state, &mut writer);
            assert!(state.combat.aggression(goblin).unwrap().contains("alice"));
        }
        resolve_combat_round(&mut state, &mut writer);
        assert!(state.combat.aggression(goblin).is_none());
        assert!(!state.combat.is_in_combat(CombatantId::Mob(goblin)));
        assert!(writer.text_for(alice).is_empty());
    }

    #[test]
    fn failing_session_does_not_block_the_others() {
        let mut state = test_state();
        let alice = add_player(&mut state, "Alice");
        let goblin = goblin_id(&state);
        attack(&mut state, alice, goblin);

        let bob = add_player(&mut state, "Bob");
        state.players.modify(&bob, |player| player.room_id = Id::new(2));
        let rat = crate::test_support::spawn_mob(&mut state, Id::new(2));
        attack(&mut state, bob, rat);
        state.rooms.remove(&Id::new(2));

        let mut writer = EventWriter::new();
        let report = resolve_combat_round(&mut state, &mut writer);
        assert!(!state.combat.is_in_combat(CombatantId::Player(bob)));
        assert!(state.combat.is_in_combat(CombatantId::Player(alice)));
        assert!(report.actions.iter().any(|a| a.actor == CombatantId::Player(alice)));
    }
}
