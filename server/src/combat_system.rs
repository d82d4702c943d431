use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    ability::{self, AbilityActivation, AbilityCatalog, AbilityDefinition},
    aggression::AggressionTable,
    combat_error::CombatRefusal,
    combat_session::CombatSession,
    combatant::{Combatant, CombatantId},
    config::CombatConfig,
    energy::{EnergyRules, EnergyTracker},
    game_state::Room,
    id::{Id, IdMap, IdSource},
    mob::MobInstance,
    mob_coll::MobColl,
    player::Player,
    player_coll::PlayerColl,
    tick::Tick,
};

/// Read-only view of the parts of the world combat needs to validate a request.
pub struct World<'a> {
    pub rooms: &'a IdMap<Room>,
    pub players: &'a PlayerColl,
    pub mobs: &'a MobColl,
}

impl<'a> World<'a> {
    pub fn combatant(&self, id: CombatantId) -> Option<&'a dyn Combatant> {
        match id {
            CombatantId::Player(player_id) => {
                self.players.get(&player_id).map(|player| player as &dyn Combatant)
            }
            CombatantId::Mob(mob_id) => self.mobs.get(&mob_id).map(|mob| mob as &dyn Combatant),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engagement {
    Started,
    Joined,
    Switched,
    AlreadyFighting,
}

/// Every fight in the world, plus NPC grudges that outlive a single fight.
/// This is the only entry point command handlers use to touch combat state.
#[derive(Debug)]
pub struct CombatSystem {
    config: CombatConfig,
    rules: EnergyRules,
    sessions: BTreeMap<Id<CombatSession>, CombatSession>,
    session_of: HashMap<CombatantId, Id<CombatSession>>,
    aggression: BTreeMap<Id<MobInstance>, AggressionTable>,
    session_ids: IdSource<CombatSession>,
    rounds_resolved: u64,
}

impl CombatSystem {
    pub fn new(config: CombatConfig) -> CombatSystem {
        CombatSystem {
            rules: EnergyRules::from_config(&config),
            config,
            sessions: BTreeMap::new(),
            session_of: HashMap::new(),
            aggression: BTreeMap::new(),
            session_ids: IdSource::new(0),
            rounds_resolved: 0,
        }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn rules(&self) -> EnergyRules {
        self.rules
    }

    pub fn engage_combat(
        &mut self,
        actor: CombatantId,
        target: CombatantId,
        world: &World,
    ) -> Result<Engagement, CombatRefusal> {
        let attacker = world.combatant(actor).ok_or(CombatRefusal::Incapacitated)?;
        if !attacker.can_fight() {
            return Err(CombatRefusal::Incapacitated);
        }
        if actor == target {
            return Err(CombatRefusal::TargetIsSelf);
        }
        let defender = world
            .combatant(target)
            .filter(|defender| defender.room_id() == attacker.room_id())
            .ok_or(CombatRefusal::TargetNotFound)?;
        let room = world.rooms.get(&attacker.room_id()).ok_or(CombatRefusal::TargetNotFound)?;
        if room.safe {
            return Err(CombatRefusal::SafeRoom);
        }
        let hostile_pair = match (actor, target) {
            (CombatantId::Player(_), CombatantId::Mob(mob_id))
            | (CombatantId::Mob(mob_id), CombatantId::Player(_)) => {
                world.mobs.get(&mob_id).map_or(false, |mob| mob.template.hostile)
            }
            _ => false,
        };
        if !hostile_pair {
            return Err(CombatRefusal::NotHostile(defender.display_name()));
        }
        if !defender.can_fight() {
            return Err(CombatRefusal::TargetDead(defender.display_name()));
        }

        let actor_session = self.session_of.get(&actor).copied();
        let target_session = self.session_of.get(&target).copied();
        let engagement = match (actor_session, target_session) {
            (Some(a), Some(t)) if a == t => {
                if self.sessions.get(&a).and_then(|s| s.target_of(actor)) == Some(target) {
                    return Ok(Engagement::AlreadyFighting);
                }
                Engagement::Switched
            }
            (Some(a), Some(t)) => {
                self.merge_sessions(a, t);
                Engagement::Switched
            }
            (Some(a), None) => {
                self.add_to_session(a, target);
                Engagement::Switched
            }
            (None, Some(t)) => {
                self.add_to_session(t, actor);
                Engagement::Joined
            }
            (None, None) => {
                let id = self.session_ids.next();
                self.sessions.insert(id, CombatSession::new(id, attacker.room_id()));
                self.add_to_session(id, actor);
                self.add_to_session(id, target);
                debug!("Combat {:?} started in room {:?}", id, attacker.room_id());
                Engagement::Started
            }
        };

        let session_id = self.session_of.get(&actor).copied();
        if let Some(session) = session_id.and_then(|id| self.sessions.get_mut(&id)) {
            session.set_target(actor, target);
            if session.target_of(target).is_none() {
                session.set_target(target, actor);
            }
        }

        let (mob_id, player) = match (actor, target) {
            (CombatantId::Mob(mob_id), CombatantId::Player(player_id))
            | (CombatantId::Player(player_id), CombatantId::Mob(mob_id)) => {
                (mob_id, world.players.get(&player_id))
            }
            _ => unreachable!("checked hostile_pair above"),
        };
        if let Some(player) = player {
            let round = self.rounds_resolved;
            self.aggression.entry(mob_id).or_default().provoke(&player.name, round);
        }
        Ok(engagement)
    }

    /// Leaves the fight without resolving anything further. Returns false if
    /// the combatant wasn't fighting.
    pub fn break_combat(&mut self, actor: CombatantId) -> bool {
        match self.detach(actor) {
            Some(session_id) => {
                self.dissolve_if_over(session_id);
                true
            }
            None => false,
        }
    }

    pub fn handle_player_disconnect(&mut self, player_id: Id<Player>, name: &str) {
        debug!("Releasing {} from combat on disconnect", name);
        self.release_player(player_id, name);
    }

    /// Drops the player from their fight and from every NPC's grudge list.
    /// Used when they disconnect, leave the room, fall or die.
    pub fn release_player(&mut self, player_id: Id<Player>, name: &str) {
        self.break_combat(CombatantId::Player(player_id));
        self.forget_player(name);
    }

    pub fn energy_tracker(&self, player_id: Id<Player>) -> Option<&EnergyTracker> {
        let combatant = CombatantId::Player(player_id);
        self.session_for(combatant).and_then(|session| session.tracker(combatant))
    }

    pub fn is_bashing(&self, player_id: Id<Player>) -> bool {
        self.energy_tracker(player_id).map_or(false, |tracker| tracker.is_bashing())
    }

    /// Bash mode only exists inside a fight. Turning it on ends any
    /// channelled ability, which is returned so the caller can say so.
    pub fn set_bashing(
        &mut self,
        player_id: Id<Player>,
        bashing: bool,
    ) -> Result<Option<AbilityActivation>, CombatRefusal> {
        let combatant = CombatantId::Player(player_id);
        let session = self.session_for_mut(combatant).ok_or(CombatRefusal::SpecifyTarget("Bash"))?;
        let tracker = session.tracker_mut(combatant).ok_or(CombatRefusal::SpecifyTarget("Bash"))?;
        tracker.set_bashing(bashing);
        Ok(if bashing { session.clear_activation(combatant) } else { None })
    }

    pub fn has_active_combat_ability(&self, player_id: Id<Player>) -> bool {
        self.active_combat_ability(player_id).is_some()
    }

    pub fn active_combat_ability(&self, player_id: Id<Player>) -> Option<&AbilityActivation> {
        let combatant = CombatantId::Player(player_id);
        self.session_for(combatant).and_then(|session| session.activation(combatant))
    }

    /// Replaces any active ability (returned) and switches bash mode off.
    /// Nothing is charged until the ability actually lands.
    pub fn activate_combat_ability(
        &mut self,
        player_id: Id<Player>,
        definition: &AbilityDefinition,
        duration_rounds: Option<u32>,
    ) -> Result<Option<AbilityActivation>, CombatRefusal> {
        let combatant = CombatantId::Player(player_id);
        let session = self.session_for_mut(combatant).ok_or(CombatRefusal::NotInCombat)?;
        if let Some(tracker) = session.tracker_mut(combatant) {
            tracker.set_bashing(false);
        }
        Ok(session.set_activation(combatant, AbilityActivation::new(definition, duration_rounds)))
    }

    pub fn deactivate_combat_ability(&mut self, player_id: Id<Player>) -> Option<AbilityActivation> {
        let combatant = CombatantId::Player(player_id);
        self.session_for_mut(combatant).and_then(|session| session.clear_activation(combatant))
    }

    pub fn can_use_ability<'c>(
        &self,
        player_id: Id<Player>,
        ability: &str,
        catalog: &'c AbilityCatalog,
        world: &World,
        now: Tick,
    ) -> Result<&'c AbilityDefinition, CombatRefusal> {
        let definition =
            catalog.find(ability).ok_or_else(|| CombatRefusal::UnknownAbility(ability.to_string()))?;
        let player = world.players.get(&player_id).ok_or(CombatRefusal::Incapacitated)?;
        ability::can_use_ability(player, definition, now)?;
        Ok(definition)
    }

    pub fn has_mana(&self, player_id: Id<Player>, cost: i32, world: &World) -> bool {
        world.players.get(&player_id).map_or(false, |player| ability::has_mana(player, cost))
    }

    pub fn is_in_combat(&self, combatant: CombatantId) -> bool {
        self.session_of.contains_key(&combatant)
    }

    pub fn session_id_of(&self, combatant: CombatantId) -> Option<Id<CombatSession>> {
        self.session_of.get(&combatant).copied()
    }

    pub fn target_of(&self, combatant: CombatantId) -> Option<CombatantId> {
        self.session_for(combatant).and_then(|session| session.target_of(combatant))
    }

    pub fn active_combats_in_room(&self, room_id: Id<Room>) -> Vec<Id<CombatSession>> {
        self.sessions
            .values()
            .filter(|session| session.room_id() == room_id)
            .map(|session| session.id())
            .collect()
    }

    pub fn combat_entities(&self, session_id: Id<CombatSession>) -> Vec<CombatantId> {
        self.sessions
            .get(&session_id)
            .map_or_else(Vec::new, |session| session.participants().to_vec())
    }

    pub fn combat_round(&self, session_id: Id<CombatSession>) -> Option<u64> {
        self.sessions.get(&session_id).map(|session| session.round())
    }

    pub fn target_map(&self, session_id: Id<CombatSession>) -> BTreeMap<CombatantId, CombatantId> {
        self.sessions.get(&session_id).map_or_else(BTreeMap::new, |s| s.target_map().clone())
    }

    pub fn aggression(&self, mob_id: Id<MobInstance>) -> Option<&AggressionTable> {
        self.aggression.get(&mob_id)
    }

    // Round resolution hooks.

    pub(crate) fn session_ids(&self) -> Vec<Id<CombatSession>> {
        self.sessions.keys().copied().collect()
    }

    pub(crate) fn session(&self, session_id: Id<CombatSession>) -> Option<&CombatSession> {
        self.sessions.get(&session_id)
    }

    pub(crate) fn session_mut(&mut self, session_id: Id<CombatSession>) -> Option<&mut CombatSession> {
        self.sessions.get_mut(&session_id)
    }

    pub(crate) fn aggression_mut(&mut self, mob_id: Id<MobInstance>) -> Option<&mut AggressionTable> {
        self.aggression.get_mut(&mob_id)
    }

    pub(crate) fn aggression_round(&self) -> u64 {
        self.rounds_resolved
    }

    pub(crate) fn finish_round(&mut self) {
        self.rounds_resolved += 1;
    }

    pub(crate) fn add_to_session(&mut self, session_id: Id<CombatSession>, combatant: CombatantId) {
        let rules = self.rules;
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.add(combatant, rules);
            self.session_of.insert(combatant, session_id);
        }
    }

    /// Pulls a combatant out of their session without ending the session.
    pub(crate) fn detach(&mut self, combatant: CombatantId) -> Option<Id<CombatSession>> {
        let session_id = self.session_of.remove(&combatant)?;
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.remove(combatant);
        }
        Some(session_id)
    }

    pub(crate) fn forget_player(&mut self, name: &str) {
        for table in self.aggression.values_mut() {
            table.remove(name);
        }
        self.aggression.retain(|_, table| !table.is_empty());
    }

    /// NPCs with a grudge that are not in any fight.
    pub(crate) fn idle_grudges(&self) -> Vec<Id<MobInstance>> {
        self.aggression
            .keys()
            .filter(|mob_id| !self.session_of.contains_key(&CombatantId::Mob(**mob_id)))
            .copied()
            .collect()
    }

    pub(crate) fn drop_aggression(&mut self, mob_id: Id<MobInstance>) {
        self.aggression.remove(&mob_id);
    }

    /// Removes the NPC from any fight and returns the grudges it held.
    pub(crate) fn mob_died(&mut self, mob_id: Id<MobInstance>) -> AggressionTable {
        self.detach(CombatantId::Mob(mob_id));
        self.aggression.remove(&mob_id).unwrap_or_default()
    }

    pub(crate) fn dissolve_if_over(&mut self, session_id: Id<CombatSession>) -> bool {
        let over = self.sessions.get(&session_id).map_or(false, |session| {
            !session.has_hostile_pairing() || session.idle_rounds() >= self.config.idle_reap_rounds
        });
        if over {
            self.dissolve(session_id);
        }
        over
    }

    pub(crate) fn dissolve(&mut self, session_id: Id<CombatSession>) {
        if let Some(session) = self.sessions.remove(&session_id) {
            for combatant in session.participants() {
                self.session_of.remove(combatant);
            }
            debug!(
                "Combat {:?} in room {:?} ended after {} rounds",
                session_id,
                session.room_id(),
                session.round()
            );
        }
    }

    fn merge_sessions(&mut self, into: Id<CombatSession>, from: Id<CombatSession>) {
        if let Some(other) = self.sessions.remove(&from) {
            for combatant in other.participants() {
                self.session_of.insert(*combatant, into);
            }
            if let Some(session) = self.sessions.get_mut(&into) {
                session.absorb(other);
            }
        }
    }

    fn session_for(&self, combatant: CombatantId) -> Option<&CombatSession> {
        self.session_of.get(&combatant).and_then(|id| self.sessions.get(id))
    }

    fn session_for_mut(&mut self, combatant: CombatantId) -> Option<&mut CombatSession> {
        let id = self.session_of.get(&combatant)?;
        self.sessions.get_mut(id)
    }
}
