use std::collections::{BTreeMap, HashMap};

use crate::{
    ability::AbilityActivation,
    combatant::CombatantId,
    energy::{EnergyRules, EnergyTracker},
    game_state::Room,
    id::Id,
};

/// One fight in one room. Participants keep the order they joined in, which
/// is also the order they act in each round.
#[derive(Clone, Debug)]
pub struct CombatSession {
    id: Id<CombatSession>,
    room_id: Id<Room>,
    participants: Vec<CombatantId>,
    targets: BTreeMap<CombatantId, CombatantId>,
    trackers: HashMap<CombatantId, EnergyTracker>,
    activations: HashMap<CombatantId, AbilityActivation>,
    round: u64,
    idle_rounds: u32,
}

impl CombatSession {
    pub fn new(id: Id<CombatSession>, room_id: Id<Room>) -> CombatSession {
        CombatSession {
            id,
            room_id,
            participants: Vec::new(),
            targets: BTreeMap::new(),
            trackers: HashMap::new(),
            activations: HashMap::new(),
            round: 0,
            idle_rounds: 0,
        }
    }

    pub fn id(&self) -> Id<CombatSession> {
        self.id
    }

    pub fn room_id(&self) -> Id<Room> {
        self.room_id
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn participants(&self) -> &[CombatantId] {
        &self.participants
    }

    pub fn contains(&self, combatant: CombatantId) -> bool {
        self.participants.contains(&combatant)
    }

    pub fn add(&mut self, combatant: CombatantId, rules: EnergyRules) {
        if !self.contains(combatant) {
            self.participants.push(combatant);
            self.trackers.insert(combatant, EnergyTracker::new(rules));
        }
    }

    /// Drops a combatant along with everything hanging off them: their
    /// target, anyone's target pointing at them, their tracker and their
    /// active ability. Returns false if they weren't here.
    pub fn remove(&mut self, combatant: CombatantId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|c| *c != combatant);
        self.targets.remove(&combatant);
        self.targets.retain(|_, target| *target != combatant);
        self.trackers.remove(&combatant);
        self.activations.remove(&combatant);
        before != self.participants.len()
    }

    /// Moves every participant of `other` into this session, keeping their
    /// trackers, abilities and targets.
    pub fn absorb(&mut self, other: CombatSession) {
        let CombatSession { participants, targets, trackers, activations, .. } = other;
        for combatant in participants {
            if !self.contains(combatant) {
                self.participants.push(combatant);
            }
        }
        self.targets.extend(targets);
        self.trackers.extend(trackers);
        self.activations.extend(activations);
    }

    pub fn target_of(&self, combatant: CombatantId) -> Option<CombatantId> {
        self.targets.get(&combatant).copied()
    }

    pub fn set_target(&mut self, attacker: CombatantId, target: CombatantId) {
        self.targets.insert(attacker, target);
    }

    pub fn clear_target(&mut self, attacker: CombatantId) {
        self.targets.remove(&attacker);
    }

    pub fn target_map(&self) -> &BTreeMap<CombatantId, CombatantId> {
        &self.targets
    }

    pub fn tracker(&self, combatant: CombatantId) -> Option<&EnergyTracker> {
        self.trackers.get(&combatant)
    }

    pub fn tracker_mut(&mut self, combatant: CombatantId) -> Option<&mut EnergyTracker> {
        self.trackers.get_mut(&combatant)
    }

    pub fn activation(&self, combatant: CombatantId) -> Option<&AbilityActivation> {
        self.activations.get(&combatant)
    }

    pub fn activation_mut(&mut self, combatant: CombatantId) -> Option<&mut AbilityActivation> {
        self.activations.get_mut(&combatant)
    }

    /// Returns the activation it replaced, if any.
    pub fn set_activation(
        &mut self,
        combatant: CombatantId,
        activation: AbilityActivation,
    ) -> Option<AbilityActivation> {
        self.activations.insert(combatant, activation)
    }

    pub fn clear_activation(&mut self, combatant: CombatantId) -> Option<AbilityActivation> {
        self.activations.remove(&combatant)
    }

    /// A fight needs at least one player and one NPC in it.
    pub fn has_hostile_pairing(&self) -> bool {
        self.participants.iter().any(|c| c.is_player())
            && self.participants.iter().any(|c| !c.is_player())
    }

    pub fn finish_round(&mut self, any_action: bool) {
        self.round += 1;
        if any_action {
            self.idle_rounds = 0;
        } else {
            self.idle_rounds += 1;
        }
    }

    pub fn idle_rounds(&self) -> u32 {
        self.idle_rounds
    }
}
