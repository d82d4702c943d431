use std::collections::{hash_map::Entry, BTreeMap, HashMap};

use crate::{game_state::Room, id::Id, mob::MobInstance};

/// Live NPCs, indexed by room. Iteration by id is ordered so that target
/// resolution ("kill goblin" with two goblins present) is stable.
#[derive(Debug, Clone, Default)]
pub struct MobColl {
    by_id: BTreeMap<Id<MobInstance>, MobInstance>,
    by_room_id: HashMap<Id<Room>, Vec<Id<MobInstance>>>,
}

impl MobColl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Id<MobInstance>) -> Option<&MobInstance> {
        self.by_id.get(id)
    }

    pub fn get_mut(&mut self, id: &Id<MobInstance>) -> Option<&mut MobInstance> {
        self.by_id.get_mut(id)
    }

    pub fn in_room(&self, room_id: Id<Room>) -> impl Iterator<Item = &MobInstance> + '_ {
        self.by_room_id
            .get(&room_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(move |id| self.by_id.get(id))
    }

    pub fn insert(&mut self, mob: MobInstance) {
        let MobInstance { id, room_id, .. } = mob;
        if self.by_id.insert(id, mob).is_some() {
            unreachable!("mob ids come from a single IdSource");
        }
        self.by_room_id.entry(room_id).or_default().push(id);
    }

    pub fn remove(&mut self, id: &Id<MobInstance>) -> Option<MobInstance> {
        let removed = self.by_id.remove(id)?;
        let entry = self
            .by_room_id
            .entry(removed.room_id)
            .and_modify(|ids| ids.retain(|id_in_room| id_in_room != id));
        if let Entry::Occupied(e) = entry {
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        Some(removed)
    }
}
