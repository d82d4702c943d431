use std::collections::{hash_map::Entry, BTreeSet, HashMap};

use crate::{
    game_state::Room,
    id::{Id, IdMap},
    player::Player,
};

/// Online players, indexed by room and by lowercase name. Every mutation goes
/// through `modify`, which marks the player dirty when persisted stats change.
#[derive(Debug, Clone, Default)]
pub struct PlayerColl {
    by_id: IdMap<Player>,
    by_room_id: HashMap<Id<Room>, Vec<Id<Player>>>,
    by_name: HashMap<String, Id<Player>>,
    dirty: BTreeSet<Id<Player>>,
}

impl PlayerColl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(&self) -> &IdMap<Player> {
        &self.by_id
    }

    pub fn get(&self, id: &Id<Player>) -> Option<&Player> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn id_by_name(&self, name: &str) -> Option<Id<Player>> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn ids_in_room(&self, room_id: Id<Room>) -> impl Iterator<Item = Id<Player>> + '_ {
        self.by_room_id.get(&room_id).into_iter().flat_map(|ids| ids.iter()).copied()
    }

    pub fn ids_in_room_except(
        &self,
        room_id: Id<Room>,
        except: Id<Player>,
    ) -> impl Iterator<Item = Id<Player>> + '_ {
        self.ids_in_room(room_id).filter(move |id| *id != except)
    }

    pub fn in_room(&self, room_id: Id<Room>) -> impl Iterator<Item = &Player> + '_ {
        self.ids_in_room(room_id).filter_map(move |id| self.by_id.get(&id))
    }

    /// Returns false if the id or the name is already online.
    pub fn insert(&mut self, player: Player) -> bool {
        let key = player.name.to_ascii_lowercase();
        if self.by_id.contains_key(&player.id) || self.by_name.contains_key(&key) {
            return false;
        }
        let Player { id, room_id, .. } = player;
        self.by_name.insert(key, id);
        self.by_id.insert(id, player);
        self.add_to_room_index(id, room_id);
        true
    }

    pub fn modify<T>(&mut self, id: &Id<Player>, f: impl FnOnce(&mut Player) -> T) -> Option<T> {
        let player = self.by_id.get_mut(id)?;
        let before_room_id = player.room_id;
        let before_record = player.to_record();
        let result = f(player);

        let after_room_id = player.room_id;
        let changed = player.to_record() != before_record;
        if before_room_id != after_room_id {
            self.remove_from_room_index(*id, before_room_id);
            self.add_to_room_index(*id, after_room_id);
        }
        if changed {
            self.dirty.insert(*id);
        }
        Some(result)
    }

    pub fn remove(&mut self, id: &Id<Player>) -> Option<Player> {
        let removed = self.by_id.remove(id)?;
        self.remove_from_room_index(*id, removed.room_id);
        self.by_name.remove(&removed.name.to_ascii_lowercase());
        self.dirty.remove(id);
        Some(removed)
    }

    /// Drains the set of players whose persisted stats changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<Id<Player>> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    fn add_to_room_index(&mut self, player_id: Id<Player>, room_id: Id<Room>) {
        self.by_room_id.entry(room_id).or_default().push(player_id);
    }

    fn remove_from_room_index(&mut self, player_id: Id<Player>, room_id: Id<Room>) {
        let entry = self
            .by_room_id
            .entry(room_id)
            .and_modify(|ids| ids.retain(|id_in_room| *id_in_room != player_id));
        if let Entry::Occupied(e) = entry {
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_updates_room_index_and_marks_dirty() {
        let mut players = PlayerColl::new();
        let id = Id::new(1);
        assert!(players.insert(Player::new(id, "Alice".to_string(), Id::new(0))));
        assert!(!players.insert(Player::new(Id::new(2), "alice".to_string(), Id::new(0))));

        players.modify(&id, |player| player.room_id = Id::new(3));
        assert_eq!(players.ids_in_room(Id::new(0)).count(), 0);
        assert_eq!(players.ids_in_room(Id::new(3)).collect::<Vec<_>>(), vec![id]);
        assert_eq!(players.take_dirty(), vec![id]);
        assert!(players.take_dirty().is_empty());
        assert_eq!(players.id_by_name("ALICE"), Some(id));
    }

    #[test]
    fn transient_changes_are_not_dirty() {
        let mut players = PlayerColl::new();
        let id = Id::new(1);
        players.insert(Player::new(id, "Bob".to_string(), Id::new(0)));
        players.modify(&id, |player| player.unconscious = true);
        assert!(players.take_dirty().is_empty());
        assert!(players.modify(&Id::new(9), |_| ()).is_none());
    }
}
