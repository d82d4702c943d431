use std::collections::HashMap;

use crate::{game_state::Room, id::Id, line::Line, player::Player, player_coll::PlayerColl};

/// Output produced while handling one actor message, flushed to connections
/// once the message is done.
#[derive(Default)]
pub struct EventWriter {
    pub lines: HashMap<Id<Player>, Vec<Line>>,
}

impl EventWriter {
    pub fn new() -> EventWriter {
        EventWriter::default()
    }

    pub fn tell(&mut self, player_id: Id<Player>, line: Line) {
        self.lines.entry(player_id).or_default().push(line);
    }

    pub fn tell_lines(&mut self, player_id: Id<Player>, lines: &[Line]) {
        self.lines.entry(player_id).or_default().extend_from_slice(lines);
    }

    pub fn tell_many(&mut self, player_ids: impl IntoIterator<Item = Id<Player>>, line: Line) {
        for player_id in player_ids {
            self.tell(player_id, line.clone());
        }
    }

    pub fn tell_room(&mut self, players: &PlayerColl, room_id: Id<Room>, line: Line) {
        self.tell_many(players.ids_in_room(room_id), line);
    }

    pub fn tell_room_except(
        &mut self,
        players: &PlayerColl,
        room_id: Id<Room>,
        except: Id<Player>,
        line: Line,
    ) {
        self.tell_many(players.ids_in_room_except(room_id, except), line);
    }

    #[cfg(test)]
    pub fn text_for(&self, player_id: Id<Player>) -> Vec<String> {
        self.lines
            .get(&player_id)
            .map_or_else(Vec::new, |lines| lines.iter().map(|line| line.text()).collect())
    }
}
