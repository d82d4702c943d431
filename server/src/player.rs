use std::collections::HashMap;

use crate::{
    combatant::Weapon, game_state::Room, id::Id, persistence::PlayerRecord, tick::Tick,
};

#[derive(Clone, Debug)]
pub struct Player {
    pub id: Id<Player>,
    pub name: String,
    pub room_id: Id<Room>,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub attack: i32,
    pub defense: i32,
    pub weapon: Weapon,
    pub xp: u32,
    pub level: u32,
    pub inventory: Vec<String>,
    pub unconscious: bool,
    /// Tick at which each ability comes off cooldown.
    pub ability_ready_at: HashMap<String, Tick>,
}

impl Player {
    pub fn new(id: Id<Player>, name: String, room_id: Id<Room>) -> Player {
        Player {
            id,
            name,
            room_id,
            hp: 100,
            max_hp: 100,
            mana: 20,
            max_mana: 20,
            attack: 10,
            defense: 10,
            weapon: Weapon::fists(),
            xp: 0,
            level: 1,
            inventory: Vec::new(),
            unconscious: false,
            ability_ready_at: HashMap::new(),
        }
    }

    pub fn from_record(id: Id<Player>, record: PlayerRecord) -> Player {
        let PlayerRecord {
            name,
            room_id,
            hp,
            max_hp,
            mana,
            max_mana,
            attack,
            defense,
            weapon,
            xp,
            level,
            inventory,
        } = record;
        Player {
            id,
            name,
            room_id,
            // Nobody logs back in knocked out.
            hp: hp.max(1),
            max_hp,
            mana,
            max_mana,
            attack,
            defense,
            weapon,
            xp,
            level,
            inventory,
            unconscious: false,
            ability_ready_at: HashMap::new(),
        }
    }

    pub fn to_record(&self) -> PlayerRecord {
        PlayerRecord {
            name: self.name.clone(),
            room_id: self.room_id,
            hp: self.hp,
            max_hp: self.max_hp,
            mana: self.mana,
            max_mana: self.max_mana,
            attack: self.attack,
            defense: self.defense,
            weapon: self.weapon.clone(),
            xp: self.xp,
            level: self.level,
            inventory: self.inventory.clone(),
        }
    }
}
