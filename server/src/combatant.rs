use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{game_state::Room, id::Id, mob::MobInstance, player::Player};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub name: String,
    pub min_damage: i32,
    pub max_damage: i32,
    /// Energy accrued per round while wielding this weapon.
    pub speed: i32,
}

impl Weapon {
    pub fn fists() -> Weapon {
        Weapon { name: "fists".to_string(), min_damage: 1, max_damage: 4, speed: 10 }
    }
}

/// Tag naming one side of a fight. Ordering puts players before mobs, which
/// keeps any map keyed by it stable between runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CombatantId {
    Player(Id<Player>),
    Mob(Id<MobInstance>),
}

impl CombatantId {
    pub fn player(&self) -> Option<Id<Player>> {
        match self {
            CombatantId::Player(id) => Some(*id),
            CombatantId::Mob(_) => None,
        }
    }

    pub fn mob(&self) -> Option<Id<MobInstance>> {
        match self {
            CombatantId::Mob(id) => Some(*id),
            CombatantId::Player(_) => None,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, CombatantId::Player(_))
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombatantId::Player(id) => write!(f, "player:{}", id),
            CombatantId::Mob(id) => write!(f, "mob:{}", id),
        }
    }
}

/// What the round resolver needs from anything that can stand in a fight.
pub trait Combatant {
    /// Name as it reads mid-sentence: "Alice", "the goblin".
    fn display_name(&self) -> String;

    fn room_id(&self) -> Id<Room>;
    fn hp(&self) -> i32;
    fn max_hp(&self) -> i32;
    fn attack(&self) -> i32;
    fn defense(&self) -> i32;
    fn weapon(&self) -> &Weapon;

    fn apply_damage(&mut self, damage: i32);

    fn is_alive(&self) -> bool {
        self.hp() > 0
    }

    fn can_fight(&self) -> bool {
        self.is_alive()
    }
}

impl Combatant for Player {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn room_id(&self) -> Id<Room> {
        self.room_id
    }

    fn hp(&self) -> i32 {
        self.hp
    }

    fn max_hp(&self) -> i32 {
        self.max_hp
    }

    fn attack(&self) -> i32 {
        self.attack
    }

    fn defense(&self) -> i32 {
        self.defense
    }

    fn weapon(&self) -> &Weapon {
        &self.weapon
    }

    fn apply_damage(&mut self, damage: i32) {
        self.hp -= damage;
    }

    fn can_fight(&self) -> bool {
        self.hp > 0 && !self.unconscious
    }
}

impl Combatant for MobInstance {
    fn display_name(&self) -> String {
        format!("the {}", self.template.name)
    }

    fn room_id(&self) -> Id<Room> {
        self.room_id
    }

    fn hp(&self) -> i32 {
        self.hp
    }

    fn max_hp(&self) -> i32 {
        self.template.max_hp
    }

    fn attack(&self) -> i32 {
        self.template.attack
    }

    fn defense(&self) -> i32 {
        self.template.defense
    }

    fn weapon(&self) -> &Weapon {
        &self.template.weapon
    }

    fn apply_damage(&mut self, damage: i32) {
        self.hp -= damage;
    }
}
