use serde::Deserialize;

use crate::{
    aggression::TargetPolicy, combatant::Weapon, game_state::Room, id::Id, named::Named,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobSpawn {
    pub mob_template_id: Id<MobTemplate>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobTemplate {
    pub id: Id<MobTemplate>,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub description: String,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub weapon: Weapon,
    /// Non-hostile NPCs (shopkeepers, quest givers) cannot be attacked.
    #[serde(default = "default_hostile")]
    pub hostile: bool,
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub loot: Vec<String>,
    #[serde(default)]
    pub target_policy: TargetPolicy,
}

fn default_hostile() -> bool {
    true
}

impl Named for MobTemplate {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_aliases(&self) -> &[String] {
        &self.aliases
    }
}

#[derive(Clone, Debug)]
pub struct MobInstance {
    pub id: Id<MobInstance>,
    pub room_id: Id<Room>,
    pub template: MobTemplate,
    pub hp: i32,
}

impl MobInstance {
    pub fn spawn(id: Id<MobInstance>, room_id: Id<Room>, template: MobTemplate) -> MobInstance {
        let hp = template.max_hp;
        MobInstance { id, room_id, template, hp }
    }
}
