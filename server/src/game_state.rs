use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
};

use rand::{rngs::StdRng, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

use crate::{
    ability::{AbilityCatalog, AbilityDefinition},
    combat_system::{CombatSystem, World},
    config::ServerConfig,
    id::{Id, IdMap, IdSource},
    mob::{MobInstance, MobSpawn, MobTemplate},
    mob_coll::MobColl,
    player::Player,
    player_coll::PlayerColl,
    rewards::Reward,
    tick::Tick,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("parsing {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("room {room:?} spawns unknown mob template {template:?}")]
    UnknownTemplate { room: Id<Room>, template: Id<MobTemplate> },
    #[error("start room {0:?} does not exist")]
    NoStartRoom(Id<Room>),
}

pub struct LoadedGameState {
    pub rooms: IdMap<Room>,
    pub mob_templates: IdMap<MobTemplate>,
    pub abilities: Vec<AbilityDefinition>,
}

impl LoadedGameState {
    pub fn load(data_dir: &Path) -> Result<LoadedGameState, LoadError> {
        let rooms: Vec<Room> = read_json(&data_dir.join("rooms.json"))?;
        let mob_templates: Vec<MobTemplate> = read_json(&data_dir.join("mobs.json"))?;
        let abilities = read_json(&data_dir.join("abilities.json"))?;
        Ok(LoadedGameState {
            rooms: rooms.into_iter().map(|room| (room.id, room)).collect(),
            mob_templates: mob_templates.into_iter().map(|mob| (mob.id, mob)).collect(),
            abilities,
        })
    }

    pub fn validate(&self, start_room: Id<Room>) -> Result<(), LoadError> {
        if !self.rooms.contains_key(&start_room) {
            return Err(LoadError::NoStartRoom(start_room));
        }
        for room in self.rooms.values() {
            for spawn in &room.mob_spawns {
                if !self.mob_templates.contains_key(&spawn.mob_template_id) {
                    return Err(LoadError::UnknownTemplate {
                        room: room.id,
                        template: spawn.mob_template_id,
                    });
                }
            }
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text =
        fs::read_to_string(path).map_err(|source| LoadError::Io { path: path.into(), source })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Json { path: path.into(), source })
}

/// Everything the actor owns. Mutated only from the actor task.
pub struct GameState {
    pub ticks: Tick,
    pub config: ServerConfig,
    pub players: PlayerColl,
    pub rooms: IdMap<Room>,
    pub mob_templates: IdMap<MobTemplate>,
    pub mobs: MobColl,
    pub mob_id_source: IdSource<MobInstance>,
    pub scheduled_mob_spawns: BTreeMap<Tick, Vec<(Id<Room>, Id<MobTemplate>)>>,
    pub abilities: AbilityCatalog,
    pub combat: CombatSystem,
    /// Rewards earned by players who were still fighting when they were earned.
    pub pending_rewards: HashMap<Id<Player>, Vec<Reward>>,
    pub rng: StdRng,
}

impl GameState {
    pub fn new(loaded_game_state: LoadedGameState, config: ServerConfig) -> GameState {
        Self::with_rng(loaded_game_state, config, StdRng::from_entropy())
    }

    pub fn with_rng(
        loaded_game_state: LoadedGameState,
        config: ServerConfig,
        rng: StdRng,
    ) -> GameState {
        let LoadedGameState { rooms, mob_templates, abilities } = loaded_game_state;
        GameState {
            ticks: Tick::zero(),
            combat: CombatSystem::new(config.combat.clone()),
            config,
            players: PlayerColl::new(),
            rooms,
            mob_templates,
            mobs: MobColl::new(),
            mob_id_source: IdSource::new(0),
            scheduled_mob_spawns: BTreeMap::new(),
            abilities: AbilityCatalog::new(abilities),
            pending_rewards: HashMap::new(),
            rng,
        }
    }

    pub fn world(&self) -> World<'_> {
        World { rooms: &self.rooms, players: &self.players, mobs: &self.mobs }
    }

    /// Splits the borrow so a facade call can mutate combat while reading the world.
    pub fn combat_and_world(&mut self) -> (&mut CombatSystem, World<'_>) {
        let world = World { rooms: &self.rooms, players: &self.players, mobs: &self.mobs };
        (&mut self.combat, world)
    }

    pub fn start_room(&self) -> Id<Room> {
        Id::new(self.config.combat.start_room)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Id<Room>,
    pub name: String,
    pub description: String,
    pub exits: BTreeMap<String, Id<Room>>,
    /// No fighting of any kind in here.
    #[serde(default)]
    pub safe: bool,
    #[serde(default)]
    pub mob_spawns: Vec<MobSpawn>,
}

impl Room {
    pub fn exit_direction_to(&self, room_id: Id<Room>) -> Option<&str> {
        self.exits
            .iter()
            .find(|(_, to)| **to == room_id)
            .map(|(direction, _)| direction.as_str())
    }
}
