use std::collections::{BTreeMap, HashMap};

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    ability::AbilityDefinition,
    aggression::TargetPolicy,
    combatant::Weapon,
    config::{CombatConfig, ServerConfig},
    game_logic,
    game_state::{GameState, LoadedGameState, Room},
    id::Id,
    mob::{MobInstance, MobSpawn, MobTemplate},
    player::Player,
};

pub const TEMPLE: u64 = 0;
pub const ARENA: u64 = 1;
pub const CELLAR: u64 = 2;

pub fn magic_missile() -> AbilityDefinition {
    AbilityDefinition {
        id: "magic-missile".to_string(),
        name: "magic missile".to_string(),
        aliases: vec!["mm".to_string()],
        mp_cost_per_round: 3,
        duration_rounds: 5,
        cooldown_rounds: 0,
        min_level: 1,
        min_damage: 5,
        max_damage: 5,
        crit_chance: 0.0,
    }
}

pub fn goblin_template() -> MobTemplate {
    MobTemplate {
        id: Id::new(0),
        name: "goblin".to_string(),
        aliases: vec![],
        description: "A scrawny goblin.".to_string(),
        max_hp: 100,
        attack: 10,
        defense: 10,
        weapon: Weapon { name: "club".to_string(), min_damage: 2, max_damage: 2, speed: 10 },
        hostile: true,
        xp: 20,
        loot: vec!["rusty dagger".to_string()],
        target_policy: TargetPolicy::LowestHealth,
    }
}

pub fn shopkeeper_template() -> MobTemplate {
    MobTemplate {
        id: Id::new(1),
        name: "shopkeeper".to_string(),
        hostile: false,
        xp: 0,
        loot: vec![],
        ..goblin_template()
    }
}

fn room(id: u64, name: &str, exits: &[(&str, u64)], safe: bool, spawns: &[u64]) -> Room {
    Room {
        id: Id::new(id),
        name: name.to_string(),
        description: format!("The {}.", name.to_lowercase()),
        exits: exits.iter().map(|(dir, to)| (dir.to_string(), Id::new(*to))).collect::<BTreeMap<_, _>>(),
        safe,
        mob_spawns: spawns.iter().map(|t| MobSpawn { mob_template_id: Id::new(*t) }).collect(),
    }
}

/// A safe temple, an arena with one goblin, and an empty cellar beyond it.
/// Every swing hits and nothing crits, so damage is exactly the weapon roll.
pub fn test_state() -> GameState {
    let rooms = vec![
        room(TEMPLE, "Temple", &[("east", ARENA)], true, &[]),
        room(ARENA, "Arena", &[("west", TEMPLE), ("down", CELLAR)], false, &[0]),
        room(CELLAR, "Cellar", &[("up", ARENA)], false, &[]),
    ];
    let loaded = LoadedGameState {
        rooms: rooms.into_iter().map(|room| (room.id, room)).collect::<HashMap<_, _>>(),
        mob_templates: [goblin_template(), shopkeeper_template()]
            .into_iter()
            .map(|template| (template.id, template))
            .collect(),
        abilities: vec![magic_missile()],
    };
    let config = ServerConfig {
        combat: CombatConfig {
            base_hit_chance: 100,
            max_hit_chance: 100,
            crit_chance: 0.0,
            start_room: TEMPLE,
            ..CombatConfig::default()
        },
        ..ServerConfig::default()
    };
    let mut state = GameState::with_rng(loaded, config, StdRng::seed_from_u64(7));
    game_logic::initialize(&mut state);
    state
}

/// Adds a player in the arena wielding a sword that always does 4 damage.
pub fn add_player(state: &mut GameState, name: &str) -> Id<Player> {
    let id = Id::new(100 + state.players.len() as u64);
    let mut player = Player::new(id, name.to_string(), Id::new(ARENA));
    player.weapon = Weapon { name: "sword".to_string(), min_damage: 4, max_damage: 4, speed: 10 };
    assert!(state.players.insert(player));
    id
}

pub fn goblin_id(state: &GameState) -> Id<MobInstance> {
    state
        .mobs
        .in_room(Id::new(ARENA))
        .find(|mob| mob.template.name == "goblin")
        .map(|mob| mob.id)
        .expect("arena goblin")
}

pub fn spawn_mob(state: &mut GameState, room_id: Id<Room>) -> Id<MobInstance> {
    spawn_template(state, room_id, goblin_template())
}

pub fn spawn_template(
    state: &mut GameState,
    room_id: Id<Room>,
    template: MobTemplate,
) -> Id<MobInstance> {
    let id = state.mob_id_source.next();
    state.mobs.insert(MobInstance::spawn(id, room_id, template));
    id
}
