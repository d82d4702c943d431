use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("parsing {path}: {source}")]
    Yaml { path: PathBuf, source: serde_yaml::Error },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub debug_commands: bool,
    pub regen_secs: f32,
    pub combat: CombatConfig,
}

/// Tunables for round resolution. Percentages are whole numbers in `0..=100`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombatConfig {
    pub round_secs: f32,
    pub energy_threshold: i32,
    pub bash_multiplier: i32,
    pub base_hit_chance: i32,
    pub hit_chance_per_point: i32,
    pub min_hit_chance: i32,
    pub max_hit_chance: i32,
    pub crit_chance: f64,
    pub crit_multiplier: i32,
    /// A player whose hp lands in `(-unconscious_margin, 0]` is knocked out
    /// instead of killed.
    pub unconscious_margin: i32,
    /// Rounds an aggressor may be absent from the room before the NPC forgets them.
    pub aggression_forget_rounds: u64,
    /// Rounds without a single attempted action before a session is reaped.
    pub idle_reap_rounds: u32,
    pub mob_respawn_secs: f32,
    pub start_room: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 8081,
            data_dir: PathBuf::from("data"),
            debug_commands: false,
            regen_secs: 3.0,
            combat: CombatConfig::default(),
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        CombatConfig {
            round_secs: 2.0,
            energy_threshold: 10,
            bash_multiplier: 2,
            base_hit_chance: 75,
            hit_chance_per_point: 2,
            min_hit_chance: 5,
            max_hit_chance: 95,
            crit_chance: 0.05,
            crit_multiplier: 2,
            unconscious_margin: 10,
            aggression_forget_rounds: 5,
            idle_reap_rounds: 15,
            mob_respawn_secs: 30.0,
            start_room: 0,
        }
    }
}

impl ServerConfig {
    /// Reads the YAML file if it exists and applies `MUD_*` environment overrides.
    pub fn load(path: &Path) -> Result<ServerConfig, ConfigError> {
        let mut config = match fs::read_to_string(path) {
            Ok(text) => serde_yaml::from_str(&text)
                .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                ServerConfig::default()
            }
            Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("MUD_PORT").and_then(|str| str.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Some(dir) = var("MUD_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = var("MUD_ROUND_SECS").and_then(|str| str.parse::<f32>().ok()) {
            self.combat.round_secs = secs;
        }
        debug!("Effective config: {:?}", self);
    }
}
