// island_realm/server/src/core/config.rs
use crate::core::constants::*;
use crate::core::error::{ServerError, ServerResult};
use crate::core::ranks::Rank;
use crate::systems::team::TeamOperation;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    pub provisioning_threads: usize,
    pub io_threads: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        ThreadPoolConfig {
            provisioning_threads: 2,
            io_threads: 1,
        }
    }
}

/// One dimension-pair: the overworld plus its optional nether and end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameModeConfig {
    pub name: String,
    pub overworld: String,
    #[serde(default)]
    pub nether: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default = "default_true")]
    pub nether_generate: bool,
    #[serde(default = "default_true")]
    pub nether_islands: bool,
    #[serde(default = "default_true")]
    pub end_generate: bool,
    #[serde(default = "default_true")]
    pub end_islands: bool,
    #[serde(default = "default_protection_range")]
    pub protection_range: i32,
    #[serde(default = "default_island_distance")]
    pub island_distance: i32,
    #[serde(default = "default_nether_spawn")]
    pub nether_spawn: [f64; 3],
    #[serde(default = "default_end_spawn")]
    pub end_spawn: [f64; 3],
}

fn default_true() -> bool { true }
fn default_protection_range() -> i32 { DEFAULT_PROTECTION_RANGE }
fn default_island_distance() -> i32 { DEFAULT_ISLAND_DISTANCE }
fn default_nether_spawn() -> [f64; 3] { DEFAULT_NETHER_SPAWN }
fn default_end_spawn() -> [f64; 3] { DEFAULT_END_SPAWN }

impl GameModeConfig {
    /// A pair named `name` with worlds `name`, `name_nether`, `name_the_end`, everything per-island.
    pub fn with_defaults(name: &str) -> Self {
        GameModeConfig {
            name: name.to_string(),
            overworld: name.to_string(),
            nether: Some(format!("{}_nether", name)),
            end: Some(format!("{}_the_end", name)),
            nether_generate: true,
            nether_islands: true,
            end_generate: true,
            end_islands: true,
            protection_range: DEFAULT_PROTECTION_RANGE,
            island_distance: DEFAULT_ISLAND_DISTANCE,
            nether_spawn: DEFAULT_NETHER_SPAWN,
            end_spawn: DEFAULT_END_SPAWN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub tick_rate: u64,
    pub database_backup_period_minutes: u64,
    pub invite_cooldown_minutes: u64,
    pub thread_pools: ThreadPoolConfig,
    /// Overrides of the minimum rank per team operation.
    pub rank_commands: HashMap<TeamOperation, Rank>,
    pub game_modes: Vec<GameModeConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            tick_rate: SERVER_TICK_RATE,
            database_backup_period_minutes: DEFAULT_BACKUP_PERIOD_MINUTES,
            invite_cooldown_minutes: DEFAULT_INVITE_COOLDOWN_MINUTES,
            thread_pools: ThreadPoolConfig::default(),
            rank_commands: HashMap::new(),
            game_modes: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_str(yaml: &str) -> ServerResult<Self> {
        let config: ServerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&raw)?;
        info!("Loaded config from {:?}: {} dimension pair(s)", path, config.game_modes.len());
        Ok(config)
    }

    pub fn rank_command(&self, operation: TeamOperation) -> Rank {
        self.rank_commands
            .get(&operation)
            .copied()
            .unwrap_or_else(|| operation.default_min_rank())
    }

    pub fn invite_cooldown(&self) -> Duration {
        Duration::from_secs(self.invite_cooldown_minutes * 60)
    }

    /// Number of ticks between two periodic saves. Zero disables them.
    pub fn backup_period_ticks(&self) -> u64 {
        self.database_backup_period_minutes * 60 * self.tick_rate
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(ServerError::ConfigError(format!(
                "tick_rate must be between 1 and {}, got {}",
                MAX_TICK_RATE, self.tick_rate
            )));
        }
        let mut pair_names = HashSet::new();
        let mut world_names = HashSet::new();
        for mode in &self.game_modes {
            if !pair_names.insert(mode.name.as_str()) {
                return Err(ServerError::ConfigError(format!("duplicate game mode '{}'", mode.name)));
            }
            if mode.protection_range <= 0 {
                return Err(ServerError::ConfigError(format!(
                    "game mode '{}': protection_range must be positive, got {}",
                    mode.name, mode.protection_range
                )));
            }
            if mode.island_distance <= 0 {
                return Err(ServerError::ConfigError(format!(
                    "game mode '{}': island_distance must be positive, got {}",
                    mode.name, mode.island_distance
                )));
            }
            // Neighbouring claims sit one island_distance apart.
            if mode.protection_range > mode.island_distance / 2 {
                return Err(ServerError::ConfigError(format!(
                    "game mode '{}': protection_range {} exceeds half the island_distance {}",
                    mode.name, mode.protection_range, mode.island_distance
                )));
            }
            if mode.nether_generate && mode.nether.is_none() {
                return Err(ServerError::ConfigError(format!(
                    "game mode '{}': nether_generate is set but no nether world is named",
                    mode.name
                )));
            }
            if mode.end_generate && mode.end.is_none() {
                return Err(ServerError::ConfigError(format!(
                    "game mode '{}': end_generate is set but no end world is named",
                    mode.name
                )));
            }
            let worlds = std::iter::once(&mode.overworld).chain(mode.nether.iter()).chain(mode.end.iter());
            for world in worlds {
                if !world_names.insert(world.as_str()) {
                    return Err(ServerError::ConfigError(format!("world '{}' is used twice", world)));
                }
            }
        }
        Ok(())
    }
}
