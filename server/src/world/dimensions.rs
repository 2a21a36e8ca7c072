// island_realm/server/src/world/dimensions.rs
use crate::core::config::{GameModeConfig, ServerConfig};
use crate::core::types::{Environment, Location, PairName, WorldName};
use ahash::AHashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// The three parallel worlds of one game mode and the flags that govern them.
#[derive(Debug, Clone)]
pub struct DimensionPair {
    pub name: PairName,
    pub overworld: WorldName,
    pub nether: Option<WorldName>,
    pub end: Option<WorldName>,
    pub nether_generate: bool,
    pub nether_islands: bool,
    pub end_generate: bool,
    pub end_islands: bool,
    pub protection_range: i32,
    pub island_distance: i32,
    nether_spawn: [f64; 3],
    end_spawn: [f64; 3],
}

impl DimensionPair {
    pub fn from_config(mode: &GameModeConfig) -> Self {
        DimensionPair {
            name: Arc::from(mode.name.as_str()),
            overworld: Arc::from(mode.overworld.as_str()),
            nether: mode.nether.as_deref().map(Arc::from),
            end: mode.end.as_deref().map(Arc::from),
            nether_generate: mode.nether_generate,
            nether_islands: mode.nether_islands,
            end_generate: mode.end_generate,
            end_islands: mode.end_islands,
            protection_range: mode.protection_range,
            island_distance: mode.island_distance,
            nether_spawn: mode.nether_spawn,
            end_spawn: mode.end_spawn,
        }
    }

    /// Widest claim a stored record may carry; anything wider would reach a neighbour's slot.
    pub fn max_protection_range(&self) -> i32 {
        (self.island_distance / 2).max(self.protection_range)
    }

    pub fn world(&self, env: Environment) -> Option<&WorldName> {
        match env {
            Environment::Normal => Some(&self.overworld),
            Environment::Nether => self.nether.as_ref(),
            Environment::End => self.end.as_ref(),
        }
    }

    pub fn is_generate(&self, env: Environment) -> bool {
        match env {
            Environment::Normal => true,
            Environment::Nether => self.nether_generate,
            Environment::End => self.end_generate,
        }
    }

    /// True when the dimension holds one counterpart per island rather than a shared world.
    pub fn is_per_island(&self, env: Environment) -> bool {
        match env {
            Environment::Normal => true,
            Environment::Nether => self.nether_islands,
            Environment::End => self.end_islands,
        }
    }

    /// Fixed spawn of a shared nether or end.
    pub fn shared_spawn(&self, env: Environment) -> Option<Location> {
        let coords = match env {
            Environment::Normal => return None,
            Environment::Nether => self.nether_spawn,
            Environment::End => self.end_spawn,
        };
        self.world(env)
            .map(|world| Location::new(world.clone(), coords[0], coords[1], coords[2]))
    }
}

/// Which worlds are managed, and which pair/dimension each one is.
#[derive(Debug, Default)]
pub struct IslandWorldManager {
    pairs: AHashMap<PairName, DimensionPair>,
    worlds: AHashMap<WorldName, (PairName, Environment)>,
}

impl IslandWorldManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let mut manager = Self::new();
        for mode in &config.game_modes {
            manager.register(DimensionPair::from_config(mode));
        }
        info!("World manager tracking {} pair(s), {} world(s)", manager.pairs.len(), manager.worlds.len());
        manager
    }

    pub fn register(&mut self, pair: DimensionPair) {
        for env in [Environment::Normal, Environment::Nether, Environment::End] {
            if let Some(world) = pair.world(env) {
                self.worlds.insert(world.clone(), (pair.name.clone(), env));
            }
        }
        debug!("Registered dimension pair '{}' (overworld '{}')", pair.name, pair.overworld);
        self.pairs.insert(pair.name.clone(), pair);
    }

    pub fn in_world(&self, world: &str) -> bool {
        self.worlds.contains_key(world)
    }

    /// The pair a world belongs to and which dimension of it the world is.
    pub fn classify(&self, world: &str) -> Option<(&DimensionPair, Environment)> {
        let (pair_name, env) = self.worlds.get(world)?;
        self.pairs.get(pair_name).map(|pair| (pair, *env))
    }

    pub fn pair(&self, name: &str) -> Option<&DimensionPair> {
        self.pairs.get(name)
    }

    pub fn pair_names(&self) -> impl Iterator<Item = &PairName> {
        self.pairs.keys()
    }

    pub fn overworld_of(&self, world: &str) -> Option<&WorldName> {
        self.classify(world).map(|(pair, _)| &pair.overworld)
    }
}
