// island_realm/server/src/core/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub type PlayerID = Uuid;
pub type IslandId = Uuid;
pub type WorldName = Arc<str>;
/// Name of a dimension-pair (one game mode's overworld/nether/end triple).
pub type PairName = Arc<str>;

// --- Dimension variants ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Normal,
    Nether,
    End,
}

impl Environment {
    pub fn blueprint_name(self) -> Option<&'static str> {
        match self {
            Environment::Normal => None,
            Environment::Nether => Some(crate::core::constants::NETHER_BLUEPRINT),
            Environment::End => Some(crate::core::constants::END_BLUEPRINT),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Normal => "normal",
            Environment::Nether => "nether",
            Environment::End => "end",
        };
        f.write_str(s)
    }
}

// --- Basic Geometric Types ---
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self { BlockPos { x, y, z } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldName,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: WorldName, x: f64, y: f64, z: f64) -> Self {
        Location { world, x, y, z }
    }

    pub fn block(&self) -> BlockPos {
        BlockPos::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
    }

    /// Same coordinates, different world.
    pub fn projected_into(&self, world: &WorldName) -> Location {
        Location { world: world.clone(), x: self.x, y: self.y, z: self.z }
    }

    pub fn at_block(world: WorldName, pos: BlockPos) -> Location {
        Location::new(world, pos.x as f64, pos.y as f64, pos.z as f64)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:.1}, {:.1}, {:.1}]", self.world, self.x, self.y, self.z)
    }
}

// --- Portal events ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalCause {
    NetherPortal,
    EndPortal,
    Other,
}

impl PortalCause {
    pub fn target_environment(self) -> Option<Environment> {
        match self {
            PortalCause::NetherPortal => Some(Environment::Nether),
            PortalCause::EndPortal => Some(Environment::End),
            PortalCause::Other => None,
        }
    }
}

/// A player stepping into a portal. The router may rewrite `to` or cancel.
#[derive(Debug, Clone)]
pub struct PlayerPortalEvent {
    pub player: PlayerID,
    pub cause: PortalCause,
    pub from: Location,
    pub to: Option<Location>,
    pub cancelled: bool,
}

impl PlayerPortalEvent {
    pub fn new(player: PlayerID, cause: PortalCause, from: Location, to: Option<Location>) -> Self {
        PlayerPortalEvent { player, cause, from, to, cancelled: false }
    }
}

#[derive(Debug, Clone)]
pub struct EntityPortalEvent {
    pub entity_id: u64,
    pub from: Location,
    pub cancelled: bool,
}
