// island_realm/server/src/systems/safe_spot.rs
use crate::core::types::{Location, PlayerID};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SafeSpotOptions {
    /// Search around a portal frame rather than for open ground.
    pub is_portal: bool,
}

impl SafeSpotOptions {
    pub fn portal() -> Self {
        SafeSpotOptions { is_portal: true }
    }

    pub fn exact() -> Self {
        SafeSpotOptions { is_portal: false }
    }
}

/// Finds a landing spot near `point`. Never returns a location inside solid matter.
pub trait SafeSpotResolver: Send + Sync {
    fn find_safe_spot(&self, point: &Location, entity: PlayerID, options: SafeSpotOptions) -> Location;
}

/// Moves a player to a location on the platform.
pub trait EntityMover: Send + Sync {
    fn teleport(&self, entity: PlayerID, destination: &Location);
}

/// Resolve-then-move, used for every teleport this crate finalizes itself.
#[derive(Clone)]
pub struct SafeSpotTeleport {
    resolver: Arc<dyn SafeSpotResolver>,
    mover: Arc<dyn EntityMover>,
}

impl SafeSpotTeleport {
    pub fn new(resolver: Arc<dyn SafeSpotResolver>, mover: Arc<dyn EntityMover>) -> Self {
        SafeSpotTeleport { resolver, mover }
    }

    pub fn resolve(&self, point: &Location, entity: PlayerID, options: SafeSpotOptions) -> Location {
        self.resolver.find_safe_spot(point, entity, options)
    }

    pub fn teleport(&self, entity: PlayerID, point: &Location, options: SafeSpotOptions) -> Location {
        let landing = self.resolve(point, entity, options);
        debug!("Teleporting {} to {} (requested {}, portal={})", entity, landing, point, options.is_portal);
        self.mover.teleport(entity, &landing);
        landing
    }
}

impl std::fmt::Debug for SafeSpotTeleport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeSpotTeleport").finish_non_exhaustive()
    }
}
