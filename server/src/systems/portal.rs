// island_realm/server/src/systems/portal.rs
use crate::concurrent::task_queue::{SimTask, SimTaskQueue, TaskPriority};
use crate::core::types::{
    EntityPortalEvent, Environment, IslandId, Location, PairName, PlayerID, PlayerPortalEvent, WorldName,
};
use crate::server::islands::IslandsManager;
use crate::systems::provisioning::{PasteReport, StructureProvisioner};
use crate::systems::safe_spot::{SafeSpotOptions, SafeSpotTeleport};
use crate::world::dimensions::IslandWorldManager;
use ahash::AHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Overworld into the nether or end.
    Outbound,
    /// Nether or end back to the overworld.
    Inbound,
}

/// How a crossing is handled, decided from the portal kind and origin world alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Crossing {
    NotApplicable,
    Flat {
        pair: PairName,
        dimension: Environment,
        direction: Direction,
    },
    PerIsland {
        pair: PairName,
        dimension: Environment,
        direction: Direction,
        target_world: WorldName,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortalOutcome {
    /// Left to the platform untouched.
    NotApplicable,
    /// `event.to` was rewritten; the platform completes the move.
    Redirected { to: Location },
    /// Cancelled and sent to the island home.
    HomeTeleport { landing: Location },
    /// Cancelled and placed by this router.
    Teleported { landing: Location },
    /// Cancelled until the counterpart finishes pasting.
    AwaitingProvisioning { island: IslandId, env: Environment },
}

#[derive(Debug)]
struct PendingPaste {
    waiters: SmallVec<[PlayerID; 2]>,
}

/// Decides where portal crossings land and schedules missing counterparts.
pub struct PortalRouter {
    provisioner: Arc<dyn StructureProvisioner>,
    teleport: SafeSpotTeleport,
    tasks: Arc<SimTaskQueue>,
    pending: AHashMap<(IslandId, Environment), PendingPaste>,
}

/// Portal kind plus origin world to crossing type.
pub fn classify(worlds: &IslandWorldManager, event: &PlayerPortalEvent) -> Crossing {
    let Some((pair, origin_env)) = worlds.classify(&event.from.world) else {
        return Crossing::NotApplicable;
    };
    let Some(portal_env) = event.cause.target_environment() else {
        return Crossing::NotApplicable;
    };
    let (dimension, direction) = match origin_env {
        Environment::Normal => (portal_env, Direction::Outbound),
        env if env == portal_env => (env, Direction::Inbound),
        _ => return Crossing::NotApplicable,
    };
    if !pair.is_generate(dimension) {
        return Crossing::NotApplicable;
    }
    let Some(dimension_world) = pair.world(dimension) else {
        return Crossing::NotApplicable;
    };
    if !pair.is_per_island(dimension) {
        return Crossing::Flat { pair: pair.name.clone(), dimension, direction };
    }
    let target_world = match direction {
        Direction::Outbound => dimension_world.clone(),
        Direction::Inbound => pair.overworld.clone(),
    };
    Crossing::PerIsland { pair: pair.name.clone(), dimension, direction, target_world }
}

impl PortalRouter {
    pub fn new(
        provisioner: Arc<dyn StructureProvisioner>,
        teleport: SafeSpotTeleport,
        tasks: Arc<SimTaskQueue>,
    ) -> Self {
        PortalRouter {
            provisioner,
            teleport,
            tasks,
            pending: AHashMap::new(),
        }
    }

    pub fn is_pending(&self, island: &IslandId, env: Environment) -> bool {
        self.pending.contains_key(&(*island, env))
    }

    /// Non-player entities never cross portals inside managed worlds.
    pub fn on_entity_portal(&self, worlds: &IslandWorldManager, event: &mut EntityPortalEvent) -> bool {
        if worlds.in_world(&event.from.world) {
            trace!("Cancelled portal use by entity {} in '{}'", event.entity_id, event.from.world);
            event.cancelled = true;
            return true;
        }
        false
    }

    pub fn on_player_portal(&mut self, registry: &mut IslandsManager, event: &mut PlayerPortalEvent) -> PortalOutcome {
        let worlds = Arc::clone(registry.worlds());
        let crossing = classify(&worlds, event);
        debug!("Portal {:?} by {} from {}: {:?}", event.cause, event.player, event.from, crossing);

        match crossing {
            Crossing::NotApplicable => PortalOutcome::NotApplicable,
            Crossing::Flat { pair, dimension, direction: Direction::Outbound } => {
                let Some(spawn) = worlds.pair(&pair).and_then(|p| p.shared_spawn(dimension)) else {
                    return PortalOutcome::NotApplicable;
                };
                event.to = Some(spawn.clone());
                PortalOutcome::Redirected { to: spawn }
            }
            Crossing::Flat { pair, direction: Direction::Inbound, .. } => {
                if !registry.has_island(&pair, &event.player) {
                    return PortalOutcome::NotApplicable;
                }
                event.cancelled = true;
                match registry.home_teleport(&pair, &event.player) {
                    Some(landing) => PortalOutcome::HomeTeleport { landing },
                    None => {
                        event.cancelled = false;
                        PortalOutcome::NotApplicable
                    }
                }
            }
            Crossing::PerIsland { dimension, direction: Direction::Outbound, target_world, .. } => {
                self.route_outbound(registry, event, dimension, &target_world)
            }
            Crossing::PerIsland { direction: Direction::Inbound, target_world, .. } => {
                self.route_inbound(registry, event, &target_world)
            }
        }
    }

    fn route_inbound(
        &mut self,
        registry: &IslandsManager,
        event: &mut PlayerPortalEvent,
        overworld: &WorldName,
    ) -> PortalOutcome {
        let projected = event.from.projected_into(overworld);
        let target = registry
            .get_island_at(&event.from)
            .and_then(|island| island.spawn_point(Environment::Normal).cloned())
            .unwrap_or(projected);
        event.cancelled = true;
        let landing = self.teleport.teleport(event.player, &target, SafeSpotOptions::portal());
        PortalOutcome::Teleported { landing }
    }

    fn route_outbound(
        &mut self,
        registry: &mut IslandsManager,
        event: &mut PlayerPortalEvent,
        dimension: Environment,
        target_world: &WorldName,
    ) -> PortalOutcome {
        let projected = event.from.projected_into(target_world);
        event.cancelled = true;

        let Some(island) = registry.get_island_at(&event.from) else {
            let landing = self.teleport.teleport(event.player, &projected, SafeSpotOptions::portal());
            return PortalOutcome::Teleported { landing };
        };
        let island_id = island.id;
        let stored = island.spawn_point(dimension).cloned();

        if island.has_counterpart(dimension) {
            let target = match stored {
                Some(spawn) => spawn,
                None => {
                    // Pin the first projection so later crossings do not drift.
                    if let Err(e) = registry.set_spawn_point(&island_id, dimension, projected.clone()) {
                        warn!("[Island {}] Could not record {} spawn: {}", island_id, dimension, e);
                    }
                    projected
                }
            };
            let landing = self.teleport.teleport(event.player, &target, SafeSpotOptions::portal());
            return PortalOutcome::Teleported { landing };
        }

        let key = (island_id, dimension);
        if let Some(pending) = self.pending.get_mut(&key) {
            pending.waiters.push(event.player);
            debug!("[Island {}] {} joined the {} paste queue", island_id, event.player, dimension);
            return PortalOutcome::AwaitingProvisioning { island: island_id, env: dimension };
        }

        let Some(blueprint) = dimension.blueprint_name() else {
            return PortalOutcome::NotApplicable;
        };
        let fallback = stored.unwrap_or(projected);
        let tasks = Arc::clone(&self.tasks);
        let env = dimension;
        let on_complete = Box::new(move |report: PasteReport| {
            tasks.push(
                SimTask::ProvisioningComplete { island: island_id, env, fallback, report },
                TaskPriority::High,
            );
        });

        let mut waiters = SmallVec::new();
        waiters.push(event.player);
        self.pending.insert(key, PendingPaste { waiters });
        info!("[Island {}] Provisioning '{}' into '{}' for {}", island_id, blueprint, target_world, event.player);
        self.provisioner.paste(blueprint, island, target_world, on_complete);
        PortalOutcome::AwaitingProvisioning { island: island_id, env: dimension }
    }

    /// Finishes a paste on the simulation thread and places everyone waiting on it.
    pub fn complete_provisioning(
        &mut self,
        registry: &mut IslandsManager,
        island: IslandId,
        env: Environment,
        fallback: Location,
        report: PasteReport,
    ) -> Vec<(PlayerID, Location)> {
        let waiters = match self.pending.remove(&(island, env)) {
            Some(pending) => pending.waiters,
            None => {
                debug!("[Island {}] {} paste finished after being abandoned", island, env);
                SmallVec::new()
            }
        };

        if registry.mark_generated(&island, env).is_err() {
            warn!("[Island {}] Deleted before its {} paste finished; {} waiter(s) stay put", island, env, waiters.len());
            return Vec::new();
        }
        if let Some(spawn) = report.spawn_point {
            if let Err(e) = registry.set_spawn_point(&island, env, spawn) {
                warn!("[Island {}] Could not record reported {} spawn: {}", island, env, e);
            }
        }
        let target = match registry.get_island_by_id(&island).and_then(|i| i.spawn_point(env).cloned()) {
            Some(spawn) => spawn,
            None => {
                if let Err(e) = registry.set_spawn_point(&island, env, fallback.clone()) {
                    warn!("[Island {}] Could not record {} spawn: {}", island, env, e);
                }
                fallback
            }
        };

        info!("[Island {}] {} counterpart ready, placing {} player(s) at {}", island, env, waiters.len(), target);
        waiters
            .into_iter()
            .map(|player| {
                // No portal at the destination yet, so search for open ground.
                let landing = self.teleport.teleport(player, &target, SafeSpotOptions::exact());
                (player, landing)
            })
            .collect()
    }

    /// Drops a paste that will never report back. The next crossing schedules a new one.
    pub fn abandon_provisioning(&mut self, island: &IslandId, env: Environment) -> Vec<PlayerID> {
        match self.pending.remove(&(*island, env)) {
            Some(pending) => {
                warn!("[Island {}] Abandoned {} paste with {} waiter(s)", island, env, pending.waiters.len());
                pending.waiters.into_vec()
            }
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for PortalRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalRouter").field("pending", &self.pending).finish_non_exhaustive()
    }
}
