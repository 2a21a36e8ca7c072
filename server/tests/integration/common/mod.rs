// island_realm/server/tests/integration/common/mod.rs
#![allow(dead_code)]

use island_realm_core::core::config::{GameModeConfig, ServerConfig, ThreadPoolConfig};
use island_realm_core::core::types::{BlockPos, IslandId, Location, PlayerID, WorldName};
use island_realm_core::entities::island::Island;
use island_realm_core::persistence::store::{IslandStore, MemoryStore};
use island_realm_core::server::events::Actor;
use island_realm_core::server::instance::{Collaborators, IslandServer, ProvisionerSource};
use island_realm_core::systems::provisioning::{PasteCallback, PasteReport, StructureProvisioner};
use island_realm_core::systems::safe_spot::{EntityMover, SafeSpotOptions, SafeSpotResolver};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const PAIR: &str = "skyblock";
pub const OVERWORLD: &str = "skyblock";
pub const NETHER: &str = "skyblock_nether";
pub const END: &str = "skyblock_the_end";

/// Returns the requested point unchanged and remembers every query.
#[derive(Default)]
pub struct RecordingResolver {
    pub queries: Mutex<Vec<(Location, PlayerID, SafeSpotOptions)>>,
}

impl SafeSpotResolver for RecordingResolver {
    fn find_safe_spot(&self, point: &Location, entity: PlayerID, options: SafeSpotOptions) -> Location {
        self.queries.lock().push((point.clone(), entity, options));
        point.clone()
    }
}

#[derive(Default)]
pub struct RecordingMover {
    pub moves: Mutex<Vec<(PlayerID, Location)>>,
}

impl RecordingMover {
    pub fn moves_of(&self, player: &PlayerID) -> Vec<Location> {
        self.moves.lock().iter().filter(|(p, _)| p == player).map(|(_, l)| l.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.moves.lock().len()
    }
}

impl EntityMover for RecordingMover {
    fn teleport(&self, entity: PlayerID, destination: &Location) {
        self.moves.lock().push((entity, destination.clone()));
    }
}

pub struct PasteRequest {
    pub blueprint: String,
    pub island: IslandId,
    pub world: WorldName,
}

/// Holds paste callbacks until the test decides how the paste ends.
#[derive(Default)]
pub struct ManualProvisioner {
    pub requests: Mutex<Vec<PasteRequest>>,
    callbacks: Mutex<Vec<PasteCallback>>,
}

impl ManualProvisioner {
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Finishes the oldest outstanding paste.
    pub fn complete_next(&self, report: PasteReport) -> bool {
        let callback = {
            let mut callbacks = self.callbacks.lock();
            if callbacks.is_empty() {
                return false;
            }
            callbacks.remove(0)
        };
        callback(report);
        true
    }

    /// Fails the oldest outstanding paste: its callback is dropped unused.
    pub fn fail_next(&self) -> bool {
        let mut callbacks = self.callbacks.lock();
        if callbacks.is_empty() {
            return false;
        }
        drop(callbacks.remove(0));
        true
    }
}

impl StructureProvisioner for ManualProvisioner {
    fn paste(&self, blueprint: &str, island: &Island, target_world: &WorldName, on_complete: PasteCallback) {
        self.requests.lock().push(PasteRequest {
            blueprint: blueprint.to_string(),
            island: island.id,
            world: target_world.clone(),
        });
        self.callbacks.lock().push(on_complete);
    }
}

pub struct Harness {
    pub server: Arc<IslandServer>,
    pub store: Arc<MemoryStore>,
    pub resolver: Arc<RecordingResolver>,
    pub mover: Arc<RecordingMover>,
    pub provisioner: Arc<ManualProvisioner>,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_backup_period_minutes: 0,
        thread_pools: ThreadPoolConfig { provisioning_threads: 1, io_threads: 1 },
        game_modes: vec![GameModeConfig::with_defaults(PAIR)],
        ..ServerConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config(), Arc::new(MemoryStore::new()))
}

pub fn harness_with(config: ServerConfig, store: Arc<MemoryStore>) -> Harness {
    let resolver = Arc::new(RecordingResolver::default());
    let mover = Arc::new(RecordingMover::default());
    let provisioner = Arc::new(ManualProvisioner::default());
    let store_dyn: Arc<dyn IslandStore> = store.clone();
    let server = IslandServer::new(
        config,
        Collaborators {
            store: store_dyn,
            safe_spot: resolver.clone(),
            mover: mover.clone(),
            provisioner: ProvisionerSource::Direct(provisioner.clone()),
        },
    )
    .expect("server should build");
    Harness { server: Arc::new(server), store, resolver, mover, provisioner }
}

impl Harness {
    pub fn create_island(&self, x: i32, z: i32, owner: PlayerID) -> IslandId {
        self.server
            .with_state(|s| s.islands.create_island(PAIR, BlockPos::new(x, 120, z), Some(owner), Actor::SYSTEM))
            .expect("island should be created")
    }

    pub fn island(&self, id: IslandId) -> Option<Island> {
        self.server.with_state(|s| s.islands.get_island_by_id(&id).cloned())
    }
}

pub fn loc(world: &str, x: f64, y: f64, z: f64) -> Location {
    Location::new(Arc::from(world), x, y, z)
}

/// Polls `condition` until it holds or the timeout passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
