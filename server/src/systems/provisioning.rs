// island_realm/server/src/systems/provisioning.rs
use crate::core::error::ServerResult;
use crate::core::types::{IslandId, Location, WorldName};
use crate::entities::island::Island;
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a finished paste tells the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteReport {
    /// Spawn marker declared by the blueprint, if it has one.
    pub spawn_point: Option<Location>,
}

pub type PasteCallback = Box<dyn FnOnce(PasteReport) + Send + 'static>;

/// Pastes a missing nether/end counterpart.
///
/// Implementations call `on_complete` exactly once when the paste succeeds and
/// never when it fails. The callback may run on any thread.
pub trait StructureProvisioner: Send + Sync {
    fn paste(&self, blueprint: &str, island: &Island, target_world: &WorldName, on_complete: PasteCallback);
}

/// Blocking paste engine; the structure itself is outside this crate.
pub trait BlueprintPaster: Send + Sync {
    fn paste_blocking(
        &self,
        blueprint: &str,
        island: IslandId,
        origin: &Location,
    ) -> ServerResult<PasteReport>;
}

/// Runs a blocking [`BlueprintPaster`] on the provisioning pool.
pub struct PooledProvisioner {
    pool: Arc<ThreadPool>,
    paster: Arc<dyn BlueprintPaster>,
}

impl PooledProvisioner {
    pub fn new(pool: Arc<ThreadPool>, paster: Arc<dyn BlueprintPaster>) -> Self {
        PooledProvisioner { pool, paster }
    }
}

impl StructureProvisioner for PooledProvisioner {
    fn paste(&self, blueprint: &str, island: &Island, target_world: &WorldName, on_complete: PasteCallback) {
        let paster = Arc::clone(&self.paster);
        let blueprint = blueprint.to_string();
        let island_id = island.id;
        let origin = island.center_in(target_world);
        debug!("[Island {}] Queued '{}' paste at {}", island_id, blueprint, origin);

        self.pool.spawn(move || {
            let started = Instant::now();
            match paster.paste_blocking(&blueprint, island_id, &origin) {
                Ok(report) => {
                    info!(
                        "[Island {}] Pasted '{}' in {:?}",
                        island_id,
                        blueprint,
                        started.elapsed()
                    );
                    on_complete(report);
                }
                Err(e) => {
                    warn!("[Island {}] Paste of '{}' failed: {}", island_id, blueprint, e);
                }
            }
        });
    }
}
