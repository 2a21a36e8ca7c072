// island_realm/server/src/server/instance.rs
use crate::concurrent::task_queue::{SimTask, SimTaskQueue, TaskPriority};
use crate::concurrent::thread_pools::ThreadPoolSystem;
use crate::core::config::ServerConfig;
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::{EntityPortalEvent, PlayerPortalEvent};
use crate::persistence::store::IslandStore;
use crate::server::islands::{IslandsManager, LoadSummary};
use crate::server::team_commands::TeamCommands;
use crate::systems::portal::{PortalOutcome, PortalRouter};
use crate::systems::provisioning::{BlueprintPaster, PooledProvisioner, StructureProvisioner};
use crate::systems::safe_spot::{EntityMover, SafeSpotResolver, SafeSpotTeleport};
use crate::world::dimensions::IslandWorldManager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where structure pastes come from.
pub enum ProvisionerSource {
    /// An asynchronous provisioner used as is.
    Direct(Arc<dyn StructureProvisioner>),
    /// A blocking engine run on the provisioning pool.
    Pooled(Arc<dyn BlueprintPaster>),
}

/// The platform-side collaborators the server is wired to.
pub struct Collaborators {
    pub store: Arc<dyn IslandStore>,
    pub safe_spot: Arc<dyn SafeSpotResolver>,
    pub mover: Arc<dyn EntityMover>,
    pub provisioner: ProvisionerSource,
}

/// Everything only the simulation thread touches.
pub struct SimulationState {
    pub islands: IslandsManager,
    pub router: PortalRouter,
    pub team: TeamCommands,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub saved: usize,
    pub failed: usize,
    pub deleted: usize,
}

pub struct IslandServer {
    pub config: Arc<ServerConfig>,
    pub worlds: Arc<IslandWorldManager>,
    pub thread_pools: Arc<ThreadPoolSystem>,
    pub tasks: Arc<SimTaskQueue>,
    pub(crate) store: Arc<dyn IslandStore>,
    pub(crate) state: Mutex<SimulationState>,
    /// Serializes background saves against the final shutdown save.
    pub(crate) save_lock: Arc<Mutex<()>>,
    pub tick_counter: AtomicU64,
    pub is_shutting_down: Arc<AtomicBool>,
}

impl IslandServer {
    pub fn new(config: ServerConfig, collaborators: Collaborators) -> anyhow::Result<Self> {
        info!("Initializing IslandServer...");
        config.validate()?;
        let config = Arc::new(config);

        let thread_pools = Arc::new(ThreadPoolSystem::new(&config.thread_pools)?);
        info!(
            "Thread pools ready: {} provisioning, {} io",
            thread_pools.provisioning_pool.current_num_threads(),
            thread_pools.io_pool.current_num_threads()
        );

        let worlds = Arc::new(IslandWorldManager::from_config(&config));
        let tasks = Arc::new(SimTaskQueue::new());
        let teleport = SafeSpotTeleport::new(collaborators.safe_spot, collaborators.mover);

        let provisioner: Arc<dyn StructureProvisioner> = match collaborators.provisioner {
            ProvisionerSource::Direct(p) => p,
            ProvisionerSource::Pooled(paster) => {
                Arc::new(PooledProvisioner::new(Arc::clone(&thread_pools.provisioning_pool), paster))
            }
        };

        let state = SimulationState {
            islands: IslandsManager::new(Arc::clone(&worlds), teleport.clone()),
            router: PortalRouter::new(provisioner, teleport, Arc::clone(&tasks)),
            team: TeamCommands::from_config(&config),
        };

        Ok(IslandServer {
            config,
            worlds,
            thread_pools,
            tasks,
            store: collaborators.store,
            state: Mutex::new(state),
            save_lock: Arc::new(Mutex::new(())),
            tick_counter: AtomicU64::new(0),
            is_shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Runs `f` with the simulation state. Call from the simulation thread only.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SimulationState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    pub fn island_count(&self) -> usize {
        self.state.lock().islands.island_count()
    }

    /// Loads every configured pair. A store that cannot list a pair fails the load.
    pub fn load_all(&self) -> ServerResult<LoadSummary> {
        let started = Instant::now();
        let mut total = LoadSummary::default();
        let mut state = self.state.lock();
        for mode in &self.config.game_modes {
            let records = self.store.load(&mode.name)?;
            let summary = state.islands.load(&mode.name, records);
            total.loaded += summary.loaded;
            total.skipped += summary.skipped;
        }
        info!(
            "Island registry loaded: {} island(s), {} skipped, in {:?}",
            total.loaded,
            total.skipped,
            started.elapsed()
        );
        Ok(total)
    }

    pub fn handle_player_portal(&self, event: &mut PlayerPortalEvent) -> PortalOutcome {
        let mut state = self.state.lock();
        let SimulationState { islands, router, .. } = &mut *state;
        router.on_player_portal(islands, event)
    }

    pub fn handle_entity_portal(&self, event: &mut EntityPortalEvent) -> bool {
        self.state.lock().router.on_entity_portal(&self.worlds, event)
    }

    /// Applies queued background results. Returns how many tasks ran.
    pub(crate) fn drain_tasks(&self, max: usize) -> usize {
        let batch = self.tasks.pop_batch(max);
        if batch.is_empty() {
            return 0;
        }
        let mut state = self.state.lock();
        let SimulationState { islands, router, .. } = &mut *state;
        let count = batch.len();
        for task in batch {
            match task {
                SimTask::ProvisioningComplete { island, env, fallback, report } => {
                    let placed = router.complete_provisioning(islands, island, env, fallback, report);
                    debug!("[Island {}] {} provisioning finalized, {} placed", island, env, placed.len());
                }
                SimTask::SaveFailed { islands: failed } => {
                    warn!("{} island(s) failed to save; retrying next period", failed.len());
                    islands.mark_dirty(failed);
                }
            }
        }
        count
    }

    /// Hands dirty islands and pending deletions to the I/O pool. Returns the number queued.
    pub fn save_in_background(&self) -> usize {
        let (snapshots, deleted) = {
            let mut state = self.state.lock();
            if !state.islands.has_dirty() {
                return 0;
            }
            state.team.prune_cooldowns(Instant::now());
            (state.islands.dirty_snapshots(), state.islands.take_deleted())
        };
        let queued = snapshots.len() + deleted.len();

        let store = Arc::clone(&self.store);
        let tasks = Arc::clone(&self.tasks);
        let save_lock = Arc::clone(&self.save_lock);
        let shutting_down = Arc::clone(&self.is_shutting_down);
        self.thread_pools.io_pool.spawn(move || {
            let _guard = save_lock.lock();
            for (pair, id) in &deleted {
                if let Err(e) = store.delete(pair, id) {
                    warn!("[Island {}] Could not delete stored record: {}", id, e);
                }
            }
            // The shutdown save writes a newer copy of everything.
            if shutting_down.load(AtomicOrdering::SeqCst) {
                return;
            }
            let failed = store.save_all(&snapshots);
            if failed.is_empty() {
                debug!("Background save wrote {} island(s)", snapshots.len());
            } else {
                tasks.push(SimTask::SaveFailed { islands: failed }, TaskPriority::Normal);
            }
        });
        queued
    }

    /// Drains pending results and saves everything synchronously.
    pub fn shutdown(&self) -> ServerResult<SaveSummary> {
        if self.is_shutting_down.swap(true, AtomicOrdering::SeqCst) {
            return Err(ServerError::Internal("shutdown already in progress".into()));
        }
        info!("Shutting down IslandServer...");
        while self.drain_tasks(usize::MAX) > 0 {}

        let _guard = self.save_lock.lock();
        let (snapshots, deleted) = {
            let mut state = self.state.lock();
            (state.islands.snapshot_all(), state.islands.take_deleted())
        };

        let mut summary = SaveSummary::default();
        for (pair, id) in &deleted {
            match self.store.delete(pair, id) {
                Ok(()) => summary.deleted += 1,
                Err(e) => error!("[Island {}] Could not delete stored record during shutdown: {}", id, e),
            }
        }
        let failed = self.store.save_all(&snapshots);
        summary.failed = failed.len();
        summary.saved = snapshots.len() - failed.len();
        info!(
            "Final save: {} saved, {} failed, {} deleted",
            summary.saved, summary.failed, summary.deleted
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for IslandServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IslandServer")
            .field("pairs", &self.config.game_modes.len())
            .field("tick", &self.tick_counter.load(AtomicOrdering::Relaxed))
            .field("pending_tasks", &self.tasks.len())
            .finish()
    }
}
