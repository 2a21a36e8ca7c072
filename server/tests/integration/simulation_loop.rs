// island_realm/server/tests/integration/simulation_loop.rs
mod common;

use common::*;
use island_realm_core::core::error::{ServerError, ServerResult};
use island_realm_core::core::types::{Environment, IslandId, Location, PlayerPortalEvent, PortalCause};
use island_realm_core::persistence::store::{IslandStore, MemoryStore};
use island_realm_core::server::instance::{Collaborators, IslandServer, ProvisionerSource};
use island_realm_core::systems::portal::PortalOutcome;
use island_realm_core::systems::provisioning::{BlueprintPaster, PasteReport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Pretends to paste, reporting a spawn marker a few blocks above the origin.
struct SlowPaster {
    calls: AtomicUsize,
    fail: bool,
}

impl BlueprintPaster for SlowPaster {
    fn paste_blocking(&self, _blueprint: &str, _island: IslandId, origin: &Location) -> ServerResult<PasteReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        if self.fail {
            return Err(ServerError::Internal("blueprint missing".into()));
        }
        let spawn = Location::new(origin.world.clone(), origin.x + 0.5, origin.y + 3.0, origin.z + 0.5);
        Ok(PasteReport { spawn_point: Some(spawn) })
    }
}

struct PooledHarness {
    server: Arc<IslandServer>,
    store: Arc<MemoryStore>,
    mover: Arc<RecordingMover>,
    paster: Arc<SlowPaster>,
}

fn pooled(fail: bool) -> PooledHarness {
    let store = Arc::new(MemoryStore::new());
    let mover = Arc::new(RecordingMover::default());
    let paster = Arc::new(SlowPaster { calls: AtomicUsize::new(0), fail });
    let store_dyn: Arc<dyn IslandStore> = store.clone();
    let server = IslandServer::new(
        test_config(),
        Collaborators {
            store: store_dyn,
            safe_spot: Arc::new(RecordingResolver::default()),
            mover: mover.clone(),
            provisioner: ProvisionerSource::Pooled(paster.clone()),
        },
    )
    .unwrap();
    PooledHarness { server: Arc::new(server), store, mover, paster }
}

async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_loop_finalizes_pooled_paste_and_saves_on_shutdown() {
    let h = pooled(false);
    let owner = Uuid::new_v4();
    let island = h.server.with_state(|s| {
        s.islands.create_island(
            PAIR,
            island_realm_core::core::types::BlockPos::new(0, 120, 0),
            Some(owner),
            island_realm_core::server::events::Actor::SYSTEM,
        )
    })
    .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(Arc::clone(&h.server).run_simulation_loop(shutdown_rx));

    let mut event = PlayerPortalEvent::new(owner, PortalCause::EndPortal, loc(OVERWORLD, 0.5, 121.0, 0.5), None);
    assert_eq!(
        h.server.handle_player_portal(&mut event),
        PortalOutcome::AwaitingProvisioning { island, env: Environment::End }
    );

    assert!(wait_for(Duration::from_secs(5), || h.mover.count() == 1).await, "waiter placed after paste");
    let landing = h.mover.moves_of(&owner).pop().unwrap();
    assert_eq!(landing, loc(END, 0.5, 123.0, 0.5));
    assert_eq!(h.paster.calls.load(Ordering::SeqCst), 1);

    shutdown_tx.send(true).unwrap();
    loop_handle.await.unwrap();

    let saved = h.store.get(PAIR, &island).expect("final save wrote the island");
    assert!(saved.has_end_island());
    assert_eq!(saved.spawn_point(Environment::End), Some(&landing));
    assert!(h.server.tick_counter.load(Ordering::Relaxed) > 0);
}

#[tokio::test]
async fn test_failed_pooled_paste_leaves_player_in_place() {
    let h = pooled(true);
    let owner = Uuid::new_v4();
    let island = h.server.with_state(|s| {
        s.islands.create_island(
            PAIR,
            island_realm_core::core::types::BlockPos::new(0, 120, 0),
            Some(owner),
            island_realm_core::server::events::Actor::SYSTEM,
        )
    })
    .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(Arc::clone(&h.server).run_simulation_loop(shutdown_rx));

    let mut event = PlayerPortalEvent::new(owner, PortalCause::NetherPortal, loc(OVERWORLD, 0.0, 121.0, 0.0), None);
    h.server.handle_player_portal(&mut event);
    assert!(wait_for(Duration::from_secs(5), || h.paster.calls.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(event.cancelled);
    assert_eq!(h.mover.count(), 0);
    assert!(h.server.with_state(|s| s.router.is_pending(&island, Environment::Nether)));

    drop(shutdown_tx);
    loop_handle.await.unwrap();
    assert!(!h.store.get(PAIR, &island).unwrap().has_nether_island());
}

#[tokio::test]
async fn test_periodic_save_runs_on_backup_period() {
    let store = Arc::new(MemoryStore::new());
    let mut config = test_config();
    config.tick_rate = 1;
    config.database_backup_period_minutes = 1;
    let h = harness_with(config, store);
    let island = h.create_island(0, 0, Uuid::new_v4());

    // 60 ticks at 1 tick/s is one backup period.
    let mut queued = 0;
    for _ in 0..60 {
        queued += h.server.tick().queued_for_save;
    }
    assert_eq!(queued, 1);
    assert!(wait_for(Duration::from_secs(5), || h.store.contains(PAIR, &island)).await);
}
