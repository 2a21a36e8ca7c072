// island_realm/server/tests/integration/persistence.rs
mod common;

use common::*;
use island_realm_core::core::ranks::{COOP_RANK, MEMBER_RANK};
use island_realm_core::core::types::{BlockPos, Environment};
use island_realm_core::entities::island::Island;
use island_realm_core::persistence::store::{IslandStore, JsonFileStore, MemoryStore};
use island_realm_core::server::events::{Actor, EventVerdict, IslandEventKind, TeamReason};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[test]
fn test_shutdown_save_round_trips_into_new_server() {
    let store = Arc::new(MemoryStore::new());
    let owner = Uuid::new_v4();
    let mate = Uuid::new_v4();
    let island = {
        let h = harness_with(test_config(), store.clone());
        let island = h.create_island(0, 0, owner);
        h.server.with_state(|s| {
            s.islands.set_rank(&island, mate, MEMBER_RANK, Actor::player(owner), TeamReason::Join).unwrap();
            s.islands.mark_generated(&island, Environment::Nether).unwrap();
            s.islands
                .set_spawn_point(&island, Environment::Nether, loc(NETHER, 1.5, 70.0, 1.5))
                .unwrap();
        });
        let summary = h.server.shutdown().unwrap();
        assert_eq!(summary.saved, 1);
        island
    };

    let h = harness_with(test_config(), store);
    let loaded = h.server.load_all().unwrap();
    assert_eq!(loaded.loaded, 1);
    assert_eq!(loaded.skipped, 0);
    h.server.with_state(|s| {
        let restored = s.islands.get_island(PAIR, &mate).expect("member index rebuilt on load");
        assert_eq!(restored.id, island);
        assert_eq!(restored.owner(), Some(owner));
        assert!(restored.has_nether_island());
        assert_eq!(restored.spawn_point(Environment::Nether), Some(&loc(NETHER, 1.5, 70.0, 1.5)));
        assert!(s.islands.get_island_at(&loc(OVERWORLD, 10.0, 64.0, 10.0)).is_some());
    });
}

#[test]
fn test_corrupt_record_skips_only_itself() {
    let store = Arc::new(MemoryStore::new());
    for x in [0, 1000, 2000] {
        let island = Island::new(Arc::from(PAIR), BlockPos::new(x, 120, 0), 50, Some(Uuid::new_v4()));
        store.save(&island).unwrap();
    }
    store.insert_raw(PAIR, "garbage", "{\"id\": 12");

    let h = harness_with(test_config(), store);
    let summary = h.server.load_all().unwrap();
    assert_eq!(summary.loaded, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(h.server.island_count(), 3);
}

#[test]
fn test_invalid_record_is_treated_as_corrupt() {
    let store = Arc::new(MemoryStore::new());
    let good = Island::new(Arc::from(PAIR), BlockPos::new(0, 120, 0), 50, Some(Uuid::new_v4()));
    store.save(&good).unwrap();

    let bad = Island::new(Arc::from(PAIR), BlockPos::new(1000, 120, 0), 50, Some(Uuid::new_v4()));
    let mut raw: serde_json::Value = serde_json::to_value(&bad).unwrap();
    raw["protection_range"] = serde_json::json!(0);
    store.insert_raw(PAIR, &bad.id.to_string(), &raw.to_string());

    let h = harness_with(test_config(), store);
    let summary = h.server.load_all().unwrap();
    assert_eq!(summary.loaded, 1);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn test_record_at_coordinate_edge_skips_only_itself() {
    let store = Arc::new(MemoryStore::new());
    let edge = Island::new(Arc::from(PAIR), BlockPos::new(i32::MAX - 10, 120, 0), 50, Some(Uuid::new_v4()));
    let good = Island::new(Arc::from(PAIR), BlockPos::new(0, 120, 0), 50, Some(Uuid::new_v4()));
    store.save(&edge).unwrap();
    store.save(&good).unwrap();

    let h = harness_with(test_config(), store);
    let summary = h.server.load_all().unwrap();
    assert_eq!(summary.loaded, 1);
    assert_eq!(summary.skipped, 1);
    assert!(h.island(good.id).is_some());
    assert!(h.island(edge.id).is_none());
}

#[test]
fn test_oversized_protection_range_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    // The default pair spaces islands 400 blocks apart.
    let huge = Island::new(Arc::from(PAIR), BlockPos::new(0, 120, 0), 200_000, Some(Uuid::new_v4()));
    let widest = Island::new(Arc::from(PAIR), BlockPos::new(4000, 120, 0), 200, Some(Uuid::new_v4()));
    store.save(&huge).unwrap();
    store.save(&widest).unwrap();

    let h = harness_with(test_config(), store);
    let summary = h.server.load_all().unwrap();
    assert_eq!(summary.loaded, 1);
    assert_eq!(summary.skipped, 1);
    assert!(h.island(widest.id).is_some());
}

#[test]
fn test_loading_publishes_no_created_events() {
    let store = Arc::new(MemoryStore::new());
    let owner = Uuid::new_v4();
    let stored = Island::new(Arc::from(PAIR), BlockPos::new(0, 120, 0), 50, Some(owner));
    store.save(&stored).unwrap();

    let h = harness_with(test_config(), store);
    let created = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&created);
    h.server.with_state(|s| {
        s.islands.events_mut().register_fn("no-new-islands", move |event| match event.kind {
            IslandEventKind::Created => {
                seen.fetch_add(1, Ordering::SeqCst);
                EventVerdict::Veto
            }
            _ => EventVerdict::Allow,
        })
    });

    let summary = h.server.load_all().unwrap();
    assert_eq!(summary.loaded, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(created.load(Ordering::SeqCst), 0);
    assert!(h.server.with_state(|s| s.islands.has_island(PAIR, &owner)));

    // The restored island still blocks a second claim by its owner.
    let err = h
        .server
        .with_state(|s| s.islands.create_island(PAIR, BlockPos::new(1000, 120, 0), Some(owner), Actor::SYSTEM))
        .unwrap_err();
    assert_eq!(err, island_realm_core::core::error::RegistryError::AlreadyInTeam(owner));
}

#[test]
fn test_mutations_are_write_behind() {
    let h = harness();
    let owner = Uuid::new_v4();
    let first = h.create_island(0, 0, owner);
    let second = h.create_island(1000, 0, Uuid::new_v4());
    assert_eq!(h.store.save_count(), 0, "mutations never write synchronously");

    assert_eq!(h.server.save_in_background(), 2);
    assert!(wait_until(Duration::from_secs(5), || h.store.save_count() == 2));

    h.server
        .with_state(|s| s.islands.set_rank(&first, Uuid::new_v4(), COOP_RANK, Actor::player(owner), TeamReason::Coop))
        .unwrap();
    assert_eq!(h.server.save_in_background(), 1);
    assert!(wait_until(Duration::from_secs(5), || h.store.save_count() == 3));
    assert!(h.store.contains(PAIR, &second));

    assert_eq!(h.server.save_in_background(), 0, "nothing dirty");
}

#[test]
fn test_shutdown_propagates_deletions() {
    let h = harness();
    let island = h.create_island(0, 0, Uuid::new_v4());
    h.server.save_in_background();
    assert!(wait_until(Duration::from_secs(5), || h.store.contains(PAIR, &island)));

    h.server.with_state(|s| s.islands.delete_island(&island, Actor::SYSTEM)).unwrap();
    let summary = h.server.shutdown().unwrap();
    assert_eq!(summary.deleted, 1);
    assert!(!h.store.contains(PAIR, &island));
    assert!(h.server.shutdown().is_err(), "second shutdown is refused");
}

#[test]
fn test_json_store_feeds_registry() {
    let root = std::env::temp_dir().join(format!("island-realm-{}", Uuid::new_v4()));
    let store = JsonFileStore::new(&root).unwrap();
    let island = Island::new(Arc::from(PAIR), BlockPos::new(0, 120, 0), 50, Some(Uuid::new_v4()));
    store.save(&island).unwrap();
    assert!(root.join(PAIR).join(format!("{}.json", island.id)).exists());

    let records = store.load(PAIR).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].as_ref().unwrap(), &island);
    let _ = std::fs::remove_dir_all(&root);
}
