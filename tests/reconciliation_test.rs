// tests/reconciliation_test.rs
// Reconciliation passes end to end: static source, in-memory store and cache.

use std::sync::Arc;
use std::time::Duration;

use menusync::cache::{MemoryCache, ReadThroughCache};
use menusync::catalog::CatalogReader;
use menusync::db::{CatalogCounts, CatalogStore};
use menusync::sync::{
    PassOutcome, ReconciliationEngine, StaticSource, SyncError, SyncSettings, Table,
};

struct Harness {
    source: Arc<StaticSource>,
    backend: Arc<MemoryCache>,
    store: CatalogStore,
    reader: CatalogReader,
    engine: Arc<ReconciliationEngine>,
}

fn harness(initial: Table) -> Harness {
    let source = Arc::new(StaticSource::new(initial));
    let backend = Arc::new(MemoryCache::new());
    let cache = ReadThroughCache::new(backend.clone());
    let store = CatalogStore::open_in_memory().unwrap();
    let engine = Arc::new(ReconciliationEngine::new(
        source.clone(),
        store.clone(),
        cache.clone(),
        SyncSettings {
            interval: Duration::from_millis(20),
            fetch_timeout: Duration::from_secs(1),
        },
    ));
    Harness {
        source,
        backend,
        reader: CatalogReader::new(store.clone(), cache),
        store,
        engine,
    }
}

fn table(rows: &[&[&str]]) -> Table {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn sample() -> Table {
    table(&[
        &["_", "M1", "d1"],
        &["_", "_", "S1", "d2"],
        &["_", "_", "_", "Dish1", "d3", "10,50"],
    ])
}

#[tokio::test]
async fn test_sample_table_builds_hierarchy() {
    let h = harness(sample());

    let outcome = h.engine.run_pass().await.unwrap();
    assert_eq!(
        outcome,
        PassOutcome::Replayed(CatalogCounts {
            menus: 1,
            submenus: 1,
            dishes: 1
        })
    );

    let menus = h.reader.menus().await.unwrap();
    assert_eq!(menus.len(), 1);
    assert_eq!(menus[0].title, "M1");
    assert_eq!(menus[0].description, "d1");

    let submenus = h.reader.submenus(&menus[0].id).await.unwrap();
    assert_eq!(submenus.len(), 1);
    assert_eq!(submenus[0].title, "S1");

    let dishes = h.reader.dishes(&menus[0].id, &submenus[0].id).await.unwrap();
    assert_eq!(dishes.len(), 1);
    assert_eq!(dishes[0].title, "Dish1");
    assert_eq!(dishes[0].price, "10.50");

    // Same table again: no writes.
    let ids_before: Vec<String> = menus.iter().map(|m| m.id.clone()).collect();
    assert_eq!(h.engine.run_pass().await.unwrap(), PassOutcome::Unchanged);
    let ids_after: Vec<String> = h.store.list_menus().unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(ids_before, ids_after);
    assert_eq!(h.source.fetch_count(), 2);
}

#[tokio::test]
async fn test_broken_chain_creates_nothing() {
    let h = harness(table(&[&["_", "_", "S1", "d2"]]));

    let result = h.engine.run_pass().await;
    match result {
        Err(SyncError::Classification(e)) => assert_eq!(e.row, 0),
        other => panic!("expected classification error, got {:?}", other),
    }

    assert_eq!(h.store.counts().unwrap(), CatalogCounts::default());
    assert!(!h.backend.contains("table_cache"));

    // The broken table is not treated as "unchanged" next time.
    assert!(matches!(
        h.engine.run_pass().await,
        Err(SyncError::Classification(_))
    ));
}

#[tokio::test]
async fn test_broken_table_keeps_previous_catalog() {
    let h = harness(sample());
    h.engine.run_pass().await.unwrap();
    assert!(h.backend.contains("table_cache"));

    h.source.set_table(table(&[
        &["_", "M2", ""],
        &["_", "_", "_", "Orphan", "", "1,00"],
    ]));
    assert!(h.engine.run_pass().await.is_err());

    let menus = h.store.list_menus().unwrap();
    assert_eq!(menus.len(), 1);
    assert_eq!(menus[0].title, "M1");
    assert!(!h.backend.contains("table_cache"));
}

#[tokio::test]
async fn test_changed_table_replaces_catalog_and_cache() {
    let h = harness(sample());
    h.engine.run_pass().await.unwrap();
    let old = h.reader.menus().await.unwrap();
    assert!(h.backend.contains("menus"));

    h.source.set_table(table(&[
        &["_", "Breakfast", ""],
        &["_", "_", "Eggs", ""],
        &["_", "_", "_", "Omelette", "", "7,25"],
        &["_", "_", "_", "Benedict", "", "9,00"],
        &["_", "Lunch", ""],
    ]));
    let outcome = h.engine.run_pass().await.unwrap();
    assert_eq!(
        outcome,
        PassOutcome::Replayed(CatalogCounts {
            menus: 2,
            submenus: 1,
            dishes: 2
        })
    );

    let menus = h.reader.menus().await.unwrap();
    let titles: Vec<&str> = menus.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Breakfast", "Lunch"]);
    assert!(h.reader.menu(&old[0].id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_discount_column_applies_at_read_time() {
    let h = harness(table(&[
        &["_", "M1", ""],
        &["_", "_", "S1", ""],
        &["_", "_", "_", "Soup", "", "20,00", "10"],
        &["_", "_", "_", "Bread", "", "20,00"],
        &["_", "_", "_", "Tea", "", "20,00", ""],
    ]));
    h.engine.run_pass().await.unwrap();

    let trees = h.reader.menus_detail().await.unwrap();
    let prices: Vec<(&str, &str)> = trees[0].submenus[0]
        .dishes
        .iter()
        .map(|d| (d.title.as_str(), d.price.as_str()))
        .collect();
    assert_eq!(
        prices,
        vec![("Soup", "18.00"), ("Bread", "20.00"), ("Tea", "20.00")]
    );

    let discount_keys = h
        .backend
        .keys()
        .into_iter()
        .filter(|k| k.starts_with("discount_"))
        .count();
    assert_eq!(discount_keys, 1);
}

#[tokio::test]
async fn test_empty_table_wipes_catalog() {
    let h = harness(sample());
    h.engine.run_pass().await.unwrap();

    h.source.set_table(Vec::new());
    let outcome = h.engine.run_pass().await.unwrap();
    assert_eq!(outcome, PassOutcome::Replayed(CatalogCounts::default()));
    assert!(h.reader.menus().await.unwrap().is_empty());

    assert_eq!(h.engine.run_pass().await.unwrap(), PassOutcome::Unchanged);
}

#[tokio::test]
async fn test_fetch_failure_then_recovery() {
    let h = harness(sample());
    h.source.set_unreachable();

    assert!(matches!(h.engine.run_pass().await, Err(SyncError::Fetch(_))));
    assert_eq!(h.store.counts().unwrap(), CatalogCounts::default());
    assert!(h.backend.is_empty());

    h.source.set_table(sample());
    assert!(matches!(
        h.engine.run_pass().await.unwrap(),
        PassOutcome::Replayed(_)
    ));
}

#[tokio::test]
async fn test_pass_survives_unavailable_cache() {
    let h = harness(sample());
    h.backend.set_unavailable(true);

    // Catalog is rebuilt; the snapshot simply cannot be kept.
    assert!(matches!(
        h.engine.run_pass().await.unwrap(),
        PassOutcome::Replayed(_)
    ));
    assert_eq!(h.store.counts().unwrap().dishes, 1);
    assert_eq!(h.reader.menus().await.unwrap()[0].title, "M1");

    h.backend.set_unavailable(false);
    assert!(matches!(
        h.engine.run_pass().await.unwrap(),
        PassOutcome::Replayed(_)
    ));
    assert_eq!(h.engine.run_pass().await.unwrap(), PassOutcome::Unchanged);
}

#[tokio::test]
async fn test_manual_pass_during_loop_pass_is_skipped() {
    let h = harness(sample());
    h.source.set_delay(Duration::from_millis(200));

    let first = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.run_pass().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.engine.is_busy());

    assert_eq!(h.engine.run_pass().await.unwrap(), PassOutcome::Skipped);
    assert!(matches!(
        first.await.unwrap().unwrap(),
        PassOutcome::Replayed(_)
    ));
    assert_eq!(h.source.fetch_count(), 1);
}

#[tokio::test]
async fn test_loop_picks_up_changes_until_shutdown() {
    let h = harness(sample());
    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = h.engine.clone().spawn(rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.store.counts().unwrap().menus, 1);

    h.source.set_table(table(&[&["_", "A", ""], &["_", "B", ""]]));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.store.counts().unwrap().menus, 2);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
}
