// src/sync/engine.rs
//
// Reconciliation loop: fetch the external table, compare it with the last
// ingested snapshot, and rebuild the catalog when they differ.
//
//   Idle -> Fetching -> Diffing -> (unchanged | Replaying) -> Idle
//
// At most one pass runs at a time. A pass started while another is in flight
// (a manual trigger racing the timer) returns `PassOutcome::Skipped`.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::classifier::Table;
use super::replay::{plan_replay, ReplayError};
use super::source::{FetchError, TableSource};
use crate::cache::keys::SNAPSHOT_KEY;
use crate::cache::{DiscountStore, InvalidationEngine, ReadThroughCache};
use crate::db::store::{CatalogCounts, CatalogStore, StoreError};
use crate::monitoring::metrics::{SYNC_PASSES_TOTAL, SYNC_PASS_DURATION_MS};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("classification failed at {0}")]
    Classification(#[from] ReplayError),
    #[error("store failed during replay: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Fetching,
    Diffing,
    Replaying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The fetched table equals the snapshot; nothing was written.
    Unchanged,
    /// The catalog was rebuilt from the table.
    Replayed(CatalogCounts),
    /// Another pass was in flight.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Clears the busy flag when the pass ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ReconciliationEngine {
    source: Arc<dyn TableSource>,
    store: CatalogStore,
    cache: ReadThroughCache,
    invalidation: InvalidationEngine,
    discounts: DiscountStore,
    settings: SyncSettings,
    busy: AtomicBool,
    state: Mutex<SyncState>,
}

impl ReconciliationEngine {
    pub fn new(
        source: Arc<dyn TableSource>,
        store: CatalogStore,
        cache: ReadThroughCache,
        settings: SyncSettings,
    ) -> Self {
        Self {
            invalidation: InvalidationEngine::new(cache.clone(), store.clone()),
            discounts: DiscountStore::new(cache.clone()),
            source,
            store,
            cache,
            settings,
            busy: AtomicBool::new(false),
            state: Mutex::new(SyncState::Idle),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.lock() = state;
    }

    /// One fetch -> diff -> replay cycle.
    pub async fn run_pass(&self) -> Result<PassOutcome, SyncError> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            SYNC_PASSES_TOTAL.with_label_values(&["skipped"]).inc();
            debug!("Reconciliation pass already in progress, skipping");
            return Ok(PassOutcome::Skipped);
        };

        let start = Instant::now();
        let result = self.pass().await;
        self.set_state(SyncState::Idle);

        SYNC_PASS_DURATION_MS.observe(start.elapsed().as_millis() as f64);
        SYNC_PASSES_TOTAL
            .with_label_values(&[outcome_label(&result)])
            .inc();
        result
    }

    async fn pass(&self) -> Result<PassOutcome, SyncError> {
        self.set_state(SyncState::Fetching);
        let table = self.fetch().await?;

        self.set_state(SyncState::Diffing);
        let snapshot: Option<Table> = self.cache.get_json(SNAPSHOT_KEY).await;
        if snapshot.as_ref() == Some(&table) {
            return Ok(PassOutcome::Unchanged);
        }

        self.set_state(SyncState::Replaying);
        let plan = match plan_replay(&table) {
            Ok(plan) => plan,
            Err(e) => {
                // Force a full re-diff next tick instead of reading the broken table as unchanged.
                self.cache.delete(SNAPSHOT_KEY).await;
                return Err(e.into());
            }
        };
        if plan.ignored_rows > 0 {
            info!(ignored = plan.ignored_rows, "Rows of unknown shape skipped");
        }

        let counts = match self.store.replace_catalog(&plan.records) {
            Ok(counts) => counts,
            Err(e) => {
                self.cache.delete(SNAPSHOT_KEY).await;
                return Err(e.into());
            }
        };

        if self.invalidation.invalidate_all().await {
            self.cache.set(SNAPSHOT_KEY, &table).await;
        } else {
            // Stale views may survive; without a snapshot the next pass replays and flushes again.
            warn!("Cache flush failed after replay, snapshot not stored");
        }
        for (dish_id, percent) in &plan.discounts {
            self.discounts.set(dish_id, *percent).await;
        }

        Ok(PassOutcome::Replayed(counts))
    }

    async fn fetch(&self) -> Result<Table, FetchError> {
        let timeout = self.settings.fetch_timeout;
        match tokio::time::timeout(timeout, self.source.fetch_table()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A pass in flight when shutdown arrives runs to completion first.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            source = %self.source.describe(),
            interval_secs = self.settings.interval.as_secs_f64(),
            "Reconciliation loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_pass().await {
                Ok(PassOutcome::Unchanged) => debug!("External table unchanged"),
                Ok(PassOutcome::Replayed(counts)) => info!(
                    menus = counts.menus,
                    submenus = counts.submenus,
                    dishes = counts.dishes,
                    "Catalog synchronized from external table"
                ),
                Ok(PassOutcome::Skipped) => {}
                Err(SyncError::Fetch(e)) => warn!(error = %e, "External table fetch failed, retrying next tick"),
                Err(e) => error!(error = %e, "Reconciliation pass failed"),
            }
        }

        info!("Reconciliation loop stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

fn outcome_label(result: &Result<PassOutcome, SyncError>) -> &'static str {
    match result {
        Ok(PassOutcome::Unchanged) => "unchanged",
        Ok(PassOutcome::Replayed(_)) => "replayed",
        Ok(PassOutcome::Skipped) => "skipped",
        Err(SyncError::Fetch(_)) => "fetch_error",
        Err(SyncError::Classification(_)) => "classification_error",
        Err(SyncError::Store(_)) => "store_error",
    }
}
