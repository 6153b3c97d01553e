//! Rebuild Scheduler
//!
//! Periodically rebuilds the grid of every stored symbol and persists the
//! versions that went live. Main batch loop: rebuild, save, sleep.
//!
//! A symbol whose save failed stays pending and is saved again on every pass
//! until the repository holds its live version, even when later rebuilds
//! report it unchanged.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::application::engine::ValuationEngine;
use crate::application::rebuilder::{RebuildSource, RebuildStatus};
use crate::domain::ValuationError;
use crate::ports::{CalibrationRecord, CalibrationRepository};

/// Counts from one rebuild pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub published: usize,
    pub unchanged: usize,
    /// Failed validation; prior version still live
    pub rejected: usize,
    /// Busy, raced by another writer, or gone
    pub skipped: usize,
}

impl RebuildSummary {
    pub fn total(&self) -> usize {
        self.published + self.unchanged + self.rejected + self.skipped
    }
}

pub struct RebuildScheduler {
    engine: Arc<ValuationEngine>,
    repository: Arc<dyn CalibrationRepository>,
    interval: Duration,
    dry_run: bool,
    /// Symbols whose live version is not yet in the repository
    pending: Mutex<BTreeSet<String>>,
    is_running: Arc<RwLock<bool>>,
}

impl RebuildScheduler {
    pub fn new(engine: Arc<ValuationEngine>, repository: Arc<dyn CalibrationRepository>) -> Self {
        Self {
            engine,
            repository,
            interval: Duration::from_secs(3600),
            dry_run: false,
            pending: Mutex::new(BTreeSet::new()),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Set custom rebuild interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Rebuild in memory only, never write to the repository
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the rebuild loop until `stop()` is called
    pub async fn run(&self) {
        *self.is_running.write().await = true;

        tracing::info!(
            "Starting rebuild scheduler - interval: {:?}, dry run: {}",
            self.interval,
            self.dry_run
        );

        while *self.is_running.read().await {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }

        tracing::info!("Rebuild scheduler stopped");
    }

    /// Rebuild every stored symbol once
    pub async fn tick(&self) -> RebuildSummary {
        let symbols = self.engine.store().symbols();
        self.rebuild_symbols(&symbols).await
    }

    /// Rebuild the given symbols once
    pub async fn rebuild_symbols(&self, symbols: &[String]) -> RebuildSummary {
        let mut summary = RebuildSummary::default();

        for symbol in symbols {
            match self.engine.apply_source(symbol, RebuildSource::Current) {
                Ok(outcome) if outcome.status == RebuildStatus::Unchanged => {
                    summary.unchanged += 1;
                    if self.pending.lock().await.contains(symbol) {
                        tracing::info!("{} v{} retrying save", symbol, outcome.version);
                        self.persist(symbol).await;
                    }
                }
                Ok(outcome) => {
                    summary.published += 1;
                    tracing::info!(
                        "{} rebuilt: v{} -> v{}",
                        symbol,
                        outcome.previous_version,
                        outcome.version
                    );
                    self.persist(symbol).await;
                }
                Err(ValuationError::CalibrationInvalid { .. }) => {
                    // Already logged by the rebuilder
                    summary.rejected += 1;
                }
                Err(e) => {
                    tracing::warn!("{} skipped: {}", symbol, e);
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(
            "Rebuild pass: {} published, {} unchanged, {} rejected, {} skipped",
            summary.published,
            summary.unchanged,
            summary.rejected,
            summary.skipped
        );
        summary
    }

    async fn persist(&self, symbol: &str) {
        if self.dry_run {
            return;
        }

        let snapshot = match self.engine.store().get(symbol) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Cannot persist {}: {}", symbol, e);
                return;
            }
        };

        let record = CalibrationRecord::from(snapshot.as_ref());
        match self.repository.save(record).await {
            Ok(()) => {
                self.pending.lock().await.remove(symbol);
            }
            Err(e) => {
                // Live version stays in memory; the next pass saves it again
                tracing::error!("Failed to persist {} v{}: {}", symbol, snapshot.version(), e);
                self.pending.lock().await.insert(symbol.to_string());
            }
        }
    }

    /// Symbols waiting for a successful save
    pub async fn pending(&self) -> Vec<String> {
        self.pending.lock().await.iter().cloned().collect()
    }

    /// Gracefully stop the loop after the current pass
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        tracing::info!("Rebuild scheduler stop requested");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calibration::fixtures::{grid, linear_grid, log_bounds, polynomial};
    use crate::domain::CalibrationMethod;
    use crate::ports::mocks::InMemoryCalibrationRepository;
    use crate::ports::{MockCalibrationRepository, RepositoryError};
    use crate::strategy::EngineConfig;

    fn engine() -> Arc<ValuationEngine> {
        let engine = ValuationEngine::new(EngineConfig::default()).unwrap();
        engine.store().publish("ETH", log_bounds("ETH", 140.0, 12627.0)).unwrap();
        engine.store().publish("SOL", grid("SOL", linear_grid(10.0, 5.0))).unwrap();
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_tick_publishes_and_persists() {
        let repo = Arc::new(InMemoryCalibrationRepository::new());
        let scheduler = RebuildScheduler::new(engine(), repo.clone());

        let summary = scheduler.tick().await;
        assert_eq!(summary.published, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.total(), 2);

        let stored = repo.stored("ETH").unwrap();
        assert_eq!(stored.method, CalibrationMethod::Grid);
        assert_eq!(stored.version, 2);
        assert!(repo.stored("SOL").is_none());

        // Second pass: everything is already a grid
        let summary = scheduler.tick().await;
        assert_eq!(summary.unchanged, 2);
        assert_eq!(summary.published, 0);
    }

    #[tokio::test]
    async fn test_dry_run_never_saves() {
        let mut repo = MockCalibrationRepository::new();
        repo.expect_save().never();

        let scheduler = RebuildScheduler::new(engine(), Arc::new(repo)).with_dry_run(true);
        let summary = scheduler.tick().await;
        assert_eq!(summary.published, 1);
    }

    #[tokio::test]
    async fn test_save_failure_does_not_abort_tick() {
        let engine = engine();
        engine.store().publish("BTC", log_bounds("BTC", 3000.0, 120000.0)).unwrap();

        let mut repo = MockCalibrationRepository::new();
        repo.expect_save()
            .times(2)
            .returning(|_| Err(RepositoryError::Unavailable("disk full".to_string())));

        let scheduler = RebuildScheduler::new(Arc::clone(&engine), Arc::new(repo));
        let summary = scheduler.tick().await;

        assert_eq!(summary.published, 2);
        // Rebuilt versions stay live in memory
        assert_eq!(engine.store().version("BTC"), Some(2));
        assert_eq!(engine.store().version("ETH"), Some(2));
    }

    #[tokio::test]
    async fn test_failed_save_retried_next_tick() {
        let engine = engine();
        engine.store().publish("BTC", log_bounds("BTC", 3000.0, 120000.0)).unwrap();

        let repo = Arc::new(InMemoryCalibrationRepository::new());
        repo.fail_saves(true);
        let scheduler = RebuildScheduler::new(Arc::clone(&engine), repo.clone());

        let first = scheduler.tick().await;
        assert_eq!(first.published, 2);
        assert!(repo.stored("BTC").is_none());
        assert_eq!(scheduler.pending().await, vec!["BTC", "ETH"]);

        // Grids are live now, so the next pass is all unchanged but still saves
        repo.fail_saves(false);
        let second = scheduler.tick().await;
        assert_eq!(second.unchanged, 3);
        assert_eq!(second.published, 0);
        assert_eq!(repo.stored("BTC").unwrap().version, 2);
        assert_eq!(repo.stored("ETH").unwrap().version, engine.store().version("ETH").unwrap());
        assert!(scheduler.pending().await.is_empty());

        // Nothing left to save
        scheduler.tick().await;
        let saves = repo
            .get_calls()
            .iter()
            .filter(|call| call.starts_with("save:"))
            .count();
        assert_eq!(saves, 4);
    }

    #[tokio::test]
    async fn test_rejected_rebuild_counted() {
        let engine = engine();
        // Negative price at r = 0 never makes a valid grid
        engine
            .store()
            .publish("BAD", polynomial("BAD", [0.0, 0.0, 0.0, 1000.0, -100.0]))
            .unwrap();

        let repo = Arc::new(InMemoryCalibrationRepository::new());
        let scheduler = RebuildScheduler::new(Arc::clone(&engine), repo.clone());
        let summary = scheduler.tick().await;

        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.published, 1);
        assert_eq!(engine.store().get("BAD").unwrap().method(), CalibrationMethod::Polynomial);
        assert!(repo.stored("BAD").is_none());
    }

    #[tokio::test]
    async fn test_unknown_symbols_skipped() {
        let repo = Arc::new(InMemoryCalibrationRepository::new());
        let scheduler = RebuildScheduler::new(engine(), repo.clone());

        let summary = scheduler
            .rebuild_symbols(&["XYZ".to_string(), "SOL".to_string()])
            .await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.unchanged, 1);
        assert!(repo.get_calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_and_stop() {
        let repo = Arc::new(InMemoryCalibrationRepository::new());
        let scheduler = Arc::new(
            RebuildScheduler::new(engine(), repo.clone()).with_interval(Duration::from_millis(10)),
        );

        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.is_running().await);
        scheduler.stop().await;

        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();
        assert!(!scheduler.is_running().await);
        assert!(repo.stored("ETH").is_some());
    }
}
