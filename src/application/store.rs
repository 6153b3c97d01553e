//! Calibration Store
//!
//! Versioned, copy-on-write snapshots of per-symbol calibrations.
//! Readers clone an `Arc` under a short read lock and keep the version they
//! fetched for the rest of their computation; publishing swaps the `Arc` under
//! the write lock, so a reader never sees a half-replaced record.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::{SymbolCalibration, ValuationError};

#[derive(Debug, Default)]
pub struct CalibrationStore {
    snapshots: RwLock<HashMap<String, Arc<SymbolCalibration>>>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot for `symbol`
    pub fn get(&self, symbol: &str) -> Result<Arc<SymbolCalibration>, ValuationError> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()
            .ok_or_else(|| ValuationError::NotFound(symbol.to_string()))
    }

    /// Replace the snapshot for `symbol`, assigning the next version
    pub fn publish(
        &self,
        symbol: &str,
        calibration: SymbolCalibration,
    ) -> Result<Arc<SymbolCalibration>, ValuationError> {
        check_symbol(symbol, &calibration)?;

        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        let version = snapshots.get(symbol).map_or(1, |current| current.version() + 1);
        Ok(Self::swap(&mut snapshots, symbol, calibration, version))
    }

    /// Publish only if the live version still equals `expected`
    pub fn publish_if_version(
        &self,
        symbol: &str,
        expected: u64,
        calibration: SymbolCalibration,
    ) -> Result<Arc<SymbolCalibration>, ValuationError> {
        check_symbol(symbol, &calibration)?;

        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        let actual = snapshots.get(symbol).map_or(0, |current| current.version());
        if actual != expected {
            return Err(ValuationError::VersionConflict {
                symbol: symbol.to_string(),
                expected,
                actual,
            });
        }
        Ok(Self::swap(&mut snapshots, symbol, calibration, actual + 1))
    }

    /// Load a persisted snapshot as-is, keeping its stored version.
    /// Ignored if the store already holds the same or a newer version.
    pub fn restore(&self, calibration: SymbolCalibration) -> Option<Arc<SymbolCalibration>> {
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        let live = snapshots
            .get(calibration.symbol())
            .map_or(0, |current| current.version());
        if calibration.version() <= live && live > 0 {
            return None;
        }

        let symbol = calibration.symbol().to_string();
        let snapshot = Arc::new(calibration);
        snapshots.insert(symbol, Arc::clone(&snapshot));
        Some(snapshot)
    }

    fn swap(
        snapshots: &mut HashMap<String, Arc<SymbolCalibration>>,
        symbol: &str,
        calibration: SymbolCalibration,
        version: u64,
    ) -> Arc<SymbolCalibration> {
        let snapshot = Arc::new(calibration.into_published(version, Utc::now()));
        snapshots.insert(symbol.to_string(), Arc::clone(&snapshot));

        tracing::info!(
            symbol,
            version,
            method = %snapshot.method(),
            "Calibration published"
        );
        snapshot
    }

    /// Live version for `symbol`
    pub fn version(&self, symbol: &str) -> Option<u64> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .map(|snapshot| snapshot.version())
    }

    /// Known symbols, sorted
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_symbol(symbol: &str, calibration: &SymbolCalibration) -> Result<(), ValuationError> {
    if calibration.symbol() != symbol {
        return Err(ValuationError::invalid(format!(
            "calibration for '{}' published under '{}'",
            calibration.symbol(),
            symbol
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calibration::fixtures::{grid, linear_grid, log_bounds};
    use crate::domain::CalibrationMethod;
    use std::thread;

    #[test]
    fn test_get_unknown_symbol() {
        let store = CalibrationStore::new();
        assert_eq!(
            store.get("ETH").unwrap_err(),
            ValuationError::NotFound("ETH".to_string())
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_publish_bumps_version() {
        let store = CalibrationStore::new();
        let first = store.publish("ETH", log_bounds("ETH", 140.0, 12627.0)).unwrap();
        assert_eq!(first.version(), 1);
        assert!(first.published_at().is_some());

        let second = store.publish("ETH", log_bounds("ETH", 150.0, 13000.0)).unwrap();
        assert_eq!(second.version(), 2);
        assert_eq!(store.version("ETH"), Some(2));
        assert_eq!(store.symbols(), vec!["ETH".to_string()]);
    }

    #[test]
    fn test_symbol_mismatch_rejected() {
        let store = CalibrationStore::new();
        let result = store.publish("BTC", log_bounds("ETH", 140.0, 12627.0));
        assert!(matches!(result, Err(ValuationError::InvalidInput(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_reader_keeps_fetched_version() {
        let store = CalibrationStore::new();
        store.publish("ETH", log_bounds("ETH", 140.0, 12627.0)).unwrap();

        let held = store.get("ETH").unwrap();
        store.publish("ETH", grid("ETH", linear_grid(100.0, 10.0))).unwrap();

        // The held snapshot is unchanged and internally consistent
        assert_eq!(held.version(), 1);
        assert_eq!(held.method(), CalibrationMethod::LogBounds);
        assert!(held.bounds().is_some());

        let live = store.get("ETH").unwrap();
        assert_eq!(live.version(), 2);
        assert_eq!(live.method(), CalibrationMethod::Grid);
    }

    #[test]
    fn test_publish_if_version() {
        let store = CalibrationStore::new();
        store.publish("ETH", log_bounds("ETH", 140.0, 12627.0)).unwrap();

        let stale = store.publish_if_version("ETH", 0, log_bounds("ETH", 1.0, 2.0));
        assert!(matches!(
            stale,
            Err(ValuationError::VersionConflict { expected: 0, actual: 1, .. })
        ));

        let fresh = store.publish_if_version("ETH", 1, log_bounds("ETH", 1.0, 2.0)).unwrap();
        assert_eq!(fresh.version(), 2);
    }

    #[test]
    fn test_restore_keeps_persisted_version() {
        let store = CalibrationStore::new();
        let persisted = log_bounds("ETH", 140.0, 12627.0).with_persisted_version(7, None);
        assert!(store.restore(persisted.clone()).is_some());
        assert_eq!(store.version("ETH"), Some(7));

        // Older or equal versions are ignored
        assert!(store.restore(persisted).is_none());

        let next = store.publish("ETH", log_bounds("ETH", 140.0, 12627.0)).unwrap();
        assert_eq!(next.version(), 8);
    }

    #[test]
    fn test_concurrent_readers_see_consistent_snapshots() {
        let store = Arc::new(CalibrationStore::new());
        store.publish("ETH", log_bounds("ETH", 100.0, 1000.0)).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=200 {
                    let min = 100.0 + i as f64;
                    store
                        .publish("ETH", log_bounds("ETH", min, min * 10.0))
                        .unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut last_version = 0;
                    for _ in 0..500 {
                        let snapshot = store.get("ETH").unwrap();
                        let bounds = snapshot.bounds().unwrap();
                        // Every published record keeps max = 10 * min
                        assert!((bounds.max_price - bounds.min_price * 10.0).abs() < 1e-9);
                        assert!(snapshot.version() >= last_version);
                        last_version = snapshot.version();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.version("ETH"), Some(201));
    }
}
