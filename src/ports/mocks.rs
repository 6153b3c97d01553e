use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;

use super::{CalibrationRecord, CalibrationRepository, RepositoryError};

/// In-memory calibration repository that records calls and can be told to fail
#[derive(Debug, Default, Clone)]
pub struct InMemoryCalibrationRepository {
    records: Arc<Mutex<BTreeMap<String, CalibrationRecord>>>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_saves: Arc<Mutex<bool>>,
}

impl InMemoryCalibrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to pre-load a record
    pub fn with_record(self, record: CalibrationRecord) -> Self {
        self.records.lock().unwrap().insert(record.symbol.clone(), record);
        self
    }

    /// Make every subsequent `save` fail
    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stored(&self, symbol: &str) -> Option<CalibrationRecord> {
        self.records.lock().unwrap().get(symbol).cloned()
    }
}

#[async_trait]
impl CalibrationRepository for InMemoryCalibrationRepository {
    async fn load_all(&self) -> Result<Vec<CalibrationRecord>, RepositoryError> {
        self.calls.lock().unwrap().push("load_all".to_string());
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn load(&self, symbol: &str) -> Result<Option<CalibrationRecord>, RepositoryError> {
        self.calls.lock().unwrap().push(format!("load:{}", symbol));
        Ok(self.records.lock().unwrap().get(symbol).cloned())
    }

    async fn save(&self, record: CalibrationRecord) -> Result<(), RepositoryError> {
        self.calls.lock().unwrap().push(format!("save:{}", record.symbol));
        if *self.fail_saves.lock().unwrap() {
            return Err(RepositoryError::Unavailable("save disabled".to_string()));
        }
        self.records.lock().unwrap().insert(record.symbol.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calibration::fixtures::log_bounds;

    #[tokio::test]
    async fn test_in_memory_repository_records_calls() {
        let record = CalibrationRecord::from(&log_bounds("ETH", 140.0, 12627.0));
        let repo = InMemoryCalibrationRepository::new().with_record(record.clone());

        assert_eq!(repo.load("ETH").await.unwrap(), Some(record.clone()));
        assert!(repo.load("BTC").await.unwrap().is_none());
        assert_eq!(repo.load_all().await.unwrap().len(), 1);

        repo.save(record).await.unwrap();
        assert_eq!(
            repo.get_calls(),
            vec!["load:ETH", "load:BTC", "load_all", "save:ETH"]
        );
    }

    #[test]
    fn test_failing_saves() {
        let repo = InMemoryCalibrationRepository::new();
        repo.fail_saves(true);

        let record = CalibrationRecord::from(&log_bounds("ETH", 140.0, 12627.0));
        tokio_test::assert_err!(tokio_test::block_on(repo.save(record.clone())));
        assert!(repo.stored("ETH").is_none());

        repo.fail_saves(false);
        tokio_test::assert_ok!(tokio_test::block_on(repo.save(record)));
        assert!(repo.stored("ETH").is_some());
    }
}
