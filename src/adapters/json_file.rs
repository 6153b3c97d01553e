//! JSON File Calibration Repository
//!
//! Stores every calibration record in one pretty-printed JSON document:
//!
//! ```json
//! { "calibrations": [ { "symbol": "ETH", "method": "LOG_BOUNDS", ... } ] }
//! ```
//!
//! Saves rewrite the whole document to a sibling temp file and rename it over
//! the live file, so a crash mid-write never leaves a truncated file behind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::ports::{CalibrationRecord, CalibrationRepository, RepositoryError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CalibrationFile {
    #[serde(default)]
    calibrations: Vec<CalibrationRecord>,
}

pub struct JsonCalibrationRepository {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonCalibrationRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole document with `records`
    pub async fn save_all(&self, records: Vec<CalibrationRecord>) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        self.write(CalibrationFile { calibrations: records }).await
    }

    async fn read(&self) -> Result<CalibrationFile, RepositoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(CalibrationFile::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No calibration file at {}", self.path.display());
                Ok(CalibrationFile::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, mut file: CalibrationFile) -> Result<(), RepositoryError> {
        file.calibrations.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(
            "Wrote {} calibrations to {}",
            file.calibrations.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl CalibrationRepository for JsonCalibrationRepository {
    async fn load_all(&self) -> Result<Vec<CalibrationRecord>, RepositoryError> {
        let mut records = self.read().await?.calibrations;
        records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(records)
    }

    async fn load(&self, symbol: &str) -> Result<Option<CalibrationRecord>, RepositoryError> {
        Ok(self
            .read()
            .await?
            .calibrations
            .into_iter()
            .find(|record| record.symbol == symbol))
    }

    async fn save(&self, record: CalibrationRecord) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut file = self.read().await?;
        match file.calibrations.iter_mut().find(|r| r.symbol == record.symbol) {
            Some(existing) => *existing = record,
            None => file.calibrations.push(record),
        }
        self.write(file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calibration::fixtures::{grid, linear_grid, log_bounds};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn eth() -> CalibrationRecord {
        CalibrationRecord::from(&log_bounds("ETH", 140.0, 12627.0))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let repo = JsonCalibrationRepository::new(dir.path().join("calibrations.json"));

        assert!(repo.load_all().await.unwrap().is_empty());
        assert!(repo.load("ETH").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let repo = JsonCalibrationRepository::new(dir.path().join("nested/calibrations.json"));

        let sol = CalibrationRecord::from(&grid("SOL", linear_grid(10.0, 5.0)));
        repo.save(sol.clone()).await.unwrap();
        repo.save(eth()).await.unwrap();

        let all = repo.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, "ETH");
        assert_eq!(repo.load("SOL").await.unwrap(), Some(sol));
        assert!(!dir.path().join("nested/calibrations.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_replaces_existing() {
        let dir = tempdir().unwrap();
        let repo = JsonCalibrationRepository::new(dir.path().join("calibrations.json"));

        repo.save(eth()).await.unwrap();
        let mut updated = eth();
        updated.version = 9;
        repo.save(updated).await.unwrap();

        let all = repo.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version, 9);
    }

    #[tokio::test]
    async fn test_corrupted_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calibrations.json");
        std::fs::write(&path, "{ not json").unwrap();

        let repo = JsonCalibrationRepository::new(&path);
        assert!(matches!(
            repo.load_all().await,
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_saves_keep_every_record() {
        let dir = tempdir().unwrap();
        let repo = Arc::new(JsonCalibrationRepository::new(dir.path().join("calibrations.json")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    let symbol = format!("SYM{}", i);
                    let record = CalibrationRecord::from(&log_bounds(&symbol, 10.0, 100.0));
                    repo.save(record).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.load_all().await.unwrap().len(), 8);
    }
}
