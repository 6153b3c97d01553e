//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Calibration persistence (load on startup, save after rebuilds)

pub mod mocks;
pub mod records;

pub use records::{CalibrationHeader, CalibrationRecord, GridRow, HistogramRow};

use async_trait::async_trait;
use thiserror::Error;

/// Calibration repository error type
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Calibration persistence port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalibrationRepository: Send + Sync {
    /// Every stored record, in symbol order
    async fn load_all(&self) -> Result<Vec<CalibrationRecord>, RepositoryError>;

    /// Record for one symbol, if stored
    async fn load(&self, symbol: &str) -> Result<Option<CalibrationRecord>, RepositoryError>;

    /// Insert or replace the record for `record.symbol`
    async fn save(&self, record: CalibrationRecord) -> Result<(), RepositoryError>;
}
