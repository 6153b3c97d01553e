//! Grid Rebuilder
//!
//! Recomputes the canonical 41-point grid for a symbol and publishes it as a
//! new GRID snapshot.
//!
//! State machine per symbol: Idle -> Computing -> Validating -> Publishing -> Idle.
//! Any failure returns the symbol to Idle with the previous version still live.
//! At most one rebuild per symbol runs at a time; a second request while one is
//! in flight fails with `AlreadyInProgress`.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::application::store::CalibrationStore;
use crate::domain::{
    validate_grid_points, CalibrationModel, GridPoint, PriceGrid, ValuationError,
};
use crate::strategy::RiskInverter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RebuildState {
    Idle,
    Computing,
    Validating,
    Publishing,
}

impl fmt::Display for RebuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildState::Idle => write!(f, "idle"),
            RebuildState::Computing => write!(f, "computing"),
            RebuildState::Validating => write!(f, "validating"),
            RebuildState::Publishing => write!(f, "publishing"),
        }
    }
}

/// Where the new grid comes from
#[derive(Debug, Clone)]
pub enum RebuildSource {
    /// The live snapshot's own model
    Current,
    /// A replacement model (calibration source changed)
    Model(CalibrationModel),
    /// An externally supplied grid, validated before publishing
    Points(Vec<GridPoint>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RebuildStatus {
    /// A new version went live
    Published,
    /// The computed grid equals the live one; nothing published
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildOutcome {
    pub symbol: String,
    pub status: RebuildStatus,
    pub previous_version: u64,
    pub version: u64,
}

type InFlight = Arc<Mutex<HashMap<String, RebuildState>>>;

/// Exclusive right to rebuild one symbol. Dropping it returns the symbol to Idle.
#[derive(Debug)]
pub struct RebuildPermit {
    symbol: String,
    in_flight: InFlight,
}

impl RebuildPermit {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn enter(&self, state: RebuildState) {
        tracing::debug!(symbol = %self.symbol, %state, "Rebuild state");
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.symbol.clone(), state);
    }
}

impl Drop for RebuildPermit {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.symbol);
        tracing::debug!(symbol = %self.symbol, "Rebuild state: idle");
    }
}

pub struct GridRebuilder {
    store: Arc<CalibrationStore>,
    inverter: RiskInverter,
    in_flight: InFlight,
}

impl GridRebuilder {
    pub fn new(store: Arc<CalibrationStore>) -> Self {
        Self {
            store,
            inverter: RiskInverter::new(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current state of the rebuild for `symbol`
    pub fn state(&self, symbol: &str) -> RebuildState {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .copied()
            .unwrap_or(RebuildState::Idle)
    }

    /// Claim the symbol for a rebuild
    pub fn try_begin(&self, symbol: &str) -> Result<RebuildPermit, ValuationError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.contains_key(symbol) {
            return Err(ValuationError::AlreadyInProgress(symbol.to_string()));
        }
        in_flight.insert(symbol.to_string(), RebuildState::Computing);

        Ok(RebuildPermit {
            symbol: symbol.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Claim the symbol and rebuild it
    pub fn rebuild(
        &self,
        symbol: &str,
        source: RebuildSource,
    ) -> Result<RebuildOutcome, ValuationError> {
        let permit = self.try_begin(symbol)?;
        self.run(permit, source)
    }

    /// Rebuild under an already-claimed permit
    pub fn run(
        &self,
        permit: RebuildPermit,
        source: RebuildSource,
    ) -> Result<RebuildOutcome, ValuationError> {
        let symbol = permit.symbol().to_string();
        let current = self.store.get(&symbol)?;

        permit.enter(RebuildState::Computing);
        let points = match source {
            RebuildSource::Current => self.sample(current.model()),
            RebuildSource::Model(model) => self.sample(&model),
            RebuildSource::Points(points) => points,
        };

        permit.enter(RebuildState::Validating);
        let grid = validate_grid_points(&points)
            .and_then(|()| PriceGrid::new(points).map_err(|e| e.to_string()))
            .map_err(|reason| {
                tracing::warn!(
                    symbol = %symbol,
                    version = current.version(),
                    %reason,
                    "Rebuild rejected, keeping live version"
                );
                ValuationError::CalibrationInvalid {
                    symbol: symbol.clone(),
                    reason,
                }
            })?;

        if current.grid() == Some(&grid) {
            tracing::debug!(symbol = %symbol, version = current.version(), "Grid unchanged");
            return Ok(RebuildOutcome {
                symbol,
                status: RebuildStatus::Unchanged,
                previous_version: current.version(),
                version: current.version(),
            });
        }

        permit.enter(RebuildState::Publishing);
        let published = self.store.publish_if_version(
            &symbol,
            current.version(),
            current.with_model(CalibrationModel::Grid(grid)),
        )?;

        Ok(RebuildOutcome {
            symbol,
            status: RebuildStatus::Published,
            previous_version: current.version(),
            version: published.version(),
        })
    }

    fn sample(&self, model: &CalibrationModel) -> Vec<GridPoint> {
        match model {
            CalibrationModel::Grid(grid) => grid.points().to_vec(),
            other => self.inverter.canonical_grid(other),
        }
    }
}
