//! Domain Layer - Core valuation types
//!
//! This module contains pure domain types and logic with no external dependencies.
//! All external interactions happen through the ports layer.
//!
//! - `calibration`: Per-symbol calibration model (bounds, polynomial, grid)
//! - `band`: Risk deciles and the band occupancy histogram
//! - `signal`: Zone, bias and classified signal
//! - `risk`: Per-query risk assessment
//! - `error`: Valuation error taxonomy

pub mod band;
pub mod calibration;
pub mod error;
pub mod risk;
pub mod signal;

pub use band::{BandHistogram, RiskBand, BAND_COUNT};
pub use calibration::{
    canonical_risk, validate_grid_points, CalibrationMethod, CalibrationModel, GridPoint,
    PriceBounds, PriceGrid, QuarticCoefficients, SymbolCalibration, GRID_POINTS, GRID_STEP,
};
pub use error::ValuationError;
pub use risk::RiskAssessment;
pub use signal::{Bias, Signal, Zone};
