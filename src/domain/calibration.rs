//! Symbol Calibration
//!
//! Per-asset configuration defining the price <-> risk mapping.
//! Exactly one model payload exists per calibration, carried by the
//! `CalibrationModel` variant and validated at construction:
//!
//! - `LogBounds`: risk = (ln p - ln min) / (ln max - ln min)
//! - `Polynomial`: price(r) = c4*r^4 + c3*r^3 + c2*r^2 + c1*r + c0
//! - `Grid`: 41 (risk, price) points spaced 0.025 apart in risk
//!
//! A published `SymbolCalibration` is shared as `Arc<SymbolCalibration>` and
//! never mutated; replacements are new values with a bumped version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::band::BandHistogram;
use super::error::ValuationError;

/// Number of points in a canonical grid
pub const GRID_POINTS: usize = 41;

/// Risk spacing between adjacent grid points
pub const GRID_STEP: f64 = 0.025;

/// Allowed drift of a stored grid risk from its canonical value
const GRID_RISK_TOLERANCE: f64 = 1e-9;

/// Canonical risk of the i-th grid point
pub fn canonical_risk(index: usize) -> f64 {
    index as f64 / (GRID_POINTS - 1) as f64
}

/// Calibration method discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationMethod {
    LogBounds,
    Polynomial,
    Grid,
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationMethod::LogBounds => write!(f, "LOG_BOUNDS"),
            CalibrationMethod::Polynomial => write!(f, "POLYNOMIAL"),
            CalibrationMethod::Grid => write!(f, "GRID"),
        }
    }
}

/// Logarithmic price frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min_price: f64,
    pub max_price: f64,
}

impl PriceBounds {
    pub fn new(min_price: f64, max_price: f64) -> Result<Self, ValuationError> {
        let bounds = Self { min_price, max_price };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        if !self.min_price.is_finite() || !self.max_price.is_finite() {
            return Err(ValuationError::invalid("bounds must be finite"));
        }
        if self.min_price <= 0.0 {
            return Err(ValuationError::invalid(format!(
                "min_price must be > 0, got {}",
                self.min_price
            )));
        }
        if self.min_price >= self.max_price {
            return Err(ValuationError::invalid(format!(
                "min_price {} must be below max_price {}",
                self.min_price, self.max_price
            )));
        }
        Ok(())
    }

    /// Width of the frame in log space
    pub fn log_span(&self) -> f64 {
        self.max_price.ln() - self.min_price.ln()
    }
}

/// Quartic coefficients ordered `[c4, c3, c2, c1, c0]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuarticCoefficients([f64; 5]);

impl QuarticCoefficients {
    pub fn new(coefficients: [f64; 5]) -> Result<Self, ValuationError> {
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ValuationError::invalid(format!(
                "polynomial coefficients must be finite, got {:?}",
                coefficients
            )));
        }
        Ok(Self(coefficients))
    }

    /// Evaluate price(risk) with Horner's scheme
    pub fn evaluate(&self, risk: f64) -> f64 {
        self.0.iter().fold(0.0, |acc, c| acc * risk + c)
    }

    pub fn as_array(&self) -> [f64; 5] {
        self.0
    }
}

/// One (risk, price) sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub risk: f64,
    pub price: f64,
}

impl GridPoint {
    pub fn new(risk: f64, price: f64) -> Self {
        Self { risk, price }
    }
}

/// Validated 41-point grid
#[derive(Debug, Clone, PartialEq)]
pub struct PriceGrid(Vec<GridPoint>);

impl PriceGrid {
    pub fn new(points: Vec<GridPoint>) -> Result<Self, ValuationError> {
        validate_grid_points(&points).map_err(ValuationError::InvalidInput)?;
        Ok(Self(points))
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.0
    }

    pub fn first(&self) -> GridPoint {
        self.0[0]
    }

    pub fn last(&self) -> GridPoint {
        self.0[GRID_POINTS - 1]
    }
}

/// Check grid shape: 41 canonical risks, finite positive non-decreasing prices.
/// Returns a human-readable reason on failure.
pub fn validate_grid_points(points: &[GridPoint]) -> Result<(), String> {
    if points.len() != GRID_POINTS {
        return Err(format!(
            "grid must have {} points, got {}",
            GRID_POINTS,
            points.len()
        ));
    }

    for (i, point) in points.iter().enumerate() {
        if (point.risk - canonical_risk(i)).abs() > GRID_RISK_TOLERANCE {
            return Err(format!(
                "grid point {} has risk {}, expected {:.3}",
                i,
                point.risk,
                canonical_risk(i)
            ));
        }
        if !point.price.is_finite() || point.price <= 0.0 {
            return Err(format!(
                "grid point {} has invalid price {}",
                i, point.price
            ));
        }
    }

    if let Some(i) = points.windows(2).position(|w| w[1].price < w[0].price) {
        return Err(format!(
            "grid price decreases at risk {:.3}: {} -> {}",
            points[i + 1].risk,
            points[i].price,
            points[i + 1].price
        ));
    }

    Ok(())
}

/// The calibration payload, one variant per method
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationModel {
    LogBounds(PriceBounds),
    Polynomial(QuarticCoefficients),
    Grid(PriceGrid),
}

impl CalibrationModel {
    pub fn method(&self) -> CalibrationMethod {
        match self {
            CalibrationModel::LogBounds(_) => CalibrationMethod::LogBounds,
            CalibrationModel::Polynomial(_) => CalibrationMethod::Polynomial,
            CalibrationModel::Grid(_) => CalibrationMethod::Grid,
        }
    }
}

/// Root calibration record for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolCalibration {
    symbol: String,
    model: CalibrationModel,
    band_histogram: BandHistogram,
    version: u64,
    published_at: Option<DateTime<Utc>>,
}

impl SymbolCalibration {
    /// Create an unpublished calibration (version 0)
    pub fn new(
        symbol: impl Into<String>,
        model: CalibrationModel,
        band_histogram: BandHistogram,
    ) -> Result<Self, ValuationError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ValuationError::invalid("symbol cannot be empty"));
        }
        Ok(Self {
            symbol,
            model,
            band_histogram,
            version: 0,
            published_at: None,
        })
    }

    /// Draft replacement carrying a new model and the same histogram
    pub fn with_model(&self, model: CalibrationModel) -> Self {
        Self {
            symbol: self.symbol.clone(),
            model,
            band_histogram: self.band_histogram,
            version: 0,
            published_at: None,
        }
    }

    /// Draft replacement carrying a new histogram and the same model
    pub fn with_histogram(&self, band_histogram: BandHistogram) -> Self {
        Self {
            symbol: self.symbol.clone(),
            model: self.model.clone(),
            band_histogram,
            version: 0,
            published_at: None,
        }
    }

    /// Stamp version and publication time; only the store does this
    pub(crate) fn into_published(mut self, version: u64, published_at: DateTime<Utc>) -> Self {
        self.version = version;
        self.published_at = Some(published_at);
        self
    }

    /// Restore persisted version metadata
    pub(crate) fn with_persisted_version(
        mut self,
        version: u64,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.version = version;
        self.published_at = published_at;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn method(&self) -> CalibrationMethod {
        self.model.method()
    }

    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    pub fn band_histogram(&self) -> &BandHistogram {
        &self.band_histogram
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn bounds(&self) -> Option<&PriceBounds> {
        match &self.model {
            CalibrationModel::LogBounds(bounds) => Some(bounds),
            _ => None,
        }
    }

    pub fn coefficients(&self) -> Option<&QuarticCoefficients> {
        match &self.model {
            CalibrationModel::Polynomial(coefficients) => Some(coefficients),
            _ => None,
        }
    }

    pub fn grid(&self) -> Option<&PriceGrid> {
        match &self.model {
            CalibrationModel::Grid(grid) => Some(grid),
            _ => None,
        }
    }
}
