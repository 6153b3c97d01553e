//! Persisted calibration layout
//!
//! A `CalibrationRecord` is the flat, serializable form of a `SymbolCalibration`.
//! Relational stores split it into one header plus 41 grid rows and 10
//! histogram rows per symbol; `CalibrationRecord::from_rows` reassembles them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{
    BandHistogram, CalibrationMethod, CalibrationModel, GridPoint, PriceBounds, PriceGrid,
    QuarticCoefficients, SymbolCalibration, ValuationError,
};

/// Serializable calibration for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub symbol: String,
    pub method: CalibrationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    /// [c4, c3, c2, c1, c0]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<[f64; 5]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grid: Vec<GridPoint>,
    /// Band label ("0.0-0.1" ... "0.9-1.0") -> days. Empty means no history.
    #[serde(default)]
    pub band_histogram: BTreeMap<String, u64>,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Scalar columns of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationHeader {
    pub symbol: String,
    pub method: CalibrationMethod,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub coefficients: Option<[f64; 5]>,
    pub version: u64,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub symbol: String,
    pub risk: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramRow {
    pub symbol: String,
    pub band_label: String,
    pub days: u64,
}

impl CalibrationRecord {
    /// Reassemble a record from its header and the rows of every symbol.
    /// Rows belonging to other symbols are ignored; grid rows are ordered by risk.
    pub fn from_rows(
        header: CalibrationHeader,
        grid_rows: &[GridRow],
        histogram_rows: &[HistogramRow],
    ) -> Self {
        let mut grid: Vec<GridPoint> = grid_rows
            .iter()
            .filter(|row| row.symbol == header.symbol)
            .map(|row| GridPoint::new(row.risk, row.price))
            .collect();
        grid.sort_by(|a, b| a.risk.total_cmp(&b.risk));

        let band_histogram = histogram_rows
            .iter()
            .filter(|row| row.symbol == header.symbol)
            .map(|row| (row.band_label.clone(), row.days))
            .collect();

        Self {
            symbol: header.symbol,
            method: header.method,
            min_price: header.min_price,
            max_price: header.max_price,
            coefficients: header.coefficients,
            grid,
            band_histogram,
            version: header.version,
            published_at: header.published_at,
        }
    }

    pub fn header(&self) -> CalibrationHeader {
        CalibrationHeader {
            symbol: self.symbol.clone(),
            method: self.method,
            min_price: self.min_price,
            max_price: self.max_price,
            coefficients: self.coefficients,
            version: self.version,
            published_at: self.published_at,
        }
    }

    pub fn grid_rows(&self) -> Vec<GridRow> {
        self.grid
            .iter()
            .map(|point| GridRow {
                symbol: self.symbol.clone(),
                risk: point.risk,
                price: point.price,
            })
            .collect()
    }

    pub fn histogram_rows(&self) -> Vec<HistogramRow> {
        self.band_histogram
            .iter()
            .map(|(label, days)| HistogramRow {
                symbol: self.symbol.clone(),
                band_label: label.clone(),
                days: *days,
            })
            .collect()
    }

    /// Malformed persisted calibration
    fn invalid(&self, reason: impl Into<String>) -> ValuationError {
        ValuationError::invalid(format!("calibration '{}': {}", self.symbol, reason.into()))
    }

    fn wrap(&self, error: ValuationError) -> ValuationError {
        match error {
            ValuationError::InvalidInput(reason) => self.invalid(reason),
            other => self.invalid(other.to_string()),
        }
    }

    fn model(&self) -> Result<CalibrationModel, ValuationError> {
        let has_bounds = self.min_price.is_some() || self.max_price.is_some();
        let has_coefficients = self.coefficients.is_some();
        let has_grid = !self.grid.is_empty();

        let populated = [has_bounds, has_coefficients, has_grid]
            .iter()
            .filter(|p| **p)
            .count();
        if populated != 1 {
            return Err(self.invalid(format!(
                "expected exactly one model payload, found {}",
                populated
            )));
        }

        let detail = |e: ValuationError| self.wrap(e);
        match self.method {
            CalibrationMethod::LogBounds => match (self.min_price, self.max_price) {
                (Some(min), Some(max)) => Ok(CalibrationModel::LogBounds(
                    PriceBounds::new(min, max).map_err(detail)?,
                )),
                _ => Err(self.invalid("LOG_BOUNDS requires min_price and max_price")),
            },
            CalibrationMethod::Polynomial => match self.coefficients {
                Some(c) => Ok(CalibrationModel::Polynomial(
                    QuarticCoefficients::new(c).map_err(detail)?,
                )),
                None => Err(self.invalid("POLYNOMIAL requires coefficients")),
            },
            CalibrationMethod::Grid if has_grid => Ok(CalibrationModel::Grid(
                PriceGrid::new(self.grid.clone()).map_err(detail)?,
            )),
            CalibrationMethod::Grid => Err(self.invalid("GRID requires 41 grid points")),
        }
    }

    /// All ten band labels must be present; zero days is a valid count
    fn histogram(&self) -> Result<BandHistogram, ValuationError> {
        BandHistogram::from_labels(&self.band_histogram).map_err(|e| self.wrap(e))
    }
}

impl From<&SymbolCalibration> for CalibrationRecord {
    fn from(calibration: &SymbolCalibration) -> Self {
        let mut record = Self {
            symbol: calibration.symbol().to_string(),
            method: calibration.method(),
            min_price: None,
            max_price: None,
            coefficients: None,
            grid: Vec::new(),
            band_histogram: calibration.band_histogram().to_labels(),
            version: calibration.version(),
            published_at: calibration.published_at(),
        };

        match calibration.model() {
            CalibrationModel::LogBounds(bounds) => {
                record.min_price = Some(bounds.min_price);
                record.max_price = Some(bounds.max_price);
            }
            CalibrationModel::Polynomial(coefficients) => {
                record.coefficients = Some(coefficients.as_array());
            }
            CalibrationModel::Grid(grid) => {
                record.grid = grid.points().to_vec();
            }
        }
        record
    }
}

impl TryFrom<CalibrationRecord> for SymbolCalibration {
    type Error = ValuationError;

    fn try_from(record: CalibrationRecord) -> Result<Self, Self::Error> {
        let model = record.model()?;
        let histogram = record.histogram()?;
        let calibration = SymbolCalibration::new(record.symbol.clone(), model, histogram)
            .map_err(|e| record.wrap(e))?;
        Ok(calibration.with_persisted_version(record.version, record.published_at))
    }
}
