//! Risk Inverter
//!
//! Maps a risk value in [0,1] back to a price. Also synthesizes the canonical
//! 41-point grid from a model so that grid lookups after a rebuild agree with
//! the model at every grid point.

use serde::Serialize;

use crate::domain::{
    canonical_risk, CalibrationModel, GridPoint, PriceGrid, RiskBand, SymbolCalibration,
    ValuationError, GRID_POINTS,
};

/// Price interval covered by one risk band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandPriceRange {
    pub band: RiskBand,
    pub low_price: f64,
    pub high_price: f64,
}

/// Risk -> price mapper
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskInverter;

impl RiskInverter {
    pub fn new() -> Self {
        Self
    }

    /// Price for `risk` under `calibration`. Risk must lie in [0,1].
    pub fn risk_to_price(
        &self,
        calibration: &SymbolCalibration,
        risk: f64,
    ) -> Result<f64, ValuationError> {
        validate_risk(risk)?;
        Ok(model_price(calibration.model(), risk))
    }

    /// Sample the model at the 41 canonical risks
    pub fn canonical_grid(&self, model: &CalibrationModel) -> Vec<GridPoint> {
        (0..GRID_POINTS)
            .map(|i| {
                let risk = canonical_risk(i);
                GridPoint::new(risk, model_price(model, risk))
            })
            .collect()
    }

    /// Price interval of each decile band, lowest band first
    pub fn band_price_ranges(&self, calibration: &SymbolCalibration) -> Vec<BandPriceRange> {
        RiskBand::all()
            .map(|band| BandPriceRange {
                band,
                low_price: model_price(calibration.model(), band.lower()),
                high_price: model_price(calibration.model(), band.upper()),
            })
            .collect()
    }
}

fn validate_risk(risk: f64) -> Result<(), ValuationError> {
    if !risk.is_finite() || !(0.0..=1.0).contains(&risk) {
        return Err(ValuationError::invalid(format!(
            "risk must be within [0,1], got {}",
            risk
        )));
    }
    Ok(())
}

/// Unchecked model evaluation; `risk` is assumed to be in [0,1]
fn model_price(model: &CalibrationModel, risk: f64) -> f64 {
    match model {
        CalibrationModel::LogBounds(bounds) => {
            if risk <= 0.0 {
                bounds.min_price
            } else if risk >= 1.0 {
                bounds.max_price
            } else {
                (bounds.min_price.ln() + risk * bounds.log_span()).exp()
            }
        }
        CalibrationModel::Polynomial(poly) => poly.evaluate(risk),
        CalibrationModel::Grid(grid) => grid_price(grid, risk),
    }
}

/// Grid interpolation in risk. Exact grid risks return the stored price.
fn grid_price(grid: &PriceGrid, risk: f64) -> f64 {
    let points = grid.points();
    let idx = points.partition_point(|p| p.risk < risk);

    if idx == points.len() {
        return grid.last().price;
    }
    if points[idx].risk == risk || idx == 0 {
        return points[idx].price;
    }

    let lo = points[idx - 1];
    let hi = points[idx];
    lo.price + (risk - lo.risk) / (hi.risk - lo.risk) * (hi.price - lo.price)
}
