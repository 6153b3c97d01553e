use serde::Serialize;

use super::band::RiskBand;
use super::calibration::CalibrationMethod;
use super::signal::{Bias, Signal, Zone};

/// Per-query valuation result. Built fresh for each request and owns no
/// shared state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub symbol: String,
    pub price: f64,
    pub risk_value: f64,
    pub risk_band: RiskBand,
    pub band_coefficient: f64,
    pub zone: Zone,
    pub bias: Bias,
    pub composite_score: u8,
    pub win_rate_estimate: f64,
    /// Snapshot version that answered the query
    pub calibration_version: u64,
    pub method: CalibrationMethod,
}

impl RiskAssessment {
    pub fn new(
        symbol: String,
        price: f64,
        risk_value: f64,
        band_coefficient: f64,
        signal: Signal,
        calibration_version: u64,
        method: CalibrationMethod,
    ) -> Self {
        Self {
            symbol,
            price,
            risk_value,
            risk_band: RiskBand::from_risk(risk_value),
            band_coefficient,
            zone: signal.zone,
            bias: signal.bias,
            composite_score: signal.composite_score,
            win_rate_estimate: signal.win_rate_estimate,
            calibration_version,
            method,
        }
    }

    pub fn signal(&self) -> Signal {
        Signal {
            zone: self.zone,
            bias: self.bias,
            composite_score: self.composite_score,
            win_rate_estimate: self.win_rate_estimate,
        }
    }
}
