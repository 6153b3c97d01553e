//! Signal Classifier
//!
//! Turns a risk value and its band coefficient into a zone, directional bias,
//! composite score and win-rate estimate.
//!
//! composite = round(((1 - r) * w_cheap + (coef - min) / span * w_rare) * 100)
//! win_rate  = clamp(base + (0.5 - r) * slope, 0, 1)

use crate::domain::{Signal, ValuationError, Zone};
use crate::strategy::params::{BandConfig, ClassifierConfig};

#[derive(Debug, Clone, Default)]
pub struct SignalClassifier {
    config: ClassifierConfig,
    bands: BandConfig,
}

impl SignalClassifier {
    pub fn new(config: ClassifierConfig, bands: BandConfig) -> Self {
        Self { config, bands }
    }

    pub fn classify(&self, risk: f64, band_coefficient: f64) -> Result<Signal, ValuationError> {
        if !risk.is_finite() || !(0.0..=1.0).contains(&risk) {
            return Err(ValuationError::invalid(format!(
                "risk must be within [0,1], got {}",
                risk
            )));
        }
        if !band_coefficient.is_finite() {
            return Err(ValuationError::invalid(format!(
                "band coefficient must be finite, got {}",
                band_coefficient
            )));
        }

        let zone = self.zone(risk);
        Ok(Signal {
            zone,
            bias: zone.bias(),
            composite_score: self.composite_score(risk, band_coefficient),
            win_rate_estimate: self.win_rate(risk),
        })
    }

    pub fn zone(&self, risk: f64) -> Zone {
        if risk < self.config.low_threshold {
            Zone::Low
        } else if risk < self.config.high_threshold {
            Zone::Medium
        } else {
            Zone::High
        }
    }

    fn composite_score(&self, risk: f64, band_coefficient: f64) -> u8 {
        let rarity = (band_coefficient - self.bands.min_coefficient) / self.bands.span();
        let blended = (1.0 - risk) * self.config.cheapness_weight + rarity * self.config.rarity_weight;
        (blended * 100.0).round().clamp(0.0, 100.0) as u8
    }

    fn win_rate(&self, risk: f64) -> f64 {
        (self.config.win_rate_base + (0.5 - risk) * self.config.win_rate_slope).clamp(0.0, 1.0)
    }
}
