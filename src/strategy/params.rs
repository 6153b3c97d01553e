//! Engine Parameters
//!
//! Configuration structs for normalization, band weighting and classification.
//! Defaults reproduce the reference thresholds (0.3 / 0.7 zones, 1.0-1.6 rarity
//! weights, 1e-6 relative root tolerance).

use serde::{Deserialize, Serialize};

/// Combined engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub normalizer: NormalizerConfig,
    pub bands: BandConfig,
    pub classifier: ClassifierConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.normalizer.validate()?;
        self.bands.validate()?;
        self.classifier.validate()?;
        Ok(())
    }
}

/// Polynomial root search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Relative price tolerance for an accepted root
    pub tolerance: f64,
    /// Bisection iteration cap per bracket
    pub max_iterations: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

impl NormalizerConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(ParamsError::InvalidTolerance(self.tolerance));
        }
        if self.max_iterations == 0 {
            return Err(ParamsError::InvalidIterations(self.max_iterations));
        }
        Ok(())
    }
}

/// Rarity weight range for band coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    /// Weight of the most-occupied band
    pub min_coefficient: f64,
    /// Weight of the rarest band
    pub max_coefficient: f64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            min_coefficient: 1.0,
            max_coefficient: 1.6,
        }
    }
}

impl BandConfig {
    /// Width of the coefficient range (0.6 by default)
    pub fn span(&self) -> f64 {
        self.max_coefficient - self.min_coefficient
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !self.min_coefficient.is_finite()
            || !self.max_coefficient.is_finite()
            || self.min_coefficient <= 0.0
            || self.max_coefficient <= self.min_coefficient
        {
            return Err(ParamsError::InvalidCoefficientRange(
                self.min_coefficient,
                self.max_coefficient,
            ));
        }
        Ok(())
    }
}

/// Zone thresholds and score weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// risk < low_threshold => low zone
    pub low_threshold: f64,
    /// risk >= high_threshold => high zone
    pub high_threshold: f64,
    /// Composite weight of cheapness (1 - risk)
    pub cheapness_weight: f64,
    /// Composite weight of normalized rarity
    pub rarity_weight: f64,
    /// Win rate at risk 0.5
    pub win_rate_base: f64,
    /// Win rate change per unit of risk below 0.5
    pub win_rate_slope: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.3,
            high_threshold: 0.7,
            cheapness_weight: 0.7,
            rarity_weight: 0.3,
            win_rate_base: 0.5,
            win_rate_slope: 0.6,
        }
    }
}

impl ClassifierConfig {
    pub fn with_thresholds(mut self, low: f64, high: f64) -> Self {
        self.low_threshold = low;
        self.high_threshold = high;
        self
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(0.0 < self.low_threshold
            && self.low_threshold < self.high_threshold
            && self.high_threshold < 1.0)
        {
            return Err(ParamsError::InvalidThresholds(
                self.low_threshold,
                self.high_threshold,
            ));
        }
        if self.cheapness_weight < 0.0
            || self.rarity_weight < 0.0
            || (self.cheapness_weight + self.rarity_weight - 1.0).abs() > 1e-9
        {
            return Err(ParamsError::InvalidWeights(
                self.cheapness_weight,
                self.rarity_weight,
            ));
        }
        if !(0.0..=1.0).contains(&self.win_rate_base) || self.win_rate_slope < 0.0 {
            return Err(ParamsError::InvalidWinRate(
                self.win_rate_base,
                self.win_rate_slope,
            ));
        }
        Ok(())
    }
}

/// Parameter validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid root tolerance: {0} (must be 0 < tol < 1)")]
    InvalidTolerance(f64),
    #[error("Invalid iteration cap: {0} (must be > 0)")]
    InvalidIterations(usize),
    #[error("Invalid coefficient range: {0}-{1} (need 0 < min < max)")]
    InvalidCoefficientRange(f64, f64),
    #[error("Invalid zone thresholds: low {0}, high {1} (need 0 < low < high < 1)")]
    InvalidThresholds(f64, f64),
    #[error("Invalid score weights: cheapness {0}, rarity {1} (must be >= 0 and sum to 1)")]
    InvalidWeights(f64, f64),
    #[error("Invalid win rate model: base {0}, slope {1}")]
    InvalidWinRate(f64, f64),
}
