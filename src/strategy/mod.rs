//! Strategy Layer - Price/risk mapping and signal generation
//!
//! Implements the numeric core of the valuation engine:
//! - Price -> risk normalization (log bounds, grid interpolation, polynomial root search)
//! - Risk -> price inversion and canonical grid synthesis
//! - Band rarity coefficients from historical occupancy
//! - Zone / bias / composite score classification

pub mod band_coefficient;
pub mod classifier;
pub mod inverter;
pub mod normalizer;
pub mod params;

pub use band_coefficient::{BandCoefficientCalculator, BandCoefficients};
pub use classifier::SignalClassifier;
pub use inverter::{BandPriceRange, RiskInverter};
pub use normalizer::PriceNormalizer;
pub use params::{BandConfig, ClassifierConfig, EngineConfig, NormalizerConfig, ParamsError};
