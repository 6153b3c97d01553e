//! Valuation Engine - Risk-to-Price Mapping Library
//!
//! Converts a market price into a normalized risk value in [0,1] and back,
//! using one of three per-asset calibration models, and classifies the result
//! into a trading signal weighted by how rarely the asset visits each risk band.
//!
//! # Modules
//!
//! - `domain`: Core types (SymbolCalibration, RiskBand, BandHistogram, RiskAssessment)
//! - `strategy`: Numeric core (PriceNormalizer, RiskInverter, BandCoefficientCalculator, SignalClassifier)
//! - `application`: CalibrationStore, GridRebuilder, ValuationEngine facade, RebuildScheduler
//! - `ports`: Persistence trait and record layout (CalibrationRepository, CalibrationRecord)
//! - `adapters`: JSON file repository and operator CLI
//! - `config`: Configuration loading and validation

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;

pub use application::{RebuildSource, ValuationEngine};
pub use domain::{RiskAssessment, SymbolCalibration, ValuationError};
pub use strategy::EngineConfig;
