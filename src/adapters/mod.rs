//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - JSON file: calibration persistence
//! - CLI: Operator command-line interface

pub mod cli;
pub mod json_file;

pub use cli::CliApp;
pub use json_file::JsonCalibrationRepository;
