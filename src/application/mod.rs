pub mod engine;
pub mod rebuilder;
pub mod scheduler;
pub mod store;

pub use engine::ValuationEngine;
pub use rebuilder::{
    GridRebuilder, RebuildOutcome, RebuildPermit, RebuildSource, RebuildState, RebuildStatus,
};
pub use scheduler::{RebuildScheduler, RebuildSummary};
pub use store::CalibrationStore;
