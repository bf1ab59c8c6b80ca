pub mod config;
pub mod engine;
pub mod filters;
pub mod rejection;

pub use config::NormalizationConfig;
pub use engine::{build_normalization, NoOpReporter, NormalizationSolution, NormalizationStage, ProgressReporter};
