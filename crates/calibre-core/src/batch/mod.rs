pub mod config;
pub mod driver;
pub mod locks;
pub mod naming;
pub mod progress;

pub use config::BatchConfig;
pub use driver::{run_calibration_batch, run_calibration_batch_reported, BatchSummary, CancellationToken, ImageSink, ImageSource, Target, TargetOutcome};
pub use progress::{BatchStage, NoOpReporter, ProgressReporter};
