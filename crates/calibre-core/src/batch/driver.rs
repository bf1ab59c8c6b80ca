use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::batch::config::{BatchConfig, ErrorPolicy};
use crate::batch::locks::CountedLock;
use crate::batch::naming::{output_path, resolve_unique};
use crate::batch::progress::{BatchStage, NoOpReporter, ProgressReporter};
use crate::calibration::{calibrate, CalibrationInputs};
use crate::error::{CalibError, Result};
use crate::image::Image;

/// Opaque image I/O boundary for reading a target's embedded images, per the
/// narrow-capability-interface design: the driver consumes only sample data,
/// dimensions, channel count, and CFA metadata through this trait, never a
/// concrete file format.
pub trait ImageSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Image>>;
}

/// Opaque image I/O boundary for writing calibrated output.
pub trait ImageSink: Send + Sync {
    fn write(&self, image: &Image, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// Shared cancellation flag, polled at coarse stage boundaries and between
/// row bands inside pixel kernels.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single enabled target in the batch.
pub struct Target {
    pub path: std::path::PathBuf,
    pub inputs: CalibrationInputs,
}

/// Outcome of processing one target.
#[derive(Debug)]
pub enum TargetOutcome {
    Succeeded { output_paths: Vec<std::path::PathBuf> },
    Failed { error: String },
    Skipped { reason: String },
}

/// Aggregate batch result: one outcome per target, in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<TargetOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, TargetOutcome::Succeeded { .. })).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, TargetOutcome::Failed { .. })).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, TargetOutcome::Skipped { .. })).count()
    }

    /// `succeeded / failed / skipped` summary line per the error-handling
    /// design's user-visible-behaviour contract.
    pub fn summary_line(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Run the calibration engine over every target. Masters embedded in each
/// target's [`CalibrationInputs`] are assumed already calibrated (done
/// sequentially before dispatch, per the per-thread invariant: workers never
/// mutate shared masters). One worker per target; per-channel row bands are
/// split inside [`crate::calibration::engine::calibrate`] itself.
pub fn run_calibration_batch(
    targets: Vec<Target>,
    config: &BatchConfig,
    source: &dyn ImageSource,
    sink: &dyn ImageSink,
    cancellation: &CancellationToken,
) -> BatchSummary {
    run_calibration_batch_reported(targets, config, source, sink, cancellation, &NoOpReporter)
}

pub fn run_calibration_batch_reported(
    targets: Vec<Target>,
    config: &BatchConfig,
    source: &dyn ImageSource,
    sink: &dyn ImageSink,
    cancellation: &CancellationToken,
    reporter: &dyn ProgressReporter,
) -> BatchSummary {
    let read_lock = CountedLock::new(config.max_file_read_threads);
    let write_lock = CountedLock::new(config.max_file_write_threads);

    let outcomes: Vec<TargetOutcome> = targets
        .into_par_iter()
        .enumerate()
        .map(|(index, target)| {
            if cancellation.is_cancelled() {
                return TargetOutcome::Skipped {
                    reason: "batch cancelled".to_string(),
                };
            }

            let outcome = process_target(index, &target, config, source, sink, &read_lock, &write_lock, reporter);

            if let TargetOutcome::Failed { error } = &outcome {
                warn!(target = %target.path.display(), error, "target failed");
                match config.error_policy {
                    ErrorPolicy::Abort => cancellation.cancel(),
                    ErrorPolicy::Continue | ErrorPolicy::AskUser => {}
                }
            } else {
                info!(target = %target.path.display(), "target processed");
            }

            outcome
        })
        .collect();

    BatchSummary { outcomes }
}

#[allow(clippy::too_many_arguments)]
fn process_target(
    index: usize,
    target: &Target,
    config: &BatchConfig,
    source: &dyn ImageSource,
    sink: &dyn ImageSink,
    read_lock: &CountedLock,
    write_lock: &CountedLock,
    reporter: &dyn ProgressReporter,
) -> TargetOutcome {
    reporter.begin_stage(index, BatchStage::Reading, None);
    let images = {
        let _guard = read_lock.acquire();
        source.load(&target.path)
    };
    reporter.finish_stage(index, BatchStage::Reading);

    let images = match images {
        Ok(images) if !images.is_empty() => images,
        Ok(_) => {
            return TargetOutcome::Failed {
                error: "target contains no embedded images".to_string(),
            }
        }
        Err(e) => return TargetOutcome::Failed { error: e.to_string() },
    };

    let image_count = images.len();
    let mut output_paths = Vec::with_capacity(image_count);

    for (image_index, image) in images.iter().enumerate() {
        reporter.begin_stage(index, BatchStage::Calibrating, None);
        let report = calibrate(image, &target.inputs);
        reporter.finish_stage(index, BatchStage::Calibrating);

        let report = match report {
            Ok(r) => r,
            Err(e) => return TargetOutcome::Failed { error: e.to_string() },
        };

        let candidate = output_path(&target.path, &config.output, image_index, image_count);
        let final_path = resolve_unique(candidate, config.output.overwrite, |p| sink.exists(p));

        reporter.begin_stage(index, BatchStage::Writing, None);
        let write_result = {
            let _guard = write_lock.acquire();
            sink.write(&report.image, &final_path)
        };
        reporter.finish_stage(index, BatchStage::Writing);

        if let Err(e) = write_result {
            return TargetOutcome::Failed { error: e.to_string() };
        }
        output_paths.push(final_path);
    }

    TargetOutcome::Succeeded { output_paths }
}

/// Guard against empty target lists at batch entry, per the configuration
/// error kind contract.
pub fn validate_targets(targets: &[Target]) -> Result<()> {
    if targets.is_empty() {
        return Err(CalibError::Configuration("target list is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationInputs;
    use ndarray::Array3;
    use std::sync::Mutex;

    struct MemorySource(Image);
    impl ImageSource for MemorySource {
        fn load(&self, _path: &Path) -> Result<Vec<Image>> {
            Ok(vec![self.0.clone()])
        }
    }

    struct MemorySink(Mutex<Vec<std::path::PathBuf>>);
    impl ImageSink for MemorySink {
        fn write(&self, _image: &Image, path: &Path) -> Result<()> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
        fn exists(&self, path: &Path) -> bool {
            self.0.lock().unwrap().iter().any(|p| p == path)
        }
    }

    #[test]
    fn empty_target_list_is_rejected() {
        assert!(validate_targets(&[]).is_err());
    }

    #[test]
    fn single_target_round_trips_through_the_driver() {
        let image = Image::new(Array3::<f32>::from_elem((1, 16, 16), 0.4)).unwrap();
        let source = MemorySource(image);
        let sink = MemorySink(Mutex::new(Vec::new()));
        let config = BatchConfig::default();
        let cancellation = CancellationToken::new();

        let targets = vec![Target {
            path: std::path::PathBuf::from("/tmp/frame.fits"),
            inputs: CalibrationInputs {
                dark_scale: vec![None],
                flat_scale: vec![1.0],
                ..Default::default()
            },
        }];

        let summary = run_calibration_batch(targets, &config, &source, &sink, &cancellation);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 0);
    }
}
