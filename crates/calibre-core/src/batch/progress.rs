/// Coarse stage of a single target's processing, used for progress reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchStage {
    Reading,
    Calibrating,
    Normalizing,
    Writing,
}

impl std::fmt::Display for BatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading target"),
            Self::Calibrating => write!(f, "Calibrating"),
            Self::Normalizing => write!(f, "Normalizing"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for the batch driver. Implementors can
/// drive progress bars, logging, or any other host feedback. All methods
/// have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started for `target_index`. `total_items` is the
    /// number of work items in this stage (e.g. row bands), if known.
    fn begin_stage(&self, _target_index: usize, _stage: BatchStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _target_index: usize, _items_done: usize) {}

    /// The current stage is finished for `target_index`.
    fn finish_stage(&self, _target_index: usize, _stage: BatchStage) {}
}

/// No-op progress reporter, used when the driver has no host listener.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
