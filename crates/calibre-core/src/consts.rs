/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// B3 spline 1D kernel coefficients: [1, 4, 6, 4, 1] / 16, used by the starlet transform.
pub const B3_KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-10;

/// Clamps denominators that could otherwise blow up to infinity or NaN.
pub const TINY: f64 = 1e-15;

/// Starlet per-layer Gaussian noise scaling coefficients, starting at layer 0.
/// Halves approximately every layer; used to convert raw wavelet-detail sigma
/// into an estimate of per-pixel Gaussian noise.
pub const STARLET_NOISE_COEFFICIENTS: [f64; 8] = [
    0.8907, 0.2007, 0.0856, 0.0413, 0.0205, 0.0102, 0.0051, 0.0026,
];

/// k-sigma clipping threshold used by the noise estimator.
pub const KSIGMA_CLIP_K: f64 = 3.0;
/// k-sigma clipping convergence tolerance (fractional change in sigma).
pub const KSIGMA_CLIP_TOLERANCE: f64 = 0.01;
/// k-sigma clipping iteration cap.
pub const KSIGMA_CLIP_MAX_ITERATIONS: usize = 10;

/// Initial number of layers used by the multiresolution-support noise estimator.
pub const MRS_INITIAL_LAYERS: usize = 4;
/// Minimum surviving pixel fraction (outside the multiresolution support) for the
/// MRS estimate to be accepted.
pub const MRS_MIN_SURVIVING_FRACTION: f64 = 0.01;

/// Default sample spacing (in pixels) for the gridded background model.
pub const BACKGROUND_GRID_SPACING: usize = 40;
/// Range-clipping bounds applied before taking tile medians.
pub const BACKGROUND_CLIP_LOW: f64 = 0.0;
pub const BACKGROUND_CLIP_HIGH: f64 = 0.92;
/// MAD multiplier used to reject outlying tile medians (3 * 1.5 = 4.5).
pub const BACKGROUND_MAD_REJECTION_FACTOR: f64 = 3.0 * 1.5;
/// Shepard interpolation radius (in grid units) for the background scatter.
pub const BACKGROUND_SHEPARD_RADIUS: f64 = 0.1;
/// Steps in the coarse regular evaluation grid precomputed from the Shepard fit.
pub const BACKGROUND_EVAL_STEPS: usize = 16;
/// Minimum number of surviving tiles for the background model to be usable.
pub const BACKGROUND_MIN_TILES: usize = 16;

/// Overscan/master median range-clipping bounds.
pub const OVERSCAN_CLIP_LOW: f64 = 0.00002;
pub const OVERSCAN_CLIP_HIGH: f64 = 0.99998;

/// Default square window side (in pixels) used to crop target/dark before
/// dark-scale optimization.
pub const DARK_OPTIMIZE_WINDOW_DEFAULT: usize = 1024;
/// Minimum surviving dark-pixel count for the optimization threshold; below
/// this cardinality, optimization for the channel is disabled.
pub const DARK_OPTIMIZE_MIN_PIXELS: usize = 16;
/// Scale factors below this value are reported as "no correlation".
pub const DARK_OPTIMIZE_NO_CORRELATION_THRESHOLD: f64 = 0.005;
/// MAD-to-sigma conversion factor (for a normal distribution).
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Golden ratio, used by the bracket-expansion phase of dark-scale optimization.
pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;
/// Golden-section search convergence tolerance on the bracket width.
pub const GOLDEN_SECTION_TOLERANCE: f64 = 5e-4;
/// Guard against division by near-zero denominators in parabolic extrapolation.
pub const PARABOLA_TINY: f64 = 1e-20;

/// Local-normalization defaults.
pub const NORMALIZATION_SCALE_DEFAULT: u32 = 128;
pub const NORMALIZATION_SCALE_MIN: u32 = 32;
pub const NORMALIZATION_BACKGROUND_LIMIT_DEFAULT: f64 = 0.05;
pub const NORMALIZATION_REFERENCE_THRESHOLD_DEFAULT: f64 = 0.5;
pub const NORMALIZATION_TARGET_THRESHOLD_DEFAULT: f64 = 0.5;
pub const NORMALIZATION_HOT_PIXEL_RADIUS_DEFAULT: u32 = 2;
pub const NORMALIZATION_NOISE_REDUCTION_RADIUS_DEFAULT: u32 = 0;
/// Samples below this value in either image are treated as excluded (zero).
pub const NORMALIZATION_ZERO_EXCLUSION_THRESHOLD: f64 = 4.5e-5;
/// Number of multiscale-median layers used for background re-estimation.
pub const NORMALIZATION_BACKGROUND_LAYERS: usize = 16;

/// Superbias configuration bounds.
pub const SUPERBIAS_MIN_LAYERS: usize = 1;
pub const SUPERBIAS_MAX_LAYERS: usize = 10;
pub const SUPERBIAS_MAX_TRIMMING_FACTOR: f64 = 0.4;

/// Batch driver defaults.
pub const DEFAULT_MAX_FILE_READ_THREADS: usize = 1;
pub const DEFAULT_MAX_FILE_WRITE_THREADS: usize = 1;
pub const DEFAULT_FILE_THREAD_OVERLOAD: f64 = 1.0;
