use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{
    EPSILON, KSIGMA_CLIP_K, KSIGMA_CLIP_MAX_ITERATIONS, KSIGMA_CLIP_TOLERANCE, MRS_INITIAL_LAYERS,
    MRS_MIN_SURVIVING_FRACTION, PARALLEL_PIXEL_THRESHOLD, STARLET_NOISE_COEFFICIENTS,
};
use crate::multiscale::starlet;

/// Result of a noise estimation pass over one channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseEstimate {
    pub sigma: f64,
    pub surviving_fraction: f64,
    pub algorithm: NoiseAlgorithm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseAlgorithm {
    KSigma,
    MultiresolutionSupport { layers: usize },
}

impl std::fmt::Display for NoiseAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseAlgorithm::KSigma => write!(f, "k-sigma"),
            NoiseAlgorithm::MultiresolutionSupport { layers } => {
                write!(f, "multiresolution-support(J={layers})")
            }
        }
    }
}

/// Which noise estimator a calibration run should use, as a configuration
/// choice (as opposed to [`NoiseAlgorithm`], which records the algorithm
/// an estimate actually used, including the MRS layer count it settled on).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NoiseAlgorithmChoice {
    KSigma,
    #[default]
    MultiresolutionSupport,
}

impl std::fmt::Display for NoiseAlgorithmChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseAlgorithmChoice::KSigma => write!(f, "k-sigma"),
            NoiseAlgorithmChoice::MultiresolutionSupport => write!(f, "multiresolution-support"),
        }
    }
}

/// Estimate noise with the selected algorithm.
pub fn estimate_noise(channel: &Array2<f32>, algorithm: NoiseAlgorithmChoice) -> NoiseEstimate {
    match algorithm {
        NoiseAlgorithmChoice::KSigma => k_sigma_noise(channel),
        NoiseAlgorithmChoice::MultiresolutionSupport => mrs_noise(channel),
    }
}

/// k-sigma noise estimator: compute the first starlet detail layer, iterate
/// k=3 sigma clipping (tolerance 0.01, up to 10 iterations), and return the
/// clipped standard deviation divided by the layer-0 Gaussian scaling factor.
pub fn k_sigma_noise(channel: &Array2<f32>) -> NoiseEstimate {
    let (layers, _residual) = starlet::decompose(channel, 1);
    let detail = &layers[0];

    let values: Vec<f64> = detail.iter().map(|&v| v as f64).collect();
    let n = values.len();
    let mut mask = vec![true; n];

    let mut sigma = population_stddev(&values, &mask).1;
    for _ in 0..KSIGMA_CLIP_MAX_ITERATIONS {
        let (mean, new_sigma) = population_stddev(&values, &mask);
        if new_sigma < EPSILON {
            sigma = new_sigma;
            break;
        }
        let lo = mean - KSIGMA_CLIP_K * new_sigma;
        let hi = mean + KSIGMA_CLIP_K * new_sigma;
        for (v, m) in values.iter().zip(mask.iter_mut()) {
            if *m && (*v < lo || *v > hi) {
                *m = false;
            }
        }
        let relative_change = ((new_sigma - sigma) / sigma.max(EPSILON)).abs();
        sigma = new_sigma;
        if relative_change < KSIGMA_CLIP_TOLERANCE {
            break;
        }
    }

    let surviving = mask.iter().filter(|&&m| m).count();
    let scaled_sigma = sigma / STARLET_NOISE_COEFFICIENTS[0];

    NoiseEstimate {
        sigma: scaled_sigma,
        surviving_fraction: surviving as f64 / n.max(1) as f64,
        algorithm: NoiseAlgorithm::KSigma,
    }
}

/// Multiresolution-support noise estimator. Starts at `J=4` layers, building
/// the union of detail-layer samples exceeding `k*sigma0` (sigma0 from
/// [`k_sigma_noise`] at layer 0), and estimates noise as the standard
/// deviation of samples absent from that support. Accepts when the surviving
/// fraction is >= 1% and sigma > 0; otherwise decrements J and retries,
/// falling back to the k-sigma result once J reaches 1.
pub fn mrs_noise(channel: &Array2<f32>) -> NoiseEstimate {
    let ksigma = k_sigma_noise(channel);
    let sigma0 = ksigma.sigma;

    let mut layers_count = MRS_INITIAL_LAYERS;
    while layers_count >= 1 {
        let (layers, _residual) = starlet::decompose(channel, layers_count);
        let (h, w) = channel.dim();
        let n = h * w;
        let mut in_support = vec![false; n];

        for (j, layer) in layers.iter().enumerate() {
            let threshold = KSIGMA_CLIP_K * sigma0 * STARLET_NOISE_COEFFICIENTS.get(j).copied().unwrap_or(0.001);
            for (idx, &v) in layer.iter().enumerate() {
                if (v as f64).abs() > threshold {
                    in_support[idx] = true;
                }
            }
        }

        let outside: Vec<f64> = channel
            .iter()
            .zip(in_support.iter())
            .filter(|(_, &supported)| !supported)
            .map(|(&v, _)| v as f64)
            .collect();

        let fraction = outside.len() as f64 / n.max(1) as f64;
        if fraction >= MRS_MIN_SURVIVING_FRACTION && !outside.is_empty() {
            let mask = vec![true; outside.len()];
            let (_, sigma) = population_stddev(&outside, &mask);
            if sigma > 0.0 {
                return NoiseEstimate {
                    sigma,
                    surviving_fraction: fraction,
                    algorithm: NoiseAlgorithm::MultiresolutionSupport { layers: layers_count },
                };
            }
        }

        if layers_count == 1 {
            break;
        }
        layers_count -= 1;
    }

    ksigma
}

/// 2x2 integer-downsample a CFA channel by averaging each 2x2 tile, used
/// before noise evaluation or dark optimization on Bayer-mosaiced masters.
pub fn downsample_cfa_2x2(channel: &Array2<f32>) -> Array2<f32> {
    let (h, w) = channel.dim();
    let (dh, dw) = (h / 2, w / 2);
    let mut result = Array2::<f32>::zeros((dh, dw));

    let compute = |row: usize| -> Vec<f32> {
        let mut out = vec![0.0f32; dw];
        for col in 0..dw {
            let sum = channel[[2 * row, 2 * col]]
                + channel[[2 * row, 2 * col + 1]]
                + channel[[2 * row + 1, 2 * col]]
                + channel[[2 * row + 1, 2 * col + 1]];
            out[col] = sum / 4.0;
        }
        out
    };

    if dh * dw >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<f32>> = (0..dh).into_par_iter().map(compute).collect();
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, v) in row_data.into_iter().enumerate() {
                result[[row, col]] = v;
            }
        }
    } else {
        for row in 0..dh {
            for (col, v) in compute(row).into_iter().enumerate() {
                result[[row, col]] = v;
            }
        }
    }

    result
}

fn population_stddev(values: &[f64], mask: &[bool]) -> (f64, f64) {
    let mut sum = 0.0;
    let mut count = 0u64;
    for (v, m) in values.iter().zip(mask.iter()) {
        if *m {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let mut var_sum = 0.0;
    for (v, m) in values.iter().zip(mask.iter()) {
        if *m {
            let d = v - mean;
            var_sum += d * d;
        }
    }
    (mean, (var_sum / count as f64).sqrt())
}
