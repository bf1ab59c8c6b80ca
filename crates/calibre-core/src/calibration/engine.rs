use ndarray::{Array2, Array3};
use rayon::prelude::*;

use crate::calibration::cfa::{detect_cfa, downsample_cfa_image};
use crate::calibration::dark_optimize::{optimize_dark_scale, DarkScaleResult};
use crate::calibration::overscan::{apply_overscan, OverscanRegion};
use crate::calibration::pedestal::PedestalSource;
use crate::consts::{PARALLEL_PIXEL_THRESHOLD, TINY};
use crate::error::{CalibError, Result};
use crate::image::{ColorFilterArray, Image, Rectangle};
use crate::multiscale::noise::{estimate_noise, NoiseAlgorithmChoice, NoiseEstimate};

/// Per-channel calibration masters and scale knobs for a single target.
#[derive(Clone, Debug, Default)]
pub struct CalibrationInputs {
    pub bias: Option<Image>,
    pub dark: Option<Image>,
    pub dark_scale: Vec<Option<f64>>,
    pub flat: Option<Image>,
    pub flat_scale: Vec<f64>,
    pub overscan_regions: Vec<OverscanRegion>,
    pub image_rect: Option<Rectangle>,
    pub pedestal: PedestalSource,
    pub output_pedestal_normalized: f64,
    pub optimize_dark_scale: bool,
    pub dark_optimize_window: Option<usize>,
    pub dark_optimize_low_sigma: f64,
    pub noise_algorithm: NoiseAlgorithmChoice,
}

/// Per-channel result of calibrating a single target.
#[derive(Clone, Debug)]
pub struct ChannelReport {
    pub dark_scale_used: Option<f64>,
    pub noise: NoiseEstimate,
}

/// Full calibration result: the corrected image plus per-channel reports.
#[derive(Clone, Debug)]
pub struct CalibrationReport {
    pub image: Image,
    pub channels: Vec<ChannelReport>,
    pub cfa: ColorFilterArray,
}

/// Calibrate a single target image against its masters, per the fused
/// per-channel pipeline: overscan -> pedestal -> bias -> dark(*scale) ->
/// flat -> output pedestal -> truncate.
pub fn calibrate(target: &Image, inputs: &CalibrationInputs) -> Result<CalibrationReport> {
    let overscanned = if inputs.overscan_regions.is_empty() {
        target.clone()
    } else {
        let rect = inputs
            .image_rect
            .unwrap_or_else(|| Rectangle::new(0, 0, target.width() as u32, target.height() as u32).unwrap());
        apply_overscan(target, &inputs.overscan_regions, &rect)
    };

    let channels = overscanned.channels();
    let input_pedestal = inputs.pedestal.resolve_normalized(&overscanned.metadata);

    let mut out_data = Array3::<f32>::zeros((channels, overscanned.height(), overscanned.width()));
    let mut dark_scales_used = Vec::with_capacity(channels);

    for c in 0..channels {
        let t = overscanned.channel(c).to_owned();
        let bias = inputs.bias.as_ref().map(|b| {
            let bc = c.min(b.channels() - 1);
            b.channel(bc).to_owned()
        });
        let dark = inputs.dark.as_ref().map(|d| {
            let dc = c.min(d.channels() - 1);
            d.channel(dc).to_owned()
        });
        let flat = inputs.flat.as_ref().map(|f| {
            let fc = c.min(f.channels() - 1);
            f.channel(fc).to_owned()
        });

        let mut dark_scale = inputs.dark_scale.get(c).copied().flatten().unwrap_or(1.0);

        if inputs.optimize_dark_scale {
            if let Some(dark_ref) = &dark {
                match optimize_dark_scale(
                    &t,
                    dark_ref,
                    inputs.dark_optimize_window,
                    inputs.dark_optimize_low_sigma,
                ) {
                    DarkScaleResult::Scale(k) => dark_scale = k,
                    DarkScaleResult::NoCorrelation => dark_scale = 0.0,
                    DarkScaleResult::Disabled => {}
                }
            }
        }

        let corrected = calibrate_channel(
            &t,
            bias.as_ref(),
            dark.as_ref(),
            dark_scale,
            flat.as_ref(),
            inputs.flat_scale.get(c).copied().unwrap_or(1.0),
            input_pedestal,
            inputs.output_pedestal_normalized,
        )?;

        out_data.index_axis_mut(ndarray::Axis(0), c).assign(&corrected);
        dark_scales_used.push(inputs.dark.as_ref().map(|_| dark_scale));
    }

    let mut result = Image::new(out_data)?;
    result.metadata = overscanned.metadata.clone();
    result.truncate();
    let cfa = detect_cfa(&result);
    result.set_cfa(cfa);

    let noise_estimates = evaluate_noise(&result, inputs.noise_algorithm);
    let reports = dark_scales_used
        .into_iter()
        .zip(noise_estimates)
        .map(|(dark_scale_used, noise)| ChannelReport { dark_scale_used, noise })
        .collect();

    Ok(CalibrationReport {
        image: result,
        channels: reports,
        cfa,
    })
}

#[allow(clippy::too_many_arguments)]
fn calibrate_channel(
    target: &Array2<f32>,
    bias: Option<&Array2<f32>>,
    dark: Option<&Array2<f32>>,
    dark_scale: f64,
    flat: Option<&Array2<f32>>,
    flat_scale: f64,
    input_pedestal: f64,
    output_pedestal: f64,
) -> Result<Array2<f32>> {
    let (h, w) = target.dim();
    let flat_norm = flat.map(normalized_flat).transpose()?;

    let compute_row = |row: usize| -> Vec<f32> {
        let mut out = vec![0.0f32; w];
        for col in 0..w {
            let t = target[[row, col]] as f64 - input_pedestal;
            let corrected = match (bias, dark, flat_norm.as_ref()) {
                (None, None, None) => calibrate_plain(t),
                (Some(b), None, None) => calibrate_bias(t, b[[row, col]] as f64),
                (None, Some(d), None) => calibrate_dark(t, d[[row, col]] as f64, dark_scale),
                (Some(b), Some(d), None) => {
                    calibrate_bias_dark(t, b[[row, col]] as f64, d[[row, col]] as f64, dark_scale)
                }
                (None, None, Some(f)) => calibrate_flat(t, f[[row, col]] as f64, flat_scale),
                (Some(b), None, Some(f)) => {
                    calibrate_bias_flat(t, b[[row, col]] as f64, f[[row, col]] as f64, flat_scale)
                }
                (None, Some(d), Some(f)) => calibrate_dark_flat(
                    t,
                    d[[row, col]] as f64,
                    dark_scale,
                    f[[row, col]] as f64,
                    flat_scale,
                ),
                (Some(b), Some(d), Some(f)) => calibrate_bias_dark_flat(
                    t,
                    b[[row, col]] as f64,
                    d[[row, col]] as f64,
                    dark_scale,
                    f[[row, col]] as f64,
                    flat_scale,
                ),
            };
            out[col] = (corrected + output_pedestal) as f32;
        }
        out
    };

    let mut result = Array2::<f32>::zeros((h, w));
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<f32>> = (0..h).into_par_iter().map(compute_row).collect();
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, v) in row_data.into_iter().enumerate() {
                result[[row, col]] = v;
            }
        }
    } else {
        for row in 0..h {
            for (col, v) in compute_row(row).into_iter().enumerate() {
                result[[row, col]] = v;
            }
        }
    }

    Ok(result)
}

fn normalized_flat(flat: &Array2<f32>) -> Result<Array2<f32>> {
    let mean = flat.mean().unwrap_or(0.0) as f64;
    if mean.abs() < 1e-12 {
        return Err(CalibError::NumericalInstability(
            "flat channel mean is approximately zero".to_string(),
        ));
    }
    Ok(flat.mapv(|v| (v as f64 / mean) as f32))
}

fn calibrate_plain(t: f64) -> f64 {
    t
}

fn calibrate_bias(t: f64, b: f64) -> f64 {
    t - b
}

fn calibrate_dark(t: f64, d: f64, scale: f64) -> f64 {
    t - scale * d
}

fn calibrate_bias_dark(t: f64, b: f64, d: f64, scale: f64) -> f64 {
    t - b - scale * d
}

fn calibrate_flat(t: f64, f: f64, scale: f64) -> f64 {
    t * scale / f.max(TINY)
}

fn calibrate_bias_flat(t: f64, b: f64, f: f64, scale: f64) -> f64 {
    (t - b) * scale / f.max(TINY)
}

fn calibrate_dark_flat(t: f64, d: f64, dark_scale: f64, f: f64, flat_scale: f64) -> f64 {
    (t - dark_scale * d) * flat_scale / f.max(TINY)
}

fn calibrate_bias_dark_flat(t: f64, b: f64, d: f64, dark_scale: f64, f: f64, flat_scale: f64) -> f64 {
    (t - b - dark_scale * d) * flat_scale / f.max(TINY)
}

/// Evaluate noise on a calibrated image with the configured algorithm,
/// downsampling first when the image is CFA-mosaiced.
pub fn evaluate_noise(image: &Image, algorithm: NoiseAlgorithmChoice) -> Vec<NoiseEstimate> {
    let working = if image.cfa() != ColorFilterArray::None {
        downsample_cfa_image(image)
    } else {
        image.clone()
    };
    working
        .channels_iter()
        .map(|ch| estimate_noise(&ch.to_owned(), algorithm))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn mono_image(value: f32, h: usize, w: usize) -> Image {
        Image::new(Array3::from_elem((1, h, w), value)).unwrap()
    }

    #[test]
    fn plain_calibration_is_identity_when_no_masters() {
        let target = mono_image(0.5, 16, 16);
        let inputs = CalibrationInputs {
            dark_scale: vec![None],
            flat_scale: vec![1.0],
            ..Default::default()
        };
        let report = calibrate(&target, &inputs).unwrap();
        for v in report.image.channel(0).iter() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn bias_and_dark_subtraction_are_applied() {
        let target = mono_image(0.5, 16, 16);
        let bias = mono_image(0.05, 16, 16);
        let dark = mono_image(0.1, 16, 16);
        let inputs = CalibrationInputs {
            bias: Some(bias),
            dark: Some(dark),
            dark_scale: vec![Some(1.0)],
            flat_scale: vec![1.0],
            ..Default::default()
        };
        let report = calibrate(&target, &inputs).unwrap();
        for v in report.image.channel(0).iter() {
            assert!((v - 0.35).abs() < 1e-5, "got {v}");
        }
    }

    #[test]
    fn zero_mean_flat_is_numerical_instability() {
        let target = mono_image(0.5, 16, 16);
        let flat = mono_image(0.0, 16, 16);
        let inputs = CalibrationInputs {
            flat: Some(flat),
            dark_scale: vec![None],
            flat_scale: vec![1.0],
            ..Default::default()
        };
        let err = calibrate(&target, &inputs).unwrap_err();
        assert!(matches!(err, CalibError::NumericalInstability(_)));
    }
}
