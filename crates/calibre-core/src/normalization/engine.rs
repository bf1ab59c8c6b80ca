use ndarray::Array2;

use crate::consts::{NORMALIZATION_BACKGROUND_LAYERS, NORMALIZATION_ZERO_EXCLUSION_THRESHOLD};
use crate::error::{CalibError, Result};
use crate::image::Image;
use crate::multiscale::mmt;
use crate::normalization::config::NormalizationConfig;
use crate::normalization::filters::{gaussian_blur, hot_pixel_median, median_3x3};
use crate::normalization::rejection::{apply_rejection, classify_outliers};
use crate::surface::background::BackgroundModel;
use crate::surface::bspline::BicubicBSplineSurface;

/// Reports progress at the coarse stage boundaries of [`build_normalization`].
/// Default methods are no-ops, mirroring the batch driver's progress trait.
pub trait ProgressReporter: Send + Sync {
    fn begin_stage(&self, _stage: NormalizationStage) {}
    fn advance(&self, _stage: NormalizationStage, _fraction: f32) {}
    fn finish_stage(&self, _stage: NormalizationStage) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizationStage {
    Rejection,
    Background,
    Solve,
    Smooth,
}

pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Per-channel `A` (scale) and `B` (offset) surfaces, each sampled on a
/// `(height * 2/scale) x (width * 2/scale)` coefficient grid.
#[derive(Clone, Debug)]
pub struct NormalizationSolution {
    pub a: Vec<Array2<f32>>,
    pub b: Vec<Array2<f32>>,
    pub reference_width: u32,
    pub reference_height: u32,
    pub scale: u32,
}

impl NormalizationSolution {
    /// Sample the `(A, B)` pair at full-image coordinates `(y, x)` for
    /// channel `c`, via bicubic B-spline interpolation over the coefficient
    /// grids — this is the function-surface-plot data hook.
    pub fn sample_surface(&self, c: usize, y: f64, x: f64) -> (f32, f32) {
        let gy = y * self.a[c].dim().0 as f64 / self.reference_height.max(1) as f64;
        let gx = x * self.a[c].dim().1 as f64 / self.reference_width.max(1) as f64;
        let a_surface = BicubicBSplineSurface::new(self.a[c].clone());
        let b_surface = BicubicBSplineSurface::new(self.b[c].clone());
        (a_surface.evaluate(gy, gx), b_surface.evaluate(gy, gx))
    }
}

/// Build the local-normalization `(A, B)` surfaces between `reference` and
/// `target`. Requires identical geometry and `min(width, height) >=
/// max(256, 2*scale)`.
pub fn build_normalization(
    reference: &Image,
    target: &Image,
    config: &NormalizationConfig,
    reporter: &dyn ProgressReporter,
) -> Result<NormalizationSolution> {
    reference.require_same_geometry(target, "local normalization reference/target")?;

    let scale = config.effective_scale();
    let min_side = reference.width().min(reference.height()) as u32;
    if min_side < 256u32.max(2 * scale) {
        return Err(CalibError::InsufficientData(format!(
            "image side {min_side} is too small for normalization scale {scale}"
        )));
    }

    let mut a_channels = Vec::with_capacity(reference.channels());
    let mut b_channels = Vec::with_capacity(reference.channels());

    for c in 0..reference.channels() {
        let mut r = reference.channel(c).to_owned();
        let mut t = target.channel(c).to_owned();

        zero_exclusion(&mut r, &mut t);

        let rb0 = BackgroundModel::fit(&r, 40).map(|m| m.to_full_resolution());
        let tb0 = BackgroundModel::fit(&t, 40).map(|m| m.to_full_resolution());
        if let (Ok(rb), Ok(tb)) = (&rb0, &tb0) {
            substitute_zeros(&mut r, rb);
            substitute_zeros(&mut t, tb);
        }

        r = hot_pixel_median(&r, config.hot_pixel_filter_radius);
        t = hot_pixel_median(&t, config.hot_pixel_filter_radius);

        r = gaussian_blur(&r, config.noise_reduction_filter_radius);
        t = gaussian_blur(&t, config.noise_reduction_filter_radius);

        reporter.begin_stage(NormalizationStage::Rejection);
        if config.enable_rejection {
            if let (Ok(rb), Ok(tb)) = (&rb0, &tb0) {
                let (ref_mask, target_mask) = classify_outliers(
                    &r,
                    &t,
                    rb,
                    tb,
                    config.background_limit,
                    config.reference_threshold,
                    config.target_threshold,
                );
                apply_rejection(&mut r, &mut t, &ref_mask, &target_mask);
                substitute_zeros(&mut r, rb);
                substitute_zeros(&mut t, tb);
            }
        }
        reporter.finish_stage(NormalizationStage::Rejection);

        reporter.begin_stage(NormalizationStage::Background);
        let mmt_scale = (scale as f64 / 32.0).round().max(1.0) as usize;
        let rb = background_residual(&r, mmt_scale);
        let tb = background_residual(&t, mmt_scale);
        reporter.finish_stage(NormalizationStage::Background);

        reporter.begin_stage(NormalizationStage::Solve);
        let (h, w) = r.dim();
        let mut a = Array2::<f32>::ones((h, w));
        let mut b = Array2::<f32>::zeros((h, w));
        for row in 0..h {
            for col in 0..w {
                let bval = rb[[row, col]] - tb[[row, col]];
                b[[row, col]] = bval;
                a[[row, col]] = if config.no_scale {
                    1.0
                } else {
                    let tval = t[[row, col]];
                    if tval.abs() > 1e-12 {
                        (r[[row, col]] - bval) / tval
                    } else {
                        1.0
                    }
                };
            }
        }
        reporter.finish_stage(NormalizationStage::Solve);

        reporter.begin_stage(NormalizationStage::Smooth);
        let a_smoothed = median_3x3(&a);
        let ratio = 2.0 / scale as f64;
        let down_h = ((h as f64 * ratio).round() as usize).max(1);
        let down_w = ((w as f64 * ratio).round() as usize).max(1);
        let a_surface = BicubicBSplineSurface::new(a_smoothed);
        let b_surface = BicubicBSplineSurface::new(b);
        let a_down = a_surface.evaluate_full(down_h, down_w);
        let b_down = b_surface.evaluate_full(down_h, down_w);
        reporter.finish_stage(NormalizationStage::Smooth);

        a_channels.push(a_down);
        b_channels.push(b_down);
    }

    Ok(NormalizationSolution {
        a: a_channels,
        b: b_channels,
        reference_width: reference.width() as u32,
        reference_height: reference.height() as u32,
        scale,
    })
}

fn zero_exclusion(reference: &mut Array2<f32>, target: &mut Array2<f32>) {
    for (r, t) in reference.iter_mut().zip(target.iter_mut()) {
        if (*r as f64) < NORMALIZATION_ZERO_EXCLUSION_THRESHOLD
            || (*t as f64) < NORMALIZATION_ZERO_EXCLUSION_THRESHOLD
        {
            *r = 0.0;
            *t = 0.0;
        }
    }
}

fn substitute_zeros(data: &mut Array2<f32>, background: &Array2<f32>) {
    for (v, &b) in data.iter_mut().zip(background.iter()) {
        if *v == 0.0 {
            *v = b;
        }
    }
}

/// Background re-estimation by multiscale-median transform, anchored at
/// `mmt_scale` (the normalization scale expressed in `round(scale/32)`
/// dyadic steps) and decomposed `NORMALIZATION_BACKGROUND_LAYERS` layers
/// past that anchor before keeping the residual.
fn background_residual(channel: &Array2<f32>, mmt_scale: usize) -> Array2<f32> {
    let start_layer = mmt_scale.saturating_sub(1);
    let (_layers, residual) = mmt::decompose_from(channel, start_layer, NORMALIZATION_BACKGROUND_LAYERS);
    residual
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn identical_images_normalize_to_unit_scale_and_zero_offset() {
        let data = Array3::<f32>::from_elem((1, 256, 256), 0.4);
        let reference = Image::new(data.clone()).unwrap();
        let target = Image::new(data).unwrap();
        let config = NormalizationConfig::default();
        let solution = build_normalization(&reference, &target, &config, &NoOpReporter).unwrap();
        for v in solution.a[0].iter() {
            assert!((v - 1.0).abs() < 0.2, "got {v}");
        }
        for v in solution.b[0].iter() {
            assert!(v.abs() < 0.05, "got {v}");
        }
    }

    #[test]
    fn mismatched_geometry_is_rejected() {
        let reference = Image::new(Array3::<f32>::zeros((1, 256, 256))).unwrap();
        let target = Image::new(Array3::<f32>::zeros((1, 128, 128))).unwrap();
        let config = NormalizationConfig::default();
        let err = build_normalization(&reference, &target, &config, &NoOpReporter).unwrap_err();
        assert!(matches!(err, CalibError::GeometryMismatch(_)));
    }

    #[test]
    fn too_small_image_is_insufficient_data() {
        let reference = Image::new(Array3::<f32>::from_elem((1, 64, 64), 0.3)).unwrap();
        let target = Image::new(Array3::<f32>::from_elem((1, 64, 64), 0.3)).unwrap();
        let config = NormalizationConfig::default();
        let err = build_normalization(&reference, &target, &config, &NoOpReporter).unwrap_err();
        assert!(matches!(err, CalibError::InsufficientData(_)));
    }
}
