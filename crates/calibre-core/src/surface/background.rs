use ndarray::Array2;

use crate::consts::{
    BACKGROUND_CLIP_HIGH, BACKGROUND_CLIP_LOW, BACKGROUND_EVAL_STEPS, BACKGROUND_GRID_SPACING,
    BACKGROUND_MAD_REJECTION_FACTOR, BACKGROUND_MIN_TILES, BACKGROUND_SHEPARD_RADIUS,
};
use crate::error::{CalibError, Result};

/// A single accepted tile sample: normalized grid coordinates in `[0, 1]` plus
/// the tile's range-clipped median value.
#[derive(Clone, Copy, Debug)]
struct TileSample {
    gy: f64,
    gx: f64,
    value: f64,
}

/// Gridded background model: a Shepard (inverse-distance) interpolant fit
/// over range-clipped, outlier-rejected tile medians, backed by a
/// precomputed coarse regular grid for fast bilinear queries.
#[derive(Clone, Debug)]
pub struct BackgroundModel {
    samples: Vec<TileSample>,
    eval_grid: Array2<f32>,
    width: usize,
    height: usize,
}

impl BackgroundModel {
    /// Fit a background model over `channel` with tile spacing `spacing`
    /// (pixels). Fails with [`CalibError::InsufficientData`] when fewer than
    /// [`BACKGROUND_MIN_TILES`] tiles survive outlier rejection.
    pub fn fit(channel: &Array2<f32>, spacing: usize) -> Result<Self> {
        let spacing = spacing.max(1);
        let (h, w) = channel.dim();

        let mut tile_medians = Vec::new();
        let mut row = 0usize;
        while row < h {
            let mut col = 0usize;
            while col < w {
                let r1 = (row + spacing).min(h);
                let c1 = (col + spacing).min(w);
                if let Some(median) = clipped_tile_median(channel, row, r1, col, c1) {
                    let gy = (row + (r1 - row) / 2) as f64 / h as f64;
                    let gx = (col + (c1 - col) / 2) as f64 / w as f64;
                    tile_medians.push(TileSample {
                        gy,
                        gx,
                        value: median,
                    });
                }
                col += spacing;
            }
            row += spacing;
        }

        if tile_medians.len() < BACKGROUND_MIN_TILES {
            return Err(CalibError::InsufficientData(format!(
                "only {} of {} minimum background tiles survived range clipping",
                tile_medians.len(),
                BACKGROUND_MIN_TILES
            )));
        }

        let mut values: Vec<f64> = tile_medians.iter().map(|s| s.value).collect();
        let m = median_of(&mut values);
        let mut abs_dev: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
        let mad = median_of(&mut abs_dev);
        let band = BACKGROUND_MAD_REJECTION_FACTOR * mad;

        let samples: Vec<TileSample> = tile_medians
            .into_iter()
            .filter(|s| (s.value - m).abs() <= band)
            .collect();

        if samples.len() < BACKGROUND_MIN_TILES {
            return Err(CalibError::InsufficientData(format!(
                "only {} of {} minimum background tiles survived MAD rejection",
                samples.len(),
                BACKGROUND_MIN_TILES
            )));
        }

        let eval_grid = precompute_eval_grid(&samples, BACKGROUND_EVAL_STEPS);

        Ok(Self {
            samples,
            eval_grid,
            width: w,
            height: h,
        })
    }

    /// Evaluate the background at full-resolution pixel coordinates via
    /// bilinear lookup on the precomputed coarse grid.
    pub fn evaluate(&self, y: f64, x: f64) -> f32 {
        let gy = (y / self.height.max(1) as f64) * (self.eval_grid.dim().0 - 1) as f64;
        let gx = (x / self.width.max(1) as f64) * (self.eval_grid.dim().1 - 1) as f64;
        bilinear_sample(&self.eval_grid, gy, gx)
    }

    /// Materialize the model over the full image grid.
    pub fn to_full_resolution(&self) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((self.height, self.width));
        for row in 0..self.height {
            for col in 0..self.width {
                out[[row, col]] = self.evaluate(row as f64, col as f64);
            }
        }
        out
    }

    pub fn accepted_tile_count(&self) -> usize {
        self.samples.len()
    }
}

fn clipped_tile_median(
    channel: &Array2<f32>,
    r0: usize,
    r1: usize,
    c0: usize,
    c1: usize,
) -> Option<f64> {
    let mut values: Vec<f64> = Vec::with_capacity((r1 - r0) * (c1 - c0));
    for r in r0..r1 {
        for c in c0..c1 {
            let v = channel[[r, c]] as f64;
            if v > 0.0 && v >= BACKGROUND_CLIP_LOW && v <= BACKGROUND_CLIP_HIGH {
                values.push(v);
            }
        }
    }
    if values.is_empty() {
        return None;
    }
    Some(median_of(&mut values))
}

fn median_of(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        *values.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap()).1
    } else {
        let (lower, &mut upper, _) =
            values.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap());
        let lower_val = lower.iter().copied().fold(f64::MIN, f64::max);
        (lower_val + upper) / 2.0
    }
}

/// Shepard (inverse-distance-weighted) interpolation at a normalized
/// coordinate, using [`BACKGROUND_SHEPARD_RADIUS`] as the smoothing radius.
fn shepard_value(samples: &[TileSample], gy: f64, gx: f64) -> f64 {
    let radius = BACKGROUND_SHEPARD_RADIUS;
    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;

    for s in samples {
        let dy = gy - s.gy;
        let dx = gx - s.gx;
        let dist_sq = dy * dy + dx * dx;
        if dist_sq < 1e-12 {
            return s.value;
        }
        let weight = 1.0 / (dist_sq / (radius * radius) + dist_sq);
        weight_sum += weight;
        value_sum += weight * s.value;
    }

    if weight_sum > 0.0 {
        value_sum / weight_sum
    } else {
        0.0
    }
}

fn precompute_eval_grid(samples: &[TileSample], steps: usize) -> Array2<f32> {
    let steps = steps.max(2);
    let mut grid = Array2::<f32>::zeros((steps, steps));
    for i in 0..steps {
        let gy = i as f64 / (steps - 1) as f64;
        for j in 0..steps {
            let gx = j as f64 / (steps - 1) as f64;
            grid[[i, j]] = shepard_value(samples, gy, gx) as f32;
        }
    }
    grid
}

/// Bilinear sample of a 2-D grid at fractional coordinates, edge-clamped.
pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();
    let y0 = y.floor().clamp(0.0, (h - 1) as f64) as usize;
    let x0 = x.floor().clamp(0.0, (w - 1) as f64) as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let fy = (y - y0 as f64).clamp(0.0, 1.0) as f32;
    let fx = (x - x0 as f64).clamp(0.0, 1.0) as f32;

    let v00 = data[[y0, x0]];
    let v01 = data[[y0, x1]];
    let v10 = data[[y1, x0]];
    let v11 = data[[y1, x1]];

    let top = v00 * (1.0 - fx) + v01 * fx;
    let bottom = v10 * (1.0 - fx) + v11 * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Default tile spacing exposed for callers that don't need a custom value.
pub const DEFAULT_SPACING: usize = BACKGROUND_GRID_SPACING;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_channel_fits_a_flat_background() {
        let channel = Array2::<f32>::from_elem((200, 200), 0.3);
        let model = BackgroundModel::fit(&channel, 20).unwrap();
        let v = model.evaluate(100.0, 100.0);
        assert!((v - 0.3).abs() < 0.02, "got {v}");
    }

    #[test]
    fn too_small_image_is_insufficient_data() {
        let channel = Array2::<f32>::from_elem((10, 10), 0.3);
        let err = BackgroundModel::fit(&channel, 40).unwrap_err();
        assert!(matches!(err, CalibError::InsufficientData(_)));
    }
}
