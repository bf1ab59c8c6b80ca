use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Separable Gaussian convolution of radius `radius` pixels (sigma = radius/3,
/// clamped to a minimum of 0.5 to avoid a degenerate single-tap kernel).
/// A radius of 0 is a no-op.
pub fn gaussian_blur(data: &Array2<f32>, radius: u32) -> Array2<f32> {
    if radius == 0 {
        return data.clone();
    }
    let sigma = (radius as f32 / 3.0).max(0.5);
    let kernel = make_gaussian_kernel(sigma);
    let row_pass = convolve_rows(data, &kernel);
    convolve_cols(&row_pass, &kernel)
}

/// Hot-pixel removal: a 3x3 box median when `radius == 1`, a circular
/// structuring-element median for `radius > 1`, and a no-op for `radius == 0`.
pub fn hot_pixel_median(data: &Array2<f32>, radius: u32) -> Array2<f32> {
    if radius == 0 {
        return data.clone();
    }
    let radius = radius as isize;
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));
    let mut scratch = Vec::new();

    for row in 0..h {
        for col in 0..w {
            scratch.clear();
            for dr in -radius..=radius {
                for dc in -radius..=radius {
                    if radius > 1 && dr * dr + dc * dc > radius * radius {
                        continue;
                    }
                    let r = (row as isize + dr).clamp(0, h as isize - 1) as usize;
                    let c = (col as isize + dc).clamp(0, w as isize - 1) as usize;
                    scratch.push(data[[r, c]]);
                }
            }
            result[[row, col]] = median_of(&mut scratch);
        }
    }
    result
}

/// 3x3 box median, used to smooth the A matrix before downsampling.
pub fn median_3x3(data: &Array2<f32>) -> Array2<f32> {
    hot_pixel_median(data, 1)
}

/// Dilate a boolean mask by a 3x3 box structuring element.
pub fn dilate_3x3(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    let mut out = Array2::<bool>::from_elem((h, w), false);
    for row in 0..h {
        for col in 0..w {
            let mut any = false;
            for dr in -1isize..=1 {
                for dc in -1isize..=1 {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r >= 0 && c >= 0 && (r as usize) < h && (c as usize) < w && mask[[r as usize, c as usize]] {
                        any = true;
                    }
                }
            }
            out[[row, col]] = any;
        }
    }
    out
}

fn median_of(values: &mut [f32]) -> f32 {
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
        let lower_val = lower.iter().copied().fold(f32::MIN, f32::max);
        (lower_val + upper) / 2.0
    }
}

fn make_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f32; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        *k = (-x * x / s2).exp();
        sum += *k;
    }
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

fn convolve_rows(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    let compute = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_col =
                        (col as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                    sum += data[[row, src_col]] * kv;
                }
                sum
            })
            .collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<f32>> = (0..h).into_par_iter().map(compute).collect();
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, val) in row_data.into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
    } else {
        for row in 0..h {
            for (col, val) in compute(row).into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
    }
    result
}

fn convolve_cols(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    let compute = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_row =
                        (row as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                    sum += data[[src_row, col]] * kv;
                }
                sum
            })
            .collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<f32>> = (0..h).into_par_iter().map(compute).collect();
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, val) in row_data.into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
    } else {
        for row in 0..h {
            for (col, val) in compute(row).into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_radius_hot_pixel_filter_is_identity() {
        let data = Array2::<f32>::from_elem((8, 8), 0.3);
        assert_eq!(hot_pixel_median(&data, 0), data);
    }

    #[test]
    fn hot_pixel_median_removes_an_impulse() {
        let mut data = Array2::<f32>::from_elem((9, 9), 0.2);
        data[[4, 4]] = 5.0;
        let filtered = hot_pixel_median(&data, 2);
        assert!((filtered[[4, 4]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn gaussian_blur_preserves_constant_fields() {
        let data = Array2::<f32>::from_elem((16, 16), 0.6);
        let blurred = gaussian_blur(&data, 3);
        for v in blurred.iter() {
            assert!((v - 0.6).abs() < 1e-4);
        }
    }
}
