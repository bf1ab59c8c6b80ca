use ndarray::Array2;

use crate::consts::B3_KERNEL;
use crate::image::Image;

/// Decompose a single channel into `num_layers` detail layers plus a residual.
///
/// Returns `(detail_layers, residual)` such that `channel == sum(detail_layers)
/// + residual`. Uses separable B3-spline convolution with hole-insertion
/// (à trous): dilation at layer `scale` is `1 << scale`.
pub fn decompose(channel: &Array2<f32>, num_layers: usize) -> (Vec<Array2<f32>>, Array2<f32>) {
    let mut layers = Vec::with_capacity(num_layers);
    let mut current = channel.clone();

    for scale in 0..num_layers {
        let smoothed = atrous_convolve(&current, scale);
        let detail = &current - &smoothed;
        layers.push(detail);
        current = smoothed;
    }

    (layers, current)
}

/// Reconstruct a channel from detail layers and a residual. A `None` entry in
/// `layer_enabled` (or a shorter slice than `layers`) is treated as enabled;
/// disabled layers are dropped from the sum entirely — used by the superbias
/// generator to keep only the residual (large-scale) component.
pub fn reconstruct(layers: &[Array2<f32>], residual: &Array2<f32>, layer_enabled: &[bool]) -> Array2<f32> {
    let mut result = residual.clone();
    for (i, layer) in layers.iter().enumerate() {
        if layer_enabled.get(i).copied().unwrap_or(true) {
            result += layer;
        }
    }
    result
}

/// Decompose every channel of `image` independently, returning one
/// `(layers, residual)` pair per channel in channel order.
pub fn decompose_image(image: &Image, num_layers: usize) -> Vec<(Vec<Array2<f32>>, Array2<f32>)> {
    image
        .channels_iter()
        .map(|ch| decompose(&ch.to_owned(), num_layers))
        .collect()
}

fn atrous_convolve(data: &Array2<f32>, scale: usize) -> Array2<f32> {
    let step = 1usize << scale;
    let row_convolved = convolve_rows(data, &B3_KERNEL, step);
    convolve_cols(&row_convolved, &B3_KERNEL, step)
}

fn convolve_rows(data: &Array2<f32>, kernel: &[f32; 5], step: usize) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));
    let half = 2;

    for row in 0..h {
        for col in 0..w {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let offset = (ki as isize - half) * step as isize;
                let src_col = mirror_index(col as isize + offset, w);
                sum += data[[row, src_col]] * kv;
            }
            result[[row, col]] = sum;
        }
    }

    result
}

fn convolve_cols(data: &Array2<f32>, kernel: &[f32; 5], step: usize) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));
    let half = 2;

    for row in 0..h {
        for col in 0..w {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let offset = (ki as isize - half) * step as isize;
                let src_row = mirror_index(row as isize + offset, h);
                sum += data[[src_row, col]] * kv;
            }
            result[[row, col]] = sum;
        }
    }

    result
}

/// Mirror boundary handling: reflect index into `[0, size)`.
pub fn mirror_index(idx: isize, size: usize) -> usize {
    if size <= 1 {
        return 0;
    }
    let period = 2 * size;
    let abs_idx = idx.unsigned_abs();
    let m = abs_idx % period;

    if m < size {
        m
    } else {
        2 * size - 1 - m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_reconstruct_round_trips_on_constant_channel() {
        let channel = Array2::<f32>::from_elem((32, 32), 0.5);
        let (layers, residual) = decompose(&channel, 4);
        let enabled = vec![true; layers.len()];
        let recon = reconstruct(&layers, &residual, &enabled);
        for v in recon.iter() {
            assert!((v - 0.5).abs() < 1e-5, "got {v}");
        }
    }

    #[test]
    fn disabling_all_detail_layers_keeps_only_large_scale_structure() {
        let mut channel = Array2::<f32>::zeros((16, 16));
        channel[[8, 8]] = 1.0;
        let (layers, residual) = decompose(&channel, 3);
        let disabled = vec![false; layers.len()];
        let recon = reconstruct(&layers, &residual, &disabled);
        assert_eq!(recon, residual);
    }

    #[test]
    fn mirror_index_reflects_at_both_boundaries() {
        assert_eq!(mirror_index(-1, 10), 1);
        assert_eq!(mirror_index(0, 10), 0);
        assert_eq!(mirror_index(10, 10), 9);
    }
}
