use ndarray::Array2;

/// Decompose a channel with the multiscale median transform: layer `j` uses a
/// `(2^(j+1)+1)`-radius median filter in place of the starlet's convolution,
/// clamped so the window never exceeds the image's shorter side.
/// Mirrors [`crate::multiscale::starlet::decompose`]'s detail/residual shape.
pub fn decompose(channel: &Array2<f32>, num_layers: usize) -> (Vec<Array2<f32>>, Array2<f32>) {
    decompose_from(channel, 0, num_layers)
}

/// As [`decompose`], but layer `j`'s radius is `(2^(start_layer+j+1)+1)`:
/// skips the first `start_layer` dyadic scales so the transform can be
/// anchored at a caller-chosen base scale instead of always starting at
/// radius 3.
pub fn decompose_from(
    channel: &Array2<f32>,
    start_layer: usize,
    num_layers: usize,
) -> (Vec<Array2<f32>>, Array2<f32>) {
    let mut layers = Vec::with_capacity(num_layers);
    let mut current = channel.clone();
    let (h, w) = channel.dim();
    let max_radius = h.min(w) / 2;

    for j in 0..num_layers {
        let radius = ((1usize << (start_layer + j + 1)) + 1).min(max_radius.max(1));
        let smoothed = median_filter(&current, radius);
        let detail = &current - &smoothed;
        layers.push(detail);
        current = smoothed;
    }

    (layers, current)
}

/// Reconstruct from MMT layers and residual, honouring per-layer enable flags.
pub fn reconstruct(layers: &[Array2<f32>], residual: &Array2<f32>, layer_enabled: &[bool]) -> Array2<f32> {
    let mut result = residual.clone();
    for (i, layer) in layers.iter().enumerate() {
        if layer_enabled.get(i).copied().unwrap_or(true) {
            result += layer;
        }
    }
    result
}

/// Sliding-window median filter with a square window of side `2*radius + 1`
/// and edge-clamped boundary handling.
fn median_filter(data: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));
    let mut scratch = Vec::with_capacity((2 * radius + 1) * (2 * radius + 1));

    for row in 0..h {
        for col in 0..w {
            scratch.clear();
            let r0 = row.saturating_sub(radius);
            let r1 = (row + radius).min(h - 1);
            let c0 = col.saturating_sub(radius);
            let c1 = (col + radius).min(w - 1);
            for r in r0..=r1 {
                for c in c0..=c1 {
                    scratch.push(data[[r, c]]);
                }
            }
            let mid = scratch.len() / 2;
            result[[row, col]] = if scratch.len() % 2 == 1 {
                *scratch
                    .select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap())
                    .1
            } else {
                let (lower, &mut upper, _) =
                    scratch.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap());
                let lower_val = lower
                    .iter()
                    .copied()
                    .max_by(|a, b| a.partial_cmp(b).unwrap())
                    .unwrap();
                (lower_val + upper) / 2.0
            };
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_reconstruct_round_trips_on_constant_channel() {
        let channel = Array2::<f32>::from_elem((20, 20), 0.25);
        let (layers, residual) = decompose(&channel, 3);
        let enabled = vec![true; layers.len()];
        let recon = reconstruct(&layers, &residual, &enabled);
        for v in recon.iter() {
            assert!((v - 0.25).abs() < 1e-6, "got {v}");
        }
    }

    #[test]
    fn median_filter_removes_salt_pepper_impulses() {
        let mut channel = Array2::<f32>::from_elem((15, 15), 0.5);
        channel[[7, 7]] = 10.0;
        let filtered = median_filter(&channel, 2);
        assert!((filtered[[7, 7]] - 0.5).abs() < 1e-6);
    }
}
