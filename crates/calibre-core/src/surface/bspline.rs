use ndarray::Array2;

/// A bicubic B-spline surface over a small coefficient grid, evaluated at
/// fractional coordinates with clamped (edge-replicated) boundary handling.
/// Used to interpolate the A and B normalization matrices up to full image
/// resolution.
#[derive(Clone, Debug)]
pub struct BicubicBSplineSurface {
    coefficients: Array2<f32>,
}

impl BicubicBSplineSurface {
    pub fn new(coefficients: Array2<f32>) -> Self {
        Self { coefficients }
    }

    pub fn grid_height(&self) -> usize {
        self.coefficients.dim().0
    }

    pub fn grid_width(&self) -> usize {
        self.coefficients.dim().1
    }

    /// Evaluate the surface at fractional grid coordinates `(y, x)`.
    pub fn evaluate(&self, y: f64, x: f64) -> f32 {
        let (h, w) = self.coefficients.dim();
        if h == 1 && w == 1 {
            return self.coefficients[[0, 0]];
        }

        let y0 = y.floor() as isize;
        let x0 = x.floor() as isize;
        let fy = (y - y0 as f64) as f32;
        let fx = (x - x0 as f64) as f32;

        let wy = cubic_weights(fy);
        let wx = cubic_weights(fx);

        let mut acc = 0.0f32;
        for (dy, &wyv) in wy.iter().enumerate() {
            let sy = clamp_index(y0 + dy as isize - 1, h);
            for (dx, &wxv) in wx.iter().enumerate() {
                let sx = clamp_index(x0 + dx as isize - 1, w);
                acc += wyv * wxv * self.coefficients[[sy, sx]];
            }
        }
        acc
    }

    /// Evaluate the surface over a full `height`x`width` pixel grid, mapping
    /// pixel coordinates linearly onto the coefficient grid's index space.
    pub fn evaluate_full(&self, height: usize, width: usize) -> Array2<f32> {
        let (gh, gw) = self.coefficients.dim();
        let mut out = Array2::<f32>::zeros((height, width));
        for row in 0..height {
            let gy = if height > 1 {
                row as f64 * (gh - 1) as f64 / (height - 1) as f64
            } else {
                0.0
            };
            for col in 0..width {
                let gx = if width > 1 {
                    col as f64 * (gw - 1) as f64 / (width - 1) as f64
                } else {
                    0.0
                };
                out[[row, col]] = self.evaluate(gy, gx);
            }
        }
        out
    }
}

fn clamp_index(idx: isize, size: usize) -> usize {
    idx.clamp(0, size as isize - 1) as usize
}

/// Catmull-Rom-style 4-tap cubic convolution weights for fractional offset
/// `t` in `[0, 1)`, ordered for taps at relative positions `-1, 0, 1, 2`.
fn cubic_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_grid_evaluates_to_constant() {
        let grid = Array2::<f32>::from_elem((5, 5), 0.75);
        let surface = BicubicBSplineSurface::new(grid);
        for &(y, x) in &[(0.0, 0.0), (2.3, 1.7), (4.0, 4.0)] {
            let v = surface.evaluate(y, x);
            assert!((v - 0.75).abs() < 1e-4, "got {v} at ({y},{x})");
        }
    }

    #[test]
    fn evaluate_full_preserves_corner_coefficients_on_a_gradient() {
        let mut grid = Array2::<f32>::zeros((4, 4));
        for ((r, c), v) in grid.indexed_iter_mut() {
            *v = (r + c) as f32;
        }
        let surface = BicubicBSplineSurface::new(grid);
        let full = surface.evaluate_full(64, 64);
        assert!(full[[0, 0]].abs() < 0.5);
        assert!((full[[63, 63]] - 6.0).abs() < 0.5);
    }
}
