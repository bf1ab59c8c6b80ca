use ndarray::Array2;

use crate::consts::{
    DARK_OPTIMIZE_MIN_PIXELS, DARK_OPTIMIZE_NO_CORRELATION_THRESHOLD, DARK_OPTIMIZE_WINDOW_DEFAULT,
    GOLDEN_RATIO, GOLDEN_SECTION_TOLERANCE, MAD_TO_SIGMA, PARABOLA_TINY,
};
use crate::multiscale::noise::k_sigma_noise;

/// Outcome of a per-channel dark-scale optimization.
#[derive(Clone, Copy, Debug)]
pub enum DarkScaleResult {
    /// Optimized scale factor for `target - k*dark`.
    Scale(f64),
    /// Fewer than [`DARK_OPTIMIZE_MIN_PIXELS`] dark pixels survived the
    /// optimization threshold; optimization was skipped for this channel.
    Disabled,
    /// The optimized scale fell below [`DARK_OPTIMIZE_NO_CORRELATION_THRESHOLD`].
    NoCorrelation,
}

/// Crop `target`/`dark` to a centred square window (side `window`) when the
/// window is set and smaller than the frame; otherwise return views
/// unchanged.
fn centred_window(data: &Array2<f32>, window: usize) -> Array2<f32> {
    let (h, w) = data.dim();
    if window == 0 || window >= h.min(w) {
        return data.clone();
    }
    let r0 = (h - window) / 2;
    let c0 = (w - window) / 2;
    data.slice(ndarray::s![r0..r0 + window, c0..c0 + window]).to_owned()
}

/// Exclude dark pixels below `median + lowSigma * 1.4826 * MAD`; if fewer
/// than [`DARK_OPTIMIZE_MIN_PIXELS`] pixels survive, optimization is
/// disabled for the channel.
fn optimization_mask(dark: &Array2<f32>, low_sigma: f64) -> Option<Vec<bool>> {
    let mut values: Vec<f64> = dark.iter().map(|&v| v as f64).collect();
    let n = values.len();
    if n == 0 {
        return None;
    }
    let median = median_of(&mut values);
    let mut abs_dev: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
    let mad = median_of(&mut abs_dev);
    let threshold = median + low_sigma * MAD_TO_SIGMA * mad;

    let mask: Vec<bool> = dark.iter().map(|&v| (v as f64) >= threshold).collect();
    let surviving = mask.iter().filter(|&&m| m).count();
    if surviving < DARK_OPTIMIZE_MIN_PIXELS {
        None
    } else {
        Some(mask)
    }
}

fn median_of(values: &mut [f64]) -> f64 {
    let n = values.len();
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

/// Noise objective for `target - k*dark`, masked to the surviving dark
/// pixels, evaluated via k-sigma on the first starlet detail layer.
fn objective(target: &Array2<f32>, dark: &Array2<f32>, mask: &[bool], k: f64) -> f64 {
    let residual = ndarray::Zip::from(target)
        .and(dark)
        .map_collect(|&t, &d| (t as f64 - k * d as f64) as f32);
    let masked = apply_mask(&residual, mask);
    k_sigma_noise(&masked).sigma
}

fn apply_mask(data: &Array2<f32>, mask: &[bool]) -> Array2<f32> {
    let mut out = data.clone();
    for (v, &m) in out.iter_mut().zip(mask.iter()) {
        if !m {
            *v = 0.0;
        }
    }
    out
}

/// Optimize the dark-scale factor `k >= 0` minimizing noise in
/// `target - k*dark`, using a golden-ratio bracket expansion followed by
/// golden-section search. Returns [`DarkScaleResult::Disabled`] when too few
/// dark pixels survive the optimization threshold.
pub fn optimize_dark_scale(
    target: &Array2<f32>,
    dark: &Array2<f32>,
    window: Option<usize>,
    low_sigma: f64,
) -> DarkScaleResult {
    let window = window.unwrap_or(DARK_OPTIMIZE_WINDOW_DEFAULT);
    let target_window = centred_window(target, window);
    let dark_window = centred_window(dark, window);

    let Some(mask) = optimization_mask(&dark_window, low_sigma) else {
        return DarkScaleResult::Disabled;
    };

    let f = |k: f64| objective(&target_window, &dark_window, &mask, k);

    let (a, b) = bracket(f, 0.5, 2.0);
    let k = golden_section_search(f, a.max(0.0), b.max(0.0));
    let k = k.max(0.0);

    if k.abs() < DARK_OPTIMIZE_NO_CORRELATION_THRESHOLD {
        DarkScaleResult::NoCorrelation
    } else {
        DarkScaleResult::Scale(k)
    }
}

/// Golden-ratio bracket expansion with parabolic-extrapolation refinement,
/// seeded at `(a, b)`, swapping so that `f(b) < f(a)` before expanding
/// toward `c = b + phi*(b - a)`.
fn bracket(f: impl Fn(f64) -> f64, mut a: f64, mut b: f64) -> (f64, f64) {
    let mut fa = f(a);
    let mut fb = f(b);
    if fa < fb {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = b + GOLDEN_RATIO * (b - a);
    let mut fc = f(c);

    for _ in 0..25 {
        if fc > fb {
            break;
        }

        let limit = b + 10.0 * (c - b);
        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let denom = 2.0 * (q - r);
        let u = if denom.abs() > PARABOLA_TINY {
            b - ((b - c) * q - (b - a) * r) / denom
        } else {
            c + GOLDEN_RATIO * (c - b)
        };
        let u = u.clamp(b.min(limit), b.max(limit));
        let fu = f(u);

        a = b;
        fa = fb;
        b = c;
        fb = fc;
        c = u;
        fc = fu;
    }

    if a < c {
        (a, c)
    } else {
        (c, a)
    }
}

/// Golden-section search on `[a, b]` until the bracket width converges below
/// [`GOLDEN_SECTION_TOLERANCE`].
fn golden_section_search(f: impl Fn(f64) -> f64, mut a: f64, mut b: f64) -> f64 {
    let resphi = 2.0 - GOLDEN_RATIO;
    let mut x1 = a + resphi * (b - a);
    let mut x2 = b - resphi * (b - a);
    let mut f1 = f(x1);
    let mut f2 = f(x2);

    for _ in 0..100 {
        if (b - a).abs() < GOLDEN_SECTION_TOLERANCE {
            break;
        }
        if f1 < f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = a + resphi * (b - a);
            f1 = f(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = b - resphi * (b - a);
            f2 = f(x2);
        }
    }

    if f1 < f2 {
        x1
    } else {
        x2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_correlated_dark_yields_scale_near_one() {
        let mut target = Array2::<f32>::zeros((64, 64));
        let mut dark = Array2::<f32>::zeros((64, 64));
        for ((r, c), v) in target.indexed_iter_mut() {
            let d = ((r * 7 + c * 13) % 50) as f32 / 50.0 + 0.1;
            dark[[r, c]] = d;
            *v = d;
        }
        match optimize_dark_scale(&target, &dark, Some(64), 1.0) {
            DarkScaleResult::Scale(k) => assert!((k - 1.0).abs() < 0.3, "k={k}"),
            other => panic!("expected Scale, got {other:?}"),
        }
    }

    #[test]
    fn constant_dark_disables_optimization() {
        let target = Array2::<f32>::from_elem((32, 32), 0.2);
        let dark = Array2::<f32>::from_elem((32, 32), 0.05);
        let result = optimize_dark_scale(&target, &dark, Some(32), 100.0);
        assert!(matches!(result, DarkScaleResult::Disabled));
    }
}
