use ndarray::Array2;

use crate::normalization::filters::dilate_3x3;

/// Classify and dilate outlier masks for a reference/target channel pair
/// against their background estimates.
///
/// A pixel is a reference outlier when `|t - bt|/bt < background_limit` and
/// `|r - br|/br > reference_threshold`; a target outlier is the symmetric
/// condition with the threshold roles swapped.
pub fn classify_outliers(
    reference: &Array2<f32>,
    target: &Array2<f32>,
    ref_background: &Array2<f32>,
    target_background: &Array2<f32>,
    background_limit: f64,
    reference_threshold: f64,
    target_threshold: f64,
) -> (Array2<bool>, Array2<bool>) {
    let (h, w) = reference.dim();
    let mut ref_outliers = Array2::<bool>::from_elem((h, w), false);
    let mut target_outliers = Array2::<bool>::from_elem((h, w), false);

    for row in 0..h {
        for col in 0..w {
            let r = reference[[row, col]] as f64;
            let t = target[[row, col]] as f64;
            let br = ref_background[[row, col]] as f64;
            let bt = target_background[[row, col]] as f64;

            if bt.abs() > 1e-12 {
                let target_rel = ((t - bt) / bt).abs();
                let reference_rel = if br.abs() > 1e-12 { ((r - br) / br).abs() } else { 0.0 };
                if target_rel < background_limit && reference_rel > reference_threshold {
                    ref_outliers[[row, col]] = true;
                }
            }

            if br.abs() > 1e-12 {
                let reference_rel = ((r - br) / br).abs();
                let target_rel = if bt.abs() > 1e-12 { ((t - bt) / bt).abs() } else { 0.0 };
                if reference_rel < background_limit && target_rel > target_threshold {
                    target_outliers[[row, col]] = true;
                }
            }
        }
    }

    (dilate_3x3(&ref_outliers), dilate_3x3(&target_outliers))
}

/// Zero out every position flagged in either mask, in place.
pub fn apply_rejection(reference: &mut Array2<f32>, target: &mut Array2<f32>, ref_mask: &Array2<bool>, target_mask: &Array2<bool>) {
    for ((r, t), (&rm, &tm)) in reference
        .iter_mut()
        .zip(target.iter_mut())
        .zip(ref_mask.iter().zip(target_mask.iter()))
    {
        if rm || tm {
            *r = 0.0;
            *t = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_backgrounds_yield_no_outliers() {
        let reference = Array2::<f32>::from_elem((8, 8), 0.4);
        let target = Array2::<f32>::from_elem((8, 8), 0.4);
        let (ref_outliers, target_outliers) =
            classify_outliers(&reference, &target, &reference, &target, 0.05, 0.5, 0.5);
        assert!(ref_outliers.iter().all(|&v| !v));
        assert!(target_outliers.iter().all(|&v| !v));
    }
}
