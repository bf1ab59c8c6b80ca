use crate::consts::{OVERSCAN_CLIP_HIGH, OVERSCAN_CLIP_LOW};
use crate::image::{Image, Rectangle};

/// A single overscan region: `source` is sampled for a per-channel
/// range-clipped median, which is subtracted from every pixel of `target`.
/// Disabled regions are skipped entirely; regions sharing an identical
/// `target` rect are grouped into one correction (see [`apply_overscan`]).
#[derive(Clone, Debug)]
pub struct OverscanRegion {
    pub enabled: bool,
    pub source: Rectangle,
    pub target: Rectangle,
}

/// Apply overscan subtraction for every configured region, then crop to
/// `image_rect`. Regions with an identical `target` rect are grouped so
/// their source pixels are pooled into a single per-channel clipped median,
/// subtracted once from the shared target — overlapping regions would
/// otherwise double-subtract. Disabled regions do not participate.
pub fn apply_overscan(image: &Image, regions: &[OverscanRegion], image_rect: &Rectangle) -> Image {
    let mut data = image.data().clone();

    for group in group_by_target(regions) {
        for c in 0..image.channels() {
            let channel = image.channel(c);
            let mut pooled: Vec<f32> = Vec::new();
            for region in &group.sources {
                let source_view = channel.slice(ndarray::s![
                    region.y0 as usize..region.y1 as usize,
                    region.x0 as usize..region.x1 as usize
                ]);
                pooled.extend(source_view.iter().copied());
            }
            let median = clipped_median_slice(&pooled);

            let mut target_slice = data.index_axis_mut(ndarray::Axis(0), c);
            let mut target_view = target_slice.slice_mut(ndarray::s![
                group.target.y0 as usize..group.target.y1 as usize,
                group.target.x0 as usize..group.target.x1 as usize
            ]);
            target_view.mapv_inplace(|v| v - median);
        }
    }

    let mut result = Image::new(data).expect("overscan preserves geometry");
    result.set_cfa(image.cfa());
    result.metadata = image.metadata.clone();
    result
        .crop(image_rect)
        .expect("image_rect is validated by the caller against target geometry")
}

struct TargetGroup {
    target: Rectangle,
    sources: Vec<Rectangle>,
}

/// Group enabled regions by identical `target` rect, preserving first-seen order.
fn group_by_target(regions: &[OverscanRegion]) -> Vec<TargetGroup> {
    let mut groups: Vec<TargetGroup> = Vec::new();
    for region in regions.iter().filter(|r| r.enabled) {
        match groups.iter_mut().find(|g| g.target == region.target) {
            Some(group) => group.sources.push(region.source),
            None => groups.push(TargetGroup {
                target: region.target,
                sources: vec![region.source],
            }),
        }
    }
    groups
}

fn clipped_median_slice(pixels: &[f32]) -> f32 {
    let mut values: Vec<f32> = pixels
        .iter()
        .copied()
        .filter(|&v| {
            let v = v as f64;
            v >= OVERSCAN_CLIP_LOW && v <= OVERSCAN_CLIP_HIGH
        })
        .collect();

    if values.is_empty() {
        return 0.0;
    }

    let n = values.len();
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn overscan_subtracts_clipped_median_from_target() {
        let mut data = Array3::<f32>::from_elem((1, 10, 10), 0.5);
        for col in 8..10 {
            for row in 0..10 {
                data[[0, row, col]] = 0.1;
            }
        }
        let image = Image::new(data).unwrap();
        let regions = vec![OverscanRegion {
            enabled: true,
            source: Rectangle::new(8, 0, 10, 10).unwrap(),
            target: Rectangle::new(0, 0, 8, 10).unwrap(),
        }];
        let image_rect = Rectangle::new(0, 0, 8, 10).unwrap();
        let result = apply_overscan(&image, &regions, &image_rect);
        assert_eq!(result.width(), 8);
        for v in result.channel(0).iter() {
            assert!((v - 0.4).abs() < 1e-5, "got {v}");
        }
    }

    #[test]
    fn disabled_region_does_not_participate() {
        let mut data = Array3::<f32>::from_elem((1, 10, 10), 0.5);
        for col in 8..10 {
            for row in 0..10 {
                data[[0, row, col]] = 0.1;
            }
        }
        let image = Image::new(data).unwrap();
        let regions = vec![OverscanRegion {
            enabled: false,
            source: Rectangle::new(8, 0, 10, 10).unwrap(),
            target: Rectangle::new(0, 0, 8, 10).unwrap(),
        }];
        let image_rect = Rectangle::new(0, 0, 8, 10).unwrap();
        let result = apply_overscan(&image, &regions, &image_rect);
        for v in result.channel(0).iter() {
            assert!((v - 0.5).abs() < 1e-5, "got {v}");
        }
    }

    #[test]
    fn regions_sharing_a_target_pool_their_source_pixels() {
        // Two disjoint source patches at 0.2 and 0.4 feed the same target; the
        // pooled clipped median should reflect both, not either alone.
        let mut data = Array3::<f32>::from_elem((1, 12, 12), 1.0);
        for row in 0..6 {
            for col in 8..12 {
                data[[0, row, col]] = 0.2;
            }
        }
        for row in 6..12 {
            for col in 8..12 {
                data[[0, row, col]] = 0.4;
            }
        }
        let image = Image::new(data).unwrap();
        let target = Rectangle::new(0, 0, 8, 12).unwrap();
        let regions = vec![
            OverscanRegion {
                enabled: true,
                source: Rectangle::new(8, 0, 12, 6).unwrap(),
                target,
            },
            OverscanRegion {
                enabled: true,
                source: Rectangle::new(8, 6, 12, 12).unwrap(),
                target,
            },
        ];
        let image_rect = Rectangle::new(0, 0, 8, 12).unwrap();
        let result = apply_overscan(&image, &regions, &image_rect);
        // pooled values are an even split of 0.2s and 0.4s; clipped median
        // of the pooled set sits between the two, at the midpoint.
        for v in result.channel(0).iter() {
            assert!((v - 0.7).abs() < 1e-5, "got {v}");
        }
    }
}
