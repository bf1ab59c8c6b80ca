use calibre_core::error::CalibError;
use calibre_core::image::Image;
use calibre_core::normalization::config::NormalizationConfig;
use calibre_core::normalization::engine::{build_normalization, NoOpReporter};
use ndarray::Array3;

fn gradient_image(h: usize, w: usize, scale: f32) -> Image {
    let mut data = Array3::<f32>::zeros((1, h, w));
    for row in 0..h {
        for col in 0..w {
            data[[0, row, col]] = scale * (0.2 + row as f32 / h as f32 + col as f32 / (2.0 * w as f32));
        }
    }
    Image::new(data).unwrap()
}

#[test]
fn images_smaller_than_the_scale_floor_are_rejected() {
    let reference = Image::new(Array3::<f32>::from_elem((1, 64, 64), 0.3)).unwrap();
    let target = Image::new(Array3::<f32>::from_elem((1, 64, 64), 0.3)).unwrap();
    let config = NormalizationConfig::default();
    let err = build_normalization(&reference, &target, &config, &NoOpReporter).unwrap_err();
    assert!(matches!(err, CalibError::InsufficientData(_)));
}

#[test]
fn fixed_scale_configuration_pins_every_a_sample_to_one() {
    let reference = gradient_image(256, 256, 1.0);
    let target = gradient_image(256, 256, 0.5);
    let mut config = NormalizationConfig::default();
    config.scale = 32;
    config.no_scale = true;

    let solution = build_normalization(&reference, &target, &config, &NoOpReporter).unwrap();
    assert_eq!(solution.scale, 32);
    for v in solution.a[0].iter() {
        assert!((v - 1.0).abs() < 1e-4, "got {v}");
    }
}

#[test]
fn solved_surfaces_are_finite_and_shaped_from_the_normalization_scale() {
    let reference = gradient_image(256, 256, 1.0);
    let target = gradient_image(256, 256, 0.5);
    let config = NormalizationConfig::default();

    let solution = build_normalization(&reference, &target, &config, &NoOpReporter).unwrap();

    let expected_side = ((256.0 * 2.0 / config.effective_scale() as f64).round() as usize).max(1);
    assert_eq!(solution.a[0].dim(), (expected_side, expected_side));
    assert_eq!(solution.b[0].dim(), (expected_side, expected_side));

    for v in solution.a[0].iter().chain(solution.b[0].iter()) {
        assert!(v.is_finite());
    }

    let (a, b) = solution.sample_surface(0, 128.0, 128.0);
    assert!(a.is_finite() && b.is_finite());
}
