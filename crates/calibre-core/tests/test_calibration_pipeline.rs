use calibre_core::calibration::pedestal::PedestalSource;
use calibre_core::calibration::{calibrate, CalibrationInputs};
use calibre_core::error::CalibError;
use calibre_core::image::Image;
use ndarray::Array3;

fn mono(value: f32, h: usize, w: usize) -> Image {
    Image::new(Array3::from_elem((1, h, w), value)).unwrap()
}

#[test]
fn full_bias_dark_flat_pipeline_recovers_the_true_signal() {
    let true_signal = 0.3f32;
    let bias_level = 0.02f32;
    let dark_level = 0.01f32;
    let flat_gain = 1.1f32;

    let bias = mono(bias_level, 32, 32);
    let dark = mono(dark_level, 32, 32);
    let flat = mono(flat_gain, 32, 32);
    let target = mono(true_signal + bias_level + dark_level, 32, 32);

    let inputs = CalibrationInputs {
        bias: Some(bias),
        dark: Some(dark),
        dark_scale: vec![Some(1.0)],
        flat: Some(flat),
        flat_scale: vec![1.0],
        ..Default::default()
    };

    let report = calibrate(&target, &inputs).unwrap();
    for v in report.image.channel(0).iter() {
        assert!((v - true_signal).abs() < 1e-4, "got {v}");
    }
    assert_eq!(report.channels.len(), 1);
    assert!(report.channels[0].noise.sigma < 1e-3);
}

#[test]
fn literal_pedestal_is_subtracted_before_calibration_and_restored_after() {
    let target = mono(0.5, 32, 32);
    let inputs = CalibrationInputs {
        dark_scale: vec![None],
        flat_scale: vec![1.0],
        pedestal: PedestalSource::Literal(3277), // 0.05 in normalized units
        output_pedestal_normalized: 0.05,
        ..Default::default()
    };

    let report = calibrate(&target, &inputs).unwrap();
    for v in report.image.channel(0).iter() {
        assert!((v - 0.5).abs() < 1e-4, "pedestal should round-trip, got {v}");
    }
}

#[test]
fn hot_pixel_in_the_target_survives_plain_calibration_but_is_truncated_at_one() {
    let mut target = mono(0.5, 16, 16);
    target.channel_mut(0)[[8, 8]] = 10.0;

    let inputs = CalibrationInputs {
        dark_scale: vec![None],
        flat_scale: vec![1.0],
        ..Default::default()
    };

    let report = calibrate(&target, &inputs).unwrap();
    assert!((report.image.channel(0)[[8, 8]] - 1.0).abs() < 1e-6);
}

#[test]
fn near_zero_flat_mean_is_a_numerical_instability_error() {
    let target = mono(0.5, 16, 16);
    let flat = mono(1e-10, 16, 16);
    let inputs = CalibrationInputs {
        flat: Some(flat),
        dark_scale: vec![None],
        flat_scale: vec![1.0],
        ..Default::default()
    };
    let err = calibrate(&target, &inputs).unwrap_err();
    assert!(matches!(err, CalibError::NumericalInstability(_)));
}
