use calibre_core::batch::config::{BatchConfig, OutputNaming};
use calibre_core::batch::{run_calibration_batch, CancellationToken, Target};
use calibre_core::calibration::CalibrationInputs;
use calibre_core::image::Image;
use calibre_core::io::image_io::{save_image, FileImageIo};
use calibre_core::xnml::{read_document, write_document, XnmlDocument};
use ndarray::Array2;
use ndarray::Array3;

fn mono(value: f32, h: usize, w: usize) -> Image {
    Image::new(Array3::from_elem((1, h, w), value)).unwrap()
}

#[test]
fn a_light_frame_on_disk_is_calibrated_and_written_back_out() {
    let dir = tempfile::tempdir().unwrap();

    let bias_path = dir.path().join("bias.tif");
    let target_path = dir.path().join("light.tif");

    let io = FileImageIo::default();
    save_image(&mono(0.05, 32, 32), &bias_path, io.output_format.clone()).unwrap();
    save_image(&mono(0.35, 32, 32), &target_path, io.output_format.clone()).unwrap();

    let bias = calibre_core::io::load_image(&bias_path).unwrap();

    let config = BatchConfig {
        output: OutputNaming {
            out_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        },
        ..Default::default()
    };

    let targets = vec![Target {
        path: target_path.clone(),
        inputs: CalibrationInputs {
            bias: Some(bias),
            dark_scale: vec![None],
            flat_scale: vec![1.0],
            ..Default::default()
        },
    }];

    let cancellation = CancellationToken::new();
    let summary = run_calibration_batch(targets, &config, &io, &io, &cancellation);

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 0);

    let output_path = dir.path().join("light_c.tif");
    assert!(output_path.exists());
    let output = calibre_core::io::load_image(&output_path).unwrap();
    for v in output.channel(0).iter() {
        assert!((v - 0.3).abs() < 1e-3, "got {v}");
    }
}

#[test]
fn an_unreadable_target_is_reported_as_a_failed_outcome_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.tif");

    let io = FileImageIo::default();
    let config = BatchConfig::default();
    let targets = vec![Target {
        path: missing,
        inputs: CalibrationInputs {
            dark_scale: vec![None],
            flat_scale: vec![1.0],
            ..Default::default()
        },
    }];
    let cancellation = CancellationToken::new();
    let summary = run_calibration_batch(targets, &config, &io, &io, &cancellation);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.succeeded(), 0);
}

#[test]
fn normalization_solution_document_writes_and_reads_back_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solution.xnml");

    let doc = XnmlDocument {
        reference_image: "ref.tif".to_string(),
        target_image: "tgt.tif".to_string(),
        normalization_scale: 64,
        reference_width: 256,
        reference_height: 256,
        creation_time: "2026-08-01T00:00:00Z".to_string(),
        a: vec![Array2::from_elem((8, 8), 1.0)],
        b: vec![Array2::from_elem((8, 8), 0.0)],
    };
    std::fs::write(&path, write_document(&doc, true).unwrap()).unwrap();

    let parsed = read_document(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(parsed.reference_width, 256);
    assert_eq!(parsed.channel_count(), 1);
}
