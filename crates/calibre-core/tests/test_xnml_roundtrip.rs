use calibre_core::error::CalibError;
use calibre_core::image::Image;
use calibre_core::normalization::config::NormalizationConfig;
use calibre_core::normalization::engine::{build_normalization, NoOpReporter};
use calibre_core::xnml::{read_document, write_document, XnmlDocument};
use ndarray::Array2;
use ndarray::Array3;

fn sample_document() -> XnmlDocument {
    XnmlDocument {
        reference_image: "reference.xisf".to_string(),
        target_image: "target.xisf".to_string(),
        normalization_scale: 128,
        reference_width: 512,
        reference_height: 512,
        creation_time: "2026-08-01T12:00:00Z".to_string(),
        a: vec![Array2::from_elem((4, 4), 1.02), Array2::from_elem((4, 4), 0.98)],
        b: vec![Array2::from_elem((4, 4), -0.01), Array2::from_elem((4, 4), 0.02)],
    }
}

#[test]
fn compressed_document_round_trips_through_a_file() {
    let doc = sample_document();
    let bytes = write_document(&doc, true).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solution.xnml");
    std::fs::write(&path, &bytes).unwrap();

    let read_back = std::fs::read(&path).unwrap();
    let parsed = read_document(&read_back).unwrap();

    assert_eq!(parsed.reference_image, doc.reference_image);
    assert_eq!(parsed.target_image, doc.target_image);
    assert_eq!(parsed.normalization_scale, doc.normalization_scale);
    assert_eq!(parsed.channel_count(), doc.channel_count());
    for (got, want) in parsed.a.iter().zip(doc.a.iter()) {
        assert_eq!(got, want);
    }
    for (got, want) in parsed.b.iter().zip(doc.b.iter()) {
        assert_eq!(got, want);
    }
}

#[test]
fn uncompressed_document_round_trips_identically() {
    let doc = sample_document();
    let bytes = write_document(&doc, false).unwrap();
    let parsed = read_document(&bytes).unwrap();
    assert_eq!(parsed.a, doc.a);
    assert_eq!(parsed.b, doc.b);
}

#[test]
fn corrupted_payload_is_rejected_on_read() {
    let doc = sample_document();
    let mut bytes = write_document(&doc, true).unwrap();
    let flip_at = bytes.len() - 10;
    bytes[flip_at] ^= 0xFF;
    let err = read_document(&bytes).unwrap_err();
    assert!(matches!(err, CalibError::Xnml(_)));
}

#[test]
fn a_solved_normalization_survives_a_full_write_read_cycle() {
    let mut reference_data = Array3::<f32>::zeros((1, 256, 256));
    let mut target_data = Array3::<f32>::zeros((1, 256, 256));
    for row in 0..256 {
        for col in 0..256 {
            let v = 0.2 + row as f32 / 256.0 + col as f32 / 512.0;
            reference_data[[0, row, col]] = v;
            target_data[[0, row, col]] = v;
        }
    }
    let reference = Image::new(reference_data).unwrap();
    let target = Image::new(target_data).unwrap();

    let config = NormalizationConfig {
        scale: 32,
        ..Default::default()
    };
    let solution = build_normalization(&reference, &target, &config, &NoOpReporter).unwrap();

    let doc = XnmlDocument::from_solution(&solution, "ref.tif", "tgt.tif", "2026-08-01T00:00:00Z");
    let bytes = write_document(&doc, true).unwrap();
    let parsed = read_document(&bytes).unwrap();

    assert_eq!(parsed.normalization_scale, 32);
    assert_eq!(parsed.a[0].dim(), solution.a[0].dim());
}
