//! End-to-end scenarios over synthetic series, exercising the public API
//! the way a caller with pre-extracted slice records would.

use dental_volume::{PipelineConfig, SegmentationMode, Series, SliceRecord, Volume};
use dental_volume::{metrics, pipeline, resample, segment, series};
use ndarray::{Array2, Array3, s};

fn init_logging() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init();
}

fn slice(location: f32, pixels: Array2<f32>) -> SliceRecord {
    SliceRecord {
        series_uid: "1.2.3.4".to_string(),
        slice_location: Some(location),
        pixel_spacing: Some([1.0, 1.0]),
        slice_thickness: Some(2.0),
        pixels,
        ..Default::default()
    }
}

#[test]
fn three_slice_series_reconstructs_with_expected_geometry() {
    // Slices handed over out of order; the assembler must order them by
    // slice location before stacking.
    let records = vec![
        slice(4.0, Array2::from_elem((4, 4), 2.0)),
        slice(0.0, Array2::from_elem((4, 4), 0.0)),
        slice(2.0, Array2::from_elem((4, 4), 1.0)),
    ];

    let assembled = series::assemble(records);
    assert_eq!(assembled.len(), 1);

    let volume = Volume::from_series(&assembled[0]).unwrap();
    assert_eq!(volume.dim(), (4, 4, 3));
    assert_eq!(volume.spacing, (1.0, 1.0, 2.0));
    for k in 0..3 {
        assert_eq!(volume.data[[1, 1, k]], k as f32);
    }
}

#[test]
fn equal_locations_preserve_encounter_order() {
    let mut first = slice(1.0, Array2::from_elem((2, 2), 10.0));
    first.sop_instance_uid = "first".to_string();
    let mut second = slice(1.0, Array2::from_elem((2, 2), 20.0));
    second.sop_instance_uid = "second".to_string();

    let assembled = series::assemble(vec![first, second]);
    let volume = Volume::from_series(&assembled[0]).unwrap();
    assert_eq!(volume.data[[0, 0, 0]], 10.0);
    assert_eq!(volume.data[[0, 0, 1]], 20.0);
}

#[test]
fn resampling_to_isotropic_spacing_doubles_the_slice_count() {
    let assembled = series::assemble(vec![
        slice(0.0, Array2::from_elem((4, 4), 1.0)),
        slice(2.0, Array2::from_elem((4, 4), 1.0)),
        slice(4.0, Array2::from_elem((4, 4), 1.0)),
    ]);
    let volume = Volume::from_series(&assembled[0]).unwrap();

    let resampled = resample::resample(&volume, (1.0, 1.0, 1.0)).unwrap();
    assert_eq!(resampled.dim(), (4, 4, 6));
    assert_eq!(resampled.spacing, (1.0, 1.0, 1.0));
    // Constant input must survive interpolation untouched.
    assert!(resampled.data.iter().all(|&v| v == 1.0));
}

#[test]
fn thresholding_marks_exactly_the_hot_voxel() {
    let mut data = Array3::<f32>::zeros((4, 4, 3));
    data[[2, 1, 1]] = 0.6;

    let config = PipelineConfig {
        mode: SegmentationMode::Threshold,
        low_threshold: 0.4,
        high_threshold: 0.8,
        smoothing_sigma: None,
        ..Default::default()
    };
    let mask = segment::segment(&data, &config).unwrap();

    assert_eq!(mask.dim(), data.dim());
    let count: usize = mask.iter().map(|&v| v as usize).sum();
    assert_eq!(count, 1);
    assert_eq!(mask[[2, 1, 1]], 1);
}

#[test]
fn identical_volumes_evaluate_perfectly() {
    let reference = Array3::<f32>::from_shape_fn((8, 8, 8), |(i, j, k)| (i + 2 * j + 3 * k) as f32);
    let candidate = reference.clone();

    assert_eq!(metrics::accuracy(&candidate, &reference).unwrap(), 1.0);
    assert_eq!(
        metrics::psnr(&candidate, &reference, 45.0).unwrap(),
        f64::INFINITY
    );
}

#[test]
fn full_threshold_pipeline_produces_a_clean_binary_mask() {
    init_logging();
    // Background 0, a thick mid-intensity block (normalizes to 0.6, inside
    // the band) and one maximum voxel pinning the normalization range.
    let slices: Vec<SliceRecord> = (0..10)
        .map(|i| {
            let mut pixels = Array2::<f32>::zeros((12, 12));
            if (3..8).contains(&i) {
                pixels.slice_mut(s![2..9, 2..9]).fill(600.0);
            }
            if i == 9 {
                pixels[[11, 11]] = 1000.0;
            }
            let mut record = slice(i as f32, pixels);
            record.slice_thickness = Some(1.0);
            record
        })
        .collect();
    let series = Series {
        uid: "teeth".to_string(),
        slices,
    };

    let config = PipelineConfig {
        mode: SegmentationMode::Threshold,
        smoothing_sigma: None,
        dilation_radius: Some(1),
        ..Default::default()
    };
    let result = pipeline::process_series(&series, &config).unwrap();

    assert_eq!(result.mask.dim(), result.volume.dim());
    assert!(result.mask.iter().all(|&v| v <= 1));
    assert!(result.mask.iter().any(|&v| v == 1));
    // The block interior is kept, the out-of-band maximum voxel is not.
    assert_eq!(result.mask[[5, 5, 5]], 1);
    assert_eq!(result.mask[[11, 11, 9]], 0);
}

#[test]
fn clustering_is_reproducible_across_runs() {
    init_logging();
    let slices: Vec<SliceRecord> = (0..6)
        .map(|i| {
            let pixels =
                Array2::from_shape_fn((6, 6), |(r, c)| ((r * 13 + c * 7 + i * 29) % 50) as f32);
            slice(i as f32, pixels)
        })
        .collect();
    let series = Series {
        uid: "noise".to_string(),
        slices,
    };

    let config = PipelineConfig::default();
    let first = pipeline::process_series(&series, &config).unwrap();
    let second = pipeline::process_series(&series, &config).unwrap();
    assert_eq!(first.mask, second.mask);
}
