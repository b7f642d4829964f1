use std::path::PathBuf;

use dental_volume::{PipelineConfig, process_directory};

fn main() {
    let directory = std::env::args().nth(1).unwrap_or_else(|| "dicom".to_string());
    let output = process_directory(&PathBuf::from(directory), &PipelineConfig::default())
        .expect("should have processed files from directory");

    for series in &output.reconstructions {
        let voxels: usize = series.mask.iter().map(|&v| v as usize).sum();
        println!(
            "{}: volume {:?} at spacing {:?}, {} segmented voxels",
            series.series_uid,
            series.volume.dim(),
            series.volume.spacing,
            voxels
        );
    }
    for skipped in &output.skipped {
        println!("skipped {}: {}", skipped.series_uid, skipped.reason);
    }
}
