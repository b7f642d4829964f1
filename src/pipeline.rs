use crate::config::PipelineConfig;
use crate::morphology::MaskRefiner;
use crate::normalize::{self, NormalizeError};
use crate::resample::{self, ResampleError};
use crate::segment::{self, SegmentError};
use crate::series::{self, AssembleError, Series};
use crate::volume::{ReconstructError, Volume};

use log::{info, warn};
use ndarray::Array3;
use std::path::Path;
use thiserror::Error;

/// Why one series was abandoned while the rest of the run continued.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Segment(#[from] SegmentError),
}

/// One fully processed series: the resampled physical volume and its
/// refined binary segmentation mask (same shape as the volume).
#[derive(Clone, Debug)]
pub struct SeriesReconstruction {
    pub series_uid: String,
    pub volume: Volume,
    pub mask: Array3<u8>,
}

#[derive(Clone, Debug)]
pub struct SkippedSeries {
    pub series_uid: String,
    pub reason: String,
}

/// Partial result set of a run: reconstructed series plus the series that
/// were skipped, with reasons.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    pub reconstructions: Vec<SeriesReconstruction>,
    pub skipped: Vec<SkippedSeries>,
}

/// Run one series through reconstruction, resampling, normalization,
/// segmentation and refinement.
///
/// Every stage returns a new owned array; nothing is aliased between
/// stages, so callers are free to pipeline series across threads.
pub fn process_series(
    series: &Series,
    config: &PipelineConfig,
) -> Result<SeriesReconstruction, SeriesError> {
    let volume = Volume::from_series(series)?;
    info!(
        "Series {}: reconstructed {:?} at spacing {:?}",
        series.uid,
        volume.dim(),
        volume.spacing
    );

    let resampled = resample::resample(&volume, config.target_spacing)?;
    info!("Series {}: resampled to {:?}", series.uid, resampled.dim());

    let normalized = normalize::normalize(&resampled.data)?;
    let mut mask = segment::segment(&normalized, config)?;
    MaskRefiner::from_config(config).refine(&mut mask);

    Ok(SeriesReconstruction {
        series_uid: series.uid.clone(),
        volume: resampled,
        mask,
    })
}

/// Process every series found under a directory.
///
/// Unreadable slices and broken series are skipped with their reasons
/// recorded; the run only fails when not a single valid slice exists.
pub fn process_directory(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, AssembleError> {
    let all_series = series::load_from_directory(path)?;
    info!("Processing {} series", all_series.len());

    let mut output = PipelineOutput::default();
    for series in &all_series {
        match process_series(series, config) {
            Ok(result) => output.reconstructions.push(result),
            Err(err) => {
                warn!("Skipping series {}: {}", series.uid, err);
                output.skipped.push(SkippedSeries {
                    series_uid: series.uid.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(output)
}
