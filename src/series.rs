use crate::slice::SliceRecord;

use dicom::object::open_file;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An ordered stack of slices sharing one Series Instance UID.
///
/// Slices are kept in ascending `slice_location` order; slices without a
/// location sort as 0 and ties keep their original encounter order, so the
/// reconstruction is reproducible for identical inputs.
#[derive(Clone, Debug, Default)]
pub struct Series {
    pub uid: String,
    pub slices: Vec<SliceRecord>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Group slice records by series UID and order each group by slice location.
///
/// Series appear in first-encounter order; the per-series sort is stable.
/// Groups that end up empty are dropped.
pub fn assemble(records: Vec<SliceRecord>) -> Vec<Series> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut series: Vec<Series> = Vec::new();

    for record in records {
        let slot = *index.entry(record.series_uid.clone()).or_insert_with(|| {
            series.push(Series {
                uid: record.series_uid.clone(),
                slices: Vec::new(),
            });
            series.len() - 1
        });
        series[slot].slices.push(record);
    }

    for group in &mut series {
        group.slices.sort_by(|a, b| {
            let left = a.slice_location.unwrap_or(0.0);
            let right = b.slice_location.unwrap_or(0.0);
            left.partial_cmp(&right).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    series.retain(|group| !group.is_empty());
    series
}

/// Read every `.dcm` file under `path` (recursively) into slice records.
///
/// Files that cannot be opened or decoded are skipped with a warning;
/// the run only fails if no file yields a valid record.
pub fn collect_records(path: impl AsRef<Path>) -> Result<Vec<SliceRecord>, AssembleError> {
    let paths: Vec<PathBuf> = WalkDir::new(path.as_ref())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
        })
        .collect();

    let records: Vec<SliceRecord> = paths
        .par_iter()
        .filter_map(|path| match open_file(path) {
            Ok(dicom_object) => match SliceRecord::from_dicom_object(&dicom_object) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!("Skipping {}: {}", path.display(), err);
                    None
                }
            },
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                None
            }
        })
        .collect();

    if records.is_empty() {
        return Err(AssembleError::NoValidImages);
    }
    debug!("Read {} slice records from {} files", records.len(), paths.len());
    Ok(records)
}

/// Convenience wrapper: scan a directory and return its assembled series.
pub fn load_from_directory(path: impl AsRef<Path>) -> Result<Vec<Series>, AssembleError> {
    Ok(assemble(collect_records(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn record(series_uid: &str, sop: &str, location: Option<f32>) -> SliceRecord {
        SliceRecord {
            sop_instance_uid: sop.to_string(),
            series_uid: series_uid.to_string(),
            slice_location: location,
            pixels: Array2::zeros((2, 2)),
            ..Default::default()
        }
    }

    #[test]
    fn groups_by_series_uid_in_encounter_order() {
        let series = assemble(vec![
            record("b", "1", Some(0.0)),
            record("a", "2", Some(0.0)),
            record("b", "3", Some(1.0)),
        ]);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].uid, "b");
        assert_eq!(series[0].len(), 2);
        assert_eq!(series[1].uid, "a");
        assert_eq!(series[1].len(), 1);
    }

    #[test]
    fn orders_by_slice_location_ascending() {
        let series = assemble(vec![
            record("s", "high", Some(12.5)),
            record("s", "low", Some(-3.0)),
            record("s", "mid", Some(4.0)),
        ]);

        let order: Vec<_> = series[0]
            .slices
            .iter()
            .map(|s| s.sop_instance_uid.as_str())
            .collect();
        assert_eq!(order, ["low", "mid", "high"]);
    }

    #[test]
    fn missing_location_sorts_as_zero_and_ties_are_stable() {
        let series = assemble(vec![
            record("s", "first", None),
            record("s", "second", Some(0.0)),
            record("s", "third", None),
            record("s", "below", Some(-1.0)),
        ]);

        let order: Vec<_> = series[0]
            .slices
            .iter()
            .map(|s| s.sop_instance_uid.as_str())
            .collect();
        assert_eq!(order, ["below", "first", "second", "third"]);
    }
}
