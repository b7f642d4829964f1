use crate::series::Series;
use crate::slice::SliceRecord;

use log::warn;
use ndarray::{Array3, s};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("Series {0} has no slices")]
    EmptySeries(String),

    #[error(
        "Inconsistent slice dimensions in series {series_uid}: \
         expected {expected:?}, found {found:?}"
    )]
    InconsistentDimensions {
        series_uid: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Per-volume acquisition metadata, carried unchanged from the first slice
/// of the series.
#[derive(Clone, Debug, Default)]
pub struct VolumeMetadata {
    pub orientation: Option<[f32; 6]>,
    pub position: Option<[f32; 3]>,
    pub window_center: Option<f32>,
    pub window_width: Option<f32>,
    pub photometric_interpretation: Option<String>,
    pub patient_position: Option<String>,
    pub rescale_type: Option<String>,
    pub derivation_description: Option<String>,
    pub table_height: Option<f32>,
    pub gantry_tilt: Option<f32>,
    pub frame_of_reference_uid: Option<String>,
}

impl VolumeMetadata {
    fn from_slice(record: &SliceRecord) -> Self {
        Self {
            orientation: record.orientation,
            position: record.position,
            window_center: record.window_center,
            window_width: record.window_width,
            photometric_interpretation: record.photometric_interpretation.clone(),
            patient_position: record.patient_position.clone(),
            rescale_type: record.rescale_type.clone(),
            derivation_description: record.derivation_description.clone(),
            table_height: record.table_height,
            gantry_tilt: record.gantry_tilt,
            frame_of_reference_uid: record.frame_of_reference_uid.clone(),
        }
    }
}

/// A reconstructed physical volume.
///
/// `data` has shape `(rows, columns, num_slices)` and holds intensities with
/// the rescale transform already applied. `spacing` is the physical voxel
/// size `(x, y, z)` in millimetres; all components are strictly positive.
#[derive(Clone, Debug)]
pub struct Volume {
    pub data: Array3<f32>,
    pub spacing: (f32, f32, f32),
    pub metadata: VolumeMetadata,
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32), metadata: VolumeMetadata) -> Self {
        Self {
            data,
            spacing,
            metadata,
        }
    }

    /// Dimensions of the volume as `(rows, columns, num_slices)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Stack an ordered series into a volume.
    ///
    /// Each slice is converted to physical units (`raw * slope + intercept`)
    /// and assigned along the third axis in series order. Voxel spacing
    /// comes from the first slice: in-plane from PixelSpacing, through-plane
    /// from SpacingBetweenSlices, falling back to SliceThickness. When
    /// neither is usable the spacing falls back to `(1, 1, 1)` with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the series is empty or any slice's dimensions
    /// differ from the first slice's; the series is abandoned wholesale.
    pub fn from_series(series: &Series) -> Result<Self, ReconstructError> {
        let first = series
            .slices
            .first()
            .ok_or_else(|| ReconstructError::EmptySeries(series.uid.clone()))?;

        let (rows, columns) = first.dim();
        for record in &series.slices {
            if record.dim() != (rows, columns) {
                return Err(ReconstructError::InconsistentDimensions {
                    series_uid: series.uid.clone(),
                    expected: (rows, columns),
                    found: record.dim(),
                });
            }
        }

        let mut data = Array3::<f32>::zeros((rows, columns, series.len()));
        for (i, record) in series.slices.iter().enumerate() {
            data.slice_mut(s![.., .., i]).assign(&record.physical_pixels());
        }

        let spacing = derive_spacing(series, first);
        Ok(Self::new(data, spacing, VolumeMetadata::from_slice(first)))
    }
}

fn derive_spacing(series: &Series, first: &SliceRecord) -> (f32, f32, f32) {
    let in_plane = first
        .pixel_spacing
        .filter(|[x, y]| *x > 0.0 && *y > 0.0);
    let through_plane = first
        .spacing_between_slices
        .filter(|z| *z > 0.0)
        .or(first.slice_thickness.filter(|z| *z > 0.0));

    match (in_plane, through_plane) {
        (Some([x, y]), Some(z)) => (x, y, z),
        _ => {
            warn!(
                "Unable to determine voxel size for series {}, using default (1, 1, 1)",
                series.uid
            );
            (1.0, 1.0, 1.0)
        }
    }
}
