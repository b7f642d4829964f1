use dicom::{
    core::Tag,
    object::{FileDicomObject, InMemDicomObject},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Missing Series Instance UID")]
    MissingSeriesUid,

    #[error("Missing SOP Instance UID")]
    MissingSopInstanceUid,

    #[error("Unreadable pixel data: {0}")]
    UnreadablePixelData(String),
}

/// One 2D cross-section with its spatial, dimensional and rescale metadata.
///
/// Records are created once per input file and are immutable afterwards.
/// Optional attributes that the file does not carry are `None`; the rescale
/// pair defaults to slope 1 / intercept 0 so stored samples pass through
/// unchanged.
#[derive(Clone, Debug)]
pub struct SliceRecord {
    pub sop_instance_uid: String,
    pub series_uid: String,
    pub study_uid: Option<String>,

    pub position: Option<[f32; 3]>,
    pub orientation: Option<[f32; 6]>,
    pub slice_location: Option<f32>,
    pub pixel_spacing: Option<[f32; 2]>,
    pub slice_thickness: Option<f32>,
    pub spacing_between_slices: Option<f32>,

    pub bits_allocated: u16,
    pub rescale_slope: f32,
    pub rescale_intercept: f32,

    pub window_center: Option<f32>,
    pub window_width: Option<f32>,
    pub photometric_interpretation: Option<String>,
    pub patient_position: Option<String>,
    pub rescale_type: Option<String>,
    pub derivation_description: Option<String>,
    pub table_height: Option<f32>,
    pub gantry_tilt: Option<f32>,
    pub frame_of_reference_uid: Option<String>,

    /// Raw stored samples of the first frame, without the modality LUT
    /// applied. Shape is `(rows, columns)`.
    pub pixels: Array2<f32>,
}

impl Default for SliceRecord {
    fn default() -> Self {
        Self {
            sop_instance_uid: String::new(),
            series_uid: String::new(),
            study_uid: None,
            position: None,
            orientation: None,
            slice_location: None,
            pixel_spacing: None,
            slice_thickness: None,
            spacing_between_slices: None,
            bits_allocated: 16,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
            window_center: None,
            window_width: None,
            photometric_interpretation: None,
            patient_position: None,
            rescale_type: None,
            derivation_description: None,
            table_height: None,
            gantry_tilt: None,
            frame_of_reference_uid: None,
            pixels: Array2::zeros((0, 0)),
        }
    }
}

impl SliceRecord {
    /// Extract a slice record from an in-memory DICOM object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object lacks a series or SOP instance UID or
    /// if its pixel data cannot be decoded. Missing optional attributes are
    /// not errors.
    pub fn from_dicom_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Self, ExtractError> {
        let series_uid = element_string(dicom_object, tags::SERIES_INSTANCE_UID)
            .ok_or(ExtractError::MissingSeriesUid)?;
        let sop_instance_uid = element_string(dicom_object, tags::SOP_INSTANCE_UID)
            .ok_or(ExtractError::MissingSopInstanceUid)?;

        let decoded = dicom_object
            .decode_pixel_data()
            .map_err(|e| ExtractError::UnreadablePixelData(e.to_string()))?;

        // Keep stored values raw; the rescale transform is applied during
        // reconstruction so it stays visible in the volume contract.
        let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
        let pixels = decoded
            .to_ndarray_with_options::<f32>(&options)
            .map_err(|e| ExtractError::UnreadablePixelData(e.to_string()))?
            .slice_move(s![0, .., .., 0]);

        let rescale = decoded.rescale().ok().and_then(|r| r.first().cloned());
        let (rescale_slope, rescale_intercept) =
            rescale.map_or((1.0, 0.0), |r| (r.slope as f32, r.intercept as f32));

        Ok(Self {
            sop_instance_uid,
            series_uid,
            study_uid: element_string(dicom_object, tags::STUDY_INSTANCE_UID),
            position: element_multi_f32(dicom_object, tags::IMAGE_POSITION_PATIENT)
                .and_then(|v| <[f32; 3]>::try_from(v.as_slice()).ok()),
            orientation: element_multi_f32(dicom_object, tags::IMAGE_ORIENTATION_PATIENT)
                .and_then(|v| <[f32; 6]>::try_from(v.as_slice()).ok()),
            slice_location: element_f32(dicom_object, tags::SLICE_LOCATION),
            pixel_spacing: element_multi_f32(dicom_object, tags::PIXEL_SPACING)
                .and_then(|v| <[f32; 2]>::try_from(v.as_slice()).ok()),
            slice_thickness: element_f32(dicom_object, tags::SLICE_THICKNESS),
            spacing_between_slices: element_f32(dicom_object, tags::SPACING_BETWEEN_SLICES),
            bits_allocated: decoded.bits_allocated(),
            rescale_slope,
            rescale_intercept,
            window_center: element_first_f32(dicom_object, tags::WINDOW_CENTER),
            window_width: element_first_f32(dicom_object, tags::WINDOW_WIDTH),
            photometric_interpretation: element_string(
                dicom_object,
                tags::PHOTOMETRIC_INTERPRETATION,
            ),
            patient_position: element_string(dicom_object, tags::PATIENT_POSITION),
            rescale_type: element_string(dicom_object, tags::RESCALE_TYPE),
            derivation_description: element_string(dicom_object, tags::DERIVATION_DESCRIPTION),
            table_height: element_f32(dicom_object, tags::TABLE_HEIGHT),
            gantry_tilt: element_f32(dicom_object, tags::GANTRY_DETECTOR_TILT),
            frame_of_reference_uid: element_string(dicom_object, tags::FRAME_OF_REFERENCE_UID),
            pixels,
        })
    }

    /// Dimensions of the pixel buffer as `(rows, columns)`.
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    /// Stored samples mapped to physical intensity units,
    /// `raw * slope + intercept`.
    pub fn physical_pixels(&self) -> Array2<f32> {
        let (slope, intercept) = (self.rescale_slope, self.rescale_intercept);
        self.pixels.mapv(|v| v.mul_add(slope, intercept))
    }
}

fn element_string(
    dicom_object: &FileDicomObject<InMemDicomObject>,
    tag: Tag,
) -> Option<String> {
    let value = dicom_object.element(tag).ok()?.to_str().ok()?;
    let trimmed = value.trim_end_matches(['\0', ' ']).trim_start();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn element_f32(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<f32> {
    dicom_object.element(tag).ok()?.to_float32().ok()
}

fn element_multi_f32(
    dicom_object: &FileDicomObject<InMemDicomObject>,
    tag: Tag,
) -> Option<Vec<f32>> {
    dicom_object.element(tag).ok()?.to_multi_float32().ok()
}

/// First entry of a possibly multi-valued numeric attribute
/// (WindowCenter and WindowWidth are often multi-valued).
fn element_first_f32(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<f32> {
    element_multi_f32(dicom_object, tag)?.first().copied()
}
