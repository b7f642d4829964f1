use crate::enums::SegmentationMode;

/// Options accepted by the reconstruction and segmentation pipeline.
///
/// The defaults reproduce the tuning used for dental cone-beam data:
/// three intensity clusters, a (0.4, 0.8) band for the thresholding
/// alternative, and closing/opening radii of 3 and 2 voxels.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Voxel spacing of the resampled volume, in millimetres per axis.
    pub target_spacing: (f32, f32, f32),
    /// Which segmentation strategy to run.
    pub mode: SegmentationMode,
    /// Number of k-means clusters in [`SegmentationMode::Clustering`].
    pub cluster_count: usize,
    /// Lower bound of the intensity band in [`SegmentationMode::Threshold`].
    pub low_threshold: f32,
    /// Upper bound of the intensity band in [`SegmentationMode::Threshold`].
    pub high_threshold: f32,
    /// Gaussian sigma applied to the thresholded mask before re-binarizing
    /// at 0.5. `None` skips smoothing.
    pub smoothing_sigma: Option<f32>,
    /// Radius of the spherical element used for morphological closing.
    pub closing_radius: usize,
    /// Radius of the spherical element used for morphological opening.
    pub opening_radius: usize,
    /// Optional final dilation radius, used with the thresholding strategy
    /// to compensate for erosion introduced by smoothing.
    pub dilation_radius: Option<usize>,
    /// Seed for the k-means centroid initialization.
    pub random_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_spacing: (1.0, 1.0, 1.0),
            mode: SegmentationMode::Clustering,
            cluster_count: 3,
            low_threshold: 0.4,
            high_threshold: 0.8,
            smoothing_sigma: Some(2.0),
            closing_radius: 3,
            opening_radius: 2,
            dilation_radius: None,
            random_seed: 0,
        }
    }
}
