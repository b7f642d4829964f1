#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SegmentationMode {
    /// Partition voxel intensities with seeded k-means and keep the cluster
    /// with the highest mean intensity.
    #[default]
    Clustering,
    /// Keep voxels inside the configured intensity band, optionally smoothed
    /// and re-binarized.
    Threshold,
}
