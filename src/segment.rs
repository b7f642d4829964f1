use crate::config::PipelineConfig;
use crate::enums::SegmentationMode;
use crate::morphology::gaussian_smooth;

use log::debug;
use ndarray::Array3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

const KMEANS_RESTARTS: usize = 10;
const MAX_KMEANS_ITERATIONS: usize = 100;
const CONVERGENCE_TOLERANCE: f32 = 1e-6;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Cluster count must be at least 2, got {0}")]
    InvalidClusterCount(usize),

    #[error("Threshold band is empty: low {low} >= high {high}")]
    EmptyThresholdBand { low: f32, high: f32 },
}

/// Partition a normalized volume into a binary teeth/background mask.
///
/// In clustering mode, voxel intensities are grouped into
/// `config.cluster_count` clusters by seeded k-means and the cluster with
/// the highest mean intensity becomes the target (ties go to the lowest
/// cluster index). In thresholding mode the target is the open intensity
/// band `(low_threshold, high_threshold)`, optionally smoothed with a
/// Gaussian and re-binarized at 0.5.
///
/// The mask has exactly the input shape and values in {0, 1}.
pub fn segment(volume: &Array3<f32>, config: &PipelineConfig) -> Result<Array3<u8>, SegmentError> {
    match config.mode {
        SegmentationMode::Clustering => {
            segment_clusters(volume, config.cluster_count, config.random_seed)
        }
        SegmentationMode::Threshold => segment_threshold(
            volume,
            config.low_threshold,
            config.high_threshold,
            config.smoothing_sigma,
        ),
    }
}

fn segment_clusters(
    volume: &Array3<f32>,
    cluster_count: usize,
    seed: u64,
) -> Result<Array3<u8>, SegmentError> {
    if cluster_count < 2 {
        return Err(SegmentError::InvalidClusterCount(cluster_count));
    }

    let values: Vec<f32> = volume.iter().copied().collect();
    let labels = kmeans_1d(&values, cluster_count, seed);

    // Pick the cluster with the highest mean intensity; strict comparison
    // keeps the lowest index on ties.
    let mut sums = vec![0.0f64; cluster_count];
    let mut counts = vec![0usize; cluster_count];
    for (&value, &label) in values.iter().zip(&labels) {
        sums[label] += value as f64;
        counts[label] += 1;
    }
    let mut target = 0;
    let mut best_mean = f64::NEG_INFINITY;
    for cluster in 0..cluster_count {
        if counts[cluster] == 0 {
            continue;
        }
        let mean = sums[cluster] / counts[cluster] as f64;
        if mean > best_mean {
            best_mean = mean;
            target = cluster;
        }
    }
    debug!("Selected cluster {target} with mean intensity {best_mean:.4}");

    let mask: Vec<u8> = labels.iter().map(|&label| u8::from(label == target)).collect();
    Ok(Array3::from_shape_vec(volume.dim(), mask)
        .expect("label count matches voxel count"))
}

/// 1-D k-means over voxel intensities.
///
/// Runs Lloyd's algorithm from several k-means++ initializations and keeps
/// the run with the lowest inertia. All randomness comes from one ChaCha8
/// generator seeded from `seed`, so repeated runs on the same volume
/// produce bit-identical labels. Assignment ties go to the lowest cluster
/// index. When the volume holds no more distinct values than clusters,
/// each distinct value simply becomes its own cluster.
fn kmeans_1d(values: &[f32], cluster_count: usize, seed: u64) -> Vec<usize> {
    let mut distinct = values.to_vec();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup();

    if distinct.len() <= cluster_count {
        return values
            .iter()
            .map(|v| distinct.partition_point(|d| d < v))
            .collect();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut best_labels = vec![0usize; values.len()];
    let mut best_inertia = f64::INFINITY;

    for _ in 0..KMEANS_RESTARTS {
        let centroids = init_centroids(&distinct, cluster_count, &mut rng);
        let (labels, centroids) = lloyd(values, centroids);

        let inertia: f64 = values
            .iter()
            .zip(&labels)
            .map(|(&value, &label)| {
                let d = (value - centroids[label]) as f64;
                d * d
            })
            .sum();
        if inertia < best_inertia {
            best_inertia = inertia;
            best_labels = labels;
        }
    }
    best_labels
}

fn lloyd(values: &[f32], mut centroids: Vec<f32>) -> (Vec<usize>, Vec<f32>) {
    let cluster_count = centroids.len();
    let mut labels = vec![0usize; values.len()];

    for _ in 0..MAX_KMEANS_ITERATIONS {
        for (value, label) in values.iter().zip(labels.iter_mut()) {
            *label = nearest_centroid(&centroids, *value);
        }

        let mut sums = vec![0.0f64; cluster_count];
        let mut counts = vec![0usize; cluster_count];
        for (&value, &label) in values.iter().zip(&labels) {
            sums[label] += value as f64;
            counts[label] += 1;
        }

        let mut shift = 0.0f32;
        for cluster in 0..cluster_count {
            if counts[cluster] == 0 {
                continue;
            }
            let updated = (sums[cluster] / counts[cluster] as f64) as f32;
            shift = shift.max((updated - centroids[cluster]).abs());
            centroids[cluster] = updated;
        }
        if shift < CONVERGENCE_TOLERANCE {
            break;
        }
    }

    for (value, label) in values.iter().zip(labels.iter_mut()) {
        *label = nearest_centroid(&centroids, *value);
    }
    (labels, centroids)
}

/// k-means++ seeding: first centroid uniform over the distinct values,
/// each further centroid weighted by squared distance to the nearest
/// centroid chosen so far.
fn init_centroids(distinct: &[f32], cluster_count: usize, rng: &mut ChaCha8Rng) -> Vec<f32> {
    let mut centroids = Vec::with_capacity(cluster_count);
    centroids.push(distinct[rng.gen_range(0..distinct.len())]);

    while centroids.len() < cluster_count {
        let weights: Vec<f64> = distinct
            .iter()
            .map(|&v| {
                let nearest = nearest_centroid(&centroids, v);
                let d = (v - centroids[nearest]) as f64;
                d * d
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total == 0.0 {
            // All remaining values coincide with a centroid already.
            centroids.push(distinct[0]);
            continue;
        }

        let mut pick = rng.gen_range(0.0..total);
        let mut chosen = distinct.len() - 1;
        for (i, &w) in weights.iter().enumerate() {
            pick -= w;
            if pick <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(distinct[chosen]);
    }
    centroids
}

fn nearest_centroid(centroids: &[f32], value: f32) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (cluster, &centroid) in centroids.iter().enumerate() {
        let distance = (value - centroid).abs();
        if distance < best_distance {
            best_distance = distance;
            best = cluster;
        }
    }
    best
}

fn segment_threshold(
    volume: &Array3<f32>,
    low: f32,
    high: f32,
    smoothing_sigma: Option<f32>,
) -> Result<Array3<u8>, SegmentError> {
    if low >= high {
        return Err(SegmentError::EmptyThresholdBand { low, high });
    }

    let band = volume.mapv(|v| f32::from(v > low && v < high));
    let mask = match smoothing_sigma.filter(|sigma| *sigma > 0.0) {
        Some(sigma) => gaussian_smooth(&band, sigma).mapv(|v| u8::from(v > 0.5)),
        None => band.mapv(|v| u8::from(v > 0.5)),
    };
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::SegmentationMode;
    use ndarray::Array3;

    fn clustering_config(seed: u64) -> PipelineConfig {
        PipelineConfig {
            mode: SegmentationMode::Clustering,
            random_seed: seed,
            ..Default::default()
        }
    }

    /// Volume with three well-separated intensity groups around 0.1, 0.5
    /// and 0.9; returns the expected mask of the brightest group.
    fn trimodal_volume() -> (Array3<f32>, Array3<u8>) {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut data = Array3::<f32>::zeros((6, 6, 6));
        let mut expected = Array3::<u8>::zeros((6, 6, 6));
        for (idx, value) in data.indexed_iter_mut() {
            let mode = match rng.gen_range(0..10) {
                0..=6 => 0.1,
                7..=8 => 0.5,
                _ => 0.9,
            };
            *value = mode + rng.gen_range(-0.02..0.02);
            if mode == 0.9 {
                expected[idx] = 1;
            }
        }
        (data, expected)
    }

    #[test]
    fn clustering_selects_brightest_group() {
        let (data, expected) = trimodal_volume();
        let mask = segment(&data, &clustering_config(0)).unwrap();
        assert_eq!(mask, expected);
    }

    #[test]
    fn clustering_is_deterministic_for_a_fixed_seed() {
        let (data, _) = trimodal_volume();
        let first = segment(&data, &clustering_config(7)).unwrap();
        let second = segment(&data, &clustering_config(7)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fewer_distinct_values_than_clusters_still_segments() {
        let mut data = Array3::<f32>::zeros((4, 4, 4));
        data[[1, 1, 1]] = 1.0;
        data[[2, 2, 2]] = 1.0;

        let mask = segment(&data, &clustering_config(0)).unwrap();
        let count: usize = mask.iter().map(|&v| v as usize).sum();
        assert_eq!(count, 2);
        assert_eq!(mask[[1, 1, 1]], 1);
        assert_eq!(mask[[2, 2, 2]], 1);
    }

    #[test]
    fn threshold_band_is_exclusive() {
        let mut data = Array3::<f32>::zeros((3, 3, 3));
        data[[0, 0, 0]] = 0.4; // on the lower bound, excluded
        data[[1, 1, 1]] = 0.6;
        data[[2, 2, 2]] = 0.8; // on the upper bound, excluded

        let config = PipelineConfig {
            mode: SegmentationMode::Threshold,
            smoothing_sigma: None,
            ..Default::default()
        };
        let mask = segment(&data, &config).unwrap();
        let count: usize = mask.iter().map(|&v| v as usize).sum();
        assert_eq!(count, 1);
        assert_eq!(mask[[1, 1, 1]], 1);
    }

    #[test]
    fn inverted_threshold_band_is_rejected() {
        let data = Array3::<f32>::zeros((2, 2, 2));
        let config = PipelineConfig {
            mode: SegmentationMode::Threshold,
            low_threshold: 0.8,
            high_threshold: 0.4,
            ..Default::default()
        };
        assert!(matches!(
            segment(&data, &config),
            Err(SegmentError::EmptyThresholdBand { .. })
        ));
    }

    #[test]
    fn smoothing_erases_a_single_hot_voxel() {
        let mut data = Array3::<f32>::zeros((9, 9, 9));
        data[[4, 4, 4]] = 0.6;

        let config = PipelineConfig {
            mode: SegmentationMode::Threshold,
            smoothing_sigma: Some(2.0),
            ..Default::default()
        };
        let mask = segment(&data, &config).unwrap();
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn mask_shape_matches_input() {
        let data = Array3::<f32>::from_shape_fn((5, 7, 3), |(i, j, k)| (i + j + k) as f32 * 0.01);
        let mask = segment(&data, &clustering_config(0)).unwrap();
        assert_eq!(mask.dim(), (5, 7, 3));
    }
}
