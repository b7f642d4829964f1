//! Quality metrics for comparing a reconstruction or mask against a
//! reference volume of the same shape.

use ndarray::Array3;
use thiserror::Error;

const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Shape mismatch: candidate {candidate:?} vs reference {reference:?}")]
    ShapeMismatch {
        candidate: (usize, usize, usize),
        reference: (usize, usize, usize),
    },

    #[error("Cannot evaluate empty arrays")]
    EmptyInput,
}

fn check_shapes(
    candidate: &Array3<f32>,
    reference: &Array3<f32>,
) -> Result<(), MetricsError> {
    if candidate.dim() != reference.dim() {
        return Err(MetricsError::ShapeMismatch {
            candidate: candidate.dim(),
            reference: reference.dim(),
        });
    }
    if candidate.is_empty() {
        return Err(MetricsError::EmptyInput);
    }
    Ok(())
}

/// Fraction of voxels that compare exactly equal.
pub fn accuracy(candidate: &Array3<f32>, reference: &Array3<f32>) -> Result<f64, MetricsError> {
    check_shapes(candidate, reference)?;
    let equal = candidate
        .iter()
        .zip(reference.iter())
        .filter(|(a, b)| a == b)
        .count();
    Ok(equal as f64 / candidate.len() as f64)
}

/// Peak signal-to-noise ratio in decibels, `10 * log10(peak² / MSE)`.
///
/// Returns positive infinity when the arrays are identical (zero MSE).
pub fn psnr(
    candidate: &Array3<f32>,
    reference: &Array3<f32>,
    data_range: f64,
) -> Result<f64, MetricsError> {
    check_shapes(candidate, reference)?;
    let mse: f64 = candidate
        .iter()
        .zip(reference.iter())
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum::<f64>()
        / candidate.len() as f64;

    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (data_range * data_range / mse).log10())
}

/// Mean structural similarity over a sliding cubic window.
///
/// Follows the standard windowed formulation: uniform window of side 7
/// (shrunk to the largest odd side that fits the smallest dimension),
/// stabilizers `C1 = (0.01 L)²` and `C2 = (0.03 L)²` where `L` is
/// `data_range`, and unbiased variance/covariance estimates. The score is
/// averaged over every fully interior window position.
pub fn ssim(
    candidate: &Array3<f32>,
    reference: &Array3<f32>,
    data_range: f64,
) -> Result<f64, MetricsError> {
    check_shapes(candidate, reference)?;

    let dim = candidate.dim();
    let min_extent = dim.0.min(dim.1).min(dim.2);
    let side = window_side(min_extent);
    let half = side / 2;

    let c1 = (SSIM_K1 * data_range).powi(2);
    let c2 = (SSIM_K2 * data_range).powi(2);
    let n = (side * side * side) as f64;

    let mut total = 0.0f64;
    let mut windows = 0usize;
    for i in half..dim.0 - half {
        for j in half..dim.1 - half {
            for k in half..dim.2 - half {
                let mut sum_a = 0.0f64;
                let mut sum_b = 0.0f64;
                let mut sum_aa = 0.0f64;
                let mut sum_bb = 0.0f64;
                let mut sum_ab = 0.0f64;
                for x in i - half..=i + half {
                    for y in j - half..=j + half {
                        for z in k - half..=k + half {
                            let a = candidate[[x, y, z]] as f64;
                            let b = reference[[x, y, z]] as f64;
                            sum_a += a;
                            sum_b += b;
                            sum_aa += a * a;
                            sum_bb += b * b;
                            sum_ab += a * b;
                        }
                    }
                }
                let mean_a = sum_a / n;
                let mean_b = sum_b / n;
                // Unbiased estimates, matching the reference formulation.
                let norm = if n > 1.0 { n - 1.0 } else { 1.0 };
                let var_a = (sum_aa - n * mean_a * mean_a) / norm;
                let var_b = (sum_bb - n * mean_b * mean_b) / norm;
                let cov = (sum_ab - n * mean_a * mean_b) / norm;

                let numerator = (2.0 * mean_a * mean_b + c1) * (2.0 * cov + c2);
                let denominator =
                    (mean_a * mean_a + mean_b * mean_b + c1) * (var_a + var_b + c2);
                total += numerator / denominator;
                windows += 1;
            }
        }
    }

    Ok(total / windows as f64)
}

/// Largest odd window side that fits the smallest dimension, capped at 7.
fn window_side(min_extent: usize) -> usize {
    let side = min_extent.min(7);
    if side % 2 == 0 { side - 1 } else { side }.max(1)
}
