use ndarray::Array3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Degenerate input: volume has constant intensity {0}")]
    DegenerateVolume(f32),

    #[error("Degenerate input: volume is empty")]
    EmptyVolume,
}

/// Linearly rescale intensities to the canonical [0, 1] range using the
/// global minimum and maximum.
///
/// # Errors
///
/// A constant (or empty) volume cannot be normalized; it is surfaced to the
/// caller as unsegmentable instead of dividing by zero.
pub fn normalize(data: &Array3<f32>) -> Result<Array3<f32>, NormalizeError> {
    if data.is_empty() {
        return Err(NormalizeError::EmptyVolume);
    }

    let min = data.iter().copied().fold(f32::INFINITY, f32::min);
    let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == min {
        return Err(NormalizeError::DegenerateVolume(min));
    }

    let range = max - min;
    Ok(data.mapv(|v| (v - min) / range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn normalized_range_is_exactly_zero_to_one() {
        let mut data = Array3::from_elem((3, 3, 3), -200.0);
        data[[0, 0, 0]] = -1000.0;
        data[[2, 2, 2]] = 1800.0;

        let normalized = normalize(&data).unwrap();
        let min = normalized.iter().copied().fold(f32::INFINITY, f32::min);
        let max = normalized.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn constant_volume_is_degenerate() {
        let data = Array3::from_elem((2, 2, 2), 42.0);
        assert!(matches!(
            normalize(&data),
            Err(NormalizeError::DegenerateVolume(v)) if v == 42.0
        ));
    }
}
