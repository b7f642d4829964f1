use crate::config::PipelineConfig;

use ndarray::{Array3, Zip};

/// Offsets of a discrete spherical structuring element:
/// every integer offset with `x² + y² + z² <= r²`.
pub fn ball(radius: usize) -> Vec<(isize, isize, isize)> {
    let r = radius as isize;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for x in -r..=r {
        for y in -r..=r {
            for z in -r..=r {
                if x * x + y * y + z * z <= r2 {
                    offsets.push((x, y, z));
                }
            }
        }
    }
    offsets
}

/// Binary dilation: a voxel becomes foreground if any voxel under the
/// element is foreground. Out-of-bounds neighbors count as background.
pub fn dilate(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    let element = ball(radius);
    let dim = mask.dim();
    let mut out = Array3::<u8>::zeros(dim);
    Zip::indexed(&mut out).par_for_each(|idx, value| {
        *value = u8::from(
            neighbors(idx, dim, &element).any(|neighbor| mask[neighbor] == 1),
        );
    });
    out
}

/// Binary erosion: a voxel stays foreground only if every voxel under the
/// element is foreground. Out-of-bounds neighbors count as foreground, so
/// structures touching the array border do not erode from outside.
pub fn erode(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    let element = ball(radius);
    let dim = mask.dim();
    let mut out = Array3::<u8>::zeros(dim);
    Zip::indexed(&mut out).par_for_each(|idx, value| {
        *value = u8::from(
            mask[idx] == 1 && neighbors(idx, dim, &element).all(|neighbor| mask[neighbor] == 1),
        );
    });
    out
}

/// Dilation followed by erosion; fills gaps smaller than the element.
pub fn close(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    erode(&dilate(mask, radius), radius)
}

/// Erosion followed by dilation; removes blobs smaller than the element.
pub fn open(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    dilate(&erode(mask, radius), radius)
}

fn neighbors(
    (i, j, k): (usize, usize, usize),
    dim: (usize, usize, usize),
    element: &[(isize, isize, isize)],
) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    element.iter().filter_map(move |&(dx, dy, dz)| {
        let x = i as isize + dx;
        let y = j as isize + dy;
        let z = k as isize + dz;
        (x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < dim.0
            && (y as usize) < dim.1
            && (z as usize) < dim.2)
            .then_some((x as usize, y as usize, z as usize))
    })
}

/// Separable Gaussian filter with nearest-value border handling.
pub fn gaussian_smooth(data: &Array3<f32>, sigma: f32) -> Array3<f32> {
    assert!(sigma > 0.0, "sigma must be positive");

    let radius = (3.0 * sigma).ceil() as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }

    let mut out = data.clone();
    for axis in 0..3 {
        out = convolve_axis(&out, &kernel, radius, axis);
    }
    out
}

fn convolve_axis(data: &Array3<f32>, kernel: &[f32], radius: isize, axis: usize) -> Array3<f32> {
    let dim = data.dim();
    let extent = [dim.0, dim.1, dim.2][axis] as isize;
    let mut out = Array3::<f32>::zeros(dim);
    Zip::indexed(&mut out).par_for_each(|(i, j, k), value| {
        let center = [i as isize, j as isize, k as isize][axis];
        let mut acc = 0.0f32;
        for (t, &w) in kernel.iter().enumerate() {
            let offset = (center + t as isize - radius).clamp(0, extent - 1) as usize;
            let idx = match axis {
                0 => (offset, j, k),
                1 => (i, offset, k),
                _ => (i, j, offset),
            };
            acc = data[idx].mul_add(w, acc);
        }
        *value = acc;
    });
    out
}

/// Morphological cleanup of a binary segmentation mask.
///
/// Applies, in fixed order, closing to fill small holes, opening to remove
/// small noise blobs, and an optional final dilation (used after the
/// thresholding strategy to compensate for erosion introduced by
/// smoothing). Once a mask has stabilized, further passes with the same
/// radii change no voxels.
#[derive(Clone, Copy, Debug)]
pub struct MaskRefiner {
    pub closing_radius: usize,
    pub opening_radius: usize,
    pub dilation_radius: Option<usize>,
}

impl MaskRefiner {
    pub fn new(closing_radius: usize, opening_radius: usize, dilation_radius: Option<usize>) -> Self {
        Self {
            closing_radius,
            opening_radius,
            dilation_radius,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.closing_radius,
            config.opening_radius,
            config.dilation_radius,
        )
    }

    /// Refine the mask in place.
    pub fn refine(&self, mask: &mut Array3<u8>) {
        *mask = close(mask, self.closing_radius);
        *mask = open(mask, self.opening_radius);
        if let Some(radius) = self.dilation_radius {
            *mask = dilate(mask, radius);
        }
    }
}
