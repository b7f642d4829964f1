use crate::volume::Volume;

use ndarray::{Array3, Zip};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Target spacing must be strictly positive, got {0:?}")]
    InvalidTargetSpacing((f32, f32, f32)),
}

/// Resample a volume onto a grid with the given voxel spacing.
///
/// The zoom factor per axis is `source_spacing / target_spacing` and the
/// output extent is `round(extent * zoom)` (at least 1). Values are sampled
/// with order-1 (trilinear) interpolation; singleton axes pass through
/// unchanged. Returns a new owned volume, leaving the source untouched.
///
/// # Errors
///
/// Returns an error if any target spacing component is not strictly
/// positive.
pub fn resample(volume: &Volume, target_spacing: (f32, f32, f32)) -> Result<Volume, ResampleError> {
    let (tx, ty, tz) = target_spacing;
    if tx <= 0.0 || ty <= 0.0 || tz <= 0.0 {
        return Err(ResampleError::InvalidTargetSpacing(target_spacing));
    }

    let (sx, sy, sz) = volume.spacing;
    let (nx, ny, nz) = volume.dim();
    let out_dim = (
        scaled_extent(nx, sx / tx),
        scaled_extent(ny, sy / ty),
        scaled_extent(nz, sz / tz),
    );

    let source = &volume.data;
    let mut data = Array3::<f32>::zeros(out_dim);
    Zip::indexed(&mut data).par_for_each(|(i, j, k), value| {
        let u = source_coordinate(i, out_dim.0, nx);
        let v = source_coordinate(j, out_dim.1, ny);
        let w = source_coordinate(k, out_dim.2, nz);
        *value = trilinear(source, u, v, w);
    });

    Ok(Volume::new(data, target_spacing, volume.metadata.clone()))
}

fn scaled_extent(extent: usize, zoom: f32) -> usize {
    ((extent as f32 * zoom).round() as usize).max(1)
}

/// Map an output index to a continuous source coordinate so that the first
/// and last samples of both grids coincide.
fn source_coordinate(index: usize, out_extent: usize, src_extent: usize) -> f32 {
    if out_extent <= 1 || src_extent <= 1 {
        return 0.0;
    }
    index as f32 * (src_extent - 1) as f32 / (out_extent - 1) as f32
}

fn trilinear(data: &Array3<f32>, u: f32, v: f32, w: f32) -> f32 {
    let (nx, ny, nz) = data.dim();

    let u0 = (u.floor() as usize).min(nx - 1);
    let v0 = (v.floor() as usize).min(ny - 1);
    let w0 = (w.floor() as usize).min(nz - 1);
    let u1 = (u0 + 1).min(nx - 1);
    let v1 = (v0 + 1).min(ny - 1);
    let w1 = (w0 + 1).min(nz - 1);

    let du = u - u0 as f32;
    let dv = v - v0 as f32;
    let dw = w - w0 as f32;
    let one_minus_du = 1.0 - du;
    let one_minus_dv = 1.0 - dv;

    let c00 = data[[u0, v0, w0]].mul_add(one_minus_du, data[[u1, v0, w0]] * du);
    let c01 = data[[u0, v0, w1]].mul_add(one_minus_du, data[[u1, v0, w1]] * du);
    let c10 = data[[u0, v1, w0]].mul_add(one_minus_du, data[[u1, v1, w0]] * du);
    let c11 = data[[u0, v1, w1]].mul_add(one_minus_du, data[[u1, v1, w1]] * du);

    let c0 = c00.mul_add(one_minus_dv, c10 * dv);
    let c1 = c01.mul_add(one_minus_dv, c11 * dv);

    c0.mul_add(1.0 - dw, c1 * dw)
}
