//! 3D affine transform helpers.
//!
//! Transforms map voxel grid coordinates to world space. The wire form is the
//! usual 12-coefficient row-major layout (last row implicit `[0 0 0 1]`).

use crate::foundation::core::{DAffine3, DVec3, VoxelBox};

/// Build an affine from 12 row-major coefficients.
pub fn from_row_major(m: &[f64; 12]) -> DAffine3 {
    // glam stores columns; rows are [a b c tx | d e f ty | g h i tz].
    DAffine3::from_cols_array(&[
        m[0], m[4], m[8], m[1], m[5], m[9], m[2], m[6], m[10], m[3], m[7], m[11],
    ])
}

/// Export an affine as 12 row-major coefficients.
pub fn to_row_major(a: &DAffine3) -> [f64; 12] {
    let c = a.to_cols_array();
    [
        c[0], c[3], c[6], c[9], c[1], c[4], c[7], c[10], c[2], c[5], c[8], c[11],
    ]
}

/// Length of each transformed unit axis: the per-axis voxel size in world units.
pub fn axis_scales(a: &DAffine3) -> [f64; 3] {
    [
        a.matrix3.x_axis.length(),
        a.matrix3.y_axis.length(),
        a.matrix3.z_axis.length(),
    ]
}

/// Characteristic voxel size of a level: geometric mean of the axis scales.
pub fn characteristic_scale(a: &DAffine3) -> f64 {
    let s = axis_scales(a);
    (s[0] * s[1] * s[2]).cbrt()
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Axis-aligned bounding box in world space.
pub struct Aabb {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Aabb {
    /// Whether this box overlaps `other` (touching counts as overlap).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }
}

/// World-space bounding box of a voxel box under `voxel_to_world`.
///
/// All eight corners are transformed; the result is their axis-aligned hull.
pub fn world_aabb(voxel_to_world: &DAffine3, b: VoxelBox) -> Aabb {
    let lo = DVec3::new(b.min[0] as f64, b.min[1] as f64, b.min[2] as f64);
    let hi_i = b.max_excl();
    let hi = DVec3::new(hi_i[0] as f64, hi_i[1] as f64, hi_i[2] as f64);

    let mut min = DVec3::splat(f64::INFINITY);
    let mut max = DVec3::splat(f64::NEG_INFINITY);
    for zi in 0..2 {
        for yi in 0..2 {
            for xi in 0..2 {
                let corner = DVec3::new(
                    if xi == 0 { lo.x } else { hi.x },
                    if yi == 0 { lo.y } else { hi.y },
                    if zi == 0 { lo.z } else { hi.z },
                );
                let w = voxel_to_world.transform_point3(corner);
                min = min.min(w);
                max = max.max(w);
            }
        }
    }
    Aabb { min, max }
}
