use crate::foundation::error::{VoxfuseError, VoxfuseResult};

pub use glam::{DAffine3, DVec3};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
/// One timepoint of a time-resolved image series.
pub struct Timepoint(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Interpolation mode used when sampling a source at non-integer coordinates.
pub enum Interpolation {
    /// Round each coordinate to the closest voxel.
    Nearest,
    /// Trilinear interpolation with zero extension outside the extent.
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
/// Axis-aligned integer box in voxel space: inclusive min corner plus shape.
pub struct VoxelBox {
    /// Inclusive minimum corner.
    pub min: [i64; 3],
    /// Extent along each axis in voxels.
    pub shape: [u64; 3],
}

impl VoxelBox {
    /// Construct a box from its minimum corner and shape.
    pub fn new(min: [i64; 3], shape: [u64; 3]) -> Self {
        Self { min, shape }
    }

    /// Box at the origin with the given shape.
    pub fn from_shape(shape: [u64; 3]) -> Self {
        Self {
            min: [0, 0, 0],
            shape,
        }
    }

    /// Exclusive maximum corner.
    pub fn max_excl(self) -> [i64; 3] {
        [
            self.min[0] + self.shape[0] as i64,
            self.min[1] + self.shape[1] as i64,
            self.min[2] + self.shape[2] as i64,
        ]
    }

    /// Whether any axis has zero extent.
    pub fn is_empty(self) -> bool {
        self.shape.iter().any(|&s| s == 0)
    }

    /// Total number of voxels.
    pub fn num_voxels(self) -> usize {
        (self.shape[0] * self.shape[1] * self.shape[2]) as usize
    }

    /// Whether `pos` lies inside the box.
    pub fn contains(self, pos: [i64; 3]) -> bool {
        let max = self.max_excl();
        (0..3).all(|d| self.min[d] <= pos[d] && pos[d] < max[d])
    }

    /// Row-major linear index of `pos` (x fastest), or `None` outside the box.
    pub fn linear_index(self, pos: [i64; 3]) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        let x = (pos[0] - self.min[0]) as u64;
        let y = (pos[1] - self.min[1]) as u64;
        let z = (pos[2] - self.min[2]) as u64;
        Some(((z * self.shape[1] + y) * self.shape[0] + x) as usize)
    }

    /// Intersection with `other`; a zero-shape box when disjoint.
    pub fn intersect(self, other: VoxelBox) -> VoxelBox {
        let mut min = [0i64; 3];
        let mut shape = [0u64; 3];
        let a_max = self.max_excl();
        let b_max = other.max_excl();
        for d in 0..3 {
            let lo = self.min[d].max(other.min[d]);
            let hi = a_max[d].min(b_max[d]);
            min[d] = lo;
            shape[d] = hi.saturating_sub(lo).max(0) as u64;
        }
        VoxelBox { min, shape }
    }

    /// Validate that the box is non-degenerate for use as an output extent.
    pub fn require_non_empty(self, what: &str) -> VoxfuseResult<Self> {
        if self.is_empty() {
            return Err(VoxfuseError::config(format!("{what} must be non-empty")));
        }
        Ok(self)
    }
}
