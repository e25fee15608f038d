use std::sync::Arc;

use crate::{
    field::voxel::Voxel,
    foundation::core::VoxelBox,
    foundation::error::{VoxfuseError, VoxfuseResult},
};

#[derive(Clone, Debug)]
enum Repr<T> {
    /// Row-major backing data (x fastest).
    Data(Arc<Vec<T>>),
    /// Every voxel inside the extent holds the same value.
    Splat(T),
}

#[derive(Clone, Debug)]
/// Finite-extent, randomly-addressable volumetric field.
///
/// Reads outside the extent yield the element's zero value, so a `Volume` can
/// be sampled without bounds bookkeeping by callers. Cloning is cheap: backing
/// data is shared.
pub struct Volume<T> {
    bounds: VoxelBox,
    repr: Repr<T>,
}

impl<T: Voxel> Volume<T> {
    /// Wrap row-major `data` (x fastest) covering `bounds`.
    pub fn from_vec(bounds: VoxelBox, data: Vec<T>) -> VoxfuseResult<Self> {
        if data.len() != bounds.num_voxels() {
            return Err(VoxfuseError::config(format!(
                "volume data length {} does not match extent {:?}",
                data.len(),
                bounds.shape
            )));
        }
        Ok(Self {
            bounds,
            repr: Repr::Data(Arc::new(data)),
        })
    }

    /// Volume holding `value` at every voxel of `bounds`, without backing storage.
    pub fn splat(bounds: VoxelBox, value: T) -> Self {
        Self {
            bounds,
            repr: Repr::Splat(value),
        }
    }

    /// All-zero volume covering `bounds`.
    pub fn zeroed(bounds: VoxelBox) -> Self {
        Self::splat(bounds, T::ZERO)
    }

    /// Extent of this volume.
    pub fn bounds(&self) -> VoxelBox {
        self.bounds
    }

    /// Value at `pos`; zero outside the extent.
    pub fn get(&self, pos: [i64; 3]) -> T {
        match &self.repr {
            Repr::Data(data) => match self.bounds.linear_index(pos) {
                Some(i) => data[i],
                None => T::ZERO,
            },
            Repr::Splat(v) => {
                if self.bounds.contains(pos) {
                    *v
                } else {
                    T::ZERO
                }
            }
        }
    }

    /// Materialize the voxel data in raster order.
    pub fn to_vec(&self) -> Vec<T> {
        match &self.repr {
            Repr::Data(data) => data.as_ref().clone(),
            Repr::Splat(v) => vec![*v; self.bounds.num_voxels()],
        }
    }

    /// Backing slice, when the volume is data-backed.
    pub fn as_slice(&self) -> Option<&[T]> {
        match &self.repr {
            Repr::Data(data) => Some(data.as_slice()),
            Repr::Splat(_) => None,
        }
    }
}
