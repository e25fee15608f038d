use crate::{
    field::{interp::InterpView, volume::Volume, voxel::Voxel},
    foundation::core::{DAffine3, Interpolation, Timepoint, VoxelBox},
    foundation::error::{VoxfuseError, VoxfuseResult},
    transform::affine,
};

/// One input image of the fusion: a time-resolved, multi-resolution field
/// plus the affine placing each level's voxel grid into world space.
///
/// Level 0 is the finest resolution. Implementations must hand out
/// independent data on every call; the engine never shares a stateful cursor
/// across threads.
pub trait SourceField<T: Voxel>: Send + Sync {
    /// Whether this source has data at `t`.
    fn is_present(&self, t: Timepoint) -> bool;

    /// Number of resolution levels (0 is a configuration error to register).
    fn num_levels(&self) -> usize;

    /// The discrete field at `(t, level)`.
    fn field(&self, t: Timepoint, level: usize) -> VoxfuseResult<Volume<T>>;

    /// Voxel-to-world affine at `(t, level)`.
    fn transform(&self, t: Timepoint, level: usize) -> VoxfuseResult<DAffine3>;

    /// Voxel extent at `(t, level)`.
    fn extent(&self, t: Timepoint, level: usize) -> VoxfuseResult<VoxelBox> {
        Ok(self.field(t, level)?.bounds())
    }

    /// Continuously-addressable view of the field at `(t, level)`.
    fn interpolated(
        &self,
        t: Timepoint,
        level: usize,
        mode: Interpolation,
    ) -> VoxfuseResult<InterpView<T>> {
        Ok(InterpView::new(self.field(t, level)?, mode))
    }
}

/// Per-voxel coverage companion of a [`SourceField`].
///
/// Same contract shape, fixed f32 element type with values in `[0, 1]`,
/// plus the bounding-box culling hooks used by the tiled cache.
pub trait AlphaSource: Send + Sync {
    /// Whether coverage data exists at `t`.
    fn is_present(&self, t: Timepoint) -> bool;

    /// Number of resolution levels; must match the companion source.
    fn num_levels(&self) -> usize;

    /// The coverage field at `(t, level)`.
    fn field(&self, t: Timepoint, level: usize) -> VoxfuseResult<Volume<f32>>;

    /// Voxel-to-world affine at `(t, level)`.
    fn transform(&self, t: Timepoint, level: usize) -> VoxfuseResult<DAffine3>;

    /// Voxel extent at `(t, level)`.
    fn extent(&self, t: Timepoint, level: usize) -> VoxfuseResult<VoxelBox> {
        Ok(self.field(t, level)?.bounds())
    }

    /// Whether the cache may skip this origin via bounding-box tests.
    ///
    /// Returning `false` makes the origin unconditionally present in every
    /// cell.
    fn bounding_box_culling(&self) -> bool {
        true
    }

    /// Whether this origin's world-space extent can intersect the given cell.
    ///
    /// `cell_to_world` is the output model's voxel-to-world affine at the
    /// queried level. The default compares axis-aligned world hulls of the
    /// cell and of this source's level-0 extent; overrides may test tighter
    /// volumes.
    fn intersects_box(
        &self,
        cell_to_world: &DAffine3,
        cell: VoxelBox,
        t: Timepoint,
    ) -> VoxfuseResult<bool> {
        let cell_w = affine::world_aabb(cell_to_world, cell);
        let own_w = affine::world_aabb(&self.transform(t, 0)?, self.extent(t, 0)?);
        Ok(cell_w.intersects(&own_w))
    }
}

/// In-memory multi-resolution source backed by owned [`Volume`]s.
///
/// Levels are timepoint-invariant; presence can optionally be restricted to a
/// half-open timepoint range. Doubles as the resampling model in stand-alone
/// use and as the workhorse of the test suite.
#[derive(Clone, Debug)]
pub struct ArraySource<T> {
    levels: Vec<(Volume<T>, DAffine3)>,
    present: Option<std::ops::Range<u32>>,
    culling: bool,
}

impl<T: Voxel> ArraySource<T> {
    /// Build a source from `(volume, voxel_to_world)` pairs, finest first.
    pub fn new(levels: Vec<(Volume<T>, DAffine3)>) -> VoxfuseResult<Self> {
        if levels.is_empty() {
            return Err(VoxfuseError::config(
                "source must expose at least one resolution level",
            ));
        }
        Ok(Self {
            levels,
            present: None,
            culling: true,
        })
    }

    /// Build a single-level source.
    pub fn single_level(volume: Volume<T>, voxel_to_world: DAffine3) -> Self {
        Self {
            levels: vec![(volume, voxel_to_world)],
            present: None,
            culling: true,
        }
    }

    /// Restrict presence to `timepoints` (half-open).
    pub fn with_presence(mut self, timepoints: std::ops::Range<u32>) -> Self {
        self.present = Some(timepoints);
        self
    }

    /// Enable or disable bounding-box culling when used as an alpha source.
    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.culling = enabled;
        self
    }

    fn level(&self, level: usize) -> VoxfuseResult<&(Volume<T>, DAffine3)> {
        self.levels.get(level).ok_or_else(|| {
            VoxfuseError::consistency(format!(
                "level {level} out of range for source with {} levels",
                self.levels.len()
            ))
        })
    }
}

impl<T: Voxel> SourceField<T> for ArraySource<T> {
    fn is_present(&self, t: Timepoint) -> bool {
        match &self.present {
            Some(r) => r.contains(&t.0),
            None => true,
        }
    }

    fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn field(&self, _t: Timepoint, level: usize) -> VoxfuseResult<Volume<T>> {
        Ok(self.level(level)?.0.clone())
    }

    fn transform(&self, _t: Timepoint, level: usize) -> VoxfuseResult<DAffine3> {
        Ok(self.level(level)?.1)
    }
}

impl AlphaSource for ArraySource<f32> {
    fn is_present(&self, t: Timepoint) -> bool {
        SourceField::is_present(self, t)
    }

    fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn field(&self, t: Timepoint, level: usize) -> VoxfuseResult<Volume<f32>> {
        SourceField::field(self, t, level)
    }

    fn transform(&self, t: Timepoint, level: usize) -> VoxfuseResult<DAffine3> {
        SourceField::transform(self, t, level)
    }

    fn bounding_box_culling(&self) -> bool {
        self.culling
    }
}

/// Auto-created alpha source for origins registered without one: coverage is
/// 1 everywhere inside the companion's extent.
///
/// Extents and transforms are snapshotted from the companion at a reference
/// timepoint; the coverage field itself is a constant-fill volume with no
/// backing storage.
#[derive(Clone, Debug)]
pub struct FullCoverage {
    levels: Vec<(VoxelBox, DAffine3)>,
    culling: bool,
}

impl FullCoverage {
    /// Snapshot `source`'s per-level extents and transforms at `t`.
    pub fn for_source<T: Voxel>(
        source: &dyn SourceField<T>,
        t: Timepoint,
    ) -> VoxfuseResult<Self> {
        let n = source.num_levels();
        if n == 0 {
            return Err(VoxfuseError::config(
                "cannot derive coverage for a source with zero resolution levels",
            ));
        }
        let levels = (0..n)
            .map(|l| Ok((source.extent(t, l)?, source.transform(t, l)?)))
            .collect::<VoxfuseResult<Vec<_>>>()?;
        Ok(Self {
            levels,
            culling: true,
        })
    }

    /// Enable or disable bounding-box culling.
    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.culling = enabled;
        self
    }

    fn level(&self, level: usize) -> VoxfuseResult<&(VoxelBox, DAffine3)> {
        self.levels.get(level).ok_or_else(|| {
            VoxfuseError::consistency(format!(
                "level {level} out of range for coverage with {} levels",
                self.levels.len()
            ))
        })
    }
}

impl AlphaSource for FullCoverage {
    fn is_present(&self, _t: Timepoint) -> bool {
        true
    }

    fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn field(&self, _t: Timepoint, level: usize) -> VoxfuseResult<Volume<f32>> {
        Ok(Volume::splat(self.level(level)?.0, 1.0))
    }

    fn transform(&self, _t: Timepoint, level: usize) -> VoxfuseResult<DAffine3> {
        Ok(self.level(level)?.1)
    }

    fn extent(&self, _t: Timepoint, level: usize) -> VoxfuseResult<VoxelBox> {
        Ok(self.level(level)?.0)
    }

    fn bounding_box_culling(&self) -> bool {
        self.culling
    }
}

#[cfg(test)]
#[path = "../../tests/unit/field/source.rs"]
mod tests;
