//! Resolution-correspondence matching between a source hierarchy and the
//! output model's levels.

use crate::{
    field::voxel::Voxel,
    foundation::core::Timepoint,
    foundation::error::{VoxfuseError, VoxfuseResult},
    transform::affine,
};

use crate::field::source::SourceField;

/// Pick the source level to sample when the output asks for `target` voxel
/// size, given that source's per-level sizes (finest first, increasing).
///
/// Scans from the finest level upward and returns the first level at least as
/// coarse as the target, or the coarsest level when none qualifies. This
/// "round up" policy avoids upsampling blur: the chosen level is never finer
/// than necessary.
pub fn best_level(voxel_sizes: &[f64], target: f64) -> VoxfuseResult<usize> {
    if voxel_sizes.is_empty() {
        return Err(VoxfuseError::config(
            "source exposes zero resolution levels",
        ));
    }
    let mut index = 0;
    while index < voxel_sizes.len() - 1 && voxel_sizes[index] < target {
        index += 1;
    }
    Ok(index)
}

/// Characteristic voxel size of every level of `source` at timepoint `t`.
pub fn level_sizes<T: Voxel>(
    source: &dyn SourceField<T>,
    t: Timepoint,
) -> VoxfuseResult<Vec<f64>> {
    let n = source.num_levels();
    if n == 0 {
        return Err(VoxfuseError::config(
            "source exposes zero resolution levels",
        ));
    }
    (0..n)
        .map(|level| Ok(affine::characteristic_scale(&source.transform(t, level)?)))
        .collect()
}

/// Output level to source level mapping: one source level per model level.
pub fn correspondence(origin_sizes: &[f64], model_sizes: &[f64]) -> VoxfuseResult<Vec<usize>> {
    model_sizes
        .iter()
        .map(|&target| best_level(origin_sizes, target))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/fusion/resolution.rs"]
mod tests;
