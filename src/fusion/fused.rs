use crate::{
    field::{interp::InterpView, voxel::Voxel},
    foundation::core::{DAffine3, DVec3, Interpolation, Timepoint},
    foundation::error::{VoxfuseError, VoxfuseResult},
    fusion::blend::{BlendAccum, BlendMode},
    fusion::engine::Origin,
};

use crate::field::source::SourceField;

#[derive(Clone, Debug)]
/// One origin wired into the output frame: interpolated value and coverage
/// views plus the affines mapping output voxel coordinates into each view's
/// own grid.
struct OriginSampler<T> {
    values: InterpView<T>,
    alpha: InterpView<f32>,
    out_to_values: DAffine3,
    out_to_alpha: DAffine3,
}

impl<T: Voxel> OriginSampler<T> {
    fn alpha_at(&self, out_pos: DVec3) -> f32 {
        self.alpha.sample(self.out_to_alpha.transform_point3(out_pos)) as f32
    }

    fn value_at(&self, out_pos: DVec3) -> f64 {
        self.values
            .sample(self.out_to_values.transform_point3(out_pos))
    }
}

#[derive(Clone, Debug)]
/// Random-access cursor over the fused image at one `(timepoint, level)`.
///
/// Holds an owned position plus one sampler per retained origin. Not safe for
/// shared use across threads from a single value: every thread (and every
/// parallel cell computation) takes its own clone. Cloning is a cheap
/// structural deep copy — position and sampler list are owned, backing voxel
/// data is shared immutably.
pub struct FusedReader<T> {
    pos: [i64; 3],
    samplers: Vec<OriginSampler<T>>,
    blend: BlendMode,
}

impl<T: Voxel> FusedReader<T> {
    /// Number of origins retained by this reader.
    pub fn num_origins(&self) -> usize {
        self.samplers.len()
    }

    /// Blend mode this reader was built with.
    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    /// Current position in output voxel coordinates.
    pub fn position(&self) -> [i64; 3] {
        self.pos
    }

    /// Move to an absolute position.
    pub fn set_position(&mut self, pos: [i64; 3]) {
        self.pos = pos;
    }

    /// Move by a relative offset.
    pub fn move_by(&mut self, delta: [i64; 3]) {
        for d in 0..3 {
            self.pos[d] += delta[d];
        }
    }

    /// Step one voxel forward along `axis`.
    pub fn step(&mut self, axis: usize) {
        self.pos[axis] += 1;
    }

    /// Duplicate, retaining only the origins flagged `true` in `mask`.
    ///
    /// This elides origins without rebuilding the whole composition; the mask
    /// indexes this reader's origin order.
    pub fn clone_subset(&self, mask: &[bool]) -> VoxfuseResult<Self> {
        if mask.len() != self.samplers.len() {
            return Err(VoxfuseError::consistency(format!(
                "subset mask length {} does not match {} origins",
                mask.len(),
                self.samplers.len()
            )));
        }
        let samplers = self
            .samplers
            .iter()
            .zip(mask)
            .filter(|&(_, &keep)| keep)
            .map(|(s, _)| s.clone())
            .collect();
        Ok(Self {
            pos: self.pos,
            samplers,
            blend: self.blend,
        })
    }

    /// Blended value at the current position.
    ///
    /// Origins whose coverage reads exactly zero are skipped so that garbage
    /// values under zero weight can never leak into the output. Accumulation
    /// runs in origin attach order for reproducible rounding.
    pub fn get(&self) -> T {
        let p = DVec3::new(self.pos[0] as f64, self.pos[1] as f64, self.pos[2] as f64);
        let mut acc = BlendAccum::new(self.blend);
        for sampler in &self.samplers {
            let alpha = sampler.alpha_at(p);
            if alpha == 0.0 {
                continue;
            }
            acc.accumulate(sampler.value_at(p), alpha);
        }
        T::from_accum(acc.finalize())
    }
}

/// Compose the fused random-access view for `(t, level)`.
///
/// Builds, per origin present at `t` (and flagged in `subset` when given),
/// the affine chain `output voxel -> world -> origin voxel` at the origin
/// level its correspondence table selects, pairing the origin's interpolated
/// value view with its coverage view (coverage always samples
/// nearest-neighbor so it cannot blur across tile boundaries).
///
/// Fails before any voxel is computed when a correspondence entry falls
/// outside an origin's own hierarchy.
pub(crate) fn build_reader<T: Voxel>(
    model: &dyn SourceField<T>,
    origins: &[Origin<T>],
    blend: BlendMode,
    t: Timepoint,
    level: usize,
    subset: Option<&[bool]>,
) -> VoxfuseResult<FusedReader<T>> {
    if let Some(mask) = subset {
        if mask.len() != origins.len() {
            return Err(VoxfuseError::consistency(format!(
                "subset mask length {} does not match {} origins",
                mask.len(),
                origins.len()
            )));
        }
    }

    // Output voxel -> world; inverted per origin below.
    let out_to_world = model.transform(t, level)?;

    let mut samplers = Vec::new();
    for (index, origin) in origins.iter().enumerate() {
        if !origin.source.is_present(t) {
            continue;
        }
        if let Some(mask) = subset {
            if !mask[index] {
                continue;
            }
        }

        let source_level = origin.source_level(level)?;
        let values = origin.source.interpolated(t, source_level, origin.interp)?;
        let alpha = InterpView::new(
            origin.alpha.field(t, source_level)?,
            Interpolation::Nearest,
        );

        let out_to_values =
            origin.source.transform(t, source_level)?.inverse() * out_to_world;
        let out_to_alpha = origin.alpha.transform(t, source_level)?.inverse() * out_to_world;

        samplers.push(OriginSampler {
            values,
            alpha,
            out_to_values,
            out_to_alpha,
        });
    }

    Ok(FusedReader {
        pos: [0, 0, 0],
        samplers,
        blend,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/fusion/fused.rs"]
mod tests;
