#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// Per-voxel combination rule applied across all present origins.
///
/// One closed enumeration shared by every component; fixed at field
/// construction.
pub enum BlendMode {
    /// Alpha-weighted sum, clamped into the destination kind's range.
    Sum,
    /// Alpha-weighted average; zero when no origin contributes.
    Average,
    /// Maximum over origins with nonzero alpha; alpha is a presence gate only.
    Max,
}

impl Default for BlendMode {
    /// Sum is the historical default when no mode is configured.
    fn default() -> Self {
        Self::Sum
    }
}

#[derive(Clone, Copy, Debug)]
/// Running per-voxel blending state.
///
/// Accumulation must happen in a fixed origin order (the order origins were
/// attached) so floating-point rounding is reproducible across runs.
pub struct BlendAccum {
    mode: BlendMode,
    weighted: f64,
    weight: f64,
    max: f64,
    visited: bool,
}

impl BlendAccum {
    /// Fresh accumulator for `mode`.
    pub fn new(mode: BlendMode) -> Self {
        Self {
            mode,
            weighted: 0.0,
            weight: 0.0,
            max: f64::NEG_INFINITY,
            visited: false,
        }
    }

    /// Fold in one origin's sample. Zero or negative alpha contributes nothing.
    pub fn accumulate(&mut self, value: f64, alpha: f32) {
        if alpha <= 0.0 {
            return;
        }
        let a = f64::from(alpha);
        self.weighted += a * value;
        self.weight += a;
        self.max = self.max.max(value);
        self.visited = true;
    }

    /// Finish the voxel and produce the blended value.
    ///
    /// A voxel no origin contributed to is the additive identity, never
    /// NaN/Inf: the Average division is gated on the accumulated weight.
    pub fn finalize(self) -> f64 {
        match self.mode {
            BlendMode::Sum => self.weighted,
            BlendMode::Average => {
                if self.weight > 0.0 {
                    self.weighted / self.weight
                } else {
                    0.0
                }
            }
            BlendMode::Max => {
                if self.visited {
                    self.max
                } else {
                    0.0
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fusion/blend.rs"]
mod tests;
