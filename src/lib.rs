//! Voxfuse lazily computes a fused, resampled volumetric image from any
//! number of independently positioned, independently resolved 3D sources.
//!
//! Each source (an *origin*) carries a per-voxel coverage weight in `[0, 1]`;
//! the engine maps every requested output voxel back through each origin's
//! transform and resolution hierarchy, blends the weighted samples (sum,
//! average, or max), and exposes the result as a randomly-addressable,
//! multi-resolution, time-resolved image — optionally backed by a tiled,
//! memoized cell cache so each expensive voxel computation happens at most
//! once.
//!
//! # Pipeline overview
//!
//! 1. **Register**: attach origins ([`SourceField`] + [`AlphaSource`]) to a
//!    [`FusionEngine`]; resolution correspondences are built eagerly here.
//! 2. **Compose**: `fused_view` / `full_volume` invert the model transform at
//!    one `(timepoint, level)` and wire every present origin into the output
//!    frame.
//! 3. **Read**: per-thread readers blend origins voxel by voxel; with the
//!    cache enabled, reads go through fixed-size cells that are culled,
//!    computed once, and memoized.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Passive engine**: no background threads; all work happens on the
//!   calling thread, and concurrency comes from callers holding independent
//!   reader clones.
//! - **Deterministic blending**: origins accumulate in attach order, so
//!   floating-point rounding is reproducible across runs.
//! - **Degenerate states are not errors**: empty cells and zero total weight
//!   produce zeros, never NaN/Inf; configuration problems fail fast at
//!   construction instead.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod field;
mod foundation;
mod fusion;

/// Shared 3D geometry helpers (row-major affine IO, world-space hulls).
pub mod transform;

pub use field::interp::InterpView;
pub use field::source::{AlphaSource, ArraySource, FullCoverage, SourceField};
pub use field::volume::Volume;
pub use field::voxel::{Voxel, VoxelKind};
pub use foundation::core::{DAffine3, DVec3, Interpolation, Timepoint, VoxelBox};
pub use foundation::error::{VoxfuseError, VoxfuseResult};
pub use fusion::blend::{BlendAccum, BlendMode};
pub use fusion::cache::{CellBackend, CellGrid, CellKey, MemoryCellStore};
pub use fusion::engine::{FusedVolume, FusionConfig, FusionEngine, VolumeReader};
pub use fusion::fused::FusedReader;
pub use fusion::resolution::{best_level, correspondence, level_sizes};
