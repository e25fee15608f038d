use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use rayon::prelude::*;

use crate::{
    field::{
        source::{AlphaSource, FullCoverage, SourceField},
        volume::Volume,
        voxel::Voxel,
    },
    foundation::core::{Interpolation, Timepoint, VoxelBox},
    foundation::error::{VoxfuseError, VoxfuseResult},
    fusion::blend::BlendMode,
    fusion::cache::{CellBackend, CellGrid, CellKey, MemoryCellStore},
    fusion::fused::{FusedReader, build_reader},
    fusion::resolution,
};

/// Timepoint used to snapshot voxel sizes when building correspondence
/// tables. Voxel sizes are assumed timepoint-invariant.
const REFERENCE_TIMEPOINT: Timepoint = Timepoint(0);

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Construction-time parameters of a [`FusionEngine`].
pub struct FusionConfig {
    /// Per-voxel combination rule.
    pub blend: BlendMode,
    /// Match origin resolution levels to the output level's voxel size.
    /// When disabled every output level samples `default_level`.
    pub resolution_reuse: bool,
    /// Origin level used for every output level when reuse is disabled.
    pub default_level: usize,
    /// Cache tiling granularity in voxels per axis.
    pub cell_size: [u64; 3],
    /// Serve full volumes from the tiled memoized cache instead of
    /// evaluating lazily per read.
    pub cache_enabled: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            blend: BlendMode::default(),
            resolution_reuse: true,
            default_level: 0,
            cell_size: [64, 64, 64],
            cache_enabled: true,
        }
    }
}

impl FusionConfig {
    /// Fail fast on parameters no engine can run with.
    pub fn validate(&self) -> VoxfuseResult<()> {
        if self.cell_size.iter().any(|&s| s == 0) {
            return Err(VoxfuseError::config("cell sizes must be positive"));
        }
        Ok(())
    }
}

#[derive(Clone)]
/// One registered input image with its coverage companion and the derived
/// state built eagerly at registration time.
pub(crate) struct Origin<T> {
    pub(crate) source: Arc<dyn SourceField<T>>,
    pub(crate) alpha: Arc<dyn AlphaSource>,
    pub(crate) interp: Interpolation,
    /// Output level -> origin level, one entry per model level.
    pub(crate) correspondence: Vec<usize>,
    /// Characteristic voxel size per origin level, finest first.
    pub(crate) voxel_sizes: Vec<f64>,
}

impl<T: Voxel> Origin<T> {
    /// Resolve the origin level for an output `level`, range-checked.
    ///
    /// The matcher already clamps to the coarsest level, so an out-of-range
    /// entry here means broken setup; it is surfaced, not clamped again.
    pub(crate) fn source_level(&self, level: usize) -> VoxfuseResult<usize> {
        let source_level = *self.correspondence.get(level).ok_or_else(|| {
            VoxfuseError::consistency(format!(
                "output level {level} outside correspondence table of length {}",
                self.correspondence.len()
            ))
        })?;
        if source_level >= self.source.num_levels() {
            return Err(VoxfuseError::consistency(format!(
                "correspondence selects level {source_level} but origin has {} levels",
                self.source.num_levels()
            )));
        }
        Ok(source_level)
    }
}

/// Fusion engine: lazily resamples and blends all registered origins into the
/// model's voxel grid, optionally through a tiled memoized cell cache.
///
/// The engine is passive — all computation happens on the calling thread.
/// Concurrent callers are safe as long as each holds its own reader.
pub struct FusionEngine<T> {
    model: Arc<dyn SourceField<T>>,
    model_sizes: Vec<f64>,
    origins: Vec<Origin<T>>,
    config: FusionConfig,
    store: Arc<dyn CellBackend<T>>,
    cells_computed: AtomicU64,
}

impl<T> std::fmt::Debug for FusionEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("model_sizes", &self.model_sizes)
            .field("origins", &self.origins.len())
            .field("config", &self.config)
            .field("cells_computed", &self.cells_computed)
            .finish_non_exhaustive()
    }
}

impl<T: Voxel> FusionEngine<T> {
    /// Engine over `model`'s grid with an in-memory unbounded cell store.
    pub fn new(model: Arc<dyn SourceField<T>>, config: FusionConfig) -> VoxfuseResult<Self> {
        Self::with_store(model, config, Arc::new(MemoryCellStore::new()))
    }

    /// Engine with an externally provided cell backing store (for bounded or
    /// spilling caches).
    pub fn with_store(
        model: Arc<dyn SourceField<T>>,
        config: FusionConfig,
        store: Arc<dyn CellBackend<T>>,
    ) -> VoxfuseResult<Self> {
        config.validate()?;
        let model_sizes = resolution::level_sizes(&*model, REFERENCE_TIMEPOINT)?;
        Ok(Self {
            model,
            model_sizes,
            origins: Vec::new(),
            config,
            store,
            cells_computed: AtomicU64::new(0),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Number of registered origins.
    pub fn num_origins(&self) -> usize {
        self.origins.len()
    }

    /// Characteristic voxel size of each model level.
    pub fn model_level_sizes(&self) -> &[f64] {
        &self.model_sizes
    }

    /// Per-level voxel sizes of a registered origin.
    pub fn origin_level_sizes(&self, index: usize) -> Option<&[f64]> {
        self.origins.get(index).map(|o| o.voxel_sizes.as_slice())
    }

    /// Output level -> origin level table of a registered origin.
    pub fn origin_correspondence(&self, index: usize) -> Option<&[usize]> {
        self.origins
            .get(index)
            .map(|o| o.correspondence.as_slice())
    }

    /// Number of cell computations performed so far (zero-filled cells
    /// included). Repeated fetches of a cached cell do not increase this.
    pub fn cells_computed(&self) -> u64 {
        self.cells_computed.load(Ordering::Relaxed)
    }

    /// Register an origin without an explicit coverage companion: coverage is
    /// 1 over the origin's own extent.
    pub fn add_origin(
        &mut self,
        source: Arc<dyn SourceField<T>>,
        interp: Interpolation,
    ) -> VoxfuseResult<()> {
        let alpha = Arc::new(FullCoverage::for_source(&*source, REFERENCE_TIMEPOINT)?);
        self.add_origin_with_alpha(source, alpha, interp)
    }

    /// Register an origin with its coverage companion.
    ///
    /// Correspondence tables and voxel-size lists are built here, up front;
    /// a zero-level hierarchy or a level-count mismatch between source and
    /// alpha is rejected before the origin is attached.
    #[tracing::instrument(skip(self, source, alpha))]
    pub fn add_origin_with_alpha(
        &mut self,
        source: Arc<dyn SourceField<T>>,
        alpha: Arc<dyn AlphaSource>,
        interp: Interpolation,
    ) -> VoxfuseResult<()> {
        let num_levels = source.num_levels();
        if num_levels == 0 {
            return Err(VoxfuseError::config(
                "origin exposes zero resolution levels",
            ));
        }
        if alpha.num_levels() != num_levels {
            return Err(VoxfuseError::config(format!(
                "origin has {num_levels} levels but its alpha source has {}",
                alpha.num_levels()
            )));
        }

        let voxel_sizes = resolution::level_sizes(&*source, REFERENCE_TIMEPOINT)?;
        let correspondence = if self.config.resolution_reuse {
            resolution::correspondence(&voxel_sizes, &self.model_sizes)?
        } else {
            if self.config.default_level >= num_levels {
                return Err(VoxfuseError::config(format!(
                    "default level {} outside origin's {num_levels} levels",
                    self.config.default_level
                )));
            }
            vec![self.config.default_level; self.model_sizes.len()]
        };

        tracing::debug!(
            origin = self.origins.len(),
            levels = num_levels,
            ?correspondence,
            "registered origin"
        );
        self.origins.push(Origin {
            source,
            alpha,
            interp,
            correspondence,
            voxel_sizes,
        });
        Ok(())
    }

    /// Plain uncached fused cursor at `(t, level)`, blending every origin
    /// present at `t`.
    pub fn fused_view(&self, t: Timepoint, level: usize) -> VoxfuseResult<FusedReader<T>> {
        build_reader(&*self.model, &self.origins, self.config.blend, t, level, None)
    }

    /// The fused volume at `(t, level)`: cell-cached when the cache is
    /// enabled, lazily evaluated otherwise. Fails fast, before any voxel
    /// work, on a broken correspondence.
    #[tracing::instrument(skip(self))]
    pub fn full_volume(&self, t: Timepoint, level: usize) -> VoxfuseResult<FusedVolume<'_, T>> {
        if level >= self.model.num_levels() {
            return Err(VoxfuseError::config(format!(
                "level {level} outside model's {} levels",
                self.model.num_levels()
            )));
        }
        for origin in &self.origins {
            if origin.source.is_present(t) {
                origin.source_level(level)?;
            }
        }

        let bounds = self.model.extent(t, level)?;
        let grid = CellGrid::new(bounds, self.config.cell_size)?;
        let mode = if self.config.cache_enabled {
            VolumeMode::Cached
        } else {
            VolumeMode::Lazy(self.fused_view(t, level)?)
        };
        Ok(FusedVolume {
            engine: self,
            t,
            level,
            grid,
            mode,
        })
    }

    /// Render the whole fused volume at `(t, level)` into one owned
    /// [`Volume`], computing cells in parallel. Each worker holds its own
    /// reader clone; cells are stitched afterwards.
    #[tracing::instrument(skip(self))]
    pub fn materialize(&self, t: Timepoint, level: usize) -> VoxfuseResult<Volume<T>> {
        let volume = self.full_volume(t, level)?;
        let grid = volume.grid.clone();

        let parts: Vec<(VoxelBox, Volume<T>)> = grid
            .cells()
            .into_par_iter()
            .map(|cell| Ok((grid.cell_box(cell), volume.cell_volume(cell)?)))
            .collect::<VoxfuseResult<_>>()?;

        let bounds = grid.bounds();
        let mut data = vec![T::ZERO; bounds.num_voxels()];
        for (cell_box, cell) in parts {
            let max = cell_box.max_excl();
            for z in cell_box.min[2]..max[2] {
                for y in cell_box.min[1]..max[1] {
                    for x in cell_box.min[0]..max[0] {
                        if let Some(i) = bounds.linear_index([x, y, z]) {
                            data[i] = cell.get([x, y, z]);
                        }
                    }
                }
            }
        }
        Volume::from_vec(bounds, data)
    }

    /// Drop all cached cells of one `(t, level)` fused volume.
    pub fn invalidate(&self, t: Timepoint, level: usize) {
        tracing::debug!(?t, level, "invalidating cached cells");
        self.store.invalidate(t, level);
    }

    fn fetch_cell(
        &self,
        t: Timepoint,
        level: usize,
        grid: &CellGrid,
        cell: [i64; 3],
    ) -> VoxfuseResult<Volume<T>> {
        let key = CellKey {
            timepoint: t,
            level,
            cell,
        };
        let bounds = grid.cell_box(cell);
        self.store
            .get_or_compute(key, &|| self.compute_cell(t, level, bounds))
    }

    /// Compute one cell: cull origins against the cell's world-space box,
    /// zero-fill when nothing can contribute, otherwise blend the surviving
    /// subset over the cell in raster order.
    fn compute_cell(
        &self,
        t: Timepoint,
        level: usize,
        bounds: VoxelBox,
    ) -> VoxfuseResult<Volume<T>> {
        self.cells_computed.fetch_add(1, Ordering::Relaxed);

        let out_to_world = self.model.transform(t, level)?;
        let mut mask = vec![false; self.origins.len()];
        let mut any_present = false;
        for (index, origin) in self.origins.iter().enumerate() {
            if !origin.source.is_present(t) {
                continue;
            }
            let present = if origin.alpha.bounding_box_culling() {
                origin.alpha.intersects_box(&out_to_world, bounds, t)?
            } else {
                true
            };
            mask[index] = present;
            any_present |= present;
        }

        if !any_present {
            tracing::trace!(?bounds, "no contributing origins, zero fill");
            return Ok(Volume::zeroed(bounds));
        }

        let mut reader = build_reader(
            &*self.model,
            &self.origins,
            self.config.blend,
            t,
            level,
            Some(&mask),
        )?;
        let data = fill_box(&mut reader, bounds);
        tracing::trace!(?bounds, origins = reader.num_origins(), "cell computed");
        Volume::from_vec(bounds, data)
    }
}

/// Evaluate `reader` over every voxel of `bounds` in raster order (x fastest).
fn fill_box<T: Voxel>(reader: &mut FusedReader<T>, bounds: VoxelBox) -> Vec<T> {
    let mut out = Vec::with_capacity(bounds.num_voxels());
    let max = bounds.max_excl();
    for z in bounds.min[2]..max[2] {
        for y in bounds.min[1]..max[1] {
            for x in bounds.min[0]..max[0] {
                reader.set_position([x, y, z]);
                out.push(reader.get());
            }
        }
    }
    out
}

#[derive(Clone)]
enum VolumeMode<T> {
    Lazy(FusedReader<T>),
    Cached,
}

/// The fused output volume at one `(timepoint, level)`.
///
/// Obtain one [`reader`](FusedVolume::reader) per thread for random access,
/// or whole cells via [`cell_volume`](FusedVolume::cell_volume).
pub struct FusedVolume<'a, T> {
    engine: &'a FusionEngine<T>,
    t: Timepoint,
    level: usize,
    grid: CellGrid,
    mode: VolumeMode<T>,
}

impl<'a, T: Voxel> FusedVolume<'a, T> {
    /// Voxel extent of the fused output at this level.
    pub fn bounds(&self) -> VoxelBox {
        self.grid.bounds()
    }

    /// Cell grid backing the cached path.
    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// A random-access reader over this volume. Clone one per thread.
    pub fn reader(&self) -> VolumeReader<'a, T> {
        let inner = match &self.mode {
            VolumeMode::Lazy(proto) => ReaderInner::Lazy(proto.clone()),
            VolumeMode::Cached => ReaderInner::Cached {
                engine: self.engine,
                t: self.t,
                level: self.level,
                grid: self.grid.clone(),
                current: None,
            },
        };
        VolumeReader {
            pos: [0, 0, 0],
            inner,
        }
    }

    /// One cell of this volume as an owned field.
    ///
    /// On the cached path this is the memoized cell (computed at most once);
    /// on the lazy path it is evaluated on the spot from a private reader.
    pub fn cell_volume(&self, cell: [i64; 3]) -> VoxfuseResult<Volume<T>> {
        match &self.mode {
            VolumeMode::Cached => self.engine.fetch_cell(self.t, self.level, &self.grid, cell),
            VolumeMode::Lazy(proto) => {
                let bounds = self.grid.cell_box(cell);
                let mut reader = proto.clone();
                let data = fill_box(&mut reader, bounds);
                Volume::from_vec(bounds, data)
            }
        }
    }
}

#[derive(Clone)]
enum ReaderInner<'a, T> {
    Lazy(FusedReader<T>),
    Cached {
        engine: &'a FusionEngine<T>,
        t: Timepoint,
        level: usize,
        grid: CellGrid,
        current: Option<([i64; 3], Volume<T>)>,
    },
}

#[derive(Clone)]
/// Positionable reader over a [`FusedVolume`].
///
/// Holds its own position and, on the cached path, the most recently touched
/// cell; clones are fully independent. Reads outside the volume's bounds are
/// zero.
pub struct VolumeReader<'a, T> {
    pos: [i64; 3],
    inner: ReaderInner<'a, T>,
}

impl<T: Voxel> VolumeReader<'_, T> {
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

    /// Value at the current position. Fetching a not-yet-computed cell
    /// blocks until that cell's voxel loop completes.
    pub fn get(&mut self) -> VoxfuseResult<T> {
        match &mut self.inner {
            ReaderInner::Lazy(reader) => {
                reader.set_position(self.pos);
                Ok(reader.get())
            }
            ReaderInner::Cached {
                engine,
                t,
                level,
                grid,
                current,
            } => {
                if !grid.bounds().contains(self.pos) {
                    return Ok(T::ZERO);
                }
                let cell = grid.cell_of(self.pos);
                let needs_fetch = match current {
                    Some((c, _)) => *c != cell,
                    None => true,
                };
                if needs_fetch {
                    let volume = engine.fetch_cell(*t, *level, grid, cell)?;
                    *current = Some((cell, volume));
                }
                match current {
                    Some((_, volume)) => Ok(volume.get(self.pos)),
                    None => Err(VoxfuseError::consistency("cell fetch left no volume")),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fusion/engine.rs"]
mod tests;
