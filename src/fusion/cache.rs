use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    field::{volume::Volume, voxel::Voxel},
    foundation::core::{Timepoint, VoxelBox},
    foundation::error::{VoxfuseError, VoxfuseResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
/// Composite key of one cached cell: timepoint, resolution level, and cell
/// grid coordinate. One flat key type, one map — no nested per-timepoint /
/// per-level lookups.
pub struct CellKey {
    /// Timepoint of the fused volume the cell belongs to.
    pub timepoint: Timepoint,
    /// Resolution level of the fused volume.
    pub level: usize,
    /// Cell coordinate on the cell grid (not voxels).
    pub cell: [i64; 3],
}

#[derive(Clone, Debug)]
/// Regular grid of fixed-size cells covering an output extent.
///
/// Border cells are clipped to the extent, so cells tile the volume exactly.
pub struct CellGrid {
    bounds: VoxelBox,
    cell_size: [u64; 3],
}

impl CellGrid {
    /// Grid over `bounds` with the given cell size.
    pub fn new(bounds: VoxelBox, cell_size: [u64; 3]) -> VoxfuseResult<Self> {
        if cell_size.iter().any(|&s| s == 0) {
            return Err(VoxfuseError::config("cell size must be positive"));
        }
        Ok(Self { bounds, cell_size })
    }

    /// Covered voxel extent.
    pub fn bounds(&self) -> VoxelBox {
        self.bounds
    }

    /// Number of cells along each axis.
    pub fn cells_per_axis(&self) -> [u64; 3] {
        [
            self.bounds.shape[0].div_ceil(self.cell_size[0]),
            self.bounds.shape[1].div_ceil(self.cell_size[1]),
            self.bounds.shape[2].div_ceil(self.cell_size[2]),
        ]
    }

    /// Cell coordinate containing voxel `pos` (valid inside the bounds).
    pub fn cell_of(&self, pos: [i64; 3]) -> [i64; 3] {
        [
            (pos[0] - self.bounds.min[0]).div_euclid(self.cell_size[0] as i64),
            (pos[1] - self.bounds.min[1]).div_euclid(self.cell_size[1] as i64),
            (pos[2] - self.bounds.min[2]).div_euclid(self.cell_size[2] as i64),
        ]
    }

    /// Voxel box of one cell, clipped to the grid bounds.
    pub fn cell_box(&self, cell: [i64; 3]) -> VoxelBox {
        let min = [
            self.bounds.min[0] + cell[0] * self.cell_size[0] as i64,
            self.bounds.min[1] + cell[1] * self.cell_size[1] as i64,
            self.bounds.min[2] + cell[2] * self.cell_size[2] as i64,
        ];
        VoxelBox::new(min, self.cell_size).intersect(self.bounds)
    }

    /// All cell coordinates in raster order (x fastest).
    pub fn cells(&self) -> Vec<[i64; 3]> {
        let n = self.cells_per_axis();
        let mut out = Vec::with_capacity((n[0] * n[1] * n[2]) as usize);
        for z in 0..n[2] as i64 {
            for y in 0..n[1] as i64 {
                for x in 0..n[0] as i64 {
                    out.push([x, y, z]);
                }
            }
        }
        out
    }
}

/// Backing store the tiled cache delegates memoization and eviction to.
///
/// Contract: content is stored under a key exactly once, retrieved by that
/// key, and the loader runs at most once per key even under concurrent
/// access (a second caller for the same key blocks and reuses the first's
/// result). Eviction policy, if any, is entirely the implementation's
/// business; a re-loaded cell must be byte-identical since cell content is a
/// pure function of its key.
pub trait CellBackend<T: Voxel>: Send + Sync {
    /// Fetch the cell under `key`, running `load` only if absent.
    fn get_or_compute(
        &self,
        key: CellKey,
        load: &dyn Fn() -> VoxfuseResult<Volume<T>>,
    ) -> VoxfuseResult<Volume<T>>;

    /// Drop every cell of one `(timepoint, level)` fused volume.
    fn invalidate(&self, timepoint: Timepoint, level: usize);
}

/// Unbounded in-memory [`CellBackend`].
///
/// A shared map hands out one slot per key; the slot's own lock serializes
/// loading, so concurrent requests for the same cell compute it once while
/// other keys proceed in parallel. A failed load leaves the slot empty.
pub struct MemoryCellStore<T> {
    slots: Mutex<HashMap<CellKey, Arc<Mutex<Option<Volume<T>>>>>>,
}

impl<T> Default for MemoryCellStore<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> MemoryCellStore<T> {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells currently held.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.slots).len()
    }

    /// Whether the store holds no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Voxel> CellBackend<T> for MemoryCellStore<T> {
    fn get_or_compute(
        &self,
        key: CellKey,
        load: &dyn Fn() -> VoxfuseResult<Volume<T>>,
    ) -> VoxfuseResult<Volume<T>> {
        let slot = {
            let mut slots = lock_unpoisoned(&self.slots);
            Arc::clone(slots.entry(key).or_default())
        };

        // Slot lock held across the load: concurrent same-key callers wait
        // here instead of recomputing.
        let mut guard = lock_unpoisoned(&slot);
        if let Some(cell) = guard.as_ref() {
            return Ok(cell.clone());
        }
        let cell = load()?;
        *guard = Some(cell.clone());
        Ok(cell)
    }

    fn invalidate(&self, timepoint: Timepoint, level: usize) {
        let mut slots = lock_unpoisoned(&self.slots);
        slots.retain(|k, _| !(k.timepoint == timepoint && k.level == level));
    }
}

fn lock_unpoisoned<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panicked cell computation poisons only its own slot's data, which is
    // discarded anyway; recover the guard instead of propagating the panic.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "../../tests/unit/fusion/cache.rs"]
mod tests;
