// island_realm/server/src/concurrent/island_grid.rs

use crate::core::types::IslandId;
use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

type CellKey = (i32, i32);

/// Unbounded x/z bucket grid. Each island is registered in every cell its
/// protection square touches, so a point lookup only inspects one cell.
#[derive(Debug)]
pub struct IslandGrid {
    cell_size: i32,
    cells: AHashMap<CellKey, SmallVec<[IslandId; 2]>>,
    island_cells: AHashMap<IslandId, SmallVec<[CellKey; 4]>>,
}

impl IslandGrid {
    pub fn new(cell_size: i32) -> Self {
        let cell_size = cell_size.max(1);
        debug!("Island grid initialized with cell size {}", cell_size);
        IslandGrid {
            cell_size,
            cells: AHashMap::new(),
            island_cells: AHashMap::new(),
        }
    }

    #[inline]
    fn cell_of(&self, x: i32, z: i32) -> CellKey {
        (x.div_euclid(self.cell_size), z.div_euclid(self.cell_size))
    }

    /// Cells covered by the half-open square `[min, max)`.
    fn cells_in(&self, min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> SmallVec<[CellKey; 4]> {
        let (min_cx, min_cz) = self.cell_of(min_x, min_z);
        let (max_cx, max_cz) = self.cell_of(max_x.saturating_sub(1).max(min_x), max_z.saturating_sub(1).max(min_z));
        let mut keys = SmallVec::new();
        for cz in min_cz..=max_cz {
            for cx in min_cx..=max_cx {
                keys.push((cx, cz));
            }
        }
        keys
    }

    pub fn insert(&mut self, id: IslandId, min_x: i32, min_z: i32, max_x: i32, max_z: i32) {
        if self.island_cells.contains_key(&id) {
            self.remove(&id);
        }
        let keys = self.cells_in(min_x, min_z, max_x, max_z);
        for key in &keys {
            self.cells.entry(*key).or_default().push(id);
        }
        trace!("Island {} indexed into {} cell(s)", id, keys.len());
        self.island_cells.insert(id, keys);
    }

    pub fn remove(&mut self, id: &IslandId) -> bool {
        let Some(keys) = self.island_cells.remove(id) else {
            return false;
        };
        for key in keys {
            if let Some(bucket) = self.cells.get_mut(&key) {
                bucket.retain(|other| other != id);
                if bucket.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
        true
    }

    /// Islands whose squares may contain the point; callers confirm containment.
    pub fn candidates_at(&self, x: i32, z: i32) -> &[IslandId] {
        self.cells
            .get(&self.cell_of(x, z))
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    /// Islands whose squares may intersect the given square, deduplicated.
    pub fn candidates_in(&self, min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> Vec<IslandId> {
        let mut found: Vec<IslandId> = Vec::new();
        for key in self.cells_in(min_x, min_z, max_x, max_z) {
            if let Some(bucket) = self.cells.get(&key) {
                for id in bucket {
                    if !found.contains(id) {
                        found.push(*id);
                    }
                }
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.island_cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.island_cells.is_empty()
    }

    pub fn get_stats(&self) -> IslandGridStats {
        IslandGridStats {
            total_islands: self.island_cells.len(),
            occupied_cells: self.cells.len(),
            max_islands_per_cell: self.cells.values().map(|b| b.len()).max().unwrap_or(0),
        }
    }
}

#[derive(Debug)]
pub struct IslandGridStats {
    pub total_islands: usize,
    pub occupied_cells: usize,
    pub max_islands_per_cell: usize,
}
