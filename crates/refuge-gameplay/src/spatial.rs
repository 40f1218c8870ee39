//! Uniform spatial grid for radius queries.

use ahash::AHashMap;
use glam::Vec3;

use refuge_common::EntityId;

use crate::entity::EntityArena;

/// Default edge length of a grid cell.
pub const DEFAULT_CELL_SIZE: f32 = 10.0;

/// Horizontal hash grid over entity positions.
///
/// Cells are keyed on the ground plane (x, z); distance checks are full 3D.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: AHashMap<(i32, i32), Vec<(EntityId, Vec3)>>,
    len: usize,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialGrid {
    /// Creates an empty grid.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.01),
            cells: AHashMap::new(),
            len: 0,
        }
    }

    fn cell_of(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (z / self.cell_size).floor() as i32,
        )
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    /// Indexes one entity.
    pub fn insert(&mut self, id: EntityId, position: Vec3) {
        let cell = self.cell_of(position.x, position.z);
        self.cells.entry(cell).or_default().push((id, position));
        self.len += 1;
    }

    /// Re-indexes every active spatial client in `entities`.
    pub fn rebuild(&mut self, entities: &EntityArena) {
        self.clear();
        for entity in entities.iter() {
            if entity.is_active() && entity.is_spatial_client() {
                self.insert(entity.id(), entity.position());
            }
        }
    }

    /// Entities within `radius` of `origin`, excluding `exclude`.
    ///
    /// Scans the covered cells, or every occupied cell when the query square
    /// spans more cells than are occupied.
    #[must_use]
    pub fn find_nearby(&self, origin: Vec3, radius: f32, exclude: Option<EntityId>) -> Vec<EntityId> {
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let (min_x, min_z) = self.cell_of(origin.x - radius, origin.z - radius);
        let (max_x, max_z) = self.cell_of(origin.x + radius, origin.z + radius);
        let radius_sq = radius * radius;
        let in_range = |(id, pos): &&(EntityId, Vec3)| {
            Some(*id) != exclude && pos.distance_squared(origin) <= radius_sq
        };

        let width = i64::from(max_x) - i64::from(min_x) + 1;
        let depth = i64::from(max_z) - i64::from(min_z) + 1;
        if width.saturating_mul(depth) > self.cells.len() as i64 {
            return self
                .cells
                .values()
                .flatten()
                .filter(in_range)
                .map(|(id, _)| *id)
                .collect();
        }

        let mut found = Vec::new();
        for cx in min_x..=max_x {
            for cz in min_z..=max_z {
                let Some(bucket) = self.cells.get(&(cx, cz)) else {
                    continue;
                };
                found.extend(bucket.iter().filter(in_range).map(|(id, _)| *id));
            }
        }
        found
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the grid is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
