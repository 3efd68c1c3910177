//! Cell grid used to pick which entities each player receives.
//!
//! Entities are bucketed by XZ position divided by the cell size. A radius
//! query visits the covering block of cells and then filters by exact
//! horizontal distance.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;

use realm_common::EntityId;
use realm_ecs::EntityStore;

/// A 2D cell coordinate (Y is ignored for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

#[derive(Debug, Clone)]
pub struct InterestGrid {
    cell_size: f32,
    cells: BTreeMap<CellCoord, BTreeSet<EntityId>>,
    positions: BTreeMap<EntityId, Vec3>,
}

impl InterestGrid {
    /// Non-positive or non-finite sizes fall back to 1.
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Rebuild from every live entity in the store.
    pub fn rebuild(&mut self, store: &EntityStore) {
        self.cells.clear();
        self.positions.clear();
        for id in store.live_ids() {
            let Some(t) = store.transform(id) else {
                continue;
            };
            let coord = self.position_to_cell(t.position);
            self.cells.entry(coord).or_default().insert(id);
            self.positions.insert(id, t.position);
        }
    }

    pub fn position_to_cell(&self, pos: Vec3) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    pub fn entities_in_cell(&self, coord: CellCoord) -> impl Iterator<Item = EntityId> + '_ {
        self.cells.get(&coord).into_iter().flatten().copied()
    }

    /// Entities within `radius` (horizontal) of `center`, ascending by id.
    pub fn within(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        let reach = (radius / self.cell_size).ceil() as i32;
        let origin = self.position_to_cell(center);
        let r2 = radius * radius;
        let mut found = BTreeSet::new();
        for dx in -reach..=reach {
            for dz in -reach..=reach {
                let coord = CellCoord::new(origin.x + dx, origin.z + dz);
                for id in self.entities_in_cell(coord) {
                    let Some(p) = self.positions.get(&id) else {
                        continue;
                    };
                    let ddx = p.x - center.x;
                    let ddz = p.z - center.z;
                    if ddx * ddx + ddz * ddz <= r2 {
                        found.insert(id);
                    }
                }
            }
        }
        found.into_iter().collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn total_placements(&self) -> usize {
        self.cells.values().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::{Health, Transform};
    use realm_ecs::BodyShape;

    fn dummy_at(store: &mut EntityStore, x: f32, z: f32) -> EntityId {
        store.register_dummy(
            Transform::at(Vec3::new(x, 0.0, z)),
            Health::new(10.0),
            BodyShape::PLAYER,
        )
    }

    #[test]
    fn position_to_cell_basic() {
        let grid = InterestGrid::new(16.0);
        assert_eq!(grid.position_to_cell(Vec3::new(10.0, 0.0, 10.0)), CellCoord::new(0, 0));
        assert_eq!(grid.position_to_cell(Vec3::new(20.0, 0.0, -5.0)), CellCoord::new(1, -1));
    }

    #[test]
    fn rebuild_buckets_every_live_entity() {
        let mut store = EntityStore::new();
        dummy_at(&mut store, 0.0, 0.0);
        dummy_at(&mut store, 20.0, 0.0);
        let mut grid = InterestGrid::new(16.0);
        grid.rebuild(&store);
        assert_eq!(grid.cell_count(), 2);
        assert_eq!(grid.total_placements(), 2);
    }

    #[test]
    fn radius_filters_by_exact_distance() {
        let mut store = EntityStore::new();
        let near = dummy_at(&mut store, 3.0, 4.0);
        let edge = dummy_at(&mut store, 10.0, 0.0);
        let far = dummy_at(&mut store, 11.0, 11.0);
        let mut grid = InterestGrid::new(4.0);
        grid.rebuild(&store);

        let seen = grid.within(Vec3::ZERO, 10.0);
        assert_eq!(seen, vec![near, edge]);
        assert!(!seen.contains(&far));
    }

    #[test]
    fn removed_entities_vanish_on_rebuild() {
        let mut store = EntityStore::new();
        let a = dummy_at(&mut store, 0.0, 0.0);
        let b = dummy_at(&mut store, 1.0, 0.0);
        let mut grid = InterestGrid::new(8.0);
        grid.rebuild(&store);
        store.unregister(a);
        grid.rebuild(&store);
        assert_eq!(grid.within(Vec3::ZERO, 5.0), vec![b]);
    }

    #[test]
    fn degenerate_cell_size_is_replaced() {
        assert_eq!(InterestGrid::new(0.0).cell_size(), 1.0);
        assert_eq!(InterestGrid::new(f32::NAN).cell_size(), 1.0);
    }
}
