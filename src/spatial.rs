//! Spatial partitioning for turret range queries.
//!
//! Provides O(1) cell lookup and O(k) radius queries where k is the number
//! of movers in nearby buckets, rather than O(n) for brute force. Rebuilt
//! from the live mover set at the start of every tick, so entries never
//! outlive the mover they describe by more than one tick.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::{Health, MoverClass, PathRoute, Position};

/// Grid-based spatial partitioning structure over pixel space.
///
/// Write-once per tick: cleared and refilled by
/// [`spatial_grid_update_system`], never mutated in place between rebuilds.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Bucket size in pixels.
    pub cell_size: f32,
    /// Map from bucket coordinates to movers in that bucket.
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
}

/// Entry in a spatial bucket.
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
    /// Waypoint index of the mover; higher means further along its route.
    pub progress: usize,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(128.0) // two tiles per bucket by default
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Clear all entries (call before rebuilding each tick).
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Insert a mover at a position.
    pub fn insert(&mut self, entity: Entity, x: f32, y: f32, progress: usize) {
        let cell = self.world_to_cell(x, y);
        self.cells.entry(cell).or_default().push(SpatialEntry {
            entity,
            x,
            y,
            progress,
        });
    }

    /// All movers within `radius` pixels of a point, sorted by distance
    /// (closest first).
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let cells_to_check = (radius / self.cell_size).ceil() as i32 + 1;
        let center_cell = self.world_to_cell(x, y);

        let mut results = Vec::new();
        for dx in -cells_to_check..=cells_to_check {
            for dy in -cells_to_check..=cells_to_check {
                let cell = (center_cell.0 + dx, center_cell.1 + dy);
                if let Some(entries) = self.cells.get(&cell) {
                    for entry in entries {
                        let dist_sq = (entry.x - x).powi(2) + (entry.y - y).powi(2);
                        if dist_sq <= radius_sq {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            let dist_a = (a.x - x).powi(2) + (a.y - y).powi(2);
            let dist_b = (b.x - x).powi(2) + (b.y - y).powi(2);
            dist_a.partial_cmp(&dist_b).unwrap_or(std::cmp::Ordering::Equal)
        });

        results
    }

    pub fn total_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }
}

/// System that rebuilds the spatial grid from the live mover set each tick.
/// Dead movers are skipped so range queries only see valid targets.
pub fn spatial_grid_update_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &Position, &Health, &PathRoute), With<MoverClass>>,
) {
    grid.clear();

    for (entity, pos, health, route) in query.iter() {
        if !health.is_alive() {
            continue;
        }
        grid.insert(entity, pos.x, pos.y, route.progress());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_radius_query() {
        let mut grid = SpatialGrid::new(64.0);

        let e1 = Entity::from_raw(1);
        let e2 = Entity::from_raw(2);
        let e3 = Entity::from_raw(3);

        grid.insert(e1, 32.0, 32.0, 0);
        grid.insert(e2, 96.0, 32.0, 3);
        grid.insert(e3, 640.0, 640.0, 7);

        let nearby = grid.query_radius(32.0, 32.0, 100.0);
        assert_eq!(nearby.len(), 2);
        // Sorted by distance: e1 first.
        assert_eq!(nearby[0].entity, e1);
        assert_eq!(nearby[1].entity, e2);
        assert_eq!(nearby[1].progress, 3);

        let tight = grid.query_radius(32.0, 32.0, 10.0);
        assert_eq!(tight.len(), 1);
    }

    #[test]
    fn test_clear_empties_the_grid() {
        let mut grid = SpatialGrid::new(64.0);
        grid.insert(Entity::from_raw(1), 10.0, 10.0, 0);
        grid.insert(Entity::from_raw(2), 500.0, 500.0, 5);
        assert_eq!(grid.total_count(), 2);

        grid.clear();
        assert_eq!(grid.total_count(), 0);
        assert!(grid.query_radius(10.0, 10.0, 50.0).is_empty());
    }
}
