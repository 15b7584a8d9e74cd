//! A* path planner over the terrain grid.
//!
//! Plans a waypoint sequence from spawn to goal for one mover class. Edge
//! cost is the movement cost of the cell being entered, so terrain penalties
//! are charged once per tile and differ per class (fast movers ignore marsh).
//! Blocking cells are excluded from expansion outright rather than carried at
//! infinite cost, so a returned path never crosses impassable terrain.
//!
//! Spawn, goal, and terrain are fixed for the lifetime of a level, so
//! [`PathCache`] stores one route per mover class instead of replanning for
//! every spawned mover.

use bevy_ecs::prelude::*;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::components::MoverClass;
use crate::terrain::{Cell, TerrainGrid};

/// Manhattan distance between two cells. Admissible and consistent for a
/// 4-connected grid whose minimum finite edge cost is 1.0.
fn manhattan(a: Cell, b: Cell) -> f32 {
    (a.x.abs_diff(b.x) + a.y.abs_diff(b.y)) as f32
}

/// Open-set entry. `BinaryHeap` is a max-heap, so the ordering is reversed:
/// the lowest f-score pops first, earliest insertion breaking ties.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    f: f32,
    seq: u64,
    cell: Cell,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn neighbors(cell: Cell, width: usize, height: usize) -> Vec<Cell> {
    let mut out = Vec::with_capacity(4);
    if cell.y + 1 < height {
        out.push(Cell::new(cell.x, cell.y + 1));
    }
    if cell.x + 1 < width {
        out.push(Cell::new(cell.x + 1, cell.y));
    }
    if cell.y > 0 {
        out.push(Cell::new(cell.x, cell.y - 1));
    }
    if cell.x > 0 {
        out.push(Cell::new(cell.x - 1, cell.y));
    }
    out
}

/// Plan a route from `start` to `goal` for the given mover class.
///
/// Returns the cells from start to goal inclusive, in traversal order, or an
/// empty sequence when the goal is unreachable. Callers must treat an empty
/// route as "cannot move", never index into it.
pub fn plan(grid: &TerrainGrid, start: Cell, goal: Cell, mover: MoverClass) -> Vec<Cell> {
    if grid.class_at(start).is_none() || grid.class_at(goal).is_none() {
        return Vec::new();
    }

    let width = grid.width;
    let cell_count = width * grid.height;
    let index = |cell: Cell| cell.y * width + cell.x;

    let mut g_score = vec![f32::INFINITY; cell_count];
    let mut came_from: Vec<Option<Cell>> = vec![None; cell_count];
    let mut closed = vec![false; cell_count];

    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    g_score[index(start)] = 0.0;
    open.push(Frontier {
        f: manhattan(start, goal),
        seq,
        cell: start,
    });

    while let Some(Frontier { cell: current, .. }) = open.pop() {
        let current_index = index(current);
        if closed[current_index] {
            continue;
        }
        if current == goal {
            return reconstruct(&came_from, index, goal);
        }
        closed[current_index] = true;

        for neighbor in neighbors(current, width, grid.height) {
            let neighbor_index = index(neighbor);
            if closed[neighbor_index] {
                continue;
            }
            let Some(cost) = grid.cost_at(neighbor, mover) else {
                continue;
            };
            if !cost.is_finite() {
                // Blocking terrain: not part of the search graph.
                continue;
            }

            let tentative = g_score[current_index] + cost;
            if tentative < g_score[neighbor_index] {
                g_score[neighbor_index] = tentative;
                came_from[neighbor_index] = Some(current);
                seq += 1;
                open.push(Frontier {
                    f: tentative + manhattan(neighbor, goal),
                    seq,
                    cell: neighbor,
                });
            }
        }
    }

    Vec::new()
}

fn reconstruct(
    came_from: &[Option<Cell>],
    index: impl Fn(Cell) -> usize,
    goal: Cell,
) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(previous) = came_from[index(current)] {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}

/// Total cost of traversing `route`: the entry cost of every cell after the
/// start. Used by tests and diagnostics.
pub fn route_cost(grid: &TerrainGrid, route: &[Cell], mover: MoverClass) -> f32 {
    route
        .iter()
        .skip(1)
        .filter_map(|&cell| grid.cost_at(cell, mover))
        .sum()
}

/// One cached route per mover class for the current level.
///
/// Cleared on level load; filled lazily the first time each class spawns.
#[derive(Resource, Default)]
pub struct PathCache {
    routes: HashMap<MoverClass, Arc<[Cell]>>,
}

impl PathCache {
    pub fn clear(&mut self) {
        self.routes.clear();
    }

    /// The route for a mover class, planning it on first request.
    pub fn route_for(&mut self, grid: &TerrainGrid, mover: MoverClass) -> Arc<[Cell]> {
        if let Some(route) = self.routes.get(&mover) {
            return route.clone();
        }
        let route: Arc<[Cell]> = match (grid.spawn_cell(), grid.goal_cell()) {
            (Some(start), Some(goal)) => plan(grid, start, goal, mover).into(),
            _ => Vec::new().into(),
        };
        if route.is_empty() {
            tracing::warn!(mover = mover.as_str(), "no route from spawn to goal");
        }
        self.routes.insert(mover, route.clone());
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainClass;

    fn grid(text: &str) -> TerrainGrid {
        TerrainGrid::parse(text, 64).unwrap()
    }

    fn plan_on(grid: &TerrainGrid, mover: MoverClass) -> Vec<Cell> {
        plan(grid, grid.spawn_cell().unwrap(), grid.goal_cell().unwrap(), mover)
    }

    #[test]
    fn test_straight_corridor() {
        let g = grid("start,path,path,path,finish");
        let route = plan_on(&g, MoverClass::Normal);
        assert_eq!(route.len(), 5);
        assert_eq!(route.first(), Some(&Cell::new(0, 0)));
        assert_eq!(route.last(), Some(&Cell::new(4, 0)));
        for pair in route.windows(2) {
            assert_ne!(pair[0], pair[1], "no duplicate consecutive cells");
        }
        assert_eq!(route_cost(&g, &route, MoverClass::Normal), 4.0);
    }

    #[test]
    fn test_marsh_penalty_per_class() {
        // 10x1 corridor, one marsh tile partway along. A normal mover pays
        // the double entry cost once; a fast mover does not.
        let g = grid("start,path,path,path,marsh,path,path,path,path,finish");
        let normal = plan_on(&g, MoverClass::Normal);
        let fast = plan_on(&g, MoverClass::Fast);
        assert_eq!(normal.len(), 10);
        assert_eq!(fast.len(), 10);
        assert_eq!(route_cost(&g, &normal, MoverClass::Normal), 10.0);
        assert_eq!(route_cost(&g, &fast, MoverClass::Fast), 9.0);
    }

    #[test]
    fn test_detour_beats_marsh_for_slow_movers_only() {
        let g = grid("start,marsh,marsh,marsh,finish\npath,path,path,path,path");
        // Normal movers route around the marsh: 6 edges at 1.0 beats
        // 3 marsh entries plus the goal (7.0).
        let normal = plan_on(&g, MoverClass::Normal);
        assert_eq!(route_cost(&g, &normal, MoverClass::Normal), 6.0);
        assert!(normal
            .iter()
            .all(|&c| g.class_at(c) != Some(TerrainClass::Marsh)));
        // Fast movers cut straight through.
        let fast = plan_on(&g, MoverClass::Fast);
        assert_eq!(fast.len(), 5);
        assert_eq!(route_cost(&g, &fast, MoverClass::Fast), 4.0);
    }

    #[test]
    fn test_enclosed_goal_is_unreachable() {
        let g = grid("start,path,grass\npath,grass,grass\ngrass,grass,finish");
        assert!(plan_on(&g, MoverClass::Normal).is_empty());
    }

    #[test]
    fn test_route_never_crosses_blocking_terrain() {
        let g = grid(
            "start,grass,path,path,finish\n\
             path,mountain,path,forest,path\n\
             path,path,path,path,path",
        );
        let route = plan_on(&g, MoverClass::Normal);
        assert!(!route.is_empty());
        for cell in &route {
            let class = g.class_at(*cell).unwrap();
            assert!(
                class.movement_cost(MoverClass::Normal).is_finite(),
                "route crossed blocking terrain at {cell:?}"
            );
        }
    }

    #[test]
    fn test_start_equals_goal() {
        let g = grid("start,finish");
        let route = plan(&g, Cell::new(0, 0), Cell::new(0, 0), MoverClass::Normal);
        assert_eq!(route, vec![Cell::new(0, 0)]);
    }

    #[test]
    fn test_out_of_bounds_endpoints_yield_empty() {
        let g = grid("start,finish");
        assert!(plan(&g, Cell::new(0, 0), Cell::new(9, 9), MoverClass::Normal).is_empty());
    }

    #[test]
    fn test_cache_plans_once_per_class() {
        let g = grid("start,path,marsh,finish");
        let mut cache = PathCache::default();
        let first = cache.route_for(&g, MoverClass::Normal);
        let again = cache.route_for(&g, MoverClass::Normal);
        assert!(Arc::ptr_eq(&first, &again));
        let fast = cache.route_for(&g, MoverClass::Fast);
        assert_eq!(fast.len(), first.len());
    }

    #[test]
    fn test_cache_without_spawn_or_goal_is_inert() {
        let g = grid("path,path,path");
        let mut cache = PathCache::default();
        assert!(cache.route_for(&g, MoverClass::Normal).is_empty());
    }
}
