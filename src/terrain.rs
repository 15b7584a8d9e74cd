//! Terrain grid - tile classes, movement costs, and line of sight.
//!
//! The level is a rectangular, row-major grid of terrain classes fixed at
//! load time. Terrain determines traversal cost per mover class, where
//! turrets may be built, and which tiles occlude turret sightlines.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::components::MoverClass;

/// A grid cell address (column, row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Failure to build a terrain grid from the loader's layout text.
///
/// Unknown terrain tokens are *not* errors; they fall back to
/// [`TerrainClass::Grass`] with a warning. Only a layout the core cannot
/// simulate on is fatal.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level layout is empty")]
    Empty,
    #[error("level row {row} has {found} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Terrain class of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainClass {
    /// Open ground - impassable to movers, the only buildable class.
    Grass,
    /// Road - normal traversal.
    Path,
    /// Marsh - slow traversal, except for fast movers.
    Marsh,
    /// Mover entry point.
    Spawn,
    /// Mover destination.
    Goal,
    /// Blocking - impassable.
    Forest,
    /// Blocking - impassable and opaque to turret sightlines.
    Mountain,
}

impl Default for TerrainClass {
    fn default() -> Self {
        Self::Grass
    }
}

impl TerrainClass {
    /// Parse a loader token. Returns `None` for unknown tokens so the caller
    /// can log and pick a fallback.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "grass" => Some(Self::Grass),
            "path" => Some(Self::Path),
            "marsh" => Some(Self::Marsh),
            "start" => Some(Self::Spawn),
            "finish" => Some(Self::Goal),
            "forest" => Some(Self::Forest),
            "mountain" => Some(Self::Mountain),
            _ => None,
        }
    }

    /// Movement cost charged when a mover enters a tile of this class.
    ///
    /// Deterministic and pure. `INFINITY` marks the tile impassable for that
    /// mover; the pathfinder never expands such edges.
    pub fn movement_cost(self, mover: MoverClass) -> f32 {
        match self {
            TerrainClass::Path | TerrainClass::Spawn | TerrainClass::Goal => 1.0,
            TerrainClass::Marsh => {
                if mover == MoverClass::Fast {
                    1.0
                } else {
                    2.0
                }
            }
            TerrainClass::Grass | TerrainClass::Forest | TerrainClass::Mountain => f32::INFINITY,
        }
    }

    /// Speed multiplier applied to a mover standing on a tile of this class.
    pub fn speed_multiplier(self, mover: MoverClass) -> f32 {
        let cost = self.movement_cost(mover);
        if cost.is_finite() {
            1.0 / cost
        } else {
            0.0
        }
    }

    /// Whether a turret may be placed on this class.
    pub fn is_buildable(self) -> bool {
        matches!(self, TerrainClass::Grass)
    }

    /// Whether this class occludes turret line of sight.
    pub fn blocks_sight(self) -> bool {
        matches!(self, TerrainClass::Mountain)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerrainClass::Grass => "grass",
            TerrainClass::Path => "path",
            TerrainClass::Marsh => "marsh",
            TerrainClass::Spawn => "start",
            TerrainClass::Goal => "finish",
            TerrainClass::Forest => "forest",
            TerrainClass::Mountain => "mountain",
        }
    }
}

/// Rectangular tile grid, immutable after level load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    /// Width of the grid in cells.
    pub width: usize,
    /// Height of the grid in cells.
    pub height: usize,
    /// Edge length of a tile in pixels.
    pub tile_size: u32,
    /// Grid cells (row-major order).
    cells: Vec<TerrainClass>,
}

impl TerrainGrid {
    /// An empty 0x0 grid, used before any level has been loaded.
    pub fn empty(tile_size: u32) -> Self {
        Self {
            width: 0,
            height: 0,
            tile_size,
            cells: Vec::new(),
        }
    }

    /// Build a grid from explicit rows. Used by tests and programmatic levels.
    pub fn from_rows(rows: Vec<Vec<TerrainClass>>, tile_size: u32) -> Result<Self, LevelError> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(LevelError::Empty);
        }
        let width = rows[0].len();
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(LevelError::RaggedRow {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
        }
        let height = rows.len();
        Ok(Self {
            width,
            height,
            tile_size,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    /// Parse the loader's comma-delimited layout text.
    ///
    /// Unknown tokens fall back to grass with a warning; an empty or ragged
    /// layout is a fatal load error and the level must not start.
    pub fn parse(text: &str, tile_size: u32) -> Result<Self, LevelError> {
        let mut rows = Vec::new();
        for (y, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut row = Vec::new();
            for token in line.split(',') {
                let token = token.trim();
                let class = TerrainClass::from_token(token).unwrap_or_else(|| {
                    tracing::warn!(row = y, token, "unknown terrain token, using grass");
                    TerrainClass::Grass
                });
                row.push(class);
            }
            rows.push(row);
        }
        Self::from_rows(rows, tile_size)
    }

    fn cell_index(&self, cell: Cell) -> Option<usize> {
        if cell.x < self.width && cell.y < self.height {
            Some(cell.y * self.width + cell.x)
        } else {
            None
        }
    }

    /// Terrain class at a cell, bounds-checked.
    pub fn class_at(&self, cell: Cell) -> Option<TerrainClass> {
        self.cell_index(cell).map(|i| self.cells[i])
    }

    /// First cell of the given class in row-major order (increasing y, then x).
    pub fn find_first(&self, class: TerrainClass) -> Option<Cell> {
        self.cells
            .iter()
            .position(|&c| c == class)
            .map(|i| Cell::new(i % self.width, i / self.width))
    }

    /// The mover entry cell, if the level has one.
    pub fn spawn_cell(&self) -> Option<Cell> {
        self.find_first(TerrainClass::Spawn)
    }

    /// The mover destination cell, if the level has one.
    pub fn goal_cell(&self) -> Option<Cell> {
        self.find_first(TerrainClass::Goal)
    }

    /// Movement cost for entering `cell` with the given mover class.
    pub fn cost_at(&self, cell: Cell, mover: MoverClass) -> Option<f32> {
        self.class_at(cell).map(|c| c.movement_cost(mover))
    }

    /// Pixel coordinates of a cell's center.
    pub fn cell_center(&self, cell: Cell) -> (f32, f32) {
        let half = self.tile_size as f32 / 2.0;
        (
            cell.x as f32 * self.tile_size as f32 + half,
            cell.y as f32 * self.tile_size as f32 + half,
        )
    }

    /// Cell containing a pixel position, bounds-checked.
    pub fn cell_at_pixel(&self, x: f32, y: f32) -> Option<Cell> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let cell = Cell::new(
            (x / self.tile_size as f32) as usize,
            (y / self.tile_size as f32) as usize,
        );
        self.cell_index(cell).map(|_| cell)
    }

    /// Whether a straight shot from `a` to `b` is unobstructed.
    ///
    /// Rasterizes the segment with Bresenham's algorithm; every intermediate
    /// cell (excluding both endpoints) must not be sight-blocking.
    pub fn sight_clear(&self, a: Cell, b: Cell) -> bool {
        let line = line_cells(a, b);
        for cell in line.iter().skip(1).take(line.len().saturating_sub(2)) {
            if let Some(class) = self.class_at(*cell) {
                if class.blocks_sight() {
                    return false;
                }
            }
        }
        true
    }
}

/// Cells on the discrete line segment from `a` to `b`, endpoints inclusive.
pub fn line_cells(a: Cell, b: Cell) -> Vec<Cell> {
    let (mut x0, mut y0) = (a.x as i64, a.y as i64);
    let (x1, y1) = (b.x as i64, b.y as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut cells = Vec::new();
    loop {
        cells.push(Cell::new(x0 as usize, y0 as usize));
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
    cells
}

/// Resource wrapper for the terrain grid.
///
/// The grid is immutable for the lifetime of a level, so systems share it
/// through an `Arc` without locking.
#[derive(Resource, Clone)]
pub struct TerrainResource(pub Arc<TerrainGrid>);

impl TerrainResource {
    pub fn new(grid: TerrainGrid) -> Self {
        Self(Arc::new(grid))
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.0
    }
}
