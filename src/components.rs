//! ECS components for the tower-defense simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::terrain::Cell;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D pixel position on the playfield (y grows downward, screen convention).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Facing angle in degrees, derived from the movement or aim direction.
/// Purely cosmetic; the renderer uses it to orient sprites.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Facing(pub f32);

impl Facing {
    /// Angle for a direction vector in screen coordinates (y down).
    pub fn from_direction(dx: f32, dy: f32) -> Self {
        Self((-dy).atan2(dx).to_degrees())
    }
}

// ============================================================================
// MOVER COMPONENTS
// ============================================================================

/// Unique identifier for a mover, assigned at spawn.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoverId(pub u32);

/// Mover class tier. Determines hit points and base speed, and whether marsh
/// terrain slows the mover down.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoverClass {
    Normal,
    Heavy,
    Fast,
    Boss,
}

impl MoverClass {
    /// Starting hit points for this class.
    pub fn base_hp(self) -> i32 {
        match self {
            MoverClass::Normal => 10,
            MoverClass::Heavy => 20,
            MoverClass::Fast => 3,
            MoverClass::Boss => 50,
        }
    }

    /// Base speed in pixels per tick.
    pub fn base_speed(self) -> f32 {
        match self {
            MoverClass::Normal => 2.0,
            MoverClass::Heavy => 2.0,
            MoverClass::Fast => 4.0,
            MoverClass::Boss => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MoverClass::Normal => "normal",
            MoverClass::Heavy => "heavy",
            MoverClass::Fast => "fast",
            MoverClass::Boss => "boss",
        }
    }
}

/// Hit points of a mover.
///
/// Damage application does not clamp: `current` can go below zero. Death is
/// detected as `current <= 0` by the reaper on the next evaluation, which
/// guarantees the kill reward is credited exactly once.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn damage(&mut self, amount: i32) {
        self.current -= amount;
    }
}

/// The waypoint path a mover follows, planned once at spawn.
///
/// `cells` runs from the spawn cell to the goal cell inclusive; an empty
/// path means the level is degenerate (no spawn, no goal, or no route) and
/// the mover sits inert. Terrain changes after spawn never replan the route.
#[derive(Component, Debug, Clone)]
pub struct PathRoute {
    cells: Arc<[Cell]>,
    next: usize,
}

impl PathRoute {
    pub fn new(cells: Arc<[Cell]>) -> Self {
        Self { cells, next: 0 }
    }

    /// Route with no waypoints; the mover never moves.
    pub fn inert() -> Self {
        Self::new(Vec::new().into())
    }

    /// The waypoint currently being walked toward, if any remain.
    pub fn current_waypoint(&self) -> Option<Cell> {
        self.cells.get(self.next).copied()
    }

    /// The cell the mover is departing from. Terrain speed modifiers read
    /// this cell, never the destination cell.
    pub fn departing_cell(&self) -> Option<Cell> {
        if self.next == 0 {
            self.cells.first().copied()
        } else {
            self.cells.get(self.next - 1).copied()
        }
    }

    /// Advance to the next waypoint after the current one has been reached.
    pub fn advance(&mut self) {
        self.next += 1;
    }

    /// Index of the current waypoint; higher means further along the route.
    pub fn progress(&self) -> usize {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

/// Bundle for spawning a complete mover entity.
#[derive(Bundle)]
pub struct MoverBundle {
    pub id: MoverId,
    pub class: MoverClass,
    pub position: Position,
    pub health: Health,
    pub route: PathRoute,
    pub facing: Facing,
}

impl MoverBundle {
    pub fn new(id: u32, class: MoverClass, x: f32, y: f32, route: PathRoute) -> Self {
        Self {
            id: MoverId(id),
            class,
            position: Position::new(x, y),
            health: Health::new(class.base_hp()),
            route,
            facing: Facing::default(),
        }
    }
}

// ============================================================================
// TURRET COMPONENTS
// ============================================================================

/// Base type of a turret.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurretKind {
    MachineGun,
    Rocket,
    Cannon,
}

impl TurretKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TurretKind::MachineGun => "machine_gun",
            TurretKind::Rocket => "rocket",
            TurretKind::Cannon => "cannon",
        }
    }

    /// Combat stats for this kind at the given tier. Static lookup keyed by
    /// the explicit (kind, tier) pair.
    pub fn stats(self, tier: TurretTier) -> TurretStats {
        match (self, tier) {
            (TurretKind::MachineGun, TurretTier::Base) => TurretStats::new(100.0, 500.0, 1),
            (TurretKind::MachineGun, TurretTier::Upgraded) => TurretStats::new(150.0, 250.0, 2),
            (TurretKind::Rocket, TurretTier::Base) => TurretStats::new(150.0, 1500.0, 2),
            (TurretKind::Rocket, TurretTier::Upgraded) => TurretStats::new(200.0, 1000.0, 4),
            (TurretKind::Cannon, TurretTier::Base) => TurretStats::new(125.0, 1000.0, 2),
            (TurretKind::Cannon, TurretTier::Upgraded) => TurretStats::new(150.0, 500.0, 3),
        }
    }
}

/// Upgrade tier of a turret. Exactly one upgrade exists per turret.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurretTier {
    Base,
    Upgraded,
}

impl TurretTier {
    pub fn as_str(self) -> &'static str {
        match self {
            TurretTier::Base => "base",
            TurretTier::Upgraded => "upgraded",
        }
    }
}

/// Effective combat stats of a turret. Rewritten from the static lookup when
/// the turret is upgraded.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurretStats {
    /// Engagement radius in pixels.
    pub range: f32,
    /// Cooldown between successful shots in milliseconds.
    pub attack_interval_ms: f64,
    /// Hit points subtracted per hit.
    pub damage: i32,
}

impl TurretStats {
    pub fn new(range: f32, attack_interval_ms: f64, damage: i32) -> Self {
        Self {
            range,
            attack_interval_ms,
            damage,
        }
    }
}

/// The grid cell a turret occupies. At most one turret per cell.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos(pub Cell);

/// Cooldown bookkeeping. Stamped with the current simulation time when the
/// turret is created; never reset by upgrades.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FireState {
    pub last_fire_ms: f64,
}

impl FireState {
    pub fn new(now_ms: f64) -> Self {
        Self { last_fire_ms: now_ms }
    }

    pub fn ready(&self, now_ms: f64, interval_ms: f64) -> bool {
        now_ms - self.last_fire_ms >= interval_ms
    }
}

/// The mover a turret fired at this tick. A lookup relationship, not
/// ownership: cleared at the start of every engagement pass and re-resolved.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct TargetLock(pub Option<Entity>);

/// UI selection flag. Advisory only; the core never reads it.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Selected(pub bool);

/// Bundle for spawning a complete turret entity.
#[derive(Bundle)]
pub struct TurretBundle {
    pub kind: TurretKind,
    pub tier: TurretTier,
    pub stats: TurretStats,
    pub tile: TilePos,
    pub position: Position,
    pub fire: FireState,
    pub lock: TargetLock,
    pub facing: Facing,
    pub selected: Selected,
}

impl TurretBundle {
    pub fn new(kind: TurretKind, cell: Cell, center: (f32, f32), now_ms: f64) -> Self {
        Self {
            kind,
            tier: TurretTier::Base,
            stats: kind.stats(TurretTier::Base),
            tile: TilePos(cell),
            position: Position::new(center.0, center.1),
            fire: FireState::new(now_ms),
            lock: TargetLock::default(),
            facing: Facing::default(),
            selected: Selected::default(),
        }
    }
}
