//! Snapshot and save-game serialization.
//!
//! A [`Snapshot`] is a read-only view of the live world for renderers and
//! debugging: every mover and turret with its transient combat state, plus
//! the player and wave tallies. A [`SaveState`] is the smaller durable form:
//! level number, player economy, placed turrets, and the not-yet-finished
//! wave composition. Restoring a save rebuilds turrets in place and queues
//! the saved composition as a fresh wave; movers in flight are not persisted.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::config::{PlayerState, SimClock};
use crate::systems::waves::WaveState;
use crate::terrain::Cell;

/// Full per-tick view of the simulation, serializable to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub now_ms: f64,
    pub level: u32,
    pub base_hp: i32,
    pub money: u32,
    pub wave: WaveSnapshot,
    pub movers: Vec<MoverSnapshot>,
    pub turrets: Vec<TurretSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveSnapshot {
    pub started: bool,
    pub spawned: usize,
    pub total: usize,
    pub killed: u32,
    pub leaked: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoverSnapshot {
    pub id: u32,
    pub class: MoverClass,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub facing: f32,
    /// Waypoint index along the route.
    pub progress: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurretSnapshot {
    pub cell: Cell,
    pub kind: TurretKind,
    pub tier: TurretTier,
    pub x: f32,
    pub y: f32,
    pub facing: f32,
    pub selected: bool,
    /// Id of the mover fired at this tick, if any.
    pub target: Option<u32>,
}

impl Snapshot {
    /// Capture the current state of the world. Ordered by mover id and by
    /// turret cell so the output is stable across runs.
    pub fn from_world(world: &mut World, level: u32) -> Self {
        let clock = *world.resource::<SimClock>();
        let players = *world.resource::<PlayerState>();
        let wave = {
            let waves = world.resource::<WaveState>();
            WaveSnapshot {
                started: waves.started,
                spawned: waves.spawned,
                total: waves.total(),
                killed: waves.killed,
                leaked: waves.leaked,
            }
        };

        let mut mover_query =
            world.query::<(&MoverId, &MoverClass, &Position, &Health, &Facing, &PathRoute)>();
        let mut movers: Vec<MoverSnapshot> = mover_query
            .iter(world)
            .map(|(id, class, pos, health, facing, route)| MoverSnapshot {
                id: id.0,
                class: *class,
                x: pos.x,
                y: pos.y,
                hp: health.current,
                max_hp: health.max,
                facing: facing.0,
                progress: route.progress(),
            })
            .collect();
        movers.sort_by_key(|m| m.id);

        let mut locks: Vec<Option<Entity>> = Vec::new();
        let mut turrets: Vec<TurretSnapshot> = Vec::new();
        {
            let mut query = world.query::<(
                &TilePos,
                &TurretKind,
                &TurretTier,
                &Position,
                &Facing,
                &Selected,
                &TargetLock,
            )>();
            for (tile, kind, tier, pos, facing, selected, lock) in query.iter(world) {
                locks.push(lock.0);
                turrets.push(TurretSnapshot {
                    cell: tile.0,
                    kind: *kind,
                    tier: *tier,
                    x: pos.x,
                    y: pos.y,
                    facing: facing.0,
                    selected: selected.0,
                    target: None,
                });
            }
        }
        // Resolve target entities to mover ids outside the query borrow.
        for (snapshot, lock) in turrets.iter_mut().zip(locks) {
            snapshot.target = lock
                .and_then(|entity| world.get::<MoverId>(entity))
                .map(|id| id.0);
        }
        turrets.sort_by_key(|t| (t.cell.y, t.cell.x));

        Self {
            tick: clock.tick,
            now_ms: clock.now_ms,
            level,
            base_hp: players.base_hp,
            money: players.money,
            wave,
            movers,
            turrets,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A placed turret as persisted in a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurretSave {
    pub cell: Cell,
    pub kind: TurretKind,
    pub tier: TurretTier,
}

/// Durable save-game form. Movers in flight are deliberately dropped; the
/// unspawned remainder of the wave is saved as a composition and re-queued
/// on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub level: u32,
    pub base_hp: i32,
    pub money: u32,
    pub composition: Vec<(MoverClass, u32)>,
    pub turrets: Vec<TurretSave>,
}

impl SaveState {
    pub fn from_world(world: &mut World, level: u32) -> Self {
        let players = *world.resource::<PlayerState>();
        let composition = world.resource::<WaveState>().remaining_counts();
        let mut turret_query = world.query::<(&TilePos, &TurretKind, &TurretTier)>();
        let mut turrets: Vec<TurretSave> = turret_query
            .iter(world)
            .map(|(tile, kind, tier)| TurretSave {
                cell: tile.0,
                kind: *kind,
                tier: *tier,
            })
            .collect();
        turrets.sort_by_key(|t| (t.cell.y, t.cell.x));

        Self {
            level,
            base_hp: players.base_hp,
            money: players.money,
            composition,
            turrets,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
