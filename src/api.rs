//! Public simulation facade.
//!
//! [`SimWorld`] owns the ECS world and the fixed system schedule and exposes
//! the operations a frontend needs: load a level, queue and start waves,
//! place and upgrade turrets, step the simulation one tick at a time, and
//! serialize snapshots and saves. All mutation goes through this type; the
//! frontend never touches the ECS directly.

use bevy_ecs::prelude::*;
use std::sync::Arc;

use crate::components::*;
use crate::config::{PlayerState, SimClock, SimConfig};
use crate::path::PathCache;
use crate::spatial::{spatial_grid_update_system, SpatialGrid};
use crate::systems::{
    engagement_system, movement_system, mover_reaper_system, wave_completion_system,
    wave_spawn_system, WavePlan, WaveState,
};
use crate::terrain::{Cell, LevelError, TerrainGrid, TerrainResource};
use crate::world::{SaveState, Snapshot, TurretSave};

/// Campaign status as seen by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Playing,
    Victory,
    Defeat,
}

/// The simulation: ECS world, system schedule, and current level number.
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    config: SimConfig,
    level: u32,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::new();
        world.insert_resource(config.clone());
        world.insert_resource(SimClock::default());
        world.insert_resource(PlayerState::new(&config));
        world.insert_resource(WaveState::default());
        world.insert_resource(PathCache::default());
        world.insert_resource(SpatialGrid::default());
        world.insert_resource(TerrainResource::new(TerrainGrid::empty(config.tile_size)));

        // One fixed chain per tick. Commands from each system are applied
        // before the next system runs, so spawns and despawns are visible
        // within the same tick.
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                wave_spawn_system,
                spatial_grid_update_system,
                movement_system,
                engagement_system,
                mover_reaper_system,
                wave_completion_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            config,
            level: 1,
        }
    }

    /// Advance the simulation by exactly one tick.
    pub fn tick(&mut self) {
        let frame_ms = self.config.frame_ms;
        self.world.resource_mut::<SimClock>().advance(frame_ms);
        self.schedule.run(&mut self.world);
    }

    /// Load a level layout and queue its wave.
    ///
    /// Movers in flight are discarded and routes are replanned; placed
    /// turrets persist across levels. Past the last authored level the wave
    /// escalates by one normal, heavy, and fast mover per level.
    pub fn load_level(&mut self, level: u32, layout: &str) -> Result<(), LevelError> {
        let grid = TerrainGrid::parse(layout, self.config.tile_size)?;
        self.level = level;
        self.world.insert_resource(TerrainResource::new(grid));
        self.world.resource_mut::<PathCache>().clear();
        self.despawn_movers();

        let mut plan = WavePlan::for_level(level);
        if level > self.config.final_level {
            for _ in 0..level.saturating_sub(self.config.final_level + 1) {
                plan = plan.escalated();
            }
        }
        self.queue_wave(plan);
        tracing::info!(level, "level loaded");
        Ok(())
    }

    /// Replace the queued wave without starting it.
    pub fn queue_wave(&mut self, plan: WavePlan) {
        self.world.resource_mut::<WaveState>().set_plan(&plan);
    }

    /// Begin spawning the queued wave. The first mover appears one spawn
    /// interval after this call.
    pub fn start_wave(&mut self) {
        let now = self.world.resource::<SimClock>().now_ms;
        self.world.resource_mut::<WaveState>().start(now);
    }

    /// Place a turret of `kind` on a grid cell.
    ///
    /// Rejected (returning `false`, charging nothing) when the cell is not
    /// buildable terrain, already holds a turret, or the player cannot
    /// afford it.
    pub fn place_turret(&mut self, kind: TurretKind, cell: Cell) -> bool {
        let terrain = self.world.resource::<TerrainResource>().clone();
        let buildable = terrain
            .grid()
            .class_at(cell)
            .map(|class| class.is_buildable())
            .unwrap_or(false);
        if !buildable {
            tracing::warn!(x = cell.x, y = cell.y, "cell is not buildable");
            return false;
        }
        if self.turret_at(cell).is_some() {
            tracing::warn!(x = cell.x, y = cell.y, "cell already holds a turret");
            return false;
        }
        {
            let mut players = self.world.resource_mut::<PlayerState>();
            if players.money < self.config.buy_cost {
                tracing::warn!(money = players.money, "cannot afford turret");
                return false;
            }
            players.money -= self.config.buy_cost;
        }

        let center = terrain.grid().cell_center(cell);
        let now = self.world.resource::<SimClock>().now_ms;
        self.world.spawn(TurretBundle::new(kind, cell, center, now));
        tracing::info!(kind = kind.as_str(), x = cell.x, y = cell.y, "turret placed");
        true
    }

    /// Upgrade the turret on `cell` to its second tier.
    ///
    /// Rejected when no turret is there, it is already upgraded, or the
    /// player cannot afford it. The firing cooldown is not reset.
    pub fn upgrade_turret(&mut self, cell: Cell) -> bool {
        let Some(entity) = self.turret_at(cell) else {
            tracing::warn!(x = cell.x, y = cell.y, "no turret to upgrade");
            return false;
        };
        if self.world.get::<TurretTier>(entity) != Some(&TurretTier::Base) {
            tracing::warn!(x = cell.x, y = cell.y, "turret is already upgraded");
            return false;
        }
        {
            let mut players = self.world.resource_mut::<PlayerState>();
            if players.money < self.config.upgrade_cost {
                tracing::warn!(money = players.money, "cannot afford upgrade");
                return false;
            }
            players.money -= self.config.upgrade_cost;
        }

        let kind = *self
            .world
            .get::<TurretKind>(entity)
            .unwrap_or(&TurretKind::MachineGun);
        self.world
            .entity_mut(entity)
            .insert((TurretTier::Upgraded, kind.stats(TurretTier::Upgraded)));
        tracing::info!(kind = kind.as_str(), x = cell.x, y = cell.y, "turret upgraded");
        true
    }

    /// Mark the turret under a pixel position as selected, clearing any
    /// previous selection. Returns the cell of the selected turret.
    pub fn select_turret_at(&mut self, x: f32, y: f32) -> Option<Cell> {
        let cell = self
            .world
            .resource::<TerrainResource>()
            .grid()
            .cell_at_pixel(x, y)?;
        let target = self.turret_at(cell);
        let mut query = self.world.query::<(Entity, &mut Selected)>();
        let mut selected = None;
        for (entity, mut flag) in query.iter_mut(&mut self.world) {
            flag.0 = Some(entity) == target;
            if flag.0 {
                selected = Some(cell);
            }
        }
        selected
    }

    pub fn clear_selection(&mut self) {
        let mut query = self.world.query::<&mut Selected>();
        for mut flag in query.iter_mut(&mut self.world) {
            flag.0 = false;
        }
    }

    /// Remove every placed turret. No refund is given.
    pub fn reset_turrets(&mut self) {
        let mut query = self.world.query_filtered::<Entity, With<TurretKind>>();
        let turrets: Vec<Entity> = query.iter(&self.world).collect();
        for entity in turrets {
            self.world.despawn(entity);
        }
    }

    /// Whether the queued wave has been fully resolved.
    pub fn level_complete(&self) -> bool {
        self.world.resource::<WaveState>().level_complete()
    }

    /// Campaign status. Defeat wins over victory when both hold on the same
    /// tick. Completing a level past the final one is endless mode, not
    /// victory; play continues with escalated waves.
    pub fn outcome(&self) -> Outcome {
        if self.world.resource::<PlayerState>().is_defeated() {
            Outcome::Defeat
        } else if self.level == self.config.final_level && self.level_complete() {
            Outcome::Victory
        } else {
            Outcome::Playing
        }
    }

    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.level)
    }

    pub fn snapshot_json(&mut self) -> serde_json::Result<String> {
        self.snapshot().to_json()
    }

    pub fn save_state(&mut self) -> SaveState {
        SaveState::from_world(&mut self.world, self.level)
    }

    /// Rebuild the simulation from a save on the given level layout.
    ///
    /// Turrets are respawned at their saved cells and tiers with a fresh
    /// cooldown; the saved wave composition is queued but not started.
    pub fn restore_state(&mut self, save: &SaveState, layout: &str) -> Result<(), LevelError> {
        self.load_level(save.level, layout)?;
        self.reset_turrets();
        {
            let mut players = self.world.resource_mut::<PlayerState>();
            players.base_hp = save.base_hp;
            players.money = save.money;
        }
        self.queue_wave(WavePlan::new(save.composition.clone()));

        let terrain = self.world.resource::<TerrainResource>().clone();
        let now = self.world.resource::<SimClock>().now_ms;
        for &TurretSave { cell, kind, tier } in &save.turrets {
            let center = terrain.grid().cell_center(cell);
            let mut bundle = TurretBundle::new(kind, cell, center, now);
            bundle.tier = tier;
            bundle.stats = kind.stats(tier);
            self.world.spawn(bundle);
        }
        tracing::info!(level = save.level, turrets = save.turrets.len(), "save restored");
        Ok(())
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn money(&self) -> u32 {
        self.world.resource::<PlayerState>().money
    }

    pub fn base_hp(&self) -> i32 {
        self.world.resource::<PlayerState>().base_hp
    }

    pub fn now_ms(&self) -> f64 {
        self.world.resource::<SimClock>().now_ms
    }

    pub fn current_tick(&self) -> u64 {
        self.world.resource::<SimClock>().tick
    }

    pub fn mover_count(&mut self) -> usize {
        let mut query = self.world.query::<&MoverId>();
        query.iter(&self.world).count()
    }

    pub fn terrain(&self) -> Arc<TerrainGrid> {
        self.world.resource::<TerrainResource>().0.clone()
    }

    /// Direct world access for tests and tooling.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn despawn_movers(&mut self) {
        let mut query = self.world.query_filtered::<Entity, With<MoverId>>();
        let movers: Vec<Entity> = query.iter(&self.world).collect();
        for entity in movers {
            self.world.despawn(entity);
        }
    }

    fn turret_at(&mut self, cell: Cell) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &TilePos)>();
        query
            .iter(&self.world)
            .find(|(_, tile)| tile.0 == cell)
            .map(|(entity, _)| entity)
    }
}
