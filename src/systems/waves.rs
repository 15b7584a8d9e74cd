//! Wave composition, timed spawning, and wave completion.
//!
//! A [`WavePlan`] describes how many movers of each class a wave contains.
//! Levels 1 through 3 use fixed tables; past the last authored level the
//! plan is escalated by one normal, one heavy, and one fast mover per level,
//! without bound. [`WaveState`] tracks the running wave: the flattened spawn
//! queue, spawn timing, and the kill/leak tallies that decide completion.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{MoverBundle, MoverClass, PathRoute};
use crate::config::{PlayerState, SimClock, SimConfig};
use crate::path::PathCache;
use crate::terrain::TerrainResource;

/// Composition of one wave: mover class and count, in spawn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavePlan {
    counts: Vec<(MoverClass, u32)>,
}

impl WavePlan {
    pub fn new(counts: Vec<(MoverClass, u32)>) -> Self {
        Self { counts }
    }

    /// The authored plan for a level, or the endless-mode seed plan for
    /// levels past the last authored one.
    pub fn for_level(level: u32) -> Self {
        let counts = match level {
            1 => vec![(MoverClass::Normal, 10)],
            2 => vec![
                (MoverClass::Normal, 10),
                (MoverClass::Heavy, 5),
                (MoverClass::Fast, 2),
            ],
            3 => vec![
                (MoverClass::Normal, 5),
                (MoverClass::Heavy, 3),
                (MoverClass::Boss, 1),
            ],
            _ => vec![(MoverClass::Normal, 10)],
        };
        Self { counts }
    }

    /// The next endless-mode plan: one more normal, heavy, and fast mover.
    pub fn escalated(&self) -> Self {
        let mut counts = self.counts.clone();
        for class in [MoverClass::Normal, MoverClass::Heavy, MoverClass::Fast] {
            match counts.iter_mut().find(|(c, _)| *c == class) {
                Some((_, n)) => *n += 1,
                None => counts.push((class, 1)),
            }
        }
        Self { counts }
    }

    pub fn counts(&self) -> &[(MoverClass, u32)] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|&(_, n)| n as usize).sum()
    }

    /// Flatten into per-mover spawn order: classes in table order, each
    /// class exhausted before the next begins.
    pub fn build_queue(&self) -> Vec<MoverClass> {
        self.counts
            .iter()
            .flat_map(|&(class, n)| std::iter::repeat(class).take(n as usize))
            .collect()
    }
}

/// Running state of the current wave.
#[derive(Resource, Debug, Default)]
pub struct WaveState {
    queue: Vec<MoverClass>,
    /// Movers spawned so far; indexes the front of `queue`.
    pub spawned: usize,
    pub killed: u32,
    pub leaked: u32,
    pub started: bool,
    reward_granted: bool,
    last_spawn_ms: f64,
    next_mover_id: u32,
}

impl WaveState {
    /// Install a new plan and reset all per-wave counters. Mover ids keep
    /// counting up across waves.
    pub fn set_plan(&mut self, plan: &WavePlan) {
        self.queue = plan.build_queue();
        self.spawned = 0;
        self.killed = 0;
        self.leaked = 0;
        self.started = false;
        self.reward_granted = false;
        self.last_spawn_ms = 0.0;
    }

    /// Begin spawning. The first mover appears one spawn interval later.
    pub fn start(&mut self, now_ms: f64) {
        self.started = true;
        self.last_spawn_ms = now_ms;
    }

    pub fn total(&self) -> usize {
        self.queue.len()
    }

    /// Classes not yet spawned, aggregated in queue order.
    pub fn remaining_counts(&self) -> Vec<(MoverClass, u32)> {
        let mut counts: Vec<(MoverClass, u32)> = Vec::new();
        for &class in &self.queue[self.spawned.min(self.queue.len())..] {
            match counts.last_mut() {
                Some((c, n)) if *c == class => *n += 1,
                _ => counts.push((class, 1)),
            }
        }
        counts
    }

    /// A wave is complete once every queued mover has been accounted for,
    /// killed or leaked. An empty queue is never complete.
    pub fn level_complete(&self) -> bool {
        !self.queue.is_empty() && (self.killed + self.leaked) as usize == self.queue.len()
    }
}

/// Spawns the next queued mover whenever the spawn interval has elapsed.
pub fn wave_spawn_system(
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    terrain: Res<TerrainResource>,
    mut cache: ResMut<PathCache>,
    mut waves: ResMut<WaveState>,
    mut commands: Commands,
) {
    if !waves.started || waves.spawned >= waves.queue.len() {
        return;
    }
    if clock.now_ms - waves.last_spawn_ms < config.spawn_interval_ms {
        return;
    }

    let grid = terrain.grid();
    let class = waves.queue[waves.spawned];
    let route = cache.route_for(grid, class);
    let (x, y) = grid
        .spawn_cell()
        .map(|cell| grid.cell_center(cell))
        .unwrap_or((0.0, 0.0));

    let id = waves.next_mover_id;
    waves.next_mover_id += 1;
    commands.spawn(MoverBundle::new(id, class, x, y, PathRoute::new(route)));
    waves.spawned += 1;
    waves.last_spawn_ms = clock.now_ms;
    tracing::info!(
        id,
        class = class.as_str(),
        spawned = waves.spawned,
        total = waves.queue.len(),
        "mover spawned"
    );
}

/// Grants the level-completion reward once per wave and stops spawning.
pub fn wave_completion_system(
    config: Res<SimConfig>,
    mut waves: ResMut<WaveState>,
    mut players: ResMut<PlayerState>,
) {
    if waves.reward_granted || !waves.level_complete() {
        return;
    }
    waves.reward_granted = true;
    waves.started = false;
    players.money += config.level_complete_reward;
    tracing::info!(
        killed = waves.killed,
        leaked = waves.leaked,
        money = players.money,
        "wave complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::MoverId;
    use crate::terrain::TerrainGrid;

    #[test]
    fn test_authored_plans() {
        assert_eq!(WavePlan::for_level(1).total(), 10);
        assert_eq!(WavePlan::for_level(2).total(), 17);
        assert_eq!(WavePlan::for_level(3).total(), 9);
        assert_eq!(WavePlan::for_level(4).total(), 10);
    }

    #[test]
    fn test_escalation_grows_without_bound() {
        let mut plan = WavePlan::for_level(4);
        for _ in 0..3 {
            plan = plan.escalated();
        }
        // 13 normal, and heavy/fast introduced then grown to 3 each.
        assert_eq!(plan.total(), 19);
        assert!(plan
            .counts()
            .contains(&(MoverClass::Heavy, 3)));
        assert!(plan.counts().contains(&(MoverClass::Fast, 3)));
    }

    #[test]
    fn test_queue_spawns_classes_in_table_order() {
        let queue = WavePlan::for_level(2).build_queue();
        assert_eq!(queue.len(), 17);
        assert!(queue[..10].iter().all(|&c| c == MoverClass::Normal));
        assert!(queue[10..15].iter().all(|&c| c == MoverClass::Heavy));
        assert!(queue[15..].iter().all(|&c| c == MoverClass::Fast));
    }

    #[test]
    fn test_completion_counts_kills_and_leaks() {
        let mut state = WaveState::default();
        assert!(!state.level_complete(), "empty wave is never complete");
        state.set_plan(&WavePlan::new(vec![(MoverClass::Normal, 3)]));
        state.killed = 2;
        assert!(!state.level_complete());
        state.leaked = 1;
        assert!(state.level_complete());
    }

    fn setup() -> World {
        let grid = TerrainGrid::parse("start,path,finish", 64).unwrap();
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(SimClock::default());
        world.insert_resource(PlayerState::new(&SimConfig::default()));
        world.insert_resource(PathCache::default());
        world.insert_resource(TerrainResource::new(grid));
        let mut state = WaveState::default();
        state.set_plan(&WavePlan::new(vec![(MoverClass::Normal, 3)]));
        state.start(0.0);
        world.insert_resource(state);
        world
    }

    #[test]
    fn test_spawns_respect_interval() {
        let mut world = setup();
        let mut schedule = Schedule::default();
        schedule.add_systems(wave_spawn_system);

        let frame_ms = 1000.0 / 60.0;
        let mut spawned_at = Vec::new();
        for _ in 0..80 {
            world.resource_mut::<SimClock>().advance(frame_ms);
            schedule.run(&mut world);
            let mut query = world.query::<&MoverId>();
            let count = query.iter(&world).count();
            if spawned_at.len() < count {
                spawned_at.push(world.resource::<SimClock>().now_ms);
            }
        }

        assert_eq!(spawned_at.len(), 3, "whole queue spawned");
        assert!(spawned_at[0] >= 400.0);
        for pair in spawned_at.windows(2) {
            assert!(pair[1] - pair[0] >= 400.0);
        }

        // Queue exhausted: no further spawns.
        for _ in 0..60 {
            world.resource_mut::<SimClock>().advance(frame_ms);
            schedule.run(&mut world);
        }
        let mut query = world.query::<&MoverId>();
        assert_eq!(query.iter(&world).count(), 3);
    }

    #[test]
    fn test_mover_ids_are_unique_across_waves() {
        let mut world = setup();
        let mut schedule = Schedule::default();
        schedule.add_systems(wave_spawn_system);

        for _ in 0..200 {
            world.resource_mut::<SimClock>().advance(1000.0 / 60.0);
            schedule.run(&mut world);
        }
        let now = world.resource::<SimClock>().now_ms;
        {
            let mut waves = world.resource_mut::<WaveState>();
            waves.set_plan(&WavePlan::new(vec![(MoverClass::Fast, 2)]));
            waves.start(now);
        }
        for _ in 0..200 {
            world.resource_mut::<SimClock>().advance(1000.0 / 60.0);
            schedule.run(&mut world);
        }

        let mut query = world.query::<&MoverId>();
        let mut ids: Vec<u32> = query.iter(&world).map(|id| id.0).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_completion_reward_granted_once() {
        let mut world = setup();
        let mut schedule = Schedule::default();
        schedule.add_systems(wave_completion_system);

        world.resource_mut::<WaveState>().killed = 3;
        let before = world.resource::<PlayerState>().money;
        schedule.run(&mut world);
        schedule.run(&mut world);

        let players = world.resource::<PlayerState>();
        assert_eq!(players.money, before + 500);
        assert!(!world.resource::<WaveState>().started);
    }
}
