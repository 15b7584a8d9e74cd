//! Turret target selection and firing.
//!
//! Each tick every turret whose cooldown has elapsed queries the spatial grid
//! for movers in range, picks the one furthest along its route, checks line
//! of sight, and applies damage instantly. Damage lands the same tick the
//! shot is decided; there are no projectiles in flight. A shot that cannot be
//! taken (no target, sight blocked, target already dead) leaves the cooldown
//! untouched, so the turret retries on the very next tick.

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::config::SimClock;
use crate::spatial::{SpatialEntry, SpatialGrid};
use crate::terrain::TerrainResource;

pub fn engagement_system(
    clock: Res<SimClock>,
    terrain: Res<TerrainResource>,
    grid: Res<SpatialGrid>,
    mut turrets: Query<(
        &TilePos,
        &Position,
        &TurretKind,
        &TurretStats,
        &mut FireState,
        &mut TargetLock,
        &mut Facing,
    )>,
    mut movers: Query<&mut Health, With<MoverClass>>,
) {
    let terrain = terrain.grid();

    for (tile, pos, kind, stats, mut fire, mut lock, mut facing) in turrets.iter_mut() {
        lock.0 = None;
        if !fire.ready(clock.now_ms, stats.attack_interval_ms) {
            continue;
        }

        let candidates = grid.query_radius(pos.x, pos.y, stats.range);
        // Highest route progress wins; candidates arrive sorted by distance,
        // and a strictly-greater comparison keeps the closer one on ties.
        let mut best: Option<&SpatialEntry> = None;
        for entry in &candidates {
            if best.map_or(true, |b| entry.progress > b.progress) {
                best = Some(entry);
            }
        }
        let Some(target) = best else {
            continue;
        };

        let Some(target_cell) = terrain.cell_at_pixel(target.x, target.y) else {
            continue;
        };
        if !terrain.sight_clear(tile.0, target_cell) {
            continue;
        }

        // The spatial grid is rebuilt before this system runs, but the
        // target may still have despawned at an earlier sync point.
        let Ok(mut health) = movers.get_mut(target.entity) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }

        health.damage(stats.damage);
        fire.last_fire_ms = clock.now_ms;
        *facing = Facing::from_direction(target.x - pos.x, target.y - pos.y);
        lock.0 = Some(target.entity);
        tracing::debug!(
            kind = kind.as_str(),
            x = tile.0.x,
            y = tile.0.y,
            damage = stats.damage,
            "turret fired"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::spatial_grid_update_system;
    use crate::terrain::{Cell, TerrainGrid};

    fn setup(layout: &str) -> (World, Schedule) {
        let grid = TerrainGrid::parse(layout, 64).unwrap();
        let mut world = World::new();
        world.insert_resource(SimClock::default());
        world.insert_resource(SpatialGrid::default());
        world.insert_resource(TerrainResource::new(grid));
        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_grid_update_system, engagement_system).chain());
        (world, schedule)
    }

    fn step(world: &mut World, schedule: &mut Schedule, frame_ms: f64) {
        world.resource_mut::<SimClock>().advance(frame_ms);
        schedule.run(world);
    }

    fn spawn_turret(world: &mut World, cell: Cell, stats: TurretStats) {
        let center = (cell.x as f32 * 64.0 + 32.0, cell.y as f32 * 64.0 + 32.0);
        let mut bundle = TurretBundle::new(TurretKind::MachineGun, cell, center, 0.0);
        bundle.stats = stats;
        world.spawn(bundle);
    }

    fn mover_hp(world: &mut World) -> i32 {
        let mut query = world.query_filtered::<&Health, With<MoverClass>>();
        query.single(world).current
    }

    #[test]
    fn test_machine_gun_fires_every_500ms() {
        let (mut world, mut schedule) = setup("grass,grass,grass");
        spawn_turret(&mut world, Cell::new(0, 0), TurretStats::new(100.0, 500.0, 2));
        world.spawn(MoverBundle::new(
            0,
            MoverClass::Normal,
            96.0,
            32.0,
            PathRoute::inert(),
        ));

        // 2500 ms in 100 ms steps: shots land at 500..2500, five hits of 2
        // against 10 hp.
        for _ in 0..4 {
            step(&mut world, &mut schedule, 100.0);
        }
        assert_eq!(mover_hp(&mut world), 10, "no shot before the cooldown elapses");
        for _ in 0..21 {
            step(&mut world, &mut schedule, 100.0);
        }
        assert_eq!(mover_hp(&mut world), 0);
    }

    #[test]
    fn test_cooldown_spacing() {
        let (mut world, mut schedule) = setup("grass,grass,grass");
        spawn_turret(&mut world, Cell::new(0, 0), TurretStats::new(100.0, 500.0, 1));
        world.spawn(MoverBundle::new(
            0,
            MoverClass::Boss,
            96.0,
            32.0,
            PathRoute::inert(),
        ));

        let mut last_hit_ms = f64::NEG_INFINITY;
        let mut previous_hp = 50;
        for _ in 0..120 {
            step(&mut world, &mut schedule, 1000.0 / 60.0);
            let hp = mover_hp(&mut world);
            if hp < previous_hp {
                let now = world.resource::<SimClock>().now_ms;
                assert!(
                    now - last_hit_ms >= 500.0,
                    "hits closer than the cooldown: {last_hit_ms} then {now}"
                );
                last_hit_ms = now;
                previous_hp = hp;
            }
        }
        assert!(previous_hp < 50, "turret never fired");
    }

    #[test]
    fn test_mountain_blocks_line_of_sight() {
        let (mut world, mut schedule) = setup("grass,mountain,grass");
        spawn_turret(&mut world, Cell::new(0, 0), TurretStats::new(300.0, 500.0, 2));
        world.spawn(MoverBundle::new(
            0,
            MoverClass::Normal,
            160.0,
            32.0,
            PathRoute::inert(),
        ));

        for _ in 0..60 {
            step(&mut world, &mut schedule, 100.0);
        }
        assert_eq!(mover_hp(&mut world), 10, "shot through a mountain");
    }

    #[test]
    fn test_forest_does_not_block_line_of_sight() {
        let (mut world, mut schedule) = setup("grass,forest,grass");
        spawn_turret(&mut world, Cell::new(0, 0), TurretStats::new(300.0, 500.0, 2));
        world.spawn(MoverBundle::new(
            0,
            MoverClass::Normal,
            160.0,
            32.0,
            PathRoute::inert(),
        ));

        for _ in 0..10 {
            step(&mut world, &mut schedule, 100.0);
        }
        assert!(mover_hp(&mut world) < 10);
    }

    #[test]
    fn test_targets_mover_furthest_along_route() {
        let (mut world, mut schedule) = setup("grass,grass,grass,grass,grass");
        spawn_turret(&mut world, Cell::new(0, 0), TurretStats::new(400.0, 500.0, 1));

        let cells: std::sync::Arc<[Cell]> =
            (0..6).map(|x| Cell::new(x, 0)).collect::<Vec<_>>().into();
        // Close mover at the start of its route.
        world.spawn(MoverBundle::new(
            0,
            MoverClass::Normal,
            96.0,
            32.0,
            PathRoute::new(cells.clone()),
        ));
        // Distant mover deep into its route.
        let mut advanced = PathRoute::new(cells);
        for _ in 0..5 {
            advanced.advance();
        }
        world.spawn(MoverBundle::new(1, MoverClass::Normal, 288.0, 32.0, advanced));

        for _ in 0..6 {
            step(&mut world, &mut schedule, 100.0);
        }

        let mut query = world.query::<(&MoverId, &Health)>();
        for (id, health) in query.iter(&world) {
            match id.0 {
                0 => assert_eq!(health.current, 10, "closer laggard was hit"),
                1 => assert!(health.current < 10, "leader was not hit"),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn test_out_of_range_mover_is_ignored() {
        let (mut world, mut schedule) = setup("grass,grass,grass,grass,grass");
        spawn_turret(&mut world, Cell::new(0, 0), TurretStats::new(100.0, 500.0, 2));
        world.spawn(MoverBundle::new(
            0,
            MoverClass::Normal,
            288.0,
            32.0,
            PathRoute::inert(),
        ));

        for _ in 0..20 {
            step(&mut world, &mut schedule, 100.0);
        }
        assert_eq!(mover_hp(&mut world), 10);
    }

    #[test]
    fn test_dead_target_is_not_hit_and_cooldown_holds() {
        let (mut world, mut schedule) = setup("grass,grass,grass");
        spawn_turret(&mut world, Cell::new(0, 0), TurretStats::new(100.0, 500.0, 2));
        world.spawn(MoverBundle::new(
            0,
            MoverClass::Normal,
            96.0,
            32.0,
            PathRoute::inert(),
        ));
        {
            let mut query = world.query_filtered::<&mut Health, With<MoverClass>>();
            query.single_mut(&mut world).damage(10);
        }

        for _ in 0..20 {
            step(&mut world, &mut schedule, 100.0);
        }
        assert_eq!(mover_hp(&mut world), 0, "dead mover took further damage");
        let mut query = world.query::<&FireState>();
        assert_eq!(query.single(&world).last_fire_ms, 0.0);
    }
}
