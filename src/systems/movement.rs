//! Mover movement and lifecycle systems.
//!
//! Each tick a mover walks toward the pixel center of its current waypoint,
//! scaled by the terrain under it, snapping and advancing when it would
//! overshoot. Running out of waypoints is a leak: the base loses one health
//! and the mover is removed. A separate reaper removes movers whose hit
//! points have dropped to zero or below and credits the kill reward, so the
//! reward is paid exactly once no matter how often the mover was hit.

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::config::{PlayerState, SimConfig};
use crate::systems::waves::WaveState;
use crate::terrain::TerrainResource;

/// Advances every mover along its route. Movers with an empty route sit
/// inert; they are still valid targets and can still leak only if they have
/// waypoints, which they do not.
pub fn movement_system(
    terrain: Res<TerrainResource>,
    mut players: ResMut<PlayerState>,
    mut waves: ResMut<WaveState>,
    mut commands: Commands,
    mut query: Query<(
        Entity,
        &MoverId,
        &MoverClass,
        &mut Position,
        &mut Facing,
        &mut PathRoute,
    )>,
) {
    let grid = terrain.grid();

    for (entity, id, class, mut pos, mut facing, mut route) in query.iter_mut() {
        let Some(waypoint) = route.current_waypoint() else {
            continue; // empty or exhausted route: cannot move
        };
        let (tx, ty) = grid.cell_center(waypoint);
        let dx = tx - pos.x;
        let dy = ty - pos.y;
        let distance = (dx * dx + dy * dy).sqrt();

        // Speed modifier comes from the tile being departed, not the tile
        // being walked into.
        let multiplier = route
            .departing_cell()
            .and_then(|cell| grid.class_at(cell))
            .map(|class_at| class_at.speed_multiplier(*class))
            .unwrap_or(1.0);
        let step = class.base_speed() * multiplier;

        if distance > f32::EPSILON {
            *facing = Facing::from_direction(dx, dy);
        }

        if distance <= step {
            // Would overshoot: snap to the waypoint and advance.
            pos.x = tx;
            pos.y = ty;
            route.advance();
            if route.current_waypoint().is_none() {
                players.base_hp -= 1;
                waves.leaked += 1;
                tracing::info!(id = id.0, class = class.as_str(), "mover reached the goal");
                commands.entity(entity).despawn();
            }
        } else {
            pos.x += dx / distance * step;
            pos.y += dy / distance * step;
        }
    }
}

/// Removes movers whose hit points have reached zero or below, crediting the
/// kill reward once per mover.
pub fn mover_reaper_system(
    config: Res<SimConfig>,
    mut players: ResMut<PlayerState>,
    mut waves: ResMut<WaveState>,
    mut commands: Commands,
    query: Query<(Entity, &MoverId, &MoverClass, &Health)>,
) {
    for (entity, id, class, health) in query.iter() {
        if health.is_alive() {
            continue;
        }
        players.money += config.kill_reward;
        waves.killed += 1;
        tracing::info!(id = id.0, class = class.as_str(), "mover destroyed");
        commands.entity(entity).despawn();
    }
}
