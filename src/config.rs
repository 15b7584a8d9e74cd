//! Simulation configuration, clock, and player-facing state resources.

use bevy_ecs::prelude::*;

/// Tuning constants for the simulation and the economy.
///
/// The defaults reproduce the shipped balance: 64 px tiles, 60 Hz
/// frame-stepped ticks, and the standard reward/cost table.
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    /// Edge length of a grid tile in pixels.
    pub tile_size: u32,
    /// Duration of one simulation tick in milliseconds. The simulation is
    /// frame-stepped: one tick per rendered frame, no fixed-timestep
    /// decoupling.
    pub frame_ms: f64,
    /// Delay between mover spawns within a wave, in milliseconds.
    pub spawn_interval_ms: f64,
    /// Base health the player starts with. Each leak costs one point.
    pub starting_health: i32,
    /// Currency the player starts with.
    pub starting_money: u32,
    /// Currency credited for destroying a mover.
    pub kill_reward: u32,
    /// Cost of placing a new turret.
    pub buy_cost: u32,
    /// Cost of upgrading a turret to its second tier.
    pub upgrade_cost: u32,
    /// Currency credited when a wave is fully resolved.
    pub level_complete_reward: u32,
    /// Level number whose completion wins the campaign.
    pub final_level: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tile_size: 64,
            frame_ms: 1000.0 / 60.0,
            spawn_interval_ms: 400.0,
            starting_health: 1,
            starting_money: 1000,
            kill_reward: 50,
            buy_cost: 100,
            upgrade_cost: 200,
            level_complete_reward: 500,
            final_level: 3,
        }
    }
}

/// Monotonic simulation clock.
///
/// Turret cooldowns compare millisecond timestamps against `now_ms`, so the
/// clock advances by exactly one frame interval per tick.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    /// Ticks elapsed since the simulation started.
    pub tick: u64,
    /// Simulation time in milliseconds.
    pub now_ms: f64,
}

impl SimClock {
    pub fn advance(&mut self, frame_ms: f64) {
        self.tick = self.tick.wrapping_add(1);
        self.now_ms += frame_ms;
    }
}

/// Player-authoritative counters mutated by the core: base health and money.
///
/// Kill/leak bookkeeping for the current wave lives in
/// [`crate::systems::waves::WaveState`]; this resource only carries what
/// survives level transitions.
#[derive(Resource, Debug, Clone, Copy)]
pub struct PlayerState {
    pub base_hp: i32,
    pub money: u32,
}

impl PlayerState {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            base_hp: config.starting_health,
            money: config.starting_money,
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.base_hp <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_one_frame_per_tick() {
        let mut clock = SimClock::default();
        clock.advance(1000.0 / 60.0);
        clock.advance(1000.0 / 60.0);
        assert_eq!(clock.tick, 2);
        assert!((clock.now_ms - 2000.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_player_state_from_config() {
        let state = PlayerState::new(&SimConfig::default());
        assert_eq!(state.base_hp, 1);
        assert_eq!(state.money, 1000);
        assert!(!state.is_defeated());
    }
}
