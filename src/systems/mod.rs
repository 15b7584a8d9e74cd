//! ECS systems for the tower-defense simulation.
//!
//! Systems run in one fixed, chained order per tick:
//! spawning, spatial grid rebuild, movement, engagement, reaping,
//! wave completion. The chain makes the tick deterministic and lets
//! each system see the previous system's writes.

pub mod engagement;
pub mod movement;
pub mod waves;

pub use engagement::engagement_system;
pub use movement::{mover_reaper_system, movement_system};
pub use waves::{wave_completion_system, wave_spawn_system, WavePlan, WaveState};
