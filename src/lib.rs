//! Deterministic tower-defense simulation core.
//!
//! The crate owns all game rules: terrain and pathfinding, mover movement,
//! turret engagement, wave scheduling, the economy, and save/snapshot
//! serialization. It is frontend-agnostic; a renderer drives it one tick at
//! a time through [`api::SimWorld`] and draws whatever [`world::Snapshot`]
//! reports. Given the same inputs in the same order, two runs produce
//! identical state.

pub mod api;
pub mod components;
pub mod config;
pub mod path;
pub mod spatial;
pub mod systems;
pub mod terrain;
pub mod world;

pub use api::{Outcome, SimWorld};
pub use components::{MoverClass, TurretKind, TurretTier};
pub use config::SimConfig;
pub use systems::WavePlan;
pub use terrain::{Cell, LevelError, TerrainClass, TerrainGrid};
pub use world::{SaveState, Snapshot};
