//! # FPS Core
//!
//! Combat simulation core for a first-person shooter: character health and
//! aim state, the gun firing/reload state machine, hit resolution and the
//! authority/replication contract.
//!
//! This crate contains **only** gameplay logic:
//! - No rendering or animation playback (requested through events)
//! - No physics (ray and socket queries go through [`world::World`])
//! - No IO (data records parse from strings)
//! - No system randomness (spread uses seeded streams)
//!
//! ## Crate Structure
//!
//! - [`character`] - Health, liveness and aim blend
//! - [`gun`] - Weapon state machine and shot resolution
//! - [`simulation`] - Per-participant tick loop
//! - [`replication`] - Dirty fields and replication frames
//! - [`schedule`] - Cancelable deferred tasks
//! - [`data`] - RON-backed character and gun definitions
//! - [`math`] - Fixed-point helpers and geometry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod character;
pub mod components;
pub mod data;
pub mod error;
pub mod events;
pub mod gun;
pub mod math;
pub mod random;
pub mod replication;
pub mod schedule;
pub mod simulation;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::character::{Character, DamageHit};
    pub use crate::components::*;
    pub use crate::data::{CharacterData, GunData};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{GameEvent, TickEvents};
    pub use crate::gun::{Armament, Gun, GunContext, ReloadNotify, Weapon};
    pub use crate::math::{Fixed, Vec3};
    pub use crate::replication::{ReplicationFrame, Replicated};
    pub use crate::simulation::Simulation;
    pub use crate::world::{RayHit, World};
}
