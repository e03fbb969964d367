//! Data structures for character and gun configuration.
//!
//! This module contains pure data structures that define character types
//! and gun types. All structs are designed to be deserialized from RON.
//!
//! **Note:** This module contains no IO - it only parses strings.
//! File loading is handled by the host (see `fps_headless`).

mod character_data;
mod gun_data;

pub use character_data::CharacterData;
pub use gun_data::{GunAnimations, GunData, GunSockets, TRAIL_END_PARAM};
