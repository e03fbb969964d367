//! Shared component types.
//!
//! Plain data shared by the character, the gun and the replication layer.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Unique identifier for characters and weapons.
pub type EntityId = u64;

/// Handle for a transient prop (magazines) spawned by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropId(pub u64);

/// Network role of an entity on the local participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetRole {
    /// This participant owns the canonical state.
    #[default]
    Authority,
    /// Locally controlled copy that predicts its own actions.
    AutonomousProxy,
    /// Purely cosmetic remote copy driven by replication.
    SimulatedProxy,
}

impl NetRole {
    /// Whether the local participant is authoritative for the entity.
    #[must_use]
    pub const fn has_authority(self) -> bool {
        matches!(self, Self::Authority)
    }

    /// Whether the entity is a cosmetic remote copy.
    #[must_use]
    pub const fn is_simulated_proxy(self) -> bool {
        matches!(self, Self::SimulatedProxy)
    }
}

/// Fire-mode state of a gun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WeaponState {
    /// Ready, not firing.
    #[default]
    Idle,
    /// Holding the trigger on an automatic weapon.
    Firing,
    /// Reload in progress.
    Reloading,
}

/// Which reload a gun performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReloadKind {
    /// Round still chambered and ammunition left; ends one round above capacity.
    Tactical,
    /// Empty clip or no chamber; ends at capacity.
    Full,
}

impl ReloadKind {
    /// Pick the reload for the current clip.
    #[must_use]
    pub const fn select(clip: u32, chamber: bool) -> Self {
        if clip > 0 && chamber {
            Self::Tactical
        } else {
            Self::Full
        }
    }
}

/// An input intent issued to a character.
///
/// Weapon intents are routed to the character's equipped weapon; they are
/// dropped once the character's input is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Trigger pulled.
    FirePressed,
    /// Trigger let go.
    FireReleased,
    /// Aim button pressed.
    AimPressed,
    /// Aim button released.
    AimReleased,
    /// Reload requested.
    Reload,
    /// Put the current weapon away, optionally drawing another.
    Holster {
        /// Weapon to draw instead.
        next: Option<EntityId>,
    },
    /// Sprint intent changed.
    SetSprint(bool),
}

impl Command {
    /// Whether the command is handled by the equipped weapon.
    #[must_use]
    pub const fn targets_weapon(self) -> bool {
        matches!(
            self,
            Self::FirePressed | Self::FireReleased | Self::AimPressed | Self::AimReleased | Self::Reload
        )
    }
}

/// Cosmetic aim blend phase of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AimPhase {
    /// Blend at 0, hip view.
    #[default]
    Hip,
    /// Moving towards the aimed view.
    BlendingIn,
    /// Blend at 1, sights view.
    Aimed,
    /// Moving back to the hip view.
    BlendingOut,
}

/// Spatial pose the host pushes for a character every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Camera location the shots originate from.
    pub view_location: Vec3,
    /// Base aim direction (normalized).
    pub view_direction: Vec3,
    /// Current movement velocity.
    pub velocity: Vec3,
}

impl Pose {
    /// Pose standing at `location` looking along `direction`.
    #[must_use]
    pub fn looking(location: Vec3, direction: Vec3) -> Self {
        Self {
            view_location: location,
            view_direction: direction.normalize_or_zero(),
            velocity: Vec3::ZERO,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::looking(Vec3::ZERO, Vec3::X)
    }
}
