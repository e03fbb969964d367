//! Events emitted by the simulation.
//!
//! Presentation intents (animation, effects, props) are fire-and-forget
//! requests for the host's collaborators; the core never reads a result
//! back. Gameplay events report what happened for UI, audio and tests.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, PropId, ReloadKind};
use crate::math::{fixed_serde, Fixed, Vec3};

/// Which skeleton an animation request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationTarget {
    /// The wielding character's body.
    Character(EntityId),
    /// The weapon mesh itself.
    Weapon(EntityId),
}

/// Transient props the gun asks the presentation layer to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropKind {
    /// Spent magazine dropped to the floor; owned by physics afterwards.
    EmptyMagazine,
    /// Fresh magazine held in the hand during a reload; owned by the gun.
    NewMagazine,
}

/// Where a prop appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropPlacement {
    /// Free-standing at a socket's current transform.
    AtSocket {
        /// Entity owning the socket.
        owner: EntityId,
        /// Socket name.
        socket: String,
    },
    /// Attached to and following a socket.
    AttachedTo {
        /// Entity owning the socket.
        owner: EntityId,
        /// Socket name.
        socket: String,
    },
}

/// Named parameter handed to an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectParam {
    /// Parameter name understood by the effect asset.
    pub name: String,
    /// Vector value.
    pub value: Vec3,
}

/// Everything one simulation step asks of, or reports to, the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Play an animation clip.
    PlayAnimation {
        /// Skeleton to play on.
        target: AnimationTarget,
        /// Clip name.
        clip: String,
        /// Stretch the clip to this many seconds, if set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f32>,
    },
    /// Stop an animation clip if it is playing.
    StopAnimation {
        /// Skeleton to stop on.
        target: AnimationTarget,
        /// Clip name.
        clip: String,
    },
    /// Spawn a particle effect at a socket.
    SpawnEffectAtSocket {
        /// Effect asset name.
        effect: String,
        /// Entity owning the socket.
        owner: EntityId,
        /// Socket name.
        socket: String,
        /// Effect parameters.
        params: Vec<EffectParam>,
    },
    /// Spawn a particle effect at a world location.
    SpawnEffectAtLocation {
        /// Effect asset name.
        effect: String,
        /// World location.
        location: Vec3,
        /// Facing direction.
        rotation: Vec3,
    },
    /// Spawn a transient prop.
    SpawnProp {
        /// Handle the gun will later destroy, if it owns the prop.
        prop: PropId,
        /// Kind of prop.
        kind: PropKind,
        /// Placement of the prop.
        placement: PropPlacement,
        /// Impulse to apply on spawn.
        impulse: Vec3,
    },
    /// Destroy a prop previously spawned.
    DestroyProp {
        /// Prop handle.
        prop: PropId,
    },
    /// A gun fired one round.
    Fired {
        /// Gun that fired.
        gun: EntityId,
        /// Rounds left after the shot.
        clip: u32,
    },
    /// A shot resolved against the world.
    ShotResolved {
        /// Gun that fired.
        gun: EntityId,
        /// Where the bullet trace started.
        origin: Vec3,
        /// Where the trail ends.
        end: Vec3,
        /// Entity struck, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hit: Option<EntityId>,
    },
    /// A character took damage.
    Damaged {
        /// Character that was hit.
        target: EntityId,
        /// Damage after bone multipliers.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
        /// Bone that was hit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bone: Option<String>,
        /// Character responsible.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instigator: Option<EntityId>,
        /// Weapon responsible.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        causer: Option<EntityId>,
    },
    /// A character died.
    Killed {
        /// Character that died.
        character: EntityId,
    },
    /// A reload started.
    ReloadStarted {
        /// Reloading gun.
        gun: EntityId,
        /// Reload flavor.
        kind: ReloadKind,
    },
    /// A reload finished and refilled the clip.
    ReloadCompleted {
        /// Reloaded gun.
        gun: EntityId,
        /// Rounds after the reload.
        clip: u32,
    },
    /// An in-flight reload was interrupted.
    ReloadCanceled {
        /// Gun whose reload stopped.
        gun: EntityId,
    },
    /// A character's aim blend reached a bound.
    AimSettled {
        /// Character whose blend settled.
        character: EntityId,
        /// `true` at the sights view, `false` back at the hip.
        aimed: bool,
    },
    /// A gun was put away.
    Holstered {
        /// Gun put away.
        gun: EntityId,
        /// Character that held it.
        character: EntityId,
        /// Gun equipped in its place.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<EntityId>,
    },
}

impl GameEvent {
    /// Whether the event is a presentation intent rather than a gameplay report.
    #[must_use]
    pub const fn is_presentation(&self) -> bool {
        matches!(
            self,
            Self::PlayAnimation { .. }
                | Self::StopAnimation { .. }
                | Self::SpawnEffectAtSocket { .. }
                | Self::SpawnEffectAtLocation { .. }
                | Self::SpawnProp { .. }
                | Self::DestroyProp { .. }
        )
    }
}

/// Events generated during one simulation step, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// All events, in order.
    pub events: Vec<GameEvent>,
}

impl TickEvents {
    /// Append an event.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Append all events from another batch.
    pub fn extend(&mut self, other: TickEvents) {
        self.events.extend(other.events);
    }

    /// Iterate over all events.
    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of rounds fired in this batch.
    #[must_use]
    pub fn shots_fired(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, GameEvent::Fired { .. }))
            .count()
    }

    /// Characters that died in this batch.
    #[must_use]
    pub fn deaths(&self) -> Vec<EntityId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GameEvent::Killed { character } => Some(*character),
                _ => None,
            })
            .collect()
    }

    /// Props spawned with an owning handle.
    #[must_use]
    pub fn spawned_props(&self) -> Vec<PropId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GameEvent::SpawnProp {
                    prop,
                    kind: PropKind::NewMagazine,
                    ..
                } => Some(*prop),
                _ => None,
            })
            .collect()
    }

    /// Props destroyed.
    #[must_use]
    pub fn destroyed_props(&self) -> Vec<PropId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GameEvent::DestroyProp { prop } => Some(*prop),
                _ => None,
            })
            .collect()
    }
}

impl IntoIterator for TickEvents {
    type Item = GameEvent;
    type IntoIter = std::vec::IntoIter<GameEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
