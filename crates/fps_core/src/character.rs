//! Character state: health, liveness and the cosmetic aim blend.
//!
//! Health and liveness are replicated. The aim blend is simulated by every
//! participant on its own and only drives presentation (camera position,
//! field of view, hipfire spread).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::components::{AimPhase, EntityId, NetRole, Pose};
use crate::data::CharacterData;
use crate::events::{GameEvent, TickEvents};
use crate::math::{Fixed, Vec3};
use crate::replication::{FieldUpdate, Multicast, Replicated, ReplicationUpdate};

/// Where a damaging hit landed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageHit {
    /// Impact point.
    pub location: Vec3,
    /// Bone struck, if the target is skeletal.
    pub bone: Option<String>,
}

impl DamageHit {
    /// Hit on a named bone.
    #[must_use]
    pub fn on_bone(location: Vec3, bone: impl Into<String>) -> Self {
        Self {
            location,
            bone: Some(bone.into()),
        }
    }
}

/// A player character.
#[derive(Debug, Clone)]
pub struct Character {
    id: EntityId,
    data: Arc<CharacterData>,
    role: NetRole,
    locally_controlled: bool,
    health: Replicated<Fixed>,
    alive: Replicated<bool>,
    killed: bool,
    kill_broadcast_pending: bool,
    input_enabled: bool,
    sprinting: bool,
    aim_blend: Fixed,
    aim_blending: bool,
    aim_forward: bool,
    pose: Pose,
    weapon: Option<EntityId>,
}

impl Character {
    /// Spawn a character at full health.
    #[must_use]
    pub fn new(id: EntityId, data: Arc<CharacterData>, role: NetRole, locally_controlled: bool) -> Self {
        Self {
            id,
            health: Replicated::new(data.max_health),
            data,
            role,
            locally_controlled,
            alive: Replicated::new(true),
            killed: false,
            kill_broadcast_pending: false,
            input_enabled: true,
            sprinting: false,
            aim_blend: Fixed::ZERO,
            aim_blending: false,
            aim_forward: false,
            pose: Pose::default(),
            weapon: None,
        }
    }

    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Static configuration.
    #[must_use]
    pub fn data(&self) -> &CharacterData {
        &self.data
    }

    /// Network role on this participant.
    #[must_use]
    pub const fn role(&self) -> NetRole {
        self.role
    }

    /// Whether this participant's player drives the character.
    #[must_use]
    pub const fn is_locally_controlled(&self) -> bool {
        self.locally_controlled
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> Fixed {
        self.health.value()
    }

    /// Whether the character is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive.value()
    }

    /// Whether input commands are still processed.
    #[must_use]
    pub const fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Whether the sprint intent is held.
    #[must_use]
    pub const fn is_sprinting(&self) -> bool {
        self.sprinting
    }

    /// Set or clear the sprint intent.
    pub fn set_sprinting(&mut self, sprinting: bool) {
        self.sprinting = sprinting && self.is_alive();
    }

    /// Aim blend in `[0, 1]`: 0 at the hip, 1 through the sights.
    #[must_use]
    pub const fn aim_blend_alpha(&self) -> Fixed {
        self.aim_blend
    }

    /// Aim blend phase.
    #[must_use]
    pub fn aim_phase(&self) -> AimPhase {
        match (self.aim_blending, self.aim_forward) {
            (true, true) => AimPhase::BlendingIn,
            (true, false) => AimPhase::BlendingOut,
            (false, _) if self.aim_blend >= Fixed::ONE => AimPhase::Aimed,
            (false, _) => AimPhase::Hip,
        }
    }

    /// Current pose.
    #[must_use]
    pub const fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Replace the pose pushed by the host.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Equipped gun, if any.
    #[must_use]
    pub const fn weapon(&self) -> Option<EntityId> {
        self.weapon
    }

    pub(crate) fn set_weapon(&mut self, weapon: Option<EntityId>) {
        self.weapon = weapon;
    }

    /// Eligibility guard for incoming damage.
    ///
    /// Only the authority applies damage, and only to a living character
    /// that can be damaged at all.
    #[must_use]
    pub fn should_take_damage(&self) -> bool {
        self.is_alive() && self.data.can_be_damaged && self.role.has_authority()
    }

    /// Apply damage and return the amount actually applied.
    ///
    /// The amount is scaled by the struck bone's multiplier. Returns 0 when
    /// the character is not eligible or the amount is not positive. If
    /// health drops to 0 or below the kill transition runs inside this call,
    /// so health is never observed negative.
    pub fn take_damage(
        &mut self,
        amount: Fixed,
        hit: &DamageHit,
        instigator: Option<EntityId>,
        causer: Option<EntityId>,
        events: &mut TickEvents,
    ) -> Fixed {
        if amount <= Fixed::ZERO || !self.should_take_damage() {
            return Fixed::ZERO;
        }

        let applied = amount.saturating_mul(self.data.multiplier_for(hit.bone.as_deref()));
        let remaining = self.health().saturating_sub(applied);
        self.health.set(remaining);

        events.push(GameEvent::Damaged {
            target: self.id,
            amount: applied,
            bone: hit.bone.clone(),
            instigator,
            causer,
        });
        tracing::trace!(
            character = self.id,
            applied = %applied,
            remaining = %remaining,
            "Damage applied"
        );

        if remaining <= Fixed::ZERO {
            self.kill(events);
            self.kill_broadcast_pending = true;
        }
        applied
    }

    /// Terminal transition: zero health, dead, input disabled.
    ///
    /// Idempotent: only the first call changes state or emits `Killed`.
    pub fn kill(&mut self, events: &mut TickEvents) {
        if self.killed {
            return;
        }
        self.killed = true;
        self.health.set(Fixed::ZERO);
        self.alive.set(false);
        self.input_enabled = false;
        self.sprinting = false;

        events.push(GameEvent::Killed { character: self.id });
        tracing::debug!(character = self.id, "Character killed");
    }

    /// Start blending towards the sights view. Cancels sprinting.
    pub fn aim(&mut self) {
        self.aim_blending = true;
        self.aim_forward = true;
        self.sprinting = false;
    }

    /// Start blending back to the hip view.
    pub fn unaim(&mut self) {
        self.aim_blending = true;
        self.aim_forward = false;
    }

    /// Advance the aim blend by `dt` seconds.
    ///
    /// The blend moves `dt / aim_time` per call and settles at 0 or 1.
    pub fn tick_aim(&mut self, dt: Fixed, aim_time: Fixed, events: &mut TickEvents) {
        if !self.aim_blending {
            return;
        }

        let step = if aim_time > Fixed::ZERO {
            dt / aim_time
        } else {
            Fixed::ONE
        };
        let target = if self.aim_forward {
            self.aim_blend.saturating_add(step)
        } else {
            self.aim_blend.saturating_sub(step)
        };
        self.aim_blend = target.clamp(Fixed::ZERO, Fixed::ONE);

        if self.aim_blend == Fixed::ZERO || self.aim_blend == Fixed::ONE {
            self.aim_blending = false;
            events.push(GameEvent::AimSettled {
                character: self.id,
                aimed: self.aim_blend == Fixed::ONE,
            });
        }
    }

    /// Drain changed replicated fields and pending broadcasts.
    pub(crate) fn drain_replication(
        &mut self,
        updates: &mut Vec<ReplicationUpdate>,
        multicasts: &mut Vec<Multicast>,
    ) {
        if let Some(health) = self.health.take_dirty() {
            updates.push(ReplicationUpdate {
                entity: self.id,
                field: FieldUpdate::Health(health),
            });
        }
        if let Some(alive) = self.alive.take_dirty() {
            updates.push(ReplicationUpdate {
                entity: self.id,
                field: FieldUpdate::Alive(alive),
            });
        }
        if std::mem::take(&mut self.kill_broadcast_pending) {
            multicasts.push(Multicast::Kill { character: self.id });
        }
    }

    /// Overwrite a replicated field with the authority's value.
    pub(crate) fn receive_field(&mut self, field: FieldUpdate) {
        match field {
            FieldUpdate::Health(health) => self.health.receive(health),
            FieldUpdate::Alive(alive) => self.alive.receive(alive),
            FieldUpdate::Clip(_) | FieldUpdate::SpreadSeed(_) => {
                tracing::warn!(character = self.id, ?field, "Gun field addressed to a character");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soldier(role: NetRole) -> Character {
        let mut data = CharacterData::soldier();
        data.hit_bone_damage_multipliers
            .insert("spine".to_string(), Fixed::from_num(2));
        Character::new(1, Arc::new(data), role, true)
    }

    fn hit(bone: &str) -> DamageHit {
        DamageHit::on_bone(Vec3::ZERO, bone)
    }

    #[test]
    fn test_bone_multiplier_applies() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();

        let applied = character.take_damage(Fixed::from_num(10), &hit("spine"), Some(2), Some(3), &mut events);
        assert_eq!(applied, Fixed::from_num(20));
        assert_eq!(character.health(), Fixed::from_num(80));

        let applied = character.take_damage(Fixed::from_num(10), &hit("pelvis"), None, None, &mut events);
        assert_eq!(applied, Fixed::from_num(10));
        assert_eq!(character.health(), Fixed::from_num(70));
    }

    #[test]
    fn test_lethal_damage_kills_and_clamps() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();

        let applied = character.take_damage(Fixed::from_num(90), &hit("spine"), None, None, &mut events);
        assert_eq!(applied, Fixed::from_num(180));
        assert!(!character.is_alive());
        assert_eq!(character.health(), Fixed::ZERO);
        assert!(!character.input_enabled());
        assert_eq!(events.deaths(), vec![1]);
    }

    #[test]
    fn test_huge_multiplier_saturates_instead_of_overflowing() {
        let mut data = CharacterData::soldier();
        data.hit_bone_damage_multipliers
            .insert("head".to_string(), Fixed::from_num(100_000));
        assert!(data.validate().is_ok());
        let mut character = Character::new(1, Arc::new(data), NetRole::Authority, true);
        let mut events = TickEvents::default();

        let applied = character.take_damage(Fixed::from_num(50_000), &hit("head"), None, None, &mut events);
        assert_eq!(applied, Fixed::MAX);
        assert_eq!(character.health(), Fixed::ZERO);
        assert!(!character.is_alive());
    }

    #[test]
    fn test_dead_character_takes_no_damage() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();
        character.kill(&mut events);

        let applied = character.take_damage(Fixed::from_num(10), &hit("spine"), None, None, &mut events);
        assert_eq!(applied, Fixed::ZERO);
    }

    #[test]
    fn test_observer_does_not_apply_damage() {
        let mut character = soldier(NetRole::SimulatedProxy);
        let mut events = TickEvents::default();
        let applied = character.take_damage(Fixed::from_num(10), &hit("spine"), None, None, &mut events);
        assert_eq!(applied, Fixed::ZERO);
        assert_eq!(character.health(), Fixed::from_num(100));
        assert!(events.is_empty());
    }

    #[test]
    fn test_non_positive_damage_is_ignored() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();
        assert_eq!(
            character.take_damage(Fixed::from_num(-5), &hit("spine"), None, None, &mut events),
            Fixed::ZERO
        );
        assert_eq!(character.health(), Fixed::from_num(100));
    }

    #[test]
    fn test_kill_is_idempotent() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();

        character.kill(&mut events);
        character.kill(&mut events);

        assert_eq!(character.health(), Fixed::ZERO);
        assert!(!character.is_alive());
        assert_eq!(events.deaths().len(), 1, "second kill has no side effects");
    }

    #[test]
    fn test_kill_broadcast_only_from_damage() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();
        character.take_damage(Fixed::from_num(500), &hit("head"), None, None, &mut events);

        let mut updates = Vec::new();
        let mut multicasts = Vec::new();
        character.drain_replication(&mut updates, &mut multicasts);
        assert_eq!(multicasts, vec![Multicast::Kill { character: 1 }]);
        assert!(updates.contains(&ReplicationUpdate {
            entity: 1,
            field: FieldUpdate::Alive(false),
        }));

        updates.clear();
        multicasts.clear();
        character.drain_replication(&mut updates, &mut multicasts);
        assert!(updates.is_empty());
        assert!(multicasts.is_empty());
    }

    #[test]
    fn test_aim_blend_progresses_and_settles() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();
        let aim_time = Fixed::from_num(0.5);
        let dt = Fixed::from_num(0.125);

        character.set_sprinting(true);
        character.aim();
        assert!(!character.is_sprinting());
        assert_eq!(character.aim_phase(), AimPhase::BlendingIn);

        character.tick_aim(dt, aim_time, &mut events);
        assert_eq!(character.aim_blend_alpha(), Fixed::from_num(0.25));

        for _ in 0..3 {
            character.tick_aim(dt, aim_time, &mut events);
        }
        assert_eq!(character.aim_blend_alpha(), Fixed::ONE);
        assert_eq!(character.aim_phase(), AimPhase::Aimed);
        assert!(events.events.contains(&GameEvent::AimSettled {
            character: 1,
            aimed: true
        }));

        character.unaim();
        assert_eq!(character.aim_phase(), AimPhase::BlendingOut);
        character.tick_aim(Fixed::from_num(10), aim_time, &mut events);
        assert_eq!(character.aim_blend_alpha(), Fixed::ZERO);
        assert_eq!(character.aim_phase(), AimPhase::Hip);
    }

    #[test]
    fn test_aim_reversal_mid_blend() {
        let mut character = soldier(NetRole::Authority);
        let mut events = TickEvents::default();
        character.aim();
        character.tick_aim(Fixed::from_num(0.125), Fixed::from_num(0.5), &mut events);
        character.unaim();
        character.tick_aim(Fixed::from_num(0.0625), Fixed::from_num(0.5), &mut events);
        assert_eq!(character.aim_blend_alpha(), Fixed::from_num(0.125));
        assert_eq!(character.aim_phase(), AimPhase::BlendingOut);
    }

    #[test]
    fn test_observer_receives_fields() {
        let mut character = soldier(NetRole::SimulatedProxy);
        character.receive_field(FieldUpdate::Health(Fixed::from_num(35)));
        character.receive_field(FieldUpdate::Alive(true));
        assert_eq!(character.health(), Fixed::from_num(35));
        assert!(character.is_alive());
    }
}
