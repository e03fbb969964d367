//! Gun state machine: firing cadence, reloads and shot resolution.
//!
//! A [`Gun`] owns its fire-mode state, clip and spread generator. It reaches
//! everything else (its wielder, the world, the clock, the scheduler) through
//! a [`GunContext`] handed in by the simulation for the duration of one call.
//!
//! # State Machine
//!
//! ```text
//!            fire_pressed (automatic)
//!   Idle  ───────────────────────────▶  Firing
//!    ▲ │◀─────────────────────────────── │
//!    │ │   fire_released / trigger up    │
//!    │ │                                 │
//!    │ └──────── reload ───────┐  ┌──────┘ reload
//!    │                         ▼  ▼
//!    └─── complete / cancel ── Reloading
//! ```
//!
//! Every operation whose precondition fails is a silent no-op.

use std::sync::Arc;

use crate::character::{Character, DamageHit};
use crate::components::{EntityId, NetRole, PropId, ReloadKind, WeaponState};
use crate::data::{GunData, TRAIL_END_PARAM};
use crate::events::{AnimationTarget, EffectParam, GameEvent, PropKind, PropPlacement, TickEvents};
use crate::math::{ease_cubic, Fixed, Vec3};
use crate::random::SpreadRandom;
use crate::replication::{FieldUpdate, Replicated, ReplicationUpdate};
use crate::schedule::{ScheduledTask, Scheduler, TimerHandle};
use crate::simulation::EntityStorage;
use crate::world::{RayHit, World};

/// Share of the wielder's velocity handed to a dropped magazine.
const MAGAZINE_DROP_IMPULSE_SCALE: f32 = 0.5;

/// Hands out unique prop handles.
#[derive(Debug, Clone, Default)]
pub struct PropAllocator {
    next: u64,
}

impl PropAllocator {
    /// Create an allocator starting at handle 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused handle.
    pub fn allocate(&mut self) -> PropId {
        let prop = PropId(self.next);
        self.next += 1;
        prop
    }
}

/// Everything a weapon operation may touch besides the weapon itself.
pub struct GunContext<'a> {
    /// Simulation clock in seconds.
    pub now: Fixed,
    /// All characters, for the wielder and struck targets.
    pub characters: &'a mut EntityStorage<Character>,
    /// Ray and socket queries.
    pub world: &'a dyn World,
    /// Deferred tasks.
    pub scheduler: &'a mut Scheduler,
    /// Prop handles.
    pub props: &'a mut PropAllocator,
    /// Event sink.
    pub events: &'a mut TickEvents,
}

/// Animation-timeline notifications that drive the magazine choreography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ReloadNotify {
    /// Old magazine leaves the well and falls.
    DropMagazine,
    /// Hand picks up the fresh magazine.
    GrabMagazine,
    /// Fresh magazine seated.
    MagazineIn,
    /// Old magazine pulled.
    MagazineOut,
    /// Bolt racked.
    Bolt,
    /// Reload montage finished.
    EndReload,
}

/// Capability set every weapon archetype provides.
pub trait Weapon {
    /// Entity id.
    fn id(&self) -> EntityId;
    /// Character holding the weapon.
    fn wielder(&self) -> Option<EntityId>;
    /// Fire-mode state.
    fn state(&self) -> WeaponState;
    /// Rounds left.
    fn clip(&self) -> u32;

    /// Trigger down.
    fn fire_pressed(&mut self, ctx: &mut GunContext<'_>);
    /// Trigger up.
    fn fire_released(&mut self, ctx: &mut GunContext<'_>);
    /// Aim button down.
    fn aim_pressed(&mut self, ctx: &mut GunContext<'_>);
    /// Aim button up.
    fn aim_released(&mut self, ctx: &mut GunContext<'_>);
    /// Reload request.
    fn reload(&mut self, ctx: &mut GunContext<'_>);
    /// Weapon-side part of putting the weapon away.
    fn holster(&mut self, ctx: &mut GunContext<'_>);
    /// Animation-timeline notification.
    fn handle_notify(&mut self, notify: ReloadNotify, ctx: &mut GunContext<'_>);
    /// Per-tick update.
    fn tick(&mut self, dt: Fixed, ctx: &mut GunContext<'_>);
    /// Release everything the weapon owns.
    fn teardown(&mut self, ctx: &mut GunContext<'_>);
}

/// A hit-scan firearm.
#[derive(Debug, Clone)]
pub struct Gun {
    id: EntityId,
    data: Arc<GunData>,
    role: NetRole,
    state: WeaponState,
    clip: Replicated<u32>,
    spread_seed: Replicated<u32>,
    spread: SpreadRandom,
    last_fire: Option<Fixed>,
    fire_lag: Fixed,
    wants_to_fire: bool,
    aiming: bool,
    toggle_aim: bool,
    magazine: Option<PropId>,
    reload_timer: Option<TimerHandle>,
    reload_in_flight: Option<ReloadKind>,
    wielder: Option<EntityId>,
}

impl Gun {
    /// Spawn a gun with a full magazine plus the chambered round.
    #[must_use]
    pub fn new(id: EntityId, data: Arc<GunData>, role: NetRole, spread_seed: u32) -> Self {
        Self {
            id,
            clip: Replicated::new(data.max_rounds()),
            toggle_aim: data.toggle_aim,
            data,
            role,
            state: WeaponState::Idle,
            spread_seed: Replicated::new(spread_seed),
            spread: SpreadRandom::new(spread_seed),
            last_fire: None,
            fire_lag: Fixed::ZERO,
            wants_to_fire: false,
            aiming: false,
            magazine: None,
            reload_timer: None,
            reload_in_flight: None,
            wielder: None,
        }
    }

    /// Static configuration.
    #[must_use]
    pub fn data(&self) -> &GunData {
        &self.data
    }

    /// Network role on this participant.
    #[must_use]
    pub const fn role(&self) -> NetRole {
        self.role
    }

    /// Whether the trigger is held.
    #[must_use]
    pub const fn wants_to_fire(&self) -> bool {
        self.wants_to_fire
    }

    /// Whether the gun is aimed down the sights.
    #[must_use]
    pub const fn is_aiming(&self) -> bool {
        self.aiming
    }

    /// Whether the aim button toggles.
    #[must_use]
    pub const fn toggle_aim(&self) -> bool {
        self.toggle_aim
    }

    /// Switch between toggle and hold aiming.
    pub fn set_toggle_aim(&mut self, toggle: bool) {
        self.toggle_aim = toggle;
    }

    /// Time of the last shot, if any.
    #[must_use]
    pub const fn last_fire(&self) -> Option<Fixed> {
        self.last_fire
    }

    /// Current spread seed.
    #[must_use]
    pub const fn spread_seed(&self) -> u32 {
        self.spread_seed.value()
    }

    /// Spread generator, for inspection.
    #[must_use]
    pub const fn spread(&self) -> &SpreadRandom {
        &self.spread
    }

    /// Owned new-magazine prop, while one is in the hand.
    #[must_use]
    pub const fn magazine(&self) -> Option<PropId> {
        self.magazine
    }

    /// Pending reload completion, on the authority.
    #[must_use]
    pub const fn reload_timer(&self) -> Option<TimerHandle> {
        self.reload_timer
    }

    /// Reload animation currently playing, if any.
    #[must_use]
    pub const fn reload_in_flight(&self) -> Option<ReloadKind> {
        self.reload_in_flight
    }

    pub(crate) fn attach(&mut self, wielder: Option<EntityId>) {
        self.wielder = wielder;
    }

    /// Pick a new spread seed on the authority and re-seed the stream.
    pub fn set_spread_seed(&mut self, seed: u32) {
        self.spread_seed.set(seed);
        self.spread.reseed(seed);
    }

    fn wielder_alive(&self, characters: &EntityStorage<Character>) -> bool {
        self.wielder
            .and_then(|id| characters.get(id))
            .is_some_and(Character::is_alive)
    }

    /// Whether the gun may fire a round right now.
    #[must_use]
    pub fn can_fire(&self, ctx: &GunContext<'_>) -> bool {
        let cadence_ready = self
            .last_fire
            .map_or(true, |last| ctx.now - last >= self.data.shot_interval());
        self.state_allows_fire()
            && self.clip() > 0
            && cadence_ready
            && self.wielder_alive(ctx.characters)
    }

    const fn state_allows_fire(&self) -> bool {
        matches!(
            self.state,
            WeaponState::Idle | WeaponState::Firing | WeaponState::Reloading
        )
    }

    /// `can_fire` without the cadence check; used while accumulating shots.
    fn can_sustain_fire(&self, characters: &EntityStorage<Character>) -> bool {
        self.state_allows_fire() && self.clip() > 0 && self.wielder_alive(characters)
    }

    /// Whether a reload may start.
    #[must_use]
    pub fn can_reload(&self) -> bool {
        matches!(self.state, WeaponState::Idle | WeaponState::Firing)
            && self.clip() < self.data.max_rounds()
    }

    fn begin_firing(&mut self, ctx: &mut GunContext<'_>) {
        if self.data.automatic {
            self.state = WeaponState::Firing;
            self.fire_lag = Fixed::ZERO;
        }
        self.fire(ctx.now, ctx);
    }

    fn stop_firing(&mut self) {
        if self.data.automatic {
            self.state = WeaponState::Idle;
            self.fire_lag = Fixed::ZERO;
        }
    }

    /// Fire one round stamped at `at`.
    fn fire(&mut self, at: Fixed, ctx: &mut GunContext<'_>) {
        self.cancel_reload(ctx);
        self.last_fire = Some(at);

        if let Some(wielder) = self.wielder {
            ctx.events.push(GameEvent::PlayAnimation {
                target: AnimationTarget::Character(wielder),
                clip: self.data.animations.character_fire.clone(),
                duration: None,
            });
        }
        ctx.events.push(GameEvent::PlayAnimation {
            target: AnimationTarget::Weapon(self.id),
            clip: self.data.animations.fire.clone(),
            duration: None,
        });

        self.resolve_shot(ctx);

        if !self.role.is_simulated_proxy() {
            self.clip.set(self.clip().saturating_sub(1));
        }
        ctx.events.push(GameEvent::Fired {
            gun: self.id,
            clip: self.clip(),
        });
    }

    /// Trace one bullet, apply its damage and request its effects.
    fn resolve_shot(&mut self, ctx: &mut GunContext<'_>) {
        let Some(wielder_id) = self.wielder else {
            return;
        };
        let Some((pose, aim_alpha)) = ctx
            .characters
            .get(wielder_id)
            .map(|c| (*c.pose(), c.aim_blend_alpha()))
        else {
            return;
        };

        let sockets = &self.data.sockets;
        let max_range = self.data.max_range;
        let ignore = [self.id, wielder_id];

        let mut origin = pose.view_location;
        let mut direction = pose.view_direction;
        if self.aiming {
            if let Some(aim_end) = ctx.world.socket_location(self.id, &sockets.aim_end) {
                direction = (aim_end - origin).normalize_or_zero();
            }
        } else if let Some(camera_hit) = ctx.world.cast_ray(origin, direction, max_range, &ignore) {
            // Something sits between camera and muzzle focus; shoot from the barrel at it.
            if let Some(muzzle) = ctx.world.socket_location(self.id, &sockets.muzzle) {
                direction = (camera_hit.point - muzzle).normalize_or_zero();
                origin = muzzle;
            }
        }
        if direction == Vec3::ZERO {
            direction = pose.view_direction;
        }

        let spread = ease_cubic(self.data.hipfire_spread, Fixed::ZERO, aim_alpha);
        let direction = self
            .spread
            .random_cone_vector(direction, spread.to_num::<f32>());

        let hit = ctx.world.cast_ray(origin, direction, max_range, &ignore);
        let end = hit
            .as_ref()
            .map_or(origin + direction * max_range, |h| h.point);

        if let Some(hit) = &hit {
            self.apply_hit(hit, wielder_id, ctx);
        }

        if let Some(trail) = &self.data.trail_effect {
            ctx.events.push(GameEvent::SpawnEffectAtSocket {
                effect: trail.clone(),
                owner: self.id,
                socket: sockets.muzzle.clone(),
                params: vec![EffectParam {
                    name: TRAIL_END_PARAM.to_string(),
                    value: end,
                }],
            });
        }
        ctx.events.push(GameEvent::ShotResolved {
            gun: self.id,
            origin,
            end,
            hit: hit.as_ref().and_then(|h| h.entity),
        });
        tracing::trace!(gun = self.id, ?origin, ?end, hit = ?hit.as_ref().and_then(|h| h.entity), "Shot resolved");
    }

    fn apply_hit(&self, hit: &RayHit, wielder: EntityId, ctx: &mut GunContext<'_>) {
        if let Some(target) = hit.entity.and_then(|id| ctx.characters.get_mut(id)) {
            let damage_hit = DamageHit {
                location: hit.point,
                bone: hit.bone.clone(),
            };
            target.take_damage(
                self.data.damage,
                &damage_hit,
                Some(wielder),
                Some(self.id),
                ctx.events,
            );
        }

        if let Some(effect) = hit
            .surface
            .as_deref()
            .and_then(|surface| self.data.impact_effect(surface))
        {
            ctx.events.push(GameEvent::SpawnEffectAtLocation {
                effect: effect.to_string(),
                location: hit.point + hit.normal,
                rotation: hit.normal,
            });
        }
    }

    /// Stop any in-flight reload. Safe to call in any state.
    ///
    /// Releases the scheduled completion and the magazine prop, and drops
    /// `Reloading` back to `Idle`. A `Firing` state is left alone.
    pub fn cancel_reload(&mut self, ctx: &mut GunContext<'_>) {
        if let Some(handle) = self.reload_timer.take() {
            ctx.scheduler.cancel(handle);
        }
        self.destroy_magazine(ctx.events);

        if let Some(kind) = self.reload_in_flight.take() {
            if let Some(wielder) = self.wielder {
                let clip = match kind {
                    ReloadKind::Tactical => &self.data.animations.character_tactical_reload,
                    ReloadKind::Full => &self.data.animations.character_full_reload,
                };
                ctx.events.push(GameEvent::StopAnimation {
                    target: AnimationTarget::Character(wielder),
                    clip: clip.clone(),
                });
            }
            ctx.events.push(GameEvent::StopAnimation {
                target: AnimationTarget::Weapon(self.id),
                clip: self.data.animations.magazine_out.clone(),
            });
            ctx.events.push(GameEvent::ReloadCanceled { gun: self.id });
            tracing::debug!(gun = self.id, ?kind, "Reload canceled");
        }

        if self.state == WeaponState::Reloading {
            self.state = WeaponState::Idle;
        }
    }

    /// Finish a reload when its scheduled completion comes due.
    ///
    /// Ignored unless `handle` is the completion this gun is waiting on.
    pub(crate) fn complete_reload(
        &mut self,
        handle: TimerHandle,
        tactical: bool,
        events: &mut TickEvents,
    ) {
        if self.reload_timer != Some(handle) || self.state != WeaponState::Reloading {
            return;
        }
        self.reload_timer = None;
        self.reload_in_flight = None;

        let clip = self.data.capacity + u32::from(tactical);
        self.clip.set(clip);
        self.state = WeaponState::Idle;
        self.destroy_magazine(events);

        events.push(GameEvent::ReloadCompleted { gun: self.id, clip });
        tracing::debug!(gun = self.id, clip, tactical, "Reload completed");
    }

    fn destroy_magazine(&mut self, events: &mut TickEvents) {
        if let Some(prop) = self.magazine.take() {
            events.push(GameEvent::DestroyProp { prop });
        }
    }

    /// Engage or disengage the sights.
    ///
    /// Refused while reloading with no round available to fire.
    pub fn set_aiming(&mut self, aiming: bool, ctx: &mut GunContext<'_>) {
        if self.state == WeaponState::Reloading && !self.can_fire(ctx) {
            return;
        }
        if self.aiming == aiming {
            return;
        }

        if let Some(character) = self.wielder.and_then(|id| ctx.characters.get_mut(id)) {
            if aiming {
                character.aim();
            } else {
                character.unaim();
            }
        }
        if aiming {
            self.cancel_reload(ctx);
        }
        self.aiming = aiming;
    }

    fn drop_magazine(&self, ctx: &mut GunContext<'_>) {
        let Some(velocity) = self
            .wielder
            .and_then(|id| ctx.characters.get(id))
            .map(|c| c.pose().velocity)
        else {
            return;
        };
        ctx.events.push(GameEvent::SpawnProp {
            prop: ctx.props.allocate(),
            kind: PropKind::EmptyMagazine,
            placement: PropPlacement::AtSocket {
                owner: self.id,
                socket: self.data.sockets.magazine.clone(),
            },
            impulse: velocity * MAGAZINE_DROP_IMPULSE_SCALE,
        });
    }

    fn grab_magazine(&mut self, ctx: &mut GunContext<'_>) {
        let Some(wielder) = self.wielder.filter(|id| ctx.characters.contains(*id)) else {
            return;
        };
        self.destroy_magazine(ctx.events);

        let prop = ctx.props.allocate();
        ctx.events.push(GameEvent::SpawnProp {
            prop,
            kind: PropKind::NewMagazine,
            placement: PropPlacement::AttachedTo {
                owner: wielder,
                socket: self.data.sockets.magazine.clone(),
            },
            impulse: Vec3::ZERO,
        });
        self.magazine = Some(prop);
    }

    fn play_weapon_animation(&self, clip: &str, events: &mut TickEvents) {
        events.push(GameEvent::PlayAnimation {
            target: AnimationTarget::Weapon(self.id),
            clip: clip.to_string(),
            duration: None,
        });
    }

    /// Overwrite a replicated field with the authority's value.
    pub(crate) fn receive_field(&mut self, field: FieldUpdate, events: &mut TickEvents) {
        match field {
            FieldUpdate::Clip(clip) => {
                self.clip.receive(clip);
                // The authority finished the reload this copy is animating.
                if self.reload_in_flight.is_some() && clip >= self.data.capacity {
                    self.reload_in_flight = None;
                    self.destroy_magazine(events);
                }
            }
            FieldUpdate::SpreadSeed(seed) => {
                self.spread_seed.receive(seed);
                self.spread.reseed(seed);
                tracing::debug!(gun = self.id, seed, "Spread stream re-seeded");
            }
            FieldUpdate::Health(_) | FieldUpdate::Alive(_) => {
                tracing::warn!(gun = self.id, ?field, "Character field addressed to a gun");
            }
        }
    }

    pub(crate) fn drain_replication(&mut self, updates: &mut Vec<ReplicationUpdate>) {
        if let Some(clip) = self.clip.take_dirty() {
            updates.push(ReplicationUpdate {
                entity: self.id,
                field: FieldUpdate::Clip(clip),
            });
        }
        if let Some(seed) = self.spread_seed.take_dirty() {
            updates.push(ReplicationUpdate {
                entity: self.id,
                field: FieldUpdate::SpreadSeed(seed),
            });
        }
    }
}

impl Weapon for Gun {
    fn id(&self) -> EntityId {
        self.id
    }

    fn wielder(&self) -> Option<EntityId> {
        self.wielder
    }

    fn state(&self) -> WeaponState {
        self.state
    }

    fn clip(&self) -> u32 {
        self.clip.value()
    }

    fn fire_pressed(&mut self, ctx: &mut GunContext<'_>) {
        if let Some(character) = self.wielder.and_then(|id| ctx.characters.get_mut(id)) {
            if character.is_locally_controlled() {
                character.set_sprinting(false);
            }
        }
        self.wants_to_fire = true;
        if self.can_fire(ctx) {
            self.begin_firing(ctx);
        }
    }

    fn fire_released(&mut self, _ctx: &mut GunContext<'_>) {
        self.wants_to_fire = false;
        if self.state == WeaponState::Firing {
            self.stop_firing();
        }
    }

    fn aim_pressed(&mut self, ctx: &mut GunContext<'_>) {
        let aiming = if self.toggle_aim { !self.aiming } else { true };
        self.set_aiming(aiming, ctx);
    }

    fn aim_released(&mut self, ctx: &mut GunContext<'_>) {
        if !self.toggle_aim {
            self.set_aiming(false, ctx);
        }
    }

    fn reload(&mut self, ctx: &mut GunContext<'_>) {
        if !self.can_reload() {
            return;
        }
        self.fire_released(ctx);
        self.set_aiming(false, ctx);

        let kind = ReloadKind::select(self.clip(), self.data.chamber);
        let (clip, duration) = match kind {
            ReloadKind::Tactical => (
                &self.data.animations.character_tactical_reload,
                self.data.tactical_reload_time,
            ),
            ReloadKind::Full => (
                &self.data.animations.character_full_reload,
                self.data.full_reload_time,
            ),
        };
        if let Some(wielder) = self.wielder {
            ctx.events.push(GameEvent::PlayAnimation {
                target: AnimationTarget::Character(wielder),
                clip: clip.clone(),
                duration: Some(duration.to_num::<f32>()),
            });
        }
        self.reload_in_flight = Some(kind);
        ctx.events.push(GameEvent::ReloadStarted { gun: self.id, kind });

        if self.role.has_authority() {
            self.state = WeaponState::Reloading;
            self.reload_timer = Some(ctx.scheduler.schedule(
                ctx.now,
                duration,
                ScheduledTask::ReloadComplete {
                    gun: self.id,
                    tactical: kind == ReloadKind::Tactical,
                },
            ));
        }
        tracing::debug!(gun = self.id, ?kind, clip = self.clip(), "Reload started");
    }

    fn holster(&mut self, ctx: &mut GunContext<'_>) {
        self.cancel_reload(ctx);
        self.set_aiming(false, ctx);
        self.fire_released(ctx);
    }

    fn handle_notify(&mut self, notify: ReloadNotify, ctx: &mut GunContext<'_>) {
        let data = Arc::clone(&self.data);
        let animations = &data.animations;
        match notify {
            ReloadNotify::DropMagazine => self.drop_magazine(ctx),
            ReloadNotify::GrabMagazine => self.grab_magazine(ctx),
            ReloadNotify::MagazineIn => {
                self.play_weapon_animation(&animations.magazine_in, ctx.events);
                self.destroy_magazine(ctx.events);
            }
            ReloadNotify::MagazineOut => {
                self.play_weapon_animation(&animations.magazine_out, ctx.events);
            }
            ReloadNotify::Bolt => self.play_weapon_animation(&animations.bolt, ctx.events),
            ReloadNotify::EndReload => {
                if let Some(wielder) = self.wielder {
                    ctx.events.push(GameEvent::StopAnimation {
                        target: AnimationTarget::Character(wielder),
                        clip: animations.character_tactical_reload.clone(),
                    });
                }
            }
        }
    }

    fn tick(&mut self, dt: Fixed, ctx: &mut GunContext<'_>) {
        if !self.wants_to_fire {
            if self.state == WeaponState::Firing {
                self.stop_firing();
            }
            return;
        }
        if !self.data.automatic || !self.can_sustain_fire(ctx.characters) {
            return;
        }

        let interval = self.data.shot_interval();
        let since_last = self
            .last_fire
            .map_or(interval, |last| (ctx.now - last).max(Fixed::ZERO));
        self.fire_lag = if self.state == WeaponState::Firing {
            // Never more than one tick's backlog.
            since_last.min(interval.saturating_add(dt))
        } else {
            self.state = WeaponState::Firing;
            since_last.min(interval)
        };

        while self.fire_lag >= interval && self.can_sustain_fire(ctx.characters) {
            self.fire_lag -= interval;
            let at = ctx.now - self.fire_lag;
            self.fire(at, ctx);
        }
    }

    fn teardown(&mut self, ctx: &mut GunContext<'_>) {
        self.cancel_reload(ctx);
        self.wants_to_fire = false;
        self.aiming = false;
        self.state = WeaponState::Idle;
        self.fire_lag = Fixed::ZERO;
    }
}

/// Every weapon archetype the simulation can hold.
#[derive(Debug, Clone)]
pub enum Armament {
    /// Hit-scan firearm.
    Gun(Gun),
}

impl Armament {
    /// The firearm, if this is one.
    #[must_use]
    pub const fn as_gun(&self) -> Option<&Gun> {
        match self {
            Self::Gun(gun) => Some(gun),
        }
    }

    /// The firearm, mutably, if this is one.
    pub fn as_gun_mut(&mut self) -> Option<&mut Gun> {
        match self {
            Self::Gun(gun) => Some(gun),
        }
    }

    fn weapon(&self) -> &dyn Weapon {
        match self {
            Self::Gun(gun) => gun,
        }
    }

    fn weapon_mut(&mut self) -> &mut dyn Weapon {
        match self {
            Self::Gun(gun) => gun,
        }
    }

    pub(crate) fn attach(&mut self, wielder: Option<EntityId>) {
        match self {
            Self::Gun(gun) => gun.attach(wielder),
        }
    }

    pub(crate) fn receive_field(&mut self, field: FieldUpdate, events: &mut TickEvents) {
        match self {
            Self::Gun(gun) => gun.receive_field(field, events),
        }
    }

    pub(crate) fn drain_replication(&mut self, updates: &mut Vec<ReplicationUpdate>) {
        match self {
            Self::Gun(gun) => gun.drain_replication(updates),
        }
    }

    pub(crate) fn role(&self) -> NetRole {
        match self {
            Self::Gun(gun) => gun.role(),
        }
    }
}

impl From<Gun> for Armament {
    fn from(gun: Gun) -> Self {
        Self::Gun(gun)
    }
}

impl Weapon for Armament {
    fn id(&self) -> EntityId {
        self.weapon().id()
    }

    fn wielder(&self) -> Option<EntityId> {
        self.weapon().wielder()
    }

    fn state(&self) -> WeaponState {
        self.weapon().state()
    }

    fn clip(&self) -> u32 {
        self.weapon().clip()
    }

    fn fire_pressed(&mut self, ctx: &mut GunContext<'_>) {
        self.weapon_mut().fire_pressed(ctx);
    }

    fn fire_released(&mut self, ctx: &mut GunContext<'_>) {
        self.weapon_mut().fire_released(ctx);
    }

    fn aim_pressed(&mut self, ctx: &mut GunContext<'_>) {
        self.weapon_mut().aim_pressed(ctx);
    }

    fn aim_released(&mut self, ctx: &mut GunContext<'_>) {
        self.weapon_mut().aim_released(ctx);
    }

    fn reload(&mut self, ctx: &mut GunContext<'_>) {
        self.weapon_mut().reload(ctx);
    }

    fn holster(&mut self, ctx: &mut GunContext<'_>) {
        self.weapon_mut().holster(ctx);
    }

    fn handle_notify(&mut self, notify: ReloadNotify, ctx: &mut GunContext<'_>) {
        self.weapon_mut().handle_notify(notify, ctx);
    }

    fn tick(&mut self, dt: Fixed, ctx: &mut GunContext<'_>) {
        self.weapon_mut().tick(dt, ctx);
    }

    fn teardown(&mut self, ctx: &mut GunContext<'_>) {
        self.weapon_mut().teardown(ctx);
    }
}
