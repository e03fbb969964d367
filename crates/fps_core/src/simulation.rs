//! Core simulation loop.
//!
//! One [`Simulation`] runs per participant: the authority and every
//! observer each advance their own copy. It owns all characters and
//! weapons, the clock, the deferred-task scheduler and the queued input.
//!
//! # Determinism
//!
//! - Gameplay quantities are fixed-point ([`Fixed`]); only geometry handed
//!   to the [`World`] uses `f32`
//! - Spread randomness comes from seeded streams
//! - Entities are always visited in sorted id order
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use fps_core::components::{Command, NetRole};
//! use fps_core::data::{CharacterData, GunData};
//! use fps_core::math::Fixed;
//! use fps_core::simulation::Simulation;
//! use fps_core::world::EmptyWorld;
//!
//! let mut sim = Simulation::new();
//! let soldier = sim.spawn_character(Arc::new(CharacterData::soldier()), NetRole::Authority, true);
//! let rifle = sim.spawn_gun(Arc::new(GunData::rifle()), NetRole::Authority);
//! sim.equip(soldier, rifle).unwrap();
//!
//! sim.queue_command(soldier, Command::FirePressed).unwrap();
//! let events = sim.tick(Fixed::from_num(1) / 64, &EmptyWorld);
//! assert_eq!(events.shots_fired(), 1);
//! assert_eq!(sim.clip_count(rifle), Some(30));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::character::Character;
use crate::components::{Command, EntityId, NetRole, Pose, WeaponState};
use crate::data::{CharacterData, GunData};
use crate::error::{GameError, Result};
use crate::events::{GameEvent, TickEvents};
use crate::gun::{Armament, Gun, GunContext, PropAllocator, ReloadNotify, Weapon};
use crate::math::Fixed;
use crate::random::SpreadRandom;
use crate::replication::{Multicast, ReplicationFrame, ReplicationUpdate};
use crate::schedule::{ScheduledTask, Scheduler};
use crate::world::{EmptyWorld, World};

/// Tick rate hosts use unless they drive their own `dt`.
///
/// A power of two keeps `1 / TICK_RATE` exact in fixed point.
pub const TICK_RATE: u32 = 64;

/// Seed for the stream that hands out per-gun spread seeds.
pub const DEFAULT_SEED: u32 = 0x5EED;

/// Aim blend duration for characters without a weapon.
fn unarmed_aim_time() -> Fixed {
    Fixed::from_num(0.25)
}

/// Seconds per tick at [`TICK_RATE`].
#[must_use]
pub fn tick_duration() -> Fixed {
    Fixed::ONE / Fixed::from_num(TICK_RATE)
}

/// Storage for one kind of entity, keyed by id.
#[derive(Debug, Clone)]
pub struct EntityStorage<T> {
    entities: HashMap<EntityId, T>,
}

impl<T> EntityStorage<T> {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }

    /// Insert an entity under `id`, returning any entity it replaced.
    pub fn insert(&mut self, id: EntityId, entity: T) -> Option<T> {
        self.entities.insert(id, entity)
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &T)> {
        self.entities.iter()
    }
}

impl<T> Default for EntityStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The combat simulation of one participant.
///
/// # Tick Order
///
/// 1. **Clock** - advance by `dt`
/// 2. **Commands** - queued input, in arrival order
/// 3. **Scheduler** - due reload completions
/// 4. **Weapons** - automatic fire
/// 5. **Aim** - character aim blends
/// 6. **Deaths** - tear down the weapons of dead characters
/// 7. **Counter** - tick number
///
/// Input therefore lands before automatic fire is re-evaluated, so a press
/// and release queued for the same tick are both observed.
#[derive(Debug, Clone)]
pub struct Simulation {
    tick: u64,
    now: Fixed,
    next_id: EntityId,
    characters: EntityStorage<Character>,
    weapons: EntityStorage<Armament>,
    scheduler: Scheduler,
    commands: Vec<(EntityId, Command)>,
    props: PropAllocator,
    seeds: SpreadRandom,
    pending: TickEvents,
}

impl Simulation {
    /// Create an empty simulation with the default seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Create an empty simulation whose guns draw spread seeds from `seed`.
    #[must_use]
    pub fn with_seed(seed: u32) -> Self {
        Self {
            tick: 0,
            now: Fixed::ZERO,
            next_id: 1,
            characters: EntityStorage::new(),
            weapons: EntityStorage::new(),
            scheduler: Scheduler::new(),
            commands: Vec::new(),
            props: PropAllocator::new(),
            seeds: SpreadRandom::new(seed),
            pending: TickEvents::default(),
        }
    }

    /// Current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulation clock in seconds.
    #[must_use]
    pub const fn now(&self) -> Fixed {
        self.now
    }

    /// All characters.
    #[must_use]
    pub const fn characters(&self) -> &EntityStorage<Character> {
        &self.characters
    }

    /// All weapons.
    #[must_use]
    pub const fn weapons(&self) -> &EntityStorage<Armament> {
        &self.weapons
    }

    /// Pending deferred tasks.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Get a character by ID.
    #[must_use]
    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.characters.get(id)
    }

    /// Get a weapon by ID.
    #[must_use]
    pub fn weapon(&self, id: EntityId) -> Option<&Armament> {
        self.weapons.get(id)
    }

    /// Get a gun by ID.
    #[must_use]
    pub fn gun(&self, id: EntityId) -> Option<&Gun> {
        self.weapons.get(id).and_then(Armament::as_gun)
    }

    /// Whether the character exists and is alive.
    #[must_use]
    pub fn is_alive(&self, character: EntityId) -> bool {
        self.characters.get(character).is_some_and(Character::is_alive)
    }

    /// Health of a character.
    #[must_use]
    pub fn health(&self, character: EntityId) -> Option<Fixed> {
        self.characters.get(character).map(Character::health)
    }

    /// Aim blend of a character.
    #[must_use]
    pub fn aim_blend_alpha(&self, character: EntityId) -> Option<Fixed> {
        self.characters.get(character).map(Character::aim_blend_alpha)
    }

    /// Rounds left in a weapon.
    #[must_use]
    pub fn clip_count(&self, weapon: EntityId) -> Option<u32> {
        self.weapons.get(weapon).map(Weapon::clip)
    }

    /// Fire-mode state of a weapon.
    #[must_use]
    pub fn weapon_state(&self, weapon: EntityId) -> Option<WeaponState> {
        self.weapons.get(weapon).map(Weapon::state)
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Spawn a character at full health.
    pub fn spawn_character(
        &mut self,
        data: Arc<CharacterData>,
        role: NetRole,
        locally_controlled: bool,
    ) -> EntityId {
        let id = self.allocate_id();
        self.characters
            .insert(id, Character::new(id, data, role, locally_controlled));
        tracing::debug!(character = id, ?role, "Character spawned");
        id
    }

    /// Spawn an unwielded gun with a fresh spread seed.
    pub fn spawn_gun(&mut self, data: Arc<GunData>, role: NetRole) -> EntityId {
        let id = self.allocate_id();
        let seed = self.seeds.next_u32();
        self.weapons
            .insert(id, Armament::Gun(Gun::new(id, data, role, seed)));
        tracing::debug!(gun = id, ?role, seed, "Gun spawned");
        id
    }

    /// Pick a new spread seed for a gun this participant is authoritative for.
    pub fn reseed_spread(&mut self, gun: EntityId, seed: u32) -> Result<()> {
        let gun = self
            .weapons
            .get_mut(gun)
            .and_then(Armament::as_gun_mut)
            .ok_or(GameError::EntityNotFound(gun))?;
        if gun.role().has_authority() {
            gun.set_spread_seed(seed);
        }
        Ok(())
    }

    /// Put `weapon` in `character`'s hands.
    ///
    /// A weapon already held by the character is holstered first; a weapon
    /// held by someone else is taken from them.
    pub fn equip(&mut self, character: EntityId, weapon: EntityId) -> Result<()> {
        let current = self
            .characters
            .get(character)
            .ok_or(GameError::EntityNotFound(character))?
            .weapon();
        if !self.weapons.contains(weapon) {
            return Err(GameError::EntityNotFound(weapon));
        }

        match current {
            Some(held) if held == weapon => {}
            Some(_) => self.holster_weapon(character, Some(weapon), &EmptyWorld),
            None => self.attach(character, weapon),
        }
        Ok(())
    }

    fn attach(&mut self, character: EntityId, weapon: EntityId) {
        let previous_owner = self.weapons.get(weapon).and_then(Weapon::wielder);
        if let Some(owner) = previous_owner.filter(|owner| *owner != character) {
            if let Some(owner) = self.characters.get_mut(owner) {
                owner.set_weapon(None);
            }
        }
        if let Some(armament) = self.weapons.get_mut(weapon) {
            armament.attach(Some(character));
        }
        if let Some(wielder) = self.characters.get_mut(character) {
            wielder.set_weapon(Some(weapon));
        }
    }

    /// Put away the held weapon and draw `next`, if given.
    fn holster_weapon(&mut self, character: EntityId, next: Option<EntityId>, world: &dyn World) {
        let Some(current) = self.characters.get(character).and_then(Character::weapon) else {
            if let Some(next) = next.filter(|n| self.weapons.contains(*n)) {
                self.attach(character, next);
            }
            return;
        };

        self.with_weapon(current, world, |weapon, ctx| weapon.holster(ctx));
        if let Some(armament) = self.weapons.get_mut(current) {
            armament.attach(None);
        }
        if let Some(wielder) = self.characters.get_mut(character) {
            wielder.set_weapon(None);
        }

        let next = next.filter(|n| *n != current && self.weapons.contains(*n));
        if let Some(next) = next {
            self.attach(character, next);
        }
        self.pending.push(GameEvent::Holstered {
            gun: current,
            character,
            next,
        });
        tracing::debug!(character, gun = current, ?next, "Weapon holstered");
    }

    /// Remove a character and tear down the weapon it holds.
    pub fn despawn_character(&mut self, character: EntityId) -> Result<()> {
        let weapon = self
            .characters
            .get(character)
            .ok_or(GameError::EntityNotFound(character))?
            .weapon();
        if let Some(weapon) = weapon {
            self.teardown_weapon(weapon);
        }
        self.characters.remove(character);
        self.commands.retain(|(target, _)| *target != character);
        tracing::debug!(character, "Character despawned");
        Ok(())
    }

    fn teardown_weapon(&mut self, weapon: EntityId) {
        self.with_weapon(weapon, &EmptyWorld, |weapon, ctx| weapon.teardown(ctx));
        self.weapons.remove(weapon);
    }

    /// Replace the pose of a character.
    pub fn set_pose(&mut self, character: EntityId, pose: Pose) -> Result<()> {
        self.characters
            .get_mut(character)
            .ok_or(GameError::EntityNotFound(character))?
            .set_pose(pose);
        Ok(())
    }

    /// Queue a command for the next tick.
    pub fn queue_command(&mut self, character: EntityId, command: Command) -> Result<()> {
        if !self.characters.contains(character) {
            return Err(GameError::EntityNotFound(character));
        }
        self.commands.push((character, command));
        Ok(())
    }

    /// Apply a command immediately.
    ///
    /// Resulting events are returned by the next [`tick`](Self::tick) or
    /// [`take_events`](Self::take_events).
    pub fn apply_command(
        &mut self,
        character: EntityId,
        command: Command,
        world: &dyn World,
    ) -> Result<()> {
        let issuer = self
            .characters
            .get_mut(character)
            .ok_or(GameError::EntityNotFound(character))?;
        if !issuer.input_enabled() {
            return Ok(());
        }

        match command {
            Command::SetSprint(sprinting) => issuer.set_sprinting(sprinting),
            Command::Holster { next } => self.holster_weapon(character, next, world),
            Command::FirePressed
            | Command::FireReleased
            | Command::AimPressed
            | Command::AimReleased
            | Command::Reload => {
                let Some(weapon) = issuer.weapon() else {
                    return Ok(());
                };
                self.with_weapon(weapon, world, |weapon, ctx| match command {
                    Command::FirePressed => weapon.fire_pressed(ctx),
                    Command::FireReleased => weapon.fire_released(ctx),
                    Command::AimPressed => weapon.aim_pressed(ctx),
                    Command::AimReleased => weapon.aim_released(ctx),
                    Command::Reload => weapon.reload(ctx),
                    Command::Holster { .. } | Command::SetSprint(_) => {}
                });
            }
        }
        Ok(())
    }

    /// Forward an animation-timeline notification to a weapon.
    pub fn reload_notify(
        &mut self,
        weapon: EntityId,
        notify: ReloadNotify,
        world: &dyn World,
    ) -> Result<()> {
        self.with_weapon(weapon, world, |weapon, ctx| weapon.handle_notify(notify, ctx))
            .ok_or(GameError::EntityNotFound(weapon))
    }

    /// Drain events produced outside of [`tick`](Self::tick).
    pub fn take_events(&mut self) -> TickEvents {
        std::mem::take(&mut self.pending)
    }

    fn with_weapon<R>(
        &mut self,
        weapon: EntityId,
        world: &dyn World,
        f: impl FnOnce(&mut Armament, &mut GunContext<'_>) -> R,
    ) -> Option<R> {
        let armament = self.weapons.get_mut(weapon)?;
        let mut ctx = GunContext {
            now: self.now,
            characters: &mut self.characters,
            world,
            scheduler: &mut self.scheduler,
            props: &mut self.props,
            events: &mut self.pending,
        };
        Some(f(armament, &mut ctx))
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Returns every event produced since the previous call, including
    /// those from commands applied directly between ticks.
    pub fn tick(&mut self, dt: Fixed, world: &dyn World) -> TickEvents {
        // 1. Clock
        self.now += dt;

        // 2. Commands
        for (character, command) in std::mem::take(&mut self.commands) {
            if let Err(err) = self.apply_command(character, command, world) {
                tracing::warn!(character, ?command, %err, "Dropped queued command");
            }
        }

        // 3. Scheduler
        self.run_scheduled_tasks();

        // 4. Weapons
        for id in self.weapons.sorted_ids() {
            self.with_weapon(id, world, |weapon, ctx| weapon.tick(dt, ctx));
        }

        // 5. Aim
        self.run_aim_system(dt);

        // 6. Deaths
        self.run_death_system();

        // 7. Counter
        self.tick += 1;

        #[cfg(feature = "debug-validation")]
        self.assert_invariants();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        std::mem::take(&mut self.pending)
    }

    fn run_scheduled_tasks(&mut self) {
        for (handle, task) in self.scheduler.drain_due(self.now) {
            match task {
                ScheduledTask::ReloadComplete { gun, tactical } => {
                    if let Some(gun) = self.weapons.get_mut(gun).and_then(Armament::as_gun_mut) {
                        gun.complete_reload(handle, tactical, &mut self.pending);
                    }
                }
            }
        }
    }

    fn run_aim_system(&mut self, dt: Fixed) {
        for id in self.characters.sorted_ids() {
            let aim_time = self
                .characters
                .get(id)
                .and_then(Character::weapon)
                .and_then(|weapon| self.gun(weapon))
                .map_or_else(unarmed_aim_time, |gun| gun.data().aim_time);
            if let Some(character) = self.characters.get_mut(id) {
                character.tick_aim(dt, aim_time, &mut self.pending);
            }
        }
    }

    fn run_death_system(&mut self) {
        let armed_dead: Vec<(EntityId, EntityId)> = self
            .characters
            .sorted_ids()
            .into_iter()
            .filter_map(|id| {
                let character = self.characters.get(id)?;
                match character.weapon() {
                    Some(weapon) if !character.is_alive() => Some((id, weapon)),
                    _ => None,
                }
            })
            .collect();

        for (character, weapon) in armed_dead {
            self.teardown_weapon(weapon);
            if let Some(character) = self.characters.get_mut(character) {
                character.set_weapon(None);
            }
            tracing::debug!(character, gun = weapon, "Weapon dropped on death");
        }
    }

    /// Panic if any cross-entity invariant is broken.
    #[cfg(feature = "debug-validation")]
    fn assert_invariants(&self) {
        for (id, character) in self.characters.iter() {
            assert_eq!(
                character.is_alive(),
                character.health() > Fixed::ZERO,
                "character {id}: alive must match positive health"
            );
            assert!(
                (Fixed::ZERO..=Fixed::ONE).contains(&character.aim_blend_alpha()),
                "character {id}: aim blend out of range"
            );
            if let Some(weapon) = character.weapon() {
                assert_eq!(
                    self.weapons.get(weapon).and_then(Weapon::wielder),
                    Some(*id),
                    "character {id}: weapon {weapon} does not point back"
                );
            }
        }
        for (id, weapon) in self.weapons.iter() {
            if let Some(gun) = weapon.as_gun() {
                assert!(
                    gun.clip() <= gun.data().max_rounds(),
                    "gun {id}: clip above capacity"
                );
            }
        }
    }

    /// Drain every changed field of the entities this participant owns.
    pub fn collect_replication(&mut self) -> ReplicationFrame {
        let mut frame = ReplicationFrame::new(self.tick);

        let mut ids: Vec<EntityId> = self
            .characters
            .sorted_ids()
            .into_iter()
            .chain(self.weapons.sorted_ids())
            .collect();
        ids.sort_unstable();

        for id in ids {
            if let Some(character) = self.characters.get_mut(id) {
                if character.role().has_authority() {
                    character.drain_replication(&mut frame.updates, &mut frame.multicasts);
                }
            } else if let Some(weapon) = self.weapons.get_mut(id) {
                if weapon.role().has_authority() {
                    weapon.drain_replication(&mut frame.updates);
                }
            }
        }
        frame
    }

    /// Apply a frame received from the authority.
    ///
    /// Entities this participant is authoritative for are never
    /// overwritten. Unknown entities are skipped.
    pub fn apply_replication(&mut self, frame: &ReplicationFrame) {
        for ReplicationUpdate { entity, field } in frame.updates.iter().copied() {
            if let Some(character) = self.characters.get_mut(entity) {
                if !character.role().has_authority() {
                    character.receive_field(field);
                }
            } else if let Some(weapon) = self.weapons.get_mut(entity) {
                if !weapon.role().has_authority() {
                    weapon.receive_field(field, &mut self.pending);
                }
            } else {
                tracing::trace!(entity, ?field, "Update for unknown entity");
            }
        }

        for multicast in &frame.multicasts {
            match *multicast {
                Multicast::Kill { character } => {
                    if let Some(character) = self
                        .characters
                        .get_mut(character)
                        .filter(|c| !c.role().has_authority())
                    {
                        character.kill(&mut self.pending);
                    }
                }
            }
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations fed the same inputs produce the same hash.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.now.to_bits().hash(&mut hasher);

        let ids = self.characters.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(character) = self.characters.get(id) {
                id.hash(&mut hasher);
                character.health().to_bits().hash(&mut hasher);
                character.is_alive().hash(&mut hasher);
                character.aim_blend_alpha().to_bits().hash(&mut hasher);
                character.is_sprinting().hash(&mut hasher);
                character.weapon().hash(&mut hasher);
            }
        }

        let ids = self.weapons.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(gun) = self.gun(id) {
                id.hash(&mut hasher);
                gun.state().hash(&mut hasher);
                gun.clip().hash(&mut hasher);
                gun.spread_seed().hash(&mut hasher);
                gun.last_fire().map(Fixed::to_bits).hash(&mut hasher);
                gun.is_aiming().hash(&mut hasher);
                gun.wielder().hash(&mut hasher);
                gun.magazine().hash(&mut hasher);
            }
        }

        self.scheduler.len().hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ReloadKind;
    use crate::math::Vec3;
    use crate::world::RayHit;

    fn dt() -> Fixed {
        tick_duration()
    }

    struct Duel {
        sim: Simulation,
        shooter: EntityId,
        target: EntityId,
        rifle: EntityId,
    }

    fn duel() -> Duel {
        let mut sim = Simulation::new();
        let data = Arc::new(CharacterData::soldier());
        let shooter = sim.spawn_character(Arc::clone(&data), NetRole::Authority, true);
        let target = sim.spawn_character(data, NetRole::Authority, false);
        let rifle = sim.spawn_gun(
            Arc::new(GunData {
                rounds_per_minute: Fixed::from_num(480),
                ..GunData::rifle()
            }),
            NetRole::Authority,
        );
        sim.equip(shooter, rifle).unwrap();
        Duel {
            sim,
            shooter,
            target,
            rifle,
        }
    }

    /// Every ray hits `target` in the chest.
    struct ChestShot(EntityId);

    impl World for ChestShot {
        fn cast_ray(&self, _: Vec3, _: Vec3, _: f32, _: &[EntityId]) -> Option<RayHit> {
            Some(RayHit::geometry(Vec3::new(10.0, 0.0, 0.0), -Vec3::X).on_entity(self.0, Some("spine")))
        }

        fn socket_location(&self, _: EntityId, _: &str) -> Option<Vec3> {
            None
        }
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::new();
        assert_eq!(sim.get_tick(), 0);
        assert_eq!(sim.now(), Fixed::ZERO);
        assert!(sim.characters().is_empty());
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut sim = Simulation::new();
        sim.tick(dt(), &EmptyWorld);
        sim.tick(dt(), &EmptyWorld);
        assert_eq!(sim.get_tick(), 2);
        assert_eq!(sim.now(), Fixed::from_num(2) / 64);
    }

    #[test]
    fn test_equip_links_both_sides() {
        let d = duel();
        assert_eq!(d.sim.character(d.shooter).unwrap().weapon(), Some(d.rifle));
        assert_eq!(d.sim.gun(d.rifle).unwrap().wielder(), Some(d.shooter));
    }

    #[test]
    fn test_equip_unknown_entity_fails() {
        let mut d = duel();
        assert!(matches!(
            d.sim.equip(d.shooter, 999),
            Err(GameError::EntityNotFound(999))
        ));
        assert!(d.sim.queue_command(999, Command::Reload).is_err());
    }

    #[test]
    fn test_queued_fire_shoots_once_per_interval() {
        let mut d = duel();
        d.sim.queue_command(d.shooter, Command::FirePressed).unwrap();

        let mut shots = 0;
        for _ in 0..64 {
            shots += d.sim.tick(dt(), &EmptyWorld).shots_fired();
        }
        // Pressed on the first tick: opening shot plus seven in the 63 ticks after.
        assert_eq!(shots, 8);
        assert_eq!(d.sim.clip_count(d.rifle), Some(23));
    }

    #[test]
    fn test_same_tick_press_and_release() {
        let mut d = duel();
        d.sim.queue_command(d.shooter, Command::FirePressed).unwrap();
        d.sim.queue_command(d.shooter, Command::FireReleased).unwrap();

        let events = d.sim.tick(dt(), &EmptyWorld);
        assert_eq!(events.shots_fired(), 1);
        assert_eq!(d.sim.weapon_state(d.rifle), Some(WeaponState::Idle));

        for _ in 0..32 {
            assert_eq!(d.sim.tick(dt(), &EmptyWorld).shots_fired(), 0);
        }
    }

    #[test]
    fn test_reload_completes_through_scheduler() {
        let mut d = duel();
        d.sim
            .apply_command(d.shooter, Command::FirePressed, &EmptyWorld)
            .unwrap();
        d.sim
            .apply_command(d.shooter, Command::FireReleased, &EmptyWorld)
            .unwrap();
        d.sim
            .apply_command(d.shooter, Command::Reload, &EmptyWorld)
            .unwrap();
        assert_eq!(d.sim.weapon_state(d.rifle), Some(WeaponState::Reloading));
        assert_eq!(
            d.sim.gun(d.rifle).unwrap().reload_in_flight(),
            Some(ReloadKind::Tactical)
        );

        let mut completed = false;
        for _ in 0..128 {
            let events = d.sim.tick(dt(), &EmptyWorld);
            completed |= events
                .iter()
                .any(|e| matches!(e, GameEvent::ReloadCompleted { clip: 31, .. }));
        }
        assert!(completed);
        assert_eq!(d.sim.clip_count(d.rifle), Some(31));
        assert_eq!(d.sim.weapon_state(d.rifle), Some(WeaponState::Idle));
    }

    #[test]
    fn test_killing_shot_drops_target_weapon() {
        let mut d = duel();
        let pistol = d.sim.spawn_gun(Arc::new(GunData::pistol()), NetRole::Authority);
        d.sim.equip(d.target, pistol).unwrap();
        let world = ChestShot(d.target);

        d.sim.queue_command(d.shooter, Command::FirePressed).unwrap();
        let mut deaths = Vec::new();
        for _ in 0..64 {
            deaths.extend(d.sim.tick(dt(), &world).deaths());
        }

        assert_eq!(deaths, vec![d.target]);
        assert!(!d.sim.is_alive(d.target));
        assert_eq!(d.sim.health(d.target), Some(Fixed::ZERO));
        assert_eq!(d.sim.character(d.target).unwrap().weapon(), None);
        assert!(d.sim.weapon(pistol).is_none());
    }

    #[test]
    fn test_dead_character_ignores_input() {
        let mut d = duel();
        d.sim
            .characters
            .get_mut(d.shooter)
            .unwrap()
            .kill(&mut TickEvents::default());
        d.sim
            .apply_command(d.shooter, Command::SetSprint(true), &EmptyWorld)
            .unwrap();
        assert!(!d.sim.character(d.shooter).unwrap().is_sprinting());
    }

    #[test]
    fn test_holster_swaps_weapons() {
        let mut d = duel();
        let pistol = d.sim.spawn_gun(Arc::new(GunData::pistol()), NetRole::Authority);
        d.sim
            .apply_command(d.shooter, Command::AimPressed, &EmptyWorld)
            .unwrap();
        assert!(d.sim.gun(d.rifle).unwrap().is_aiming());

        d.sim
            .apply_command(d.shooter, Command::Holster { next: Some(pistol) }, &EmptyWorld)
            .unwrap();
        let events = d.sim.take_events();

        assert!(!d.sim.gun(d.rifle).unwrap().is_aiming());
        assert_eq!(d.sim.gun(d.rifle).unwrap().wielder(), None);
        assert_eq!(d.sim.character(d.shooter).unwrap().weapon(), Some(pistol));
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Holstered { next: Some(p), .. } if *p == pistol
        )));
    }

    #[test]
    fn test_despawn_releases_magazine() {
        let mut d = duel();
        d.sim.apply_command(d.shooter, Command::FirePressed, &EmptyWorld).unwrap();
        d.sim.apply_command(d.shooter, Command::FireReleased, &EmptyWorld).unwrap();
        d.sim.apply_command(d.shooter, Command::Reload, &EmptyWorld).unwrap();
        d.sim
            .reload_notify(d.rifle, ReloadNotify::GrabMagazine, &EmptyWorld)
            .unwrap();

        d.sim.despawn_character(d.shooter).unwrap();
        let events = d.sim.take_events();
        assert_eq!(events.spawned_props(), events.destroyed_props());
        assert!(d.sim.scheduler().is_empty());
        assert!(d.sim.weapon(d.rifle).is_none());
    }

    #[test]
    fn test_replication_reaches_observer() {
        let mut authority = duel();
        let mut observer = Simulation::new();
        let data = Arc::new(CharacterData::soldier());
        let o_shooter = observer.spawn_character(Arc::clone(&data), NetRole::SimulatedProxy, false);
        let o_target = observer.spawn_character(data, NetRole::SimulatedProxy, false);
        let o_rifle = observer.spawn_gun(Arc::new(GunData::rifle()), NetRole::SimulatedProxy);
        observer.equip(o_shooter, o_rifle).unwrap();
        assert_eq!((o_shooter, o_target, o_rifle), (authority.shooter, authority.target, authority.rifle));

        let world = ChestShot(authority.target);
        authority.sim.queue_command(authority.shooter, Command::FirePressed).unwrap();
        for _ in 0..64 {
            authority.sim.tick(dt(), &world);
            let bytes = authority.sim.collect_replication().encode().unwrap();
            observer.apply_replication(&ReplicationFrame::decode(&bytes).unwrap());
            observer.tick(dt(), &EmptyWorld);
        }

        assert_eq!(observer.health(o_target), authority.sim.health(authority.target));
        assert_eq!(observer.is_alive(o_target), authority.sim.is_alive(authority.target));
        assert!(!observer.is_alive(o_target));
    }

    #[test]
    fn test_observer_never_overwrites_own_entities() {
        let mut observer = duel();
        let mut frame = ReplicationFrame::new(1);
        frame.updates.push(ReplicationUpdate {
            entity: observer.rifle,
            field: crate::replication::FieldUpdate::Clip(3),
        });
        frame.multicasts.push(Multicast::Kill {
            character: observer.target,
        });
        observer.sim.apply_replication(&frame);

        assert_eq!(observer.sim.clip_count(observer.rifle), Some(31));
        assert!(observer.sim.is_alive(observer.target));
    }

    #[test]
    fn test_deterministic_hash() {
        let run = || {
            let mut d = duel();
            let world = ChestShot(d.target);
            d.sim.queue_command(d.shooter, Command::FirePressed).unwrap();
            for _ in 0..40 {
                d.sim.tick(dt(), &world);
            }
            d.sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_reseed_only_on_authority() {
        let mut d = duel();
        d.sim.reseed_spread(d.rifle, 1234).unwrap();
        assert_eq!(d.sim.gun(d.rifle).unwrap().spread_seed(), 1234);
        let frame = d.sim.collect_replication();
        assert!(frame.updates.contains(&ReplicationUpdate {
            entity: d.rifle,
            field: crate::replication::FieldUpdate::SpreadSeed(1234),
        }));
    }
}
