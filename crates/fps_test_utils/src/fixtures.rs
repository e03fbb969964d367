//! Test fixtures and helpers.
//!
//! Pre-built data records, a scripted world collaborator and ready-made
//! simulations for consistent testing.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use fixed::types::I32F32;
use fps_core::components::{EntityId, NetRole, Pose};
use fps_core::data::{CharacterData, GunData};
use fps_core::math::{Fixed, Vec3};
use fps_core::simulation::Simulation;
use fps_core::world::{RayHit, World};
use serde::Serialize;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: prefer binary fractions (0.5, 0.125, 1/64) in assertions that
/// compare for exact equality.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Serialize a data record to pretty RON.
///
/// # Panics
///
/// Panics if the record cannot be represented in RON.
#[must_use]
pub fn to_ron<T: Serialize>(value: &T) -> String {
    ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
        .expect("data records serialize to RON")
}

/// Automatic rifle with cadence and durations that are exact in fixed point.
///
/// 480 rpm (one round per 0.125 s), 30 rounds plus a chambered one,
/// 10 damage, tactical reload 2 s, full reload 2.5 s, aim time 0.25 s.
#[must_use]
pub fn test_rifle() -> GunData {
    GunData {
        id: "test_rifle".to_string(),
        rounds_per_minute: fixed(480),
        damage: fixed(10),
        hipfire_spread: fixed_f(0.0625),
        aim_time: fixed_f(0.25),
        tactical_reload_time: fixed(2),
        full_reload_time: fixed_f(2.5),
        ..GunData::rifle()
    }
}

/// Semi-automatic variant of [`test_rifle`].
#[must_use]
pub fn test_pistol() -> GunData {
    GunData {
        id: "test_pistol".to_string(),
        automatic: false,
        capacity: 12,
        ..test_rifle()
    }
}

/// 100 health, `spine` takes double damage.
#[must_use]
pub fn test_soldier() -> CharacterData {
    let mut data = CharacterData::soldier();
    data.id = "test_soldier".to_string();
    data.hit_bone_damage_multipliers
        .insert("spine".to_string(), fixed(2));
    data
}

/// One scripted ray answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCast {
    /// Ray origin.
    pub origin: Vec3,
    /// Ray direction.
    pub direction: Vec3,
    /// Ray length.
    pub max_distance: f32,
}

/// World collaborator answering from a script.
///
/// Queued answers are consumed one per ray cast; once the queue is empty
/// the default answer is returned. Every cast is recorded.
#[derive(Debug, Default)]
pub struct ScriptedWorld {
    default_hit: Option<RayHit>,
    queued: RefCell<VecDeque<Option<RayHit>>>,
    sockets: HashMap<(EntityId, String), Vec3>,
    casts: RefCell<Vec<RecordedCast>>,
}

impl ScriptedWorld {
    /// World where every ray misses and no socket exists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unscripted ray with `hit`.
    #[must_use]
    pub fn with_default_hit(mut self, hit: RayHit) -> Self {
        self.default_hit = Some(hit);
        self
    }

    /// Place a socket.
    #[must_use]
    pub fn with_socket(mut self, owner: EntityId, socket: &str, location: Vec3) -> Self {
        self.sockets.insert((owner, socket.to_string()), location);
        self
    }

    /// Queue the answer for the next unanswered ray.
    pub fn push_answer(&self, hit: Option<RayHit>) {
        self.queued.borrow_mut().push_back(hit);
    }

    /// Every ray cast so far.
    #[must_use]
    pub fn casts(&self) -> Vec<RecordedCast> {
        self.casts.borrow().clone()
    }

    /// Forget recorded casts.
    pub fn clear_casts(&self) {
        self.casts.borrow_mut().clear();
    }
}

impl World for ScriptedWorld {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        _ignore: &[EntityId],
    ) -> Option<RayHit> {
        self.casts.borrow_mut().push(RecordedCast {
            origin,
            direction,
            max_distance,
        });
        self.queued
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.default_hit.clone())
    }

    fn socket_location(&self, owner: EntityId, socket: &str) -> Option<Vec3> {
        self.sockets.get(&(owner, socket.to_string())).copied()
    }
}

/// Shooter and target facing each other, the shooter holding a gun.
#[derive(Debug, Clone)]
pub struct Duel {
    /// The simulation.
    pub sim: Simulation,
    /// Character holding the gun.
    pub shooter: EntityId,
    /// Character being shot at.
    pub target: EntityId,
    /// The shooter's gun.
    pub gun: EntityId,
}

impl Duel {
    /// Authority-side duel with [`test_soldier`] characters and `gun`.
    #[must_use]
    pub fn new(gun: GunData) -> Self {
        Self::with_role(gun, NetRole::Authority)
    }

    /// Duel whose entities all have `role`.
    ///
    /// Spawn order is fixed, so duels built on different participants
    /// agree on entity ids.
    ///
    /// # Panics
    ///
    /// Never; spawned entities always exist.
    #[must_use]
    pub fn with_role(gun: GunData, role: NetRole) -> Self {
        let mut sim = Simulation::new();
        let soldier = Arc::new(test_soldier());
        let shooter = sim.spawn_character(Arc::clone(&soldier), role, role != NetRole::SimulatedProxy);
        let target = sim.spawn_character(soldier, role, false);
        let gun = sim.spawn_gun(Arc::new(gun), role);
        sim.equip(shooter, gun).expect("fixture entities exist");
        sim.set_pose(shooter, Pose::looking(Vec3::ZERO, Vec3::X))
            .expect("fixture entities exist");
        sim.set_pose(
            target,
            Pose::looking(Vec3::new(1_000.0, 0.0, 0.0), -Vec3::X),
        )
        .expect("fixture entities exist");
        Self {
            sim,
            shooter,
            target,
            gun,
        }
    }

    /// Hit on the target's `bone` where the target stands.
    #[must_use]
    pub fn hit_on(&self, bone: &str) -> RayHit {
        RayHit::geometry(Vec3::new(1_000.0, 0.0, 0.0), -Vec3::X)
            .on_entity(self.target, Some(bone))
            .with_surface("Flesh")
    }

    /// Run `ticks` ticks of `dt`, returning the number of rounds fired.
    pub fn run(&mut self, ticks: u32, dt: Fixed, world: &dyn World) -> usize {
        (0..ticks)
            .map(|_| self.sim.tick(dt, world).shots_fired())
            .sum()
    }
}
