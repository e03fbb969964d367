//! Arena world collaborator.
//!
//! Characters are approximated by one sphere per bone, placed relative to
//! their feet; the arena has a flat concrete floor. Sockets are derived
//! from the wielder's pose every sync.

use std::collections::HashMap;

use fps_core::components::EntityId;
use fps_core::gun::Weapon;
use fps_core::math::Vec3;
use fps_core::simulation::Simulation;
use fps_core::world::{RayHit, World};

/// Eye height above the feet.
pub const EYE_HEIGHT: f32 = 165.0;

/// Surface type reported for character hits.
pub const FLESH: &str = "Flesh";

/// Surface type reported for floor hits.
pub const CONCRETE: &str = "Concrete";

/// One bone's hit sphere, relative to the character's feet.
#[derive(Debug, Clone, PartialEq)]
pub struct HitVolume {
    /// Bone name reported on hit.
    pub bone: String,
    /// Sphere center offset from the feet.
    pub offset: Vec3,
    /// Sphere radius.
    pub radius: f32,
}

impl HitVolume {
    fn new(bone: &str, offset: Vec3, radius: f32) -> Self {
        Self {
            bone: bone.to_string(),
            offset,
            radius,
        }
    }
}

/// Standing humanoid.
#[must_use]
pub fn humanoid_volumes() -> Vec<HitVolume> {
    vec![
        HitVolume::new("head", Vec3::new(0.0, 0.0, 160.0), 12.0),
        HitVolume::new("neck", Vec3::new(0.0, 0.0, 145.0), 6.0),
        HitVolume::new("spine", Vec3::new(0.0, 0.0, 125.0), 18.0),
        HitVolume::new("upperarm_l", Vec3::new(0.0, 24.0, 130.0), 7.0),
        HitVolume::new("upperarm_r", Vec3::new(0.0, -24.0, 130.0), 7.0),
        HitVolume::new("pelvis", Vec3::new(0.0, 0.0, 95.0), 16.0),
        HitVolume::new("thigh_l", Vec3::new(0.0, 8.0, 65.0), 9.0),
        HitVolume::new("thigh_r", Vec3::new(0.0, -8.0, 65.0), 9.0),
        HitVolume::new("calf_l", Vec3::new(0.0, 8.0, 25.0), 7.0),
        HitVolume::new("calf_r", Vec3::new(0.0, -8.0, 25.0), 7.0),
    ]
}

#[derive(Debug, Clone, Copy)]
struct Body {
    entity: EntityId,
    feet: Vec3,
}

/// World with per-bone hit spheres and a floor.
#[derive(Debug, Clone)]
pub struct ArenaWorld {
    volumes: Vec<HitVolume>,
    bodies: Vec<Body>,
    sockets: HashMap<(EntityId, String), Vec3>,
    floor_height: Option<f32>,
}

impl Default for ArenaWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaWorld {
    /// Empty arena with humanoid hit volumes and a floor at height 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            volumes: humanoid_volumes(),
            bodies: Vec::new(),
            sockets: HashMap::new(),
            floor_height: Some(0.0),
        }
    }

    /// Remove the floor.
    #[must_use]
    pub fn without_floor(mut self) -> Self {
        self.floor_height = None;
        self
    }

    /// Number of characters with hit volumes.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Rebuild bodies and sockets from the simulation's current poses.
    pub fn sync(&mut self, sim: &Simulation) {
        self.bodies.clear();
        self.sockets.clear();

        for id in sim.characters().sorted_ids() {
            let Some(character) = sim.character(id) else {
                continue;
            };
            let pose = character.pose();
            self.bodies.push(Body {
                entity: id,
                feet: pose.view_location - Vec3::Z * EYE_HEIGHT,
            });

            let Some(gun) = character.weapon().and_then(|weapon| sim.gun(weapon)) else {
                continue;
            };
            let eye = pose.view_location;
            let forward = pose.view_direction;
            let sockets = &gun.data().sockets;
            let gun_id = gun.id();

            let magazine = eye + forward * 30.0 - Vec3::Z * 20.0;
            self.place(gun_id, &sockets.muzzle, eye + forward * 60.0 - Vec3::Z * 10.0);
            self.place(gun_id, &sockets.aim, eye + forward * 10.0);
            self.place(gun_id, &sockets.aim_end, eye + forward * 40.0);
            self.place(gun_id, &sockets.magazine, magazine);
            // The wielder's hand holds the fresh magazine at the well.
            self.place(id, &sockets.magazine, magazine);
        }
    }

    fn place(&mut self, owner: EntityId, socket: &str, location: Vec3) {
        self.sockets.insert((owner, socket.to_string()), location);
    }

    fn hit_body(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: &[EntityId],
    ) -> Option<(f32, RayHit)> {
        let mut best: Option<(f32, RayHit)> = None;
        for body in self.bodies.iter().filter(|b| !ignore.contains(&b.entity)) {
            for volume in &self.volumes {
                let center = body.feet + volume.offset;
                let Some(distance) = ray_sphere(origin, direction, center, volume.radius) else {
                    continue;
                };
                if distance > max_distance || best.as_ref().is_some_and(|(d, _)| *d <= distance) {
                    continue;
                }
                let point = origin + direction * distance;
                let hit = RayHit::geometry(point, (point - center).normalize_or_zero())
                    .on_entity(body.entity, Some(&volume.bone))
                    .with_surface(FLESH);
                best = Some((distance, hit));
            }
        }
        best
    }

    fn hit_floor(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(f32, RayHit)> {
        let height = self.floor_height?;
        if direction.z >= 0.0 || origin.z < height {
            return None;
        }
        let distance = (height - origin.z) / direction.z;
        if distance > max_distance {
            return None;
        }
        let point = origin + direction * distance;
        Some((distance, RayHit::geometry(point, Vec3::Z).with_surface(CONCRETE)))
    }
}

/// Distance along a normalized ray to the first intersection with a sphere.
fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_origin = origin - center;
    let b = to_origin.dot(direction);
    let c = to_origin.dot(to_origin) - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let near = -b - root;
    let far = -b + root;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        // Origin inside the sphere.
        Some(0.0)
    } else {
        None
    }
}

impl World for ArenaWorld {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: &[EntityId],
    ) -> Option<RayHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        let body = self.hit_body(origin, direction, max_distance, ignore);
        let floor = self.hit_floor(origin, direction, max_distance);
        match (body, floor) {
            (Some((b, body)), Some((f, _))) if b <= f => Some(body),
            (_, Some((_, floor))) => Some(floor),
            (Some((_, body)), None) => Some(body),
            (None, None) => None,
        }
    }

    fn socket_location(&self, owner: EntityId, socket: &str) -> Option<Vec3> {
        self.sockets.get(&(owner, socket.to_string())).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fps_core::components::{NetRole, Pose};
    use fps_core::data::{CharacterData, GunData};

    use super::*;

    fn standing_at(x: f32) -> (Simulation, EntityId, EntityId) {
        let mut sim = Simulation::new();
        let soldier = Arc::new(CharacterData::soldier());
        let shooter = sim.spawn_character(Arc::clone(&soldier), NetRole::Authority, true);
        let target = sim.spawn_character(soldier, NetRole::Authority, false);
        sim.set_pose(target, Pose::looking(Vec3::new(x, 0.0, EYE_HEIGHT), -Vec3::X))
            .unwrap();
        (sim, shooter, target)
    }

    #[test]
    fn test_ray_hits_named_bone() {
        let (sim, shooter, target) = standing_at(1_000.0);
        let mut world = ArenaWorld::new();
        world.sync(&sim);
        assert_eq!(world.body_count(), 2);

        let origin = Vec3::new(0.0, 0.0, 125.0);
        let hit = world.cast_ray(origin, Vec3::X, 5_000.0, &[shooter]).unwrap();
        assert_eq!(hit.entity, Some(target));
        assert_eq!(hit.bone.as_deref(), Some("spine"));
        assert_eq!(hit.surface.as_deref(), Some(FLESH));
        assert!((hit.point.x - 982.0).abs() < 0.01);
    }

    #[test]
    fn test_ignored_entities_are_transparent() {
        let (sim, shooter, target) = standing_at(1_000.0);
        let mut world = ArenaWorld::new().without_floor();
        world.sync(&sim);

        let origin = Vec3::new(0.0, 0.0, 125.0);
        assert!(world
            .cast_ray(origin, Vec3::X, 5_000.0, &[shooter, target])
            .is_none());
    }

    #[test]
    fn test_out_of_range_misses() {
        let (sim, shooter, _) = standing_at(1_000.0);
        let mut world = ArenaWorld::new();
        world.sync(&sim);

        let origin = Vec3::new(0.0, 0.0, 125.0);
        assert!(world.cast_ray(origin, Vec3::X, 500.0, &[shooter]).is_none());
    }

    #[test]
    fn test_downward_ray_hits_floor() {
        let world = ArenaWorld::new();
        let hit = world
            .cast_ray(Vec3::new(0.0, 0.0, 100.0), -Vec3::Z, 1_000.0, &[])
            .unwrap();
        assert_eq!(hit.entity, None);
        assert_eq!(hit.surface.as_deref(), Some(CONCRETE));
        assert_eq!(hit.point, Vec3::ZERO);
    }

    #[test]
    fn test_sockets_follow_the_wielder() {
        let (mut sim, shooter, _) = standing_at(1_000.0);
        let gun = sim.spawn_gun(Arc::new(GunData::rifle()), NetRole::Authority);
        sim.equip(shooter, gun).unwrap();
        sim.set_pose(shooter, Pose::looking(Vec3::new(0.0, 0.0, EYE_HEIGHT), Vec3::X))
            .unwrap();

        let mut world = ArenaWorld::new();
        world.sync(&sim);

        let aim_end = world.socket_location(gun, "AimEnd").unwrap();
        assert_eq!(aim_end, Vec3::new(40.0, 0.0, EYE_HEIGHT));
        assert!(world.socket_location(gun, "Muzzle").is_some());
        assert!(world.socket_location(shooter, "Magazine").is_some());
        assert!(world.socket_location(gun, "Nope").is_none());
    }
}
