//! World collaborator interface.
//!
//! The core does not own geometry. Line-of-fire queries and socket
//! transforms come from the host (physics engine, animation rig) through
//! the [`World`] trait.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::Vec3;

/// Result of a successful ray cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// Impact point.
    pub point: Vec3,
    /// Surface normal at the impact point.
    pub normal: Vec3,
    /// Entity struck, if the hit belongs to one.
    pub entity: Option<EntityId>,
    /// Bone struck on a skeletal target.
    pub bone: Option<String>,
    /// Physical surface type of the struck material.
    pub surface: Option<String>,
}

impl RayHit {
    /// A hit on static geometry.
    #[must_use]
    pub fn geometry(point: Vec3, normal: Vec3) -> Self {
        Self {
            point,
            normal,
            entity: None,
            bone: None,
            surface: None,
        }
    }

    /// Attach the struck entity and bone.
    #[must_use]
    pub fn on_entity(mut self, entity: EntityId, bone: Option<&str>) -> Self {
        self.entity = Some(entity);
        self.bone = bone.map(str::to_owned);
        self
    }

    /// Attach the surface type.
    #[must_use]
    pub fn with_surface(mut self, surface: impl Into<String>) -> Self {
        self.surface = Some(surface.into());
        self
    }
}

/// Queries the core needs answered synchronously.
pub trait World {
    /// Cast a ray from `origin` along the normalized `direction`.
    ///
    /// Returns the closest hit within `max_distance`, skipping any entity
    /// listed in `ignore`.
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: &[EntityId],
    ) -> Option<RayHit>;

    /// World location of a named socket on an entity's mesh.
    fn socket_location(&self, owner: EntityId, socket: &str) -> Option<Vec3>;
}

/// World with no geometry and no sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWorld;

impl World for EmptyWorld {
    fn cast_ray(&self, _: Vec3, _: Vec3, _: f32, _: &[EntityId]) -> Option<RayHit> {
        None
    }

    fn socket_location(&self, _: EntityId, _: &str) -> Option<Vec3> {
        None
    }
}
