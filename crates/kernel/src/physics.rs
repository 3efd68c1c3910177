//! Physics capability used by the movement integrator.
//!
//! The kernel never steps a rigid-body simulation. It asks the physics layer
//! to resolve a desired translation for a character shape against world
//! geometry and other character bodies, and to cast rays for projectiles. [`RapierPhysics`] is the
//! production adapter; [`FlatGround`] is an infinite floor used by tests and
//! headless demos.
//!
//! # Determinism
//!
//! rapier3d is compiled with `enhanced-determinism`. Queries are issued in
//! entity-id order with a fixed dt, so results are reproducible on the same
//! platform.

use glam::Vec3;
use rapier3d::control::{CharacterLength, KinematicCharacterController};
use rapier3d::prelude::*;
use std::collections::BTreeMap;

use crate::platform::Pose;
use realm_common::{EntityId, PlatformId};
use realm_ecs::BodyShape;

/// A character movement request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterQuery {
    /// The moving entity; its own body never blocks it.
    pub mover: Option<EntityId>,
    /// Body centre before the move.
    pub position: Vec3,
    pub shape: BodyShape,
    pub desired: Vec3,
    pub dt: f32,
}

/// What the physics layer allowed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CharacterResolution {
    pub translation: Vec3,
    pub grounded: bool,
    pub sliding: bool,
}

impl CharacterResolution {
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite()
    }
}

pub trait CharacterPhysics {
    /// Resolve `query.desired` against world geometry and other bodies.
    fn resolve(&mut self, query: &CharacterQuery) -> CharacterResolution;

    /// Distance along `dir` (unit length) to the first world surface within
    /// `max_dist`. Character bodies are not world surfaces.
    fn cast_world_ray(&mut self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<f32>;

    /// Move or create the collider backing a platform.
    fn sync_platform(&mut self, _id: PlatformId, _pose: Pose, _half_extents: Vec3) {}

    /// Move or create the collider standing in for a character or dummy.
    fn sync_body(&mut self, _id: EntityId, _position: Vec3, _shape: BodyShape) {}

    fn remove_body(&mut self, _id: EntityId) {}
}

/// Infinite horizontal floor at a fixed height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGround {
    pub height: f32,
}

impl FlatGround {
    /// Feet this close to the floor count as grounded.
    pub const CONTACT: f32 = 0.02;

    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl Default for FlatGround {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl CharacterPhysics for FlatGround {
    fn resolve(&mut self, query: &CharacterQuery) -> CharacterResolution {
        let mut translation = query.desired;
        let foot = query.position.y - query.shape.foot_offset() + translation.y;
        let grounded = if foot <= self.height + Self::CONTACT && translation.y <= 0.0 {
            translation.y += self.height - foot;
            true
        } else {
            false
        };
        CharacterResolution {
            translation,
            grounded,
            sliding: false,
        }
    }

    fn cast_world_ray(&mut self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<f32> {
        if dir.y >= 0.0 || origin.y < self.height {
            return None;
        }
        let t = (self.height - origin.y) / dir.y;
        (t <= max_dist).then_some(t)
    }
}

/// Static, platform and character geometry in rapier collider sets, queried
/// with the kinematic character controller.
///
/// Character colliders carry `entity + 1` in `user_data`; world geometry
/// keeps 0.
pub struct RapierPhysics {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    islands: IslandManager,
    queries: QueryPipeline,
    controller: KinematicCharacterController,
    platforms: BTreeMap<PlatformId, ColliderHandle>,
    characters: BTreeMap<EntityId, ColliderHandle>,
    stale: bool,
}

fn body_tag(id: EntityId) -> u128 {
    id.0 as u128 + 1
}

/// Whether `collider` is a character body already overlapping a capsule at
/// `position`. Such bodies do not block, so players sharing a spawn point can
/// walk apart.
fn overlaps_capsule(collider: &Collider, position: Vec3, shape: BodyShape) -> bool {
    let Some(capsule) = collider.shape().as_capsule() else {
        return false;
    };
    let c = collider.translation();
    let horizontal = Vec3::new(c.x - position.x, 0.0, c.z - position.z).length();
    let vertical = (c.y - position.y).abs();
    horizontal < capsule.radius + shape.radius
        && vertical < capsule.half_height() + shape.half_height + capsule.radius + shape.radius
}

impl RapierPhysics {
    /// Small downward probe added to non-rising moves so resting bodies keep
    /// reporting ground contact.
    const GROUND_PROBE: f32 = 0.01;

    pub fn new() -> Self {
        let controller = KinematicCharacterController {
            slide: true,
            snap_to_ground: Some(CharacterLength::Absolute(0.2)),
            max_slope_climb_angle: 45_f32.to_radians(),
            min_slope_slide_angle: 30_f32.to_radians(),
            offset: CharacterLength::Absolute(0.01),
            ..Default::default()
        };
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            islands: IslandManager::new(),
            queries: QueryPipeline::new(),
            controller,
            platforms: BTreeMap::new(),
            characters: BTreeMap::new(),
            stale: true,
        }
    }

    /// Add a fixed box of world geometry.
    pub fn add_static_box(&mut self, center: Vec3, half_extents: Vec3) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(vector![center.x, center.y, center.z])
            .build();
        self.stale = true;
        self.colliders.insert(collider)
    }

    /// A large slab whose top surface sits at `height`.
    pub fn add_floor(&mut self, height: f32, half_size: f32) -> ColliderHandle {
        self.add_static_box(
            Vec3::new(0.0, height - 0.5, 0.0),
            Vec3::new(half_size, 0.5, half_size),
        )
    }

    pub fn remove_platform(&mut self, id: PlatformId) {
        if let Some(handle) = self.platforms.remove(&id) {
            self.colliders
                .remove(handle, &mut self.islands, &mut self.bodies, false);
            self.stale = true;
        }
    }

    pub fn body_count(&self) -> usize {
        self.characters.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    fn refresh(&mut self) {
        if self.stale {
            self.queries.update(&self.colliders);
            self.stale = false;
        }
    }
}

impl Default for RapierPhysics {
    fn default() -> Self {
        Self::new()
    }
}

fn isometry(position: Vec3, yaw: f32) -> Isometry<Real> {
    Isometry::new(
        vector![position.x, position.y, position.z],
        vector![0.0, yaw, 0.0],
    )
}

impl CharacterPhysics for RapierPhysics {
    fn resolve(&mut self, query: &CharacterQuery) -> CharacterResolution {
        self.refresh();
        let shape = SharedShape::capsule_y(query.shape.half_height, query.shape.radius);
        let pos = isometry(query.position, 0.0);
        let mut desired = query.desired;
        if desired.y <= 0.0 {
            desired.y -= Self::GROUND_PROBE;
        }
        let own = query.mover.map(body_tag);
        let blocks = |_: ColliderHandle, c: &Collider| {
            c.user_data == 0
                || (Some(c.user_data) != own && !overlaps_capsule(c, query.position, query.shape))
        };
        let movement = self.controller.move_shape(
            query.dt,
            &self.bodies,
            &self.colliders,
            &self.queries,
            &*shape,
            &pos,
            vector![desired.x, desired.y, desired.z],
            QueryFilter::default().predicate(&blocks),
            |_| {},
        );
        let t = movement.translation;
        CharacterResolution {
            translation: Vec3::new(t.x, t.y, t.z),
            grounded: movement.grounded,
            sliding: movement.is_sliding_down_slope,
        }
    }

    fn cast_world_ray(&mut self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<f32> {
        self.refresh();
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![dir.x, dir.y, dir.z],
        );
        let world_only = |_: ColliderHandle, c: &Collider| c.user_data == 0;
        self.queries
            .cast_ray(
                &self.bodies,
                &self.colliders,
                &ray,
                max_dist,
                true,
                QueryFilter::default().predicate(&world_only),
            )
            .map(|(_, toi)| toi)
    }

    fn sync_platform(&mut self, id: PlatformId, pose: Pose, half_extents: Vec3) {
        let iso = isometry(pose.position, pose.yaw);
        match self.platforms.get(&id).and_then(|h| self.colliders.get_mut(*h)) {
            Some(collider) => collider.set_position(iso),
            None => {
                let collider =
                    ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
                        .position(iso)
                        .build();
                let handle = self.colliders.insert(collider);
                self.platforms.insert(id, handle);
            }
        }
        self.stale = true;
    }

    fn sync_body(&mut self, id: EntityId, position: Vec3, shape: BodyShape) {
        let iso = isometry(position, 0.0);
        let existing = self.characters.get(&id).and_then(|h| self.colliders.get_mut(*h));
        match existing {
            Some(collider)
                if collider
                    .shape()
                    .as_capsule()
                    .is_some_and(|c| c.radius == shape.radius && c.half_height() == shape.half_height) =>
            {
                if *collider.position() == iso {
                    return;
                }
                collider.set_position(iso);
            }
            _ => {
                self.remove_body(id);
                let collider = ColliderBuilder::capsule_y(shape.half_height, shape.radius)
                    .position(iso)
                    .user_data(body_tag(id))
                    .build();
                let handle = self.colliders.insert(collider);
                self.characters.insert(id, handle);
            }
        }
        self.stale = true;
    }

    fn remove_body(&mut self, id: EntityId) {
        if let Some(handle) = self.characters.remove(&id) {
            self.colliders
                .remove(handle, &mut self.islands, &mut self.bodies, false);
            self.stale = true;
        }
    }
}
