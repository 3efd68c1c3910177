//! Per-tick character movement: platform carry, gravity, controller query
//! and grounding.
//!
//! The order within one player's update is fixed:
//! yaw carry, then horizontal integration, then the controller query.
//! Changing it changes what riders on rotating platforms see.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::physics::{CharacterPhysics, CharacterQuery};
use crate::platform::{Carry, PlatformSet};
use realm_common::{EntityId, MovementMode, PlatformId};
use realm_ecs::EntityStore;
use realm_input::wrap_angle;

/// Movement constants shared by every player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementTuning {
    pub gravity: f32,
    pub jump_impulse: f32,
    pub walk_speed: f32,
    pub jog_speed: f32,
    pub sprint_multiplier: f32,
    pub terminal_velocity: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            gravity: 20.0,
            jump_impulse: 7.2,
            walk_speed: 2.5,
            jog_speed: 5.0,
            sprint_multiplier: 1.6,
            terminal_velocity: 50.0,
        }
    }
}

impl MovementTuning {
    pub fn speed(&self, mode: MovementMode, sprint: bool) -> f32 {
        let base = match mode {
            MovementMode::Walk => self.walk_speed,
            MovementMode::Jog => self.jog_speed,
        };
        if sprint {
            base * self.sprint_multiplier
        } else {
            base
        }
    }
}

/// What one player's movement update did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub entity: EntityId,
    pub jumped: bool,
    pub moved: bool,
    pub grounded: bool,
    pub attached: Option<PlatformId>,
    pub sliding: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MovementIntegrator {
    pub tuning: MovementTuning,
}

impl MovementIntegrator {
    pub fn new(tuning: MovementTuning) -> Self {
        Self { tuning }
    }

    /// Advance one player by `dt`. Returns `None` if `id` is not a live player.
    ///
    /// Consumes the jump trigger from the player's intent.
    pub fn step_player(
        &self,
        store: &mut EntityStore,
        platforms: &PlatformSet,
        physics: &mut dyn CharacterPhysics,
        id: EntityId,
        dt: f32,
    ) -> Option<MoveOutcome> {
        let mode = store.player(id)?.movement_mode;
        let shape = store.shape(id)?;
        let intent = *store.intent(id)?;
        let start = *store.transform(id)?;
        let mut velocity = store.velocity(id)?;
        let mut grounded = store.grounded(id)?;
        let mut attached = store.attached_platform(id);

        let jumped = intent.jump && grounded;
        if jumped {
            velocity.y = self.tuning.jump_impulse;
            grounded = false;
            attached = None;
            store.set_ground_state(id, false, None);
        }
        if let Some(i) = store.intent_mut(id) {
            i.jump = false;
        }

        // 1. Carry from the platform we stood on at the end of last tick.
        let carry = match attached {
            Some(pid) => platforms.carry(pid, start.position),
            None => Carry::default(),
        };

        // 2. Yaw carry before anything reads the heading.
        let mut transform = start;
        transform.yaw = wrap_angle(transform.yaw + carry.yaw);

        // 3. Horizontal velocity from intent in the carried heading.
        let mut wish = transform.forward() * intent.forward + transform.right() * intent.strafe;
        if wish.length_squared() > 1.0 {
            wish = wish.normalize();
        }
        let speed = self.tuning.speed(mode, intent.sprint);
        velocity.x = wish.x * speed;
        velocity.z = wish.z * speed;

        // Vertical velocity.
        if attached.is_some() {
            velocity.y = 0.0;
        } else if jumped {
            // Keep the full impulse on the tick it was applied.
        } else if grounded && velocity.y <= 0.0 {
            velocity.y = 0.0;
        } else {
            velocity.y = (velocity.y - self.tuning.gravity * dt).max(-self.tuning.terminal_velocity);
        }

        // 4. Desired translation, resolved by the controller.
        let desired = Vec3::new(velocity.x, velocity.y, velocity.z) * dt + carry.translation;
        let resolution = physics.resolve(&CharacterQuery {
            mover: Some(id),
            position: transform.position,
            shape,
            desired,
            dt,
        });
        let resolution = if resolution.is_finite() {
            resolution
        } else {
            tracing::warn!(?id, ?desired, "controller returned non-finite translation; ignoring");
            Default::default()
        };

        // 5. Apply and re-derive ground state.
        transform.position += resolution.translation;
        if velocity.y > 0.0 {
            grounded = false;
            attached = None;
        } else {
            let contact = platforms.ground_contact(shape.foot_point(transform.position), attached);
            if let Some(c) = contact {
                // The controller keeps its own skin offset; only snap bodies it
                // did not already settle.
                if !resolution.grounded {
                    transform.position.y -= c.gap;
                }
            }
            grounded = resolution.grounded || contact.is_some();
            attached = contact.map(|c| c.platform);
        }
        if grounded {
            velocity.y = 0.0;
        }

        let moved = transform != start;
        if let Some(t) = store.transform_mut(id) {
            *t = transform;
        }
        store.set_velocity(id, velocity);
        store.set_ground_state(id, grounded, attached);

        Some(MoveOutcome {
            entity: id,
            jumped,
            moved,
            grounded,
            attached,
            sliding: resolution.sliding,
        })
    }
}
