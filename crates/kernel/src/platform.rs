//! Moving platforms: closed-form motion, per-tick carry and the proximity
//! grounding test.
//!
//! Platforms live in an arena keyed by [`PlatformId`]. Players refer to them
//! only by id, never by reference.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::TAU;

use realm_common::{EntityId, PlatformId};
use realm_input::wrap_angle;

/// Horizontal slack beyond the half extents when testing for footing.
pub const EDGE_MARGIN: f32 = 0.1;
/// Vertical distance from the top surface that still counts as standing on it.
pub const GROUND_TOLERANCE: f32 = 0.08;
/// Wider tolerance for the platform a body is already attached to.
pub const ATTACHED_TOLERANCE: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub yaw: f32,
}

/// Translational part of a platform's motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlatformPath {
    Fixed {
        position: Vec3,
    },
    /// Ping-pong between two points, one full round trip per `period` seconds.
    Linear {
        from: Vec3,
        to: Vec3,
        period: f32,
    },
    /// Orbit in the horizontal plane.
    Circular {
        center: Vec3,
        radius: f32,
        period: f32,
    },
}

/// Closed-form motion: a path plus an optional constant spin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformMotion {
    pub path: PlatformPath,
    pub base_yaw: f32,
    /// Radians per second about +Y.
    pub spin_rate: f32,
}

impl PlatformMotion {
    pub fn fixed(position: Vec3) -> Self {
        Self {
            path: PlatformPath::Fixed { position },
            base_yaw: 0.0,
            spin_rate: 0.0,
        }
    }

    pub fn linear(from: Vec3, to: Vec3, period: f32) -> Self {
        Self {
            path: PlatformPath::Linear { from, to, period },
            base_yaw: 0.0,
            spin_rate: 0.0,
        }
    }

    pub fn circular(center: Vec3, radius: f32, period: f32) -> Self {
        Self {
            path: PlatformPath::Circular {
                center,
                radius,
                period,
            },
            base_yaw: 0.0,
            spin_rate: 0.0,
        }
    }

    pub fn with_spin(mut self, spin_rate: f32) -> Self {
        self.spin_rate = spin_rate;
        self
    }

    /// Pose at simulation time `t` seconds.
    pub fn sample(&self, t: f64) -> Pose {
        let position = match self.path {
            PlatformPath::Fixed { position } => position,
            PlatformPath::Linear { from, to, period } => {
                let s = if period > 0.0 {
                    let phase = (t / period as f64).rem_euclid(1.0) as f32;
                    if phase < 0.5 {
                        phase * 2.0
                    } else {
                        2.0 - phase * 2.0
                    }
                } else {
                    0.0
                };
                from.lerp(to, s)
            }
            PlatformPath::Circular {
                center,
                radius,
                period,
            } => {
                let angle = if period > 0.0 {
                    ((t / period as f64).rem_euclid(1.0) as f32) * TAU
                } else {
                    0.0
                };
                center + Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
            }
        };
        let spin = (self.spin_rate as f64 * t).rem_euclid(std::f64::consts::TAU) as f32;
        Pose {
            position,
            yaw: wrap_angle(self.base_yaw + spin),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: PlatformId,
    pub half_extents: Vec3,
    pub motion: PlatformMotion,
    pub current: Pose,
    pub previous: Pose,
    /// Replicated entity standing in for this platform.
    pub entity: Option<EntityId>,
}

impl Platform {
    /// Body position in this platform's local frame (current pose).
    pub fn to_local(&self, world: Vec3) -> Vec3 {
        Quat::from_rotation_y(-self.current.yaw) * (world - self.current.position)
    }

    /// World-space height of the top surface.
    pub fn top(&self) -> f32 {
        self.current.position.y + self.half_extents.y
    }
}

/// The incremental motion a platform imparts to an attached body this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Carry {
    pub translation: Vec3,
    pub yaw: f32,
}

/// Result of the proximity grounding test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformContact {
    pub platform: PlatformId,
    /// Foot height above the top surface; negative when slightly sunk in.
    pub gap: f32,
}

#[derive(Debug, Clone, Default)]
pub struct PlatformSet {
    platforms: BTreeMap<PlatformId, Platform>,
}

impl PlatformSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Insert a platform posed at time `t`. Returns `false` if the id is taken.
    pub fn insert(&mut self, id: PlatformId, half_extents: Vec3, motion: PlatformMotion, t: f64) -> bool {
        if self.platforms.contains_key(&id) {
            return false;
        }
        let pose = motion.sample(t);
        self.platforms.insert(
            id,
            Platform {
                id,
                half_extents,
                motion,
                current: pose,
                previous: pose,
                entity: None,
            },
        );
        true
    }

    pub fn get(&self, id: PlatformId) -> Option<&Platform> {
        self.platforms.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: PlatformId) -> Option<&mut Platform> {
        self.platforms.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.values()
    }

    /// Shift current pose into previous and sample the new current pose.
    pub fn advance(&mut self, t: f64) {
        for p in self.platforms.values_mut() {
            p.previous = p.current;
            p.current = p.motion.sample(t);
        }
    }

    /// Carry for a body at `body` attached to `id`.
    ///
    /// The body keeps its offset from the platform origin, rotated by the
    /// platform's yaw change, so a spinning platform swings riders around its
    /// centre as well as turning them.
    pub fn carry(&self, id: PlatformId, body: Vec3) -> Carry {
        let Some(p) = self.platforms.get(&id) else {
            return Carry::default();
        };
        let yaw = wrap_angle(p.current.yaw - p.previous.yaw);
        let offset = body - p.previous.position;
        let carried = p.current.position + Quat::from_rotation_y(yaw) * offset;
        Carry {
            translation: carried - body,
            yaw,
        }
    }

    /// Best platform under `foot`, if any.
    ///
    /// Candidates must be within the half extents plus [`EDGE_MARGIN`]
    /// horizontally and within the vertical tolerance of the top surface.
    /// The smallest absolute gap wins; equal gaps go to the lowest id.
    pub fn ground_contact(&self, foot: Vec3, attached: Option<PlatformId>) -> Option<PlatformContact> {
        let mut best: Option<PlatformContact> = None;
        for p in self.platforms.values() {
            let local = p.to_local(foot);
            if local.x.abs() > p.half_extents.x + EDGE_MARGIN
                || local.z.abs() > p.half_extents.z + EDGE_MARGIN
            {
                continue;
            }
            let gap = local.y - p.half_extents.y;
            let tolerance = if attached == Some(p.id) {
                ATTACHED_TOLERANCE
            } else {
                GROUND_TOLERANCE
            };
            if gap.abs() > tolerance {
                continue;
            }
            // Strict comparison keeps the earlier (lower) id on ties.
            if best.is_none_or(|b| gap.abs() < b.gap.abs()) {
                best = Some(PlatformContact { platform: p.id, gap });
            }
        }
        best
    }
}
