use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Dense internal handle into the columnar entity store.
///
/// Ids are recycled, so an `EntityId` must never be persisted or sent on the
/// wire. Use [`NetworkId`] for replication and [`AccountId`] for storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable wire-level identifier of a replicated entity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub u32);

/// Transport-level connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Numeric account id handed out by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

/// Stable id of a moving platform. Platforms live in an arena indexed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbilityId(pub u32);

/// Client-side model selector carried in replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub u16);

impl ModelId {
    pub const PLAYER: ModelId = ModelId(1);
    pub const TRAINING_DUMMY: ModelId = ModelId(2);
    pub const PLATFORM: ModelId = ModelId(3);
    /// Projectiles use `PROJECTILE_BASE + ability id`.
    pub const PROJECTILE_BASE: u16 = 100;

    /// Model of a projectile cast by `ability`. Ids past the `u16` range
    /// saturate at `u16::MAX`.
    pub fn projectile(ability: AbilityId) -> ModelId {
        let offset = u16::try_from(ability.0).unwrap_or(u16::MAX);
        ModelId(Self::PROJECTILE_BASE.saturating_add(offset))
    }
}

/// Character transform: position plus view angles.
///
/// Yaw rotates about +Y; yaw 0 faces +Z. Pitch is only used for aiming and is
/// not part of the replicated body rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Body rotation as replicated to clients.
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    /// Horizontal facing direction.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Horizontal right-hand direction.
    pub fn right(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin())
    }

    /// Full aim direction including pitch (positive pitch looks up).
    pub fn aim(&self) -> Vec3 {
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(self.yaw.sin() * cp, sp, self.yaw.cos() * cp)
    }
}

/// Hit points clamped to `[0, max]` after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    current: f32,
    max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        let max = if max.is_finite() { max.max(0.0) } else { 0.0 };
        Self { current: max, max }
    }

    /// Build from stored values, clamping whatever came off disk.
    pub fn from_parts(current: f32, max: f32) -> Self {
        let mut h = Self::new(max);
        h.set(current);
        h
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    pub fn set(&mut self, value: f32) {
        if !value.is_nan() {
            self.current = value.clamp(0.0, self.max);
        }
    }

    /// Apply damage and return the amount actually removed.
    pub fn damage(&mut self, amount: f32) -> f32 {
        let before = self.current;
        self.set(self.current - amount.max(0.0));
        before - self.current
    }

    pub fn heal(&mut self, amount: f32) {
        self.set(self.current + amount.max(0.0));
    }

    pub fn refill(&mut self) {
        self.current = self.max;
    }

    /// Re-apply the invariant. A no-op for values already in range.
    pub fn clamp(&mut self) {
        self.set(self.current);
    }
}

/// Zero out non-finite velocity components.
pub fn sanitize_velocity(v: Vec3) -> Vec3 {
    let fix = |c: f32| if c.is_finite() { c } else { 0.0 };
    Vec3::new(fix(v.x), fix(v.y), fix(v.z))
}
