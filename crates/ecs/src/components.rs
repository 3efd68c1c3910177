use glam::Vec3;
use serde::{Deserialize, Serialize};
use realm_common::{AbilityId, AccountId, Hotbar, MovementMode, NetworkId, UserId};

/// What an entity slot currently holds. `None` in the kind column marks a free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Platform,
    Projectile,
    TrainingDummy,
}

/// Player-only bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMeta {
    pub user_id: UserId,
    pub account_id: AccountId,
    pub hotbar: Hotbar,
    pub movement_mode: MovementMode,
    /// Highest accepted input sequence; `None` until the first command lands.
    pub last_sequence: Option<u16>,
    pub last_cast_tick: Option<u64>,
    pub last_jump_tick: Option<u64>,
}

impl PlayerMeta {
    pub fn new(user_id: UserId, account_id: AccountId) -> Self {
        Self {
            user_id,
            account_id,
            hotbar: Hotbar::default(),
            movement_mode: MovementMode::default(),
            last_sequence: None,
            last_cast_tick: None,
            last_jump_tick: None,
        }
    }
}

/// Merged per-tick player intent. Continuous axes persist between ticks,
/// triggers are consumed by the step that reads them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveIntent {
    pub forward: f32,
    pub strafe: f32,
    pub sprint: bool,
    pub jump: bool,
    pub cast: bool,
}

/// Ballistic state of a live projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    /// Network id of the caster. Entity ids are recycled; network ids are not.
    pub owner: NetworkId,
    pub ability: AbilityId,
    pub gravity: f32,
    /// Fraction of speed lost per second.
    pub drag: f32,
    pub remaining_range: f32,
    pub ttl_ticks: u32,
    pub pierce_remaining: u32,
    pub damage: f32,
    pub despawn_on_hit: bool,
    pub despawn_on_world: bool,
    /// Network ids of targets already struck; a projectile hits each entity
    /// at most once.
    pub hits: Vec<NetworkId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DummyState {
    /// Tick at which a depleted dummy refills.
    pub reset_at_tick: Option<u64>,
}

/// Spawn-time body dimensions used for hit tests and foot placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyShape {
    pub radius: f32,
    /// Half height of the cylindrical section (capsules); 0 for spheres.
    pub half_height: f32,
}

impl BodyShape {
    pub const PLAYER: BodyShape = BodyShape {
        radius: 0.4,
        half_height: 0.5,
    };

    pub const fn sphere(radius: f32) -> Self {
        Self {
            radius,
            half_height: 0.0,
        }
    }

    /// Distance from the body centre to its lowest point.
    pub fn foot_offset(&self) -> f32 {
        self.half_height + self.radius
    }

    pub fn foot_point(&self, centre: Vec3) -> Vec3 {
        centre - Vec3::Y * self.foot_offset()
    }
}
