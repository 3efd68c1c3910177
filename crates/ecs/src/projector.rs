//! Typed read projections assembled from several columns.
//!
//! Callers outside this crate read cross-cutting state through these views
//! instead of holding references into individual columns.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::components::EntityKind;
use crate::store::EntityStore;
use realm_common::{
    AccountId, EntityId, Health, Hotbar, ModelId, MovementMode, NetworkId, PlatformId,
    PlayerSnapshot, Transform, UserId,
};

/// Full runtime view of one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRuntimeState {
    pub entity: EntityId,
    pub network_id: NetworkId,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub transform: Transform,
    pub velocity: Vec3,
    pub health: Health,
    pub grounded: bool,
    pub attached_platform: Option<PlatformId>,
    pub movement_mode: MovementMode,
    pub hotbar: Hotbar,
    pub last_sequence: Option<u16>,
}

/// Per-entity replication record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicationState {
    pub network_id: NetworkId,
    pub model_id: ModelId,
    pub position: Vec3,
    pub rotation: Quat,
    pub grounded: bool,
    pub health: f32,
    pub max_health: f32,
}

/// Authoritative acknowledgement of a player's input stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputAckState {
    pub last_accepted_sequence: Option<u16>,
    pub transform: Transform,
    pub velocity: Vec3,
    pub grounded: bool,
    pub attached_platform: Option<PlatformId>,
}

impl EntityStore {
    pub fn runtime_state(&self, id: EntityId) -> Option<PlayerRuntimeState> {
        let meta = self.player(id)?;
        Some(PlayerRuntimeState {
            entity: id,
            network_id: self.network_id(id)?,
            user_id: meta.user_id,
            account_id: meta.account_id,
            transform: *self.transform(id)?,
            velocity: self.velocity(id)?,
            health: *self.health(id)?,
            grounded: self.grounded(id)?,
            attached_platform: self.attached_platform(id),
            movement_mode: meta.movement_mode,
            hotbar: meta.hotbar,
            last_sequence: meta.last_sequence,
        })
    }

    /// Replication record for any live entity. Entities without health
    /// replicate `0 / 0`.
    pub fn replication(&self, id: EntityId) -> Option<ReplicationState> {
        let transform = self.transform(id)?;
        let rotation = match self.kind(id)? {
            // Projectiles face along their flight direction.
            EntityKind::Projectile => {
                let v = self.velocity(id)?;
                if v.length_squared() > f32::EPSILON {
                    Quat::from_rotation_arc(Vec3::Z, v.normalize())
                } else {
                    transform.rotation()
                }
            }
            _ => transform.rotation(),
        };
        let (health, max_health) = self
            .health(id)
            .map(|h| (h.current(), h.max()))
            .unwrap_or((0.0, 0.0));
        Some(ReplicationState {
            network_id: self.network_id(id)?,
            model_id: self.model(id)?,
            position: transform.position,
            rotation,
            grounded: self.grounded(id)?,
            health,
            max_health,
        })
    }

    pub fn input_ack(&self, id: EntityId) -> Option<InputAckState> {
        let meta = self.player(id)?;
        Some(InputAckState {
            last_accepted_sequence: meta.last_sequence,
            transform: *self.transform(id)?,
            velocity: self.velocity(id)?,
            grounded: self.grounded(id)?,
            attached_platform: self.attached_platform(id),
        })
    }

    /// What gets written to the character repository for this player.
    pub fn persistence_snapshot(&self, id: EntityId) -> Option<PlayerSnapshot> {
        let meta = self.player(id)?;
        Some(PlayerSnapshot {
            account_id: meta.account_id,
            transform: *self.transform(id)?,
            velocity: self.velocity(id)?,
            health: *self.health(id)?,
            movement_mode: meta.movement_mode,
            hotbar: meta.hotbar,
        })
    }

    pub fn persistence_snapshot_for_account(&self, account: AccountId) -> Option<PlayerSnapshot> {
        self.entity_for_account(account)
            .and_then(|id| self.persistence_snapshot(id))
    }
}
