//! Shared vocabulary of the realm core: ids, transforms, health, persisted
//! player snapshots and the startup configuration.
//!
//! # Invariants
//! - `EntityId` is internal and recyclable; `NetworkId` and `AccountId` are stable.
//! - `Health` is within `[0, max]` after every mutation.

pub mod config;
pub mod snapshot;
pub mod types;

pub use config::{ConfigError, ServerConfig, TickLogVerbosity};
pub use snapshot::{HOTBAR_SLOTS, Hotbar, MovementMode, PlayerSnapshot};
pub use types::{
    AbilityId, AccountId, EntityId, Health, ModelId, NetworkId, PlatformId, Transform, UserId,
    sanitize_velocity,
};

pub fn crate_info() -> &'static str {
    "realm-common v0.1.0"
}
