//! Columnar entity store for the authoritative simulation.
//!
//! Components live in parallel `Vec` columns indexed by a dense [`EntityId`].
//! Secondary indices map users, network ids and accounts back to entities.
//!
//! # Invariants
//! - A slot is recycled only after every index and column entry is purged.
//! - `grounded == false` implies no platform attachment.
//! - Velocities are always finite; health stays within `[0, max]`.
//! - Index iteration order is deterministic (BTreeMap).
//!
//! [`EntityId`]: realm_common::EntityId

pub mod components;
pub mod projector;
pub mod store;

pub use components::{
    BodyShape, DummyState, EntityKind, MoveIntent, PlayerMeta, ProjectileState,
};
pub use projector::{InputAckState, PlayerRuntimeState, ReplicationState};
pub use store::{EcsError, EntityStore};

pub fn crate_info() -> &'static str {
    "realm-ecs v0.1.0"
}
