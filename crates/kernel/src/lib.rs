//! World kernel: authoritative stepping of players, platforms and projectiles.
//!
//! # Invariants
//! - A step processes entities in ascending id; identical inputs give identical states.
//! - All state mutations flow through explicit `World` operations.
//! - Platforms are referenced by `PlatformId` only.

pub mod abilities;
pub mod movement;
pub mod physics;
pub mod platform;
pub mod projectile;
pub mod world;

pub use abilities::{AbilityDef, AbilityTable, CastBlocked};
pub use movement::{MoveOutcome, MovementIntegrator, MovementTuning};
pub use physics::{CharacterPhysics, CharacterQuery, CharacterResolution, FlatGround, RapierPhysics};
pub use platform::{Carry, Platform, PlatformContact, PlatformMotion, PlatformPath, PlatformSet, Pose};
pub use projectile::{DespawnReason, ProjectileHit, ProjectileReport};
pub use world::{KernelError, World, WorldEvent, WorldSettings};

pub fn crate_info() -> &'static str {
    "realm-kernel v0.1.0"
}
