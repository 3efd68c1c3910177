//! Input intake: wire commands, wrapping sequence numbers and the per-tick
//! batch merge that turns a player's commands into intent.
//!
//! # Invariants
//! - A sequence is accepted only if strictly newer than the last accepted one.
//! - Malformed commands are dropped one at a time, never batch-wide.
//! - Press triggers within a batch are never lost.

pub mod command;
pub mod reconcile;
pub mod sequence;

pub use command::{CommandRejection, InputCommand};
pub use reconcile::{
    Axes, BatchStats, InputReconciler, PITCH_LIMIT, ReconcileBase, ReconciledInput, clamp_pitch,
    wrap_angle,
};
pub use sequence::{is_newer, sequence_greater_than, sequence_less_than};

pub fn crate_info() -> &'static str {
    "realm-input v0.1.0"
}
