use std::f32::consts::{PI, TAU};

use crate::command::InputCommand;
use crate::sequence::is_newer;

/// Pitch is clamped to this many radians either side of level.
pub const PITCH_LIMIT: f32 = 1.5;

/// Player state the reconciler needs to resolve relative input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReconcileBase {
    pub last_sequence: Option<u16>,
    pub yaw: f32,
    pub pitch: f32,
}

/// Continuous axes from the last accepted command of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Axes {
    pub forward: f32,
    pub strafe: f32,
    pub sprint: bool,
}

/// Counters for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchStats {
    pub accepted: usize,
    pub stale: usize,
    pub malformed: usize,
}

/// Result of merging one tick's batch for one player.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReconciledInput {
    /// Highest accepted sequence; the reconciliation anchor sent back in the ack.
    pub last_sequence: Option<u16>,
    /// `None` when nothing in the batch was accepted; callers keep the previous axes.
    pub axes: Option<Axes>,
    pub yaw: f32,
    pub pitch: f32,
    pub jump: bool,
    pub cast: bool,
    pub toggle_movement_mode: bool,
    pub stats: BatchStats,
}

/// Merges ordered command batches into player intent.
///
/// Only strictly newer sequences are accepted. Continuous fields follow the
/// last accepted command; press triggers are OR-ed over the whole batch so a
/// press coalesced with later commands still registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputReconciler;

impl InputReconciler {
    pub fn reconcile(base: ReconcileBase, batch: &[InputCommand]) -> ReconciledInput {
        let mut out = ReconciledInput {
            last_sequence: base.last_sequence,
            yaw: base.yaw,
            pitch: clamp_pitch(base.pitch),
            ..ReconciledInput::default()
        };

        for cmd in batch {
            if let Err(reason) = cmd.validate() {
                out.stats.malformed += 1;
                tracing::debug!(sequence = cmd.sequence, %reason, "dropping malformed command");
                continue;
            }
            if !is_newer(cmd.sequence, out.last_sequence) {
                out.stats.stale += 1;
                tracing::trace!(
                    sequence = cmd.sequence,
                    last = ?out.last_sequence,
                    "dropping stale command"
                );
                continue;
            }

            out.last_sequence = Some(cmd.sequence);
            out.stats.accepted += 1;
            out.axes = Some(Axes {
                forward: cmd.forward,
                strafe: cmd.strafe,
                sprint: cmd.sprint,
            });
            match (cmd.yaw, cmd.yaw_delta) {
                (Some(abs), _) => out.yaw = wrap_angle(abs),
                (None, Some(delta)) => out.yaw = wrap_angle(out.yaw + delta),
                (None, None) => {}
            }
            if let Some(pitch) = cmd.pitch {
                out.pitch = clamp_pitch(pitch);
            }
            out.jump |= cmd.jump_pressed;
            out.cast |= cmd.ability_cast_pressed;
            out.toggle_movement_mode |= cmd.movement_mode_toggle_pressed;
        }
        out
    }
}

/// Wrap into `[-PI, PI)`.
pub fn wrap_angle(a: f32) -> f32 {
    (a + PI).rem_euclid(TAU) - PI
}

pub fn clamp_pitch(p: f32) -> f32 {
    if p.is_finite() {
        p.clamp(-PITCH_LIMIT, PITCH_LIMIT)
    } else {
        0.0
    }
}
