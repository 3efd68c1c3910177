use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// One client input sample as received on the wire.
///
/// `yaw` is an absolute heading, `yaw_delta` a relative turn. When both are
/// present the absolute value wins.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputCommand {
    pub sequence: u16,
    pub forward: f32,
    pub strafe: f32,
    pub yaw: Option<f32>,
    pub yaw_delta: Option<f32>,
    pub pitch: Option<f32>,
    pub sprint: bool,
    pub jump_pressed: bool,
    pub ability_cast_pressed: bool,
    pub movement_mode_toggle_pressed: bool,
}

/// Why a single command was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejection {
    #[error("field {0} is not finite")]
    NonFinite(&'static str),
    #[error("field {0} is out of range")]
    OutOfRange(&'static str),
}

impl InputCommand {
    /// Check every field. Pitch is not range-checked here; it is clamped
    /// during reconciliation.
    pub fn validate(&self) -> Result<(), CommandRejection> {
        check_axis("forward", self.forward)?;
        check_axis("strafe", self.strafe)?;
        if let Some(yaw) = self.yaw {
            check_finite("yaw", yaw)?;
            if yaw.abs() > 2.0 * TAU {
                return Err(CommandRejection::OutOfRange("yaw"));
            }
        }
        if let Some(delta) = self.yaw_delta {
            check_finite("yaw_delta", delta)?;
            if delta.abs() > PI {
                return Err(CommandRejection::OutOfRange("yaw_delta"));
            }
        }
        if let Some(pitch) = self.pitch {
            check_finite("pitch", pitch)?;
        }
        Ok(())
    }
}

fn check_finite(name: &'static str, v: f32) -> Result<(), CommandRejection> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(CommandRejection::NonFinite(name))
    }
}

fn check_axis(name: &'static str, v: f32) -> Result<(), CommandRejection> {
    check_finite(name, v)?;
    if (-1.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(CommandRejection::OutOfRange(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_is_valid() {
        assert_eq!(InputCommand::default().validate(), Ok(()));
    }

    #[test]
    fn nan_axis_is_rejected() {
        let cmd = InputCommand {
            forward: f32::NAN,
            ..Default::default()
        };
        assert_eq!(cmd.validate(), Err(CommandRejection::NonFinite("forward")));
    }

    #[test]
    fn overdriven_axis_is_rejected() {
        let cmd = InputCommand {
            strafe: 1.5,
            ..Default::default()
        };
        assert_eq!(cmd.validate(), Err(CommandRejection::OutOfRange("strafe")));
    }

    #[test]
    fn huge_yaw_delta_is_rejected() {
        let cmd = InputCommand {
            yaw_delta: Some(4.0),
            ..Default::default()
        };
        assert_eq!(cmd.validate(), Err(CommandRejection::OutOfRange("yaw_delta")));
    }

    #[test]
    fn infinite_pitch_is_rejected_but_large_pitch_is_not() {
        let bad = InputCommand {
            pitch: Some(f32::INFINITY),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let steep = InputCommand {
            pitch: Some(3.0),
            ..Default::default()
        };
        assert!(steep.validate().is_ok());
    }
}
