//! CBOR framing for wire messages.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::message::{Envelope, Inbound};

/// Largest frame accepted from a client.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("CBOR encode error: {0}")]
    Encode(String),
    #[error("CBOR decode error: {0}")]
    Decode(String),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, CodecError> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(CodecError::TooLarge {
            len: frame.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    ciborium::from_reader(frame).map_err(|e| CodecError::Decode(e.to_string()))
}

pub fn decode_inbound(frame: &[u8]) -> Result<Inbound, CodecError> {
    decode(frame)
}

pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    encode(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{LoadoutChange, Outbound, RejectReason};
    use realm_common::{AbilityId, UserId};
    use realm_input::InputCommand;

    #[test]
    fn inbound_commands_survive_the_wire() {
        let msg = Inbound::Commands {
            user: UserId(4),
            batch: vec![InputCommand {
                sequence: 65535,
                forward: 1.0,
                yaw_delta: Some(0.25),
                jump_pressed: true,
                ..Default::default()
            }],
        };
        let bytes = encode(&msg).unwrap();
        assert_eq!(decode_inbound(&bytes).unwrap(), msg);
    }

    #[test]
    fn loadout_and_rejection_encode() {
        let msg = Inbound::Loadout {
            user: UserId(1),
            change: LoadoutChange::AssignSlot {
                slot: 3,
                ability: Some(AbilityId(2)),
            },
        };
        assert_eq!(decode_inbound(&encode(&msg).unwrap()).unwrap(), msg);

        let env = Envelope {
            user: UserId(1),
            message: Outbound::Rejected {
                reason: RejectReason::ServerClosing,
                retry_after_ms: None,
            },
        };
        let decoded: Envelope = decode(&encode_envelope(&env).unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_inbound(&[0xff, 0x00, 0x13]),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn oversized_frame_is_refused_before_parsing() {
        let frame = vec![0u8; MAX_FRAME_BYTES + 1];
        assert!(matches!(
            decode_inbound(&frame),
            Err(CodecError::TooLarge { .. })
        ));
    }
}
