//! Network boundary between clients and the authoritative world.
//!
//! # Invariants
//! - Nothing received from a client touches the world until the next tick starts.
//! - Each connected player gets exactly one replication and one ack per tick.
//! - After `close`, every connect attempt is refused with `ServerClosing`.

pub mod auth;
pub mod boundary;
pub mod codec;
pub mod interest;
pub mod message;

pub use auth::{AllowListAuthenticator, AuthDecision, Authenticator};
pub use boundary::{BoundaryStats, LOAD_RETRY_MS, NetworkBoundary};
pub use codec::{CodecError, MAX_FRAME_BYTES};
pub use interest::{CellCoord, InterestGrid};
pub use message::{ConnectRequest, Envelope, Inbound, LoadoutChange, Outbound, RejectReason};

pub fn crate_info() -> &'static str {
    "realm-net v0.1.0"
}
