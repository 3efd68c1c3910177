//! Wire messages crossing the network boundary.

use serde::{Deserialize, Serialize};

use realm_common::{AbilityId, AccountId, NetworkId, UserId};
use realm_ecs::{InputAckState, ReplicationState};
use realm_input::InputCommand;

/// A client asking to join. `credential` and `origin` go to the authenticator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub user: UserId,
    pub credential: String,
    pub origin: String,
}

/// Hotbar edits coming from the ability-creator session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadoutChange {
    AssignSlot { slot: u8, ability: Option<AbilityId> },
    SelectSlot { slot: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inbound {
    Connect(ConnectRequest),
    Disconnect { user: UserId },
    Commands { user: UserId, batch: Vec<InputCommand> },
    Loadout { user: UserId, change: LoadoutChange },
}

/// Why a connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    AuthFailed,
    AlreadyConnected,
    AccountInUse,
    LoadFailed,
    SpawnFailed,
    ServerClosing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outbound {
    Accepted {
        network_id: NetworkId,
        account: AccountId,
    },
    Rejected {
        reason: RejectReason,
        retry_after_ms: Option<u64>,
    },
    Replication {
        tick: u64,
        entities: Vec<ReplicationState>,
    },
    InputAck {
        tick: u64,
        ack: InputAckState,
    },
}

/// An outbound message addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub user: UserId,
    pub message: Outbound,
}
