//! The network boundary: queues what clients send, applies it to the world at
//! tick start, and emits replication and acknowledgements after the step.

use std::collections::{BTreeMap, VecDeque};

use realm_common::{AccountId, ServerConfig, UserId};
use realm_input::{BatchStats, InputCommand};
use realm_kernel::World;
use realm_persist::{CharacterRepository, PersistenceSyncTracker};

use crate::auth::Authenticator;
use crate::codec::{self, CodecError};
use crate::interest::InterestGrid;
use crate::message::{ConnectRequest, Envelope, Inbound, LoadoutChange, Outbound, RejectReason};

/// Back-off suggested to a client whose character failed to load.
pub const LOAD_RETRY_MS: u64 = 2_000;

/// Counters since the boundary was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryStats {
    pub accepted: u64,
    pub rejected: u64,
    pub disconnected: u64,
    pub commands_accepted: u64,
    pub commands_stale: u64,
    pub commands_malformed: u64,
    pub flood_warnings: u64,
    pub loadout_rejected: u64,
}

impl BoundaryStats {
    fn absorb(&mut self, batch: BatchStats) {
        self.commands_accepted += batch.accepted as u64;
        self.commands_stale += batch.stale as u64;
        self.commands_malformed += batch.malformed as u64;
    }
}

pub struct NetworkBoundary {
    authenticator: Box<dyn Authenticator + Send>,
    connects: VecDeque<ConnectRequest>,
    disconnects: VecDeque<UserId>,
    commands: BTreeMap<UserId, Vec<InputCommand>>,
    loadouts: VecDeque<(UserId, LoadoutChange)>,
    connected: BTreeMap<UserId, AccountId>,
    outbox: Vec<Envelope>,
    interest: InterestGrid,
    interest_radius: Option<f32>,
    flood_warn: usize,
    closed: bool,
    stats: BoundaryStats,
}

impl std::fmt::Debug for NetworkBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkBoundary")
            .field("connected", &self.connected.len())
            .field("queued_connects", &self.connects.len())
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl NetworkBoundary {
    pub fn new(config: &ServerConfig, authenticator: Box<dyn Authenticator + Send>) -> Self {
        // Cells a bit smaller than the radius keep the scanned block small.
        let cell = config.interest_radius.map(|r| r * 0.5).unwrap_or(32.0);
        Self {
            authenticator,
            connects: VecDeque::new(),
            disconnects: VecDeque::new(),
            commands: BTreeMap::new(),
            loadouts: VecDeque::new(),
            connected: BTreeMap::new(),
            outbox: Vec::new(),
            interest: InterestGrid::new(cell),
            interest_radius: config.interest_radius,
            flood_warn: config.command_flood_warn,
            closed: false,
            stats: BoundaryStats::default(),
        }
    }

    pub fn stats(&self) -> BoundaryStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_connected(&self, user: UserId) -> bool {
        self.connected.contains_key(&user)
    }

    pub fn connected_users(&self) -> impl Iterator<Item = (UserId, AccountId)> + '_ {
        self.connected.iter().map(|(u, a)| (*u, *a))
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    // --- Ingress ---

    /// Queue one inbound message for the next tick.
    ///
    /// Connects arriving after `close` are refused immediately.
    pub fn submit(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Connect(req) => {
                if self.closed {
                    self.reject(req.user, RejectReason::ServerClosing, None);
                } else {
                    self.connects.push_back(req);
                }
            }
            Inbound::Disconnect { user } => self.disconnects.push_back(user),
            Inbound::Commands { user, batch } => {
                self.commands.entry(user).or_default().extend(batch);
            }
            Inbound::Loadout { user, change } => self.loadouts.push_back((user, change)),
        }
    }

    /// Decode a CBOR frame and queue it.
    pub fn submit_frame(&mut self, frame: &[u8]) -> Result<(), CodecError> {
        let inbound = codec::decode_inbound(frame)?;
        self.submit(inbound);
        Ok(())
    }

    // --- Per-tick phases ---

    /// Handle queued disconnects, then connects.
    ///
    /// A departing player's final snapshot is queued on the tracker when the
    /// account has unsaved data. An arriving player is loaded from that queue
    /// first, then from the repository, then spawned fresh.
    pub fn process_lifecycle(
        &mut self,
        world: &mut World,
        tracker: &mut PersistenceSyncTracker,
        repo: &mut dyn CharacterRepository,
    ) {
        while let Some(user) = self.disconnects.pop_front() {
            self.teardown(world, tracker, user);
        }
        while let Some(req) = self.connects.pop_front() {
            self.connect(world, tracker, repo, req);
        }
    }

    fn teardown(&mut self, world: &mut World, tracker: &mut PersistenceSyncTracker, user: UserId) {
        self.commands.remove(&user);
        let Some(account) = self.connected.remove(&user) else {
            tracing::debug!(user = user.0, "disconnect for unknown user");
            return;
        };
        self.stats.disconnected += 1;
        match world.despawn_player(user) {
            Some(snapshot) => {
                let queued = tracker.queue_disconnected(snapshot);
                tracing::info!(user = user.0, account = account.0, queued, "player disconnected");
            }
            None => tracing::warn!(user = user.0, "connected user had no player entity"),
        }
    }

    fn connect(
        &mut self,
        world: &mut World,
        tracker: &mut PersistenceSyncTracker,
        repo: &mut dyn CharacterRepository,
        req: ConnectRequest,
    ) {
        let user = req.user;
        if self.closed {
            self.reject(user, RejectReason::ServerClosing, None);
            return;
        }
        let decision = self.authenticator.authenticate(&req.credential, &req.origin);
        let account = match (decision.accepted, decision.account_id) {
            (true, Some(account)) => account,
            _ => {
                self.reject(user, RejectReason::AuthFailed, decision.retry_after_ms);
                return;
            }
        };
        if self.connected.contains_key(&user) {
            self.reject(user, RejectReason::AlreadyConnected, None);
            return;
        }
        if world.store().entity_for_account(account).is_some() {
            self.reject(user, RejectReason::AccountInUse, None);
            return;
        }

        let snapshot = match tracker.take_pending(account) {
            Some(snapshot) => {
                tracing::debug!(account = account.0, "restoring from pending disconnect snapshot");
                snapshot
            }
            None => match repo.load_snapshot(account) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => world.fresh_snapshot(account),
                Err(e) => {
                    tracing::warn!(account = account.0, error = %e, "character load failed");
                    self.reject(user, RejectReason::LoadFailed, Some(LOAD_RETRY_MS));
                    return;
                }
            },
        };

        match world.spawn_player(user, &snapshot) {
            Ok(entity) => {
                self.connected.insert(user, account);
                self.stats.accepted += 1;
                tracing::info!(user = user.0, account = account.0, ?entity, "player connected");
                if let Some(network_id) = world.store().network_id(entity) {
                    self.send(user, Outbound::Accepted { network_id, account });
                }
            }
            Err(e) => {
                // Hand the snapshot back so it is not lost.
                tracker.queue_disconnected(snapshot);
                tracing::warn!(user = user.0, error = %e, "spawn failed");
                self.reject(user, RejectReason::SpawnFailed, None);
            }
        }
    }

    /// Merge every queued command of each connected user into the world.
    ///
    /// The drain is unbounded; oversized batches are only logged.
    pub fn drain_commands(&mut self, world: &mut World) {
        let queued = std::mem::take(&mut self.commands);
        for (user, batch) in queued {
            if !self.connected.contains_key(&user) {
                continue;
            }
            if batch.len() > self.flood_warn {
                self.stats.flood_warnings += 1;
                tracing::warn!(user = user.0, commands = batch.len(), "command flood");
            }
            if let Some(stats) = world.apply_input(user, &batch) {
                if stats.stale + stats.malformed > 0 {
                    tracing::debug!(
                        user = user.0,
                        stale = stats.stale,
                        malformed = stats.malformed,
                        "dropped commands"
                    );
                }
                self.stats.absorb(stats);
            }
        }
    }

    pub fn apply_loadouts(&mut self, world: &mut World) {
        while let Some((user, change)) = self.loadouts.pop_front() {
            if !self.connected.contains_key(&user) {
                continue;
            }
            let result = match change {
                LoadoutChange::AssignSlot { slot, ability } => {
                    world.assign_hotbar_slot(user, slot, ability)
                }
                LoadoutChange::SelectSlot { slot } => world.select_hotbar_slot(user, slot),
            };
            if let Err(e) = result {
                self.stats.loadout_rejected += 1;
                tracing::debug!(user = user.0, error = %e, "loadout change ignored");
            }
        }
    }

    /// Queue one `Replication` and one `InputAck` per connected player.
    pub fn emit(&mut self, world: &World) {
        let store = world.store();
        let tick = world.tick();
        if self.interest_radius.is_some() {
            self.interest.rebuild(store);
        }
        let all = store.live_ids();
        let users: Vec<UserId> = self.connected.keys().copied().collect();
        for user in users {
            let Some(entity) = store.entity_for_user(user) else {
                continue;
            };
            let Some(ack) = store.input_ack(entity) else {
                continue;
            };
            let visible = match self.interest_radius {
                Some(radius) => self.interest.within(ack.transform.position, radius),
                None => all.clone(),
            };
            let entities = visible
                .into_iter()
                .filter_map(|id| store.replication(id))
                .collect();
            self.send(user, Outbound::Replication { tick, entities });
            self.send(user, Outbound::InputAck { tick, ack });
        }
    }

    /// Stop accepting connections. Queued connects are refused.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        while let Some(req) = self.connects.pop_front() {
            self.reject(req.user, RejectReason::ServerClosing, None);
        }
        tracing::info!(connected = self.connected.len(), "network boundary closed");
    }

    // --- Egress ---

    pub fn take_outbound(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    /// Drain the outbox as CBOR frames. Messages that fail to encode are
    /// logged and skipped.
    pub fn take_frames(&mut self) -> Vec<(UserId, Vec<u8>)> {
        self.take_outbound()
            .into_iter()
            .filter_map(|env| match codec::encode_envelope(&env) {
                Ok(bytes) => Some((env.user, bytes)),
                Err(e) => {
                    tracing::warn!(user = env.user.0, error = %e, "dropping unencodable message");
                    None
                }
            })
            .collect()
    }

    fn send(&mut self, user: UserId, message: Outbound) {
        self.outbox.push(Envelope { user, message });
    }

    fn reject(&mut self, user: UserId, reason: RejectReason, retry_after_ms: Option<u64>) {
        self.stats.rejected += 1;
        tracing::info!(user = user.0, ?reason, "connection rejected");
        self.send(
            user,
            Outbound::Rejected {
                reason,
                retry_after_ms,
            },
        );
    }
}
