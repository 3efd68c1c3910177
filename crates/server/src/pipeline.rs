//! One tick of the whole server: network ingress, world step, dirty marking,
//! and egress.

use realm_common::{ServerConfig, TickLogVerbosity};
use realm_kernel::World;
use realm_net::{Envelope, Inbound, NetworkBoundary};
use realm_persist::{CharacterRepository, FlushReport, PersistenceSyncTracker};

use crate::scheduler::TickDriver;

/// Everything a tick mutates, owned in one place.
pub struct ServerCore {
    world: World,
    net: NetworkBoundary,
    tracker: PersistenceSyncTracker,
    repo: Box<dyn CharacterRepository + Send>,
    tick_log: TickLogVerbosity,
}

impl std::fmt::Debug for ServerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCore")
            .field("world", &self.world)
            .field("net", &self.net)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl ServerCore {
    pub fn new(
        config: &ServerConfig,
        world: World,
        net: NetworkBoundary,
        repo: Box<dyn CharacterRepository + Send>,
    ) -> Self {
        Self {
            world,
            net,
            tracker: PersistenceSyncTracker::new(),
            repo,
            tick_log: config.tick_log,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn net(&self) -> &NetworkBoundary {
        &self.net
    }

    pub fn tracker(&self) -> &PersistenceSyncTracker {
        &self.tracker
    }

    pub fn repo_mut(&mut self) -> &mut (dyn CharacterRepository + Send) {
        self.repo.as_mut()
    }

    pub fn submit(&mut self, inbound: Inbound) {
        self.net.submit(inbound);
    }

    pub fn take_outbound(&mut self) -> Vec<Envelope> {
        self.net.take_outbound()
    }

    /// Connect/disconnect, merge input, step, mark dirty, replicate.
    pub fn run_tick(&mut self) {
        self.net
            .process_lifecycle(&mut self.world, &mut self.tracker, self.repo.as_mut());
        self.net.drain_commands(&mut self.world);
        self.net.apply_loadouts(&mut self.world);

        self.world.step();

        let events = self.world.drain_events();
        for event in &events {
            if let Some(account) = event.dirty_character() {
                self.tracker.mark_character_dirty(account);
            }
            if let Some(account) = event.dirty_abilities() {
                self.tracker.mark_abilities_dirty(account);
            }
            if self.tick_log == TickLogVerbosity::Verbose {
                tracing::trace!(?event, "world event");
            }
        }
        self.net.emit(&self.world);

        if self.tick_log != TickLogVerbosity::Off {
            tracing::debug!(
                tick = self.world.tick(),
                players = self.net.connected_count(),
                events = events.len(),
                dirty = self.tracker.dirty_count(),
                "tick"
            );
        }
    }

    /// Persist every dirty account, preferring live state.
    pub fn flush(&mut self) -> FlushReport {
        let store = self.world.store();
        self.tracker
            .flush(self.repo.as_mut(), |account| {
                store.persistence_snapshot_for_account(account)
            })
    }

    /// Final flush, then refuse further connections.
    pub fn shutdown(&mut self) -> FlushReport {
        let report = self.flush();
        if !report.is_clean() {
            tracing::warn!(
                failed = report.failed.len(),
                orphaned = report.orphaned.len(),
                "final flush incomplete"
            );
        }
        self.net.close();
        report
    }
}

impl TickDriver for ServerCore {
    fn tick(&mut self, _tick: u64) {
        self.run_tick();
    }
}
