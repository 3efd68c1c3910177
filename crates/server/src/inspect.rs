//! Read-only summaries of a running server for logs and tooling.

use serde::Serialize;

use crate::pipeline::ServerCore;
use crate::scheduler::TickHealth;
use realm_ecs::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServerSummary {
    pub tick: u64,
    pub players: usize,
    pub projectiles: usize,
    pub dummies: usize,
    pub platforms: usize,
    pub connected: usize,
    pub dirty_accounts: usize,
    pub pending_disconnects: usize,
    pub state_hash: u64,
}

impl ServerSummary {
    pub fn capture(core: &ServerCore) -> Self {
        let world = core.world();
        let store = world.store();
        Self {
            tick: world.tick(),
            players: store.ids_of(EntityKind::Player).len(),
            projectiles: store.ids_of(EntityKind::Projectile).len(),
            dummies: store.ids_of(EntityKind::TrainingDummy).len(),
            platforms: world.platforms().len(),
            connected: core.net().connected_count(),
            dirty_accounts: core.tracker().dirty_count(),
            pending_disconnects: core.tracker().pending_count(),
            state_hash: world.state_hash(),
        }
    }
}

impl std::fmt::Display for ServerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tick={} players={} projectiles={} dummies={} platforms={} connected={} dirty={} pending={} hash={:#018x}",
            self.tick,
            self.players,
            self.projectiles,
            self.dummies,
            self.platforms,
            self.connected,
            self.dirty_accounts,
            self.pending_disconnects,
            self.state_hash,
        )
    }
}

/// Periodic health line: world summary plus scheduler statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthReport {
    pub summary: ServerSummary,
    pub scheduler: TickHealth,
}

impl std::fmt::Display for HealthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {}", self.summary, self.scheduler)
    }
}
