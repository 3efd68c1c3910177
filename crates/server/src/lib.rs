//! Server orchestration: the fixed-rate tick scheduler, rolling tick
//! statistics, and the runtime loop tying world, network and persistence
//! together.
//!
//! # Invariants
//! - Each executed tick steps the world exactly once.
//! - A wake runs at most `max_catch_up_ticks`; further backlog is dropped and counted.
//! - Nothing mutates the world concurrently with a step; everything runs on one task.
//! - On shutdown the final flush happens before the network boundary closes.

pub mod inspect;
pub mod pipeline;
pub mod runtime;
pub mod scheduler;
pub mod stats;

pub use inspect::{HealthReport, ServerSummary};
pub use pipeline::ServerCore;
pub use runtime::{ServerHandle, ServerRuntime, ShutdownReport};
pub use scheduler::{SchedulerConfig, TickDriver, TickHealth, TickScheduler, WakeReport};
pub use stats::RollingStats;

use realm_common::{ConfigError, ServerConfig};
use realm_kernel::World;
use realm_net::{Authenticator, NetworkBoundary};
use realm_persist::{FileCharacterStore, PersistError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Build a runtime backed by the file character store under `config.data_dir`.
pub fn build_runtime(
    config: &ServerConfig,
    world: World,
    authenticator: Box<dyn Authenticator + Send>,
) -> Result<ServerRuntime, ServerError> {
    let store = FileCharacterStore::open(config.data_dir.join("characters"))?;
    store.verify_integrity()?;
    let net = NetworkBoundary::new(config, authenticator);
    let core = ServerCore::new(config, world, net, Box::new(store));
    Ok(ServerRuntime::new(config, core))
}

pub fn crate_info() -> &'static str {
    "realm-server v0.1.0"
}
