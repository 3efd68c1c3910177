use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use realm_common::{AccountId, ServerConfig};
use realm_persist::{CharacterRepository, FileCharacterStore};

mod arena;
mod bots;

#[derive(Parser)]
#[command(name = "realmd", about = "Authoritative realm simulation server")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file; REALM_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Run the server headless with synthetic clients
    Run {
        /// Seconds to run before shutting down
        #[arg(short, long, default_value = "10")]
        seconds: u64,
        /// Number of bot clients
        #[arg(short, long, default_value = "4")]
        bots: u64,
    },
    /// Print a stored character as JSON
    Inspect {
        /// Account to print; lists stored accounts when omitted
        #[arg(short, long)]
        account: Option<u64>,
        /// Store directory; defaults to the configured data dir
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = ServerConfig::from_process_env(cli.config.as_deref())
        .context("loading configuration")?;

    match cli.command {
        Commands::Info => {
            println!("realmd v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", realm_common::crate_info());
            println!("ecs: {}", realm_ecs::crate_info());
            println!("input: {}", realm_input::crate_info());
            println!("kernel: {}", realm_kernel::crate_info());
            println!("persist: {}", realm_persist::crate_info());
            println!("net: {}", realm_net::crate_info());
            println!("server: {}", realm_server::crate_info());
            println!(
                "tick: {} Hz, catch-up {}, flush every {} ms",
                config.tick_rate_hz, config.max_catch_up_ticks, config.persistence_flush_interval_ms
            );
        }
        Commands::Run { seconds, bots } => run(&config, seconds, bots)?,
        Commands::Inspect { account, data_dir } => {
            let dir = data_dir.unwrap_or_else(|| config.data_dir.clone());
            let mut store = FileCharacterStore::open_inspect(dir.join("characters"))
                .with_context(|| format!("opening store under {}", dir.display()))?;
            store.verify_integrity().context("integrity check")?;
            match account {
                Some(id) => {
                    let snapshot = store
                        .load_snapshot(AccountId(id))?
                        .with_context(|| format!("no character stored for account {id}"))?;
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                None => {
                    for account in store.accounts() {
                        println!("{}", account.0);
                    }
                }
            }
        }
    }

    Ok(())
}

fn run(config: &ServerConfig, seconds: u64, bots: u64) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async {
        let world = arena::build_world(config)?;
        let runtime =
            realm_server::build_runtime(config, world, Box::new(bots::authenticator(bots)))?;
        let handle = runtime.handle();
        let tick = config.tick_interval();

        let driver = async {
            bots::drive(&handle, bots, tick, Duration::from_secs(seconds)).await;
            // Let the disconnects land before stopping.
            tokio::time::sleep(tick * 3).await;
            handle.shutdown();
        };
        let (report, ()) = tokio::join!(runtime.run(), driver);

        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.final_flush.is_clean() {
            anyhow::bail!(
                "final flush left {} account(s) unsaved",
                report.final_flush.failed.len()
            );
        }
        Ok::<(), anyhow::Error>(())
    })
}
