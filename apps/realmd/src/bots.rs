//! Synthetic clients for headless runs.

use std::time::Duration;

use realm_common::{AccountId, UserId};
use realm_input::InputCommand;
use realm_net::{AllowListAuthenticator, ConnectRequest, Inbound};
use realm_server::ServerHandle;

const BOT_ACCOUNT_BASE: u64 = 10_000;

fn credential(bot: u64) -> String {
    format!("bot-{bot}")
}

/// Authenticator accepting `bot-0 .. bot-{count-1}`.
pub fn authenticator(count: u64) -> AllowListAuthenticator {
    (0..count).fold(
        AllowListAuthenticator::new().with_retry_after(1_000),
        |auth, bot| auth.allow(credential(bot), AccountId(BOT_ACCOUNT_BASE + bot)),
    )
}

/// The command a bot sends on a given sequence: run in a widening circle,
/// jump now and then, and cast.
fn command(bot: u64, sequence: u16) -> InputCommand {
    let phase = sequence as u64 + bot * 17;
    InputCommand {
        sequence,
        forward: 1.0,
        strafe: if bot % 2 == 0 { 0.0 } else { 0.5 },
        yaw_delta: Some(0.03 + bot as f32 * 0.005),
        sprint: phase % 200 < 60,
        jump_pressed: phase % 45 == 0,
        ability_cast_pressed: phase % 60 == 0,
        movement_mode_toggle_pressed: phase % 300 == 0,
        ..Default::default()
    }
}

/// Connect `count` bots, drive them for `duration`, then disconnect them.
pub async fn drive(handle: &ServerHandle, count: u64, tick: Duration, duration: Duration) {
    for bot in 0..count {
        handle.submit(Inbound::Connect(ConnectRequest {
            user: UserId(bot + 1),
            credential: credential(bot),
            origin: "realmd-bot".into(),
        }));
    }
    let steps = (duration.as_secs_f64() / tick.as_secs_f64()) as u64;
    let mut sequence: u16 = 0;
    for _ in 0..steps {
        sequence = sequence.wrapping_add(1);
        for bot in 0..count {
            handle.submit(Inbound::Commands {
                user: UserId(bot + 1),
                batch: vec![command(bot, sequence)],
            });
        }
        tokio::time::sleep(tick).await;
    }
    for bot in 0..count {
        handle.submit(Inbound::Disconnect { user: UserId(bot + 1) });
    }
    tracing::info!(bots = count, commands = steps * count, "bots finished");
}
