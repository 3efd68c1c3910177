//! The server loop: ticks, persistence flushes, health logging and client
//! ingress multiplexed on one task.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::inspect::{HealthReport, ServerSummary};
use crate::pipeline::ServerCore;
use crate::scheduler::{SchedulerConfig, TickHealth, TickScheduler};
use realm_common::ServerConfig;
use realm_net::{Envelope, Inbound};
use realm_persist::FlushReport;

/// Cloneable way to talk to a running server from other tasks.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    inbound: UnboundedSender<Inbound>,
    shutdown: CancellationToken,
}

impl ServerHandle {
    /// Queue a message for the next tick. False once the server has stopped.
    pub fn submit(&self, inbound: Inbound) -> bool {
        self.inbound.send(inbound).is_ok()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Final state after the loop stops.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub summary: ServerSummary,
    pub health: TickHealth,
    pub final_flush: FlushReport,
}

pub struct ServerRuntime {
    core: ServerCore,
    scheduler: TickScheduler,
    flush_interval: Duration,
    health_interval: Duration,
    inbound_tx: UnboundedSender<Inbound>,
    inbound_rx: UnboundedReceiver<Inbound>,
    outbound: Option<UnboundedSender<Envelope>>,
    shutdown: CancellationToken,
}

impl ServerRuntime {
    pub fn new(config: &ServerConfig, core: ServerCore) -> Self {
        let (inbound_tx, inbound_rx) = unbounded_channel();
        Self {
            core,
            scheduler: TickScheduler::new(SchedulerConfig::from_config(config), Instant::now()),
            flush_interval: config.flush_interval(),
            health_interval: config.health_log_interval(),
            inbound_tx,
            inbound_rx,
            outbound: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Where outbound messages go. Without a sink they are discarded.
    pub fn with_outbound(mut self, sink: UnboundedSender<Envelope>) -> Self {
        self.outbound = Some(sink);
        self
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            inbound: self.inbound_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn core(&self) -> &ServerCore {
        &self.core
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            summary: ServerSummary::capture(&self.core),
            scheduler: self.scheduler.health(),
        }
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// Shutdown order: stop ticking, flush every dirty account, close the
    /// network boundary.
    pub async fn run(mut self) -> ShutdownReport {
        let start = Instant::now();
        self.scheduler.reanchor(start);
        let mut flush = interval_at(start + self.flush_interval, self.flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut health = interval_at(start + self.health_interval, self.health_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.scheduler.config().interval.as_secs_f64() * 1e3,
            flush_ms = self.flush_interval.as_millis() as u64,
            "server loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(self.scheduler.next_deadline()) => {
                    let _span = tracing::info_span!("tick_wake").entered();
                    self.scheduler.wake(Instant::now(), &mut self.core);
                    self.forward_outbound();
                }
                Some(inbound) = self.inbound_rx.recv() => {
                    self.core.submit(inbound);
                }
                _ = flush.tick() => {
                    let report = self.core.flush();
                    if !report.failed.is_empty() {
                        tracing::warn!(failed = report.failed.len(), "accounts left dirty after flush");
                    }
                }
                _ = health.tick() => {
                    tracing::info!("{}", self.health());
                }
            }
        }

        tracing::info!(ticks = self.scheduler.ticks_executed(), "scheduler cancelled; flushing");
        let final_flush = self.core.shutdown();
        self.forward_outbound();

        let report = ShutdownReport {
            summary: ServerSummary::capture(&self.core),
            health: self.scheduler.health(),
            final_flush,
        };
        tracing::info!(summary = %report.summary, "server stopped");
        report
    }

    fn forward_outbound(&mut self) {
        let messages = self.core.take_outbound();
        let Some(sink) = &self.outbound else {
            return;
        };
        for envelope in messages {
            if sink.send(envelope).is_err() {
                tracing::debug!("outbound sink closed");
                self.outbound = None;
                return;
            }
        }
    }
}
