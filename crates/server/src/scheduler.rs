//! Fixed-rate tick scheduling with bounded catch-up.
//!
//! The scheduler owns a target deadline. Each wake runs every tick that is
//! due, up to `max_catch_up`. If the loop is still behind after that, the
//! backlog is dropped and the next deadline is set one interval from now.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::stats::RollingStats;
use realm_common::ServerConfig;

/// Scheduler parameters, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub max_catch_up: u32,
    pub stats_window: usize,
}

impl SchedulerConfig {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            interval: config.tick_interval(),
            max_catch_up: config.max_catch_up_ticks.max(1),
            stats_window: config.stats_window,
        }
    }
}

/// Something that runs one simulation step per call.
pub trait TickDriver {
    fn tick(&mut self, tick: u64);
}

impl<F: FnMut(u64)> TickDriver for F {
    fn tick(&mut self, tick: u64) {
        self(tick)
    }
}

/// What a single wake did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WakeReport {
    pub executed: u32,
    pub dropped: u64,
    pub resynced: bool,
}

/// Scheduler health, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TickHealth {
    pub ticks_executed: u64,
    pub ticks_dropped: u64,
    pub resyncs: u64,
    pub duration_mean_ms: f64,
    pub duration_stddev_ms: f64,
    pub duration_p95_ms: f64,
    pub interval_mean_ms: f64,
    pub interval_stddev_ms: f64,
    pub interval_p95_ms: f64,
}

impl std::fmt::Display for TickHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ticks={} dropped={} resyncs={} duration(mean={:.2}ms sd={:.2} p95={:.2}) interval(mean={:.2}ms sd={:.2} p95={:.2})",
            self.ticks_executed,
            self.ticks_dropped,
            self.resyncs,
            self.duration_mean_ms,
            self.duration_stddev_ms,
            self.duration_p95_ms,
            self.interval_mean_ms,
            self.interval_stddev_ms,
            self.interval_p95_ms,
        )
    }
}

#[derive(Debug)]
pub struct TickScheduler {
    config: SchedulerConfig,
    next: Instant,
    tick: u64,
    executed: u64,
    dropped: u64,
    resyncs: u64,
    last_start: Option<Instant>,
    durations: RollingStats,
    intervals: RollingStats,
}

impl TickScheduler {
    /// The first tick is due one interval after `now`.
    pub fn new(config: SchedulerConfig, now: Instant) -> Self {
        Self {
            config,
            next: now + config.interval,
            tick: 0,
            executed: 0,
            dropped: 0,
            resyncs: 0,
            last_start: None,
            durations: RollingStats::new(config.stats_window),
            intervals: RollingStats::new(config.stats_window),
        }
    }

    /// Restart the deadline clock at `now` without touching the counters.
    ///
    /// The next tick is due one interval after `now`.
    pub fn reanchor(&mut self, now: Instant) {
        self.next = now + self.config.interval;
        self.last_start = None;
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    pub fn ticks_executed(&self) -> u64 {
        self.executed
    }

    pub fn ticks_dropped(&self) -> u64 {
        self.dropped
    }

    /// Run the ticks due at `now`.
    pub fn wake<D: TickDriver + ?Sized>(&mut self, now: Instant, driver: &mut D) -> WakeReport {
        let mut report = WakeReport::default();
        while report.executed < self.config.max_catch_up && now >= self.next {
            let start = Instant::now();
            if let Some(prev) = self.last_start {
                self.intervals
                    .push(start.saturating_duration_since(prev).as_secs_f64() * 1e3);
            }
            self.last_start = Some(start);

            self.tick += 1;
            let work = std::time::Instant::now();
            driver.tick(self.tick);
            self.durations.push(work.elapsed().as_secs_f64() * 1e3);

            self.executed += 1;
            report.executed += 1;
            self.next += self.config.interval;
        }

        if now >= self.next {
            let behind = now.saturating_duration_since(self.next);
            let missed = (behind.as_nanos() / self.config.interval.as_nanos().max(1)) as u64 + 1;
            self.dropped += missed;
            self.resyncs += 1;
            self.next = now + self.config.interval;
            report.dropped = missed;
            report.resynced = true;
            tracing::warn!(
                dropped = missed,
                behind_ms = behind.as_secs_f64() * 1e3,
                "tick loop overloaded; resynchronised"
            );
        }
        report
    }

    /// Tick until `shutdown` is cancelled.
    pub async fn run<D: TickDriver + ?Sized>(&mut self, driver: &mut D, shutdown: &CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(self.next) => {
                    self.wake(Instant::now(), driver);
                }
            }
        }
        tracing::debug!(executed = self.executed, dropped = self.dropped, "scheduler stopped");
    }

    pub fn health(&self) -> TickHealth {
        TickHealth {
            ticks_executed: self.executed,
            ticks_dropped: self.dropped,
            resyncs: self.resyncs,
            duration_mean_ms: self.durations.mean(),
            duration_stddev_ms: self.durations.stddev(),
            duration_p95_ms: self.durations.p95(),
            interval_mean_ms: self.intervals.mean(),
            interval_stddev_ms: self.intervals.stddev(),
            interval_p95_ms: self.intervals.p95(),
        }
    }
}
