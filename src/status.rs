//! Task status snapshots and the processing monitor.
//!
//! The service answers `GET /status/{id}` with one of two shapes: a flat
//! `{"status": ...}` object, or, while a task is running, an object with
//! `progress.summary` (percent) and no `status` member. The shape is the
//! discriminator; see [`StatusSnapshot::from_value`].

use std::thread;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSnapshot {
    /// Flat status: `pending`, `done`, `error`, ...
    Status(String),
    /// Still processing, percent complete (0..=100).
    Progress(u8),
}

impl StatusSnapshot {
    pub fn from_value(value: &Value) -> Result<Self> {
        if let Some(status) = value.get("status").and_then(Value::as_str) {
            return Ok(StatusSnapshot::Status(status.to_string()));
        }

        let summary = value
            .get("progress")
            .and_then(|p| p.get("summary"))
            .and_then(Value::as_f64);
        match summary {
            Some(pct) => Ok(StatusSnapshot::Progress(pct.clamp(0.0, 100.0) as u8)),
            None => Err(Error::UnexpectedStatus(format!(
                "neither `status` nor `progress.summary` in {}",
                value
            ))),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, StatusSnapshot::Status(s) if s == "pending")
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StatusSnapshot::Status(s) if s == "done")
    }
}

/// Time source for the monitor loop; swapped out in tests.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Receives forward-only progress increments, in percent.
pub trait ProgressReporter {
    fn advance(&mut self, delta: u64);
    fn finish(&mut self) {}
}

impl ProgressReporter for ProgressBar {
    fn advance(&mut self, delta: u64) {
        self.inc(delta);
    }

    fn finish(&mut self) {
        self.finish_and_clear();
    }
}

impl ProgressReporter for () {
    fn advance(&mut self, _delta: u64) {}
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
    pub cancel: CancellationToken,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl PollOptions {
    fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Time left before `max_wait` runs out, `None` when unbounded.
    fn remaining(&self, clock: &dyn Clock, started: Instant) -> Option<Duration> {
        self.max_wait
            .map(|max| max.saturating_sub(clock.now().saturating_duration_since(started)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Progress reached 100%.
    Completed,
    /// The service switched to a flat status while we were waiting.
    Finished(String),
}

/// Blocks until progress reaches 100%, re-fetching every `opts.interval`.
///
/// With `opts.max_wait` set, the last sleep is shortened to end exactly at
/// the bound and one final fetch decides between completion and
/// [`Error::TimedOut`].
///
/// `initial` is the percentage from the snapshot that started monitoring.
/// The reporter only ever sees positive deltas, so the display never runs
/// backwards and never passes 100.
pub fn monitor<F>(
    initial: u8,
    mut fetch: F,
    clock: &dyn Clock,
    reporter: &mut dyn ProgressReporter,
    opts: &PollOptions,
) -> Result<MonitorOutcome>
where
    F: FnMut() -> Result<StatusSnapshot>,
{
    let started = clock.now();
    let mut last = initial.min(100);
    reporter.advance(u64::from(last));

    while last < 100 {
        opts.ensure_active()?;
        let wait = match opts.remaining(clock, started) {
            Some(left) => opts.interval.min(left),
            None => opts.interval,
        };
        clock.sleep(wait);
        opts.ensure_active()?;

        // Once the bound is reached this fetch is the last one.
        let expired = opts.remaining(clock, started) == Some(Duration::ZERO);

        match fetch()? {
            StatusSnapshot::Progress(pct) => {
                let pct = pct.min(100);
                if pct > last {
                    reporter.advance(u64::from(pct - last));
                    last = pct;
                }
            }
            StatusSnapshot::Status(status) => {
                reporter.finish();
                return Ok(MonitorOutcome::Finished(status));
            }
        }

        if expired && last < 100 {
            reporter.finish();
            return Err(Error::TimedOut(opts.max_wait.unwrap_or_default()));
        }
    }

    reporter.finish();
    Ok(MonitorOutcome::Completed)
}
