//! Progress sources that drive download jobs.
//!
//! The orchestrator asks a [`ProgressSource`] for the next progress value
//! of a job until it reports 100. [`SimulatedProgress`] advances on a
//! timer; a real transfer would report byte progress through the same
//! trait without changing the job state machine.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::trace;

use super::error::DownloadError;
use super::job::JobKey;

/// Default interval between simulated progress ticks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Default percent added per simulated tick.
pub const DEFAULT_STEP: u8 = 10;

/// Supplies progress for running download jobs.
///
/// Calls for one key are strictly sequential; calls for different keys
/// run concurrently.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// Waits for the next report for `key` and returns its progress in percent.
    ///
    /// `current` is the last progress the orchestrator accepted. Values
    /// below `current` are ignored; values of 100 or more complete the job.
    ///
    /// # Errors
    ///
    /// Any error fails the job with progress frozen at `current`.
    async fn next_progress(&self, key: &JobKey, current: u8) -> Result<u8, DownloadError>;
}

/// Timer-driven progress: a fixed step per tick plus optional random jitter.
#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    tick: Duration,
    step: u8,
    jitter: u8,
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            step: DEFAULT_STEP,
            jitter: 0,
        }
    }
}

impl SimulatedProgress {
    /// Creates a simulated source. A zero step is raised to 1 so jobs always finish.
    #[must_use]
    pub fn new(tick: Duration, step: u8) -> Self {
        Self {
            tick,
            step: step.max(1),
            jitter: 0,
        }
    }

    /// Adds up to `jitter` extra percent to each tick.
    #[must_use]
    pub fn with_jitter(mut self, jitter: u8) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }

    #[must_use]
    pub fn step(&self) -> u8 {
        self.step
    }

    fn increment(&self) -> u8 {
        if self.jitter == 0 {
            return self.step;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter);
        self.step.saturating_add(extra)
    }
}

#[async_trait]
impl ProgressSource for SimulatedProgress {
    async fn next_progress(&self, key: &JobKey, current: u8) -> Result<u8, DownloadError> {
        tokio::time::sleep(self.tick).await;
        let next = current.saturating_add(self.increment()).min(100);
        trace!(%key, current, next, "simulated progress tick");
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_step_is_raised() {
        let source = SimulatedProgress::new(Duration::from_millis(1), 0);
        assert_eq!(source.step(), 1);
    }

    #[tokio::test]
    async fn test_simulated_progress_adds_step() {
        let source = SimulatedProgress::new(Duration::from_millis(1), 25);
        let next = source.next_progress(&JobKey::course(1), 50).await.unwrap();
        assert_eq!(next, 75);
    }

    #[tokio::test]
    async fn test_simulated_progress_caps_at_100() {
        let source = SimulatedProgress::new(Duration::from_millis(1), 40);
        let next = source.next_progress(&JobKey::course(1), 90).await.unwrap();
        assert_eq!(next, 100);
    }

    #[tokio::test]
    async fn test_jitter_stays_within_bounds() {
        let source = SimulatedProgress::new(Duration::from_millis(0), 5).with_jitter(5);
        for _ in 0..20 {
            let next = source.next_progress(&JobKey::course(1), 0).await.unwrap();
            assert!((5..=10).contains(&next), "out of range: {next}");
        }
    }
}
