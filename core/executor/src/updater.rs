//! Retry read-modify-write sequences that conflict with concurrent changes.
use std::future::Future;
use std::time::Duration;

use anyhow::Error;
use anyhow::Result;
use rand::Rng;

use dryproof_client_utils::is_conflict;
use dryproof_context::Context;

use crate::conf::UpdaterBackoff;

/// Track conflicts to incrementally delay retries, up to a fixed number of attempts.
///
/// The interface of the [`Backoff`] option is intended for use in looping operations:
/// when an attempt conflicts call [`Backoff::retry`], which fails once attempts are exhausted.
struct Backoff {
    attempts: u16,
    delay: Duration,
    jitter: f64,
    max_attempts: u16,
    max_delay: Duration,
    multiplier: u32,
}

impl Backoff {
    /// Initialise a new backoff engine.
    ///
    /// The first delay is capped at the max delay and jitter is clamped to `[0, 1]`.
    fn new(conf: &UpdaterBackoff) -> Backoff {
        let max_delay = Duration::from_millis(conf.max_delay);
        let jitter = match conf.jitter.is_nan() {
            true => 0.0,
            false => conf.jitter.clamp(0.0, 1.0),
        };
        Backoff {
            attempts: 0,
            delay: std::cmp::min(Duration::from_millis(conf.start_delay), max_delay),
            jitter,
            max_attempts: conf.max_attempts.max(1),
            max_delay,
            multiplier: conf.multiplier,
        }
    }

    /// An attempt has conflicted and the next one needs to be delayed appropriately.
    ///
    /// When the attempts are exhausted the conflict is reported back to fail properly.
    /// Otherwise the function sleeps for an incrementally longer period, up to a configured max.
    async fn retry(&mut self, context: &Context, error: Error) -> Result<()> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            let context = crate::error::RetriesExceeded::new(self.max_attempts);
            let error = error.context(context);
            return Err(error);
        }

        slog::warn!(
            context.logger, "Update conflicted with a concurrent change, will retry";
            "attempt" => self.attempts,
            replisdk::utils::error::slog::ErrorAttributes::from(&error),
        );
        tokio::time::sleep(self.next_delay()).await;
        self.grow();
        Ok(())
    }

    /// Increase the delay for the next attempt, saturating at the max delay.
    fn grow(&mut self) {
        self.delay = self
            .delay
            .checked_mul(self.multiplier)
            .map_or(self.max_delay, |delay| std::cmp::min(delay, self.max_delay));
    }

    fn next_delay(&self) -> Duration {
        if self.jitter <= 0.0 {
            return self.delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        self.delay
            .checked_add(self.delay.mul_f64(extra))
            .unwrap_or(Duration::MAX)
    }
}

/// Run read-modify-write sequences until they stop conflicting with concurrent changes.
///
/// Operations must re-read the state they modify on every invocation, otherwise retries
/// resubmit the same stale version and are bound to conflict again.
#[derive(Clone, Debug, Default)]
pub struct ConvergentUpdater {
    conf: UpdaterBackoff,
}

impl ConvergentUpdater {
    /// Initialise an updater with the given retry policy.
    pub fn new(conf: UpdaterBackoff) -> ConvergentUpdater {
        ConvergentUpdater { conf }
    }

    /// Invoke `operation` until it succeeds, fails with a non-conflict error or attempts run out.
    ///
    /// Exhausting attempts returns the last conflict, so [`is_conflict`] still holds for it.
    pub async fn run<F, Fut, T>(&self, context: &Context, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = Backoff::new(&self.conf);
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if is_conflict(&error) => backoff.retry(context, error).await?,
                Err(error) => return Err(error),
            }
        }
    }
}
