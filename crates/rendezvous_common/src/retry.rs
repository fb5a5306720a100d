//! Bounded retry with exponential backoff for transient failures.
//!
//! Only errors whose [`RendezvousError::is_transient`] is true are retried.
//! Not-found, validation and permanent gateway errors return on the first
//! attempt, as do deadline and cancellation errors from the [`CallContext`].

use rand::Rng;
use rendezvous_config::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::context::CallContext;
use crate::error::RendezvousError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first one.
    pub max_retries: u32,
    /// Base delay between retries (doubled per attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Whether to add up to 50% random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: settings.jitter,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
        let delay = exponential.min(self.max_delay.as_millis() as u64);

        if self.jitter && delay > 0 {
            let jitter = rand::thread_rng().gen_range(0..=delay / 2);
            Duration::from_millis(delay + jitter)
        } else {
            Duration::from_millis(delay)
        }
    }
}

/// Runs `operation` under `ctx`, retrying transient failures.
///
/// `operation` receives the zero-based attempt number. Backoff sleeps are
/// themselves bounded by the context, so a deadline that falls during a
/// backoff ends the call with a timeout.
pub async fn retry_async<T, E, F, Fut>(
    ctx: &CallContext,
    config: &RetryConfig,
    what: &str,
    mut operation: F,
) -> Result<T, RendezvousError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<RendezvousError>,
{
    let mut attempt = 0;
    loop {
        match ctx.run(what, operation(attempt)).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = config.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt + 1,
                    config.max_retries + 1,
                    delay,
                    err
                );
                ctx.guard(what, tokio::time::sleep(delay)).await?;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
