//! Per-call deadline and cancellation.
//!
//! Every outbound store or gateway call runs through [`CallContext::run`], so a
//! caller that gives up (deadline passed, request dropped, shutdown) stops all
//! remaining I/O for that call.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::RendezvousError;

/// Deadline and cancellation signal for one logical call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    /// No deadline, never cancelled unless the token is triggered.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancellation: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token, e.g. with a child of a shutdown token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails fast when the call is already cancelled or past its deadline.
    pub fn check(&self, what: &str) -> Result<(), RendezvousError> {
        if self.cancellation.is_cancelled() {
            return Err(RendezvousError::Cancelled(what.to_string()));
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(RendezvousError::Timeout(what.to_string()));
        }
        Ok(())
    }

    /// Races `fut` against the deadline and the cancellation token.
    pub async fn guard<F>(&self, what: &str, fut: F) -> Result<F::Output, RendezvousError>
    where
        F: Future,
    {
        self.check(what)?;

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| RendezvousError::Timeout(what.to_string())),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(RendezvousError::Cancelled(what.to_string())),
            result = bounded => result,
        }
    }

    /// [`guard`](Self::guard) for fallible futures, converting the error.
    pub async fn run<T, E, F>(&self, what: &str, fut: F) -> Result<T, RendezvousError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<RendezvousError>,
    {
        self.guard(what, fut).await?.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_slow_calls() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let err = ctx
            .guard("sending push", tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, RendezvousError::Timeout(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn expired_context_never_polls_the_future() {
        let ctx = CallContext::with_deadline(Instant::now() - Duration::from_millis(1));
        let mut polled = false;
        let result = ctx
            .guard("loading user", async {
                polled = true;
            })
            .await;

        assert!(matches!(result, Err(RendezvousError::Timeout(_))));
        assert!(!polled);
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let ctx = CallContext::background();
        ctx.cancellation().cancel();
        let err = ctx.guard("querying users", async { 1 }).await.unwrap_err();
        assert!(matches!(err, RendezvousError::Cancelled(_)));
    }

    #[tokio::test]
    async fn background_context_passes_results_through() {
        let ctx = CallContext::background();
        assert!(ctx.remaining().is_none());
        let value = ctx
            .run("counting", async { Ok::<_, RendezvousError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
