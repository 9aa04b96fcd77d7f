//! Bounded transport reconnection
//!
//! The widget's transport retries a dropped connection a fixed number of
//! times with a fixed delay. Exhausting the budget is an explicit, observable
//! outcome: the caller marks the widget disconnected and leaves recovery to
//! the user (e.g. a page reload). In-flight sessions are not resumed
//! automatically across a full reconnect cycle.

use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::FixedInterval;

/// Fixed-delay, bounded retry policy for the widget transport.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Total connection attempts, including the first one.
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Returned when every attempt allowed by the policy has failed.
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} connection attempts")]
pub struct ReconnectError<E> {
    pub attempts: usize,
    pub last_error: E,
}

impl ReconnectPolicy {
    /// The delays between attempts: one fewer than the attempt count.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        FixedInterval::new(self.delay).take(self.max_attempts.saturating_sub(1))
    }

    /// Run `connect` until it succeeds or the attempt budget is spent.
    pub async fn run<A, F, T, E>(&self, mut connect: A) -> Result<T, ReconnectError<E>>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0;
        let mut delays = self.backoff();

        loop {
            attempts += 1;
            match connect().await {
                Ok(value) => return Ok(value),
                Err(err) => match delays.next() {
                    Some(delay) => {
                        tracing::warn!(attempt = attempts, "connection failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(ReconnectError {
                            attempts,
                            last_error: err,
                        })
                    }
                },
            }
        }
    }
}
