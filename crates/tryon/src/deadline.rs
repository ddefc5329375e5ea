use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TryOnError};

/// Overall time budget for one job chain, paired with a cancellation token.
///
/// Every suspension point in a chain runs under [`Deadline::guard`], so expiry
/// and cancellation both drop whatever request is in flight.
#[derive(Debug, Clone)]
pub struct Deadline {
    budget: Duration,
    expires_at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// Expire `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self::with_token(budget, CancellationToken::new())
    }

    /// Expire `budget` from now, or earlier when `token` is cancelled
    pub fn with_token(budget: Duration, token: CancellationToken) -> Self {
        Self {
            budget,
            expires_at: Instant::now() + budget,
            token,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.expires_at
    }

    /// Resolves with the reason the deadline ended
    pub async fn expired(&self) -> TryOnError {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => TryOnError::Canceled,
            _ = sleep_until(self.expires_at) => TryOnError::TimedOut { budget: self.budget },
        }
    }

    /// Run `fut` unless the deadline ends first
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            reason = self.expired() => Err(reason),
            out = fut => out,
        }
    }

    /// Sleep for `period`, cut short by the deadline
    pub async fn sleep(&self, period: Duration) -> Result<()> {
        self.guard(async {
            tokio::time::sleep(period).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_guard_times_out() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let started = Instant::now();

        let err = deadline
            .guard(std::future::pending::<Result<()>>())
            .await
            .unwrap_err();

        assert!(matches!(err, TryOnError::TimedOut { budget } if budget == Duration::from_secs(5)));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_passes_through_result() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let value = deadline.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(!deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_timer() {
        let parent = CancellationToken::new();
        let deadline = Deadline::with_token(Duration::from_secs(60), parent.child_token());

        parent.cancel();
        let err = deadline.sleep(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TryOnError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_cut_short() {
        let deadline = Deadline::after(Duration::from_secs(3));
        let started = Instant::now();
        assert!(deadline.sleep(Duration::from_secs(2)).await.is_ok());
        assert!(deadline.sleep(Duration::from_secs(2)).await.is_err());
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
