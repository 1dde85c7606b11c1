//! Cascading deadlines.
//!
//! A comparison owns one overall [`Deadline`]; each stage runs under
//! `min(stage ceiling, remaining overall budget)`. Timers are plain tokio
//! futures, so whichever branch finishes first drops the other.

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

/// Which bound ran out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expired {
    /// The stage's own ceiling.
    Stage,
    /// The enclosing overall budget.
    Overall,
}

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Run `fut` under the overall deadline only.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, Expired> {
        timeout_at(self.at, fut).await.map_err(|_| Expired::Overall)
    }

    /// Run `fut` under `ceiling`, clipped to the overall deadline.
    ///
    /// When both bounds coincide the overall one is reported.
    pub async fn stage<F: Future>(&self, ceiling: Duration, fut: F) -> Result<F::Output, Expired> {
        let stage_at = Instant::now() + ceiling;
        let at = stage_at.min(self.at);
        timeout_at(at, fut).await.map_err(|_| {
            if at < self.at {
                Expired::Stage
            } else {
                Expired::Overall
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stage_ceiling_fires_first() {
        let deadline = Deadline::after(Duration::from_secs(25));
        let res = deadline
            .stage(Duration::from_secs(5), tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(res, Err(Expired::Stage));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_clips_stage() {
        let deadline = Deadline::after(Duration::from_secs(25));
        tokio::time::sleep(Duration::from_secs(22)).await;
        let res = deadline
            .stage(Duration::from_secs(20), tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(res, Err(Expired::Overall));
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_budget() {
        let deadline = Deadline::after(Duration::from_secs(25));
        let res = deadline
            .stage(Duration::from_secs(5), async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                42
            })
            .await;
        assert_eq!(res, Ok(42));
        assert_eq!(deadline.bound(async { "done" }).await, Ok("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_expires() {
        let deadline = Deadline::after(Duration::from_millis(100));
        let res = deadline.bound(std::future::pending::<()>()).await;
        assert_eq!(res, Err(Expired::Overall));
    }
}
