//! Timed waits for the worker loop
//!
//! Idle and backoff waits end early on shutdown. Stage activities always run
//! to completion.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::stages::Activity;

#[derive(Clone)]
pub struct StagePacer {
    shutdown: CancellationToken,
}

impl StagePacer {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    /// Sleep unless shutdown arrives first. Returns false if interrupted.
    pub async fn idle(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Run an activity, calling `on_step(step, total)` after each step
    pub async fn run_activity<F>(&self, activity: &Activity, mut on_step: F)
    where
        F: FnMut(u32, u32),
    {
        match *activity {
            Activity::None => {}
            Activity::Delay(delay) => tokio::time::sleep(delay).await,
            Activity::Stepped { duration, steps } => {
                let steps = steps.max(1);
                let step_duration = duration / steps;
                for step in 1..=steps {
                    tokio::time::sleep(step_duration).await;
                    on_step(step, steps);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_idle_is_cancellable() {
        let token = CancellationToken::new();
        let pacer = StagePacer::new(token.clone());
        assert!(pacer.idle(Duration::from_secs(1)).await);

        token.cancel();
        let start = Instant::now();
        assert!(!pacer.idle(Duration::from_secs(60)).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_ignores_cancellation() {
        let token = CancellationToken::new();
        let pacer = StagePacer::new(token.clone());
        token.cancel();

        let start = Instant::now();
        let mut seen = Vec::new();
        pacer
            .run_activity(
                &Activity::Stepped {
                    duration: Duration::from_secs(180),
                    steps: 6,
                },
                |step, total| seen.push((step, total)),
            )
            .await;

        assert!(start.elapsed() >= Duration::from_secs(180));
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&(6, 6)));
    }
}
