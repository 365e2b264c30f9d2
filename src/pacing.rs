//! Pacing of outbound embedding requests.

use async_trait::async_trait;
use log::debug;
use std::time::Duration;

/// Called by the pipeline after each embedding request.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// `completed` is the number of requests issued so far in this ingestion, starting at 1.
    async fn after_request(&self, completed: usize);
}

/// Sleeps for `pause` after every `every`-th request.
#[derive(Debug, Clone)]
pub struct FixedIntervalPacer {
    every: usize,
    pause: Duration,
}

impl FixedIntervalPacer {
    /// Zero values are bumped to 1 request and 1 ms so the pacer always throttles.
    pub fn new(every: usize, pause: Duration) -> Self {
        FixedIntervalPacer {
            every: every.max(1),
            pause: pause.max(Duration::from_millis(1)),
        }
    }

    pub fn should_pause(&self, completed: usize) -> bool {
        completed > 0 && completed % self.every == 0
    }
}

impl Default for FixedIntervalPacer {
    fn default() -> Self {
        FixedIntervalPacer::new(5, Duration::from_secs(1))
    }
}

#[async_trait]
impl Pacer for FixedIntervalPacer {
    async fn after_request(&self, completed: usize) {
        if self.should_pause(completed) {
            debug!("Pausing {:?} after {} embedding requests", self.pause, completed);
            tokio::time::sleep(self.pause).await;
        }
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn after_request(&self, _completed: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauses_on_every_fifth_request() {
        let pacer = FixedIntervalPacer::default();
        let paused: Vec<usize> = (1..=12).filter(|&n| pacer.should_pause(n)).collect();
        assert_eq!(paused, vec![5, 10]);
    }

    #[test]
    fn zero_settings_still_throttle() {
        let pacer = FixedIntervalPacer::new(0, Duration::ZERO);
        assert!(pacer.should_pause(1));
        assert_eq!(pacer.pause, Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_for_the_configured_pause() {
        let pacer = FixedIntervalPacer::new(2, Duration::from_secs(30));
        let started = tokio::time::Instant::now();
        pacer.after_request(1).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        pacer.after_request(2).await;
        assert!(started.elapsed() >= Duration::from_secs(30));
    }
}
