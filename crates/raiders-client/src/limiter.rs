//! Caps how often the session loop may iterate.

use std::time::{Duration, Instant};

/// Sleeps just long enough to keep iterations at or below a target rate.
///
/// Unlike a fixed-timestep accumulator this never tries to catch up: a slow
/// iteration simply means the next one starts without waiting.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FrameLimiter {
    /// `max_fps == 0` disables the limit.
    pub fn new(max_fps: u32) -> Self {
        let interval = (max_fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(max_fps)));
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// How long to wait at `now` before the next iteration may start.
    ///
    /// Zero for the first call and whenever the previous iteration already
    /// took at least one interval.
    pub fn delay(&self, now: Instant) -> Duration {
        match (self.interval, self.last) {
            (Some(interval), Some(last)) => interval.saturating_sub(now.saturating_duration_since(last)),
            _ => Duration::ZERO,
        }
    }

    /// Record that an iteration ended at `at`.
    pub fn mark(&mut self, at: Instant) {
        self.last = Some(at);
    }

    /// Wait out the rest of the current interval, then start the next one.
    pub async fn wait(&mut self) {
        let delay = self.delay(Instant::now());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.mark(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_iteration_does_not_wait() {
        let limiter = FrameLimiter::new(60);
        assert_eq!(limiter.delay(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_waits_for_remainder_of_interval() {
        let mut limiter = FrameLimiter::new(50);
        let start = Instant::now();
        limiter.mark(start);
        assert_eq!(limiter.interval(), Some(Duration::from_millis(20)));
        assert_eq!(
            limiter.delay(start + Duration::from_millis(5)),
            Duration::from_millis(15)
        );
    }

    #[test]
    fn test_slow_iteration_does_not_wait() {
        let mut limiter = FrameLimiter::new(60);
        let start = Instant::now();
        limiter.mark(start);
        assert_eq!(limiter.delay(start + Duration::from_millis(40)), Duration::ZERO);
    }

    #[test]
    fn test_zero_rate_is_unlimited() {
        let mut limiter = FrameLimiter::new(0);
        let start = Instant::now();
        limiter.mark(start);
        assert_eq!(limiter.interval(), None);
        assert_eq!(limiter.delay(start), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_wait_marks_iteration() {
        let mut limiter = FrameLimiter::new(1000);
        limiter.wait().await;
        let first = limiter.last.unwrap();
        limiter.wait().await;
        assert!(limiter.last.unwrap() >= first + Duration::from_millis(1));
    }
}
