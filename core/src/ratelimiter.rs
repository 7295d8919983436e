use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Paces callers to at most `tokens_per_sec` acquisitions per second.
///
/// The ticker is created on first use so a limiter can be built outside a runtime.
pub struct RateLimiter {
    period: Duration,
    ticker: Mutex<Option<Interval>>,
}

impl RateLimiter {
    pub fn new(tokens_per_sec: u32) -> Self {
        let period = Duration::from_micros(1_000_000 / tokens_per_sec.max(1) as u64);
        RateLimiter { period, ticker: Mutex::new(None) }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn acquire(&self) {
        let mut guard = self.ticker.lock().await;
        let period = self.period;
        let t = guard.get_or_insert_with(|| {
            let mut t = interval(period);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });
        t.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn period_from_rate() {
        assert_eq!(RateLimiter::new(4).period(), Duration::from_millis(250));
        assert_eq!(RateLimiter::new(0).period(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_acquisitions() {
        let rl = RateLimiter::new(10);
        let start = Instant::now();
        for _ in 0..3 {
            rl.acquire().await;
        }
        // first tick is immediate, the next two wait one period each
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
