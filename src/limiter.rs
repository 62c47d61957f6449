// ABOUTME: Token bucket throttle for backend request pacing.
// ABOUTME: Allows bursts up to capacity while holding an average rate.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct LimiterState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket throttle shared across a dispatch engine's backend calls.
///
/// The bucket starts full at `capacity` and refills at `refill_rate`
/// tokens per second; each backend call consumes one token, waiting
/// when the bucket is empty.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    /// Create a limiter.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `refill_rate` is not positive.
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        assert!(capacity > 0.0, "capacity must be positive");
        assert!(refill_rate > 0.0, "refill_rate must be positive");

        Self {
            state: Mutex::new(LimiterState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    /// Consume one token, sleeping until it is available.
    pub async fn acquire(&self) {
        loop {
            let wait = self.try_take(1.0).await;
            if wait.is_zero() {
                return;
            }
            // 10ms floor keeps short waits from busy-looping on coarse timers.
            tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
        }
    }

    /// Attempt to take tokens without waiting. Returns `Duration::ZERO`
    /// on success, otherwise the estimated wait.
    async fn try_take(&self, tokens: f64) -> Duration {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;

        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);

        if state.tokens >= tokens {
            state.tokens -= tokens;
            return Duration::ZERO;
        }

        Duration::from_secs_f64((tokens - state.tokens) / self.refill_rate)
    }

    /// Current token count, refilled to now. For monitoring and tests.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);

        state.tokens
    }
}
