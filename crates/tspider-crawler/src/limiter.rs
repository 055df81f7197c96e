use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};

/// Spaces out the start of successive downloads.
///
/// Every call to [`RateLimiter::acquire`] waits for the current slot and books
/// the next one `delay` later (jittered when randomized). Waiters are served in
/// FIFO order.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    next_slot: Arc<Mutex<Option<Instant>>>,
    delay: Duration,
    randomize: bool,
}

impl RateLimiter {
    pub fn new(delay: Duration, randomize: bool) -> Self {
        Self {
            next_slot: Arc::new(Mutex::new(None)),
            delay,
            randomize,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, false)
    }

    pub async fn acquire(&self) {
        if self.delay.is_zero() {
            return;
        }
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            time::sleep_until(slot).await;
        }
        *next_slot = Some(Instant::now() + self.next_delay());
    }

    fn next_delay(&self) -> Duration {
        if self.randomize {
            self.delay.mul_f64(rand::rng().random_range(0.5..1.5))
        } else {
            self.delay
        }
    }
}
