use indexer_core::types::RateTier;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Next retry delay: doubled, capped at 30 seconds
pub(crate) fn next_backoff(delay: Duration) -> Duration {
    (delay * 2).min(MAX_BACKOFF)
}

/// Paces provider calls to the configured rate tier. Consulted before
/// every outbound RPC call.
pub struct Throttle {
    tier: RateTier,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(tier: RateTier) -> Self {
        Self {
            tier,
            last_call: Mutex::new(None),
        }
    }

    pub fn tier(&self) -> RateTier {
        self.tier
    }

    /// Wait out the remainder of the inter-call delay, then stamp the call
    pub async fn pace(&self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *self.last_call.lock() = Some(Instant::now());
    }

    fn remaining(&self) -> Duration {
        let last = self.last_call.lock();
        match *last {
            Some(at) => self.tier.inter_call_delay().saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_the_cap() {
        let mut delay = Duration::from_millis(1000);
        delay = next_backoff(delay);
        assert_eq!(delay, Duration::from_millis(2000));
        for _ in 0..10 {
            delay = next_backoff(delay);
        }
        assert_eq!(delay, MAX_BACKOFF);
    }

    #[test]
    fn first_call_is_not_delayed() {
        let throttle = Throttle::new(RateTier::Conservative);
        assert_eq!(throttle.remaining(), Duration::ZERO);
    }

    #[test]
    fn back_to_back_calls_wait_out_the_tier_delay() {
        let throttle = Throttle::new(RateTier::Conservative);
        *throttle.last_call.lock() = Some(Instant::now());

        let remaining = throttle.remaining();
        assert!(remaining > Duration::ZERO);
        assert!(remaining <= RateTier::Conservative.inter_call_delay());
    }

    #[test]
    fn delay_expires_after_the_window() {
        let throttle = Throttle::new(RateTier::Fast);
        let past = Instant::now() - RateTier::Fast.inter_call_delay() * 2;
        *throttle.last_call.lock() = Some(past);

        assert_eq!(throttle.remaining(), Duration::ZERO);
    }
}
