use std::time::Duration;

/// How new events reach the fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    #[default]
    Poll,
    Push,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Poll => "poll",
            SyncMode::Push => "push",
        }
    }
}

/// Throttling tier consulted before every provider call.
/// Conservative suits free-tier endpoints; Fast must be opted into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateTier {
    #[default]
    Conservative,
    Fast,
}

impl RateTier {
    /// Delay inserted between consecutive provider calls
    pub fn inter_call_delay(&self) -> Duration {
        match self {
            RateTier::Conservative => Duration::from_millis(250),
            RateTier::Fast => Duration::from_millis(50),
        }
    }

    /// Interval between poll-mode pipeline ticks
    pub fn poll_interval(&self) -> Duration {
        match self {
            RateTier::Conservative => Duration::from_millis(12_000),
            RateTier::Fast => Duration::from_millis(2_000),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateTier::Conservative => "conservative",
            RateTier::Fast => "fast",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_tier_is_strictly_faster() {
        assert!(RateTier::Fast.inter_call_delay() < RateTier::Conservative.inter_call_delay());
        assert!(RateTier::Fast.poll_interval() < RateTier::Conservative.poll_interval());
    }
}
