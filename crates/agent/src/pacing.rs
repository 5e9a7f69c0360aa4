use std::time::Duration;

/// Artificial reply latency after a threshold of prior bot replies, to keep
/// a human cadence. Pure over the prior-outbound count; the caller owns the
/// actual timer so one user's delay never stalls another's turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingPolicy {
    pub threshold: u32,
    pub delay: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self { threshold: 2, delay: Duration::from_secs(4) }
    }
}

impl PacingPolicy {
    pub fn new(threshold: u32, delay: Duration) -> Self {
        Self { threshold, delay }
    }

    /// Delay to apply before the next reply, given how many outbound
    /// messages this user has already received.
    pub fn delay_for(&self, prior_outbound: u32) -> Option<Duration> {
        (prior_outbound >= self.threshold).then_some(self.delay)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::PacingPolicy;

    #[test]
    fn first_two_replies_are_immediate() {
        let pacing = PacingPolicy::default();
        assert_eq!(pacing.delay_for(0), None);
        assert_eq!(pacing.delay_for(1), None);
    }

    #[test]
    fn third_reply_onward_is_delayed() {
        let pacing = PacingPolicy::default();
        assert_eq!(pacing.delay_for(2), Some(Duration::from_secs(4)));
        assert_eq!(pacing.delay_for(7), Some(Duration::from_secs(4)));
    }

    #[test]
    fn threshold_is_configurable() {
        let pacing = PacingPolicy::new(5, Duration::from_secs(1));
        assert_eq!(pacing.delay_for(4), None);
        assert_eq!(pacing.delay_for(5), Some(Duration::from_secs(1)));
    }
}
