use std::time::Duration;

/// Timing and sizing knobs for a mesh session.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Longest a connection may stay in `Negotiating` before it is failed.
    pub negotiation_timeout: Duration,
    /// First delay before re-creating a failed connection; doubles per attempt.
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    /// Re-creation attempts per peer before giving up until it rejoins.
    pub max_retries: u32,
    /// How often timeouts and pending retries are checked.
    pub tick_interval: Duration,
    /// Capacity of the outward `MeshEvent` broadcast channel.
    pub event_capacity: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: Duration::from_secs(20),
            retry_backoff: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(16),
            max_retries: 5,
            tick_interval: Duration::from_millis(500),
            event_capacity: 256,
        }
    }
}

impl MeshConfig {
    /// Delay before re-creation attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.retry_backoff
            .saturating_mul(1u32 << shift)
            .min(self.retry_backoff_max)
    }
}
