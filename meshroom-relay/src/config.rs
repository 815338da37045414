use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How long a member whose socket dropped may re-attach before the
    /// room is told it left.
    pub presence_grace: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            presence_grace: Duration::from_secs(10),
        }
    }
}
