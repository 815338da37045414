use meshroom_core::utils::default_stun_servers;

/// ICE configuration handed to the media engine.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
    /// Label of the data channel the initiator opens next to the media tracks.
    pub data_channel_label: String,
    /// Gather loopback candidates too (same-host sessions).
    pub include_loopback: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_stun_servers(),
            username: None,
            credential: None,
            data_channel_label: "side".to_owned(),
            include_loopback: false,
        }
    }
}

impl TransportConfig {
    /// Host and loopback candidates only; what tests and same-host setups use.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
            include_loopback: true,
            ..Self::default()
        }
    }
}
