use crate::peer::NegotiationRole;
use crate::transport::MediaEventSink;
use anyhow::Result;
use async_trait::async_trait;
use meshroom_core::{IceCandidate, ParticipantId, SessionDescription};
use std::sync::Arc;

/// Factory for per-peer media connections.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn create_connection(
        &self,
        peer: ParticipantId,
        role: NegotiationRole,
        events: MediaEventSink,
    ) -> Result<Arc<dyn MediaConnection>>;
}

/// One direct connection to a remote participant.
///
/// Every call may suspend and may fail; failures are treated as negotiation
/// errors by the caller.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
