use super::coordinator::MeshCoordinator;
use crate::config::MeshConfig;
use crate::error::MeshResult;
use crate::mesh::{MeshEvent, MeshHandle};
use crate::signaling::{ChannelAdapter, SignalingTransport};
use crate::transport::MediaEngine;
use meshroom_core::{ParticipantId, RoomId, RosterEntry, SignalingMessage};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// Entry point for joining rooms over a given signaling transport and
/// media engine.
#[derive(Clone)]
pub struct MeshClient {
    transport: Arc<dyn SignalingTransport>,
    engine: Arc<dyn MediaEngine>,
    config: MeshConfig,
}

impl MeshClient {
    pub fn new(transport: Arc<dyn SignalingTransport>, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            transport,
            engine,
            config: MeshConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MeshConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Joins `room` under a freshly generated participant id.
    ///
    /// The returned receiver is subscribed before the session starts, so it
    /// sees every event, including the initial roster.
    pub async fn join_room(
        &self,
        room: RoomId,
        display_name: impl Into<String>,
    ) -> MeshResult<(MeshHandle, broadcast::Receiver<MeshEvent>)> {
        self.join_room_with_id(room, ParticipantId::new(), display_name)
            .await
    }

    pub async fn join_room_with_id(
        &self,
        room: RoomId,
        id: ParticipantId,
        display_name: impl Into<String>,
    ) -> MeshResult<(MeshHandle, broadcast::Receiver<MeshEvent>)> {
        let local = RosterEntry::new(id, display_name);
        let adapter = ChannelAdapter::new(room.clone(), self.transport.clone());

        // Subscribe before announcing so the snapshot cannot be missed.
        let inbound = adapter.subscribe().await?;

        let (command_tx, command_rx) = mpsc::channel(32);
        let coordinator = MeshCoordinator::new(
            local.clone(),
            self.config.clone(),
            adapter.clone(),
            self.engine.clone(),
            inbound,
            command_rx,
        );
        let events = coordinator.events();
        let receiver = events.subscribe();
        let handle = MeshHandle::new(
            local.clone(),
            room.clone(),
            command_tx,
            events,
            coordinator.bus(),
        );

        adapter
            .send(SignalingMessage::Join {
                sender: local.id,
                display_name: local.display_name.clone(),
            })
            .await?;

        info!("{} ({}) joined room {}", local.display_name, local.id, room);
        tokio::spawn(coordinator.run());

        Ok((handle, receiver))
    }
}
