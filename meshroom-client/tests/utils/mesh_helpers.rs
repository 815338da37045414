use anyhow::{Context, Result, anyhow};
use meshroom_client::{
    MeshClient, MeshConfig, MeshEvent, MeshHandle, PeerSnapshot, PeerState,
};
use meshroom_core::{ParticipantId, RoomId};
use meshroom_relay::RelayHub;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::memory_transport::MemoryTransport;
use super::mock_engine::{MockBehavior, MockEngine};

/// Timeout for a single expected event or state (ms).
pub const EVENT_TIMEOUT_MS: u64 = 5000;

/// Poll interval while waiting for a state (ms).
pub const POLL_INTERVAL_MS: u64 = 10;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("meshroom_client=debug,meshroom_relay=debug")
        .with_test_writer()
        .try_init();
}

/// Short timings so failure paths finish quickly.
pub fn fast_config() -> MeshConfig {
    MeshConfig {
        negotiation_timeout: Duration::from_secs(2),
        retry_backoff: Duration::from_millis(100),
        retry_backoff_max: Duration::from_millis(400),
        max_retries: 3,
        tick_interval: Duration::from_millis(50),
        event_capacity: 512,
    }
}

/// One simulated participant wired to a shared in-process relay.
pub struct TestParticipant {
    pub handle: MeshHandle,
    pub events: broadcast::Receiver<MeshEvent>,
    pub engine: MockEngine,
    pub transport: MemoryTransport,
}

impl TestParticipant {
    pub fn id(&self) -> ParticipantId {
        self.handle.participant_id()
    }

    pub fn room(&self) -> RoomId {
        self.handle.room().clone()
    }

    pub async fn peers(&self) -> Vec<PeerSnapshot> {
        self.handle.peers().await.unwrap_or_default()
    }

    pub async fn peer_ids(&self) -> Vec<ParticipantId> {
        self.peers().await.into_iter().map(|p| p.id).collect()
    }

    pub async fn peer_state(&self, peer: ParticipantId) -> Option<PeerState> {
        self.peers()
            .await
            .into_iter()
            .find(|p| p.id == peer)
            .map(|p| p.state)
    }
}

pub async fn join(hub: &RelayHub, room: &RoomId, name: &str) -> Result<TestParticipant> {
    join_with(
        hub,
        room,
        ParticipantId::new(),
        name,
        MockBehavior::default(),
        fast_config(),
    )
    .await
}

pub async fn join_with(
    hub: &RelayHub,
    room: &RoomId,
    id: ParticipantId,
    name: &str,
    behavior: MockBehavior,
    config: MeshConfig,
) -> Result<TestParticipant> {
    let transport = MemoryTransport::new(hub);
    let engine = MockEngine::with_behavior(id, behavior);
    let client = MeshClient::new(Arc::new(transport.clone()), Arc::new(engine.clone()))
        .with_config(config);

    let (handle, events) = client
        .join_room_with_id(room.clone(), id, name)
        .await
        .with_context(|| format!("{name} failed to join"))?;

    Ok(TestParticipant {
        handle,
        events,
        engine,
        transport,
    })
}

/// Waits for the first event matching `pred`, skipping the others.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<MeshEvent>,
    mut pred: F,
) -> Result<MeshEvent>
where
    F: FnMut(&MeshEvent) -> bool,
{
    let wait = Duration::from_millis(EVENT_TIMEOUT_MS);
    tokio::time::timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event receiver lagged by {}", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(anyhow!("Event channel closed"));
                }
            }
        }
    })
    .await
    .context("Timed out waiting for mesh event")?
}

/// Polls until `participant` reports `state` for `peer`.
pub async fn wait_for_peer_state(
    participant: &TestParticipant,
    peer: ParticipantId,
    state: PeerState,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    loop {
        if participant.peer_state(peer).await == Some(state) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow!(
                "{} never reached {} with {} (now {:?})",
                participant.id(),
                state,
                peer,
                participant.peer_state(peer).await
            ));
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Polls until `participant` tracks exactly `expected` (any order).
pub async fn wait_for_peer_set(
    participant: &TestParticipant,
    expected: &[ParticipantId],
) -> Result<()> {
    let mut expected = expected.to_vec();
    expected.sort();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    loop {
        let mut actual = participant.peer_ids().await;
        actual.sort();
        if actual == expected {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow!(
                "peer set of {} is {:?}, expected {:?}",
                participant.id(),
                actual,
                expected
            ));
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Lets queued tasks run for `ms` of (possibly paused) time.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
