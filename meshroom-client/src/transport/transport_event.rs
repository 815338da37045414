use meshroom_core::{IceCandidate, ParticipantId};
use tokio::sync::mpsc;
use tracing::debug;

/// Transport state as reported by the media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEventKind {
    /// Locally gathered candidate that has to reach the remote.
    LocalCandidate(IceCandidate),
    StateChanged(MediaConnectionState),
    Track { kind: String, track_id: String },
}

/// Engine callback routed back to the coordinator, tagged with the peer
/// session it belongs to so events from torn-down connections are dropped.
#[derive(Debug, Clone)]
pub struct MediaEvent {
    pub peer: ParticipantId,
    pub session: u64,
    pub kind: MediaEventKind,
}

/// Handle an engine connection uses to report its events.
#[derive(Debug, Clone)]
pub struct MediaEventSink {
    peer: ParticipantId,
    session: u64,
    tx: mpsc::Sender<MediaEvent>,
}

impl MediaEventSink {
    pub fn new(peer: ParticipantId, session: u64, tx: mpsc::Sender<MediaEvent>) -> Self {
        Self { peer, session, tx }
    }

    pub fn peer(&self) -> ParticipantId {
        self.peer
    }

    pub async fn emit(&self, kind: MediaEventKind) {
        let event = MediaEvent {
            peer: self.peer,
            session: self.session,
            kind,
        };
        if self.tx.send(event).await.is_err() {
            debug!("Coordinator gone, dropping media event for {}", self.peer);
        }
    }

    pub async fn candidate(&self, candidate: IceCandidate) {
        self.emit(MediaEventKind::LocalCandidate(candidate)).await;
    }

    pub async fn state(&self, state: MediaConnectionState) {
        self.emit(MediaEventKind::StateChanged(state)).await;
    }

    pub async fn track(&self, kind: String, track_id: String) {
        self.emit(MediaEventKind::Track { kind, track_id }).await;
    }
}
