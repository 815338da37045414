use crate::peer::NegotiationRole;
use crate::transport::{MediaConnection, MediaEngine, MediaEventSink};
use anyhow::{Context, Result};
use meshroom_core::{IceCandidate, ParticipantId, SessionDescription};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Engine call queued for one peer connection.
#[derive(Debug)]
pub(crate) enum EngineOp {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(IceCandidate),
}

#[derive(Debug)]
pub(crate) enum StepDone {
    OfferCreated(SessionDescription),
    AnswerCreated(SessionDescription),
    LocalApplied(SessionDescription),
    RemoteApplied,
    CandidateAdded,
}

/// Completion of an `EngineOp`, delivered back to the coordinator loop.
#[derive(Debug)]
pub(crate) struct StepOutcome {
    pub peer: ParticipantId,
    pub session: u64,
    pub result: Result<StepDone>,
}

/// Owner side of a running `PeerWorker`. Dropping it stops the worker.
pub(crate) struct WorkerHandle {
    ops: mpsc::UnboundedSender<EngineOp>,
    _cancel: oneshot::Sender<()>,
}

impl WorkerHandle {
    /// Queues `op`; false once the worker has stopped.
    pub(crate) fn send(&self, op: EngineOp) -> bool {
        self.ops.send(op).is_ok()
    }
}

pub(crate) struct PeerWorker {
    engine: Arc<dyn MediaEngine>,
    peer: ParticipantId,
    session: u64,
    role: NegotiationRole,
    events: MediaEventSink,
    outcomes: mpsc::Sender<StepOutcome>,
}

impl PeerWorker {
    pub(crate) fn new(
        engine: Arc<dyn MediaEngine>,
        peer: ParticipantId,
        session: u64,
        role: NegotiationRole,
        events: MediaEventSink,
        outcomes: mpsc::Sender<StepOutcome>,
    ) -> Self {
        Self {
            engine,
            peer,
            session,
            role,
            events,
            outcomes,
        }
    }

    /// Runs the worker on its own task and returns the handle feeding it.
    ///
    /// Ops execute one at a time in queue order. The media connection is
    /// created on the first op, so a peer torn down before negotiating never
    /// allocates one. Dropping the handle cancels the op in flight, discards
    /// anything still queued and closes the connection.
    pub(crate) fn spawn(self) -> WorkerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(self.run(rx, cancel_rx));
        WorkerHandle {
            ops: tx,
            _cancel: cancel_tx,
        }
    }

    async fn run(
        self,
        mut ops: mpsc::UnboundedReceiver<EngineOp>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        let mut connection: Option<Arc<dyn MediaConnection>> = None;

        loop {
            let op = tokio::select! {
                biased;
                _ = &mut cancel => break,
                op = ops.recv() => match op {
                    Some(op) => op,
                    None => break,
                },
            };

            let result = tokio::select! {
                biased;
                _ = &mut cancel => {
                    debug!("Worker for {} cancelled mid-op", self.peer);
                    break;
                }
                result = self.step(&mut connection, op) => result,
            };

            let failed = result.is_err();
            let outcome = StepOutcome {
                peer: self.peer,
                session: self.session,
                result,
            };
            if self.outcomes.send(outcome).await.is_err() || failed {
                break;
            }
        }

        if let Some(conn) = connection {
            if let Err(e) = conn.close().await {
                debug!("Closing connection to {} failed: {:#}", self.peer, e);
            }
        }
        debug!("Worker for {} (session {}) stopped", self.peer, self.session);
    }

    async fn step(
        &self,
        connection: &mut Option<Arc<dyn MediaConnection>>,
        op: EngineOp,
    ) -> Result<StepDone> {
        let conn = match connection {
            Some(conn) => conn.clone(),
            None => {
                let conn = self.connect().await?;
                *connection = Some(conn.clone());
                conn
            }
        };
        execute(conn.as_ref(), op).await
    }

    async fn connect(&self) -> Result<Arc<dyn MediaConnection>> {
        self.engine
            .create_connection(self.peer, self.role, self.events.clone())
            .await
            .context("Failed to create media connection")
    }
}

async fn execute(conn: &dyn MediaConnection, op: EngineOp) -> Result<StepDone> {
    match op {
        EngineOp::CreateOffer => conn.create_offer().await.map(StepDone::OfferCreated),
        EngineOp::CreateAnswer => conn.create_answer().await.map(StepDone::AnswerCreated),
        EngineOp::SetLocal(desc) => {
            conn.set_local_description(desc.clone()).await?;
            Ok(StepDone::LocalApplied(desc))
        }
        EngineOp::SetRemote(desc) => {
            conn.set_remote_description(desc).await?;
            Ok(StepDone::RemoteApplied)
        }
        EngineOp::AddCandidate(candidate) => {
            conn.add_ice_candidate(candidate).await?;
            Ok(StepDone::CandidateAdded)
        }
    }
}
