use super::peer_worker::{EngineOp, PeerWorker, StepDone, StepOutcome, WorkerHandle};
use crate::config::MeshConfig;
use crate::error::{MeshError, MeshResult};
use crate::events::{SideChannelBus, TextEvent};
use crate::mesh::{MeshCommand, MeshEvent, PeerSnapshot};
use crate::peer::{NegotiationRole, PeerAction, PeerMachine, PeerState, TimeoutVerdict};
use crate::roster::{Roster, RosterChange};
use crate::signaling::ChannelAdapter;
use crate::transport::{
    MediaConnectionState, MediaEngine, MediaEvent, MediaEventKind, MediaEventSink,
};
use meshroom_core::{ParticipantId, RosterEntry, SignalingMessage};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

struct PeerSlot {
    machine: PeerMachine,
    session: u64,
    /// Spawned with the first engine op, so the worker sees the final role.
    /// Dropping the slot cancels the worker.
    worker: Option<WorkerHandle>,
    reported: PeerState,
}

#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    due: Option<Instant>,
}

/// Event loop owning the roster and every peer connection of one session.
///
/// All membership and negotiation state is mutated here and nowhere else.
/// Engine calls run on per-peer workers and come back as `StepOutcome`s
/// tagged with the slot's session number; anything tagged with a session
/// that no longer exists is dropped on arrival.
pub(crate) struct MeshCoordinator {
    local: RosterEntry,
    config: MeshConfig,
    roster: Roster,
    peers: HashMap<ParticipantId, PeerSlot>,
    retries: HashMap<ParticipantId, RetryState>,
    /// Ids are never reused, so anything a departed participant sends after
    /// its leave is a redelivery.
    departed: HashSet<ParticipantId>,
    next_session: u64,
    adapter: ChannelAdapter,
    engine: Arc<dyn MediaEngine>,
    bus: SideChannelBus,
    events: broadcast::Sender<MeshEvent>,
    inbound: Option<mpsc::UnboundedReceiver<SignalingMessage>>,
    command_rx: mpsc::Receiver<MeshCommand>,
    step_tx: mpsc::Sender<StepOutcome>,
    step_rx: mpsc::Receiver<StepOutcome>,
    media_tx: mpsc::Sender<MediaEvent>,
    media_rx: mpsc::Receiver<MediaEvent>,
}

impl MeshCoordinator {
    pub(crate) fn new(
        local: RosterEntry,
        config: MeshConfig,
        adapter: ChannelAdapter,
        engine: Arc<dyn MediaEngine>,
        inbound: mpsc::UnboundedReceiver<SignalingMessage>,
        command_rx: mpsc::Receiver<MeshCommand>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (step_tx, step_rx) = mpsc::channel(256);
        let (media_tx, media_rx) = mpsc::channel(256);
        let bus = SideChannelBus::new(local.clone(), adapter.clone(), config.event_capacity);

        let mut roster = Roster::new();
        roster.apply_join(local.id, &local.display_name);

        Self {
            local,
            config,
            roster,
            peers: HashMap::new(),
            retries: HashMap::new(),
            departed: HashSet::new(),
            next_session: 0,
            adapter,
            engine,
            bus,
            events,
            inbound: Some(inbound),
            command_rx,
            step_tx,
            step_rx,
            media_tx,
            media_rx,
        }
    }

    pub(crate) fn events(&self) -> broadcast::Sender<MeshEvent> {
        self.events.clone()
    }

    pub(crate) fn bus(&self) -> SideChannelBus {
        self.bus.clone()
    }

    pub(crate) async fn run(mut self) {
        info!(
            "Mesh coordinator for {} in room {} started",
            self.local.id,
            self.adapter.room()
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = recv_or_pending(&mut self.inbound) => {
                    match msg {
                        Some(m) => self.handle_signal(m).await,
                        None => {
                            warn!("Signaling stream for room {} closed", self.adapter.room());
                            self.inbound = None;
                            self.emit(MeshEvent::SignalingUnavailable {
                                reason: "signaling stream closed".into(),
                            });
                        }
                    }
                }

                Some(outcome) = self.step_rx.recv() => {
                    self.handle_step(outcome).await;
                }

                Some(event) = self.media_rx.recv() => {
                    self.handle_media(event).await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MeshCommand::Leave { reply }) => {
                            let result = self.shutdown().await;
                            let _ = reply.send(result);
                            break;
                        }
                        Some(c) => self.handle_command(c),
                        None => {
                            info!("All mesh handles dropped. Leaving room.");
                            if let Err(e) = self.shutdown().await {
                                warn!("Leave announcement failed: {}", e);
                            }
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.on_tick().await;
                }
            }
        }

        info!("Mesh coordinator for {} finished", self.local.id);
    }

    async fn handle_signal(&mut self, message: SignalingMessage) {
        if message.target().is_some_and(|target| target != self.local.id) {
            return;
        }
        let sender = message.sender();
        let is_text = matches!(message, SignalingMessage::TextMessage { .. });
        if sender == Some(self.local.id) && !is_text {
            return;
        }
        debug!("<- {} from {:?}", message.kind_name(), sender);

        if let Some(id) = sender.filter(|id| self.departed.contains(id)) {
            match message {
                SignalingMessage::Offer { .. }
                | SignalingMessage::Answer { .. }
                | SignalingMessage::IceCandidate { .. } => {
                    self.inconsistent(id, message.kind_name());
                    return;
                }
                SignalingMessage::Join { .. } | SignalingMessage::Leave { .. } => {
                    debug!("Ignoring {} from departed {}", message.kind_name(), id);
                    return;
                }
                _ => {}
            }
        }

        match message {
            SignalingMessage::Join {
                sender,
                display_name,
            } => {
                let change = self.roster.apply_join(sender, &display_name);
                if change.is_empty() {
                    self.revive(sender).await;
                    return;
                }
                self.reconcile(change).await;
            }

            SignalingMessage::RosterSnapshot { mut participants } => {
                participants.retain(|entry| !self.departed.contains(&entry.id));
                let change = self.roster.apply_snapshot(&participants, &self.local);
                info!(
                    "Roster snapshot: {} participants (+{} -{})",
                    self.roster.len(),
                    change.added.len(),
                    change.removed.len()
                );
                self.reconcile(change).await;
            }

            SignalingMessage::Leave { sender } => {
                self.departed.insert(sender);
                let change = self.roster.apply_leave(sender);
                self.reconcile(change).await;
            }

            SignalingMessage::Offer { sender, sdp, .. } => {
                self.on_offer(sender, sdp).await;
            }

            SignalingMessage::Answer { sender, sdp, .. } => {
                let Some(slot) = self.peers.get_mut(&sender) else {
                    self.inconsistent(sender, "answer");
                    return;
                };
                let actions = slot.machine.on_remote_answer(sdp);
                self.drive(sender, actions).await;
            }

            SignalingMessage::IceCandidate {
                sender, candidate, ..
            } => {
                let Some(slot) = self.peers.get_mut(&sender) else {
                    self.inconsistent(sender, "ice_candidate");
                    return;
                };
                let actions = slot.machine.on_remote_candidate(candidate);
                self.drive(sender, actions).await;
            }

            SignalingMessage::TextMessage {
                sender,
                display_name,
                kind,
                body,
            } => {
                let event = TextEvent {
                    sender,
                    display_name,
                    kind,
                    body,
                };
                self.bus.dispatch(event.clone());
                self.emit(MeshEvent::Text(event));
            }
        }
    }

    async fn on_offer(&mut self, sender: ParticipantId, sdp: String) {
        if !self.roster.contains(sender) {
            // Offer overtook the sender's join.
            let name = sender.to_string();
            let change = self.roster.apply_join(sender, &name);
            self.emit_joined(&change);
        }

        if !self.peers.contains_key(&sender) {
            debug!("Creating responder for {} on demand", sender);
            self.retries.remove(&sender);
            self.insert_slot(sender, NegotiationRole::Responder, Instant::now());
        }

        let Some(slot) = self.peers.get_mut(&sender) else {
            return;
        };
        let actions = slot.machine.on_remote_offer(sdp, Instant::now());
        self.drive(sender, actions).await;
    }

    /// A repeated join for a known participant whose connection was given
    /// up on gets a fresh one; otherwise it is a no-op.
    async fn revive(&mut self, id: ParticipantId) {
        if self.peers.contains_key(&id) {
            return;
        }
        let waiting = self.retries.get(&id).is_some_and(|r| r.due.is_some());
        if waiting {
            return;
        }
        self.retries.remove(&id);
        self.ensure_peer(id).await;
    }

    async fn reconcile(&mut self, change: RosterChange) {
        for id in change.removed.iter().copied() {
            if id == self.local.id {
                continue;
            }
            self.retries.remove(&id);
            self.departed.insert(id);
            self.close_peer(id);
            info!("Participant {} left", id);
            self.emit(MeshEvent::ParticipantLeft { id });
        }

        let added: Vec<ParticipantId> = change
            .added
            .iter()
            .copied()
            .filter(|id| *id != self.local.id)
            .collect();
        self.emit_joined(&change);
        for id in added {
            self.ensure_peer(id).await;
        }
    }

    fn emit_joined(&self, change: &RosterChange) {
        for id in change.added.iter().copied().filter(|id| *id != self.local.id) {
            let display_name = self.roster.display_name(id).unwrap_or_default().to_owned();
            info!("Participant {} ({}) joined", id, display_name);
            self.emit(MeshEvent::ParticipantJoined { id, display_name });
        }
    }

    /// Creates the connection to `id` unless one exists, taking the role
    /// from join order.
    async fn ensure_peer(&mut self, id: ParticipantId) {
        if id == self.local.id || self.peers.contains_key(&id) {
            return;
        }
        let (Some(local_pos), Some(remote_pos)) =
            (self.roster.position(self.local.id), self.roster.position(id))
        else {
            return;
        };

        let role = NegotiationRole::for_pair(local_pos, remote_pos);
        let now = Instant::now();
        info!("Opening connection to {} as {:?}", id, role);

        let slot = self.insert_slot(id, role, now);
        let actions = slot.machine.start(now);
        self.drive(id, actions).await;
    }

    fn insert_slot(
        &mut self,
        id: ParticipantId,
        role: NegotiationRole,
        now: Instant,
    ) -> &mut PeerSlot {
        self.next_session += 1;
        let slot = PeerSlot {
            machine: PeerMachine::new(self.local.id, id, role, now),
            session: self.next_session,
            worker: None,
            reported: PeerState::New,
        };
        self.emit(MeshEvent::PeerStateChanged {
            id,
            state: PeerState::New,
        });

        self.peers.entry(id).insert_entry(slot).into_mut()
    }

    /// Executes machine actions in order. Engine ops go to the peer's worker;
    /// signals are published inline.
    async fn drive(&mut self, id: ParticipantId, actions: Vec<PeerAction>) {
        let mut pending: VecDeque<PeerAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            match action {
                PeerAction::CreateOffer => self.queue(id, EngineOp::CreateOffer),
                PeerAction::CreateAnswer => self.queue(id, EngineOp::CreateAnswer),
                PeerAction::SetLocalDescription(desc) => self.queue(id, EngineOp::SetLocal(desc)),
                PeerAction::SetRemoteDescription(desc) => {
                    self.queue(id, EngineOp::SetRemote(desc))
                }
                PeerAction::AddIceCandidate(candidate) => {
                    self.queue(id, EngineOp::AddCandidate(candidate))
                }
                PeerAction::Signal(message) => {
                    if let Err(e) = self.adapter.send(message).await {
                        if let MeshError::ChannelUnavailable(reason) = &e {
                            self.emit(MeshEvent::SignalingUnavailable {
                                reason: reason.clone(),
                            });
                        }
                        self.fail_peer(id, e);
                        return;
                    }
                }
                PeerAction::Restart { offer } => {
                    pending.clear();
                    pending.extend(self.restart_as_responder(id, offer));
                }
            }
        }

        self.report(id);
    }

    fn queue(&mut self, id: ParticipantId, op: EngineOp) {
        let Some(slot) = self.peers.get_mut(&id) else {
            return;
        };
        let session = slot.session;
        let role = slot.machine.role();

        let worker = slot.worker.get_or_insert_with(|| {
            PeerWorker::new(
                self.engine.clone(),
                id,
                session,
                role,
                MediaEventSink::new(id, session, self.media_tx.clone()),
                self.step_tx.clone(),
            )
            .spawn()
        });

        if !worker.send(op) {
            // The worker already stopped on an error; its outcome is on the way.
            debug!("Worker for {} is gone, dropping op", id);
        }
    }

    /// Replaces the connection to `id` with a fresh responder for `offer`.
    fn restart_as_responder(&mut self, id: ParticipantId, offer: String) -> Vec<PeerAction> {
        info!("Restarting connection to {} as responder", id);
        self.close_peer(id);
        let now = Instant::now();
        let slot = self.insert_slot(id, NegotiationRole::Responder, now);
        slot.machine.on_remote_offer(offer, now)
    }

    async fn handle_step(&mut self, outcome: StepOutcome) {
        let StepOutcome {
            peer,
            session,
            result,
        } = outcome;

        if !self.is_current(peer, session) {
            debug!("Discarding step result for {} (session {})", peer, session);
            return;
        }

        let done = match result {
            Ok(done) => done,
            Err(e) => {
                self.fail_peer(peer, MeshError::negotiation(peer, &e));
                return;
            }
        };
        let Some(slot) = self.peers.get_mut(&peer) else {
            return;
        };

        let actions = match done {
            StepDone::OfferCreated(desc) => slot.machine.on_offer_created(desc),
            StepDone::AnswerCreated(desc) => slot.machine.on_answer_created(desc),
            StepDone::LocalApplied(desc) => slot.machine.on_local_description_applied(desc),
            StepDone::RemoteApplied => slot.machine.on_remote_description_applied(),
            StepDone::CandidateAdded => Vec::new(),
        };
        self.drive(peer, actions).await;
    }

    async fn handle_media(&mut self, event: MediaEvent) {
        let MediaEvent {
            peer,
            session,
            kind,
        } = event;

        if !self.is_current(peer, session) {
            debug!("Discarding media event for {} (session {})", peer, session);
            return;
        }

        match kind {
            MediaEventKind::LocalCandidate(candidate) => {
                let Some(slot) = self.peers.get_mut(&peer) else {
                    return;
                };
                let actions = slot.machine.on_local_candidate(candidate);
                self.drive(peer, actions).await;
            }
            MediaEventKind::StateChanged(MediaConnectionState::Connected) => {
                let Some(slot) = self.peers.get_mut(&peer) else {
                    return;
                };
                if slot.machine.on_media_connected() {
                    info!("Connected to {}", peer);
                    self.retries.remove(&peer);
                }
                self.report(peer);
            }
            MediaEventKind::StateChanged(MediaConnectionState::Failed) => {
                self.fail_peer(
                    peer,
                    MeshError::Negotiation {
                        peer,
                        reason: "media transport failed".into(),
                    },
                );
            }
            MediaEventKind::StateChanged(state) => {
                debug!("Media state for {}: {:?}", peer, state);
            }
            MediaEventKind::Track { kind, track_id } => {
                info!("Remote {} track from {}", kind, peer);
                self.emit(MeshEvent::TrackAdded {
                    id: peer,
                    kind,
                    track_id,
                });
            }
        }
    }

    fn handle_command(&mut self, cmd: MeshCommand) {
        match cmd {
            MeshCommand::Peers { reply } => {
                let mut peers: Vec<PeerSnapshot> = self
                    .peers
                    .values()
                    .map(|slot| PeerSnapshot {
                        id: slot.machine.remote(),
                        role: slot.machine.role(),
                        state: slot.machine.state(),
                    })
                    .collect();
                peers.sort_by_key(|p| self.roster.position(p.id).unwrap_or(usize::MAX));
                let _ = reply.send(peers);
            }
            MeshCommand::Roster { reply } => {
                let _ = reply.send(self.roster.current());
            }
            // Handled by the loop, it ends the session.
            MeshCommand::Leave { .. } => {}
        }
    }

    async fn on_tick(&mut self) {
        let now = Instant::now();
        let timeout = self.config.negotiation_timeout;

        let mut expired = Vec::new();
        let mut promoted = Vec::new();
        for (id, slot) in self.peers.iter_mut() {
            let elapsed = slot.machine.negotiating_for(now).unwrap_or(timeout);
            match slot.machine.check_timeout(now, timeout) {
                TimeoutVerdict::Expired => expired.push((*id, elapsed)),
                TimeoutVerdict::Promote => promoted.push(*id),
                TimeoutVerdict::Pending => {}
            }
        }

        for (peer, elapsed) in expired {
            self.fail_peer(peer, MeshError::NegotiationTimeout { peer, elapsed });
        }

        for id in promoted {
            let Some(slot) = self.peers.get_mut(&id) else {
                continue;
            };
            info!("No offer from {} yet, initiating instead", id);
            let actions = slot.machine.promote(now);
            self.drive(id, actions).await;
        }

        let due: Vec<ParticipantId> = self
            .retries
            .iter()
            .filter(|(_, retry)| retry.due.is_some_and(|at| at <= now))
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            if let Some(retry) = self.retries.get_mut(&id) {
                retry.due = None;
                info!("Retrying connection to {} (attempt {})", id, retry.attempts);
            }
            self.ensure_peer(id).await;
        }
    }

    fn fail_peer(&mut self, id: ParticipantId, error: MeshError) {
        let Some(mut slot) = self.peers.remove(&id) else {
            return;
        };
        slot.machine.fail();
        warn!("{}", error);
        self.emit(MeshEvent::PeerStateChanged {
            id,
            state: PeerState::Failed,
        });
        self.schedule_retry(id);
    }

    fn close_peer(&mut self, id: ParticipantId) {
        let Some(mut slot) = self.peers.remove(&id) else {
            return;
        };
        slot.machine.close();
        debug!("Closed connection to {}", id);
        self.emit(MeshEvent::PeerStateChanged {
            id,
            state: PeerState::Closed,
        });
    }

    fn schedule_retry(&mut self, id: ParticipantId) {
        if !self.roster.contains(id) {
            return;
        }
        let retry = self.retries.entry(id).or_default();
        retry.attempts += 1;
        if retry.attempts > self.config.max_retries {
            warn!(
                "Giving up on {} after {} attempts",
                id, self.config.max_retries
            );
            retry.due = None;
            return;
        }
        let delay = self.config.backoff_for(retry.attempts);
        debug!("Reconnecting to {} in {:?}", id, delay);
        retry.due = Some(Instant::now() + delay);
    }

    fn report(&mut self, id: ParticipantId) {
        let Some(slot) = self.peers.get_mut(&id) else {
            return;
        };
        let state = slot.machine.state();
        if state == slot.reported {
            return;
        }
        slot.reported = state;
        self.emit(MeshEvent::PeerStateChanged { id, state });
    }

    /// True while `session` is the live slot for `peer`.
    fn is_current(&self, peer: ParticipantId, session: u64) -> bool {
        self.peers
            .get(&peer)
            .is_some_and(|slot| slot.session == session)
    }

    fn inconsistent(&self, peer: ParticipantId, kind: &'static str) {
        debug!("{}", MeshError::RosterInconsistency { peer, kind });
    }

    async fn shutdown(&mut self) -> MeshResult<()> {
        info!("Leaving room {}", self.adapter.room());
        let result = self
            .adapter
            .send(SignalingMessage::Leave {
                sender: self.local.id,
            })
            .await;

        let ids: Vec<ParticipantId> = self.peers.keys().copied().collect();
        for id in ids {
            self.close_peer(id);
        }
        self.retries.clear();
        self.departed.clear();
        self.roster.clear();
        self.emit(MeshEvent::Ended);
        result
    }

    fn emit(&self, event: MeshEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn recv_or_pending(
    rx: &mut Option<mpsc::UnboundedReceiver<SignalingMessage>>,
) -> Option<SignalingMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
