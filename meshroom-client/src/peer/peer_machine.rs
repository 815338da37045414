use crate::peer::{NegotiationPhase, NegotiationRole, PeerAction, PeerState, TimeoutVerdict};
use meshroom_core::{IceCandidate, ParticipantId, SessionDescription, SignalingMessage};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Offer/answer/ICE state machine for the connection to one remote participant.
///
/// The machine performs no I/O. Each input returns the actions the owner has
/// to carry out; completions of those actions come back in as further inputs.
/// Inputs that do not fit the current phase (duplicates, stale answers,
/// results arriving after teardown) produce no actions.
#[derive(Debug)]
pub struct PeerMachine {
    local: ParticipantId,
    remote: ParticipantId,
    role: NegotiationRole,
    state: PeerState,
    phase: NegotiationPhase,
    /// Candidates that arrived before the remote description was applied.
    pending_candidates: VecDeque<IceCandidate>,
    seen_candidates: HashSet<IceCandidate>,
    /// Local candidates gathered before our description went out.
    outbound_candidates: VecDeque<IceCandidate>,
    local_description_sent: bool,
    remote_description_applied: bool,
    last_remote_offer: Option<String>,
    created_at: Instant,
    negotiating_since: Option<Instant>,
}

impl PeerMachine {
    pub fn new(
        local: ParticipantId,
        remote: ParticipantId,
        role: NegotiationRole,
        now: Instant,
    ) -> Self {
        Self {
            local,
            remote,
            role,
            state: PeerState::New,
            phase: NegotiationPhase::Idle,
            pending_candidates: VecDeque::new(),
            seen_candidates: HashSet::new(),
            outbound_candidates: VecDeque::new(),
            local_description_sent: false,
            remote_description_applied: false,
            last_remote_offer: None,
            created_at: now,
            negotiating_since: None,
        }
    }

    pub fn remote(&self) -> ParticipantId {
        self.remote
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    pub fn pending_candidates(&self) -> impl Iterator<Item = &IceCandidate> {
        self.pending_candidates.iter()
    }

    /// Kicks off negotiation. Only an initiator acts; a responder waits for
    /// the remote offer.
    pub fn start(&mut self, now: Instant) -> Vec<PeerAction> {
        if self.state != PeerState::New || self.role != NegotiationRole::Initiator {
            return Vec::new();
        }
        self.enter_negotiating(now);
        self.phase = NegotiationPhase::CreatingOffer;
        vec![PeerAction::CreateOffer]
    }

    /// Turns a responder that never heard from its peer into the initiator.
    pub fn promote(&mut self, now: Instant) -> Vec<PeerAction> {
        if self.state != PeerState::New {
            return Vec::new();
        }
        self.role = NegotiationRole::Initiator;
        self.start(now)
    }

    pub fn on_offer_created(&mut self, offer: SessionDescription) -> Vec<PeerAction> {
        if !self.expecting(NegotiationPhase::CreatingOffer, "offer created") {
            return Vec::new();
        }
        self.phase = NegotiationPhase::ApplyingLocalOffer;
        vec![PeerAction::SetLocalDescription(offer)]
    }

    pub fn on_answer_created(&mut self, answer: SessionDescription) -> Vec<PeerAction> {
        if !self.expecting(NegotiationPhase::CreatingAnswer, "answer created") {
            return Vec::new();
        }
        self.phase = NegotiationPhase::ApplyingLocalAnswer;
        vec![PeerAction::SetLocalDescription(answer)]
    }

    /// The local description went in; publish it to the remote, followed by
    /// any local candidates that were held back until now.
    pub fn on_local_description_applied(&mut self, local: SessionDescription) -> Vec<PeerAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let description = match self.phase {
            NegotiationPhase::ApplyingLocalOffer => {
                self.phase = NegotiationPhase::AwaitingAnswer;
                SignalingMessage::Offer {
                    sender: self.local,
                    target: self.remote,
                    sdp: local.sdp,
                }
            }
            NegotiationPhase::ApplyingLocalAnswer => {
                self.phase = NegotiationPhase::Stable;
                SignalingMessage::Answer {
                    sender: self.local,
                    target: self.remote,
                    sdp: local.sdp,
                }
            }
            phase => {
                debug!("Ignoring local description for {} in {:?}", self.remote, phase);
                return Vec::new();
            }
        };

        self.local_description_sent = true;
        let mut actions = vec![PeerAction::Signal(description)];
        while let Some(candidate) = self.outbound_candidates.pop_front() {
            actions.push(self.candidate_signal(candidate));
        }
        actions
    }

    /// The remote description went in: flush buffered candidates in arrival
    /// order, then continue (a responder still owes an answer).
    pub fn on_remote_description_applied(&mut self) -> Vec<PeerAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let next = match self.phase {
            NegotiationPhase::ApplyingRemoteOffer => NegotiationPhase::CreatingAnswer,
            NegotiationPhase::ApplyingRemoteAnswer => NegotiationPhase::Stable,
            phase => {
                debug!("Ignoring remote description for {} in {:?}", self.remote, phase);
                return Vec::new();
            }
        };

        self.remote_description_applied = true;
        self.phase = next;

        let mut actions: Vec<PeerAction> = self
            .pending_candidates
            .drain(..)
            .map(PeerAction::AddIceCandidate)
            .collect();
        if next == NegotiationPhase::CreatingAnswer {
            actions.push(PeerAction::CreateAnswer);
        }
        actions
    }

    pub fn on_remote_offer(&mut self, sdp: String, now: Instant) -> Vec<PeerAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        if self.last_remote_offer.as_deref() == Some(sdp.as_str()) {
            debug!("Duplicate offer from {}", self.remote);
            return Vec::new();
        }

        if self.phase.has_outbound_offer() {
            // Both sides offered. The greater id yields so that the two ends
            // reach the same decision independently.
            if self.local > self.remote {
                debug!("Glare with {}: yielding to remote offer", self.remote);
                return vec![PeerAction::Restart { offer: sdp }];
            }
            debug!("Glare with {}: keeping local offer", self.remote);
            return Vec::new();
        }

        if self.phase != NegotiationPhase::Idle {
            // A fresh offer after we already answered: the remote rebuilt its side.
            return vec![PeerAction::Restart { offer: sdp }];
        }

        self.role = NegotiationRole::Responder;
        self.enter_negotiating(now);
        self.phase = NegotiationPhase::ApplyingRemoteOffer;
        self.last_remote_offer = Some(sdp.clone());
        vec![PeerAction::SetRemoteDescription(SessionDescription::offer(
            sdp,
        ))]
    }

    pub fn on_remote_answer(&mut self, sdp: String) -> Vec<PeerAction> {
        if self.state.is_terminal() || self.phase != NegotiationPhase::AwaitingAnswer {
            debug!(
                "Dropping answer from {} in {:?}/{:?}",
                self.remote, self.state, self.phase
            );
            return Vec::new();
        }
        self.phase = NegotiationPhase::ApplyingRemoteAnswer;
        vec![PeerAction::SetRemoteDescription(SessionDescription::answer(
            sdp,
        ))]
    }

    pub fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Vec<PeerAction> {
        if self.state.is_terminal() || !self.seen_candidates.insert(candidate.clone()) {
            return Vec::new();
        }
        if self.remote_description_applied {
            return vec![PeerAction::AddIceCandidate(candidate)];
        }
        self.pending_candidates.push_back(candidate);
        Vec::new()
    }

    /// A locally gathered candidate. It is held back until the description it
    /// belongs to has been sent, so the remote never sees it first.
    pub fn on_local_candidate(&mut self, candidate: IceCandidate) -> Vec<PeerAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        if !self.local_description_sent {
            self.outbound_candidates.push_back(candidate);
            return Vec::new();
        }
        vec![self.candidate_signal(candidate)]
    }

    /// The media engine reports an established transport.
    pub fn on_media_connected(&mut self) -> bool {
        if self.state != PeerState::Negotiating {
            return false;
        }
        self.state = PeerState::Connected;
        self.negotiating_since = None;
        true
    }

    pub fn fail(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = PeerState::Failed;
        self.pending_candidates.clear();
        self.outbound_candidates.clear();
        true
    }

    pub fn close(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = PeerState::Closed;
        self.pending_candidates.clear();
        self.outbound_candidates.clear();
        true
    }

    pub fn check_timeout(&mut self, now: Instant, timeout: Duration) -> TimeoutVerdict {
        match self.state {
            PeerState::Negotiating => {
                let since = self.negotiating_since.unwrap_or(self.created_at);
                if now.saturating_duration_since(since) >= timeout {
                    self.fail();
                    return TimeoutVerdict::Expired;
                }
                TimeoutVerdict::Pending
            }
            PeerState::New
                if self.role == NegotiationRole::Responder
                    && now.saturating_duration_since(self.created_at) >= timeout =>
            {
                TimeoutVerdict::Promote
            }
            _ => TimeoutVerdict::Pending,
        }
    }

    pub fn negotiating_for(&self, now: Instant) -> Option<Duration> {
        self.negotiating_since
            .map(|since| now.saturating_duration_since(since))
    }

    fn candidate_signal(&self, candidate: IceCandidate) -> PeerAction {
        PeerAction::Signal(SignalingMessage::IceCandidate {
            sender: self.local,
            target: self.remote,
            candidate,
        })
    }

    fn enter_negotiating(&mut self, now: Instant) {
        self.state = PeerState::Negotiating;
        self.negotiating_since = Some(now);
    }

    fn expecting(&self, phase: NegotiationPhase, what: &str) -> bool {
        if self.state.is_terminal() || self.phase != phase {
            debug!(
                "Ignoring {} for {} in {:?}/{:?}",
                what, self.remote, self.state, self.phase
            );
            return false;
        }
        true
    }
}
