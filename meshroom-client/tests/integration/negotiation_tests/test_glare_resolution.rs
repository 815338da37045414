use meshroom_client::{MeshConfig, MeshEvent, NegotiationRole, PeerState};
use meshroom_core::{ParticipantId, RoomId, RosterEntry, SdpKind, SignalingMessage};
use meshroom_relay::RelayHub;
use std::time::Duration;

use crate::utils::{
    MockBehavior, MockCall, fast_config, init_tracing, join_with, settle, wait_for_peer_state,
};

fn ordered_ids() -> (ParticipantId, ParticipantId) {
    let a = ParticipantId::new();
    let b = ParticipantId::new();
    if a < b { (a, b) } else { (b, a) }
}

fn glare_config() -> MeshConfig {
    MeshConfig {
        negotiation_timeout: Duration::from_secs(10),
        ..fast_config()
    }
}

/// Makes `a` believe it joined after `b` so both sides send an offer at
/// the same time, then checks that the greater id yields on both ends.
async fn run_glare(room: &str, a_is_lower: bool) {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from(room);
    let (low, high) = ordered_ids();
    let (a_id, b_id) = if a_is_lower { (low, high) } else { (high, low) };

    let slow = MockBehavior {
        step_delay: Duration::from_millis(300),
        ..MockBehavior::default()
    };

    let mut a = join_with(&hub, &room, a_id, "a", slow.clone(), glare_config())
        .await
        .expect("a join");
    a.transport.inject(
        &room,
        SignalingMessage::RosterSnapshot {
            participants: vec![RosterEntry::new(b_id, "b"), RosterEntry::new(a_id, "a")],
        },
    );
    let mut b = join_with(&hub, &room, b_id, "b", slow, glare_config())
        .await
        .expect("b join");

    wait_for_peer_state(&a, b_id, PeerState::Connected)
        .await
        .expect("a connected");
    wait_for_peer_state(&b, a_id, PeerState::Connected)
        .await
        .expect("b connected");
    settle(500).await;

    let (low_side, high_side) = if a_is_lower { (&a, &b) } else { (&b, &a) };

    let low_view = low_side.peers().await;
    let high_view = high_side.peers().await;
    assert_eq!(low_view[0].role, NegotiationRole::Initiator);
    assert_eq!(high_view[0].role, NegotiationRole::Responder);

    // The lower id kept its offer and never applied the inbound one.
    let low_conns = low_side.engine.connections_to(high);
    assert_eq!(low_conns.len(), 1);
    assert!(!low_conns[0].calls().contains(&MockCall::SetRemote(SdpKind::Offer)));

    // The greater id dropped its offering connection for a fresh responder.
    let high_conns = high_side.engine.connections_to(low);
    assert_eq!(high_conns.len(), 2);
    assert!(high_conns[0].is_closed());
    assert_eq!(high_conns[1].calls()[0], MockCall::SetRemote(SdpKind::Offer));

    // The yielded offering slot is reported closed before the responder.
    let high_events = if a_is_lower { &mut b.events } else { &mut a.events };
    let mut states = Vec::new();
    while let Ok(event) = high_events.try_recv() {
        if let MeshEvent::PeerStateChanged { id, state } = event {
            if id == low {
                states.push(state);
            }
        }
    }
    let closed = states
        .iter()
        .position(|s| *s == PeerState::Closed)
        .expect("offering slot closed");
    assert_eq!(states[..closed].first(), Some(&PeerState::New));
    assert_eq!(states.get(closed + 1), Some(&PeerState::New));
    assert_eq!(states.last(), Some(&PeerState::Connected));
    assert_eq!(states.iter().filter(|s| **s == PeerState::Closed).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_glare_lower_id_keeps_offer() {
    run_glare("glare-low", true).await;
}

#[tokio::test(start_paused = true)]
async fn test_glare_is_independent_of_which_side_raced() {
    run_glare("glare-high", false).await;
}
