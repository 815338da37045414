use meshroom_client::PeerState;
use meshroom_core::{IceCandidate, ParticipantId, RoomId, SdpKind, SignalingMessage};
use meshroom_relay::RelayHub;
use std::time::Duration;

use crate::utils::{
    MockBehavior, MockCall, fast_config, init_tracing, join_with, settle, wait_for_peer_state,
};

#[tokio::test]
async fn test_early_candidates_are_flushed_in_arrival_order() {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from("ordering");

    // The responder applies descriptions slowly, so every candidate from
    // the initiator lands while the offer is still being applied.
    let slow_responder = MockBehavior {
        step_delay: Duration::from_millis(200),
        ..MockBehavior::default()
    };
    let chatty_initiator = MockBehavior {
        local_candidates: 6,
        ..MockBehavior::default()
    };

    let p1 = join_with(
        &hub,
        &room,
        ParticipantId::new(),
        "p1",
        slow_responder,
        fast_config(),
    )
    .await
    .expect("p1 join");
    let p2 = join_with(
        &hub,
        &room,
        ParticipantId::new(),
        "p2",
        chatty_initiator,
        fast_config(),
    )
    .await
    .expect("p2 join");

    wait_for_peer_state(&p1, p2.id(), PeerState::Connected)
        .await
        .expect("p1 connected");
    settle(100).await;

    let sent: Vec<String> = p2
        .transport
        .published()
        .into_iter()
        .filter_map(|m| match m {
            SignalingMessage::IceCandidate { candidate, .. } => Some(candidate.candidate),
            _ => None,
        })
        .collect();
    assert_eq!(sent.len(), 6);

    let conn = &p1.engine.connections_to(p2.id())[0];
    assert_eq!(conn.applied_candidates(), sent);

    let calls = conn.calls();
    let remote_at = calls
        .iter()
        .position(|c| *c == MockCall::SetRemote(SdpKind::Offer))
        .expect("offer applied");
    let first_add = calls
        .iter()
        .position(|c| matches!(c, MockCall::AddCandidate(_)))
        .expect("candidate applied");
    assert!(remote_at < first_add);
}

#[tokio::test]
async fn test_duplicate_candidates_are_applied_once() {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from("dup-ice");

    let p1 = join_with(
        &hub,
        &room,
        ParticipantId::new(),
        "p1",
        MockBehavior::default(),
        fast_config(),
    )
    .await
    .expect("p1 join");
    let p2 = join_with(
        &hub,
        &room,
        ParticipantId::new(),
        "p2",
        MockBehavior::default(),
        fast_config(),
    )
    .await
    .expect("p2 join");

    wait_for_peer_state(&p1, p2.id(), PeerState::Connected)
        .await
        .expect("p1 connected");
    settle(50).await;

    let extra = IceCandidate::new("candidate:9 1 udp 1 10.9.9.9 9 typ host");
    for _ in 0..3 {
        p1.transport.inject(
            &room,
            SignalingMessage::IceCandidate {
                sender: p2.id(),
                target: p1.id(),
                candidate: extra.clone(),
            },
        );
    }
    settle(50).await;

    let applied = p1.engine.connections_to(p2.id())[0].applied_candidates();
    let count = applied.iter().filter(|c| **c == extra.candidate).count();
    assert_eq!(count, 1);
}
