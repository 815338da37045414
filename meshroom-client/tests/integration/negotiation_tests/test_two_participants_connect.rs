use meshroom_client::{MeshEvent, NegotiationRole, PeerState};
use meshroom_core::{RoomId, SdpKind, SignalingMessage};
use meshroom_relay::RelayHub;

use crate::utils::{
    MockCall, init_tracing, join, settle, wait_for_event, wait_for_peer_state,
};

#[tokio::test]
async fn test_second_joiner_initiates_and_both_connect() {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from("pair");

    let p1 = join(&hub, &room, "p1").await.expect("p1 join");
    let mut p2 = join(&hub, &room, "p2").await.expect("p2 join");

    wait_for_peer_state(&p1, p2.id(), PeerState::Connected)
        .await
        .expect("p1 connected");
    wait_for_peer_state(&p2, p1.id(), PeerState::Connected)
        .await
        .expect("p2 connected");

    let p1_view = p1.peers().await;
    let p2_view = p2.peers().await;
    assert_eq!(p1_view.len(), 1);
    assert_eq!(p2_view.len(), 1);
    assert_eq!(p1_view[0].role, NegotiationRole::Responder);
    assert_eq!(p2_view[0].role, NegotiationRole::Initiator);

    // Only the later joiner ever created an offer.
    let p2_calls = p2.engine.connections_to(p1.id())[0].calls();
    assert_eq!(p2_calls[0], MockCall::CreateOffer);
    let p1_calls = p1.engine.connections_to(p2.id())[0].calls();
    assert_eq!(p1_calls[0], MockCall::SetRemote(SdpKind::Offer));
    assert!(!p1_calls.contains(&MockCall::CreateOffer));

    let p1_id = p1.id();
    let track = wait_for_event(&mut p2.events, |e| {
        matches!(e, MeshEvent::TrackAdded { id, .. } if *id == p1_id)
    })
    .await
    .expect("track event");
    assert!(matches!(track, MeshEvent::TrackAdded { kind, .. } if kind == "video"));
}

#[tokio::test]
async fn test_candidates_cross_after_descriptions() {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from("pair-ice");

    let p1 = join(&hub, &room, "p1").await.expect("p1 join");
    let p2 = join(&hub, &room, "p2").await.expect("p2 join");

    wait_for_peer_state(&p1, p2.id(), PeerState::Connected)
        .await
        .expect("p1 connected");
    wait_for_peer_state(&p2, p1.id(), PeerState::Connected)
        .await
        .expect("p2 connected");

    // Each side applies the two candidates the other gathered.
    let p1_conn = &p1.engine.connections_to(p2.id())[0];
    let p2_conn = &p2.engine.connections_to(p1.id())[0];
    settle(50).await;
    assert_eq!(p1_conn.applied_candidates().len(), 2);
    assert_eq!(p2_conn.applied_candidates().len(), 2);

    let p1_id = p1.id();
    let published = p2.transport.published();
    let offer_at = published
        .iter()
        .position(|m| matches!(m, SignalingMessage::Offer { target, .. } if *target == p1_id))
        .expect("offer published");
    let first_candidate_at = published
        .iter()
        .position(|m| matches!(m, SignalingMessage::IceCandidate { .. }))
        .expect("candidate published");
    assert!(offer_at < first_candidate_at);
}
