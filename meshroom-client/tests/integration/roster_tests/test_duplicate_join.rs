use meshroom_client::PeerState;
use meshroom_core::{RoomId, SignalingMessage};
use meshroom_relay::RelayHub;

use crate::utils::{init_tracing, join, settle, wait_for_peer_state};

#[tokio::test]
async fn test_repeated_join_does_not_reconnect() {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from("dup-join");

    let a = join(&hub, &room, "a").await.expect("a join");
    let b = join(&hub, &room, "b").await.expect("b join");
    wait_for_peer_state(&a, b.id(), PeerState::Connected)
        .await
        .expect("connected");

    for _ in 0..3 {
        a.transport.inject(
            &room,
            SignalingMessage::Join {
                sender: b.id(),
                display_name: "b (renamed)".into(),
            },
        );
    }
    settle(100).await;

    assert_eq!(a.engine.connections_to(b.id()).len(), 1);
    assert_eq!(a.peer_state(b.id()).await, Some(PeerState::Connected));

    let roster = a.handle.roster().await.expect("roster");
    assert_eq!(roster.len(), 2);
    let entry = roster.iter().find(|e| e.id == b.id()).expect("b listed");
    assert_eq!(entry.display_name, "b (renamed)");
}

#[tokio::test]
async fn test_own_join_echo_is_ignored() {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from("self-echo");

    let a = join(&hub, &room, "a").await.expect("a join");
    a.transport.inject(
        &room,
        SignalingMessage::Join {
            sender: a.id(),
            display_name: "a".into(),
        },
    );
    settle(50).await;

    assert!(a.peers().await.is_empty());
    assert!(a.engine.connections().is_empty());
}
