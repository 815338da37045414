use meshroom_client::{MeshEvent, TextEvent};
use meshroom_core::{RoomId, TextKind};
use meshroom_relay::RelayHub;

use crate::utils::{init_tracing, join, wait_for_event, wait_for_peer_set};

fn text_body(event: &MeshEvent) -> Option<&TextEvent> {
    match event {
        MeshEvent::Text(text) => Some(text),
        _ => None,
    }
}

#[tokio::test]
async fn test_chat_reaches_everyone_including_sender() {
    init_tracing();
    let hub = RelayHub::default();
    let room = RoomId::from("chat");

    let mut a = join(&hub, &room, "alice").await.expect("a join");
    let mut b = join(&hub, &room, "bob").await.expect("b join");
    wait_for_peer_set(&a, &[b.id()]).await.expect("a sees b");

    let mut b_bus = b.handle.bus().subscribe();
    a.handle.send_chat("hi bob").await.expect("send chat");

    let at_b = wait_for_event(&mut b.events, |e| text_body(e).is_some())
        .await
        .expect("b gets chat");
    let text = text_body(&at_b).expect("text event").clone();
    assert_eq!(text.sender, a.id());
    assert_eq!(text.display_name, "alice");
    assert_eq!(text.kind, TextKind::Chat);
    assert_eq!(text.body, "hi bob");

    let echoed = wait_for_event(&mut a.events, |e| text_body(e).is_some())
        .await
        .expect("a gets its own chat back");
    assert_eq!(text_body(&echoed), Some(&text));

    let from_bus = b_bus.recv().await.expect("bus delivery");
    assert_eq!(from_bus, text);
}

#[tokio::test]
async fn test_chat_is_room_scoped() {
    init_tracing();
    let hub = RelayHub::default();

    let a = join(&hub, &RoomId::from("room-1"), "a").await.expect("a join");
    let mut other = join(&hub, &RoomId::from("room-2"), "other")
        .await
        .expect("other join");

    let mut a_bus = a.handle.bus().subscribe();
    a.handle.send_chat("only room 1").await.expect("send");
    let echoed = a_bus.recv().await.expect("echo");
    assert_eq!(echoed.body, "only room 1");

    let leaked = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        wait_for_event(&mut other.events, |e| text_body(e).is_some()),
    )
    .await;
    assert!(leaked.is_err(), "text crossed rooms");
}
