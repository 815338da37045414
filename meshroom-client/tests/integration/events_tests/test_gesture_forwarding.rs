use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use meshroom_client::{
    GestureConfig, GestureForwarder, HttpGestureInference, MeshError, MeshEvent,
};
use meshroom_core::utils::GESTURE_WARMUP_LABEL;
use meshroom_core::{RoomId, TextKind};
use meshroom_relay::RelayHub;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::utils::{init_tracing, join, wait_for_event};

#[derive(Clone, Default)]
struct StubInference {
    responses: Arc<Mutex<VecDeque<Value>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn predict(State(stub): State<StubInference>, Json(body): Json<Value>) -> Json<Value> {
    stub.requests.lock().unwrap().push(body);
    let next = stub.responses.lock().unwrap().pop_front();
    Json(next.unwrap_or_else(|| json!({ "success": false })))
}

/// Serves `responses` in order from `POST /predict` on an ephemeral port.
async fn start_stub(responses: Vec<Value>) -> (String, StubInference) {
    let stub = StubInference {
        responses: Arc::new(Mutex::new(responses.into())),
        ..StubInference::default()
    };
    let app = Router::new()
        .route("/predict", post(predict))
        .with_state(stub.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    (format!("http://{addr}/predict"), stub)
}

#[tokio::test]
async fn test_confident_gestures_become_room_text() {
    init_tracing();
    let (endpoint, stub) = start_stub(vec![
        json!({ "success": true, "gesture": GESTURE_WARMUP_LABEL, "confidence": 0.0 }),
        json!({ "success": true, "gesture": "hello", "confidence": 0.9 }),
        json!({ "success": true, "gesture": "hello", "confidence": 0.95 }),
        json!({ "success": true, "gesture": "thanks", "confidence": 0.5 }),
        json!({ "success": false, "error": "no hand in frame" }),
        json!({ "success": true, "gesture": "thanks", "confidence": 0.8 }),
    ])
    .await;

    let hub = RelayHub::default();
    let room = RoomId::from("signs");
    let signer = join(&hub, &room, "signer").await.expect("signer join");
    let mut viewer = join(&hub, &room, "viewer").await.expect("viewer join");

    let inference = HttpGestureInference::new(endpoint, room.clone()).expect("client");
    let mut forwarder = GestureForwarder::new(signer.handle.bus().clone(), GestureConfig::default());

    let mut sent = Vec::new();
    for n in 0..6 {
        match forwarder.process_frame(&inference, &format!("frame-{n}")).await {
            Ok(label) => sent.push(label),
            Err(MeshError::Inference(reason)) => {
                assert_eq!(reason, "no hand in frame");
                sent.push(None);
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(
        sent,
        vec![
            None,
            Some("hello".to_owned()),
            None,
            None,
            None,
            Some("thanks".to_owned()),
        ]
    );

    let requests = stub.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 6);
    assert_eq!(requests[0]["frame_data"], "frame-0");
    assert_eq!(requests[0]["meeting_id"], "signs");

    let signer_id = signer.id();
    for expected in ["hello", "thanks"] {
        let event = wait_for_event(&mut viewer.events, |e| matches!(e, MeshEvent::Text(_)))
            .await
            .expect("gesture text");
        let MeshEvent::Text(text) = event else {
            unreachable!()
        };
        assert_eq!(text.sender, signer_id);
        assert_eq!(text.kind, TextKind::GestureDerived);
        assert_eq!(text.body, expected);
    }
}
