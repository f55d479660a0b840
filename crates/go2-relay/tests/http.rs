// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP control surface and relay client, end to end on loopback.

mod common;

use common::{fixture, wait_until, Fixture};
use go2_relay::{
    build_router, BridgeStatus, ConnectArgs, ErrorBody, ErrorKind, LinkOptions, RelayClient,
    RelayError,
};
use go2_webrtc::transport::IntraPeerFactory;
use go2_webrtc::{
    commands, ChannelMessage, PeerEvent, SessionDescription, DATA_CHANNEL_LABEL,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

async fn serve(fx: &Fixture) -> SocketAddr {
    let app = build_router(Arc::clone(&fx.bridge));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> RelayClient {
    RelayClient::new(format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_offer_before_connect_is_409() {
    let fx = fixture();
    let addr = serve(&fx).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/webrtc/offer", addr))
        .json(&json!({"sdp": "v=0\r\n", "type": "offer"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.exception_type, "state_exception");
    assert!(body.detail.contains("/go2/connect"));

    let err = client(addr)
        .offer(&SessionDescription::offer("v=0\r\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::StateConflict(_)));
}

#[tokio::test]
async fn test_connect_lifecycle() {
    let fx = fixture();
    let addr = serve(&fx).await;
    let relay = client(addr);

    let reply = relay.connect_robot(&ConnectArgs::new("10.0.0.7")).await.unwrap();
    assert_eq!(reply.robot_ip, "10.0.0.7");

    let err = relay
        .connect_robot(&ConnectArgs::new("10.0.0.7"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateException);

    let status: BridgeStatus = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status.robot_connected);
    assert_eq!(status.robot_ip.as_deref(), Some("10.0.0.7"));

    relay.disconnect_robot().await.unwrap();
    assert!(!fx.bridge.status().robot_connected);
    // Disconnecting twice is fine.
    relay.disconnect_robot().await.unwrap();
}

#[tokio::test]
async fn test_handshake_failure_is_502() {
    let fx = fixture();
    fx.signaling.fail.store(true, Ordering::Relaxed);
    let addr = serve(&fx).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/go2/connect", addr))
        .json(&json!({"robot_ip": "10.0.0.7"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 502);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.exception_type, "runtime_error");
    assert!(body.detail.contains("HTTP 503"));

    let err = client(addr)
        .connect_robot(&ConnectArgs::new("10.0.0.7"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Runtime(ref d) if d.starts_with("GO2 connect failed")));
}

#[tokio::test]
async fn test_malformed_bodies_are_value_errors() {
    let fx = fixture();
    let addr = serve(&fx).await;
    let http = reqwest::Client::new();

    let bad_json = http
        .post(format!("http://{}/go2/connect", addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(bad_json.status().as_u16(), 422);
    let body: Value = bad_json.json().await.unwrap();
    assert_eq!(body["exception_type"], "value_error");

    let bad_type = http
        .post(format!("http://{}/webrtc/offer", addr))
        .json(&json!({"sdp": "v=0\r\n", "type": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_type.status().as_u16(), 422);

    let wrong_shape = http
        .post(format!("http://{}/go2/connect", addr))
        .json(&json!({"robot_num": "three"}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_shape.status().as_u16(), 422);
    assert!(!fx.bridge.status().robot_connected);
}

#[tokio::test]
async fn test_operator_link() {
    let fx = fixture();
    let addr = serve(&fx).await;
    let relay = client(addr);
    relay.connect_robot(&ConnectArgs::default()).await.unwrap();

    let operator = Arc::new(IntraPeerFactory::new());
    let mut link = relay
        .open(operator.clone(), LinkOptions::default())
        .await
        .unwrap();
    assert!(link.is_open());

    let operator_peer = operator.last_peer().unwrap();
    assert!(operator_peer.has_video_receiver());
    assert!(fx.bridge.status().client_connected);

    // Commands leave on the operator's data channel.
    link.stand_up().await.unwrap();
    link.gaze(0.0, 0.25, 0.0).await.unwrap();
    link.set_obstacle_avoidance(true).await.unwrap();
    let sent = operator_peer.channel(DATA_CHANNEL_LABEL).unwrap().sent_text();
    let sent: Vec<Value> = sent.iter().map(|s| serde_json::from_str(s).unwrap()).collect();
    assert_eq!(sent[0]["data"]["header"]["identity"]["api_id"], 1004);
    assert_eq!(sent[1]["data"]["header"]["identity"]["api_id"], 1007);
    assert_eq!(sent[2]["topic"], "rt/api/obstacles_avoid/request");
    assert_eq!(sent[2]["data"]["parameter"], "{\"enabled\":true}");

    // Relayed telemetry is decoded on arrival.
    let odom = json!({
        "type": "msg",
        "topic": "rt/utlidar/robot_pose",
        "data": {"pose": {"position": {"x": 0.5, "y": -1.0, "z": 0.25},
                          "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}}},
    })
    .to_string();
    operator_peer.inject_text(DATA_CHANNEL_LABEL, r#"{"type":"msg","topic":"rt/unknown","data":{}}"#);
    operator_peer.inject_text(DATA_CHANNEL_LABEL, odom.clone());
    let data = tokio::time::timeout(Duration::from_secs(5), link.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.robot_id, "0");
    assert_eq!(data.odometry.unwrap().position.x, 0.5);
    assert_eq!(data.raw_message, Some(ChannelMessage::Text(odom)));

    let teardown = link.close().await;
    assert!(teardown.is_clean());
    assert!(operator_peer.is_closed());
}

#[tokio::test]
async fn test_operator_video_slot_keeps_newest() {
    let fx = fixture();
    let addr = serve(&fx).await;
    let relay = client(addr);
    relay.connect_robot(&ConnectArgs::default()).await.unwrap();

    let operator = Arc::new(IntraPeerFactory::new());
    let link = relay
        .open(operator.clone(), LinkOptions::default())
        .await
        .unwrap();
    let peer = operator.last_peer().unwrap();
    let mut video = link.video();

    let codec = go2_webrtc::transport::VideoCodec::h264();
    let first = Arc::new(go2_webrtc::VideoRelay::new(codec.clone()));
    let second = Arc::new(go2_webrtc::VideoRelay::new(codec));
    peer.inject(PeerEvent::Track(first.clone()));
    peer.inject(PeerEvent::Track(second.clone()));

    wait_until(|| {
        video
            .borrow_and_update()
            .as_ref()
            .is_some_and(|t| Arc::ptr_eq(t, &second))
    })
    .await;
    assert!(first.is_stopped());
}

#[tokio::test]
async fn test_open_without_robot_fails_cleanly() {
    let fx = fixture();
    let addr = serve(&fx).await;

    let operator = Arc::new(IntraPeerFactory::new());
    let err = client(addr)
        .open(operator.clone(), LinkOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RelayError::StateConflict(_)));
    assert!(operator.last_peer().unwrap().is_closed());
}

#[tokio::test]
async fn test_commands_round_trip_through_relay_to_robot() {
    let fx = fixture();
    let addr = serve(&fx).await;
    let relay = client(addr);
    relay.connect_robot(&ConnectArgs::default()).await.unwrap();

    // Operator channel as seen by the relay.
    fx.bridge
        .offer(SessionDescription::offer("v=0\r\n"))
        .await
        .unwrap();
    let relay_side = fx.factory.last_peer().unwrap();
    let robot = fx.factory.peer(0).unwrap();
    let robot_channel = robot.channel(DATA_CHANNEL_LABEL).unwrap();

    let mut seed = fastrand::Rng::with_seed(7);
    let mut expected = Vec::new();
    for _ in 0..20 {
        let x = seed.i32(-100..100) as f64 / 100.0;
        let command = commands::move_command(x, 0.0, 0.0, seed.bool()).to_string();
        relay_side.inject_text(DATA_CHANNEL_LABEL, command.clone());
        expected.push(ChannelMessage::Text(command));
    }

    // One "vid on" precedes the forwarded commands.
    let sent = robot_channel.wait_sent(21).await;
    assert_eq!(&sent[1..], expected.as_slice());
}
