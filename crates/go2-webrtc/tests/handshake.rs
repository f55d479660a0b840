// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Signaling handshake against an in-process mock robot.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use go2_webrtc::crypto::{aes_ecb, rsa_key};
use go2_webrtc::transport::IntraPeerFactory;
use go2_webrtc::{
    HandshakeError, HttpSignaling, NoopObserver, RobotSession, SessionConfig, SessionDescription,
    SessionState, Signaling, SignalingTarget,
};
use parking_lot::Mutex;
use rsa::rand_core::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const ANSWER_SDP: &str = "v=0\r\no=robot 1 1 IN IP4 192.168.12.1\r\ns=-\r\n";

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Normal,
    NotifyFails,
    NotifyStalls,
    NoData1,
}

struct MockRobot {
    private: RsaPrivateKey,
    behavior: Behavior,
    offers: Mutex<Vec<Value>>,
    content_types: Mutex<Vec<String>>,
}

async fn con_notify(State(robot): State<Arc<MockRobot>>) -> Result<String, StatusCode> {
    match robot.behavior {
        Behavior::NotifyFails => return Err(StatusCode::INTERNAL_SERVER_ERROR),
        Behavior::NotifyStalls => tokio::time::sleep(Duration::from_secs(5)).await,
        Behavior::NoData1 => return Ok(STANDARD.encode(r#"{"data2":2}"#)),
        Behavior::Normal => {}
    }

    let public = RsaPublicKey::from(&robot.private);
    let key = rsa_key::export_public_key(&public).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    // Path digits come from the second character of each trailing pair.
    let data1 = format!("JJJJJJJJJJ{}AABBCCDDEE", key);
    Ok(STANDARD.encode(json!({ "data1": data1, "data2": 2 }).to_string()))
}

async fn con_ing(
    State(robot): State<Arc<MockRobot>>,
    headers: axum::http::HeaderMap,
    body: String,
) -> Result<String, StatusCode> {
    if let Some(ct) = headers.get("content-type").and_then(|v| v.to_str().ok()) {
        robot.content_types.lock().push(ct.to_string());
    }

    let request: Value = serde_json::from_str(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
    let wrapped = request["data2"].as_str().ok_or(StatusCode::BAD_REQUEST)?;
    let sealed = request["data1"].as_str().ok_or(StatusCode::BAD_REQUEST)?;

    let aes_key = rsa_key::decrypt(wrapped, &robot.private).map_err(|_| StatusCode::FORBIDDEN)?;
    let aes_key = String::from_utf8(aes_key).map_err(|_| StatusCode::FORBIDDEN)?;
    let offer = aes_ecb::decrypt(sealed, &aes_key).map_err(|_| StatusCode::FORBIDDEN)?;
    let offer: Value = serde_json::from_str(&offer).map_err(|_| StatusCode::BAD_REQUEST)?;
    robot.offers.lock().push(offer);

    aes_ecb::encrypt(&json!({"sdp": ANSWER_SDP, "type": "answer"}).to_string(), &aes_key)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn spawn_robot(behavior: Behavior) -> (SocketAddr, Arc<MockRobot>) {
    let robot = Arc::new(MockRobot {
        private: RsaPrivateKey::new(&mut OsRng, 1024).expect("generate key"),
        behavior,
        offers: Mutex::new(Vec::new()),
        content_types: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/con_notify", post(con_notify))
        .route("/con_ing_01234", post(con_ing))
        .with_state(Arc::clone(&robot));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, robot)
}

fn target(addr: SocketAddr, token: &str) -> SignalingTarget {
    let mut target = SignalingTarget::new(addr.ip().to_string(), token);
    target.port = addr.port();
    target
}

#[tokio::test]
async fn test_exchange() {
    let (addr, robot) = spawn_robot(Behavior::Normal).await;
    let signaling = HttpSignaling::new(Duration::from_secs(5)).unwrap();

    let offer = SessionDescription::offer("v=0\r\no=client\r\n");
    let answer = signaling.exchange(&target(addr, "tok"), &offer).await.unwrap();
    assert_eq!(answer, SessionDescription::answer(ANSWER_SDP));

    let offers = robot.offers.lock().clone();
    assert_eq!(
        offers,
        vec![json!({
            "id": "STA_localNetwork",
            "sdp": "v=0\r\no=client\r\n",
            "type": "offer",
            "token": "tok",
        })]
    );
    assert_eq!(
        robot.content_types.lock().as_slice(),
        ["application/x-www-form-urlencoded"]
    );
}

#[tokio::test]
async fn test_every_exchange_uses_a_fresh_key() {
    let (addr, robot) = spawn_robot(Behavior::Normal).await;
    let signaling = HttpSignaling::new(Duration::from_secs(5)).unwrap();
    let offer = SessionDescription::offer("v=0\r\n");

    for _ in 0..2 {
        signaling.exchange(&target(addr, ""), &offer).await.unwrap();
    }
    assert_eq!(robot.offers.lock().len(), 2);
}

#[tokio::test]
async fn test_notify_status_error() {
    let (addr, _robot) = spawn_robot(Behavior::NotifyFails).await;
    let signaling = HttpSignaling::new(Duration::from_secs(5)).unwrap();

    let err = signaling
        .exchange(&target(addr, ""), &SessionDescription::offer("v=0\r\n"))
        .await
        .unwrap_err();
    match err {
        HandshakeError::Status { url, status } => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/con_notify"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_data1() {
    let (addr, _robot) = spawn_robot(Behavior::NoData1).await;
    let signaling = HttpSignaling::new(Duration::from_secs(5)).unwrap();

    let err = signaling
        .exchange(&target(addr, ""), &SessionDescription::offer("v=0\r\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, HandshakeError::MissingField("data1")));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let (addr, _robot) = spawn_robot(Behavior::NotifyStalls).await;
    let signaling = HttpSignaling::new(Duration::from_millis(200)).unwrap();

    let err = signaling
        .exchange(&target(addr, ""), &SessionDescription::offer("v=0\r\n"))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_robot() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let signaling = HttpSignaling::new(Duration::from_secs(2)).unwrap();
    let err = signaling
        .exchange(&target(addr, ""), &SessionDescription::offer("v=0\r\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, HandshakeError::Http { .. }));
}

#[tokio::test]
async fn test_session_connects_through_mock_robot() {
    let (addr, robot) = spawn_robot(Behavior::Normal).await;
    let config = SessionConfig::new(addr.ip().to_string())
        .signaling_port(addr.port())
        .robot_id("1");
    let factory = Arc::new(IntraPeerFactory::new());
    let session = RobotSession::new(
        config,
        factory.clone(),
        Arc::new(HttpSignaling::new(Duration::from_secs(5)).unwrap()),
        Arc::new(NoopObserver),
    );

    session.connect().await.unwrap();

    let peer = factory.last_peer().unwrap();
    assert_eq!(peer.remote_description(), Some(SessionDescription::answer(ANSWER_SDP)));
    let sent_sdp = robot.offers.lock()[0]["sdp"].as_str().unwrap().to_string();
    assert_eq!(Some(sent_sdp), peer.local_description().map(|d| d.sdp));

    let teardown = session.disconnect().await;
    assert!(teardown.is_clean());
    assert_eq!(session.state(), SessionState::Closed);
}
