// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay bridge.
//!
//! Joins at most one robot session with at most one client-facing session.
//!
//! ```text
//!  robot  <--- RobotSession --->  RelayBridge  <--- client peer --->  operator
//!           raw frames  ------------------------------------------->
//!                       <------------------------- text commands
//!           video RTP   ---- VideoRelay (fan-out) ----------------->
//! ```
//!
//! Frames are routed verbatim in both directions and never re-encoded.
//! `connect_robot`, `offer` and `disconnect_robot` are serialized by one
//! transition lock; the forwarding path only touches the slots.

use crate::config::RelayConfig;
use crate::error::RelayError;
use async_trait::async_trait;
use go2_webrtc::message::kind;
use go2_webrtc::transport::{DataChannel, PeerConnection, PeerEvents};
use go2_webrtc::{
    topics, ChannelMessage, IceConfig, PeerEvent, PeerFactory, PeerState, RobotData,
    RobotSession, SdpKind, SessionConfig, SessionDescription, SessionObserver, Signaling,
    Teardown, VideoRelay,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Settings applied to every session the bridge creates.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub http_timeout: Duration,
    pub validation_timeout: Option<Duration>,
    pub ice: IceConfig,
    pub default_topics: Vec<String>,
}

impl BridgeSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            http_timeout: config.http_timeout(),
            validation_timeout: config.validation_timeout(),
            ice: IceConfig {
                servers: config.ice_servers.clone(),
            },
            default_topics: config.default_topics.clone(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

fn default_robot_ip() -> String {
    "192.168.12.1".to_string()
}

/// `POST /go2/connect` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectArgs {
    #[serde(default = "default_robot_ip")]
    pub robot_ip: String,
    #[serde(default)]
    pub robot_num: u32,
    #[serde(default)]
    pub token: String,
    /// `None` subscribes to the configured default topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics_to_subscribe_to: Option<Vec<String>>,
}

impl ConnectArgs {
    pub fn new(robot_ip: impl Into<String>) -> Self {
        Self {
            robot_ip: robot_ip.into(),
            robot_num: 0,
            token: String::new(),
            topics_to_subscribe_to: None,
        }
    }
}

impl Default for ConnectArgs {
    fn default() -> Self {
        Self::new(default_robot_ip())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectReply {
    pub robot_ip: String,
}

/// Point-in-time view of the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub robot_connected: bool,
    pub robot_ip: Option<String>,
    pub robot_state: Option<String>,
    pub robot_validated: bool,
    pub client_connected: bool,
    pub client_channel_open: bool,
    pub video_available: bool,
    pub messages_to_client: u64,
    pub messages_to_robot: u64,
    pub messages_dropped: u64,
}

struct ClientLink {
    peer: Arc<dyn PeerConnection>,
    task: JoinHandle<()>,
}

/// Slots read by the forwarding paths.
#[derive(Default)]
struct Shared {
    robot: Mutex<Option<RobotSession>>,
    client_channel: Mutex<Option<Arc<dyn DataChannel>>>,
    video: Mutex<Option<Arc<VideoRelay>>>,
    /// Current client session; stale event loops stop on mismatch.
    generation: AtomicU64,
    to_client: AtomicU64,
    to_robot: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    async fn forward_to_client(&self, message: ChannelMessage) {
        let channel = self.client_channel.lock().clone();
        let Some(channel) = channel.filter(|c| c.is_open()) else {
            debug!("client channel not open, dropping {} byte frame", message.len());
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match channel.send(message).await {
            Ok(()) => {
                self.to_client.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("failed to forward frame to client: {}", e);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn forward_to_robot(&self, text: String) {
        let robot = self.robot.lock().clone();
        let Some(robot) = robot else {
            warn!("no robot session to forward client message to");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match robot.publish_raw(text).await {
            Ok(()) => {
                self.to_robot.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("failed to forward client message to robot: {}", e);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Robot-side callbacks.
struct BridgeObserver {
    shared: Weak<Shared>,
    topics: Vec<String>,
}

#[async_trait]
impl SessionObserver for BridgeObserver {
    fn wants_video(&self) -> bool {
        true
    }

    async fn on_open(&self, robot_id: &str) {
        info!("robot {} data channel open", robot_id);
    }

    async fn on_validated(&self, session: &RobotSession) {
        info!(
            "robot {} validated, subscribing to {} topics",
            session.robot_id(),
            self.topics.len()
        );
        if let Err(e) = session.disable_traffic_saving(true).await {
            warn!("failed to disable traffic saving: {}", e);
        }
        for topic in &self.topics {
            if let Err(e) = session.subscribe(topic).await {
                warn!("failed to subscribe to {}: {}", topic, e);
            }
        }
        if let Err(e) = session
            .publish(topics::ULIDAR_SWITCH, json!("on"), kind::MSG)
            .await
        {
            warn!("failed to switch lidar on: {}", e);
        }
    }

    async fn on_message(&self, data: RobotData) {
        let (Some(shared), Some(raw)) = (self.shared.upgrade(), data.raw_message) else {
            return;
        };
        shared.forward_to_client(raw).await;
    }

    async fn on_video_track(&self, robot_id: &str, track: Arc<VideoRelay>) {
        info!("received video track from robot {}", robot_id);
        let Some(shared) = self.shared.upgrade() else {
            track.stop();
            return;
        };
        if let Some(previous) = shared.video.lock().replace(track) {
            previous.stop();
        };
    }

    async fn on_failed(&self, robot_id: &str, reason: &str) {
        error!(
            "robot {} session failed ({}); call disconnect before reconnecting",
            robot_id, reason
        );
    }
}

/// The relay's single piece of shared state.
pub struct RelayBridge {
    factory: Arc<dyn PeerFactory>,
    signaling: Arc<dyn Signaling>,
    settings: BridgeSettings,
    transitions: tokio::sync::Mutex<()>,
    client: Mutex<Option<ClientLink>>,
    shared: Arc<Shared>,
}

impl RelayBridge {
    /// `factory` builds both robot-side and client-side peers.
    pub fn new(
        factory: Arc<dyn PeerFactory>,
        signaling: Arc<dyn Signaling>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            factory,
            signaling,
            settings,
            transitions: tokio::sync::Mutex::new(()),
            client: Mutex::new(None),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Open the robot session in pass-through mode.
    ///
    /// Fails with a state conflict while a robot session exists. A failed
    /// handshake leaves no session behind.
    pub async fn connect_robot(&self, args: ConnectArgs) -> Result<ConnectReply, RelayError> {
        let _guard = self.transitions.lock().await;
        if self.shared.robot.lock().is_some() {
            return Err(RelayError::StateConflict(
                "Already connected to Go2, call disconnect first before calling connect again"
                    .into(),
            ));
        }
        if args.robot_ip.trim().is_empty() {
            return Err(RelayError::InvalidInput("robot_ip must not be empty".into()));
        }

        let topics = args
            .topics_to_subscribe_to
            .clone()
            .unwrap_or_else(|| self.settings.default_topics.clone());
        let config = SessionConfig::new(args.robot_ip.clone())
            .robot_id(args.robot_num.to_string())
            .token(args.token.clone())
            .http_timeout(self.settings.http_timeout)
            .validation_timeout(self.settings.validation_timeout)
            .decode_messages(false)
            .decode_lidar(false)
            .ice_servers(self.settings.ice.servers.clone());
        let observer = Arc::new(BridgeObserver {
            shared: Arc::downgrade(&self.shared),
            topics,
        });

        let session = RobotSession::new(
            config,
            Arc::clone(&self.factory),
            Arc::clone(&self.signaling),
            observer,
        );
        session.connect().await?;

        *self.shared.robot.lock() = Some(session);
        info!("connected to robot at {}", args.robot_ip);
        Ok(ConnectReply {
            robot_ip: args.robot_ip,
        })
    }

    /// Close the client session, then the robot session.
    ///
    /// Never fails; the returned record lists what could not be closed.
    pub async fn disconnect_robot(&self) -> Teardown {
        let _guard = self.transitions.lock().await;
        let mut teardown = self.close_client().await;
        let session = self.shared.robot.lock().take();
        if let Some(session) = session {
            teardown.merge(session.disconnect().await);
        }
        if let Some(video) = self.shared.video.lock().take() {
            video.stop();
        }
        teardown
    }

    /// Answer an operator's offer with a new client session.
    ///
    /// Any previous client session is closed first, even if this one fails
    /// to negotiate. The robot session is never touched by a failure here.
    pub async fn offer(&self, offer: SessionDescription) -> Result<SessionDescription, RelayError> {
        let _guard = self.transitions.lock().await;
        let robot = self.shared.robot.lock().clone().ok_or_else(|| {
            RelayError::StateConflict(
                "connection to the go2 hasn't been established yet, call /go2/connect first"
                    .into(),
            )
        })?;
        if offer.kind != SdpKind::Offer {
            return Err(RelayError::InvalidInput(format!(
                "expected an offer, got {}",
                offer.kind
            )));
        }

        self.close_client().await;
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let answer = match self.negotiate(offer, generation).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("failed to negotiate client session: {}", e);
                self.close_client().await;
                return Err(RelayError::StateConflict(format!(
                    "Failed to create relay session description: {}",
                    e
                )));
            }
        };

        // A fresh key frame for the new subscriber.
        if let Err(e) = robot.enable_video().await {
            warn!("could not re-trigger robot video: {}", e);
        }
        info!("client session {} established", generation);
        Ok(answer)
    }

    async fn negotiate(
        &self,
        offer: SessionDescription,
        generation: u64,
    ) -> Result<SessionDescription, go2_webrtc::TransportError> {
        let (peer, events) = self.factory.create_peer(&self.settings.ice).await?;
        let task = tokio::spawn(run_client_events(
            Arc::downgrade(&self.shared),
            events,
            generation,
        ));
        *self.client.lock() = Some(ClientLink {
            peer: Arc::clone(&peer),
            task,
        });

        let video = self.shared.video.lock().clone();
        if let Some(video) = video {
            debug!("attaching robot video to client session {}", generation);
            peer.add_video_track(video).await?;
        }
        peer.set_remote_description(offer).await?;
        peer.create_answer().await
    }

    async fn close_client(&self) -> Teardown {
        let mut teardown = Teardown::new("client session");
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        let link = self.client.lock().take();
        let channel = self.shared.client_channel.lock().take();

        if let Some(link) = link {
            info!("closing existing client session");
            link.task.abort();
            teardown.attempt("client peer connection", link.peer.close()).await;
        }
        if let Some(channel) = channel {
            teardown.attempt("client data channel", channel.close()).await;
        }
        teardown
    }

    pub fn status(&self) -> BridgeStatus {
        let robot = self.shared.robot.lock().clone();
        let channel_open = self
            .shared
            .client_channel
            .lock()
            .as_ref()
            .is_some_and(|c| c.is_open());

        BridgeStatus {
            robot_connected: robot.is_some(),
            robot_ip: robot.as_ref().map(|r| r.config().robot_ip.clone()),
            robot_state: robot.as_ref().map(|r| r.state().to_string()),
            robot_validated: robot.as_ref().is_some_and(|r| r.is_validated()),
            client_connected: self.client.lock().is_some(),
            client_channel_open: channel_open,
            video_available: self.shared.video.lock().is_some(),
            messages_to_client: self.shared.to_client.load(Ordering::Relaxed),
            messages_to_robot: self.shared.to_robot.load(Ordering::Relaxed),
            messages_dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    /// Release everything on process exit.
    pub async fn shutdown(&self) -> Teardown {
        info!("shutting down relay bridge");
        self.disconnect_robot().await
    }
}

async fn run_client_events(shared: Weak<Shared>, mut events: PeerEvents, generation: u64) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if shared.generation.load(Ordering::Acquire) != generation {
            break;
        }

        match event {
            PeerEvent::RemoteChannel(channel) => {
                info!("client opened data channel '{}'", channel.label());
                *shared.client_channel.lock() = Some(channel);
            }
            PeerEvent::ChannelOpen { label } => {
                info!("client data channel '{}' open", label);
            }
            PeerEvent::Message {
                message: ChannelMessage::Text(text),
                ..
            } => shared.forward_to_robot(text).await,
            PeerEvent::Message {
                message: ChannelMessage::Binary(frame),
                ..
            } => {
                warn!("ignoring {} byte binary frame from client", frame.len());
            }
            PeerEvent::StateChanged(state) => {
                info!("client session {} is {:?}", generation, state);
                if matches!(state, PeerState::Failed | PeerState::Closed) {
                    shared.client_channel.lock().take();
                }
            }
            PeerEvent::Track(track) => {
                debug!("ignoring media track from client");
                track.stop();
            }
        }
    }
}
