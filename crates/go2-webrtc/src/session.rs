// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Robot session.
//!
//! A [`RobotSession`] owns one transport session to the robot: it runs the
//! encrypted handshake, answers the validation challenge, and hands every
//! inbound frame to a [`SessionObserver`], either decoded or untouched.
//!
//! ```text
//! Created -> Handshaking -> Connected -> Validated -> Closed
//!     \            \            \            \
//!      +------------+------------+------------+--> Failed
//! ```
//!
//! Peer events are drained by a single task per session, so frames are
//! handled strictly in arrival order, one at a time.

use crate::config::SessionConfig;
use crate::crypto::{validation_response, VALIDATION_OK};
use crate::error::{ConnectionError, FramingError, SessionError};
use crate::message::{self, kind, Envelope, Outbound};
use crate::signaling::Signaling;
use crate::teardown::Teardown;
use crate::telemetry::{Decoded, RobotData, TelemetryDecoder};
use crate::transport::{
    ChannelMessage, DataChannel, PeerConnection, PeerEvent, PeerEvents, PeerFactory, PeerState,
    TransportError, VideoRelay,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Label of the control data channel.
pub const DATA_CHANNEL_LABEL: &str = "data";

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Handshaking,
    /// Transport up, validation pending.
    Connected,
    Validated,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Handshaking => "handshaking",
            Self::Connected => "connected",
            Self::Validated => "validated",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Receives everything a session produces.
///
/// All methods have empty defaults. They run on the session's event task;
/// a slow observer delays the next frame.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Request a receive-only video transceiver during setup.
    fn wants_video(&self) -> bool {
        false
    }

    /// The control channel opened.
    async fn on_open(&self, _robot_id: &str) {}

    /// The robot accepted the session. Called at most once, with a handle
    /// that can be used to subscribe or publish right away.
    async fn on_validated(&self, _session: &RobotSession) {}

    /// One inbound frame, decoded or raw depending on configuration.
    async fn on_message(&self, _data: RobotData) {}

    async fn on_video_track(&self, _robot_id: &str, _track: Arc<VideoRelay>) {}

    /// A frame had broken framing.
    async fn on_decode_error(&self, _robot_id: &str, _error: &FramingError) {}

    /// The session reached `Failed` after having been started.
    async fn on_failed(&self, _robot_id: &str, _reason: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Handle to one robot session. Cheap to clone.
#[derive(Clone)]
pub struct RobotSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    factory: Arc<dyn PeerFactory>,
    signaling: Arc<dyn Signaling>,
    observer: Arc<dyn SessionObserver>,
    decoder: TelemetryDecoder,
    state: Mutex<SessionState>,
    validated: AtomicBool,
    peer: Mutex<Option<Arc<dyn PeerConnection>>>,
    channel: Mutex<Option<Arc<dyn DataChannel>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for RobotSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotSession")
            .field("robot_id", &self.inner.config.robot_id)
            .field("robot_ip", &self.inner.config.robot_ip)
            .field("state", &self.state())
            .finish()
    }
}

impl RobotSession {
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn PeerFactory>,
        signaling: Arc<dyn Signaling>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let mut decoder = TelemetryDecoder::new(config.robot_id.clone());
        if config.decode_lidar {
            if let Some(lidar) = &config.point_cloud_decoder {
                decoder = decoder.with_lidar_decoder(Arc::clone(lidar));
            }
        }

        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                signaling,
                observer,
                decoder,
                state: Mutex::new(SessionState::Created),
                validated: AtomicBool::new(false),
                peer: Mutex::new(None),
                channel: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub fn is_validated(&self) -> bool {
        self.inner.validated.load(Ordering::Acquire)
    }

    pub fn robot_id(&self) -> &str {
        &self.inner.config.robot_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Run the handshake and apply the robot's answer.
    ///
    /// Only valid on a fresh session. On failure every resource created so
    /// far is released and the session ends in `Failed`.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        {
            let mut state = self.inner.state.lock();
            if *state != SessionState::Created {
                return Err(ConnectionError::InvalidState(*state));
            }
            *state = SessionState::Handshaking;
        }
        info!(
            "connecting to robot {} at {}",
            self.inner.config.robot_id, self.inner.config.robot_ip
        );

        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("connection to robot {} failed: {}", self.inner.config.robot_id, e);
                self.inner.set_state(SessionState::Failed);
                self.release().await;
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<(), ConnectionError> {
        let inner = &self.inner;
        let (peer, events) = inner.factory.create_peer(&inner.config.ice).await?;
        *inner.peer.lock() = Some(Arc::clone(&peer));

        let channel = peer.create_data_channel(DATA_CHANNEL_LABEL).await?;
        *inner.channel.lock() = Some(channel);

        if inner.observer.wants_video() {
            peer.add_video_receiver().await?;
        }

        let task = tokio::spawn(run_events(Arc::downgrade(inner), events));
        inner.tasks.lock().push(task);

        let offer = peer.create_offer().await?;
        let answer = inner
            .signaling
            .exchange(&inner.config.target(), &offer)
            .await?;
        if inner.state().is_terminal() {
            return Err(ConnectionError::InvalidState(inner.state()));
        }
        peer.set_remote_description(answer).await?;
        info!("robot {} answered, waiting for transport", inner.config.robot_id);
        Ok(())
    }

    /// Send `{type, topic, data}` on the control channel.
    ///
    /// Does not wait for validation.
    pub async fn publish(&self, topic: &str, data: Value, kind: &str) -> Result<(), SessionError> {
        self.inner.send(&Outbound::new(kind, topic, data)).await
    }

    /// Send a pre-serialized message verbatim.
    pub async fn publish_raw(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.inner.send_text(text.into()).await
    }

    pub async fn disable_traffic_saving(&self, on: bool) -> Result<(), SessionError> {
        self.inner.send(&message::disable_traffic_saving(on)).await
    }

    pub async fn subscribe(&self, topic: &str) -> Result<(), SessionError> {
        self.inner.send_text(message::subscribe(topic)).await
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), SessionError> {
        self.inner.send_text(message::unsubscribe(topic)).await
    }

    /// Ask the robot to (re)start video; also forces a fresh key frame.
    pub async fn enable_video(&self) -> Result<(), SessionError> {
        self.inner.send(&message::video_on()).await
    }

    /// Close the transport, channel and signaling client.
    ///
    /// Safe from any state and idempotent. Close failures are logged and
    /// reported in the returned record, never raised.
    pub async fn disconnect(&self) -> Teardown {
        {
            let mut state = self.inner.state.lock();
            if *state != SessionState::Failed {
                *state = SessionState::Closed;
            }
        }
        let teardown = self.release().await;
        info!("disconnected from robot {}", self.inner.config.robot_id);
        teardown
    }

    async fn release(&self) -> Teardown {
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        let peer = self.inner.peer.lock().take();
        let channel = self.inner.channel.lock().take();

        let mut teardown = Teardown::new(format!("robot {}", self.inner.config.robot_id));
        if let Some(peer) = peer {
            teardown.attempt("peer connection", peer.close()).await;
        }
        if let Some(channel) = channel {
            teardown.attempt("data channel", channel.close()).await;
        }
        teardown
            .attempt("signaling client", self.inner.signaling.close())
            .await;
        teardown
    }
}

impl Inner {
    fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!("robot {} session: {} -> {}", self.config.robot_id, *state, next);
            *state = next;
        }
    }

    /// Move to `next` only from one of `from`.
    fn advance(&self, from: &[SessionState], next: SessionState) -> bool {
        let mut state = self.state.lock();
        if from.contains(&*state) {
            debug!("robot {} session: {} -> {}", self.config.robot_id, *state, next);
            *state = next;
            true
        } else {
            false
        }
    }

    async fn send(&self, message: &Outbound) -> Result<(), SessionError> {
        self.send_text(message.to_json()?).await
    }

    async fn send_text(&self, text: String) -> Result<(), SessionError> {
        let state = self.state();
        if state.is_terminal() {
            return Err(SessionError::InvalidState(state));
        }
        let channel = self
            .channel
            .lock()
            .clone()
            .ok_or(SessionError::ChannelNotOpen)?;
        debug!("-> robot {}: {}", self.config.robot_id, text);
        match channel.send(ChannelMessage::Text(text)).await {
            Ok(()) => Ok(()),
            Err(TransportError::ChannelNotOpen(_)) => Err(SessionError::ChannelNotOpen),
            Err(e) => Err(e.into()),
        }
    }

    async fn fail(&self, reason: &str) {
        if self.advance(
            &[
                SessionState::Handshaking,
                SessionState::Connected,
                SessionState::Validated,
            ],
            SessionState::Failed,
        ) {
            error!("robot {} session failed: {}", self.config.robot_id, reason);
            self.observer.on_failed(&self.config.robot_id, reason).await;
        }
    }

    fn transport_connected(self: &Arc<Self>) {
        if !self.advance(&[SessionState::Handshaking], SessionState::Connected) {
            return;
        }
        info!("transport to robot {} is up", self.config.robot_id);

        if let Some(timeout) = self.config.validation_timeout {
            let weak = Arc::downgrade(self);
            let task = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(inner) = weak.upgrade() {
                    if !inner.validated.load(Ordering::Acquire) {
                        inner
                            .fail(&format!("robot did not validate within {:?}", timeout))
                            .await;
                    }
                }
            });
            self.tasks.lock().push(task);
        }
    }

    fn handle(self: &Arc<Self>) -> RobotSession {
        RobotSession {
            inner: Arc::clone(self),
        }
    }

    async fn handle_event(self: &Arc<Self>, event: PeerEvent) {
        match event {
            PeerEvent::StateChanged(PeerState::Connected) => self.transport_connected(),
            PeerEvent::StateChanged(PeerState::Failed) => {
                self.fail("peer connection failed").await
            }
            PeerEvent::StateChanged(PeerState::Closed) => {
                self.fail("peer connection closed").await
            }
            PeerEvent::StateChanged(PeerState::Disconnected) => {
                warn!("robot {} transport disconnected", self.config.robot_id)
            }
            PeerEvent::StateChanged(_) => {}
            PeerEvent::ChannelOpen { label } => {
                debug!("robot {} channel '{}' open", self.config.robot_id, label);
                if label == DATA_CHANNEL_LABEL {
                    self.transport_connected();
                    self.observer.on_open(&self.config.robot_id).await;
                }
            }
            PeerEvent::Message { message, .. } => self.handle_message(message).await,
            PeerEvent::RemoteChannel(channel) => {
                debug!(
                    "ignoring robot-initiated channel '{}'",
                    channel.label()
                );
            }
            PeerEvent::Track(track) => {
                if self.observer.wants_video() {
                    self.observer
                        .on_video_track(&self.config.robot_id, track)
                        .await;
                } else {
                    debug!("discarding unrequested video track from robot {}", self.config.robot_id);
                    track.stop();
                }
            }
        }
    }

    async fn handle_message(self: &Arc<Self>, message: ChannelMessage) {
        if !self.validated.load(Ordering::Acquire) {
            if let ChannelMessage::Text(text) = &message {
                match Envelope::parse(text) {
                    Ok(Envelope::Validation(challenge)) => {
                        self.handle_validation(&challenge).await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("robot {} sent a malformed frame: {}", self.config.robot_id, e);
                        self.observer
                            .on_decode_error(&self.config.robot_id, &e)
                            .await;
                        return;
                    }
                }
            }
        }

        if !self.config.decode_messages {
            self.observer
                .on_message(RobotData::raw(&self.config.robot_id, message))
                .await;
            return;
        }

        match self.decoder.decode(&message) {
            Ok(Decoded::Record(data)) => self.observer.on_message(data).await,
            Ok(Decoded::Discard(_)) => {}
            Err(e) => {
                warn!("robot {} sent a malformed frame: {}", self.config.robot_id, e);
                self.observer
                    .on_decode_error(&self.config.robot_id, &e)
                    .await;
            }
        }
    }

    async fn handle_validation(self: &Arc<Self>, challenge: &str) {
        if challenge == VALIDATION_OK {
            info!("robot {} validated, enabling video", self.config.robot_id);
            if let Err(e) = self.send(&message::video_on()).await {
                warn!("failed to enable video on robot {}: {}", self.config.robot_id, e);
            }
            if !self.validated.swap(true, Ordering::AcqRel) {
                self.advance(
                    &[SessionState::Handshaking, SessionState::Connected],
                    SessionState::Validated,
                );
                self.observer.on_validated(&self.handle()).await;
            }
        } else {
            debug!("answering validation challenge from robot {}", self.config.robot_id);
            let reply = message::validation_reply(&validation_response(challenge));
            if let Err(e) = self.send(&reply).await {
                warn!(
                    "failed to answer {} challenge of robot {}: {}",
                    kind::VALIDATION,
                    self.config.robot_id,
                    e
                );
            }
        }
    }
}

async fn run_events(inner: Weak<Inner>, mut events: PeerEvents) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_event(event).await;
    }
}
