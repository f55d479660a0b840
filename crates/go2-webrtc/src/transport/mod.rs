// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Real-time transport abstraction.
//!
//! Sessions talk to peers through [`PeerConnection`] and [`DataChannel`]
//! and receive everything the peer reports (state changes, channel traffic,
//! remote tracks) as [`PeerEvent`]s on a per-peer queue. Draining that queue
//! on a single task gives strict per-channel arrival order.
//!
//! Two backends are provided:
//!
//! - [`rtc`]: ICE/DTLS/SCTP via the `webrtc` crate (production)
//! - [`intra`]: in-process peers that record traffic (tests, dry runs)

pub mod intra;
pub mod rtc;
pub mod video;

pub use intra::{IntraChannel, IntraPeer, IntraPeerFactory};
pub use rtc::RtcPeerFactory;
pub use video::{VideoCodec, VideoRelay};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport-level failures.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("data channel '{0}' is not open")]
    ChannelNotOpen(String),

    #[error("peer connection closed")]
    Closed,

    #[error("transport backend error: {0}")]
    Backend(String),
}

/// SDP type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl SdpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Pranswer => "pranswer",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session description as exchanged over signaling (`{sdp, type}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: SdpKind,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: SdpKind::Offer,
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: SdpKind::Answer,
        }
    }
}

/// A data-channel frame. Text carries JSON, binary carries lidar frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Text(String),
    Binary(Bytes),
}

impl ChannelMessage {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

/// Aggregate peer connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Everything a peer reports back to its owner.
pub enum PeerEvent {
    /// Connection state transition.
    StateChanged(PeerState),
    /// A channel (local or remote) reached the open state.
    ChannelOpen { label: String },
    /// Inbound frame on the channel with `label`.
    Message {
        label: String,
        message: ChannelMessage,
    },
    /// The remote side opened a data channel.
    RemoteChannel(Arc<dyn DataChannel>),
    /// The remote side started sending video.
    Track(Arc<VideoRelay>),
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateChanged(state) => write!(f, "StateChanged({:?})", state),
            Self::ChannelOpen { label } => write!(f, "ChannelOpen({})", label),
            Self::Message { label, message } => {
                write!(f, "Message({}, {} bytes)", label, message.len())
            }
            Self::RemoteChannel(channel) => write!(f, "RemoteChannel({})", channel.label()),
            Self::Track(track) => write!(f, "Track({})", track.codec().mime_type),
        }
    }
}

/// Receiving end of a peer's event queue.
pub type PeerEvents = mpsc::UnboundedReceiver<PeerEvent>;

/// ICE configuration for new peers.
#[derive(Debug, Clone, Default)]
pub struct IceConfig {
    /// STUN/TURN URLs. Empty for LAN-only sessions.
    pub servers: Vec<String>,
}

/// Bidirectional message stream inside a peer connection.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;

    fn is_open(&self) -> bool;

    async fn send(&self, message: ChannelMessage) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// One real-time transport session.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Create a locally-initiated data channel.
    async fn create_data_channel(&self, label: &str)
        -> Result<Arc<dyn DataChannel>, TransportError>;

    /// Request a receive-only video transceiver.
    async fn add_video_receiver(&self) -> Result<(), TransportError>;

    /// Send the packets of `relay` to the remote side.
    async fn add_video_track(&self, relay: Arc<VideoRelay>) -> Result<(), TransportError>;

    /// Create an offer, apply it locally and wait for ICE gathering.
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    /// Create an answer, apply it locally and wait for ICE gathering.
    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    fn state(&self) -> PeerState;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Creates peers together with their event queue.
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create_peer(
        &self,
        ice: &IceConfig,
    ) -> Result<(Arc<dyn PeerConnection>, PeerEvents), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_description_wire_shape() {
        let desc = SessionDescription::answer("v=0");
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json, serde_json::json!({"sdp": "v=0", "type": "answer"}));

        let parsed: SessionDescription =
            serde_json::from_str(r#"{"sdp": "v=0", "type": "offer"}"#).unwrap();
        assert_eq!(parsed, SessionDescription::offer("v=0"));
    }

    #[test]
    fn test_channel_message_len() {
        assert_eq!(ChannelMessage::Text("abc".into()).len(), 3);
        assert!(ChannelMessage::Binary(Bytes::new()).is_empty());
        assert_eq!(ChannelMessage::Text("x".into()).as_text(), Some("x"));
    }
}
