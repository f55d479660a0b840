// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # go2-webrtc
//!
//! Client side of the Unitree Go2 local-network WebRTC protocol.
//!
//! - [`signaling`]: encrypted offer/answer exchange over HTTP
//! - [`session`]: one robot session, validation and message dispatch
//! - [`telemetry`]: decoding and validation of inbound telemetry
//! - [`commands`]: sport-mode request builders
//! - [`transport`]: peer connection backends
//!
//! ## Quick start
//!
//! ```no_run
//! use go2_webrtc::{
//!     HttpSignaling, NoopObserver, RobotSession, RtcPeerFactory, SessionConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new("192.168.12.1");
//! let signaling = HttpSignaling::new(config.http_timeout)?;
//! let session = RobotSession::new(
//!     config,
//!     Arc::new(RtcPeerFactory::new()),
//!     Arc::new(signaling),
//!     Arc::new(NoopObserver),
//! );
//! session.connect().await?;
//! session.subscribe(go2_webrtc::topics::LOW_STATE).await?;
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod crypto;
pub mod error;
pub mod message;
pub mod session;
pub mod signaling;
pub mod teardown;
pub mod telemetry;
pub mod topics;
pub mod transport;

pub use config::SessionConfig;
pub use error::{ConnectionError, FramingError, HandshakeError, SessionError};
pub use message::{Envelope, Outbound, Topic};
pub use session::{NoopObserver, RobotSession, SessionObserver, SessionState, DATA_CHANNEL_LABEL};
pub use signaling::{HttpSignaling, Signaling, SignalingTarget, SIGNALING_PORT};
pub use teardown::{CloseFailure, Teardown};
pub use telemetry::{
    Decoded, Discard, PointCloud, PointCloudDecoder, RobotData, TelemetryDecoder,
};
pub use transport::{
    ChannelMessage, DataChannel, IceConfig, PeerConnection, PeerEvent, PeerFactory, PeerState,
    RtcPeerFactory, SdpKind, SessionDescription, TransportError, VideoRelay,
};
