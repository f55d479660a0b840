// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Go2 WebRTC relay
//!
//! Runs next to the robot (typically on a companion computer on the robot's
//! access-point subnet), holds the single robot session and re-exports it to
//! one remote operator over a second WebRTC session.
//!
//! # Endpoints
//!
//! - `POST /go2/connect` - Open the robot session
//! - `POST /go2/disconnect` - Close both sessions
//! - `POST /webrtc/offer` - Open the operator session (SDP offer/answer)
//! - `GET /health` - Bridge status
//!
//! Errors are returned as `{"detail": ..., "exception_type": ...}`; see
//! [`error::ErrorKind`].
//!
//! # Configuration File
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 8000
//! http_timeout_secs = 10
//! validation_timeout_secs = 20
//! ice_servers = []
//! default_topics = ["rt/lf/lowstate", "rt/utlidar/robot_pose"]
//! ```

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

pub use bridge::{BridgeSettings, BridgeStatus, ConnectArgs, ConnectReply, RelayBridge};
pub use client::{LinkOptions, RelayClient, RelayLink};
pub use config::{ConfigError, RelayConfig};
pub use error::{ErrorBody, ErrorKind, RelayError};
pub use routes::build_router;
