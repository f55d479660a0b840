// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Robot session configuration.

use crate::signaling::{SignalingTarget, SIGNALING_PORT};
use crate::telemetry::PointCloudDecoder;
use crate::transport::IceConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout of each signaling HTTP request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time the robot has to acknowledge validation.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration of one robot session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Robot address on the local network.
    pub robot_ip: String,
    /// Identifier stamped on every decoded record.
    pub robot_id: String,
    /// Access token (empty on the local network).
    pub token: String,
    pub signaling_port: u16,
    pub http_timeout: Duration,
    /// `None` waits forever for the robot's validation answer.
    pub validation_timeout: Option<Duration>,
    /// Decode telemetry (`true`) or hand raw frames to the observer.
    pub decode_messages: bool,
    /// Decode lidar frames when a point-cloud decoder is set.
    pub decode_lidar: bool,
    pub point_cloud_decoder: Option<Arc<dyn PointCloudDecoder>>,
    pub ice: IceConfig,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("robot_ip", &self.robot_ip)
            .field("robot_id", &self.robot_id)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("signaling_port", &self.signaling_port)
            .field("http_timeout", &self.http_timeout)
            .field("validation_timeout", &self.validation_timeout)
            .field("decode_messages", &self.decode_messages)
            .field("decode_lidar", &self.decode_lidar)
            .field("point_cloud_decoder", &self.point_cloud_decoder.is_some())
            .field("ice", &self.ice)
            .finish()
    }
}

impl SessionConfig {
    pub fn new(robot_ip: impl Into<String>) -> Self {
        Self {
            robot_ip: robot_ip.into(),
            robot_id: "0".to_string(),
            token: String::new(),
            signaling_port: SIGNALING_PORT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            validation_timeout: Some(DEFAULT_VALIDATION_TIMEOUT),
            decode_messages: true,
            decode_lidar: true,
            point_cloud_decoder: None,
            ice: IceConfig::default(),
        }
    }

    pub fn robot_id(mut self, id: impl Into<String>) -> Self {
        self.robot_id = id.into();
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn signaling_port(mut self, port: u16) -> Self {
        self.signaling_port = port;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn validation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn decode_messages(mut self, decode: bool) -> Self {
        self.decode_messages = decode;
        self
    }

    pub fn decode_lidar(mut self, decode: bool) -> Self {
        self.decode_lidar = decode;
        self
    }

    pub fn point_cloud_decoder(mut self, decoder: Arc<dyn PointCloudDecoder>) -> Self {
        self.point_cloud_decoder = Some(decoder);
        self
    }

    pub fn ice_servers(mut self, servers: Vec<String>) -> Self {
        self.ice.servers = servers;
        self
    }

    pub fn target(&self) -> SignalingTarget {
        SignalingTarget {
            robot_ip: self.robot_ip.clone(),
            port: self.signaling_port,
            token: self.token.clone(),
        }
    }
}
