// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Telemetry records.

use super::lidar::PointCloud;
use crate::transport::ChannelMessage;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Orientation as reported; not renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Robot pose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OdometryData {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// Sport-mode state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotState {
    pub mode: Value,
    pub progress: Value,
    pub gait_type: Value,
    pub position: [f64; 3],
    pub body_height: f64,
    pub velocity: Vec<f64>,
    pub range_obstacle: Vec<f64>,
    pub foot_force: Vec<f64>,
    pub foot_position_body: Vec<f64>,
    pub foot_speed_body: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IMUData {
    pub quaternion: [f64; 4],
    pub accelerometer: [f64; 3],
    pub gyroscope: [f64; 3],
    pub rpy: [f64; 3],
    pub temperature: f64,
}

/// Per-motor state groups, passed through unvalidated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointData {
    pub motor_state: Vec<Value>,
}

/// Voxel map metadata plus the externally decoded cloud.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LidarMeta {
    pub resolution: f64,
    pub origin: [f64; 3],
    pub stamp: f64,
    pub width: Value,
    pub src_size: Option<u64>,
    #[serde(skip)]
    pub cloud: Arc<PointCloud>,
    #[serde(skip)]
    pub compressed: Bytes,
}

/// One decoded wire message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RobotData {
    pub robot_id: String,
    /// Seconds since the Unix epoch at decode time.
    pub timestamp: f64,
    pub lidar: Option<LidarMeta>,
    pub odometry: Option<OdometryData>,
    pub robot_state: Option<RobotState>,
    pub imu: Option<IMUData>,
    pub joint: Option<JointData>,
    pub raw_message: Option<ChannelMessage>,
}

impl RobotData {
    pub fn new(robot_id: &str) -> Self {
        Self {
            robot_id: robot_id.to_string(),
            timestamp: now_secs(),
            ..Default::default()
        }
    }

    /// Envelope carrying only the undecoded frame.
    pub fn raw(robot_id: &str, message: ChannelMessage) -> Self {
        Self {
            raw_message: Some(message),
            ..Self::new(robot_id)
        }
    }

    /// True when no telemetry payload is populated.
    pub fn is_empty(&self) -> bool {
        self.lidar.is_none()
            && self.odometry.is_none()
            && self.robot_state.is_none()
            && self.imu.is_none()
            && self.joint.is_none()
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
