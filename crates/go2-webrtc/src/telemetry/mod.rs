// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Telemetry decoding.
//!
//! [`TelemetryDecoder`] turns one data-channel frame into at most one
//! [`RobotData`] envelope. Records are validated all-or-nothing: a single
//! non-finite scalar discards the whole record. Discards are values, not
//! errors; only broken framing (invalid JSON, truncated binary frames) is
//! returned as [`FramingError`].

pub mod lidar;
pub mod types;
pub mod validate;

pub use lidar::{PointCloud, PointCloudDecoder};
pub use types::{
    IMUData, JointData, LidarMeta, OdometryData, Quaternion, RobotData, RobotState, Vector3,
};
pub use validate::ValidationError;

use crate::error::FramingError;
use crate::message::{Envelope, Topic};
use crate::transport::ChannelMessage;
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use validate::{array_field, field, list_field, object, required};

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Record(RobotData),
    Discard(Discard),
}

impl Decoded {
    pub fn record(self) -> Option<RobotData> {
        match self {
            Self::Record(data) => Some(data),
            Self::Discard(_) => None,
        }
    }
}

/// Why a frame produced no record.
#[derive(Debug, Clone, PartialEq)]
pub enum Discard {
    /// Envelope type other than `msg` (validation, control, ...).
    NotData(String),
    UnknownTopic(String),
    Invalid { topic: String, error: ValidationError },
    /// Lidar frame without a decoded point cloud.
    LidarUndecoded,
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotData(kind) => write!(f, "not a data message (type '{}')", kind),
            Self::UnknownTopic(topic) => write!(f, "unknown topic '{}'", topic),
            Self::Invalid { topic, error } => write!(f, "invalid {} record: {}", topic, error),
            Self::LidarUndecoded => f.write_str("lidar frame without decoded point cloud"),
        }
    }
}

/// Topic-dispatching decoder.
#[derive(Clone)]
pub struct TelemetryDecoder {
    robot_id: String,
    lidar: Option<Arc<dyn PointCloudDecoder>>,
}

impl fmt::Debug for TelemetryDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryDecoder")
            .field("robot_id", &self.robot_id)
            .field("lidar", &self.lidar.is_some())
            .finish()
    }
}

impl TelemetryDecoder {
    pub fn new(robot_id: impl Into<String>) -> Self {
        Self {
            robot_id: robot_id.into(),
            lidar: None,
        }
    }

    /// Decode lidar frames with `decoder`. Without one, lidar frames are discarded.
    pub fn with_lidar_decoder(mut self, decoder: Arc<dyn PointCloudDecoder>) -> Self {
        self.lidar = Some(decoder);
        self
    }

    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    /// Decode one frame; the record keeps `message` as its raw message.
    pub fn decode(&self, message: &ChannelMessage) -> Result<Decoded, FramingError> {
        let decoded = match message {
            ChannelMessage::Text(text) => self.decode_text(text)?,
            ChannelMessage::Binary(frame) => self.decode_binary(frame)?,
        };
        Ok(match decoded {
            Decoded::Record(mut data) => {
                data.raw_message = Some(message.clone());
                Decoded::Record(data)
            }
            Decoded::Discard(reason) => {
                log_discard(&reason);
                Decoded::Discard(reason)
            }
        })
    }

    pub fn decode_text(&self, text: &str) -> Result<Decoded, FramingError> {
        Ok(self.decode_envelope(Envelope::parse(text)?, None))
    }

    pub fn decode_binary(&self, frame: &Bytes) -> Result<Decoded, FramingError> {
        let (header, compressed) = lidar::split_frame(frame)?;
        Ok(self.decode_envelope(Envelope::from_value(header)?, Some(compressed)))
    }

    /// Decode an already parsed envelope. `compressed` is the binary payload
    /// that accompanied it, if any.
    pub fn decode_envelope(&self, envelope: Envelope, compressed: Option<Bytes>) -> Decoded {
        let (topic, payload) = match envelope {
            Envelope::Data { topic, payload } => (topic, payload),
            Envelope::Validation(_) => {
                return Decoded::Discard(Discard::NotData(crate::message::kind::VALIDATION.into()))
            }
            Envelope::Other { kind, .. } => return Decoded::Discard(Discard::NotData(kind)),
        };

        let mut data = RobotData::new(&self.robot_id);
        let outcome = match &topic {
            Topic::Odometry => parse_odometry(&payload).map(|o| data.odometry = Some(o)),
            Topic::SportModeState => parse_sport_mode_state(&payload).map(|(state, imu)| {
                data.robot_state = Some(state);
                data.imu = Some(imu);
            }),
            Topic::LowState => parse_low_state(&payload).map(|j| data.joint = Some(j)),
            Topic::LidarArray => match self.lidar_meta(&payload, compressed.unwrap_or_default()) {
                Some(meta) => {
                    data.lidar = Some(meta);
                    Ok(())
                }
                None => return Decoded::Discard(Discard::LidarUndecoded),
            },
            Topic::Unknown(name) => return Decoded::Discard(Discard::UnknownTopic(name.clone())),
        };

        match outcome {
            Ok(()) => Decoded::Record(data),
            Err(error) => Decoded::Discard(Discard::Invalid {
                topic: topic.to_string(),
                error,
            }),
        }
    }

    fn lidar_meta(&self, payload: &Value, compressed: Bytes) -> Option<LidarMeta> {
        let decoder = self.lidar.as_ref()?;
        let cloud = decoder.decode(&compressed, payload)?;

        let number = |key: &str| payload.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        let origin = payload
            .get("origin")
            .and_then(|v| validate::finite_array::<3>(v, "origin").ok())
            .unwrap_or([0.0; 3]);

        Some(LidarMeta {
            resolution: number("resolution"),
            origin,
            stamp: number("stamp"),
            width: payload.get("width").cloned().unwrap_or(Value::Null),
            src_size: payload.get("src_size").and_then(Value::as_u64),
            cloud: Arc::new(cloud),
            compressed,
        })
    }
}

fn log_discard(reason: &Discard) {
    match reason {
        Discard::Invalid { .. } | Discard::LidarUndecoded => warn!("discarding frame: {}", reason),
        Discard::NotData(_) | Discard::UnknownTopic(_) => debug!("ignoring frame: {}", reason),
    }
}

fn parse_odometry(payload: &Value) -> Result<OdometryData, ValidationError> {
    let pose = object(required(object(payload, "data")?, "pose")?, "pose")?;
    let position = object(required(pose, "position")?, "position")?;
    let orientation = object(required(pose, "orientation")?, "orientation")?;

    Ok(OdometryData {
        position: Vector3 {
            x: field(position, "x")?,
            y: field(position, "y")?,
            z: field(position, "z")?,
        },
        orientation: Quaternion {
            x: field(orientation, "x")?,
            y: field(orientation, "y")?,
            z: field(orientation, "z")?,
            w: field(orientation, "w")?,
        },
    })
}

fn parse_sport_mode_state(payload: &Value) -> Result<(RobotState, IMUData), ValidationError> {
    let data = object(payload, "data")?;
    let state = RobotState {
        mode: required(data, "mode")?.clone(),
        progress: required(data, "progress")?.clone(),
        gait_type: required(data, "gait_type")?.clone(),
        position: array_field(data, "position")?,
        body_height: field(data, "body_height")?,
        velocity: list_field(data, "velocity")?,
        range_obstacle: list_field(data, "range_obstacle")?,
        foot_force: list_field(data, "foot_force")?,
        foot_position_body: list_field(data, "foot_position_body")?,
        foot_speed_body: list_field(data, "foot_speed_body")?,
    };

    let imu = object(required(data, "imu_state")?, "imu_state")?;
    let imu = IMUData {
        quaternion: array_field(imu, "quaternion")?,
        accelerometer: array_field(imu, "accelerometer")?,
        gyroscope: array_field(imu, "gyroscope")?,
        rpy: array_field(imu, "rpy")?,
        temperature: field(imu, "temperature")?,
    };

    Ok((state, imu))
}

fn parse_low_state(payload: &Value) -> Result<JointData, ValidationError> {
    let data = object(payload, "data")?;
    let motor_state = required(data, "motor_state")?
        .as_array()
        .ok_or_else(|| ValidationError::new("motor_state", "expected an array"))?;
    Ok(JointData {
        motor_state: motor_state.clone(),
    })
}
