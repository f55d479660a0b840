// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data-channel wire messages.
//!
//! Inbound text frames are `{"type", "topic", "data"}` objects. Only the
//! `type` tag is inspected eagerly; payloads stay as [`serde_json::Value`]
//! until a decoder for their topic picks them up.

use crate::error::FramingError;
use crate::topics;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Message type tags.
pub mod kind {
    pub const MSG: &str = "msg";
    pub const VALIDATION: &str = "validation";
    pub const VID: &str = "vid";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const RTC_INNER_REQ: &str = "rtc_inner_req";
}

/// Known telemetry topics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Odometry,
    SportModeState,
    LowState,
    LidarArray,
    Unknown(String),
}

impl Topic {
    pub fn from_wire(topic: &str) -> Self {
        match topic {
            topics::ROBOTODOM => Self::Odometry,
            topics::LF_SPORT_MOD_STATE => Self::SportModeState,
            topics::LOW_STATE => Self::LowState,
            topics::ULIDAR_ARRAY => Self::LidarArray,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Odometry => topics::ROBOTODOM,
            Self::SportModeState => topics::LF_SPORT_MOD_STATE,
            Self::LowState => topics::LOW_STATE,
            Self::LidarArray => topics::ULIDAR_ARRAY,
            Self::Unknown(topic) => topic,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Validation challenge, or the success marker.
    Validation(String),
    /// Telemetry on `topic`.
    Data { topic: Topic, payload: Value },
    /// Anything else, kept whole.
    Other { kind: String, raw: Value },
}

impl Envelope {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, FramingError> {
        Self::from_value(parse_lenient(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, FramingError> {
        let obj = value.as_object().ok_or(FramingError::NotObject)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match kind.as_str() {
            kind::VALIDATION => {
                if let Some(challenge) = obj.get("data").and_then(Value::as_str) {
                    return Ok(Self::Validation(challenge.to_string()));
                }
            }
            kind::MSG => {
                if let Some(topic) = obj.get("topic").and_then(Value::as_str) {
                    return Ok(Self::Data {
                        topic: Topic::from_wire(topic),
                        payload: obj.get("data").cloned().unwrap_or(Value::Null),
                    });
                }
            }
            _ => {}
        }

        Ok(Self::Other { kind, raw: value })
    }
}

/// Parse JSON text, tolerating bare `NaN` / `Infinity` / `-Infinity`.
///
/// Such tokens are turned into `null` so the frame still parses and the
/// affected field fails numeric validation downstream.
pub fn parse_lenient(text: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(e) => match replace_non_finite(text) {
            Some(cleaned) => serde_json::from_str(&cleaned),
            None => Err(e),
        },
    }
}

/// Replace non-finite number tokens outside string literals with `null`.
/// Returns `None` when there is nothing to replace.
fn replace_non_finite(text: &str) -> Option<String> {
    const TOKENS: [&[u8]; 3] = [b"-Infinity", b"Infinity", b"NaN"];

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut replaced = false;
    let mut i = 0;

    'scan: while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else {
            for token in TOKENS {
                if bytes[i..].starts_with(token) {
                    out.extend_from_slice(b"null");
                    i += token.len();
                    replaced = true;
                    continue 'scan;
                }
            }
        }
        out.push(b);
        i += 1;
    }

    if !replaced {
        return None;
    }
    String::from_utf8(out).ok()
}

/// Outbound `{type, topic, data}` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    #[serde(rename = "type")]
    pub kind: String,
    pub topic: String,
    pub data: Value,
}

impl Outbound {
    pub fn new(kind: &str, topic: &str, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            topic: topic.to_string(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Answer to a validation challenge.
pub fn validation_reply(response: &str) -> Outbound {
    Outbound::new(kind::VALIDATION, "", Value::String(response.to_string()))
}

/// Video enable message (`{"type":"vid","topic":"","data":"on"}`).
pub fn video_on() -> Outbound {
    Outbound::new(kind::VID, "", Value::String("on".to_string()))
}

pub fn subscribe(topic: &str) -> String {
    json!({ "type": kind::SUBSCRIBE, "topic": topic }).to_string()
}

pub fn unsubscribe(topic: &str) -> String {
    json!({ "type": kind::UNSUBSCRIBE, "topic": topic }).to_string()
}

/// Toggle the robot's traffic saving mode off (`on = true`) or back on.
pub fn disable_traffic_saving(on: bool) -> Outbound {
    Outbound::new(
        kind::RTC_INNER_REQ,
        "",
        json!({
            "req_type": "disable_traffic_saving",
            "instruction": if on { "on" } else { "off" },
        }),
    )
}
