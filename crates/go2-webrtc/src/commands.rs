// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sport API request builders.

use crate::message::kind;
use crate::topics;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sport API identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SportCmd {
    Damp = 1001,
    BalanceStand = 1002,
    StopMove = 1003,
    StandUp = 1004,
    StandDown = 1005,
    RecoveryStand = 1006,
    Euler = 1007,
    Move = 1008,
    Sit = 1009,
    RiseSit = 1010,
    Hello = 1016,
    Stretch = 1017,
}

impl SportCmd {
    pub fn api_id(self) -> u32 {
        self as u32
    }
}

/// Obstacle-avoidance API: toggle on/off.
pub const OBSTACLE_AVOID_SWITCH: u32 = 1001;
/// Obstacle-avoidance API: velocity move.
pub const OBSTACLE_AVOID_MOVE: u32 = 1003;

static REQUEST_ID: OnceLock<AtomicU64> = OnceLock::new();

/// Request identity, unique within the process.
fn next_request_id() -> u64 {
    REQUEST_ID
        .get_or_init(|| {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64 % 2_147_483_648)
                .unwrap_or(0);
            AtomicU64::new(seed)
        })
        .fetch_add(1, Ordering::Relaxed)
}

/// Build an API request on `topic`.
///
/// `parameter` is JSON-encoded into a string; without one the api id itself
/// (as a string) is sent.
pub fn command(api_id: u32, parameter: Option<&Value>, topic: &str) -> Value {
    let parameter = match parameter {
        Some(p) => p.to_string(),
        None => api_id.to_string(),
    };
    json!({
        "type": kind::MSG,
        "topic": topic,
        "data": {
            "header": { "identity": { "id": next_request_id(), "api_id": api_id } },
            "parameter": parameter,
        },
    })
}

/// Sport-mode request without parameters.
pub fn sport(cmd: SportCmd) -> Value {
    command(cmd.api_id(), None, topics::SPORT_MOD)
}

/// Body orientation request (radians).
pub fn euler(roll: f64, pitch: f64, yaw: f64) -> Value {
    command(
        SportCmd::Euler.api_id(),
        Some(&json!({ "x": roll, "y": pitch, "z": yaw })),
        topics::SPORT_MOD,
    )
}

/// Velocity request. Must be repeated to keep moving.
pub fn move_command(x: f64, y: f64, yaw: f64, obstacle_avoidance: bool) -> Value {
    if obstacle_avoidance {
        command(
            OBSTACLE_AVOID_MOVE,
            Some(&json!({ "x": x, "y": y, "yaw": yaw, "mode": 0 })),
            topics::OBSTACLE_AVOID,
        )
    } else {
        command(
            SportCmd::Move.api_id(),
            Some(&json!({ "x": x, "y": y, "z": yaw })),
            topics::SPORT_MOD,
        )
    }
}

pub fn obstacle_avoidance(enabled: bool) -> Value {
    command(
        OBSTACLE_AVOID_SWITCH,
        Some(&json!({ "enabled": enabled })),
        topics::OBSTACLE_AVOID,
    )
}
