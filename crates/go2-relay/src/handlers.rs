// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP request handlers for the control surface.

use crate::bridge::{BridgeStatus, ConnectArgs, ConnectReply, RelayBridge};
use crate::error::RelayError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use go2_webrtc::SessionDescription;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

fn input_error(rejection: JsonRejection) -> RelayError {
    RelayError::InvalidInput(rejection.body_text())
}

/// POST /go2/connect
pub async fn connect(
    State(bridge): State<Arc<RelayBridge>>,
    payload: Result<Json<ConnectArgs>, JsonRejection>,
) -> Result<Json<ConnectReply>, RelayError> {
    let Json(args) = payload.map_err(input_error)?;
    info!("connect requested for robot at {}", args.robot_ip);
    Ok(Json(bridge.connect_robot(args).await?))
}

/// POST /go2/disconnect
pub async fn disconnect(State(bridge): State<Arc<RelayBridge>>) -> Json<Value> {
    let teardown = bridge.disconnect_robot().await;
    if !teardown.is_clean() {
        warn!(
            "disconnect left {} resource(s) unclosed",
            teardown.failures().len()
        );
    }
    Json(json!({}))
}

/// POST /webrtc/offer
pub async fn offer(
    State(bridge): State<Arc<RelayBridge>>,
    payload: Result<Json<SessionDescription>, JsonRejection>,
) -> Result<Json<SessionDescription>, RelayError> {
    let Json(offer) = payload.map_err(input_error)?;
    Ok(Json(bridge.offer(offer).await?))
}

/// GET /health
pub async fn health(State(bridge): State<Arc<RelayBridge>>) -> Json<BridgeStatus> {
    Json(bridge.status())
}
