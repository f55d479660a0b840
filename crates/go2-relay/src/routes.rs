// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route definitions.

use crate::bridge::RelayBridge;
use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Control surface routes.
pub fn api_routes() -> Router<Arc<RelayBridge>> {
    Router::new()
        .route("/go2/connect", post(handlers::connect))
        .route("/go2/disconnect", post(handlers::disconnect))
        .route("/webrtc/offer", post(handlers::offer))
        .route("/health", get(handlers::health))
}

/// Full application router with CORS and request tracing.
pub fn build_router(bridge: Arc<RelayBridge>) -> Router {
    api_routes()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(bridge)
}
