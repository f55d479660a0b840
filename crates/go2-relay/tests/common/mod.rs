// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures for relay tests.

#![allow(dead_code)]

use async_trait::async_trait;
use go2_relay::{BridgeSettings, RelayBridge};
use go2_webrtc::transport::IntraPeerFactory;
use go2_webrtc::{HandshakeError, SessionDescription, Signaling, SignalingTarget};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers every offer locally, or fails on demand.
#[derive(Default)]
pub struct FakeSignaling {
    pub fail: AtomicBool,
    pub exchanges: AtomicUsize,
}

#[async_trait]
impl Signaling for FakeSignaling {
    async fn exchange(
        &self,
        target: &SignalingTarget,
        _offer: &SessionDescription,
    ) -> Result<SessionDescription, HandshakeError> {
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            return Err(HandshakeError::Status {
                url: format!("{}/con_notify", target.base_url()),
                status: 503,
            });
        }
        Ok(SessionDescription::answer("v=0\r\no=robot 1 1 IN IP4 127.0.0.1\r\n"))
    }
}

pub struct Fixture {
    pub bridge: Arc<RelayBridge>,
    pub factory: Arc<IntraPeerFactory>,
    pub signaling: Arc<FakeSignaling>,
}

pub fn fixture() -> Fixture {
    let factory = Arc::new(IntraPeerFactory::new());
    let signaling = Arc::new(FakeSignaling::default());
    let settings = BridgeSettings {
        validation_timeout: None,
        ..Default::default()
    };
    let bridge = Arc::new(RelayBridge::new(
        factory.clone(),
        signaling.clone(),
        settings,
    ));
    Fixture {
        bridge,
        factory,
        signaling,
    }
}

/// Poll `cond` until it holds or five seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
