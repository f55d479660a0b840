// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Video fan-out.
//!
//! A [`VideoRelay`] carries one upstream RTP stream. Every downstream peer
//! subscribes and receives the marshalled packets verbatim; the relay never
//! depacketizes or re-encodes.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Packets buffered per subscriber before it starts lagging.
const RELAY_CAPACITY: usize = 512;

/// Codec of the upstream track, needed to create matching local tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCodec {
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
}

impl VideoCodec {
    pub fn h264() -> Self {
        Self {
            mime_type: "video/H264".to_string(),
            clock_rate: 90_000,
            channels: 0,
            sdp_fmtp_line:
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                    .to_string(),
        }
    }
}

/// Broadcasts one upstream RTP stream to any number of subscribers.
#[derive(Debug)]
pub struct VideoRelay {
    codec: VideoCodec,
    tx: broadcast::Sender<Bytes>,
    packets: AtomicU64,
    stopped: AtomicBool,
}

impl VideoRelay {
    pub fn new(codec: VideoCodec) -> Self {
        let (tx, _) = broadcast::channel(RELAY_CAPACITY);
        Self {
            codec,
            tx,
            packets: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn codec(&self) -> &VideoCodec {
        &self.codec
    }

    /// Push one marshalled RTP packet. Returns `false` once stopped.
    ///
    /// Packets published with no subscriber are dropped.
    pub fn publish(&self, packet: Bytes) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.packets.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(packet);
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn packets_published(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// Stop relaying. Upstream pumps exit on their next packet.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            debug!("video relay ({}) stopped", self.codec.mime_type);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}
