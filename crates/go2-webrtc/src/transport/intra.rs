// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport backend.
//!
//! Peers created here never touch the network. Negotiation succeeds for any
//! SDP starting with `v=0`, after which the peer reports `Connected` and
//! opens its local channels. Every frame sent is recorded, and arbitrary
//! [`PeerEvent`]s can be injected to play the remote side.

use super::{
    ChannelMessage, DataChannel, IceConfig, PeerConnection, PeerEvent, PeerEvents, PeerFactory,
    PeerState, SdpKind, SessionDescription, TransportError, VideoRelay,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Creates [`IntraPeer`]s and keeps a handle to each for inspection.
#[derive(Default)]
pub struct IntraPeerFactory {
    peers: Mutex<Vec<Arc<IntraPeer>>>,
    next_id: AtomicUsize,
    fail_create: AtomicBool,
}

impl IntraPeerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create_peer` call fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::Relaxed);
    }

    /// All peers created so far, in creation order.
    pub fn peers(&self) -> Vec<Arc<IntraPeer>> {
        self.peers.lock().clone()
    }

    pub fn peer(&self, index: usize) -> Option<Arc<IntraPeer>> {
        self.peers.lock().get(index).cloned()
    }

    pub fn last_peer(&self) -> Option<Arc<IntraPeer>> {
        self.peers.lock().last().cloned()
    }
}

#[async_trait]
impl PeerFactory for IntraPeerFactory {
    async fn create_peer(
        &self,
        _ice: &IceConfig,
    ) -> Result<(Arc<dyn PeerConnection>, PeerEvents), TransportError> {
        if self.fail_create.load(Ordering::Relaxed) {
            return Err(TransportError::Backend("peer creation disabled".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(IntraPeer {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            events: tx,
            state: Mutex::new(PeerState::New),
            channels: Mutex::new(Vec::new()),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            video_receiver: AtomicBool::new(false),
            video_tracks: Mutex::new(Vec::new()),
            fail_close: AtomicBool::new(false),
        });
        self.peers.lock().push(Arc::clone(&peer));
        let peer: Arc<dyn PeerConnection> = peer;
        Ok((peer, rx))
    }
}

/// In-process peer.
pub struct IntraPeer {
    id: usize,
    events: mpsc::UnboundedSender<PeerEvent>,
    state: Mutex<PeerState>,
    channels: Mutex<Vec<Arc<IntraChannel>>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    video_receiver: AtomicBool,
    video_tracks: Mutex<Vec<Arc<VideoRelay>>>,
    fail_close: AtomicBool,
}

impl IntraPeer {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Deliver `event` as if the remote side produced it.
    pub fn inject(&self, event: PeerEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Deliver a text frame on the channel named `label`.
    pub fn inject_text(&self, label: &str, text: impl Into<String>) -> bool {
        self.inject(PeerEvent::Message {
            label: label.to_string(),
            message: ChannelMessage::Text(text.into()),
        })
    }

    /// Move to `state` and report it.
    pub fn set_state(&self, state: PeerState) {
        *self.state.lock() = state;
        let _ = self.events.send(PeerEvent::StateChanged(state));
    }

    /// Locally created channel with `label`.
    pub fn channel(&self, label: &str) -> Option<Arc<IntraChannel>> {
        self.channels
            .lock()
            .iter()
            .find(|c| c.label == label)
            .cloned()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    pub fn has_video_receiver(&self) -> bool {
        self.video_receiver.load(Ordering::Relaxed)
    }

    pub fn video_tracks(&self) -> Vec<Arc<VideoRelay>> {
        self.video_tracks.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock() == PeerState::Closed
    }

    /// Make `close` fail without closing anything.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::Relaxed);
    }

    fn complete_negotiation(&self) {
        self.set_state(PeerState::Connected);
        let channels = self.channels.lock().clone();
        for channel in channels {
            channel.open.store(true, Ordering::Release);
            let _ = self.events.send(PeerEvent::ChannelOpen {
                label: channel.label.clone(),
            });
        }
    }

    fn description(&self, kind: SdpKind) -> SessionDescription {
        SessionDescription {
            sdp: format!(
                "v=0\r\no=intra {} 0 IN IP4 127.0.0.1\r\ns=-\r\na=type:{}\r\n",
                self.id, kind
            ),
            kind,
        }
    }
}

#[async_trait]
impl PeerConnection for IntraPeer {
    async fn create_data_channel(
        &self,
        label: &str,
    ) -> Result<Arc<dyn DataChannel>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let channel = Arc::new(IntraChannel::new(label));
        self.channels.lock().push(Arc::clone(&channel));
        Ok(channel)
    }

    async fn add_video_receiver(&self) -> Result<(), TransportError> {
        self.video_receiver.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn add_video_track(&self, relay: Arc<VideoRelay>) -> Result<(), TransportError> {
        self.video_tracks.lock().push(relay);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let offer = self.description(SdpKind::Offer);
        *self.local.lock() = Some(offer.clone());
        self.set_state(PeerState::Connecting);
        Ok(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let has_offer = matches!(
            self.remote.lock().as_ref(),
            Some(d) if d.kind == SdpKind::Offer
        );
        if !has_offer {
            return Err(TransportError::Negotiation(
                "no remote offer to answer".into(),
            ));
        }
        let answer = self.description(SdpKind::Answer);
        *self.local.lock() = Some(answer.clone());
        self.complete_negotiation();
        Ok(answer)
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if !desc.sdp.starts_with("v=0") {
            return Err(TransportError::Negotiation("malformed sdp".into()));
        }
        let kind = desc.kind;
        *self.remote.lock() = Some(desc);
        if kind == SdpKind::Answer {
            self.complete_negotiation();
        }
        Ok(())
    }

    fn state(&self) -> PeerState {
        *self.state.lock()
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.fail_close.load(Ordering::Relaxed) {
            return Err(TransportError::Backend(format!(
                "intra peer {} close failed",
                self.id
            )));
        }
        for channel in self.channels.lock().iter() {
            channel.open.store(false, Ordering::Release);
            channel.closed.store(true, Ordering::Release);
        }
        self.set_state(PeerState::Closed);
        Ok(())
    }
}

/// In-process data channel that records every frame sent on it.
pub struct IntraChannel {
    label: String,
    open: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<ChannelMessage>>,
    sent_count: watch::Sender<usize>,
}

impl IntraChannel {
    fn new(label: &str) -> Self {
        let (sent_count, _) = watch::channel(0);
        Self {
            label: label.to_string(),
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            sent_count,
        }
    }

    /// A channel that is already open, as announced by a remote peer.
    pub fn opened(label: &str) -> Arc<Self> {
        let channel = Self::new(label);
        channel.open.store(true, Ordering::Release);
        Arc::new(channel)
    }

    pub fn sent(&self) -> Vec<ChannelMessage> {
        self.sent.lock().clone()
    }

    /// Text frames sent so far.
    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| m.as_text().map(str::to_string))
            .collect()
    }

    /// Wait until at least `count` frames were sent (5 s cap), then return
    /// everything sent so far.
    pub async fn wait_sent(&self, count: usize) -> Vec<ChannelMessage> {
        let mut rx = self.sent_count.subscribe();
        let _ = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= count)).await;
        self.sent()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl DataChannel for IntraChannel {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn send(&self, message: ChannelMessage) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelNotOpen(self.label.clone()));
        }
        let count = {
            let mut sent = self.sent.lock();
            sent.push(message);
            sent.len()
        };
        self.sent_count.send_replace(count);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::Release);
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_negotiation_opens_channels() {
        let factory = IntraPeerFactory::new();
        let (peer, mut events) = factory.create_peer(&IceConfig::default()).await.unwrap();

        let channel = peer.create_data_channel("data").await.unwrap();
        assert!(!channel.is_open());
        assert!(channel
            .send(ChannelMessage::Text("early".into()))
            .await
            .is_err());

        let offer = peer.create_offer().await.unwrap();
        assert_eq!(offer.kind, SdpKind::Offer);
        peer.set_remote_description(SessionDescription::answer("v=0\r\n"))
            .await
            .unwrap();

        assert!(channel.is_open());
        assert_eq!(peer.state(), PeerState::Connected);

        let mut saw_open = false;
        while let Ok(event) = events.try_recv() {
            if let PeerEvent::ChannelOpen { label } = event {
                assert_eq!(label, "data");
                saw_open = true;
            }
        }
        assert!(saw_open);
    }

    #[tokio::test]
    async fn test_answer_requires_offer() {
        let factory = IntraPeerFactory::new();
        let (peer, _events) = factory.create_peer(&IceConfig::default()).await.unwrap();
        assert!(matches!(
            peer.create_answer().await,
            Err(TransportError::Negotiation(_))
        ));
        assert!(matches!(
            peer.set_remote_description(SessionDescription::offer("garbage"))
                .await,
            Err(TransportError::Negotiation(_))
        ));

        peer.set_remote_description(SessionDescription::offer("v=0\r\n"))
            .await
            .unwrap();
        let answer = peer.create_answer().await.unwrap();
        assert_eq!(answer.kind, SdpKind::Answer);
        assert_eq!(peer.state(), PeerState::Connected);
    }

    #[tokio::test]
    async fn test_channel_records_and_waits() {
        let channel = IntraChannel::opened("data");
        let writer = Arc::clone(&channel);
        tokio::spawn(async move {
            for i in 0..3 {
                writer
                    .send(ChannelMessage::Text(format!("m{}", i)))
                    .await
                    .unwrap();
            }
        });

        let sent = channel.wait_sent(3).await;
        assert_eq!(sent.len(), 3);
        assert_eq!(channel.sent_text(), vec!["m0", "m1", "m2"]);
    }

    #[tokio::test]
    async fn test_close() {
        let factory = IntraPeerFactory::new();
        factory.create_peer(&IceConfig::default()).await.unwrap();
        let peer = factory.last_peer().unwrap();
        let channel = peer.create_data_channel("data").await.unwrap();

        peer.fail_close(true);
        assert!(peer.close().await.is_err());
        assert!(!peer.is_closed());

        peer.fail_close(false);
        peer.close().await.unwrap();
        assert!(peer.is_closed());
        assert!(peer.channel("data").unwrap().is_closed());
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn test_factory_failure() {
        let factory = IntraPeerFactory::new();
        factory.fail_create(true);
        assert!(factory.create_peer(&IceConfig::default()).await.is_err());
        assert!(factory.peers().is_empty());
    }
}
