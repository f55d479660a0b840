// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `webrtc` crate backend.
//!
//! Callbacks registered on the underlying peer only push [`PeerEvent`]s into
//! the owner's queue; all protocol handling happens on the session task.

use super::{
    ChannelMessage, DataChannel, IceConfig, PeerConnection, PeerEvent, PeerEvents, PeerFactory,
    PeerState, SdpKind, SessionDescription, TransportError, VideoCodec, VideoRelay,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::Marshal;

impl From<webrtc::Error> for TransportError {
    fn from(e: webrtc::Error) -> Self {
        TransportError::Backend(e.to_string())
    }
}

fn map_state(state: RTCPeerConnectionState) -> PeerState {
    match state {
        RTCPeerConnectionState::Connecting => PeerState::Connecting,
        RTCPeerConnectionState::Connected => PeerState::Connected,
        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
        RTCPeerConnectionState::Failed => PeerState::Failed,
        RTCPeerConnectionState::Closed => PeerState::Closed,
        _ => PeerState::New,
    }
}

/// Creates peers backed by the `webrtc` crate.
#[derive(Debug, Default)]
pub struct RtcPeerFactory;

impl RtcPeerFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn create_peer(
        &self,
        ice: &IceConfig,
    ) -> Result<(Arc<dyn PeerConnection>, PeerEvents), TransportError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: if ice.servers.is_empty() {
                Vec::new()
            } else {
                vec![RTCIceServer {
                    urls: ice.servers.clone(),
                    ..Default::default()
                }]
            },
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await?);
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = RtcPeer {
            pc,
            events: tx,
            state: Arc::new(Mutex::new(PeerState::New)),
        };
        peer.install_callbacks();

        let peer: Arc<dyn PeerConnection> = Arc::new(peer);
        Ok((peer, rx))
    }
}

/// Peer connection wrapper.
pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    events: mpsc::UnboundedSender<PeerEvent>,
    state: Arc<Mutex<PeerState>>,
}

impl RtcPeer {
    fn install_callbacks(&self) {
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let mapped = map_state(s);
                *state.lock() = mapped;
                debug!("peer connection state: {}", s);
                let _ = events.send(PeerEvent::StateChanged(mapped));
                Box::pin(async {})
            }));

        let events = self.events.clone();
        self.pc
            .on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                let events = events.clone();
                Box::pin(async move {
                    debug!("remote data channel '{}'", dc.label());
                    let channel = RtcDataChannel::wrap(dc, events.clone());
                    let _ = events.send(PeerEvent::RemoteChannel(Arc::new(channel)));
                })
            }));

        let events = self.events.clone();
        self.pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let events = events.clone();
            Box::pin(async move {
                if track.kind() != RTPCodecType::Video {
                    debug!("ignoring remote {} track", track.kind());
                    return;
                }
                let capability = track.codec().capability;
                let relay = Arc::new(VideoRelay::new(VideoCodec {
                    mime_type: capability.mime_type,
                    clock_rate: capability.clock_rate,
                    channels: capability.channels,
                    sdp_fmtp_line: capability.sdp_fmtp_line,
                }));
                tokio::spawn(pump_remote_track(track, Arc::clone(&relay)));
                let _ = events.send(PeerEvent::Track(relay));
            })
        }));
    }

    async fn finish_local_description(&self) -> Result<SessionDescription, TransportError> {
        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| TransportError::Negotiation("no local description".into()))?;
        from_rtc_description(&local)
    }
}

fn from_rtc_description(desc: &RTCSessionDescription) -> Result<SessionDescription, TransportError> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Rollback => SdpKind::Rollback,
        other => {
            return Err(TransportError::Negotiation(format!(
                "unsupported sdp type {}",
                other
            )))
        }
    };
    Ok(SessionDescription {
        sdp: desc.sdp.clone(),
        kind,
    })
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    let rtc = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpKind::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpKind::Rollback => {
            return Err(TransportError::Negotiation(
                "rollback is not supported".into(),
            ))
        }
    };
    Ok(rtc)
}

/// Read RTP from the remote track and push it into `relay` untouched.
async fn pump_remote_track(track: Arc<TrackRemote>, relay: Arc<VideoRelay>) {
    loop {
        let packet = match track.read_rtp().await {
            Ok((packet, _)) => packet,
            Err(e) => {
                debug!("remote video track ended: {}", e);
                break;
            }
        };
        let raw = match packet.marshal() {
            Ok(raw) => raw,
            Err(e) => {
                trace!("dropping unmarshallable rtp packet: {}", e);
                continue;
            }
        };
        if !relay.publish(raw) {
            break;
        }
    }
    relay.stop();
}

/// Write relayed RTP into a local track until the relay or track ends.
async fn pump_local_track(mut rx: broadcast::Receiver<Bytes>, track: Arc<TrackLocalStaticRTP>) {
    loop {
        match rx.recv().await {
            Ok(packet) => {
                if let Err(e) = track.write(&packet).await {
                    debug!("local video track closed: {}", e);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("video relay subscriber lagged, {} packets dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn create_data_channel(
        &self,
        label: &str,
    ) -> Result<Arc<dyn DataChannel>, TransportError> {
        let dc = self.pc.create_data_channel(label, None).await?;
        Ok(Arc::new(RtcDataChannel::wrap(dc, self.events.clone())))
    }

    async fn add_video_receiver(&self) -> Result<(), TransportError> {
        self.pc
            .add_transceiver_from_kind(
                RTPCodecType::Video,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: Vec::new(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn add_video_track(&self, relay: Arc<VideoRelay>) -> Result<(), TransportError> {
        let codec = relay.codec();
        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: codec.mime_type.clone(),
                clock_rate: codec.clock_rate,
                channels: codec.channels,
                sdp_fmtp_line: codec.sdp_fmtp_line.clone(),
                rtcp_feedback: Vec::new(),
            },
            "video".to_string(),
            "go2-relay".to_string(),
        ));

        let sender = self
            .pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP must be read for interceptors to run.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
        tokio::spawn(pump_local_track(relay.subscribe(), track));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self.pc.create_offer(None).await?;
        let mut gathered = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(offer).await?;
        let _ = gathered.recv().await;
        self.finish_local_description().await
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let answer = self.pc.create_answer(None).await?;
        let mut gathered = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(answer).await?;
        let _ = gathered.recv().await;
        self.finish_local_description().await
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.pc
            .set_remote_description(to_rtc_description(desc)?)
            .await?;
        Ok(())
    }

    fn state(&self) -> PeerState {
        *self.state.lock()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.pc.close().await?;
        *self.state.lock() = PeerState::Closed;
        Ok(())
    }
}

/// Data channel wrapper that reports traffic on the owner's queue.
pub struct RtcDataChannel {
    dc: Arc<RTCDataChannel>,
}

impl RtcDataChannel {
    fn wrap(dc: Arc<RTCDataChannel>, events: mpsc::UnboundedSender<PeerEvent>) -> Self {
        let label = dc.label().to_string();

        let open_events = events.clone();
        let open_label = label.clone();
        dc.on_open(Box::new(move || {
            let _ = open_events.send(PeerEvent::ChannelOpen { label: open_label });
            Box::pin(async {})
        }));

        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let message = if msg.is_string {
                ChannelMessage::Text(String::from_utf8_lossy(&msg.data).into_owned())
            } else {
                ChannelMessage::Binary(msg.data)
            };
            let _ = events.send(PeerEvent::Message {
                label: label.clone(),
                message,
            });
            Box::pin(async {})
        }));

        Self { dc }
    }
}

#[async_trait]
impl DataChannel for RtcDataChannel {
    fn label(&self) -> String {
        self.dc.label().to_string()
    }

    fn is_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    async fn send(&self, message: ChannelMessage) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelNotOpen(self.label()));
        }
        match message {
            ChannelMessage::Text(text) => self.dc.send_text(text).await?,
            ChannelMessage::Binary(data) => self.dc.send(&data).await?,
        };
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.dc.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(map_state(RTCPeerConnectionState::New), PeerState::New);
        assert_eq!(
            map_state(RTCPeerConnectionState::Connected),
            PeerState::Connected
        );
        assert_eq!(map_state(RTCPeerConnectionState::Failed), PeerState::Failed);
        assert_eq!(map_state(RTCPeerConnectionState::Closed), PeerState::Closed);
    }

    #[tokio::test]
    async fn test_offer_contains_data_channel_and_video() {
        let (peer, _events) = RtcPeerFactory::new()
            .create_peer(&IceConfig::default())
            .await
            .unwrap();
        peer.create_data_channel("data").await.unwrap();
        peer.add_video_receiver().await.unwrap();

        let offer = peer.create_offer().await.unwrap();
        assert_eq!(offer.kind, SdpKind::Offer);
        assert!(offer.sdp.contains("m=application"));
        assert!(offer.sdp.contains("m=video"));
        peer.close().await.unwrap();
        assert_eq!(peer.state(), PeerState::Closed);
    }
}
