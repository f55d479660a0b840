// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay client.
//!
//! [`RelayClient`] drives a relay server's control surface over HTTP and
//! rebuilds server-side errors into local [`RelayError`]s. [`RelayClient::open`]
//! negotiates an operator session through the relay and returns a
//! [`RelayLink`] carrying decoded telemetry, the newest lidar frame, video
//! and robot command helpers.

use crate::bridge::{ConnectArgs, ConnectReply};
use crate::error::{ErrorBody, RelayError};
use go2_webrtc::transport::{DataChannel, PeerConnection, PeerEvents};
use go2_webrtc::{
    commands, ChannelMessage, Decoded, IceConfig, PeerEvent, PeerFactory, PointCloudDecoder,
    RobotData, SessionDescription, Teardown, TelemetryDecoder, VideoRelay, DATA_CHANNEL_LABEL,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identifier stamped on telemetry received through a relay.
const RELAYED_ROBOT_ID: &str = "0";

/// HTTP client of a relay server.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayClient {
    /// Client of the relay at `base_url` (e.g. `http://pi.local:8000`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, RelayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await?;
        warn!("relay answered {} on {}: {}", status, path, text);
        Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => RelayError::from_body(body),
            Err(_) => RelayError::Remote {
                kind: "unknown".into(),
                detail: format!("HTTP {}: {}", status.as_u16(), text),
            },
        })
    }

    /// Ask the relay to connect to the robot.
    pub async fn connect_robot(&self, args: &ConnectArgs) -> Result<ConnectReply, RelayError> {
        info!("asking relay to connect to robot at {}", args.robot_ip);
        self.post("/go2/connect", args).await
    }

    pub async fn disconnect_robot(&self) -> Result<(), RelayError> {
        let _: Value = self.post("/go2/disconnect", &json!({})).await?;
        Ok(())
    }

    /// Exchange a raw offer for the relay's answer.
    pub async fn offer(&self, offer: &SessionDescription) -> Result<SessionDescription, RelayError> {
        self.post("/webrtc/offer", offer).await
    }

    /// Negotiate an operator session through the relay.
    ///
    /// The robot must already be connected on the relay side.
    pub async fn open(
        &self,
        factory: Arc<dyn PeerFactory>,
        options: LinkOptions,
    ) -> Result<RelayLink, RelayError> {
        let (peer, events) = factory.create_peer(&options.ice).await?;
        match self.negotiate(Arc::clone(&peer), events, options).await {
            Ok(link) => Ok(link),
            Err(e) => {
                if let Err(close_err) = peer.close().await {
                    debug!("closing failed operator session: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn negotiate(
        &self,
        peer: Arc<dyn PeerConnection>,
        events: PeerEvents,
        options: LinkOptions,
    ) -> Result<RelayLink, RelayError> {
        // Created before the offer so it carries the data section.
        let channel = peer.create_data_channel(DATA_CHANNEL_LABEL).await?;
        peer.add_video_receiver().await?;

        let mut decoder = TelemetryDecoder::new(RELAYED_ROBOT_ID);
        if let Some(lidar) = options.point_cloud_decoder {
            decoder = decoder.with_lidar_decoder(lidar);
        }
        let (telemetry_tx, telemetry) = mpsc::channel(options.telemetry_capacity.max(1));
        let (lidar_tx, lidar) = watch::channel(None);
        let (video_tx, video) = watch::channel(None);
        let task = tokio::spawn(run_link_events(
            events,
            decoder,
            LinkSinks {
                telemetry: telemetry_tx,
                lidar: lidar_tx,
                video: video_tx,
            },
        ));

        let offer = peer.create_offer().await?;
        let answer = match self.offer(&offer).await {
            Ok(answer) => answer,
            Err(e) => {
                task.abort();
                return Err(e);
            }
        };
        if let Err(e) = peer.set_remote_description(answer).await {
            task.abort();
            return Err(e.into());
        }
        info!("operator session negotiated with relay at {}", self.base_url);

        Ok(RelayLink {
            peer,
            channel,
            telemetry,
            lidar,
            video,
            task,
        })
    }
}

/// Options of an operator session.
#[derive(Clone)]
pub struct LinkOptions {
    pub ice: IceConfig,
    /// Enables lidar decoding of binary frames.
    pub point_cloud_decoder: Option<Arc<dyn PointCloudDecoder>>,
    /// Decoded records buffered before new ones are dropped.
    pub telemetry_capacity: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            ice: IceConfig::default(),
            point_cloud_decoder: None,
            telemetry_capacity: 256,
        }
    }
}

struct LinkSinks {
    telemetry: mpsc::Sender<RobotData>,
    lidar: watch::Sender<Option<RobotData>>,
    video: watch::Sender<Option<Arc<VideoRelay>>>,
}

/// Operator session through a relay.
pub struct RelayLink {
    peer: Arc<dyn PeerConnection>,
    channel: Arc<dyn DataChannel>,
    telemetry: mpsc::Receiver<RobotData>,
    lidar: watch::Receiver<Option<RobotData>>,
    video: watch::Receiver<Option<Arc<VideoRelay>>>,
    task: JoinHandle<()>,
}

impl RelayLink {
    /// Next decoded non-lidar record, `None` once the session ends.
    pub async fn recv(&mut self) -> Option<RobotData> {
        self.telemetry.recv().await
    }

    /// Newest lidar frame. Older frames are overwritten, never queued.
    pub fn lidar(&self) -> watch::Receiver<Option<RobotData>> {
        self.lidar.clone()
    }

    pub fn video(&self) -> watch::Receiver<Option<Arc<VideoRelay>>> {
        self.video.clone()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Send a prebuilt command message.
    pub async fn send_command(&self, command: &Value) -> Result<(), RelayError> {
        if !self.channel.is_open() {
            return Err(RelayError::StateConflict(
                "data channel to the relay is not open".into(),
            ));
        }
        self.channel
            .send(ChannelMessage::Text(command.to_string()))
            .await?;
        Ok(())
    }

    /// Velocity command; must be repeated to keep moving.
    pub async fn move_velocity(&self, forward: f64, strafe: f64, rotation: f64) -> Result<(), RelayError> {
        self.send_command(&commands::move_command(forward, strafe, rotation, false))
            .await
    }

    /// Look towards the given angles without moving the feet.
    pub async fn gaze(&self, roll: f64, pitch: f64, yaw: f64) -> Result<(), RelayError> {
        self.send_command(&commands::euler(roll, pitch, yaw)).await
    }

    pub async fn stand_up(&self) -> Result<(), RelayError> {
        self.send_command(&commands::sport(commands::SportCmd::StandUp))
            .await
    }

    /// Fold the legs and rest on the belly.
    pub async fn lie_down(&self) -> Result<(), RelayError> {
        self.send_command(&commands::sport(commands::SportCmd::StandDown))
            .await
    }

    pub async fn sit(&self) -> Result<(), RelayError> {
        self.send_command(&commands::sport(commands::SportCmd::Sit))
            .await
    }

    pub async fn set_obstacle_avoidance(&self, enabled: bool) -> Result<(), RelayError> {
        self.send_command(&commands::obstacle_avoidance(enabled))
            .await
    }

    /// Close the operator session.
    pub async fn close(self) -> Teardown {
        self.task.abort();
        let mut teardown = Teardown::new("relay link");
        teardown.attempt("peer connection", self.peer.close()).await;
        teardown.attempt("data channel", self.channel.close()).await;
        teardown
    }
}

async fn run_link_events(mut events: PeerEvents, decoder: TelemetryDecoder, sinks: LinkSinks) {
    while let Some(event) = events.recv().await {
        match event {
            PeerEvent::Message { message, .. } => match decoder.decode(&message) {
                Ok(Decoded::Record(data)) if data.lidar.is_some() => {
                    sinks.lidar.send_replace(Some(data));
                }
                Ok(Decoded::Record(data)) => {
                    if let Err(mpsc::error::TrySendError::Full(_)) = sinks.telemetry.try_send(data) {
                        warn!("telemetry consumer is behind, dropping record");
                    }
                }
                Ok(Decoded::Discard(_)) => {}
                Err(e) => warn!("malformed frame from relay: {}", e),
            },
            PeerEvent::Track(track) => {
                info!("received video track from relay");
                if let Some(previous) = sinks.video.send_replace(Some(track)) {
                    previous.stop();
                }
            }
            PeerEvent::StateChanged(state) => info!("relay session is {:?}", state),
            PeerEvent::ChannelOpen { label } => info!("relay data channel '{}' open", label),
            PeerEvent::RemoteChannel(channel) => {
                debug!("ignoring relay-initiated channel '{}'", channel.label())
            }
        }
    }
}
