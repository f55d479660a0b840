// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encrypted SDP exchange with the robot.
//!
//! ```text
//! client                                   robot :9991
//!   | POST /con_notify                        |
//!   |---------------------------------------->|
//!   |    base64({"data1": pad10+key+path10})  |
//!   |<----------------------------------------|
//!   | POST /con_ing_<path>                    |
//!   |   {"data1": AES(offer), "data2": RSA(k)}|
//!   |---------------------------------------->|
//!   |              AES({"sdp","type"})        |
//!   |<----------------------------------------|
//! ```

use crate::crypto::{self, aes_ecb, rsa_key, CryptoError};
use crate::error::HandshakeError;
use crate::transport::SessionDescription;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Robot signaling port.
pub const SIGNALING_PORT: u16 = 9991;

/// Identity sent with every local-network offer.
const OFFER_ID: &str = "STA_localNetwork";

/// Where and how to reach the robot's signaling endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingTarget {
    pub robot_ip: String,
    pub port: u16,
    pub token: String,
}

impl SignalingTarget {
    pub fn new(robot_ip: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            robot_ip: robot_ip.into(),
            port: SIGNALING_PORT,
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.robot_ip, self.port)
    }
}

/// Offer/answer exchange with the robot.
#[async_trait]
pub trait Signaling: Send + Sync {
    /// Deliver `offer` and return the robot's answer.
    async fn exchange(
        &self,
        target: &SignalingTarget,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, HandshakeError>;

    /// Release client resources.
    async fn close(&self) -> Result<(), HandshakeError> {
        Ok(())
    }
}

/// [`Signaling`] over the robot's HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpSignaling {
    client: reqwest::Client,
}

impl HttpSignaling {
    /// Client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post(
        &self,
        url: String,
        body: Option<String>,
    ) -> Result<String, HandshakeError> {
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => return Err(HandshakeError::Http { url, source }),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(HandshakeError::Status {
                url,
                status: status.as_u16(),
            });
        }
        match response.text().await {
            Ok(text) => Ok(text),
            Err(source) => Err(HandshakeError::Http { url, source }),
        }
    }
}

#[async_trait]
impl Signaling for HttpSignaling {
    async fn exchange(
        &self,
        target: &SignalingTarget,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, HandshakeError> {
        let base = target.base_url();

        let notify = self.post(format!("{}/con_notify", base), None).await?;
        let data1 = extract_data1(&notify)?;
        let key_segment = crypto::public_key_segment(&data1)?.to_string();
        let path = crypto::path_ending(&data1);
        debug!("signaling path ending: {}", path);

        let offer_json = offer_payload(offer, &target.token);
        let (aes_key, body) = tokio::task::spawn_blocking(move || seal_offer(&key_segment, &offer_json))
            .await
            .map_err(|e| HandshakeError::Worker(e.to_string()))??;

        let sealed_answer = self
            .post(format!("{}/con_ing_{}", base, path), Some(body))
            .await?;
        let answer = open_answer(&sealed_answer, &aes_key)?;
        info!("received {} from robot at {}", answer.kind, target.robot_ip);
        Ok(answer)
    }
}

/// Offer JSON as the robot expects it.
pub fn offer_payload(offer: &SessionDescription, token: &str) -> String {
    json!({
        "id": OFFER_ID,
        "sdp": offer.sdp,
        "type": offer.kind.as_str(),
        "token": token,
    })
    .to_string()
}

/// Pull `data1` out of the base64 JSON `con_notify` answer.
pub fn extract_data1(body: &str) -> Result<String, HandshakeError> {
    let decoded = STANDARD
        .decode(body.trim())
        .map_err(|e| HandshakeError::Decode(format!("con_notify body is not base64: {}", e)))?;
    let value: Value = serde_json::from_slice(&decoded)
        .map_err(|e| HandshakeError::Decode(format!("con_notify body is not JSON: {}", e)))?;

    value
        .get("data1")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(HandshakeError::MissingField("data1"))
}

/// Encrypt the offer under a fresh AES key and wrap the key for the robot.
///
/// Returns the AES key and the request body.
pub fn seal_offer(key_segment: &str, offer_json: &str) -> Result<(String, String), CryptoError> {
    let public_key = rsa_key::load_public_key(key_segment)?;
    let aes_key = crypto::generate_key();
    let body = json!({
        "data1": aes_ecb::encrypt(offer_json, &aes_key)?,
        "data2": rsa_key::encrypt(aes_key.as_bytes(), &public_key)?,
    })
    .to_string();
    Ok((aes_key, body))
}

/// Decrypt the robot's answer.
pub fn open_answer(sealed: &str, aes_key: &str) -> Result<SessionDescription, HandshakeError> {
    let plain = aes_ecb::decrypt(sealed.trim(), aes_key)?;
    serde_json::from_str(&plain)
        .map_err(|e| HandshakeError::Decode(format!("answer is not a session description: {}", e)))
}
