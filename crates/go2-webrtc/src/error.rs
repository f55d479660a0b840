// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared across the crate.

use crate::crypto::CryptoError;
use crate::session::SessionState;
use crate::transport::TransportError;
use thiserror::Error;

/// Failure of the signaling exchange with the robot.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("signaling request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("signaling endpoint {url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("signaling response is missing '{0}'")]
    MissingField(&'static str),

    #[error("malformed signaling payload: {0}")]
    Decode(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("signaling worker failed: {0}")]
    Worker(String),
}

impl HandshakeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http { source, .. } if source.is_timeout())
    }
}

/// The single error kind returned by `RobotSession::connect`.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot connect a session in state {0}")]
    InvalidState(SessionState),
}

impl ConnectionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Handshake(e) if e.is_timeout())
    }
}

/// Failure of an outbound session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is {0}")]
    InvalidState(SessionState),

    #[error("data channel is not open")]
    ChannelNotOpen,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cannot encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Malformed wire framing. Distinct from telemetry validation failures.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotObject,

    #[error("binary frame too short: {len} bytes, header needs {needed}")]
    Truncated { len: usize, needed: usize },

    #[error("binary frame header is not UTF-8")]
    HeaderEncoding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ConnectionError::from(HandshakeError::Status {
            url: "http://10.0.0.2:9991/con_notify".into(),
            status: 503,
        });
        assert_eq!(
            err.to_string(),
            "handshake failed: signaling endpoint http://10.0.0.2:9991/con_notify answered HTTP 503"
        );
        assert!(!err.is_timeout());

        let err = FramingError::Truncated { len: 3, needed: 4 };
        assert_eq!(
            err.to_string(),
            "binary frame too short: 3 bytes, header needs 4"
        );
    }

    #[test]
    fn test_crypto_is_wrapped() {
        let err: ConnectionError = HandshakeError::from(CryptoError::Padding).into();
        assert!(matches!(
            err,
            ConnectionError::Handshake(HandshakeError::Crypto(CryptoError::Padding))
        ));
    }
}
