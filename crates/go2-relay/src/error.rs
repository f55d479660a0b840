// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy shared by the relay server and its clients.
//!
//! Every error crossing the HTTP boundary is serialized as
//! `{"detail": <text>, "exception_type": <tag>}`; clients rebuild the
//! matching [`RelayError`] variant from the tag.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use go2_webrtc::{ConnectionError, SessionError, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Wire-stable error tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    StateException,
    ValueError,
    KeyError,
    IndexError,
    RuntimeError,
    TimeoutError,
    AsyncioTimeoutError,
    /// Any tag outside the table; carried as received.
    Other(String),
}

impl ErrorKind {
    pub fn tag(&self) -> &str {
        match self {
            Self::StateException => "state_exception",
            Self::ValueError => "value_error",
            Self::KeyError => "key_error",
            Self::IndexError => "index_error",
            Self::RuntimeError => "runtime_error",
            Self::TimeoutError => "timeout_error",
            Self::AsyncioTimeoutError => "asyncio_timeout_error",
            Self::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "state_exception" => Self::StateException,
            "value_error" => Self::ValueError,
            "key_error" => Self::KeyError,
            "index_error" => Self::IndexError,
            "runtime_error" => Self::RuntimeError,
            "timeout_error" => Self::TimeoutError,
            "asyncio_timeout_error" => Self::AsyncioTimeoutError,
            other => Self::Other(other.to_string()),
        }
    }

    /// Default HTTP status class of the tag.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::StateException => StatusCode::CONFLICT,
            Self::ValueError | Self::KeyError | Self::IndexError => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::TimeoutError | Self::AsyncioTimeoutError => StatusCode::GATEWAY_TIMEOUT,
            Self::RuntimeError | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub exception_type: String,
}

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Operation not valid in the current bridge state.
    #[error("{0}")]
    StateConflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("index out of range: {0}")]
    OutOfRange(String),

    /// Robot handshake or transport setup failed.
    #[error("GO2 connect failed: {0}")]
    Connect(#[from] ConnectionError),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Runtime(String),

    /// Request to a relay server failed before an answer arrived.
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error reported by a relay server with an unrecognized tag.
    #[error("{kind}: {detail}")]
    Remote { kind: String, detail: String },
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StateConflict(_) => ErrorKind::StateException,
            Self::InvalidInput(_) => ErrorKind::ValueError,
            Self::MissingKey(_) => ErrorKind::KeyError,
            Self::OutOfRange(_) => ErrorKind::IndexError,
            Self::Connect(e) if e.is_timeout() => ErrorKind::TimeoutError,
            Self::Connect(_) | Self::Runtime(_) => ErrorKind::RuntimeError,
            Self::Timeout(_) => ErrorKind::TimeoutError,
            Self::Http(e) if e.is_timeout() => ErrorKind::TimeoutError,
            Self::Http(_) => ErrorKind::RuntimeError,
            Self::Remote { kind, .. } => ErrorKind::from_tag(kind),
        }
    }

    /// Response status. A failed robot handshake is a bad gateway rather
    /// than a local fault.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Connect(e) if !e.is_timeout() => StatusCode::BAD_GATEWAY,
            other => other.kind().status(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            detail: self.to_string(),
            exception_type: self.kind().tag().to_string(),
        }
    }

    /// Rebuild the local error a relay server reported.
    pub fn from_body(body: ErrorBody) -> Self {
        let ErrorBody {
            detail,
            exception_type,
        } = body;
        match ErrorKind::from_tag(&exception_type) {
            ErrorKind::StateException => Self::StateConflict(detail),
            ErrorKind::ValueError => Self::InvalidInput(detail),
            ErrorKind::KeyError => Self::MissingKey(detail),
            ErrorKind::IndexError => Self::OutOfRange(detail),
            ErrorKind::RuntimeError => Self::Runtime(detail),
            ErrorKind::TimeoutError => Self::Timeout(detail),
            ErrorKind::AsyncioTimeoutError => Self::Timeout(format!("asyncio timeout: {}", detail)),
            ErrorKind::Other(kind) => Self::Remote { kind, detail },
        }
    }
}

impl From<SessionError> for RelayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidState(_) | SessionError::ChannelNotOpen => {
                Self::StateConflict(err.to_string())
            }
            other => Self::Runtime(other.to_string()),
        }
    }
}

impl From<TransportError> for RelayError {
    fn from(err: TransportError) -> Self {
        Self::Runtime(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use go2_webrtc::HandshakeError;

    const TAGS: [&str; 7] = [
        "state_exception",
        "value_error",
        "key_error",
        "index_error",
        "runtime_error",
        "timeout_error",
        "asyncio_timeout_error",
    ];

    #[test]
    fn test_tag_table() {
        for tag in TAGS {
            assert_eq!(ErrorKind::from_tag(tag).tag(), tag);
        }
        assert_eq!(ErrorKind::from_tag("OSError"), ErrorKind::Other("OSError".into()));
        assert_eq!(ErrorKind::from_tag("OSError").tag(), "OSError");
    }

    #[test]
    fn test_status_classes() {
        let status = |tag: &str| ErrorKind::from_tag(tag).status().as_u16();
        assert_eq!(status("state_exception"), 409);
        assert_eq!(status("value_error"), 422);
        assert_eq!(status("key_error"), 422);
        assert_eq!(status("index_error"), 422);
        assert_eq!(status("runtime_error"), 500);
        assert_eq!(status("timeout_error"), 504);
        assert_eq!(status("asyncio_timeout_error"), 504);
        assert_eq!(status("ZeroDivisionError"), 500);
    }

    #[test]
    fn test_reconstruction_preserves_kind() {
        let errors = [
            RelayError::StateConflict("busy".into()),
            RelayError::InvalidInput("bad".into()),
            RelayError::MissingKey("sdp".into()),
            RelayError::OutOfRange("3".into()),
            RelayError::Runtime("boom".into()),
            RelayError::Timeout("slow".into()),
            RelayError::Remote {
                kind: "OSError".into(),
                detail: "disk".into(),
            },
        ];
        for err in errors {
            let rebuilt = RelayError::from_body(err.body());
            assert_eq!(rebuilt.kind(), err.kind());
            assert_eq!(rebuilt.status(), err.status());
        }

        let rebuilt = RelayError::from_body(ErrorBody {
            detail: "late".into(),
            exception_type: "asyncio_timeout_error".into(),
        });
        assert!(matches!(rebuilt, RelayError::Timeout(ref d) if d.contains("late")));
    }

    #[test]
    fn test_connect_failure_is_bad_gateway() {
        let err = RelayError::from(ConnectionError::from(HandshakeError::Status {
            url: "http://192.168.12.1:9991/con_notify".into(),
            status: 404,
        }));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let body = err.body();
        assert_eq!(body.exception_type, "runtime_error");
        assert!(body.detail.starts_with("GO2 connect failed"));
    }

    #[test]
    fn test_session_errors() {
        let err = RelayError::from(SessionError::ChannelNotOpen);
        assert_eq!(err.kind(), ErrorKind::StateException);
        let err = RelayError::from(SessionError::Transport(TransportError::Closed));
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
    }
}
