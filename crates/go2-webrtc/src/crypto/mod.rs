// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cryptographic primitives for the Go2 signaling handshake.
//!
//! The robot firmware hides its session-setup exchange behind a small
//! hybrid scheme:
//!
//! - a random AES key (32 ASCII hex characters, used as an AES-256 key)
//!   encrypts the SDP offer in ECB mode with PKCS#7 padding
//! - the AES key itself is encrypted under the robot's RSA public key
//!   (PKCS#1 v1.5)
//! - after the transport is up, the robot issues a validation nonce that is
//!   answered with `base64(md5("UnitreeGo2_" + nonce))`
//!
//! None of this is a security boundary against a hostile peer; it only keeps
//! the offer away from casual interception. The firmware-specific pieces
//! ([`path_ending`], [`validation_response`]) are isolated here so a firmware
//! change touches one well-tested place.

pub mod aes_ecb;
pub mod path;
pub mod rsa_key;
pub mod validation;

pub use aes_ecb::{generate_key, AES_KEY_LEN};
pub use path::{path_ending, public_key_segment};
pub use validation::{validation_response, VALIDATION_OK};

use thiserror::Error;

/// Errors raised by the handshake primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid AES key length: {0} bytes (expected 16, 24 or 32)")]
    KeyLength(usize),

    #[error("ciphertext length {0} is not a multiple of the AES block size")]
    BlockLength(usize),

    #[error("PKCS#7 padding check failed")]
    Padding,

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decrypted payload is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid public key: {0}")]
    PublicKey(String),

    #[error("RSA operation failed: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("key material too short: {0} characters")]
    KeyMaterial(usize),
}
