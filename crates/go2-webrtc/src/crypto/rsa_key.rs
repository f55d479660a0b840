// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RSA PKCS#1 v1.5 helpers for wrapping the session AES key.

use super::CryptoError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

/// PKCS#1 v1.5 overhead per encrypted block.
const PKCS1_OVERHEAD: usize = 11;

/// Parse the robot's public key.
///
/// The firmware ships base64 of either a DER key (SubjectPublicKeyInfo or
/// bare PKCS#1) or a whole PEM document; a raw PEM string is accepted too.
pub fn load_public_key(encoded: &str) -> Result<RsaPublicKey, CryptoError> {
    let encoded = encoded.trim();
    if encoded.starts_with("-----BEGIN") {
        return parse_pem(encoded);
    }

    let raw = STANDARD.decode(encoded)?;
    if raw.starts_with(b"-----BEGIN") {
        return parse_pem(std::str::from_utf8(&raw)?);
    }

    RsaPublicKey::from_public_key_der(&raw)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&raw))
        .map_err(|e| CryptoError::PublicKey(e.to_string()))
}

fn parse_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::PublicKey(e.to_string()))
}

/// Encrypt `data` for the robot, chunked at `modulus_len - 11` bytes.
///
/// Returns the concatenated ciphertext blocks, base64 encoded.
pub fn encrypt(data: &[u8], key: &RsaPublicKey) -> Result<String, CryptoError> {
    let chunk_len = key.size().saturating_sub(PKCS1_OVERHEAD).max(1);
    let mut out = Vec::with_capacity(key.size() * data.len().div_ceil(chunk_len).max(1));

    for chunk in data.chunks(chunk_len) {
        out.extend(key.encrypt(&mut OsRng, Pkcs1v15Encrypt, chunk)?);
    }

    Ok(STANDARD.encode(out))
}

/// Robot-side inverse of [`encrypt`].
pub fn decrypt(ciphertext_b64: &str, key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let ciphertext = STANDARD.decode(ciphertext_b64.trim())?;
    let block = key.size();
    if ciphertext.is_empty() || ciphertext.len() % block != 0 {
        return Err(CryptoError::BlockLength(ciphertext.len()));
    }

    let mut out = Vec::new();
    for chunk in ciphertext.chunks(block) {
        out.extend(key.decrypt(Pkcs1v15Encrypt, chunk)?);
    }
    Ok(out)
}

/// Base64 of the PKCS#1 DER encoding, the way the firmware publishes keys.
pub fn export_public_key(key: &RsaPublicKey) -> Result<String, CryptoError> {
    let der = key
        .to_pkcs1_der()
        .map_err(|e| CryptoError::PublicKey(e.to_string()))?;
    Ok(STANDARD.encode(der.as_bytes()))
}
