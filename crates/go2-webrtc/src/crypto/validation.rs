// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Post-connect validation challenge.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};

/// Literal the robot sends once the connection is validated.
pub const VALIDATION_OK: &str = "Validation Ok.";

const CHALLENGE_PREFIX: &str = "UnitreeGo2_";

/// Answer to a validation nonce: `base64(md5("UnitreeGo2_" + nonce))`.
pub fn validation_response(nonce: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(CHALLENGE_PREFIX.as_bytes());
    hasher.update(nonce.as_bytes());
    STANDARD.encode(hasher.finalize())
}
