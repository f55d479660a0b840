// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary lidar frames.
//!
//! ```text
//! 0      2      4                 4+len
//! +------+------+-----------------+---------------------------+
//! | len  | rsvd | JSON header     | compressed voxel payload  |
//! | u16le|      | {type,topic,..} |                           |
//! +------+------+-----------------+---------------------------+
//! ```

use crate::error::FramingError;
use crate::message::parse_lenient;
use bytes::Bytes;
use serde_json::Value;

/// Bytes preceding the JSON header.
pub const FRAME_PREFIX_LEN: usize = 4;

/// Output of an external point-cloud decoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub point_count: usize,
    pub face_count: usize,
    pub positions: Vec<u8>,
    pub uvs: Vec<u8>,
    pub indices: Vec<u32>,
}

/// Decodes compressed voxel payloads.
///
/// `meta` is the frame's `data` object (resolution, origin, width, ...).
/// Returning `None` means the payload could not be decoded.
pub trait PointCloudDecoder: Send + Sync {
    fn decode(&self, compressed: &[u8], meta: &Value) -> Option<PointCloud>;
}

/// Split a binary frame into its JSON header and compressed payload.
pub fn split_frame(frame: &Bytes) -> Result<(Value, Bytes), FramingError> {
    if frame.len() < FRAME_PREFIX_LEN {
        return Err(FramingError::Truncated {
            len: frame.len(),
            needed: FRAME_PREFIX_LEN,
        });
    }

    let header_len = u16::from_le_bytes([frame[0], frame[1]]) as usize;
    let header_end = FRAME_PREFIX_LEN + header_len;
    if frame.len() < header_end {
        return Err(FramingError::Truncated {
            len: frame.len(),
            needed: header_end,
        });
    }

    let header = std::str::from_utf8(&frame[FRAME_PREFIX_LEN..header_end])
        .map_err(|_| FramingError::HeaderEncoding)?;
    let header = parse_lenient(header)?;
    Ok((header, frame.slice(header_end..)))
}

/// Build a binary frame. Headers longer than `u16::MAX` bytes are rejected.
pub fn join_frame(header: &Value, compressed: &[u8]) -> Option<Bytes> {
    let header = header.to_string();
    let header_len = u16::try_from(header.len()).ok()?;

    let mut frame = Vec::with_capacity(FRAME_PREFIX_LEN + header.len() + compressed.len());
    frame.extend_from_slice(&header_len.to_le_bytes());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(compressed);
    Some(Bytes::from(frame))
}
