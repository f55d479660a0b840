// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `data1` parsing: public key extraction and signaling path derivation.
//!
//! The robot's `con_notify` answer carries a single `data1` string made of
//! 10 filler characters, the encoded public key, and 10 trailing characters
//! that encode the path of the follow-up `con_ing_<ending>` request.

use super::CryptoError;
use tracing::warn;

/// Characters stripped from each end of `data1`.
const FRAME_LEN: usize = 10;

const PATH_ALPHABET: [char; 10] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J'];

/// Public key segment of `data1` (10 characters trimmed from each end).
pub fn public_key_segment(data1: &str) -> Result<&str, CryptoError> {
    let len = data1.chars().count();
    if len < 2 * FRAME_LEN {
        return Err(CryptoError::KeyMaterial(len));
    }

    let start = data1
        .char_indices()
        .nth(FRAME_LEN)
        .map(|(i, _)| i)
        .unwrap_or(data1.len());
    let end = data1
        .char_indices()
        .nth(len - FRAME_LEN)
        .map(|(i, _)| i)
        .unwrap_or(data1.len());
    Ok(&data1[start..end])
}

/// Derive the signaling path ending from the last 10 characters of `data1`.
///
/// The tail is split into pairs; the second character of each pair is mapped
/// through `A..J -> 0..9`. Characters outside the alphabet are skipped.
pub fn path_ending(data1: &str) -> String {
    let chars: Vec<char> = data1.chars().collect();
    let tail = &chars[chars.len().saturating_sub(FRAME_LEN)..];

    tail.chunks(2)
        .filter(|pair| pair.len() == 2)
        .filter_map(|pair| match PATH_ALPHABET.iter().position(|&c| c == pair[1]) {
            Some(index) => char::from_digit(index as u32, 10),
            None => {
                warn!("path ending character '{}' outside alphabet, skipped", pair[1]);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sample() {
        assert_eq!(path_ending("AABBCCDDEE"), "01234");
        assert_eq!(path_ending("JJJJJJJJJJ<key material>AABBCCDDEE"), "01234");
    }

    #[test]
    fn test_only_second_of_pair_counts() {
        assert_eq!(path_ending("ZJZIZHZGZF"), "98765");
    }

    #[test]
    fn test_stable_across_calls() {
        let data1 = "xxxxxxxxxxMIIBCgKCAQEAxyzBADCFEHGJI";
        let first = path_ending(data1);
        for _ in 0..10 {
            assert_eq!(path_ending(data1), first);
        }
        assert_eq!(first, "02468");
    }

    #[test]
    fn test_unknown_characters_skipped() {
        assert_eq!(path_ending("AAB9CCDzEE"), "024");
    }

    #[test]
    fn test_short_input() {
        assert_eq!(path_ending("AB"), "1");
        assert_eq!(path_ending("ABC"), "1");
        assert_eq!(path_ending(""), "");
    }

    #[test]
    fn test_public_key_segment() {
        assert_eq!(
            public_key_segment("JJJJJJJJJJc2VjcmV0AABBCCDDEE").unwrap(),
            "c2VjcmV0"
        );
        assert_eq!(public_key_segment("0123456789ABCDEFGHIJ").unwrap(), "");
        assert!(matches!(
            public_key_segment("too short"),
            Err(CryptoError::KeyMaterial(9))
        ));
    }
}
