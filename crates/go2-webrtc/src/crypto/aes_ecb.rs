// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AES-ECB with PKCS#7 padding, base64 framed.
//!
//! The key is passed as a string and its ASCII bytes are the raw AES key,
//! which is how the robot firmware consumes it. There is no IV.

use super::CryptoError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Length of keys produced by [`generate_key`] (ASCII characters = key bytes).
pub const AES_KEY_LEN: usize = 32;

const BLOCK_SIZE: usize = 16;

/// Generate a fresh session key: 32 lowercase hex characters.
pub fn generate_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Encrypt `plaintext` under `key` and return the base64 ciphertext.
pub fn encrypt(plaintext: &str, key: &str) -> Result<String, CryptoError> {
    let key = key.as_bytes();
    let data = plaintext.as_bytes();
    let bad_key = |_| CryptoError::KeyLength(key.len());

    let ciphertext = match key.len() {
        16 => ecb::Encryptor::<aes::Aes128>::new_from_slice(key)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        24 => ecb::Encryptor::<aes::Aes192>::new_from_slice(key)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        32 => ecb::Encryptor::<aes::Aes256>::new_from_slice(key)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        n => return Err(CryptoError::KeyLength(n)),
    };

    Ok(STANDARD.encode(ciphertext))
}

/// Decrypt a base64 ciphertext produced by [`encrypt`] (or by the robot).
pub fn decrypt(ciphertext_b64: &str, key: &str) -> Result<String, CryptoError> {
    let key = key.as_bytes();
    let ciphertext = STANDARD.decode(ciphertext_b64.trim())?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::BlockLength(ciphertext.len()));
    }
    let bad_key = |_| CryptoError::KeyLength(key.len());

    let plain = match key.len() {
        16 => ecb::Decryptor::<aes::Aes128>::new_from_slice(key)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
        24 => ecb::Decryptor::<aes::Aes192>::new_from_slice(key)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
        32 => ecb::Decryptor::<aes::Aes256>::new_from_slice(key)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
        n => return Err(CryptoError::KeyLength(n)),
    }
    .map_err(|_| CryptoError::Padding)?;

    Ok(std::str::from_utf8(&plain)?.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), AES_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(encrypt("hello go2", KEY).unwrap(), "YyU/7OwFjuWfp3UTcNjROQ==");
        assert_eq!(decrypt("YyU/7OwFjuWfp3UTcNjROQ==", KEY).unwrap(), "hello go2");
    }

    #[test]
    fn test_block_multiple_gets_full_padding_block() {
        let plaintext = "0123456789abcdef";
        let ciphertext = encrypt(plaintext, KEY).unwrap();
        assert_eq!(ciphertext, "+DyaYNwM25ghn3nW1dsWNYqjYkH96N8FTcMlxsaVuJ4=");
        assert_eq!(STANDARD.decode(&ciphertext).unwrap().len(), 32);
        assert_eq!(decrypt(&ciphertext, KEY).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_lengths_and_keys() {
        let mut rng = fastrand::Rng::with_seed(0x60_2);
        let alphabet: Vec<char> = "aZ0 {}\":,é漢🤖".chars().collect();
        for key in ["0123456789abcdef", "0123456789abcdef01234567", KEY] {
            for len in [0usize, 1, 15, 16, 17, 31, 32, 33, 64, 200] {
                let plaintext: String = (0..len)
                    .map(|_| alphabet[rng.usize(..alphabet.len())])
                    .collect();
                let ciphertext = encrypt(&plaintext, key).unwrap();
                assert_eq!(decrypt(&ciphertext, key).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(encrypt("x", "short"), Err(CryptoError::KeyLength(5))));
        assert!(matches!(
            decrypt("YyU/7OwFjuWfp3UTcNjROQ==", "short"),
            Err(CryptoError::KeyLength(5))
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let ciphertext = encrypt("{\"sdp\":\"v=0\"}", KEY).unwrap();
        let other = "fedcba9876543210fedcba9876543210";
        // Wrong key either breaks the padding or yields garbage.
        match decrypt(&ciphertext, other) {
            Ok(plain) => assert_ne!(plain, "{\"sdp\":\"v=0\"}"),
            Err(_) => {}
        }
    }

    #[test]
    fn test_truncated_ciphertext() {
        let truncated = STANDARD.encode([0u8; 15]);
        assert!(matches!(
            decrypt(&truncated, KEY),
            Err(CryptoError::BlockLength(15))
        ));
        assert!(matches!(decrypt("not base64!", KEY), Err(CryptoError::Base64(_))));
    }
}
