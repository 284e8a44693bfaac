//! Envelope crypto for the remote blob.
//!
//! `base64( iv[16] || AES-256-GCM( lzutf8(plaintext) ) )`, keyed by a
//! PBKDF2-SHA256 derivation of the user's password salted with the sync id.

use crate::error::CryptoError;
use crate::lzutf8;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const PBKDF2_ROUNDS: u32 = 250_000;

// decompressed plaintext ceiling
const MAX_PLAINTEXT: usize = 64 * 1024 * 1024;

type Cipher = AesGcm<Aes256, U16>;

/// 256-bit symmetric key. Wiped on drop, never printed.
#[derive(Clone)]
pub struct SyncKey(Zeroizing<[u8; KEY_LEN]>);

impl SyncKey {
    /// PBKDF2-HMAC-SHA256 over the password, salted with the sync id.
    /// CPU-heavy; call through `spawn_blocking` from async code.
    pub fn derive(password: &str, sync_id: &str) -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), sync_id.as_bytes(), PBKDF2_ROUNDS, &mut key[..]);
        SyncKey(key)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        SyncKey(Zeroizing::new(bytes))
    }

    /// Parse the stored credential form of a key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(
            general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("base64: {}", e)))?,
        );
        let bytes: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, raw.len())))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.0[..])
    }

    fn cipher(&self) -> Result<Cipher, CryptoError> {
        Cipher::new_from_slice(&self.0[..]).map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl PartialEq for SyncKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SyncKey {}

impl fmt::Debug for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SyncKey(..)")
    }
}

/// Compress, encrypt under a fresh IV, and base64 the result.
pub fn encrypt(key: &SyncKey, plaintext: &str) -> Result<String, CryptoError> {
    let compressed = lzutf8::compress(plaintext);

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill(&mut iv);

    let sealed = key
        .cipher()?
        .encrypt(GenericArray::from_slice(&iv), compressed.as_slice())
        .map_err(|_| CryptoError::Encryption)?;

    let mut envelope = Vec::with_capacity(IV_LEN + sealed.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&sealed);
    Ok(general_purpose::STANDARD.encode(envelope))
}

/// Inverse of [`encrypt`]. A tag mismatch (wrong key or tampering) is
/// reported as [`CryptoError::AuthenticationFailure`].
pub fn decrypt(key: &SyncKey, envelope: &str) -> Result<Vec<u8>, CryptoError> {
    let raw = general_purpose::STANDARD
        .decode(envelope.trim())
        .map_err(|e| CryptoError::Decryption(format!("base64: {}", e)))?;
    // iv plus at least the 16-byte tag
    if raw.len() < IV_LEN + 16 {
        return Err(CryptoError::Decryption(format!("envelope too short: {} bytes", raw.len())));
    }
    let (iv, sealed) = raw.split_at(IV_LEN);

    let compressed = key
        .cipher()?
        .decrypt(GenericArray::from_slice(iv), sealed)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    lzutf8::decompress(&compressed, MAX_PLAINTEXT).map_err(|e| CryptoError::Decryption(format!("lzutf8: {}", e)))
}
