//! Key material: the 32-byte secp256k1 secret scalar and the x-only public key.
//!
//! A [`PrivateKey`] is only ever constructed from bytes that form a valid
//! scalar in `[1, n)`, so every later use (derivation, signing) can rely on it.
//! The secret bytes are wiped on drop and never appear in `Debug` output.

use std::fmt;

use bitcoin::secp256k1::SecretKey;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{NostrError, Result};
use crate::nip19;

pub const KEY_LEN: usize = 32;

const MAX_GENERATE_ATTEMPTS: usize = 64;

/// Secret signing scalar.
pub struct PrivateKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl PrivateKey {
    /// Validate raw bytes as a secp256k1 secret scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(NostrError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        SecretKey::from_slice(bytes)
            .map_err(|_| NostrError::InvalidKey("scalar is zero or not below curve order".into()))?;

        let mut owned = Zeroizing::new([0u8; KEY_LEN]);
        owned.copy_from_slice(bytes);
        Ok(Self { bytes: owned })
    }

    /// Decode a 64-character hex secret.
    pub fn from_hex(value: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            hex::decode(value.trim())
                .map_err(|error| NostrError::InvalidKey(format!("invalid hex: {error}")))?,
        );
        Self::from_bytes(&decoded)
    }

    /// Decode a NIP-19 `nsec1...` secret.
    pub fn from_nsec(value: &str) -> Result<Self> {
        let mut decoded = nip19::decode_nsec(value)?;
        let key = Self::from_bytes(&decoded);
        decoded.zeroize();
        key
    }

    /// Accept either encoding; `nsec1` selects bech32, anything else is hex.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(NostrError::InvalidKey("private key is empty".into()));
        }
        if trimmed.starts_with(nip19::NSEC_PREFIX) {
            Self::from_nsec(trimmed)
        } else {
            Self::from_hex(trimmed)
        }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Result<Self> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let mut candidate: [u8; KEY_LEN] = rand::random();
            let key = Self::from_bytes(&candidate);
            candidate.zeroize();
            if key.is_ok() {
                return key;
            }
        }
        Err(NostrError::InvalidKey(format!(
            "failed to generate a valid key after {MAX_GENERATE_ATTEMPTS} attempts"
        )))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub(crate) fn secret_key(&self) -> Result<SecretKey> {
        SecretKey::from_slice(self.bytes.as_slice())
            .map_err(|error| NostrError::InvalidKey(error.to_string()))
    }

    /// Export as lowercase hex. Callers own the returned secret.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes.as_slice())
    }

    pub fn to_nsec(&self) -> Result<String> {
        nip19::encode_nsec(&self.bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// 32-byte x-only public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            NostrError::InvalidKey(format!(
                "public key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let decoded = hex::decode(value.trim())
            .map_err(|error| NostrError::InvalidKey(format!("invalid hex: {error}")))?;
        Self::from_bytes(&decoded)
    }

    pub fn from_npub(value: &str) -> Result<Self> {
        let decoded = nip19::decode_npub(value)?;
        Self::from_bytes(&decoded)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_npub(&self) -> Result<String> {
        nip19::encode_npub(&self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}
