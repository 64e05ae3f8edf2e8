//! BIP-340 Schnorr signing over event ids.
//!
//! The secp256k1 context lives inside [`Signer`] instead of a process-wide
//! static, so callers decide how many contexts exist and who shares them.

use std::fmt;

use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::{self, All, Keypair, Message, XOnlyPublicKey, schnorr};

use crate::error::{NostrError, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::nip01::{Event, EventBuilder, EventId, UnsignedEvent};

/// 64-byte Schnorr signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value)
            .map_err(|error| NostrError::InvalidEvent(format!("invalid sig hex: {error}")))?;
        let array: [u8; 64] = bytes
            .try_into()
            .map_err(|_| NostrError::InvalidEvent("signature must be 64 bytes".into()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

/// Key derivation, signing and verification bound to one secp256k1 context.
pub struct Signer {
    secp: Secp256k1<All>,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// x-only public key: the compressed point `sk * G` without its parity byte.
    pub fn derive_public_key(&self, key: &PrivateKey) -> Result<PublicKey> {
        let secret = key.secret_key()?;
        let compressed = secp256k1::PublicKey::from_secret_key(&self.secp, &secret).serialize();
        PublicKey::from_bytes(&compressed[1..33])
    }

    /// Derive from raw bytes, validating length and scalar range first.
    pub fn derive_public_key_from_slice(&self, bytes: &[u8]) -> Result<PublicKey> {
        self.derive_public_key(&PrivateKey::from_bytes(bytes)?)
    }

    /// Deterministic signature: the same key and id always give the same bytes.
    pub fn sign(&self, id: &EventId, key: &PrivateKey) -> Result<Signature> {
        let secret = key
            .secret_key()
            .map_err(|error| NostrError::SigningFailed(error.to_string()))?;
        let keypair = Keypair::from_secret_key(&self.secp, &secret);
        let message = Message::from_digest(*id.as_bytes());
        let signature = self.secp.sign_schnorr_no_aux_rand(&message, &keypair);
        Ok(Signature(signature.serialize()))
    }

    pub fn verify(&self, id: &EventId, signature: &Signature, public_key: &PublicKey) -> bool {
        let Ok(xonly) = XOnlyPublicKey::from_slice(public_key.as_bytes()) else {
            return false;
        };
        let Ok(signature) = schnorr::Signature::from_slice(signature.as_bytes()) else {
            return false;
        };
        let message = Message::from_digest(*id.as_bytes());
        self.secp.verify_schnorr(&signature, &message, &xonly).is_ok()
    }

    /// Assemble the wire event. The key must be the one the event was built for.
    pub fn finalize(&self, unsigned: UnsignedEvent, id: EventId, key: &PrivateKey) -> Result<Event> {
        let derived = self
            .derive_public_key(key)
            .map_err(|error| NostrError::SigningFailed(error.to_string()))?;
        if &derived != unsigned.pubkey() {
            return Err(NostrError::SigningFailed(
                "private key does not match event pubkey".into(),
            ));
        }
        if EventId::compute(&unsigned)? != id {
            return Err(NostrError::InvalidEvent(
                "event id does not match event fields".into(),
            ));
        }

        let signature = self.sign(&id, key)?;
        Ok(Event {
            id: id.to_hex(),
            pubkey: unsigned.pubkey().to_hex(),
            created_at: unsigned.created_at(),
            kind: unsigned.kind(),
            tags: unsigned.tags().to_vec(),
            content: unsigned.content().to_string(),
            sig: signature.to_hex(),
        })
    }

    /// Build and sign a kind-1 note in one step.
    pub fn sign_text_note(&self, content: &str, key: &PrivateKey, created_at: u64) -> Result<Event> {
        let public_key = self.derive_public_key(key)?;
        let (unsigned, id) = EventBuilder::text_note(content)
            .created_at(created_at)
            .build(public_key.as_bytes())?;
        self.finalize(unsigned, id, key)
    }

    /// Recompute the id from the event fields and check the signature.
    pub fn verify_event(&self, event: &Event) -> Result<bool> {
        let unsigned = event.unsigned()?;
        let id = event.event_id()?;
        if EventId::compute(&unsigned)? != id {
            return Ok(false);
        }
        let signature = Signature::from_hex(&event.sig)?;
        Ok(self.verify(&id, &signature, unsigned.pubkey()))
    }
}
