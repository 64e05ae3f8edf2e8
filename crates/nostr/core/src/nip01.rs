//! NIP-01: event structure, canonical serialization and event ids.
//!
//! The event id is the SHA-256 of the compact JSON array
//! `[0, pubkey, created_at, kind, tags, content]`. Relays recompute it byte for
//! byte, so the serialization here must not add whitespace or reorder fields.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{NostrError, Result};
use crate::keys::PublicKey;

pub const KIND_SHORT_TEXT_NOTE: u16 = 1;

/// A signed Nostr event in its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-bytes lowercase hex-encoded sha256 of the serialized event data
    pub id: String,
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// 64-bytes lowercase hex signature
    pub sig: String,
}

impl Event {
    pub fn event_id(&self) -> Result<EventId> {
        EventId::from_hex(&self.id)
    }

    /// The unsigned fields this event claims to sign over.
    pub fn unsigned(&self) -> Result<UnsignedEvent> {
        Ok(UnsignedEvent {
            pubkey: PublicKey::from_hex(&self.pubkey)?,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        })
    }
}

/// Event fields before signing.
///
/// There are no setters: the id is derived from these fields, so an
/// `UnsignedEvent` is rebuilt through [`EventBuilder`] rather than edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pubkey: PublicKey,
    created_at: u64,
    kind: u16,
    tags: Vec<Vec<String>>,
    content: String,
}

impl UnsignedEvent {
    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn kind(&self) -> u16 {
        self.kind
    }

    pub fn tags(&self) -> &[Vec<String>] {
        &self.tags
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Content-addressed event identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId([u8; 32]);

impl EventId {
    pub fn compute(event: &UnsignedEvent) -> Result<Self> {
        let serialized = serialize_event(event)?;
        Ok(Self(Sha256::digest(serialized.as_bytes()).into()))
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value)
            .map_err(|error| NostrError::InvalidEvent(format!("invalid id hex: {error}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| NostrError::InvalidEvent("event id must be 32 bytes".into()))?;
        Ok(Self(array))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.to_hex())
    }
}

/// Builds text-note events.
///
/// `created_at` defaults to the current time; tests pin it for stable ids.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    content: String,
    created_at: Option<u64>,
}

impl EventBuilder {
    pub fn text_note(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            created_at: None,
        }
    }

    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Produce the unsigned event and its id for the given x-only public key.
    pub fn build(self, public_key: &[u8]) -> Result<(UnsignedEvent, EventId)> {
        let pubkey = PublicKey::from_bytes(public_key)?;
        let unsigned = UnsignedEvent {
            pubkey,
            created_at: self.created_at.unwrap_or_else(now_unix_seconds),
            kind: KIND_SHORT_TEXT_NOTE,
            tags: Vec::new(),
            content: self.content,
        };
        let id = EventId::compute(&unsigned)?;
        Ok((unsigned, id))
    }
}

/// Build a text note with an explicit timestamp.
pub fn build_text_note(
    content: &str,
    public_key: &[u8],
    created_at: u64,
) -> Result<(UnsignedEvent, EventId)> {
    EventBuilder::text_note(content)
        .created_at(created_at)
        .build(public_key)
}

/// Serialize an unsigned event for hashing.
///
/// Format: `[0,"<pubkey>",<created_at>,<kind>,<tags>,"<content>"]`
pub fn serialize_event(event: &UnsignedEvent) -> Result<String> {
    Ok(serde_json::to_string(&(
        0,
        event.pubkey.to_hex(),
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    ))?)
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
