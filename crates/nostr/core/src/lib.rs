//! Nostr primitives needed to publish a text note: keys, NIP-01 event ids,
//! Schnorr signing and NIP-19 key encodings.

mod error;
pub mod keys;
pub mod nip01;
pub mod nip19;
pub mod signer;

pub use error::{NostrError, Result};
pub use keys::{PrivateKey, PublicKey};
pub use nip01::{
    Event, EventBuilder, EventId, KIND_SHORT_TEXT_NOTE, UnsignedEvent, build_text_note,
    now_unix_seconds, serialize_event,
};
pub use signer::{Signature, Signer};
