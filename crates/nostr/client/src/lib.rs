//! Minimal Nostr relay publish transport.
//!
//! This crate exposes a small surface:
//! - one-shot relay sessions over WebSocket
//! - first-acknowledgment publish fan-out across relays

pub mod coordinator;
pub mod error;
pub mod message;
pub mod relay;

pub use coordinator::{
    Acceptance, CoordinatorConfig, PublishAttempt, PublishCoordinator, PublishOutcome, RelayOutcome,
};
pub use error::{ClientError, Result};
pub use message::{RelayMessage, client_event_message, parse_relay_message};
pub use relay::{
    AttemptId, CloseReason, RelayConfig, RelayEndpoint, RelaySession, SessionOutcome,
    SessionReport, SessionState,
};
