//! Relay wire messages used by the publish flow.
//!
//! Outbound we only ever send `["EVENT", <event>]`. Inbound, `OK` and `NOTICE`
//! are interpreted; every other frame kind parses to `None` and is ignored.

use crate::error::{ClientError, Result};
use nostr::Event;
use serde_json::Value;

/// Message received from a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    Notice(String),
}

/// Frame an event as a client `EVENT` message.
///
/// Serialized from a tuple rather than a `Value` so the event object keeps
/// its declared field order.
pub fn client_event_message(event: &Event) -> Result<String> {
    Ok(serde_json::to_string(&("EVENT", event))?)
}

/// Parse relay protocol JSON text message into typed relay message.
pub fn parse_relay_message(text: &str) -> Result<Option<RelayMessage>> {
    let value: Value = serde_json::from_str(text)?;
    let array = value
        .as_array()
        .ok_or_else(|| ClientError::Protocol("expected JSON array relay message".to_string()))?;
    if array.is_empty() {
        return Ok(None);
    }

    let kind = array[0]
        .as_str()
        .ok_or_else(|| ClientError::Protocol("missing relay message kind".to_string()))?;

    match kind {
        "OK" => {
            if array.len() < 3 {
                return Err(ClientError::Protocol("invalid OK message".to_string()));
            }
            let event_id = array[1]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid OK event id".to_string()))?
                .to_string();
            let accepted = array[2]
                .as_bool()
                .ok_or_else(|| ClientError::Protocol("invalid OK accepted flag".to_string()))?;
            let message = match array.get(3) {
                None => String::new(),
                Some(text) => text
                    .as_str()
                    .ok_or_else(|| ClientError::Protocol("invalid OK message text".to_string()))?
                    .to_string(),
            };
            Ok(Some(RelayMessage::Ok {
                event_id,
                accepted,
                message,
            }))
        }
        "NOTICE" => {
            if array.len() < 2 {
                return Err(ClientError::Protocol("invalid NOTICE message".to_string()));
            }
            let message = array[1]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid NOTICE message text".to_string()))?
                .to_string();
            Ok(Some(RelayMessage::Notice(message)))
        }
        _ => Ok(None),
    }
}
