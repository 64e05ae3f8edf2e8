//! Single relay session for one publish attempt.
//!
//! A session walks `Idle -> Connecting -> Open -> Sending -> AwaitingAck` and
//! ends in `Closed` or `Errored`. It is bound to one endpoint for its whole
//! life and sends the event at most once.

use crate::error::{ClientError, Result};
use crate::message::{RelayMessage, client_event_message, parse_relay_message};
use futures_util::{SinkExt, StreamExt};
use nostr::Event;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Identifier shared by every session of one publish attempt.
pub type AttemptId = Uuid;

/// Relay address as supplied by the caller, e.g. `wss://relay.damus.io`.
pub type RelayEndpoint = String;

/// Why a session reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Accepted(String),
    Rejected(String),
    Cancelled,
}

/// Session lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Sending,
    AwaitingAck,
    Closed(CloseReason),
    Errored(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed(_) | Self::Errored(_))
    }
}

/// Terminal result of driving a session, as seen by the coordinator.
#[derive(Debug)]
pub enum SessionOutcome {
    Accepted { message: String },
    Rejected { reason: String },
    Failed(ClientError),
}

/// Report sent from a session task to the coordinator that owns the attempt.
#[derive(Debug)]
pub struct SessionReport {
    pub attempt_id: AttemptId,
    pub relay_url: RelayEndpoint,
    pub outcome: SessionOutcome,
}

/// Relay session configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// One connection to one relay for one attempt.
pub struct RelaySession {
    endpoint: RelayEndpoint,
    url: Url,
    config: RelayConfig,
    attempt_id: AttemptId,
    state: SessionState,
    stream: Option<WsStream>,
    sent_event_id: Option<String>,
}

impl RelaySession {
    /// Create a session; only `ws://` and `wss://` endpoints are accepted.
    pub fn new(url: &str, config: RelayConfig, attempt_id: AttemptId) -> Result<Self> {
        let parsed_url = Url::parse(url)?;
        if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                parsed_url.scheme()
            )));
        }

        Ok(Self {
            endpoint: url.to_string(),
            url: parsed_url,
            config,
            attempt_id,
            state: SessionState::Idle,
            stream: None,
            sent_event_id: None,
        })
    }

    /// Relay URL as string.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Endpoint exactly as the caller supplied it.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Connect to the relay.
    pub async fn open(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(ClientError::InvalidRequest(format!(
                "cannot open session in state {:?}",
                self.state
            )));
        }
        self.state = SessionState::Connecting;
        if self.url.scheme() == "wss" {
            install_crypto_provider();
        }
        debug!("connecting to {}", self.url);

        let attempt = timeout(self.config.connect_timeout, connect_async(self.url.as_str())).await;
        let connected = match attempt {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(error)) => {
                return Err(self.fail(ClientError::Connection(error.to_string())));
            }
            Err(_) => {
                return Err(self.fail(ClientError::Timeout(format!(
                    "connection timeout after {:?}",
                    self.config.connect_timeout
                ))));
            }
        };

        self.stream = Some(connected);
        self.state = SessionState::Open;
        debug!("connected to {}", self.url);
        Ok(())
    }

    /// Send the event exactly once.
    pub async fn publish(&mut self, event: &Event) -> Result<()> {
        if self.sent_event_id.is_some() {
            return Err(ClientError::Protocol(
                "event already sent on this session".to_string(),
            ));
        }
        if self.state != SessionState::Open {
            return Err(ClientError::NotConnected);
        }

        let text = client_event_message(event)?;
        self.state = SessionState::Sending;
        let sent = match self.stream.as_mut() {
            Some(stream) => stream
                .send(Message::Text(text.into()))
                .await
                .map_err(|error| ClientError::WebSocket(error.to_string())),
            None => Err(ClientError::NotConnected),
        };
        if let Err(error) = sent {
            return Err(self.fail(error));
        }

        self.sent_event_id = Some(event.id.clone());
        self.state = SessionState::AwaitingAck;
        debug!("sent event {} to {}", event.id, self.url);
        Ok(())
    }

    /// Read frames until the relay answers for the sent event or the transport ends.
    pub async fn await_ack(&mut self) -> SessionOutcome {
        let Some(expected_id) = self.sent_event_id.clone() else {
            return SessionOutcome::Failed(ClientError::InvalidRequest(
                "no event awaiting acknowledgment".to_string(),
            ));
        };
        if self.state != SessionState::AwaitingAck {
            return SessionOutcome::Failed(ClientError::InvalidRequest(format!(
                "cannot await acknowledgment in state {:?}",
                self.state
            )));
        }

        loop {
            let frame = match self.stream.as_mut() {
                Some(stream) => stream.next().await,
                None => None,
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    let error = ClientError::Connection(
                        "relay closed connection before acknowledging event".to_string(),
                    );
                    return SessionOutcome::Failed(self.fail(error));
                }
                Some(Ok(_)) => continue,
                Some(Err(error)) => {
                    warn!("websocket read error on {}: {}", self.url, error);
                    let error = ClientError::WebSocket(error.to_string());
                    return SessionOutcome::Failed(self.fail(error));
                }
            };

            match parse_relay_message(text.as_str()) {
                Ok(Some(RelayMessage::Ok {
                    event_id,
                    accepted,
                    message,
                })) if event_id == expected_id => {
                    if accepted {
                        info!("relay {} accepted event {}", self.url, event_id);
                        self.state = SessionState::Closed(CloseReason::Accepted(message.clone()));
                        return SessionOutcome::Accepted { message };
                    }
                    info!("relay {} rejected event {}: {}", self.url, event_id, message);
                    self.state = SessionState::Closed(CloseReason::Rejected(message.clone()));
                    return SessionOutcome::Rejected { reason: message };
                }
                Ok(Some(RelayMessage::Ok { event_id, .. })) => {
                    debug!("ignoring OK for unrelated event {} on {}", event_id, self.url);
                }
                Ok(Some(RelayMessage::Notice(notice))) => {
                    info!("notice from {}: {}", self.url, notice);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!("protocol parse error on {}: {}", self.url, error);
                }
            }
        }
    }

    /// Close the transport. Frames that arrive afterwards are discarded.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if timeout(CLOSE_TIMEOUT, stream.close(None)).await.is_err() {
                debug!("close handshake with {} timed out", self.url);
            }
        }
        if !self.state.is_terminal() {
            self.state = SessionState::Closed(CloseReason::Cancelled);
        }
    }

    /// Drive the full lifecycle and report the outcome once.
    ///
    /// If `cancel` flips to `true` (or its sender is dropped) the session is
    /// force-closed and nothing is reported.
    pub async fn run(
        mut self,
        event: Arc<Event>,
        reports: mpsc::UnboundedSender<SessionReport>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let outcome = tokio::select! {
            outcome = self.drive(&event) => Some(outcome),
            () = cancelled(&mut cancel) => None,
        };

        match outcome {
            Some(outcome) => {
                let report = SessionReport {
                    attempt_id: self.attempt_id,
                    relay_url: self.endpoint.clone(),
                    outcome,
                };
                if reports.send(report).is_err() {
                    debug!("attempt {} already finished; dropping report", self.attempt_id);
                }
            }
            None => debug!("session to {} cancelled", self.url),
        }

        self.close().await;
    }

    async fn drive(&mut self, event: &Event) -> SessionOutcome {
        if let Err(error) = self.open().await {
            return SessionOutcome::Failed(error);
        }
        if let Err(error) = self.publish(event).await {
            return SessionOutcome::Failed(error);
        }
        self.await_ack().await
    }

    fn fail(&mut self, error: ClientError) -> ClientError {
        warn!("relay session {} failed: {}", self.url, error);
        self.state = SessionState::Errored(error.to_string());
        self.stream = None;
        error
    }
}

/// rustls needs a process-wide provider before the first TLS handshake.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }
    });
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            return;
        }
    }
}
