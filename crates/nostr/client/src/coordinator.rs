//! First-acknowledgment publish fan-out.
//!
//! One attempt opens a session per endpoint and resolves exactly once: on the
//! first relay acceptance, when every relay has failed, or when the deadline
//! passes. Only one attempt may be in flight per coordinator.

use crate::error::{ClientError, Result};
use crate::relay::{
    AttemptId, RelayConfig, RelayEndpoint, RelaySession, SessionOutcome, SessionReport,
};
use nostr::{Event, PrivateKey, Signer, now_unix_seconds};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum number of endpoints accepted for one attempt.
    pub max_relays: usize,
    /// Configuration applied to every relay session.
    pub relay_config: RelayConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_relays: 16,
            relay_config: RelayConfig::default(),
        }
    }
}

/// The relay whose acknowledgment completed an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    pub attempt_id: AttemptId,
    pub relay_url: String,
    pub event_id: String,
    pub message: String,
}

/// Flattened result handed to callers that only need success and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<Result<Acceptance>> for PublishOutcome {
    fn from(result: Result<Acceptance>) -> Self {
        match result {
            Ok(_) => Self::succeeded(),
            Err(error) => Self::failed(error.to_string()),
        }
    }
}

/// Per-relay outcome recorded on an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Accepted,
    Rejected(String),
    Failed(String),
}

/// Bookkeeping for one publish attempt.
#[derive(Debug)]
pub struct PublishAttempt {
    attempt_id: AttemptId,
    event: Arc<Event>,
    endpoints: Vec<RelayEndpoint>,
    outcomes: HashMap<RelayEndpoint, RelayOutcome>,
    last_rejection: Option<String>,
    last_error: Option<ClientError>,
    completed: bool,
}

impl PublishAttempt {
    /// Start an attempt. Duplicate endpoints collapse to one session.
    pub fn new(event: Arc<Event>, endpoints: &[RelayEndpoint]) -> Self {
        let mut unique: Vec<RelayEndpoint> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if !unique.contains(endpoint) {
                unique.push(endpoint.clone());
            }
        }

        Self {
            attempt_id: Uuid::new_v4(),
            event,
            endpoints: unique,
            outcomes: HashMap::new(),
            last_rejection: None,
            last_error: None,
            completed: false,
        }
    }

    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    pub fn endpoints(&self) -> &[RelayEndpoint] {
        &self.endpoints
    }

    pub fn outcomes(&self) -> &HashMap<RelayEndpoint, RelayOutcome> {
        &self.outcomes
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Record a session report. Returns the acceptance if this report completes
    /// the attempt successfully.
    pub fn record(&mut self, report: SessionReport) -> Option<Acceptance> {
        if self.completed {
            debug!("ignoring report from {} after completion", report.relay_url);
            return None;
        }
        if report.attempt_id != self.attempt_id {
            warn!(
                "ignoring report for foreign attempt {} from {}",
                report.attempt_id, report.relay_url
            );
            return None;
        }

        match report.outcome {
            SessionOutcome::Accepted { message } => {
                self.outcomes
                    .insert(report.relay_url.clone(), RelayOutcome::Accepted);
                self.completed = true;
                Some(Acceptance {
                    attempt_id: self.attempt_id,
                    relay_url: report.relay_url,
                    event_id: self.event.id.clone(),
                    message,
                })
            }
            SessionOutcome::Rejected { reason } => {
                self.outcomes
                    .insert(report.relay_url, RelayOutcome::Rejected(reason.clone()));
                self.last_rejection = Some(reason);
                None
            }
            SessionOutcome::Failed(error) => {
                self.outcomes
                    .insert(report.relay_url, RelayOutcome::Failed(error.to_string()));
                self.last_error = Some(error);
                None
            }
        }
    }

    /// Every endpoint has reported and none accepted.
    pub fn all_failed(&self) -> bool {
        !self.completed
            && self.outcomes.len() >= self.endpoints.len()
            && !self
                .outcomes
                .values()
                .any(|outcome| *outcome == RelayOutcome::Accepted)
    }

    /// Close the attempt and produce the failure to report.
    ///
    /// A relay rejection wins over a transport error.
    pub fn fail(&mut self) -> ClientError {
        self.completed = true;
        if let Some(reason) = self.last_rejection.take() {
            return ClientError::RelayRejected(reason);
        }
        self.last_error
            .take()
            .unwrap_or_else(|| ClientError::Connection("no relay acknowledged the event".to_string()))
    }

    /// Close the attempt on deadline.
    pub fn expire(&mut self, timeout: Duration) -> ClientError {
        self.completed = true;
        ClientError::Timeout(format!(
            "no relay acknowledged event {} within {:?}",
            self.event.id, timeout
        ))
    }
}

/// Publishes one event at a time to a set of relays.
pub struct PublishCoordinator {
    config: CoordinatorConfig,
    signer: Signer,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for PublishCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl PublishCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            signer: Signer::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Whether an attempt is currently running.
    pub fn is_publishing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Sign a text note and publish it.
    ///
    /// Key and signing errors are returned before any relay is contacted.
    pub async fn publish_note(
        &self,
        private_key: &str,
        content: &str,
        endpoints: &[RelayEndpoint],
        timeout: Duration,
    ) -> Result<Acceptance> {
        let guard = self.begin()?;
        let event = {
            let key = PrivateKey::parse(private_key)?;
            self.signer
                .sign_text_note(content, &key, now_unix_seconds())?
        };
        self.run_attempt(guard, Arc::new(event), endpoints, timeout)
            .await
    }

    /// Publish an already signed event.
    pub async fn publish_event(
        &self,
        event: Arc<Event>,
        endpoints: &[RelayEndpoint],
        timeout: Duration,
    ) -> Result<Acceptance> {
        let guard = self.begin()?;
        self.run_attempt(guard, event, endpoints, timeout).await
    }

    /// Like [`Self::publish_event`], flattened to a [`PublishOutcome`].
    pub async fn publish(
        &self,
        event: Arc<Event>,
        endpoints: &[RelayEndpoint],
        timeout: Duration,
    ) -> PublishOutcome {
        self.publish_event(event, endpoints, timeout).await.into()
    }

    fn begin(&self) -> Result<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::PublishInProgress)?;
        Ok(InFlightGuard(&self.in_flight))
    }

    async fn run_attempt(
        &self,
        _guard: InFlightGuard<'_>,
        event: Arc<Event>,
        endpoints: &[RelayEndpoint],
        timeout: Duration,
    ) -> Result<Acceptance> {
        if endpoints.is_empty() {
            return Err(ClientError::InvalidRequest(
                "no relay endpoints provided".to_string(),
            ));
        }

        let mut attempt = PublishAttempt::new(event, endpoints);
        if attempt.endpoints().len() > self.config.max_relays {
            return Err(ClientError::InvalidRequest(format!(
                "maximum relay limit ({}) exceeded: {}",
                self.config.max_relays,
                attempt.endpoints().len()
            )));
        }

        let span = info_span!(
            "publish",
            attempt_id = %attempt.attempt_id(),
            event_id = %attempt.event.id,
            relays = attempt.endpoints().len()
        );
        self.drive(&mut attempt, timeout).instrument(span).await
    }

    async fn drive(&self, attempt: &mut PublishAttempt, timeout: Duration) -> Result<Acceptance> {
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut sessions = JoinSet::new();

        let attempt_id = attempt.attempt_id();
        for endpoint in attempt.endpoints().to_vec() {
            match RelaySession::new(&endpoint, self.config.relay_config.clone(), attempt_id) {
                Ok(session) => {
                    sessions.spawn(
                        session
                            .run(attempt.event.clone(), report_tx.clone(), cancel_rx.clone())
                            .in_current_span(),
                    );
                }
                Err(error) => {
                    warn!("skipping relay {}: {}", endpoint, error);
                    attempt.record(SessionReport {
                        attempt_id,
                        relay_url: endpoint,
                        outcome: SessionOutcome::Failed(error),
                    });
                }
            }
        }
        drop(report_tx);
        info!("publishing to {} relays", sessions.len());

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let result = loop {
            if attempt.all_failed() {
                break Err(attempt.fail());
            }

            tokio::select! {
                biased;
                report = report_rx.recv() => match report {
                    Some(report) => {
                        if let Some(acceptance) = attempt.record(report) {
                            break Ok(acceptance);
                        }
                    }
                    None => break Err(attempt.fail()),
                },
                () = &mut deadline => break Err(attempt.expire(timeout)),
            }
        };

        if cancel_tx.send(true).is_err() {
            debug!("all relay sessions already finished");
        }
        sessions.detach_all();

        match &result {
            Ok(acceptance) => info!("event accepted by {}", acceptance.relay_url),
            Err(error) => warn!(
                "publish failed after {} of {} relay outcomes: {}",
                attempt.outcomes().len(),
                attempt.endpoints().len(),
                error
            ),
        }
        result
    }
}
