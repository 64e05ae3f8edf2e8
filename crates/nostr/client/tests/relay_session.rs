//! Session lifecycle against in-process relays.

mod support;

use nostr_client::{
    ClientError, CloseReason, RelayConfig, RelaySession, SessionOutcome, SessionState,
};
use std::time::Duration;
use tokio::net::TcpListener;
use support::{Behavior, MockRelay, closed_endpoint, signed_note};
use uuid::Uuid;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn session(url: &str) -> Result<RelaySession, ClientError> {
    RelaySession::new(
        url,
        RelayConfig {
            connect_timeout: Duration::from_secs(2),
        },
        Uuid::new_v4(),
    )
}

#[tokio::test]
async fn accepted_event_walks_every_state() -> TestResult {
    let relay = MockRelay::spawn(Behavior::accept()).await?;
    let event = signed_note("hello")?;
    let mut session = session(&relay.url)?;
    assert_eq!(session.state(), &SessionState::Idle);

    session.open().await?;
    assert_eq!(session.state(), &SessionState::Open);

    session.publish(&event).await?;
    assert_eq!(session.state(), &SessionState::AwaitingAck);

    let outcome = session.await_ack().await;
    assert!(matches!(outcome, SessionOutcome::Accepted { .. }));
    assert_eq!(
        session.state(),
        &SessionState::Closed(CloseReason::Accepted(String::new()))
    );

    session.close().await;
    assert!(session.state().is_terminal());

    let frames = relay.received().await;
    assert_eq!(frames.len(), 1);
    assert!(frames[0].starts_with(r#"["EVENT",{"id":""#));
    Ok(())
}

#[tokio::test]
async fn rejection_carries_relay_reason() -> TestResult {
    let relay = MockRelay::spawn(Behavior::reject("blocked: spam")).await?;
    let event = signed_note("hello")?;
    let mut session = session(&relay.url)?;

    session.open().await?;
    session.publish(&event).await?;
    let outcome = session.await_ack().await;

    assert!(matches!(outcome, SessionOutcome::Rejected { ref reason } if reason == "blocked: spam"));
    assert_eq!(
        session.state(),
        &SessionState::Closed(CloseReason::Rejected("blocked: spam".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn notices_and_unrelated_frames_are_skipped() -> TestResult {
    let relay = MockRelay::spawn(Behavior::Chatty).await?;
    let event = signed_note("hello")?;
    let mut session = session(&relay.url)?;

    session.open().await?;
    session.publish(&event).await?;
    let outcome = session.await_ack().await;

    assert!(matches!(outcome, SessionOutcome::Accepted { ref message } if message == "stored"));
    Ok(())
}

#[tokio::test]
async fn hangup_before_ack_is_an_error() -> TestResult {
    let relay = MockRelay::spawn(Behavior::Hangup).await?;
    let event = signed_note("hello")?;
    let mut session = session(&relay.url)?;

    session.open().await?;
    session.publish(&event).await?;
    let outcome = session.await_ack().await;

    assert!(matches!(outcome, SessionOutcome::Failed(_)));
    assert!(matches!(session.state(), SessionState::Errored(_)));
    Ok(())
}

#[tokio::test]
async fn refused_connection_is_an_error() -> TestResult {
    let mut session = session(&closed_endpoint().await?)?;
    let result = session.open().await;

    assert!(matches!(result, Err(ClientError::Connection(_))));
    assert!(matches!(session.state(), SessionState::Errored(_)));
    Ok(())
}

#[tokio::test]
async fn secure_endpoint_attempts_tls_handshake() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let mut session = session(&format!("wss://{addr}"))?;
    let result = session.open().await;
    server.abort();

    let Err(ClientError::Connection(message)) = result else {
        return Err(format!("expected handshake failure, got {result:?}").into());
    };
    assert!(
        !message.contains("TLS support not compiled in"),
        "unexpected error: {message}"
    );
    assert!(matches!(session.state(), SessionState::Errored(_)));
    Ok(())
}

#[tokio::test]
async fn event_is_sent_at_most_once() -> TestResult {
    let relay = MockRelay::spawn(Behavior::Silent).await?;
    let event = signed_note("hello")?;
    let mut session = session(&relay.url)?;

    session.open().await?;
    session.publish(&event).await?;
    let second = session.publish(&event).await;
    assert!(matches!(second, Err(ClientError::Protocol(_))));

    session.close().await;
    assert_eq!(session.state(), &SessionState::Closed(CloseReason::Cancelled));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(relay.received().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn session_cannot_be_reopened() -> TestResult {
    let relay = MockRelay::spawn(Behavior::accept()).await?;
    let mut session = session(&relay.url)?;

    session.open().await?;
    let reopened = session.open().await;
    assert!(matches!(reopened, Err(ClientError::InvalidRequest(_))));
    Ok(())
}
