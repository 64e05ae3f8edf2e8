//! In-process relays for publish tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use nostr::{Event, PrivateKey, Signer};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// How a mock relay answers an `EVENT` frame.
#[derive(Debug, Clone)]
pub enum Behavior {
    Accept { delay: Duration },
    Reject { delay: Duration, reason: String },
    /// Read the event and never answer.
    Silent,
    /// Close the connection instead of answering.
    Hangup,
    /// Send a NOTICE, an OK for another event and an EOSE before accepting.
    Chatty,
}

impl Behavior {
    pub fn accept() -> Self {
        Self::Accept {
            delay: Duration::ZERO,
        }
    }

    pub fn reject(reason: &str) -> Self {
        Self::Reject {
            delay: Duration::ZERO,
            reason: reason.to_string(),
        }
    }
}

pub struct MockRelay {
    pub url: String,
    received: Arc<Mutex<Vec<String>>>,
    disconnects: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockRelay {
    pub async fn spawn(behavior: Behavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let frames = received.clone();
        let disconnects = Arc::new(AtomicUsize::new(0));
        let closed = disconnects.clone();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let behavior = behavior.clone();
                let frames = frames.clone();
                let closed = closed.clone();
                tokio::spawn(async move {
                    serve(stream, behavior, frames).await;
                    closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Ok(Self {
            url: format!("ws://{addr}"),
            received,
            disconnects,
            handle,
        })
    }

    /// Text frames received so far.
    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    /// Connections that have ended so far.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Poll until a client connection ends or `within` elapses.
    pub async fn wait_for_disconnect(&self, within: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < within {
            if self.disconnects() > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.disconnects() > 0
    }
}

impl Drop for MockRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(stream: TcpStream, behavior: Behavior, received: Arc<Mutex<Vec<String>>>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(frame)) = ws.next().await {
        let Message::Text(text) = frame else {
            continue;
        };
        received.lock().await.push(text.to_string());

        let event_id = serde_json::from_str::<Value>(text.as_str())
            .ok()
            .and_then(|value| value[1]["id"].as_str().map(ToString::to_string))
            .unwrap_or_default();

        let replies = match &behavior {
            Behavior::Accept { delay } => {
                tokio::time::sleep(*delay).await;
                vec![json!(["OK", event_id, true, ""])]
            }
            Behavior::Reject { delay, reason } => {
                tokio::time::sleep(*delay).await;
                vec![json!(["OK", event_id, false, reason])]
            }
            Behavior::Silent => Vec::new(),
            Behavior::Hangup => {
                let _ = ws.close(None).await;
                return;
            }
            Behavior::Chatty => vec![
                json!(["NOTICE", "welcome"]),
                json!(["OK", "00".repeat(32), false, "not yours"]),
                json!(["EOSE", "sub"]),
                json!(["OK", event_id, true, "stored"]),
            ],
        };

        for reply in replies {
            if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                return;
            }
        }
    }
}

/// An address with nothing listening on it.
pub async fn closed_endpoint() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("ws://{addr}"))
}

pub fn signed_note(content: &str) -> Result<Arc<Event>, nostr::NostrError> {
    let key = PrivateKey::generate()?;
    let event = Signer::new().sign_text_note(content, &key, nostr::now_unix_seconds())?;
    Ok(Arc::new(event))
}
