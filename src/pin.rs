//! # PIN Relay
//!
//! Synchronizes an in-flight token exchange with a second, user-facing
//! WebSocket channel. The surrounding API owns the socket accept loop
//! and feeds every inbound text frame to [`PinRelay::on_message`]; the
//! relay owns all shared state and its cleanup.
//!
//! Two maps are maintained: `session → user` (filled when a client
//! identifies itself with a bearer JWT) and `user → sink` (a broadcast
//! channel per user). Delivery is best-effort multicast: a PIN emitted
//! with no active subscriber is lost, not queued, and a PIN for an
//! unregistered session is silently dropped.
//!
//! Prompts carry the issuance flow's `process_id` and a PIN entry may
//! echo it back; [`PinRelay::await_pin`] only accepts entries whose
//! echoed id matches, so two concurrent flows for one user cannot steal
//! each other's PINs. Entries without an echoed id are accepted by any
//! waiting flow.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::error::Error;
use crate::jose::jws;

const SINK_CAPACITY: usize = 8;

/// An inbound relay message: either a registration (`id` holds a bearer
/// JWT) or a PIN delivery.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RelayMessage {
    /// Bearer JWT identifying the connected user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// A user-entered PIN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,

    /// The flow the PIN answers, echoed from the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
}

/// The prompt pushed to a client when a flow needs a PIN.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PinPrompt {
    /// Always `true`: the flow is blocked on PIN entry.
    pub pin_required: bool,

    /// The flow awaiting the PIN; clients echo it with the PIN.
    pub process_id: String,
}

/// A PIN entry flowing through a user's sink.
#[derive(Clone, Debug)]
struct PinEntry {
    pin: String,
    process_id: Option<String>,
}

/// The relay's shared state. One instance serves all users.
#[derive(Debug)]
pub struct PinRelay {
    /// `sessionId → userId`, filled on registration.
    sessions: RwLock<HashMap<String, String>>,

    /// Outbound channel per session, for prompt pushes.
    outbound: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,

    /// `userId → sink`.
    sinks: RwLock<HashMap<String, broadcast::Sender<PinEntry>>>,
}

impl Default for PinRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl PinRelay {
    /// Create an empty relay.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            outbound: RwLock::new(HashMap::new()),
            sinks: RwLock::new(HashMap::new()),
        }
    }

    /// Handle an inbound frame from a WebSocket session. `outbound` is
    /// the session's write half, retained for prompt pushes.
    ///
    /// # Errors
    ///
    /// Returns `Error::JwtInvalidFormat`/`Error::FailedDeserializing`
    /// when a registration bearer token cannot be decoded. A PIN for an
    /// unregistered session is not an error.
    pub async fn on_message(
        &self, session_id: &str, outbound: &mpsc::UnboundedSender<String>, text: &str,
    ) -> Result<(), Error> {
        let message: RelayMessage = serde_json::from_str(text)
            .map_err(|e| Error::FailedDeserializing(format!("relay message: {e}")))?;

        if let Some(bearer) = &message.id {
            self.register(session_id, outbound.clone(), bearer).await?;
        }
        if let Some(pin) = message.pin {
            self.deliver(session_id, pin, message.process_id).await;
        }
        Ok(())
    }

    /// Register a session under the user identified by the bearer JWT's
    /// `sub` claim, creating (or reusing) the user's sink.
    async fn register(
        &self, session_id: &str, outbound: mpsc::UnboundedSender<String>, bearer: &str,
    ) -> Result<(), Error> {
        #[derive(Deserialize)]
        struct BearerClaims {
            sub: String,
        }
        // authentication happened at the HTTP upgrade; only the subject
        // is extracted here
        let (_, claims): (_, BearerClaims) = jws::decode(bearer)?;

        self.sessions.write().await.insert(session_id.to_string(), claims.sub.clone());
        self.outbound.write().await.insert(session_id.to_string(), outbound);
        self.sinks
            .write()
            .await
            .entry(claims.sub.clone())
            .or_insert_with(|| broadcast::channel(SINK_CAPACITY).0);

        tracing::debug!("session {session_id} registered for user {}", claims.sub);
        Ok(())
    }

    /// Push a PIN into the sink of the sending session's user. Dropped
    /// silently when the session is unregistered or nobody is waiting.
    async fn deliver(&self, session_id: &str, pin: String, process_id: Option<String>) {
        let Some(user_id) = self.sessions.read().await.get(session_id).cloned() else {
            tracing::debug!("pin from unregistered session {session_id} dropped");
            return;
        };
        let Some(sink) = self.sinks.read().await.get(&user_id).cloned() else {
            tracing::debug!("no sink for user {user_id}, pin dropped");
            return;
        };
        // send fails only when no subscriber is active; best-effort
        let _ = sink.send(PinEntry { pin, process_id });
    }

    /// Prompt the user's connected session(s) for a PIN. Returns
    /// immediately; no response is awaited. A prompt for a user with no
    /// connected session is dropped (the later wait will time out).
    ///
    /// # Errors
    ///
    /// Returns `Error::FailedSerializing` when the prompt cannot be
    /// serialized.
    pub async fn send_pin_request(&self, user_id: &str, process_id: &str) -> Result<(), Error> {
        let prompt = PinPrompt {
            pin_required: true,
            process_id: process_id.to_string(),
        };
        let text = serde_json::to_string(&prompt)
            .map_err(|e| Error::FailedSerializing(format!("pin prompt: {e}")))?;

        let sessions = self.sessions.read().await;
        let outbound = self.outbound.read().await;
        let mut prompted = 0;
        for (session_id, session_user) in sessions.iter() {
            if session_user == user_id
                && let Some(sender) = outbound.get(session_id)
                && sender.send(text.clone()).is_ok()
            {
                prompted += 1;
            }
        }
        if prompted == 0 {
            tracing::debug!("no connected session for user {user_id}, prompt dropped");
        }
        Ok(())
    }

    /// Wait for the first PIN entered for `user_id` that answers
    /// `process_id` (or carries no echoed id), up to `timeout`.
    ///
    /// Dropping the returned future releases the subscription; no
    /// dangling subscriber remains if the flow is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `Error::PinTimeout` when nothing arrives in time.
    pub async fn await_pin(
        &self, user_id: &str, process_id: &str, timeout: Duration,
    ) -> Result<String, Error> {
        let mut receiver = {
            let mut sinks = self.sinks.write().await;
            sinks
                .entry(user_id.to_string())
                .or_insert_with(|| broadcast::channel(SINK_CAPACITY).0)
                .subscribe()
        };

        let wait = async {
            loop {
                match receiver.recv().await {
                    Ok(entry) => {
                        match &entry.process_id {
                            Some(echoed) if echoed != process_id => {
                                // answers a different concurrent flow
                                continue;
                            }
                            _ => return Some(entry.pin),
                        }
                    }
                    // overrun: skip to the most recent entries
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        };

        let result = match tokio::time::timeout(timeout, wait).await {
            Ok(Some(pin)) => Ok(pin),
            Ok(None) => Err(Error::PinTimeout(format!("sink closed for user {user_id}"))),
            Err(_) => Err(Error::PinTimeout(format!(
                "no PIN for user {user_id} within {}ms",
                timeout.as_millis()
            ))),
        };
        drop(receiver);

        // a wait for a user with no connected session must not leave the
        // sink it created behind
        let has_session = self.sessions.read().await.values().any(|u| u == user_id);
        if !has_session {
            self.sinks.write().await.remove(user_id);
        }

        result
    }

    /// Remove a closed session and, when it was the user's last one, the
    /// user's sink. Bounds relay memory to active sessions.
    pub async fn on_close(&self, session_id: &str) {
        let user_id = self.sessions.write().await.remove(session_id);
        self.outbound.write().await.remove(session_id);

        if let Some(user_id) = user_id {
            let sessions = self.sessions.read().await;
            let user_has_sessions = sessions.values().any(|u| u == &user_id);
            drop(sessions);
            if !user_has_sessions {
                self.sinks.write().await.remove(&user_id);
            }
        }
    }
}
