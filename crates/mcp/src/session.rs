//! Registry of open push-channel sessions.
//!
//! Each session owns the sending half of the channel that feeds one client's
//! event stream. Follow-up submissions are routed here by session id,
//! acknowledged immediately, and processed in the background; the response
//! frame is written back onto the session's channel when it is ready.

use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use {
    futures::FutureExt,
    serde_json::{Value, json},
    telegate_common::{BridgeError, BridgeResult, ErrorKind},
    tokio::sync::{RwLock, mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    envelope::{CanonicalRequest, NormalizeOptions, RawPayload, normalize},
    traits::ProtocolHandler,
    types::{JsonRpcError, JsonRpcResponse, error_codes},
};

/// Longest client-suggested session id that is accepted as-is.
const MAX_HINT_LEN: usize = 64;

/// Shortest accepted keepalive period; `interval` rejects a zero period.
const MIN_KEEPALIVE: Duration = Duration::from_millis(1);

/// One item written onto a session's push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The submission URL, sent once right after the session opens.
    Endpoint(String),
    /// A serialized JSON-RPC response frame.
    Message(String),
    /// Keeps intermediaries from timing out an idle stream.
    Keepalive,
}

pub type ChannelSender = mpsc::Sender<ChannelEvent>;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Path advertised in the endpoint event; the session id is appended as
    /// the `sessionId` query parameter.
    pub message_path: String,
    pub keepalive_interval: Duration,
    pub normalize: NormalizeOptions,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            message_path: "/messages".into(),
            keepalive_interval: Duration::from_secs(25),
            normalize: NormalizeOptions::default(),
        }
    }
}

/// Returned to the submitter once a request has been accepted for routing.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAck {
    pub session_id: String,
    /// `None` when the submission was a notification.
    pub request_id: Option<Value>,
    pub method: String,
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub connected_at: Instant,
    pub last_activity: Instant,
}

struct Session {
    sender: ChannelSender,
    connected_at: Instant,
    last_activity: Instant,
    cancel: CancellationToken,
}

struct RegistryInner {
    sessions: RwLock<HashMap<String, Session>>,
    handler: Arc<dyn ProtocolHandler>,
    config: RegistryConfig,
}

/// Cloneable handle to the shared session table.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(handler: Arc<dyn ProtocolHandler>, mut config: RegistryConfig) -> Self {
        config.keepalive_interval = config.keepalive_interval.max(MIN_KEEPALIVE);
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                handler,
                config,
            }),
        }
    }

    /// Register a new session for `channel` and announce its endpoint.
    ///
    /// `hint` is used as the session id when it is a short token made of
    /// `[A-Za-z0-9_-]` that no open session already uses; otherwise a fresh
    /// id is generated.
    pub async fn open(&self, channel: ChannelSender, hint: Option<&str>) -> BridgeResult<String> {
        let cancel = CancellationToken::new();
        let now = Instant::now();
        let session_id = {
            let mut sessions = self.inner.sessions.write().await;
            let id = match hint.filter(|h| is_valid_hint(h)) {
                Some(h) if !sessions.contains_key(h) => h.to_string(),
                Some(h) => {
                    debug!(hint = h, "session id hint already in use, generating a new one");
                    uuid::Uuid::new_v4().to_string()
                },
                None => uuid::Uuid::new_v4().to_string(),
            };
            sessions.insert(id.clone(), Session {
                sender: channel.clone(),
                connected_at: now,
                last_activity: now,
                cancel: cancel.clone(),
            });
            id
        };

        let endpoint = format!(
            "{}?sessionId={session_id}",
            self.inner.config.message_path
        );
        if channel.send(ChannelEvent::Endpoint(endpoint)).await.is_err() {
            self.close(&session_id).await;
            return Err(BridgeError::new(
                ErrorKind::DeliveryFailed,
                "client disconnected before the endpoint event was written",
            ));
        }

        self.spawn_keepalive(session_id.clone(), channel.clone(), cancel.clone());
        self.spawn_disconnect_watch(session_id.clone(), channel, cancel);

        info!(session_id = %session_id, "session opened");
        Ok(session_id)
    }

    /// Accept a submission for `session_id` and process it in the background.
    ///
    /// Returns as soon as the payload is normalized; the response frame is
    /// pushed onto the session's channel later.
    pub async fn route(&self, session_id: &str, raw: RawPayload) -> BridgeResult<RouteAck> {
        if !self.contains(session_id).await {
            return Err(BridgeError::session_not_found(session_id));
        }

        let request = normalize(raw, self.inner.config.normalize)?;

        {
            let mut sessions = self.inner.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return Err(BridgeError::session_not_found(session_id));
            };
            session.last_activity = Instant::now();
        }

        let ack = RouteAck {
            session_id: session_id.to_string(),
            request_id: request.id.clone(),
            method: request.method.clone(),
        };
        debug!(
            session_id,
            method = %ack.method,
            request_id = ?ack.request_id,
            "request accepted"
        );

        let registry = self.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            registry.process(session_id, request).await;
        });

        Ok(ack)
    }

    /// Remove a session and stop its background tasks.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = self.inner.sessions.write().await.remove(session_id);
        match removed {
            Some(session) => {
                session.cancel.cancel();
                info!(
                    session_id,
                    duration_secs = session.connected_at.elapsed().as_secs(),
                    "session closed"
                );
                true
            },
            None => false,
        }
    }

    /// Close every open session, e.g. on shutdown.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(String, Session)> =
            self.inner.sessions.write().await.drain().collect();
        for (id, session) in &drained {
            session.cancel.cancel();
            debug!(session_id = %id, "session closed on shutdown");
        }
        drained.len()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.inner.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        self.inner
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|s| SessionInfo {
                id: session_id.to_string(),
                connected_at: s.connected_at,
                last_activity: s.last_activity,
            })
    }

    async fn process(&self, session_id: String, request: CanonicalRequest) {
        let id = request.id.clone();
        let method = request.method.clone();

        let outcome = AssertUnwindSafe(self.inner.handler.handle(request))
            .catch_unwind()
            .await;
        let response = match outcome {
            Ok(Some(response)) => response,
            Ok(None) => return,
            Err(_) => {
                warn!(session_id = %session_id, method = %method, "request handler panicked");
                let Some(id) = id else { return };
                JsonRpcResponse::failure(id, JsonRpcError {
                    code: error_codes::INTERNAL_ERROR,
                    message: "internal error while processing the request".into(),
                    data: Some(json!({"kind": ErrorKind::DeliveryFailed})),
                })
            },
        };

        let frame = match serde_json::to_string(&response) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to serialize response frame");
                return;
            },
        };
        self.deliver(&session_id, frame).await;
    }

    /// Write a response frame onto the session's channel.
    ///
    /// A missing session means the client went away while the request was in
    /// flight; the frame is dropped. A failed write closes the session.
    async fn deliver(&self, session_id: &str, frame: String) -> bool {
        let sender = self
            .inner
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.sender.clone());
        let Some(sender) = sender else {
            info!(session_id, "session closed before the response was ready, discarding it");
            return false;
        };

        if let Err(e) = sender.send(ChannelEvent::Message(frame)).await {
            warn!(session_id, error = %e, "failed to write response frame, closing session");
            self.close(session_id).await;
            return false;
        }
        true
    }

    fn spawn_keepalive(&self, session_id: String, sender: ChannelSender, cancel: CancellationToken) {
        let period = self.inner.config.keepalive_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = sender.try_send(ChannelEvent::Keepalive) {
                            debug!(session_id = %session_id, error = %e, "keepalive not written");
                        }
                    }
                }
            }
        });
    }

    /// Close the session once the receiving half of its channel is dropped.
    fn spawn_disconnect_watch(
        &self,
        session_id: String,
        sender: ChannelSender,
        cancel: CancellationToken,
    ) {
        let inner: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {},
                () = sender.closed() => {
                    if let Some(inner) = inner.upgrade() {
                        let registry = SessionRegistry { inner };
                        if registry.close(&session_id).await {
                            info!(session_id = %session_id, "client disconnected");
                        }
                    }
                }
            }
        });
    }
}

fn is_valid_hint(hint: &str) -> bool {
    !hint.is_empty()
        && hint.len() <= MAX_HINT_LEN
        && hint
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
