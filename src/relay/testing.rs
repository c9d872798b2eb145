//! Scripted relay doubles shared by session and registry tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::auth::AuthBroker;
use super::transport::{RelayConnector, RelayTransport};
use crate::domain::{SubscriptionToken, TopicName};
use crate::error::{AuthError, TransportError};

pub(crate) const ESTABLISHED: &str = r#"{"event":"pusher:connection_established","data":"{\"socket_id\":\"123.456\",\"activity_timeout\":120}"}"#;

pub(crate) const SUBSCRIBED: &str = r#"{"event":"pusher_internal:subscription_succeeded","channel":"private-bubble.42.x","data":"{}"}"#;

pub(crate) const SUBSCRIPTION_ERROR: &str = r#"{"event":"pusher:subscription_error","channel":"private-bubble.42.x","data":"{\"type\":\"AuthError\",\"error\":\"invalid signature\",\"status\":401}"}"#;

/// What happens once a scripted connection has delivered its frames.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AfterScript {
    /// The relay closes the connection.
    Close,
    /// The connection stays open and silent.
    Hang,
}

/// One planned outcome of a `connect` call.
#[derive(Debug, Clone)]
pub(crate) enum ConnectPlan {
    Refuse,
    Open {
        frames: Vec<String>,
        after: AfterScript,
    },
}

impl ConnectPlan {
    pub(crate) fn open(frames: &[&str], after: AfterScript) -> Self {
        Self::Open {
            frames: frames.iter().map(|f| (*f).to_string()).collect(),
            after,
        }
    }
}

/// Connector that follows a queue of [`ConnectPlan`]s, then refuses.
#[derive(Debug, Default)]
pub(crate) struct ScriptedConnector {
    plans: Mutex<VecDeque<ConnectPlan>>,
    connects: Mutex<Vec<Instant>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub(crate) fn new(plans: Vec<ConnectPlan>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans.into()),
            ..Self::default()
        })
    }

    pub(crate) fn refusing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub(crate) fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().clone()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    /// Gaps between consecutive connect calls, in whole seconds.
    pub(crate) fn connect_gaps_secs(&self) -> Vec<u64> {
        self.connect_times()
            .windows(2)
            .filter_map(|w| match w {
                [a, b] => Some(b.duration_since(*a).as_secs()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl RelayConnector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn RelayTransport>, TransportError> {
        self.connects.lock().push(Instant::now());
        let plan = self.plans.lock().pop_front().unwrap_or(ConnectPlan::Refuse);
        match plan {
            ConnectPlan::Refuse => Err(TransportError::Connect("refused".to_string())),
            ConnectPlan::Open { frames, after } => Ok(Box::new(ScriptedTransport {
                frames: frames.into(),
                after,
                sent: Arc::clone(&self.sent),
            })),
        }
    }
}

struct ScriptedTransport {
    frames: VecDeque<String>,
    after: AfterScript,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RelayTransport for ScriptedTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().push(text);
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        match self.after {
            AfterScript::Close => None,
            AfterScript::Hang => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

/// Auth broker that always answers the same way and counts calls.
#[derive(Debug)]
pub(crate) struct StubAuth {
    fail: bool,
    calls: Mutex<u32>,
}

impl StubAuth {
    pub(crate) fn granting() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: Mutex::new(0),
        })
    }

    pub(crate) fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: Mutex::new(0),
        })
    }

    pub(crate) fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl AuthBroker for StubAuth {
    async fn authorize(
        &self,
        _socket_id: &str,
        _topic: &TopicName,
    ) -> Result<SubscriptionToken, AuthError> {
        *self.calls.lock() += 1;
        if self.fail {
            Err(AuthError::Status {
                status: 401,
                body: "unauthorized".to_string(),
            })
        } else {
            Ok(SubscriptionToken::new("key:sig"))
        }
    }
}
