//! Socket session state machine.
//!
//! A [`SocketSession`] owns the relay connection for one channel and runs
//!
//! ```text
//! Disconnected → Connecting → AwaitingTransportId → Authenticating → Subscribed
//!                    ↑                                                   │
//!                    └──────────── Reconnecting ◀── failure ─────────────┘
//!                                       │
//!                                       └── attempts exhausted ──▶ Terminated
//! ```
//!
//! Transport drops, handshake failures, auth failures, and a relay-side
//! `pusher:subscription_error` all go through the same [`ReconnectPolicy`].
//! Consecutive failures only stop counting once the relay confirms the
//! subscription, so a relay that drops every connection right after the
//! subscribe frame still exhausts the policy. Undecodable frames are dropped without
//! touching the state. Cancelling the session's token (via
//! [`SessionHandle::disconnect`]) interrupts any receive, auth call, or
//! backoff sleep and moves straight to `Terminated`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::auth::AuthBroker;
use super::backoff::{ReconnectAttemptState, ReconnectPolicy};
use super::codec::{self, Inbound};
use super::messages::{OutboundFrame, PING_LITERAL, PONG_LITERAL};
use super::transport::{RelayConnector, RelayTransport};
use crate::domain::{
    ChannelDescriptor, ChannelId, Dispatcher, EventKind, SessionState, Termination, TopicName,
};
use crate::error::{AuthError, RealtimeError, TransportError};

/// Timeouts, relay endpoint, and reconnect policy shared by all sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Relay WebSocket URL.
    pub relay_url: String,
    /// Bound on waiting for the connection-established frame.
    pub handshake_timeout: Duration,
    /// Bound on one subscription-token exchange.
    pub auth_timeout: Duration,
    /// Receive silence after which a keepalive ping is sent.
    pub idle_timeout: Duration,
    /// Backoff and give-up policy.
    pub policy: ReconnectPolicy,
}

impl SessionSettings {
    /// Creates settings with default timeouts for `relay_url`.
    #[must_use]
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            handshake_timeout: Duration::from_secs(20),
            auth_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            policy: ReconnectPolicy::default(),
        }
    }
}

/// Collaborators a session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    /// Opens relay connections.
    pub connector: Arc<dyn RelayConnector>,
    /// Signs subscriptions.
    pub auth: Arc<dyn AuthBroker>,
    /// Receives decoded events.
    pub dispatcher: Dispatcher,
    /// Shared settings.
    pub settings: Arc<SessionSettings>,
}

impl std::fmt::Debug for SessionDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDeps")
            .field("dispatcher", &self.dispatcher)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Identity of one session instance; a channel reconnected after
/// termination gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

/// Caller-side view of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    channel_id: ChannelId,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Returns the session instance id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the channel the session is bound to.
    #[must_use]
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Asks the session to stop. Idempotent.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Waits until the session reports `target`, or until it terminates.
    /// Returns the state it stopped waiting on.
    pub async fn wait_for(&mut self, target: SessionState) -> SessionState {
        match self
            .state
            .wait_for(|s| *s == target || s.is_terminal())
            .await
        {
            Ok(state) => *state,
            Err(_) => SessionState::Terminated,
        }
    }
}

/// The connection loop for one channel.
pub struct SocketSession {
    id: SessionId,
    descriptor: ChannelDescriptor,
    topic: TopicName,
    deps: SessionDeps,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    attempts: ReconnectAttemptState,
}

impl std::fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSession")
            .field("channel_id", &self.descriptor.channel_id)
            .field("state", &*self.state.borrow())
            .field("attempts", &self.attempts.attempt_count)
            .finish_non_exhaustive()
    }
}

impl SocketSession {
    /// Creates a session in [`SessionState::Disconnected`] and its handle.
    #[must_use]
    pub fn new(descriptor: ChannelDescriptor, deps: SessionDeps) -> (Self, SessionHandle) {
        let (state, state_rx) = watch::channel(SessionState::Disconnected);
        let cancel = CancellationToken::new();
        let id = SessionId::new();
        let handle = SessionHandle {
            id,
            channel_id: descriptor.channel_id.clone(),
            state: state_rx,
            cancel: cancel.clone(),
        };
        let session = Self {
            id,
            topic: descriptor.topic_name(),
            attempts: ReconnectAttemptState::new(descriptor.channel_id.clone()),
            descriptor,
            deps,
            state,
            cancel,
        };
        (session, handle)
    }

    /// Returns the session instance id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Runs until disconnected or until the reconnect policy gives up.
    pub async fn run(mut self) -> Termination {
        let channel_id = self.descriptor.channel_id.clone();
        let policy = self.deps.settings.policy;

        let termination = loop {
            let err = match self.run_connection().await {
                Ok(()) => break Termination::Disconnected,
                Err(err) => err,
            };

            let attempt = self.attempts.record_failure(&policy);
            if policy.should_give_up(attempt) {
                let gave_up = RealtimeError::GaveUp {
                    channel_id: channel_id.clone(),
                    attempts: attempt,
                };
                tracing::error!(%channel_id, error = %err, "{gave_up}");
                break Termination::GaveUp { attempts: attempt };
            }

            let wait = self.attempts.next_backoff;
            tracing::warn!(
                %channel_id,
                attempt,
                backoff_secs = wait.as_secs(),
                error = %err,
                "relay connection failed, reconnecting"
            );
            self.set_state(SessionState::Reconnecting);
            if self.cancellable(tokio::time::sleep(wait)).await.is_none() {
                break Termination::Disconnected;
            }
        };

        self.set_state(SessionState::Terminated);
        tracing::info!(%channel_id, ?termination, "session terminated");
        termination
    }

    fn set_state(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(channel_id = %self.descriptor.channel_id, from = %prev, to = %next, "session state");
        }
    }

    /// Runs `fut` unless the session is cancelled first.
    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// One connect-to-drop cycle. `Ok(())` means the session was
    /// cancelled; any error is a connection-local failure.
    async fn run_connection(&mut self) -> Result<(), RealtimeError> {
        self.set_state(SessionState::Connecting);
        let connector = Arc::clone(&self.deps.connector);
        let url = self.deps.settings.relay_url.clone();
        let Some(connected) = self.cancellable(connector.connect(&url)).await else {
            return Ok(());
        };
        let mut transport = connected?;
        let outcome = self.serve(transport.as_mut()).await;
        transport.close().await;
        outcome
    }

    async fn serve(&mut self, transport: &mut dyn RelayTransport) -> Result<(), RealtimeError> {
        self.set_state(SessionState::AwaitingTransportId);
        let Some(socket_id) = self.cancellable(self.await_socket_id(transport)).await else {
            return Ok(());
        };
        let socket_id = socket_id?;

        self.set_state(SessionState::Authenticating);
        let Some(token) = self.cancellable(self.authorize(&socket_id)).await else {
            return Ok(());
        };
        let token = token?;

        transport
            .send_text(OutboundFrame::subscribe(&self.topic, &token).to_text())
            .await?;
        self.set_state(SessionState::Subscribed);
        tracing::info!(channel_id = %self.descriptor.channel_id, "subscribed");

        self.receive_loop(transport).await
    }

    async fn await_socket_id(
        &self,
        transport: &mut dyn RelayTransport,
    ) -> Result<String, RealtimeError> {
        let timeout = self.deps.settings.handshake_timeout;
        tokio::time::timeout(timeout, self.read_socket_id(transport))
            .await
            .map_err(|_| TransportError::HandshakeTimeout(timeout.as_secs()))?
    }

    /// Reads frames until the connection-established frame arrives,
    /// answering literal pings on the way.
    async fn read_socket_id(
        &self,
        transport: &mut dyn RelayTransport,
    ) -> Result<String, RealtimeError> {
        loop {
            let frame = match transport.next_text().await {
                Some(frame) => frame?,
                None => return Err(TransportError::Closed.into()),
            };
            if frame == PING_LITERAL {
                transport.send_text(PONG_LITERAL.to_string()).await?;
                continue;
            }
            let established = codec::parse_connection_established(&frame)?;
            tracing::debug!(
                channel_id = %self.descriptor.channel_id,
                socket_id = %established.socket_id,
                "transport id received"
            );
            return Ok(established.socket_id);
        }
    }

    async fn authorize(&self, socket_id: &str) -> Result<crate::domain::SubscriptionToken, RealtimeError> {
        let timeout = self.deps.settings.auth_timeout;
        let token = tokio::time::timeout(timeout, self.deps.auth.authorize(socket_id, &self.topic))
            .await
            .map_err(|_| AuthError::Request(format!("timed out after {} s", timeout.as_secs())))??;
        Ok(token)
    }

    async fn receive_loop(&mut self, transport: &mut dyn RelayTransport) -> Result<(), RealtimeError> {
        let idle = self.deps.settings.idle_timeout;
        loop {
            let Some(next) = self
                .cancellable(tokio::time::timeout(idle, transport.next_text()))
                .await
            else {
                let _ = transport
                    .send_text(OutboundFrame::unsubscribe(&self.topic).to_text())
                    .await;
                return Ok(());
            };

            match next {
                Err(_) => {
                    tracing::trace!(channel_id = %self.descriptor.channel_id, "idle, sending keepalive");
                    transport.send_text(codec::keepalive_ping()).await?;
                }
                Ok(None) => return Err(TransportError::Closed.into()),
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(frame))) => self.handle_frame(transport, &frame).await?,
            }
        }
    }

    /// Handles one inbound frame. The attempt counter only resets once the
    /// relay confirms the subscription.
    async fn handle_frame(
        &mut self,
        transport: &mut dyn RelayTransport,
        frame: &str,
    ) -> Result<(), RealtimeError> {
        match codec::decode(frame, &self.descriptor.channel_id) {
            Ok(Inbound::Ping(keepalive)) => transport.send_text(keepalive.reply()).await?,
            Ok(Inbound::Pong) => {}
            Ok(Inbound::SubscriptionError(reason)) => {
                return Err(AuthError::Rejected(reason).into());
            }
            Ok(Inbound::Event(event)) => {
                if event.kind == EventKind::SubscriptionSucceeded {
                    self.attempts.reset();
                    tracing::info!(channel_id = %self.descriptor.channel_id, "subscription confirmed");
                }
                let _ = self.deps.dispatcher.publish(&event);
            }
            Err(e) => {
                tracing::warn!(
                    channel_id = %self.descriptor.channel_id,
                    error = %e,
                    "dropping undecodable frame"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, FnConsumer, NormalizedEvent};
    use crate::relay::testing::{
        AfterScript, ConnectPlan, ESTABLISHED, SUBSCRIBED, SUBSCRIPTION_ERROR, ScriptedConnector,
        StubAuth,
    };
    use parking_lot::Mutex;

    const MESSAGE: &str = r#"{"event":"App\\Events\\MessageAdded","data":"{\"message\":{\"id\":1,\"message\":\"hi\"}}","channel":"private-bubble.42.x"}"#;

    struct Harness {
        connector: Arc<ScriptedConnector>,
        auth: Arc<StubAuth>,
        events: Arc<Mutex<Vec<NormalizedEvent>>>,
        deps: SessionDeps,
    }

    fn harness(connector: Arc<ScriptedConnector>, auth: Arc<StubAuth>) -> Harness {
        let dispatcher = Dispatcher::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _ = dispatcher.subscribe(Arc::new(FnConsumer::new("test", move |e: &NormalizedEvent| {
            sink.lock().push(e.clone());
            Ok(())
        })));
        let deps = SessionDeps {
            connector: Arc::clone(&connector) as Arc<dyn RelayConnector>,
            auth: Arc::clone(&auth) as Arc<dyn AuthBroker>,
            dispatcher,
            settings: Arc::new(SessionSettings::new("wss://relay.test/app/key")),
        };
        Harness {
            connector,
            auth,
            events,
            deps,
        }
    }

    fn descriptor() -> ChannelDescriptor {
        ChannelDescriptor::new(ChannelId::from("42"), "x")
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_backs_off_then_terminates() {
        let h = harness(ScriptedConnector::refusing(), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());

        let termination = session.run().await;

        assert_eq!(termination, Termination::GaveUp { attempts: 6 });
        assert_eq!(handle.state(), SessionState::Terminated);
        // Initial attempt plus five reconnects.
        assert_eq!(h.connector.connect_count(), 6);
        assert_eq!(h.connector.connect_gaps_secs(), vec![2, 4, 8, 16, 30]);
        assert_eq!(h.auth.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failures_use_the_same_policy() {
        let plans = (0..6)
            .map(|_| ConnectPlan::open(&[ESTABLISHED], AfterScript::Hang))
            .collect();
        let h = harness(ScriptedConnector::new(plans), StubAuth::rejecting());
        let (session, _handle) = SocketSession::new(descriptor(), h.deps.clone());

        let termination = session.run().await;

        assert_eq!(termination, Termination::GaveUp { attempts: 6 });
        assert_eq!(h.auth.calls(), 6);
        assert_eq!(h.connector.connect_gaps_secs(), vec![2, 4, 8, 16, 30]);
        assert!(h.connector.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_subscription_resets_attempts() {
        let plans = vec![
            ConnectPlan::open(&[ESTABLISHED, SUBSCRIBED], AfterScript::Close),
            ConnectPlan::Refuse,
            ConnectPlan::open(&[ESTABLISHED, SUBSCRIBED], AfterScript::Close),
        ];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, _handle) = SocketSession::new(descriptor(), h.deps.clone());

        let termination = session.run().await;

        assert_eq!(termination, Termination::GaveUp { attempts: 6 });
        assert_eq!(h.connector.connect_gaps_secs(), vec![2, 4, 2, 4, 8, 16, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn relay_dropping_after_subscribe_still_gives_up() {
        let plans = (0..50)
            .map(|_| ConnectPlan::open(&[ESTABLISHED], AfterScript::Close))
            .collect();
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, _handle) = SocketSession::new(descriptor(), h.deps.clone());

        let termination = session.run().await;

        assert_eq!(termination, Termination::GaveUp { attempts: 6 });
        assert_eq!(h.connector.connect_count(), 6);
        assert_eq!(h.connector.connect_gaps_secs(), vec![2, 4, 8, 16, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_subscription_reconnects_until_exhausted() {
        let plans = (0..6)
            .map(|_| ConnectPlan::open(&[ESTABLISHED, SUBSCRIPTION_ERROR], AfterScript::Hang))
            .collect();
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());

        let termination = session.run().await;

        assert_eq!(termination, Termination::GaveUp { attempts: 6 });
        assert_eq!(handle.state(), SessionState::Terminated);
        assert_eq!(h.auth.calls(), 6);
        assert_eq!(h.connector.connect_gaps_secs(), vec![2, 4, 8, 16, 30]);
        assert!(h.events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_subscription_recovers_on_next_connection() {
        let plans = vec![
            ConnectPlan::open(&[ESTABLISHED, SUBSCRIPTION_ERROR], AfterScript::Hang),
            ConnectPlan::open(&[ESTABLISHED, SUBSCRIBED], AfterScript::Hang),
        ];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(handle.state(), SessionState::Subscribed);
        assert_eq!(h.connector.connect_gaps_secs(), vec![2]);
        let kinds: Vec<EventKind> = h.events.lock().iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds, vec![EventKind::SubscriptionSucceeded]);

        handle.disconnect();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn subscribes_and_dispatches_in_order() {
        let second = MESSAGE.replace("MessageAdded", "MessageUpdated");
        let plans = vec![ConnectPlan::open(&[ESTABLISHED, MESSAGE, second.as_str()], AfterScript::Hang)];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, mut handle) = SocketSession::new(descriptor(), h.deps.clone());
        let task = tokio::spawn(session.run());

        assert_eq!(handle.wait_for(SessionState::Subscribed).await, SessionState::Subscribed);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let sent = h.connector.sent();
        assert_eq!(
            sent.first().map(String::as_str),
            Some(r#"{"event":"pusher:subscribe","data":{"channel":"private-bubble.42.x","auth":"key:sig"}}"#)
        );
        let kinds: Vec<EventKind> = h.events.lock().iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds, vec![EventKind::MessageAdded, EventKind::MessageUpdated]);
        assert!(h.events.lock().iter().all(|e| e.channel_id.as_str() == "42"));

        handle.disconnect();
        let Ok(termination) = task.await else {
            panic!("session task panicked");
        };
        assert_eq!(termination, Termination::Disconnected);
        assert_eq!(handle.state(), SessionState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn literal_ping_gets_one_pong_and_no_event() {
        let plans = vec![ConnectPlan::open(&[ESTABLISHED, "ping"], AfterScript::Hang)];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_secs(1)).await;

        let sent = h.connector.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent.iter().filter(|f| f.as_str() == "pong").count(), 1);
        assert!(h.events.lock().is_empty());

        handle.disconnect();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_sends_keepalive_and_stays_subscribed() {
        let plans = vec![ConnectPlan::open(&[ESTABLISHED], AfterScript::Hang)];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(handle.state(), SessionState::Subscribed);
        assert!(h.connector.sent().iter().any(|f| f == r#"{"event":"pusher:ping"}"#));
        assert_eq!(h.connector.connect_count(), 1);

        handle.disconnect();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn bad_frames_are_dropped_without_reconnecting() {
        let plans = vec![ConnectPlan::open(
            &[ESTABLISHED, "{not json", "[1]", MESSAGE],
            AfterScript::Hang,
        )];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(h.events.lock().len(), 1);
        assert_eq!(handle.state(), SessionState::Subscribed);
        assert_eq!(h.connector.connect_count(), 1);

        handle.disconnect();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn missing_handshake_times_out_and_reconnects() {
        let plans = vec![ConnectPlan::open(&[], AfterScript::Hang)];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_secs(23)).await;

        // 20 s handshake timeout, then a 2 s backoff.
        assert_eq!(h.connector.connect_gaps_secs(), vec![22]);
        handle.disconnect();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_interrupts_backoff() {
        let h = harness(ScriptedConnector::refusing(), StubAuth::granting());
        let (session, handle) = SocketSession::new(descriptor(), h.deps.clone());
        let started = tokio::time::Instant::now();
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.state(), SessionState::Reconnecting);
        handle.disconnect();
        handle.disconnect();

        let Ok(termination) = task.await else {
            panic!("session task panicked");
        };
        assert_eq!(termination, Termination::Disconnected);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(h.connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_unsubscribes_live_connection() {
        let plans = vec![ConnectPlan::open(&[ESTABLISHED], AfterScript::Hang)];
        let h = harness(ScriptedConnector::new(plans), StubAuth::granting());
        let (session, mut handle) = SocketSession::new(descriptor(), h.deps.clone());
        let task = tokio::spawn(session.run());

        let _ = handle.wait_for(SessionState::Subscribed).await;
        handle.disconnect();
        let _ = task.await;

        assert_eq!(
            h.connector.sent().last().map(String::as_str),
            Some(r#"{"event":"pusher:unsubscribe","data":{"channel":"private-bubble.42.x"}}"#)
        );
    }
}
