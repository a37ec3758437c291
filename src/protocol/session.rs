//! Gateway Session
//!
//! One logged-in connection for one account. The session owns its sequence
//! counters, correlation table, account snapshot and heartbeat monitor; none
//! of this state is shared with other sessions.
//!
//! Lifecycle: `Disconnected -> Connecting -> LoggingIn -> Ready -> Disconnected`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use prost::Message;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::codec::{Envelope, MessageType, SequenceCounter};
use super::correlation::{CorrelationTable, PendingReply};
use super::dispatcher::NotificationDispatcher;
use super::events::{AccountSnapshot, SessionEvent};
use super::heartbeat::{HeartbeatMonitor, Liveness};
use super::messages::{
    DeviceInfo, HeartbeatReply, HeartbeatRequest, LoginReply, LoginRequest, ReportData,
    HEARTBEAT_METHOD, LOGIN_METHOD, USER_SERVICE,
};
use super::transport::{Connection, Connector, TransportEvent};
use crate::config::{GatewaySettings, SessionSettings};
use crate::infrastructure::metrics;
use crate::shared::clock::ServerClock;
use crate::shared::error::ProtocolError;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    LoggingIn,
    Ready,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::LoggingIn => "logging_in",
            SessionStatus::Ready => "ready",
        }
    }
}

/// What a session needs to log in.
#[derive(Debug, Clone)]
pub struct Credential {
    /// One-shot login code issued by the platform
    pub code: String,
    /// Platform tag (for example `qq` or `wx`)
    pub platform: String,
}

/// Produces fresh sessions with shared settings, connector and clock.
#[derive(Clone)]
pub struct SessionFactory {
    gateway: GatewaySettings,
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    clock: Arc<ServerClock>,
}

impl SessionFactory {
    pub fn new(
        gateway: GatewaySettings,
        settings: SessionSettings,
        connector: Arc<dyn Connector>,
        clock: Arc<ServerClock>,
    ) -> Self {
        Self {
            gateway,
            settings,
            connector,
            clock,
        }
    }

    /// Create a disconnected session for an account.
    pub fn create(&self, account_id: i64) -> Session {
        let (events, _) = broadcast::channel(self.settings.event_capacity.max(1));
        let stale_after = self.settings.heartbeat_stale();
        let miss_limit = self.settings.heartbeat_miss_limit;

        Session {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                account_id,
                gateway: self.gateway.clone(),
                settings: self.settings.clone(),
                connector: Arc::clone(&self.connector),
                clock: Arc::clone(&self.clock),
                status: Mutex::new(SessionStatus::Disconnected),
                sequence: SequenceCounter::new(),
                pending: CorrelationTable::new(),
                snapshot: Mutex::new(AccountSnapshot::default()),
                heartbeat: Mutex::new(HeartbeatMonitor::new(stale_after, miss_limit)),
                outbound: Mutex::new(None),
                reader_task: Mutex::new(None),
                heartbeat_task: Mutex::new(None),
                events,
                dispatcher: NotificationDispatcher::new(),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<ServerClock> {
        &self.clock
    }
}

/// A gateway session.
///
/// Not `Clone`: one owner drives it. Dropping the session disconnects it.
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Uuid,
    account_id: i64,
    gateway: GatewaySettings,
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    clock: Arc<ServerClock>,
    status: Mutex<SessionStatus>,
    sequence: SequenceCounter,
    pending: Arc<CorrelationTable>,
    snapshot: Mutex<AccountSnapshot>,
    heartbeat: Mutex<HeartbeatMonitor>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
    dispatcher: NotificationDispatcher,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn account_id(&self) -> i64 {
        self.inner.account_id
    }

    /// Open the transport and log in.
    ///
    /// # Errors
    ///
    /// `AlreadyConnected` unless the session is disconnected; otherwise any
    /// transport, decode, remote or timeout error from the login exchange.
    /// On failure the session is left disconnected.
    pub async fn connect(&self, credential: &Credential) -> Result<AccountSnapshot, ProtocolError> {
        {
            let mut status = self.inner.status.lock();
            if *status != SessionStatus::Disconnected {
                return Err(ProtocolError::AlreadyConnected);
            }
            *status = SessionStatus::Connecting;
        }
        metrics::record_session_transition(SessionStatus::Connecting.as_str());

        match self.inner.establish(credential).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                tracing::warn!(
                    account_id = self.inner.account_id,
                    session_id = %self.inner.id,
                    error = %e,
                    "Login failed"
                );
                self.inner.shutdown(&format!("login failed: {e}"));
                Err(e)
            }
        }
    }

    /// Send a request and wait for its reply body, using the configured timeout.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        body: impl Into<Bytes>,
    ) -> Result<Bytes, ProtocolError> {
        self.call_with_timeout(service, method, body, self.inner.settings.request_timeout())
            .await
    }

    pub async fn call_with_timeout(
        &self,
        service: &str,
        method: &str,
        body: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Bytes, ProtocolError> {
        let outcome = match self.send_request(service, method, body, timeout) {
            Ok(pending) => pending.wait().await.map(|reply| reply.body),
            Err(e) => Err(e),
        };
        metrics::record_request(method, request_outcome(&outcome));
        outcome
    }

    /// Typed call: encode `request`, decode the reply as `Resp`.
    pub async fn call_message<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Resp, ProtocolError>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let body = self.call(service, method, request.encode_to_vec()).await?;
        Ok(Resp::decode(body)?)
    }

    /// Transmit a request and hand back the pending reply without waiting.
    ///
    /// Fails fast with `NotConnected`, registering nothing, unless the
    /// session is ready.
    pub fn send_request(
        &self,
        service: &str,
        method: &str,
        body: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<PendingReply, ProtocolError> {
        let status = self.status();
        if status != SessionStatus::Ready {
            return Err(ProtocolError::NotConnected(format!(
                "{service}.{method} while {}",
                status.as_str()
            )));
        }
        self.inner.send(service, method, body.into(), timeout)
    }

    /// Close the connection. Pending requests fail with `Disconnected`.
    pub fn disconnect(&self) {
        self.inner.shutdown("disconnect requested");
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.inner.snapshot.lock().clone()
    }

    pub fn status(&self) -> SessionStatus {
        *self.inner.status.lock()
    }

    /// Number of requests awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.shutdown("session dropped");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("account_id", &self.inner.account_id)
            .field("status", &self.status())
            .finish()
    }
}

impl SessionInner {
    async fn establish(
        self: &Arc<Self>,
        credential: &Credential,
    ) -> Result<AccountSnapshot, ProtocolError> {
        let url = login_url(&self.gateway, credential)?;
        let Connection { outbound, inbound } = self.connector.connect(url.as_str()).await?;

        if !self.transition(SessionStatus::Connecting, SessionStatus::LoggingIn) {
            return Err(ProtocolError::Disconnected);
        }
        *self.outbound.lock() = Some(outbound);
        let reader = tokio::spawn(Arc::clone(self).read_loop(inbound));
        if let Some(previous) = self.reader_task.lock().replace(reader) {
            previous.abort();
        }

        let request = LoginRequest {
            sharer_id: 0,
            sharer_open_id: String::new(),
            device_info: Some(DeviceInfo {
                client_version: self.gateway.client_version.clone(),
                sys_software: self.gateway.os.clone(),
                network: "wifi".into(),
                memory: 7672,
                device_id: String::new(),
            }),
            share_cfg_id: 0,
            scene_id: "1256".into(),
            report_data: Some(ReportData {
                minigame_channel: "other".into(),
                minigame_platid: 2,
                ..Default::default()
            }),
        };
        let reply = self
            .send(
                USER_SERVICE,
                LOGIN_METHOD,
                request.encode_to_vec().into(),
                self.settings.request_timeout(),
            )?
            .wait()
            .await?;
        let login = LoginReply::decode(reply.body.as_ref())?;

        let snapshot = {
            let mut snapshot = self.snapshot.lock();
            if let Some(basic) = login.basic {
                snapshot.gid = basic.gid;
                snapshot.name = if basic.name.is_empty() { "unknown".into() } else { basic.name };
                snapshot.level = basic.level;
                snapshot.gold = basic.gold;
                snapshot.exp = basic.exp;
            }
            snapshot.clone()
        };
        self.clock.sync(login.time_now_millis);

        if !self.transition(SessionStatus::LoggingIn, SessionStatus::Ready) {
            return Err(ProtocolError::Disconnected);
        }

        tracing::info!(
            account_id = self.account_id,
            session_id = %self.id,
            gid = snapshot.gid,
            name = %snapshot.name,
            level = snapshot.level,
            gold = snapshot.gold,
            "Login successful"
        );
        let _ = self.events.send(SessionEvent::LoginSuccess(snapshot.clone()));

        self.heartbeat.lock().reset(Instant::now());
        let heartbeat = tokio::spawn(Arc::clone(self).heartbeat_loop());
        if let Some(previous) = self.heartbeat_task.lock().replace(heartbeat) {
            previous.abort();
        }

        Ok(snapshot)
    }

    /// Move from `from` to `to`; false if the status changed underneath.
    fn transition(&self, from: SessionStatus, to: SessionStatus) -> bool {
        let mut status = self.status.lock();
        if *status != from {
            return false;
        }
        *status = to;
        drop(status);
        metrics::record_session_transition(to.as_str());
        true
    }

    /// Register and transmit a request regardless of lifecycle status.
    fn send(
        &self,
        service: &str,
        method: &str,
        body: Bytes,
        timeout: Duration,
    ) -> Result<PendingReply, ProtocolError> {
        let label = format!("{service}.{method}");
        let Some(outbound) = self.outbound.lock().clone() else {
            return Err(ProtocolError::NotConnected(label));
        };

        let seq = self.sequence.next_client_seq();
        let pending = self.pending.register(seq, label, timeout);
        let ack = self.sequence.highest_server_seq();
        let frame = Envelope::request(service, method, seq, ack, body).encode();

        if outbound.send(frame).is_err() {
            // Dropping the pending reply removes its table entry
            drop(pending);
            return Err(ProtocolError::Transport("connection closed".into()));
        }
        tracing::trace!(session_id = %self.id, seq, method, "Request sent");
        Ok(pending)
    }

    async fn read_loop(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<TransportEvent>) {
        let reason = loop {
            match inbound.recv().await {
                Some(TransportEvent::Frame(frame)) => {
                    if let Some(reason) = self.handle_frame(&frame) {
                        break reason;
                    }
                }
                Some(TransportEvent::Closed(reason)) => {
                    break reason.unwrap_or_else(|| "connection closed".into());
                }
                None => break "transport gone".into(),
            }
        };
        self.teardown(&reason);
    }

    /// Route one inbound frame. Returns a reason when the session must end.
    fn handle_frame(&self, frame: &[u8]) -> Option<String> {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Dropping undecodable frame");
                return None;
            }
        };
        self.sequence.observe_server_seq(envelope.server_seq);

        match envelope.message_type {
            MessageType::Push => {
                let event = {
                    let mut snapshot = self.snapshot.lock();
                    self.dispatcher.dispatch(&envelope.body, &mut snapshot)
                };
                let event = event?;
                let kicked = matches!(event, SessionEvent::Kickout { .. });
                tracing::debug!(session_id = %self.id, event = event.event_name(), "Push event");
                let _ = self.events.send(event);
                if kicked {
                    return Some("kicked out by server".into());
                }
            }
            MessageType::Reply => {
                self.pending.complete(envelope);
            }
            MessageType::Request => {
                tracing::trace!(
                    session_id = %self.id,
                    method = %envelope.label(),
                    "Ignoring server request"
                );
            }
        }
        None
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.settings.heartbeat_interval());
        ticker.tick().await; // Skip first immediate tick

        loop {
            ticker.tick().await;

            let gid = self.snapshot.lock().gid;
            if gid == 0 {
                continue;
            }

            let liveness = self.heartbeat.lock().check(Instant::now());
            match liveness {
                Liveness::Healthy => {}
                Liveness::Stale { misses, silent_for } => {
                    tracing::warn!(
                        account_id = self.account_id,
                        session_id = %self.id,
                        misses,
                        silent_secs = silent_for.as_secs(),
                        "Connection may be down"
                    );
                }
                Liveness::Unresponsive { misses, silent_for } => {
                    let failed = self.pending.fail_all(ProtocolError::Liveness);
                    tracing::warn!(
                        account_id = self.account_id,
                        session_id = %self.id,
                        misses,
                        silent_secs = silent_for.as_secs(),
                        failed,
                        "Connection unresponsive, pending requests cleared"
                    );
                }
            }

            let request = HeartbeatRequest {
                gid,
                client_version: self.gateway.client_version.clone(),
            };
            let pending = match self.send(
                USER_SERVICE,
                HEARTBEAT_METHOD,
                request.encode_to_vec().into(),
                self.settings.request_timeout(),
            ) {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::debug!(session_id = %self.id, error = %e, "Heartbeat not sent");
                    continue;
                }
            };

            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                match pending.wait().await {
                    Ok(reply) => {
                        let cleared = inner.heartbeat.lock().record_reply(Instant::now());
                        if cleared > 0 {
                            tracing::info!(
                                account_id = inner.account_id,
                                session_id = %inner.id,
                                misses = cleared,
                                "Heartbeat answered again"
                            );
                        }
                        match HeartbeatReply::decode(reply.body.as_ref()) {
                            Ok(hb) => inner.clock.sync(hb.server_time),
                            Err(e) => tracing::debug!(error = %e, "Undecodable heartbeat reply"),
                        }
                    }
                    Err(e) => {
                        tracing::debug!(session_id = %inner.id, error = %e, "Heartbeat failed")
                    }
                }
            });
        }
    }

    /// Tear down from outside the reader task.
    fn shutdown(&self, reason: &str) {
        self.teardown(reason);
        if let Some(reader) = self.reader_task.lock().take() {
            reader.abort();
        }
    }

    /// Move to `Disconnected`, releasing everything the connection holds.
    /// Idempotent.
    fn teardown(&self, reason: &str) {
        let previous = std::mem::replace(&mut *self.status.lock(), SessionStatus::Disconnected);
        if previous == SessionStatus::Disconnected {
            return;
        }

        self.outbound.lock().take();
        if let Some(task) = self.heartbeat_task.lock().take() {
            task.abort();
        }
        let failed = self.pending.fail_all(ProtocolError::Disconnected);

        tracing::info!(
            account_id = self.account_id,
            session_id = %self.id,
            from = previous.as_str(),
            failed,
            reason,
            "Session disconnected"
        );
        metrics::record_session_transition(SessionStatus::Disconnected.as_str());
        let _ = self.events.send(SessionEvent::Disconnected {
            reason: reason.to_string(),
        });
    }
}

/// Build the gateway URL carrying login parameters.
fn login_url(
    gateway: &GatewaySettings,
    credential: &Credential,
) -> Result<url::Url, ProtocolError> {
    url::Url::parse_with_params(
        &gateway.url,
        &[
            ("platform", credential.platform.as_str()),
            ("os", gateway.os.as_str()),
            ("ver", gateway.client_version.as_str()),
            ("code", credential.code.as_str()),
            ("openID", ""),
        ],
    )
    .map_err(|e| ProtocolError::Transport(format!("invalid gateway url: {e}")))
}

fn request_outcome(outcome: &Result<Bytes, ProtocolError>) -> &'static str {
    match outcome {
        Ok(_) => "ok",
        Err(ProtocolError::Remote { .. }) => "remote_error",
        Err(ProtocolError::Timeout { .. }) => "timeout",
        Err(ProtocolError::NotConnected(_)) => "not_connected",
        Err(ProtocolError::Liveness) => "liveness",
        Err(ProtocolError::Disconnected) => "disconnected",
        Err(_) => "error",
    }
}
