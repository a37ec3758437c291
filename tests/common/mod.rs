//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure: an in-process fake
//! gateway speaking the envelope protocol, and an in-memory store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use prost::Message;
use tokio::sync::mpsc;

use farm_runner::config::{
    DatabaseSettings, GatewaySettings, SchedulerSettings, SessionSettings, Settings,
};
use farm_runner::domain::{
    Account, AccountRepository, AccountStats, AccountStatus, LandRecord, LandRepository, NewAccount,
};
use farm_runner::protocol::codec::{Envelope, MessageType};
use farm_runner::protocol::messages::{
    EventMessage, HeartbeatReply, LoginReply, UserBasic, HEARTBEAT_METHOD, LOGIN_METHOD,
    USER_SERVICE,
};
use farm_runner::protocol::session::{Credential, Session, SessionFactory};
use farm_runner::protocol::transport::{Connection, Connector, TransportEvent};
use farm_runner::shared::clock::ServerClock;
use farm_runner::shared::error::{AppError, ProtocolError};

pub const TEST_GID: i64 = 10_001;

// =============================================================================
// Settings
// =============================================================================

pub fn gateway_settings() -> GatewaySettings {
    GatewaySettings {
        url: "ws://gateway.test/ws".into(),
        client_version: "1.6.0".into(),
        os: "iOS".into(),
        user_agent: "farm-runner-tests".into(),
        origin: String::new(),
    }
}

pub fn session_settings() -> SessionSettings {
    SessionSettings {
        preconnect_min_ms: 0,
        preconnect_max_ms: 0,
        observe_window_secs: 5,
        ..SessionSettings::default()
    }
}

pub fn settings(database_url: &str) -> Settings {
    Settings {
        gateway: gateway_settings(),
        session: session_settings(),
        scheduler: SchedulerSettings::default(),
        database: DatabaseSettings {
            url: database_url.into(),
            max_connections: 1,
            acquire_timeout: 5,
        },
        environment: "test".into(),
    }
}

pub fn credential() -> Credential {
    Credential {
        code: "test-code".into(),
        platform: "qq".into(),
    }
}

// =============================================================================
// Fake gateway
// =============================================================================

/// Connector that hands each new connection to the test as a `GatewayPeer`.
pub struct FakeConnector {
    peers: mpsc::UnboundedSender<GatewayPeer>,
    refuse: bool,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<GatewayPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { peers, refuse: false }), rx)
    }

    /// A connector whose every connection attempt fails.
    pub fn refusing() -> Arc<Self> {
        let (peers, _) = mpsc::unbounded_channel();
        Arc::new(Self { peers, refuse: true })
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ProtocolError> {
        if self.refuse {
            return Err(ProtocolError::Transport("connection refused".into()));
        }
        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();
        let peer = GatewayPeer {
            url: url.to_string(),
            from_client,
            to_client,
            server_seq: Arc::new(AtomicU64::new(1)),
        };
        self.peers
            .send(peer)
            .map_err(|_| ProtocolError::Transport("test gateway gone".into()))?;
        Ok(Connection { outbound, inbound })
    }
}

/// Server side of one fake connection.
pub struct GatewayPeer {
    pub url: String,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    server_seq: Arc<AtomicU64>,
}

impl GatewayPeer {
    /// Next request from the client; `None` once the client hung up.
    pub async fn next_request(&mut self) -> Option<Envelope> {
        let frame = self.from_client.recv().await?;
        Some(Envelope::decode(&frame).expect("client sent an undecodable frame"))
    }

    /// Next request that is not a heartbeat.
    pub async fn next_call(&mut self) -> Option<Envelope> {
        loop {
            let request = self.next_request().await?;
            if request.method_name != HEARTBEAT_METHOD {
                return Some(request);
            }
        }
    }

    fn send_envelope(&self, envelope: Envelope) {
        let _ = self.to_client.send(TransportEvent::Frame(envelope.encode()));
    }

    fn next_server_seq(&self) -> u64 {
        self.server_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn reply(&self, request: &Envelope, body: Vec<u8>) {
        self.send_envelope(Envelope {
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
            message_type: MessageType::Reply,
            client_seq: request.client_seq,
            server_seq: self.next_server_seq(),
            error_code: 0,
            error_message: String::new(),
            body: body.into(),
        });
    }

    pub fn reply_error(&self, request: &Envelope, code: i64, message: &str) {
        self.send_envelope(Envelope {
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
            message_type: MessageType::Reply,
            client_seq: request.client_seq,
            server_seq: self.next_server_seq(),
            error_code: code,
            error_message: message.into(),
            body: Default::default(),
        });
    }

    pub fn push(&self, tag: &str, body: Vec<u8>) {
        let event = EventMessage {
            message_type: tag.into(),
            body,
        };
        self.send_envelope(Envelope {
            service_name: "gamepb.pushpb.PushService".into(),
            method_name: String::new(),
            message_type: MessageType::Push,
            client_seq: 0,
            server_seq: self.next_server_seq(),
            error_code: 0,
            error_message: String::new(),
            body: event.encode_to_vec().into(),
        });
    }

    pub fn send_raw(&self, frame: Vec<u8>) {
        let _ = self.to_client.send(TransportEvent::Frame(frame));
    }

    pub fn close(&self, reason: &str) {
        let _ = self.to_client.send(TransportEvent::Closed(Some(reason.into())));
    }

    /// Answer the login request with a fixed profile.
    pub async fn accept_login(&mut self) -> Envelope {
        self.accept_login_at(Utc::now().timestamp_millis()).await
    }

    /// Answer the login request, reporting `server_millis` as server time.
    pub async fn accept_login_at(&mut self, server_millis: i64) -> Envelope {
        let request = self.next_request().await.expect("login request");
        assert_eq!(request.service_name, USER_SERVICE);
        assert_eq!(request.method_name, LOGIN_METHOD);
        let reply = LoginReply {
            basic: Some(UserBasic {
                gid: TEST_GID,
                name: "farmer".into(),
                level: 12,
                gold: 3400,
                exp: 5600,
            }),
            time_now_millis: server_millis,
        };
        self.reply(&request, reply.encode_to_vec());
        request
    }

    /// Answer heartbeats and ignore everything else, until the client hangs up.
    pub async fn answer_heartbeats(mut self) {
        while let Some(request) = self.next_request().await {
            if request.method_name == HEARTBEAT_METHOD {
                self.reply_heartbeat(&request, Utc::now().timestamp_millis());
            }
        }
    }

    pub fn reply_heartbeat(&self, request: &Envelope, server_millis: i64) {
        let reply = HeartbeatReply {
            server_time: server_millis,
        };
        self.reply(request, reply.encode_to_vec());
    }
}

pub fn session_factory(connector: Arc<dyn Connector>) -> SessionFactory {
    SessionFactory::new(
        gateway_settings(),
        session_settings(),
        connector,
        Arc::new(ServerClock::new()),
    )
}

/// Create a session and complete its login against a fresh peer.
pub async fn connected_session(
    factory: &SessionFactory,
    peers: &mut mpsc::UnboundedReceiver<GatewayPeer>,
) -> (Session, GatewayPeer) {
    let session = factory.create(1);
    let cred = credential();
    let (login, peer) = tokio::join!(session.connect(&cred), async {
        let mut peer = peers.recv().await.expect("connection attempt");
        peer.accept_login().await;
        peer
    });
    login.expect("login should succeed");
    (session, peer)
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct StoreState {
    accounts: HashMap<i64, Account>,
    own_lands: HashMap<(i64, i64), LandRecord>,
    friends: HashMap<(i64, i64), i64>,
    friend_lands: HashMap<(i64, i64), LandRecord>,
}

/// In-memory implementation of both repository traits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(StoreState::default()),
            next_id: AtomicI64::new(1),
        })
    }

    pub fn disable(&self, id: i64) {
        if let Some(account) = self.state.lock().accounts.get_mut(&id) {
            account.status = AccountStatus::Disabled;
        }
    }

    pub fn account(&self, id: i64) -> Option<Account> {
        self.state.lock().accounts.get(&id).cloned()
    }

    pub fn friend_count(&self, account_id: i64) -> usize {
        self.state.lock().friends.keys().filter(|(a, _)| *a == account_id).count()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create(&self, account: &NewAccount) -> Result<Account, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let created = Account {
            id,
            gid: None,
            name: account.name.clone(),
            code: account.code.clone(),
            platform: account.platform.clone(),
            level: 0,
            gold: 0,
            exp: 0,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().accounts.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AppError> {
        Ok(self.account(id))
    }

    async fn find_active(&self) -> Result<Vec<Account>, AppError> {
        let mut active: Vec<Account> = self
            .state
            .lock()
            .accounts
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|a| a.id);
        Ok(active)
    }

    async fn is_active(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.account(id).is_some_and(|a| a.is_active()))
    }

    async fn update_stats(&self, id: i64, stats: &AccountStats) -> Result<(), AppError> {
        let mut state = self.state.lock();
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Account with id {} not found", id)))?;
        if stats.gid != 0 {
            account.gid = Some(stats.gid);
        }
        if !stats.name.is_empty() {
            account.name = stats.name.clone();
        }
        account.level = stats.level;
        account.gold = stats.gold;
        account.exp = stats.exp;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.state
            .lock()
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Account with id {} not found", id)))
    }
}

#[async_trait]
impl LandRepository for MemoryStore {
    async fn upsert_own_land(&self, account_id: i64, land: &LandRecord) -> Result<(), AppError> {
        self.state.lock().own_lands.insert((account_id, land.land_id), land.clone());
        Ok(())
    }

    async fn upsert_friend(
        &self,
        account_id: i64,
        gid: i64,
        _name: &str,
        _level: i64,
    ) -> Result<i64, AppError> {
        let mut state = self.state.lock();
        let next = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(*state.friends.entry((account_id, gid)).or_insert(next))
    }

    async fn upsert_friend_land(&self, friend_id: i64, land: &LandRecord) -> Result<(), AppError> {
        self.state.lock().friend_lands.insert((friend_id, land.land_id), land.clone());
        Ok(())
    }

    async fn own_lands(&self, account_id: i64) -> Result<Vec<LandRecord>, AppError> {
        let mut lands: Vec<LandRecord> = self
            .state
            .lock()
            .own_lands
            .iter()
            .filter(|((a, _), _)| *a == account_id)
            .map(|(_, land)| land.clone())
            .collect();
        lands.sort_by_key(|l| l.land_id);
        Ok(lands)
    }

    async fn next_maturity(&self, account_id: i64, now: i64) -> Result<Option<i64>, AppError> {
        let state = self.state.lock();
        let own = state
            .own_lands
            .iter()
            .filter(|((a, _), _)| *a == account_id)
            .map(|(_, l)| l.mature_time);
        let friend_ids: Vec<i64> = state
            .friends
            .iter()
            .filter(|((a, _), _)| *a == account_id)
            .map(|(_, id)| *id)
            .collect();
        let friends = state
            .friend_lands
            .iter()
            .filter(|((f, _), _)| friend_ids.contains(f))
            .map(|(_, l)| l.mature_time);
        Ok(own.chain(friends).filter(|t| *t > now).min())
    }
}

/// Long enough that a request never times out inside a test.
pub const LONG: Duration = Duration::from_secs(600);
