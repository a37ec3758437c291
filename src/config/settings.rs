//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Game gateway endpoint and client identity
    pub gateway: GatewaySettings,

    /// Per-session timing
    pub session: SessionSettings,

    /// Wake-delay policy
    pub scheduler: SchedulerSettings,

    /// SQLite store configuration
    pub database: DatabaseSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Gateway connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// WebSocket URL of the gateway, without login query parameters
    pub url: String,

    /// Client version reported at login and in heartbeats
    pub client_version: String,

    /// Operating system reported at login
    pub os: String,

    /// User-Agent header sent on the upgrade request
    pub user_agent: String,

    /// Origin header sent on the upgrade request (empty to omit)
    pub origin: String,
}

/// Session timing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Default per-request timeout in milliseconds (default: 10000)
    pub request_timeout_ms: u64,

    /// Heartbeat interval in milliseconds (default: 25000)
    pub heartbeat_interval_ms: u64,

    /// Silence after which a heartbeat tick counts as a miss (default: 60000)
    pub heartbeat_stale_ms: u64,

    /// Consecutive misses before pending requests are force-failed (default: 2)
    pub heartbeat_miss_limit: u32,

    /// Lower bound of the random delay before connecting (default: 2000)
    pub preconnect_min_ms: u64,

    /// Upper bound of the random delay before connecting (default: 5000)
    pub preconnect_max_ms: u64,

    /// How long the default routine observes a session (default: 20)
    pub observe_window_secs: u64,

    /// Capacity of the session event channel (default: 256)
    pub event_capacity: usize,
}

/// Scheduler wake-delay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Shortest wake delay in seconds (default: 1800)
    pub min_interval_secs: u64,

    /// Longest randomized wake delay in seconds (default: 5400)
    pub max_interval_secs: u64,

    /// Lower bound of the jitter added after a maturity time (default: 15)
    pub jitter_min_secs: u64,

    /// Upper bound of the jitter added after a maturity time (default: 35)
    pub jitter_max_secs: u64,
}

/// SQLite database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a range is inverted or empty.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("gateway.url", "wss://gate-obt.nqf.qq.com/prod/ws")?
            .set_default("gateway.client_version", "1.6.0.14_20251224")?
            .set_default("gateway.os", "iOS")?
            .set_default(
                "gateway.user_agent",
                concat!(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
                    "(KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 ",
                    "MicroMessenger/7.0.20.1781(0x6700143B) NetType/WIFI ",
                    "MiniProgramEnv/Windows WindowsWechat/WMPF WindowsWechat(0x63090a13)"
                ),
            )?
            .set_default("gateway.origin", "https://gate-obt.nqf.qq.com")?
            .set_default("session.request_timeout_ms", 10_000_i64)?
            .set_default("session.heartbeat_interval_ms", 25_000_i64)?
            .set_default("session.heartbeat_stale_ms", 60_000_i64)?
            .set_default("session.heartbeat_miss_limit", 2)?
            .set_default("session.preconnect_min_ms", 2_000_i64)?
            .set_default("session.preconnect_max_ms", 5_000_i64)?
            .set_default("session.observe_window_secs", 20)?
            .set_default("session.event_capacity", 256)?
            .set_default("scheduler.min_interval_secs", 30 * 60)?
            .set_default("scheduler.max_interval_secs", 90 * 60)?
            .set_default("scheduler.jitter_min_secs", 15)?
            .set_default("scheduler.jitter_max_secs", 35)?
            .set_default("database.url", "sqlite://data/farm.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("database.acquire_timeout", 30)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SESSION__REQUEST_TIMEOUT_MS=5000 -> session.request_timeout_ms = 5000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("gateway.url", std::env::var("GATEWAY_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Check cross-field constraints the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.min_interval_secs == 0 || s.min_interval_secs > s.max_interval_secs {
            return Err(ConfigError::Message(format!(
                "scheduler interval range is invalid: min={}s max={}s",
                s.min_interval_secs, s.max_interval_secs
            )));
        }
        if s.jitter_min_secs > s.jitter_max_secs {
            return Err(ConfigError::Message(format!(
                "scheduler jitter range is invalid: min={}s max={}s",
                s.jitter_min_secs, s.jitter_max_secs
            )));
        }

        let sess = &self.session;
        if sess.preconnect_min_ms > sess.preconnect_max_ms {
            return Err(ConfigError::Message(format!(
                "pre-connect delay range is invalid: min={}ms max={}ms",
                sess.preconnect_min_ms, sess.preconnect_max_ms
            )));
        }
        if sess.request_timeout_ms == 0 || sess.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Message(
                "request timeout and heartbeat interval must be positive".into(),
            ));
        }
        if sess.event_capacity == 0 {
            return Err(ConfigError::Message("session event capacity must be positive".into()));
        }
        Ok(())
    }
}

impl SessionSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_stale(&self) -> Duration {
        Duration::from_millis(self.heartbeat_stale_ms)
    }

    pub fn observe_window(&self) -> Duration {
        Duration::from_secs(self.observe_window_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            heartbeat_interval_ms: 25_000,
            heartbeat_stale_ms: 60_000,
            heartbeat_miss_limit: 2,
            preconnect_min_ms: 2_000,
            preconnect_max_ms: 5_000,
            observe_window_secs: 20,
            event_capacity: 256,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            min_interval_secs: 30 * 60,
            max_interval_secs: 90 * 60,
            jitter_min_secs: 15,
            jitter_max_secs: 35,
        }
    }
}

impl DatabaseSettings {
    /// Get the connection URL.
    pub fn connection_url(&self) -> &str {
        &self.url
    }
}
