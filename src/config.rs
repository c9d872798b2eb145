//! Service configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). Only `ACCESS_TOKEN` is required; everything else has a
//! default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::ChannelId;
use crate::error::RealtimeError;
use crate::relay::{ReconnectPolicy, SessionSettings};

/// Default relay endpoint.
pub const DEFAULT_RELAY_URL: &str = "wss://ws-mt1.pusher.com/app/f44139496d9b75f37d27?protocol=7&client=js&version=8.3.0&flash=false";

/// Default chat backend.
pub const DEFAULT_API_BASE_URL: &str = "https://stanfordohs.pronto.io/";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level service configuration.
///
/// Loaded once at startup via [`RealtimeConfig::from_env`].
#[derive(Clone)]
pub struct RealtimeConfig {
    /// Socket address the control API binds to.
    pub listen_addr: SocketAddr,

    /// Relay WebSocket URL.
    pub relay_url: String,

    /// Chat backend base URL used for subscription auth.
    pub api_base_url: String,

    /// Bearer token for the chat backend.
    pub access_token: String,

    /// Path of the cached bubble overview.
    pub bubble_cache_path: PathBuf,

    /// Channels connected at startup.
    pub autoconnect: Vec<ChannelId>,

    /// Seconds allowed for one auth exchange.
    pub auth_timeout_secs: u64,

    /// Seconds allowed for the relay handshake.
    pub handshake_timeout_secs: u64,

    /// Receive silence, in seconds, before a keepalive ping.
    pub idle_timeout_secs: u64,

    /// Backoff base in seconds.
    pub reconnect_base_secs: u64,

    /// Backoff ceiling in seconds.
    pub reconnect_cap_secs: u64,

    /// Consecutive failures tolerated before a session gives up.
    pub reconnect_max_attempts: u32,

    /// Per-client buffer of the UI bridge.
    pub bridge_buffer: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl RealtimeConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] if `ACCESS_TOKEN` is missing or
    /// `LISTEN_ADDR` cannot be parsed.
    pub fn from_env() -> Result<Self, RealtimeError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`RealtimeConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RealtimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3030".to_string())
            .parse()
            .map_err(|e| RealtimeError::Config(format!("LISTEN_ADDR: {e}")))?;

        let access_token = lookup("ACCESS_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RealtimeError::Config("ACCESS_TOKEN is not set".to_string()))?;

        let autoconnect = lookup("AUTOCONNECT_BUBBLES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(ChannelId::from)
                    .collect()
            })
            .unwrap_or_default();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json" | "JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            relay_url: lookup("RELAY_URL").unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()),
            api_base_url: lookup("API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            access_token,
            bubble_cache_path: lookup("BUBBLE_CACHE_PATH")
                .map_or_else(|| PathBuf::from("bubbleOverview.json"), PathBuf::from),
            autoconnect,
            auth_timeout_secs: parse_key(&lookup, "AUTH_TIMEOUT_SECS", 10),
            handshake_timeout_secs: parse_key(&lookup, "HANDSHAKE_TIMEOUT_SECS", 20),
            idle_timeout_secs: parse_key(&lookup, "IDLE_TIMEOUT_SECS", 30),
            reconnect_base_secs: parse_key(&lookup, "RECONNECT_BASE_SECS", 1),
            reconnect_cap_secs: parse_key(&lookup, "RECONNECT_CAP_SECS", 30),
            reconnect_max_attempts: parse_key(&lookup, "RECONNECT_MAX_ATTEMPTS", 5),
            bridge_buffer: parse_key(&lookup, "BRIDGE_BUFFER", 1024),
            log_format,
        })
    }

    /// Returns the per-session settings derived from this configuration.
    #[must_use]
    pub fn session_settings(&self) -> Arc<SessionSettings> {
        Arc::new(SessionSettings {
            relay_url: self.relay_url.clone(),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            auth_timeout: Duration::from_secs(self.auth_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            policy: ReconnectPolicy::new(
                Duration::from_secs(self.reconnect_base_secs),
                Duration::from_secs(self.reconnect_cap_secs),
                self.reconnect_max_attempts,
            ),
        })
    }

    /// Returns the auth timeout as a [`Duration`].
    #[must_use]
    pub const fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("listen_addr", &self.listen_addr)
            .field("relay_url", &self.relay_url)
            .field("api_base_url", &self.api_base_url)
            .field("bubble_cache_path", &self.bubble_cache_path)
            .field("autoconnect", &self.autoconnect)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_key<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<RealtimeConfig, RealtimeError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RealtimeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let Ok(config) = load(&[("ACCESS_TOKEN", "tok")]) else {
            panic!("config should load");
        };
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:3030");
        assert_eq!(config.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(config.bubble_cache_path, PathBuf::from("bubbleOverview.json"));
        assert!(config.autoconnect.is_empty());
        assert_eq!(config.bridge_buffer, 1024);
        assert_eq!(config.log_format, LogFormat::Text);

        let settings = config.session_settings();
        assert_eq!(settings.idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.policy, ReconnectPolicy::default());
    }

    #[test]
    fn missing_token_is_a_config_error() {
        assert!(matches!(load(&[]), Err(RealtimeError::Config(_))));
        assert!(matches!(load(&[("ACCESS_TOKEN", "  ")]), Err(RealtimeError::Config(_))));
    }

    #[test]
    fn bad_listen_addr_is_a_config_error() {
        let result = load(&[("ACCESS_TOKEN", "t"), ("LISTEN_ADDR", "nope")]);
        assert!(matches!(result, Err(RealtimeError::Config(_))));
    }

    #[test]
    fn overrides_and_autoconnect_list() {
        let Ok(config) = load(&[
            ("ACCESS_TOKEN", "t"),
            ("AUTOCONNECT_BUBBLES", "42, 7,,"),
            ("RECONNECT_MAX_ATTEMPTS", "3"),
            ("IDLE_TIMEOUT_SECS", "bogus"),
            ("LOG_FORMAT", "json"),
        ]) else {
            panic!("config should load");
        };
        assert_eq!(config.autoconnect, vec![ChannelId::from("42"), ChannelId::from("7")]);
        assert_eq!(config.reconnect_max_attempts, 3);
        assert_eq!(config.idle_timeout_secs, 30);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!format!("{config:?}").contains("\"t\""));
    }
}
