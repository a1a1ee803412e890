//! Configuration for the Tailgate gateway.

use std::{collections::HashSet, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.toml";

/// Complete gateway configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// The route table is built once from this config at startup; flags like
/// `disable_auth` and `debug` decide which gates and routes are mounted and
/// are never consulted per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // Auth
    /// Shared secret tokens are signed with. Rotating it invalidates every
    /// outstanding token.
    ///
    /// Environment variable: `GLOBAL_SECRET`
    #[serde(default, alias = "GLOBAL_SECRET")]
    pub global_secret: String,
    /// Disables every auth gate at route construction. Local development
    /// only.
    ///
    /// Environment variable: `DISABLE_AUTH`
    #[serde(default, alias = "DISABLE_AUTH")]
    pub disable_auth: bool,
    /// Mounts debug-only routes.
    ///
    /// Environment variable: `DEBUG_MODE`
    #[serde(default, alias = "DEBUG_MODE")]
    pub debug: bool,
    /// Comma-separated accounts allowed through the internal gate.
    ///
    /// Environment variable: `INTERNAL_ACCOUNTS`
    #[serde(default, alias = "INTERNAL_ACCOUNTS")]
    pub internal_accounts: String,

    // Dedup
    /// Seconds a dedup entry stays authoritative. Also bounds how long a
    /// stale claim can block retries.
    ///
    /// Environment variable: `DEDUP_TTL_SECONDS`
    #[serde(default = "default_dedup_ttl", alias = "DEDUP_TTL_SECONDS")]
    pub dedup_ttl_seconds: u64,
    /// Keys per batch when bulk-deleting blobs under a prefix.
    ///
    /// Environment variable: `CACHE_SCAN_BATCH_SIZE`
    #[serde(default = "default_scan_batch_size", alias = "CACHE_SCAN_BATCH_SIZE")]
    pub cache_scan_batch_size: usize,

    // Worker
    /// Archive worker poll interval in milliseconds.
    ///
    /// Environment variable: `WORKER_POLL_INTERVAL_MS`
    #[serde(default = "default_poll_interval_ms", alias = "WORKER_POLL_INTERVAL_MS")]
    pub worker_poll_interval_ms: u64,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Accounts allowed through the internal gate.
    pub fn internal_allowlist(&self) -> HashSet<String> {
        self.internal_accounts
            .split(',')
            .map(str::trim)
            .filter(|account| !account.is_empty())
            .map(String::from)
            .collect()
    }

    /// Dedup entry TTL as a duration.
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_seconds)
    }

    /// Archive worker poll interval as a duration.
    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    /// Get the global secret with its value masked for logging.
    pub fn global_secret_masked(&self) -> String {
        if self.global_secret.is_empty() {
            "(unset)".to_string()
        } else {
            "***".to_string()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if !self.disable_auth && self.global_secret.is_empty() {
            anyhow::bail!("global_secret must be set when auth is enabled");
        }

        if self.dedup_ttl_seconds == 0 {
            anyhow::bail!("dedup_ttl_seconds must be greater than 0");
        }

        if self.cache_scan_batch_size == 0 {
            anyhow::bail!("cache_scan_batch_size must be greater than 0");
        }

        if self.worker_poll_interval_ms == 0 {
            anyhow::bail!("worker_poll_interval_ms must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            global_secret: String::new(),
            disable_auth: false,
            debug: false,
            internal_accounts: String::new(),
            dedup_ttl_seconds: default_dedup_ttl(),
            cache_scan_batch_size: default_scan_batch_size(),
            worker_poll_interval_ms: default_poll_interval_ms(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_dedup_ttl() -> u64 {
    3600
}

fn default_scan_batch_size() -> usize {
    100
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, env, sync::Mutex};

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct TestEnvGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        vars: Vec<String>,
        originals: HashMap<String, Option<String>>,
    }

    impl TestEnvGuard {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Self { _lock: lock, vars: Vec::new(), originals: HashMap::new() }
        }

        fn set_var(&mut self, key: &str, value: &str) {
            if !self.vars.contains(&key.to_string()) {
                self.originals.insert(key.to_string(), env::var(key).ok());
                self.vars.push(key.to_string());
            }
            env::set_var(key, value);
        }
    }

    impl Drop for TestEnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                match self.originals.get(var) {
                    Some(Some(value)) => env::set_var(var, value),
                    Some(None) => env::remove_var(var),
                    None => {},
                }
            }
        }
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.dedup_ttl_seconds, 3600);
        assert_eq!(config.cache_scan_batch_size, 100);
        assert!(!config.disable_auth);
        assert!(!config.debug);

        // Defaults fail validation only because no secret is configured.
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_take_priority() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("HOST", "0.0.0.0");
        guard.set_var("PORT", "9090");
        guard.set_var("GLOBAL_SECRET", "env-secret");
        guard.set_var("DEBUG_MODE", "true");
        guard.set_var("INTERNAL_ACCOUNTS", "ops, tooling");
        guard.set_var("DEDUP_TTL_SECONDS", "120");
        guard.set_var("WORKER_POLL_INTERVAL_MS", "50");

        let config = Config::load().expect("config should load with env overrides");

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9090);
        assert_eq!(config.global_secret, "env-secret");
        assert!(config.debug);
        assert_eq!(config.dedup_ttl(), Duration::from_secs(120));
        assert_eq!(config.worker_poll_interval(), Duration::from_millis(50));

        let allowlist = config.internal_allowlist();
        assert!(allowlist.contains("ops"));
        assert!(allowlist.contains("tooling"));
        assert_eq!(allowlist.len(), 2);
    }

    #[test]
    fn disable_auth_permits_empty_secret() {
        let config = Config { disable_auth: true, ..Config::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_config_validation_fails() {
        let mut config = Config { global_secret: "s".into(), ..Config::default() };
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config { global_secret: "s".into(), ..Config::default() };
        config.dedup_ttl_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config { global_secret: "s".into(), ..Config::default() };
        config.cache_scan_batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config { global_secret: "s".into(), ..Config::default() };
        config.worker_poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn secret_masking_never_reveals_value() {
        let config = Config { global_secret: "super-secret".into(), ..Config::default() };
        assert!(!config.global_secret_masked().contains("super-secret"));

        let config = Config::default();
        assert_eq!(config.global_secret_masked(), "(unset)");
    }

    #[test]
    fn socket_address_parsing() {
        let config = Config { host: "127.0.0.1".into(), port: 9000, ..Config::default() };

        let addr = config.parse_server_addr().expect("should parse socket address");
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }
}
