use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Header carrying the caller identity (used by `header`).
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    /// Shared key (required by `api_key`).
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_identity_header() -> String {
    "x-user-id".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Identity derived from the caller's address.
    None,
    /// Identity read from a header set by the portal's session layer.
    Header,
    /// Shared API key, one identity for every caller.
    ApiKey,
}

/// Admission queue configuration.
///
/// All durations are in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// When disabled the admission gate lets every request through.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of concurrently active tickets.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Upper bound on promotions per pass (None = fill every free slot).
    #[serde(default)]
    pub max_promotions_per_tick: Option<usize>,

    /// A waiting ticket not polled for this long is expired.
    #[serde(default = "default_max_idle_wait")]
    pub max_idle_wait_secs: u64,

    /// An active ticket not seen for this long is expired.
    #[serde(default = "default_max_idle_active")]
    pub max_idle_active_secs: u64,

    /// Hard cap on how long a ticket may stay active.
    #[serde(default = "default_max_active_lifetime")]
    pub max_active_lifetime_secs: u64,

    /// How long expired tickets are kept around before being purged.
    #[serde(default = "default_retention_window")]
    pub retention_window_secs: u64,

    /// Promotion tick interval in milliseconds.
    #[serde(default = "default_promotion_tick")]
    pub promotion_tick_interval_ms: u64,

    /// Sweep interval in milliseconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Release interval assumed before any release has been observed.
    #[serde(default = "default_release_interval")]
    pub default_release_interval_secs: f64,

    /// Number of recent releases kept for the cadence estimate.
    #[serde(default = "default_sample_window")]
    pub release_sample_window: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_capacity() -> usize {
    100
}

fn default_max_idle_wait() -> u64 {
    30
}

fn default_max_idle_active() -> u64 {
    600 // 10 minutes
}

fn default_max_active_lifetime() -> u64 {
    900 // 15 minutes
}

fn default_retention_window() -> u64 {
    300
}

fn default_promotion_tick() -> u64 {
    1000
}

fn default_sweep_interval() -> u64 {
    5000
}

fn default_release_interval() -> f64 {
    1.0
}

fn default_sample_window() -> usize {
    32
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: default_capacity(),
            max_promotions_per_tick: None,
            max_idle_wait_secs: default_max_idle_wait(),
            max_idle_active_secs: default_max_idle_active(),
            max_active_lifetime_secs: default_max_active_lifetime(),
            retention_window_secs: default_retention_window(),
            promotion_tick_interval_ms: default_promotion_tick(),
            sweep_interval_ms: default_sweep_interval(),
            default_release_interval_secs: default_release_interval(),
            release_sample_window: default_sample_window(),
        }
    }
}

impl QueueConfig {
    pub fn max_idle_wait(&self) -> chrono::Duration {
        seconds(self.max_idle_wait_secs)
    }

    pub fn max_idle_active(&self) -> chrono::Duration {
        seconds(self.max_idle_active_secs)
    }

    pub fn max_active_lifetime(&self) -> chrono::Duration {
        seconds(self.max_active_lifetime_secs)
    }

    pub fn retention_window(&self) -> chrono::Duration {
        seconds(self.retention_window_secs)
    }

    pub fn promotion_tick_interval(&self) -> Duration {
        Duration::from_millis(self.promotion_tick_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Out-of-range values saturate at `chrono::Duration::MAX`; `validate_config`
/// keeps real configs far below that.
fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Settings for the `queueToken` cookie.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CookieConfig {
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_same_site")]
    pub same_site: SameSite,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Empty means a host-only cookie.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_cookie_max_age")]
    pub max_age_secs: i64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

fn default_same_site() -> SameSite {
    SameSite::Lax
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cookie_max_age() -> i64 {
    3600
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false,
            same_site: default_same_site(),
            path: default_cookie_path(),
            domain: None,
            max_age_secs: default_cookie_max_age(),
        }
    }
}

/// Admin endpoint configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AdminConfig {
    /// Key required on admin endpoints. Admin endpoints are disabled without it.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub reset_enabled: bool,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub cookie: CookieConfig,
    pub admin: SanitizedAdminConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub identity_header: String,
    pub api_key_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAdminConfig {
    pub enabled: bool,
    pub reset_enabled: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::Header => "header".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                identity_header: config.auth.identity_header.clone(),
                api_key_configured: config.auth.api_key.is_some(),
            },
            server: config.server.clone(),
            queue: config.queue.clone(),
            cookie: config.cookie.clone(),
            admin: SanitizedAdminConfig {
                enabled: config.admin.api_key.is_some(),
                reset_enabled: config.admin.reset_enabled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                identity_header: default_identity_header(),
                api_key: None,
            },
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            cookie: CookieConfig::default(),
            admin: AdminConfig::default(),
        }
    }

    #[test]
    fn test_deserialize_valid_config_with_none_auth() {
        let toml = r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_defaults() {
        let toml = r#"
[auth]
method = "header"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.identity_header, "x-user-id");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert!(config.queue.enabled);
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.queue.max_promotions_per_tick, None);
        assert_eq!(config.queue.promotion_tick_interval_ms, 1000);
        assert_eq!(config.cookie.same_site, SameSite::Lax);
        assert_eq!(config.cookie.path, "/");
        assert!(!config.admin.reset_enabled);
    }

    #[test]
    fn test_deserialize_missing_auth_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_queue_section() {
        let toml = r#"
[auth]
method = "none"

[queue]
capacity = 2
max_promotions_per_tick = 10
max_idle_wait_secs = 15
retention_window_secs = 60
default_release_interval_secs = 2.5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.queue.capacity, 2);
        assert_eq!(config.queue.max_promotions_per_tick, Some(10));
        assert_eq!(config.queue.max_idle_wait(), chrono::Duration::seconds(15));
        assert_eq!(config.queue.retention_window(), chrono::Duration::seconds(60));
        assert_eq!(config.queue.default_release_interval_secs, 2.5);
        // untouched fields keep their defaults
        assert_eq!(config.queue.max_active_lifetime_secs, 900);
    }

    #[test]
    fn test_oversized_durations_saturate() {
        let queue = QueueConfig {
            max_idle_wait_secs: 10_000_000_000_000_000,
            retention_window_secs: u64::MAX,
            ..QueueConfig::default()
        };
        assert_eq!(queue.max_idle_wait(), chrono::Duration::MAX);
        assert_eq!(queue.retention_window(), chrono::Duration::MAX);
        assert_eq!(queue.max_idle_active(), chrono::Duration::seconds(600));
    }

    #[test]
    fn test_sanitized_config_hides_keys() {
        let mut config = minimal_config();
        config.auth.method = AuthMethod::ApiKey;
        config.auth.api_key = Some("secret".to_string());
        config.admin.api_key = Some("admin-secret".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(sanitized.auth.api_key_configured);
        assert!(sanitized.admin.enabled);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_sanitized_config_defaults() {
        let sanitized = SanitizedConfig::from(&minimal_config());
        assert_eq!(sanitized.auth.method, "none");
        assert!(!sanitized.auth.api_key_configured);
        assert!(!sanitized.admin.enabled);
        assert_eq!(sanitized.server.port, 8080);
    }
}
