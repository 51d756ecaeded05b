use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Ten years. Upper bound for every queue duration setting.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Queue capacity, intervals and estimate settings are usable
/// - Keys are present where the chosen auth method needs them
/// - No duration exceeds [`MAX_DURATION_SECS`]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().map_or(true, str::is_empty)
    {
        return Err(invalid("auth.api_key must be set when auth.method = \"api_key\""));
    }

    if config.auth.method == AuthMethod::Header && config.auth.identity_header.trim().is_empty()
    {
        return Err(invalid("auth.identity_header cannot be empty"));
    }

    if config.admin.reset_enabled && config.admin.api_key.is_none() {
        return Err(invalid("admin.reset_enabled requires admin.api_key"));
    }

    let queue = &config.queue;
    if queue.capacity == 0 {
        return Err(invalid("queue.capacity must be at least 1"));
    }
    if queue.max_promotions_per_tick == Some(0) {
        return Err(invalid(
            "queue.max_promotions_per_tick must be at least 1 (omit it for no limit)",
        ));
    }
    if queue.promotion_tick_interval_ms == 0 || queue.sweep_interval_ms == 0 {
        return Err(invalid("queue tick and sweep intervals cannot be 0"));
    }
    if queue.max_idle_wait_secs == 0
        || queue.max_idle_active_secs == 0
        || queue.max_active_lifetime_secs == 0
    {
        return Err(invalid("queue idle and lifetime limits cannot be 0"));
    }
    let durations = [
        ("max_idle_wait_secs", queue.max_idle_wait_secs),
        ("max_idle_active_secs", queue.max_idle_active_secs),
        ("max_active_lifetime_secs", queue.max_active_lifetime_secs),
        ("retention_window_secs", queue.retention_window_secs),
        ("promotion_tick_interval_ms", queue.promotion_tick_interval_ms / 1000),
        ("sweep_interval_ms", queue.sweep_interval_ms / 1000),
    ];
    if let Some((name, _)) = durations
        .iter()
        .find(|(_, secs)| *secs > MAX_DURATION_SECS)
    {
        return Err(ConfigError::ValidationError(format!(
            "queue.{} exceeds {} seconds",
            name, MAX_DURATION_SECS
        )));
    }
    if queue.max_idle_active_secs > queue.max_active_lifetime_secs {
        return Err(invalid(
            "queue.max_idle_active_secs cannot exceed queue.max_active_lifetime_secs",
        ));
    }
    let interval = queue.default_release_interval_secs;
    if !interval.is_finite() || interval <= 0.0 || interval > MAX_DURATION_SECS as f64 {
        return Err(invalid("queue.default_release_interval_secs must be positive"));
    }
    if queue.release_sample_window < 2 {
        return Err(invalid("queue.release_sample_window must be at least 2"));
    }

    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminConfig, AuthConfig, CookieConfig, QueueConfig, ServerConfig};

    fn valid_config() -> Config {
        Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                identity_header: "x-user-id".to_string(),
                api_key: None,
            },
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            cookie: CookieConfig::default(),
            admin: AdminConfig::default(),
        }
    }

    fn assert_invalid(config: &Config) {
        let result = validate_config(config);
        assert!(
            matches!(result, Err(ConfigError::ValidationError(_))),
            "expected validation error, got {:?}",
            result
        );
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_api_key_method_requires_key() {
        let mut config = valid_config();
        config.auth.method = AuthMethod::ApiKey;
        assert_invalid(&config);

        config.auth.api_key = Some("key".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_reset_requires_admin_key() {
        let mut config = valid_config();
        config.admin.reset_enabled = true;
        assert_invalid(&config);

        config.admin.api_key = Some("admin".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_capacity_fails() {
        let mut config = valid_config();
        config.queue.capacity = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_zero_batch_limit_fails() {
        let mut config = valid_config();
        config.queue.max_promotions_per_tick = Some(0);
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_idle_active_above_lifetime_fails() {
        let mut config = valid_config();
        config.queue.max_idle_active_secs = 1000;
        config.queue.max_active_lifetime_secs = 900;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_non_positive_default_interval_fails() {
        let mut config = valid_config();
        config.queue.default_release_interval_secs = 0.0;
        assert_invalid(&config);

        config.queue.default_release_interval_secs = f64::NAN;
        assert_invalid(&config);

        config.queue.default_release_interval_secs = f64::INFINITY;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_rejects_durations_past_ten_years() {
        let mut config = valid_config();
        config.queue.retention_window_secs = 10_000_000_000_000;
        assert_invalid(&config);

        let mut config = valid_config();
        config.queue.max_idle_wait_secs = 10_000_000_000_000_000;
        assert_invalid(&config);

        let mut config = valid_config();
        config.queue.max_idle_active_secs = MAX_DURATION_SECS + 1;
        config.queue.max_active_lifetime_secs = MAX_DURATION_SECS + 1;
        assert_invalid(&config);

        let mut config = valid_config();
        config.queue.sweep_interval_ms = u64::MAX;
        assert_invalid(&config);

        let mut config = valid_config();
        config.queue.retention_window_secs = MAX_DURATION_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_sweep_interval_fails() {
        let mut config = valid_config();
        config.queue.sweep_interval_ms = 0;
        assert_invalid(&config);
    }
}
