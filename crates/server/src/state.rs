use std::sync::Arc;

use peakguard_core::{ApiKeyAuthenticator, Authenticator, Config, QueueService, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    admin: Option<ApiKeyAuthenticator>,
    queue: Arc<QueueService>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        queue: Arc<QueueService>,
    ) -> Self {
        let admin = config
            .admin
            .api_key
            .clone()
            .map(|key| ApiKeyAuthenticator::new(key).with_user_id("admin"));

        Self {
            config,
            authenticator,
            admin,
            queue,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    /// `None` when no admin key is configured; admin routes are then closed.
    pub fn admin_authenticator(&self) -> Option<&ApiKeyAuthenticator> {
        self.admin.as_ref()
    }

    pub fn queue(&self) -> &QueueService {
        self.queue.as_ref()
    }
}
