pub mod auth;
pub mod config;
pub mod metrics;
pub mod queue;
pub mod testing;
pub mod ticket;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator,
    HeaderAuthenticator, Identity, NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    QueueConfig, SanitizedConfig,
};
pub use queue::{
    Clock, JoinOutcome, QueueError, QueueScheduler, QueueService, QueueStats, QueueStatus,
    ReleaseOutcome, SweepReport, SystemClock,
};
pub use ticket::{mask_token, ExpiryReason, Ticket, TicketError, TicketState};
