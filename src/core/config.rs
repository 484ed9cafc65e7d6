//! Service configuration.
//!
//! All options come from environment variables (a `.env` file is honored):
//!
//! | Variable | Default | Effect |
//! |----------|---------|--------|
//! | RUN_ADDRESS | 127.0.0.1:8000 | HTTP listen address |
//! | ACCRUAL_SYSTEM_ADDRESS | 127.0.0.1:8080 | accrual calculator address |
//! | DATABASE_URI | postgresql://localhost/loyalty | Postgres DSN |
//! | DB_REFRESH | false | drop the schema before migrating |
//! | DEBUG | false | debug-level logging |
//! | RABBITMQ_URI | (empty) | non-empty switches queues to the broker |
//! | WORKERS_COUNT | 2 | accrual pipeline worker count |
//! | SETUP_REWARDS | false | push reward config to the upstream at startup |

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address.
    pub run_address: String,
    /// Accrual calculator address, with or without an `http://` scheme.
    pub accrual_address: String,
    /// Postgres DSN.
    pub database_uri: String,
    /// Drop the schema before running migrations. Development only.
    pub db_refresh: bool,
    /// Debug-level logging.
    pub debug: bool,
    /// AMQP broker URL; empty selects the in-process queues.
    pub broker_url: String,
    /// Number of pipeline workers.
    pub workers_count: usize,
    /// Push the reward configuration to the upstream once at startup.
    pub setup_rewards: bool,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            run_address: std::env::var("RUN_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8000".into()),
            accrual_address: std::env::var("ACCRUAL_SYSTEM_ADDRESS")
                .unwrap_or_else(|_| "127.0.0.1:8080".into()),
            database_uri: std::env::var("DATABASE_URI")
                .unwrap_or_else(|_| "postgresql://localhost/loyalty".into()),
            db_refresh: std::env::var("DB_REFRESH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            debug: std::env::var("DEBUG")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            broker_url: std::env::var("RABBITMQ_URI").unwrap_or_default(),
            workers_count: std::env::var("WORKERS_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(2),
            setup_rewards: std::env::var("SETUP_REWARDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}
