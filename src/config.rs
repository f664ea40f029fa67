// src/config.rs

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::{error::AppError, session::SubmitPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Institution prefix for generated student/staff IDs (e.g. `VSP`).
    pub id_prefix: String,
    /// Domain used when deriving account emails from login IDs.
    pub email_domain: String,
    pub submit_policy: SubmitPolicy,
    /// How long a closed attempt stays in memory before it is dropped.
    pub session_retention: Duration,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// Runs before logging is set up, so problems are returned rather than
    /// logged: a missing required variable or an unparsable number is an error.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let submit_policy = SubmitPolicy {
            max_retries: env_or("SUBMIT_MAX_RETRIES", 1)?,
            retry_backoff: Duration::from_millis(env_or("SUBMIT_RETRY_BACKOFF_MS", 1000)?),
            timeout_grace: Duration::from_secs(env_or("TIMEOUT_GRACE_SECONDS", 30)?),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration: env_or("JWT_EXPIRATION", 86_400)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            id_prefix: env::var("ID_PREFIX").unwrap_or_else(|_| "VSP".to_string()),
            email_domain: env::var("EMAIL_DOMAIN")
                .unwrap_or_else(|_| "vincollins.edu.ng".to_string()),
            submit_policy,
            session_retention: Duration::from_secs(env_or("SESSION_RETENTION_SECONDS", 600)?),
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::InternalServerError(format!("{} must be set", key)))
}

fn env_or<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_or(key, env::var(key).ok(), default)
}

/// `default` when the variable is unset; an error when it is set but unparsable.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::InternalServerError(format!("Invalid value for {}: {:?} ({})", key, raw, e))
        }),
    }
}
