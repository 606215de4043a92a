//! Service configuration.
//!
//! Configuration is read from the environment, optionally seeded from a
//! dotenv file whose absence is non-fatal. All values except `DATABASE_URL`
//! have working defaults.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the profiling service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// PostgreSQL connection URL for the history store.
    pub database_url: String,
    /// Allowed cross-origin value for browser clients (empty disables CORS).
    pub frontend_origin: String,
    /// Path to the measurement agent executable.
    pub agent_path: PathBuf,
    /// Path to the analyser script piped the metrics report.
    pub analyser_path: PathBuf,
    /// Wall-clock deadline for bounded (synchronous) agent execution.
    pub agent_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: String::new(),
            frontend_origin: String::new(),
            agent_path: PathBuf::from("../cmd-agent/target/debug/cmd-agent"),
            analyser_path: PathBuf::from("../brain/analyser.py"),
            agent_timeout: Duration::from_secs(60),
        }
    }
}

impl ServiceConfig {
    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BIND_ADDR`: HTTP bind address (default: 0.0.0.0:8080)
    /// - `DATABASE_URL`: PostgreSQL connection URL (required)
    /// - `FRONTEND_ORIGIN`: allowed CORS origin (default: none)
    /// - `AGENT_PATH`: measurement agent executable path
    /// - `ANALYSER_PATH`: analyser script path
    /// - `AGENT_TIMEOUT_SECS`: bounded-mode deadline in seconds (default: 60)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or any value fails
    /// to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("BIND_ADDR") {
            config.bind_addr = val;
        }

        config.database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        if let Ok(val) = std::env::var("FRONTEND_ORIGIN") {
            config.frontend_origin = val;
        }

        if let Ok(val) = std::env::var("AGENT_PATH") {
            config.agent_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("ANALYSER_PATH") {
            config.analyser_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("AGENT_TIMEOUT_SECS") {
            let secs: u64 = val.parse().map_err(|_| ConfigError::InvalidValue {
                key: "AGENT_TIMEOUT_SECS".to_string(),
                message: format!("could not parse '{}'", val),
            })?;
            config.agent_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "bind_addr cannot be empty".to_string(),
            ));
        }

        if self.database_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database_url cannot be empty".to_string(),
            ));
        }

        if self.agent_timeout.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "agent_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the bind address.
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Builder method to set the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Builder method to set the allowed frontend origin.
    pub fn with_frontend_origin(mut self, origin: impl Into<String>) -> Self {
        self.frontend_origin = origin.into();
        self
    }

    /// Builder method to set the agent executable path.
    pub fn with_agent_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.agent_path = path.into();
        self
    }

    /// Builder method to set the analyser script path.
    pub fn with_analyser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.analyser_path = path.into();
        self
    }

    /// Builder method to set the bounded-mode agent deadline.
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }
}
