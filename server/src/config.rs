//! Environment-driven server configuration.

use std::env;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Base URL clients use to reach stored blobs
    pub public_base_url: String,
    /// Maximum accepted upload body, in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from the environment, defaulting everything
    /// except `DATABASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = parsed_var("PORT")?.unwrap_or(DEFAULT_PORT);

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        // Uploads echo back absolute URLs, so the public base must match
        // whatever address clients can actually reach.
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let max_upload_bytes = parsed_var("MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_UPLOAD_LIMIT);

        Ok(Self {
            host,
            port,
            database_url,
            public_base_url,
            max_upload_bytes,
        })
    }

    /// `host:port` string for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read an environment variable and parse it, treating absence as `None`.
fn parsed_var<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{0} has an unparseable value")]
    Invalid(&'static str),
}
