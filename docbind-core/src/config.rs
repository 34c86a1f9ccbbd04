//! Connection parameters and the transport options derived from them.
//!
//! [`ConnectionConfig`] is supplied by the application (loaded from a file, built in code,
//! read from the environment by the caller). The library itself never reads the environment.
//!
//! # Example
//!
//! ```ignore
//! use docbind::config::ConnectionConfig;
//!
//! let config = ConnectionConfig::builder("mongodb://localhost:27017/app")
//!     .production(true)
//!     .retry_wait_seconds(2)
//!     .retry_max_attempts(5)
//!     .cert_file("/etc/ssl/db-ca.pem")
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

const DEFAULT_RETRY_WAIT_SECONDS: u64 = 5;
const DEFAULT_RETRY_MAX_ATTEMPTS: i64 = 10;

/// Parameters used by [`ConnectionManager::connect`](crate::connection::ConnectionManager::connect).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Connection string understood by the selected connector.
    pub uri: String,
    /// Production mode. Transport security is only applied in production.
    #[serde(default)]
    pub is_production: bool,
    /// Seconds to wait between two failed attempts. Zero disables the wait.
    #[serde(default = "default_retry_wait_seconds")]
    pub retry_wait_seconds: u64,
    /// Maximum number of attempts. Values below 1 are treated as 1.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: i64,
    /// CA certificate used to validate the server when transport security is enabled.
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
}

fn default_retry_wait_seconds() -> u64 {
    DEFAULT_RETRY_WAIT_SECONDS
}

fn default_retry_max_attempts() -> i64 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

impl ConnectionConfig {
    /// Creates a config for `uri` with every other parameter at its default.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            is_production: false,
            retry_wait_seconds: DEFAULT_RETRY_WAIT_SECONDS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            cert_file: None,
        }
    }

    /// Creates a new builder for fluent construction.
    pub fn builder(uri: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(uri)
    }

    /// Number of attempts the retry loop will actually make.
    pub fn effective_attempts(&self) -> u32 {
        self.retry_max_attempts.clamp(1, u32::MAX as i64) as u32
    }

    /// Delay between attempts, `None` when waiting is disabled.
    pub fn retry_wait(&self) -> Option<Duration> {
        match self.retry_wait_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Resolves the transport options for this config.
    ///
    /// A certificate enables TLS with certificate validation and a single pooled
    /// connection. Outside production the options are reset to defaults, even when
    /// a certificate was supplied.
    pub fn transport_options(&self) -> TransportOptions {
        let mut options = TransportOptions::default();

        if let Some(cert_file) = &self.cert_file {
            options = TransportOptions {
                tls: Some(TlsSettings {
                    ca_file: cert_file.clone(),
                    validate_certificates: true,
                }),
                max_pool_size: Some(1),
            };
        }

        if !self.is_production {
            options = TransportOptions::default();
        }

        options
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Creates a builder for `uri` with default parameters.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { config: ConnectionConfig::new(uri) }
    }

    /// Sets production mode.
    pub fn production(mut self, is_production: bool) -> Self {
        self.config.is_production = is_production;
        self
    }

    /// Sets the delay between failed attempts, in seconds.
    pub fn retry_wait_seconds(mut self, seconds: u64) -> Self {
        self.config.retry_wait_seconds = seconds;
        self
    }

    /// Sets the maximum number of attempts.
    pub fn retry_max_attempts(mut self, attempts: i64) -> Self {
        self.config.retry_max_attempts = attempts;
        self
    }

    /// Sets the CA certificate file.
    pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cert_file = Some(path.into());
        self
    }

    /// Builds and returns the final config.
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// TLS parameters handed to the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    /// CA file used to validate the server certificate.
    pub ca_file: PathBuf,
    /// Whether invalid certificates are rejected.
    pub validate_certificates: bool,
}

/// Transport options resolved from a [`ConnectionConfig`].
///
/// `TransportOptions::default()` means "use the driver defaults".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub tls: Option<TlsSettings>,
    pub max_pool_size: Option<u32>,
}

impl TransportOptions {
    /// Returns `true` when nothing overrides the driver defaults.
    pub fn is_default(&self) -> bool {
        self == &TransportOptions::default()
    }
}
