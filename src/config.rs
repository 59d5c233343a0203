//! Arbiter Configuration
//!
//! Configuration structures for the arbitrator service, loaded from a
//! TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main arbiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// TLS configuration
    #[serde(default)]
    pub tls: TlsConfig,

    /// Client authentication configuration
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the RPC listener
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// TLS configuration
///
/// The arbitrator is meant to sit outside the cluster it arbitrates for,
/// so transport encryption is on by default. Plaintext is an escape hatch
/// for local testing only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Enable TLS termination
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the PEM-encoded server certificate chain
    #[serde(default = "default_cert_file")]
    pub cert_file: PathBuf,

    /// Path to the PEM-encoded private key
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
}

/// Client authentication configuration
///
/// Every RPC call must carry these credentials via HTTP Basic auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared username
    pub username: String,

    /// Shared password
    pub password: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:6666".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cert_file() -> PathBuf {
    PathBuf::from("certificate.pem")
}

fn default_key_file() -> PathBuf {
    PathBuf::from("key.pem")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cert_file: default_cert_file(),
            key_file: default_key_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ArbiterConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ArbiterConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: ArbiterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config(
                "server.bind_address cannot be empty".into(),
            ));
        }

        if self.auth.username.is_empty() {
            return Err(crate::Error::Config("auth.username cannot be empty".into()));
        }

        if self.auth.password.is_empty() {
            return Err(crate::Error::Config("auth.password cannot be empty".into()));
        }

        if self.tls.enabled {
            if self.tls.cert_file.as_os_str().is_empty() {
                return Err(crate::Error::Config(
                    "tls.cert_file cannot be empty when TLS is enabled".into(),
                ));
            }
            if self.tls.key_file.as_os_str().is_empty() {
                return Err(crate::Error::Config(
                    "tls.key_file cannot be empty when TLS is enabled".into(),
                ));
            }
        }

        Ok(())
    }
}
