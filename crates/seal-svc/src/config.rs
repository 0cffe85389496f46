//! Configuration loading and validation for the seal service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.
//! The payload secret is the exception: its absence only surfaces on the first
//! request that needs the key.

use anyhow::{Context, Result};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::server::middleware;

/// Shared secret as read from the environment. `Debug` never shows it, and
/// the buffer is wiped when dropped.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Move the bytes out without copying them.
    pub fn into_bytes(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0).into_bytes()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Shared secret the envelope key is derived from.
    #[serde(default)]
    pub payload_secret: Option<Secret>,

    /// Context string bound into every authentication tag.
    #[serde(default)]
    pub associated_data: Option<String>,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// OTLP endpoint for span export. Export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    middleware::REQUEST_TIMEOUT.as_secs()
}
fn default_max_body_bytes() -> usize {
    middleware::MAX_BODY_BYTES
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        Ok(())
    }

    /// Hand the secret bytes over, leaving none behind in the config. An
    /// empty value is treated as absent.
    pub fn take_secret(&mut self) -> Option<Vec<u8>> {
        self.payload_secret
            .take()
            .map(Secret::into_bytes)
            .filter(|s| !s.is_empty())
    }

    /// Associated data bytes, with an empty value treated as absent.
    pub fn associated_data_bytes(&self) -> Option<Vec<u8>> {
        self.associated_data
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_bytes().to_vec())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty when set");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            payload_secret: Some(Secret("0123456789abcdef0123456789abcdef".into())),
            associated_data: None,
            listen_port: default_listen_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_listen_port(), 8080);
        assert_eq!(default_request_timeout(), 30);
        assert_eq!(default_max_body_bytes(), 2_097_152);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_accepts_missing_secret() {
        let mut cfg = Config {
            payload_secret: None,
            ..valid()
        };
        assert!(cfg.validate().is_ok());
        assert!(cfg.take_secret().is_none());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let cfg = Config {
            request_timeout_secs: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_body_limit() {
        let cfg = Config {
            max_body_bytes: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_otlp_endpoint() {
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("  ".into()),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_values_are_treated_as_absent() {
        let mut cfg = Config {
            payload_secret: Some(Secret(String::new())),
            associated_data: Some(String::new()),
            ..valid()
        };
        assert!(cfg.take_secret().is_none());
        assert!(cfg.associated_data_bytes().is_none());
    }

    #[test]
    fn take_secret_moves_it_out_of_the_config() {
        let mut cfg = valid();
        assert_eq!(cfg.take_secret().as_deref(), Some(&b"0123456789abcdef0123456789abcdef"[..]));
        assert!(cfg.payload_secret.is_none());
        assert!(cfg.take_secret().is_none());
    }

    #[test]
    fn secret_zeroize_clears_the_buffer() {
        let mut secret = Secret("0123456789abcdef".into());
        secret.zeroize();
        assert!(secret.0.is_empty());
    }

    #[test]
    fn debug_redacts_secret() {
        let dbg = format!("{:?}", valid());
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("0123456789abcdef"));
    }
}
