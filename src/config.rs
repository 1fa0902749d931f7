//! Multiplexer configuration
//!
//! The multiplexer itself consumes exactly one accessor,
//! [`MuxConfig::response_headers`]; everything else here exists so an
//! embedding server can load and validate the same settings from a file
//! or the environment.

use crate::error::{MuxError, Result};
use crate::events::Header;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Multiplexer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Value of the `server` response header, omitted when `None`
    pub server_name: Option<String>,
    /// Extra response headers keyed by protocol label (e.g. "h3")
    pub extra_headers: HashMap<String, Vec<(String, String)>>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            server_name: None,
            extra_headers: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MuxConfig {
    /// Extra response headers for one protocol label
    ///
    /// Appended after caller-supplied headers and before transmission:
    /// the `server` header first, then the protocol's configured extras
    /// in order.
    pub fn response_headers(&self, protocol: &str) -> Vec<Header> {
        let mut headers = Vec::new();
        if let Some(server_name) = &self.server_name {
            headers.push((
                Bytes::from_static(b"server"),
                Bytes::from(server_name.clone()),
            ));
        }
        if let Some(extras) = self.extra_headers.get(protocol) {
            for (name, value) in extras {
                headers.push((Bytes::from(name.clone()), Bytes::from(value.clone())));
            }
        }
        headers
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MuxError::Config(format!("Failed to read config file: {}", e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| MuxError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration overrides from environment variables
    pub fn load_from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("H3MUX_SERVER_NAME") {
            config.server_name = Some(val);
        }

        if let Ok(val) = std::env::var("H3MUX_LOG_LEVEL") {
            config.logging.level = val;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (protocol, extras) in &self.extra_headers {
            if protocol.is_empty() {
                return Err(MuxError::Config("Empty protocol label".to_string()));
            }
            for (name, _) in extras {
                if name.starts_with(':') {
                    return Err(MuxError::Config(format!(
                        "Extra header '{}' must not be a pseudo-header",
                        name
                    )));
                }
                if name.chars().any(|c| c.is_ascii_uppercase()) {
                    return Err(MuxError::Config(format!(
                        "Extra header '{}' must be lowercase",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}
