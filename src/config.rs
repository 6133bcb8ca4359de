//! Client configuration (TOML).
//!
//! Resolution order: explicit path, `$COMMUNICATOR_CONFIG`, then
//! `<config_dir>/communicator/config.toml`. Without any file the defaults
//! apply.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::session::SessionOptions;
use crate::transport::{DeviceFilter, DEFAULT_BAUD_RATE, USB_PRODUCT_ID, USB_VENDOR_ID};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "COMMUNICATOR_CONFIG";

const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Per-read deadline in milliseconds; 0 waits forever.
    pub read_timeout_ms: u64,
    pub baud_rate: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Bridge command template, see [`crate::transport::ProcessConnector`].
    pub bridge: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            baud_rate: DEFAULT_BAUD_RATE,
            vendor_id: USB_VENDOR_ID,
            product_id: USB_PRODUCT_ID,
            bridge: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration following the resolution order.
    ///
    /// An explicitly named file (argument or environment) must exist; the
    /// per-user default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::from_file(Path::new(&path));
        }
        match default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::Config("baud_rate must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_timeout: self.read_timeout(),
            baud_rate: self.baud_rate,
            filter: self.device_filter(),
        }
    }
}

/// `<config_dir>/communicator/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("communicator").join("config.toml"))
}
