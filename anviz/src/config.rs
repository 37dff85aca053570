//! Configuration
//!
//! Layered with figment: built-in defaults, then a TOML file, then
//! `ANVIZ_`-prefixed environment variables (`__` separates sections, so
//! `ANVIZ_DEVICE__ADDR` sets `device.addr`).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use anviz_core::constants::DEFAULT_TIMEOUT;
use anviz_core::DEFAULT_PORT;

use crate::error::{Error, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ANVIZ_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub listener: ListenerConfig,
}

/// Time clock to poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_id")]
    pub device_id: u32,

    #[serde(default = "default_device_addr")]
    pub addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect and read timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Socket that devices push events to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_listener_addr")]
    pub addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Drop a connection that stays silent this long; unset waits forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
}

fn default_device_id() -> u32 {
    1
}

fn default_device_addr() -> String {
    "192.168.1.218".to_string()
}

fn default_listener_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            addr: default_device_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            addr: default_listener_addr(),
            port: default_port(),
            read_timeout_secs: None,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ListenerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.addr, self.port)
            .parse()
            .map_err(|e| Error::InvalidArgument(format!("listener address {}: {}", self.addr, e)))
    }
}

impl Config {
    /// Defaults, then `path` (if it exists), then the environment
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from `path` and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.addr.is_empty() {
            return Err(Error::InvalidArgument("device.addr cannot be empty".into()));
        }
        if self.device.timeout_secs == 0 {
            return Err(Error::InvalidArgument("device.timeout_secs must be positive".into()));
        }
        if self.listener.read_timeout_secs == Some(0) {
            return Err(Error::InvalidArgument(
                "listener.read_timeout_secs must be positive".into(),
            ));
        }
        self.listener.socket_addr()?;
        Ok(())
    }
}
