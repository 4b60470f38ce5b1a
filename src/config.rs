//! Poller configuration.
//!
//! Configuration is read from TOML. Durations use humantime syntax
//! (`"500ms"`, `"10s"`). All keys are optional except the node list, which
//! may still be empty.
//!
//! ```toml
//! name = "S7300"
//! plc_ip = "192.168.10.57"
//! plc_rack = 0
//! plc_slot = 2
//! connect_timeout = "10s"
//! request_timeout = "2s"
//! poll_interval = "1s"
//!
//! [tags]
//! line = "press-3"
//!
//! [[nodes]]
//! metric = "press"
//! name = "pressure"
//! address = "DB1.DBD2"
//! type = "real"
//! ```

use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ClientConfig, DEFAULT_S7_PORT};
use crate::error::{Result, S7Error};
use crate::plan::MAX_ITEMS_PER_REQUEST;

/// Highest rack number that fits the remote TSAP encoding.
pub const MAX_RACK: u8 = 7;
/// Highest slot number that fits the remote TSAP encoding.
pub const MAX_SLOT: u8 = 31;

/// One configured point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    /// Record name; defaults to the top-level `name` when omitted.
    #[serde(default)]
    pub metric: String,
    /// Field key within the record.
    pub name: String,
    /// Address in S7 notation, e.g. `DB1.DBX10.0`.
    pub address: String,
    /// Declared type name, e.g. `real`.
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Complete poller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default record name for nodes without `metric`.
    pub name: String,
    /// PLC host name or IP address.
    pub plc_ip: String,
    /// ISO-on-TCP port.
    pub plc_port: u16,
    /// Rack of the CPU.
    pub plc_rack: u8,
    /// Slot of the CPU.
    pub plc_slot: u8,
    /// TCP connect timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Read/write timeout of a single request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Interval between reads.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Read on every tick instead of every `poll_interval`.
    pub poll_interval_disabled: bool,
    /// Upper bound on items per read request.
    pub max_items_per_request: usize,
    /// Static tags attached to every record.
    pub tags: BTreeMap<String, String>,
    /// Configured points.
    pub nodes: Vec<NodeSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "s7comm".to_string(),
            plc_ip: "192.168.10.57".to_string(),
            plc_port: DEFAULT_S7_PORT,
            plc_rack: 0,
            plc_slot: 1,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            poll_interval_disabled: false,
            max_items_per_request: MAX_ITEMS_PER_REQUEST,
            tags: BTreeMap::new(),
            nodes: Vec::new(),
        }
    }
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::Config` if the file cannot be read, is not valid
    /// TOML, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| S7Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&text)
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::Config;
    ///
    /// let config = Config::from_toml_str(r#"
    ///     name = "line1"
    ///     [[nodes]]
    ///     name = "speed"
    ///     address = "DB1.DBW0"
    ///     type = "int"
    /// "#).unwrap();
    ///
    /// assert_eq!(config.nodes[0].metric, "line1");
    /// assert_eq!(config.plc_port, 102);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| S7Error::config(e.to_string()))?;
        for node in &mut config.nodes {
            if node.metric.is_empty() {
                node.metric = config.name.clone();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the type system does not enforce.
    ///
    /// Node addresses are not checked here; unresolvable nodes are reported
    /// and skipped when the poller is built.
    pub fn validate(&self) -> Result<()> {
        if self.plc_rack > MAX_RACK {
            return Err(S7Error::config(format!(
                "plc_rack {} must be 0-{}",
                self.plc_rack, MAX_RACK
            )));
        }
        if self.plc_slot > MAX_SLOT {
            return Err(S7Error::config(format!(
                "plc_slot {} must be 0-{}",
                self.plc_slot, MAX_SLOT
            )));
        }
        if self.max_items_per_request == 0 || self.max_items_per_request > MAX_ITEMS_PER_REQUEST {
            return Err(S7Error::config(format!(
                "max_items_per_request must be 1-{}",
                MAX_ITEMS_PER_REQUEST
            )));
        }
        if !self.poll_interval_disabled && self.poll_interval.is_zero() {
            return Err(S7Error::config("poll_interval must be greater than 0"));
        }
        Ok(())
    }

    /// Resolves the PLC endpoint to a socket address.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::Config` if the host does not resolve.
    pub fn endpoint(&self) -> Result<SocketAddr> {
        (self.plc_ip.as_str(), self.plc_port)
            .to_socket_addrs()
            .map_err(|e| S7Error::config(format!("cannot resolve '{}': {}", self.plc_ip, e)))?
            .next()
            .ok_or_else(|| S7Error::config(format!("no address for '{}'", self.plc_ip)))
    }

    /// Builds the client configuration for this PLC.
    pub fn client_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig::new(self.endpoint()?, self.plc_rack, self.plc_slot)
            .with_connect_timeout(self.connect_timeout)
            .with_request_timeout(self.request_timeout))
    }

    /// Returns the number of scheduler ticks per read.
    ///
    /// With polling disabled every tick reads. Otherwise the poll interval is
    /// divided by the tick length, never returning less than 1.
    pub fn ticks_per_interval(&self, tick: Duration) -> u64 {
        if self.poll_interval_disabled || tick.is_zero() {
            return 1;
        }
        let ticks = self.poll_interval.as_nanos() / tick.as_nanos();
        u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
    }
}
