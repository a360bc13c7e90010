//! Configuration for the bridge

use crate::types::Address;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Service name
    pub service_name: String,

    /// Owner identity (hex); auto-authorized as an operator
    pub owner: String,

    /// Age after which a pending request may be expired (seconds).
    /// `None` lets the owner expire any pending request.
    pub request_ttl_secs: Option<u64>,

    /// Restrict `request_screening` to `allowed_requesters`
    pub restrict_requesters: bool,

    /// Identities allowed to open requests when restricted (hex)
    pub allowed_requesters: Vec<String>,

    /// Per-subscriber event buffer
    pub event_capacity: usize,

    /// Actor mailbox capacity
    pub mailbox_capacity: usize,

    /// Buffer of the Transfer Ledger forward channel
    pub forward_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            service_name: "oracle-bridge".to_string(),
            owner: String::new(),
            request_ttl_secs: None,
            restrict_requesters: false,
            allowed_requesters: Vec::new(),
            event_capacity: 1024,
            mailbox_capacity: 1000,
            forward_buffer: 1024,
        }
    }
}

impl BridgeConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = BridgeConfig::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay environment variables onto this config
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(owner) = std::env::var("BRIDGE_OWNER") {
            self.owner = owner;
        }

        if let Ok(ttl) = std::env::var("BRIDGE_REQUEST_TTL_SECS") {
            let secs = ttl
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("BRIDGE_REQUEST_TTL_SECS: {}", e)))?;
            self.request_ttl_secs = Some(secs);
        }

        if let Ok(flag) = std::env::var("BRIDGE_RESTRICT_REQUESTERS") {
            self.restrict_requesters = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let Ok(list) = std::env::var("BRIDGE_ALLOWED_REQUESTERS") {
            self.allowed_requesters = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(())
    }

    /// Parsed owner identity
    pub fn owner_address(&self) -> Result<Address> {
        if self.owner.trim().is_empty() {
            return Err(Error::ZeroAddress("owner"));
        }
        Address::from_hex(&self.owner)
    }

    /// Parsed requester allow-list
    pub fn requester_addresses(&self) -> Result<Vec<Address>> {
        self.allowed_requesters
            .iter()
            .map(|s| Address::from_hex(s))
            .collect()
    }

    /// TTL as a chrono duration
    pub fn request_ttl(&self) -> Option<chrono::Duration> {
        self.request_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(chrono::Duration::seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.service_name, "oracle-bridge");
        assert!(!config.restrict_requesters);
        assert!(config.request_ttl().is_none());
        assert!(matches!(config.owner_address(), Err(Error::ZeroAddress(_))));
    }

    #[test]
    fn test_from_file() {
        let owner = Address::from_bytes([1u8; 32]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "owner = \"{}\"\nrequest_ttl_secs = 3600\nrestrict_requesters = true\nallowed_requesters = [\"{}\"]",
            owner,
            Address::from_bytes([2u8; 32])
        )
        .unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.owner_address().unwrap(), owner);
        assert_eq!(config.request_ttl(), Some(chrono::Duration::seconds(3600)));
        assert_eq!(config.requester_addresses().unwrap().len(), 1);
        // Unset keys fall back to defaults
        assert_eq!(config.mailbox_capacity, 1000);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_ttl_secs = \"soon\"").unwrap();
        assert!(matches!(
            BridgeConfig::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
