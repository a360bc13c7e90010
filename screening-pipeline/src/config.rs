//! Configuration for the screening pipeline

use crate::error::{PipelineError, Result};
use oracle_bridge::{BridgeConfig, KeyPair};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Screening provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider base URL
    pub base_url: String,

    /// API key sent as `X-API-Key`
    pub api_key: Option<String>,

    /// Chain identifier passed with every address
    pub chain: String,

    /// Per-attempt timeout (milliseconds)
    pub timeout_ms: u64,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Back-off step; attempt `n` waits `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,

    /// Requests screened concurrently
    pub max_concurrent: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            chain: "ethereum".to_string(),
            timeout_ms: 5_000,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_concurrent: 8,
        }
    }
}

impl ProviderConfig {
    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Wait before retry number `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(attempt as u64))
    }
}

/// Fixed-window limiter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window and key
    pub max_requests: u32,

    /// Window length (milliseconds)
    pub window_ms: u64,

    /// How often expired windows are purged (milliseconds)
    pub cleanup_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_ms: 60_000,
            cleanup_interval_ms: 300_000,
        }
    }
}

impl RateLimitConfig {
    /// Window length
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Cleanup period, never shorter than 1 ms
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1))
    }
}

/// Full service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Screening provider
    pub provider: ProviderConfig,

    /// Operator self rate limit
    pub rate_limit: RateLimitConfig,

    /// Operator key seed (hex, 32 bytes). A fresh key is generated when absent.
    pub operator_seed: Option<String>,

    /// In-process bridge
    pub bridge: BridgeConfig,
}

impl PipelineConfig {
    /// Load from file, then apply environment overrides
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read config: {}", e)))?;
        let mut config: PipelineConfig = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SCREENING_API_URL") {
            self.provider.base_url = url;
        }
        if let Ok(key) = std::env::var("SCREENING_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Ok(chain) = std::env::var("SCREENING_CHAIN") {
            self.provider.chain = chain;
        }
        if let Ok(seed) = std::env::var("OPERATOR_SEED") {
            self.operator_seed = Some(seed);
        }
        if let Ok(max) = std::env::var("RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = max
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid RATE_LIMIT_MAX_REQUESTS: {}", max)))?;
        }
        if let Ok(window) = std::env::var("RATE_LIMIT_WINDOW_MS") {
            self.rate_limit.window_ms = window
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid RATE_LIMIT_WINDOW_MS: {}", window)))?;
        }
        self.bridge.apply_env()?;
        Ok(())
    }

    /// Operator signing key
    pub fn operator_keypair(&self) -> Result<KeyPair> {
        match &self.operator_seed {
            Some(seed) => Ok(KeyPair::from_seed_hex(seed)?),
            None => {
                tracing::warn!("No operator seed configured, generating an ephemeral key");
                Ok(KeyPair::generate())
            }
        }
    }
}
