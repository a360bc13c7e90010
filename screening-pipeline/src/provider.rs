//! Off-chain screening provider client

use crate::config::ProviderConfig;
use crate::error::{PipelineError, Result};
use crate::types::{ProviderAssessment, ProviderDecision, RiskLevel, ScreenAddressRequest};
use async_trait::async_trait;
use oracle_bridge::{Address, ComplianceStatus};
use tracing::{debug, warn};

/// Source of address assessments
#[async_trait]
pub trait ScreeningProvider: Send + Sync {
    /// Assess one address on `chain`
    async fn assess(&self, address: &str, chain: &str) -> Result<ProviderAssessment>;
}

/// HTTP provider: `POST {base_url}/v1/screen`
#[derive(Debug, Clone)]
pub struct HttpScreeningProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpScreeningProvider {
    /// Client for `config.base_url` with the configured request timeout
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/screen", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ScreeningProvider for HttpScreeningProvider {
    async fn assess(&self, address: &str, chain: &str) -> Result<ProviderAssessment> {
        let body = ScreenAddressRequest {
            address: address.to_string(),
            chain: chain.to_string(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, address, "Screening provider returned an error");
            return Err(PipelineError::Provider(format!(
                "{} returned HTTP {}",
                self.endpoint, status
            )));
        }

        let assessment: ProviderAssessment = response.json().await?;
        debug!(
            address,
            decision = ?assessment.decision,
            risk = assessment.risk_level.as_str(),
            signals = assessment.risk_signals.len(),
            "Provider assessment received"
        );
        Ok(assessment)
    }
}

/// Map a provider assessment onto a bridge status
pub fn map_assessment(assessment: &ProviderAssessment) -> ComplianceStatus {
    match (assessment.decision, assessment.risk_level) {
        (ProviderDecision::Denied, _) => ComplianceStatus::Rejected,
        (_, RiskLevel::Severe) | (_, RiskLevel::High) => ComplianceStatus::Rejected,
        (_, RiskLevel::Medium) => ComplianceStatus::Pending,
        (_, RiskLevel::Low) => ComplianceStatus::Approved,
    }
}

/// Risk label forwarded with the result
pub fn risk_label(assessment: &ProviderAssessment) -> &'static str {
    assessment.risk_level.as_str()
}

/// Address as the provider expects it: 20-byte form when the identity is
/// a left-padded account address, full 32 bytes otherwise.
pub fn provider_address(address: &Address) -> String {
    let bytes = address.as_bytes();
    if bytes[..12].iter().all(|b| *b == 0) {
        format!("0x{}", hex::encode(&bytes[12..]))
    } else {
        address.to_hex()
    }
}
