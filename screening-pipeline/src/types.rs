use serde::{Deserialize, Serialize};

/// Provider verdict on an address
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderDecision {
    /// Address may transact
    Approved,
    /// Address must be blocked
    Denied,
}

/// Provider risk grade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// No findings of note
    Low,
    /// Needs review
    Medium,
    /// Blocked
    High,
    /// Blocked, e.g. sanctions exposure
    Severe,
}

impl RiskLevel {
    /// Label forwarded to the bridge
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Severe => "severe",
        }
    }
}

/// One itemized finding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskSignal {
    /// Finding category, e.g. `sanctions`
    pub category: String,
    /// Severity of this finding
    pub severity: RiskLevel,
    /// Free-text detail
    #[serde(default)]
    pub description: String,
}

/// Provider response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderAssessment {
    /// Overall verdict
    pub decision: ProviderDecision,
    /// Overall risk grade
    pub risk_level: RiskLevel,
    /// Itemized findings
    #[serde(default)]
    pub risk_signals: Vec<RiskSignal>,
}

/// Provider request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenAddressRequest {
    /// Address to screen
    pub address: String,
    /// Chain the address lives on
    pub chain: String,
}
