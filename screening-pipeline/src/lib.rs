//! Screening pipeline
//!
//! Off-chain side of the screening oracle: calls the screening provider
//! for each bridge request and submits signed results back.

pub mod config;
pub mod error;
pub mod operator;
pub mod provider;
pub mod rate_limiter;
pub mod types;

pub use config::{PipelineConfig, ProviderConfig, RateLimitConfig};
pub use error::{PipelineError, Result};
pub use operator::OperatorBackend;
pub use provider::{map_assessment, risk_label, HttpScreeningProvider, ScreeningProvider};
pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use types::{ProviderAssessment, ProviderDecision, RiskLevel, RiskSignal};
