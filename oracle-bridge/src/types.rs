//! Core types for the screening bridge
//!
//! Identities and request ids are fixed-width byte strings so that the
//! canonical signed message has a single, unambiguous encoding. The
//! all-zero value of each doubles as "unset", mirroring the zero-value
//! records a ledger hands back for missing keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// 32-byte identity: a screened chain address or an operator verifying key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 32]);

impl Address {
    /// The empty identity
    pub const ZERO: Address = Address([0u8; 32]);

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True for the all-zero identity
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse hex (with or without `0x`).
    ///
    /// Accepts 20-byte chain addresses, which are left-padded, and 32-byte
    /// operator keys.
    pub fn from_hex(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let decoded = hex::decode(digits)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;

        let mut bytes = [0u8; 32];
        match decoded.len() {
            20 => bytes[12..].copy_from_slice(&decoded),
            32 => bytes.copy_from_slice(&decoded),
            n => {
                return Err(Error::InvalidAddress(format!(
                    "{}: expected 20 or 32 bytes, got {}",
                    s, n
                )))
            }
        }

        Ok(Self(bytes))
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Address::from_hex(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

/// Screening request identifier (also used for synthetic screening ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId([u8; 32]);

impl RequestId {
    /// The unset id
    pub const ZERO: RequestId = RequestId([0u8; 32]);

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True when the id was never issued
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse 32-byte hex
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches("0x");
        let decoded =
            hex::decode(digits).map_err(|e| Error::Config(format!("request id {}: {}", s, e)))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| Error::Config(format!("request id {}: expected 32 bytes", s)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for RequestId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        RequestId::from_hex(&value)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.to_hex()
    }
}

/// Correlation key of a transfer in the Transfer Ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TransferId(pub u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse compliance status, in the Transfer Ledger's vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ComplianceStatus {
    /// Needs manual review
    Pending = 0,
    /// Transfer may proceed
    Approved = 1,
    /// Transfer must not proceed
    Rejected = 2,
}

impl ComplianceStatus {
    /// Byte used in the canonical signed message
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Upper-case label
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Pending => "PENDING",
            ComplianceStatus::Approved => "APPROVED",
            ComplianceStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a request was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionPath {
    /// Portable signed attestation
    Signed,
    /// Authenticated operator call, no signature
    Direct,
}

impl SubmissionPath {
    /// Label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionPath::Signed => "signed",
            SubmissionPath::Direct => "direct",
        }
    }
}

/// Accepted result stored on the request record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    /// Status forwarded to the Transfer Ledger
    pub status: ComplianceStatus,
    /// Free-text risk classification
    pub risk_level: String,
    /// Submission path that closed the request
    pub path: SubmissionPath,
}

/// Lifecycle state derived from a request record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    /// No request exists under the id
    Unknown,
    /// Created, waiting for a result
    Pending,
    /// Result accepted (terminal)
    Completed,
    /// Expired by the owner (terminal)
    Expired,
}

/// One screening request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreeningRequest {
    /// Primary key; zero on the record returned for unknown ids
    pub request_id: RequestId,
    /// Address being screened
    pub subject_address: Address,
    /// Originating transfer
    pub transfer_request_id: TransferId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the first accepted result
    pub completed: bool,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the owner expires a stale request
    pub expired: bool,
    /// Accepted result
    pub outcome: Option<ScreeningOutcome>,
}

impl ScreeningRequest {
    /// Derived lifecycle state
    pub fn state(&self) -> RequestState {
        if self.request_id.is_zero() {
            RequestState::Unknown
        } else if self.completed {
            RequestState::Completed
        } else if self.expired {
            RequestState::Expired
        } else {
            RequestState::Pending
        }
    }

    /// True while waiting for a result
    pub fn is_pending(&self) -> bool {
        self.state() == RequestState::Pending
    }
}
