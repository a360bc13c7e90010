//! Cryptographic operations for signed screening results
//!
//! This module provides:
//! - Ed25519 operator key pairs and result signing
//! - The canonical result message and its domain-separated digest
//! - Replay fingerprints over the exact signed message
//! - The [`SignatureVerifier`] seam the bridge recovers signers through

use crate::types::{Address, ComplianceStatus, RequestId};
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix of the digest operators sign
pub const SIGNED_RESULT_PREFIX: &[u8] = b"\x19Screening Oracle Signed Result:\n32";

/// Domain tag for replay fingerprints
pub const REPLAY_DOMAIN: &[u8] = b"screening-bridge/replay/v1";

/// Domain tag for request id derivation
pub const REQUEST_ID_DOMAIN: &[u8] = b"screening-bridge/request-id/v1";

/// Domain tag for synthetic batch screening ids
pub const BATCH_ID_DOMAIN: &[u8] = b"screening-bridge/batch-id/v1";

/// Signed artifact submitted by an operator.
///
/// Ed25519 has no key recovery, so the claimed signer travels with the
/// signature and recovery means strict verification against it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OperatorSignature {
    signer: Address,
    bytes: [u8; 64],
}

impl OperatorSignature {
    /// Create from signer key and signature bytes
    pub fn new(signer: Address, bytes: [u8; 64]) -> Self {
        Self { signer, bytes }
    }

    /// Claimed signer
    pub fn signer(&self) -> &Address {
        &self.signer
    }

    /// Signature bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// Hex encoding: 32-byte signer followed by 64-byte signature
    pub fn to_hex(&self) -> String {
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(self.signer.as_bytes());
        out.extend_from_slice(&self.bytes);
        format!("0x{}", hex::encode(out))
    }

    /// Parse the encoding produced by [`OperatorSignature::to_hex`]
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches("0x");
        let decoded = hex::decode(digits).map_err(|_| Error::InvalidSignature)?;
        if decoded.len() != 96 {
            return Err(Error::InvalidSignature);
        }

        let mut signer = [0u8; 32];
        signer.copy_from_slice(&decoded[..32]);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&decoded[32..]);

        Ok(Self::new(Address::from_bytes(signer), bytes))
    }
}

impl fmt::Debug for OperatorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorSignature")
            .field("signer", &self.signer)
            .field("bytes", &hex::encode(&self.bytes[..8]))
            .finish()
    }
}

/// Ed25519 key pair held by an operator backend
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from a hex-encoded 32-byte seed
    pub fn from_seed_hex(s: &str) -> Result<Self> {
        let decoded = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| Error::Config(format!("operator seed: {}", e)))?;
        let seed: [u8; 32] = decoded
            .try_into()
            .map_err(|_| Error::Config("operator seed must be 32 bytes".to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Operator identity (verifying key bytes)
    pub fn address(&self) -> Address {
        Address::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign an arbitrary 32-byte digest
    pub fn sign_digest(&self, digest: &[u8; 32]) -> OperatorSignature {
        let signature = self.signing_key.sign(digest);
        OperatorSignature::new(self.address(), signature.to_bytes())
    }

    /// Sign a screening result over its canonical fields
    pub fn sign_result(
        &self,
        request_id: &RequestId,
        subject: &Address,
        status: ComplianceStatus,
        risk_level: &str,
    ) -> OperatorSignature {
        self.sign_digest(&result_digest(request_id, subject, status, risk_level))
    }
}

/// Recovers the operator identity behind a signed digest
pub trait SignatureVerifier: Send + Sync {
    /// Identity that produced `signature` over `digest`, if any
    fn recover(&self, digest: &[u8; 32], signature: &OperatorSignature) -> Option<Address>;
}

/// Strict Ed25519 verification against the claimed signer
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn recover(&self, digest: &[u8; 32], signature: &OperatorSignature) -> Option<Address> {
        let verifying_key = VerifyingKey::from_bytes(signature.signer().as_bytes()).ok()?;
        let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());

        // Strict mode rejects malleable encodings, which would otherwise
        // yield a fresh fingerprint for the same attestation.
        verifying_key
            .verify_strict(digest, &dalek_sig)
            .ok()
            .map(|_| *signature.signer())
    }
}

/// Deterministic encoding of `(requestId, subject, status, riskLevel)`
pub fn canonical_result_message(
    request_id: &RequestId,
    subject: &Address,
    status: ComplianceStatus,
    risk_level: &str,
) -> Vec<u8> {
    let risk = risk_level.as_bytes();
    let mut message = Vec::with_capacity(32 + 32 + 1 + 4 + risk.len());
    message.extend_from_slice(request_id.as_bytes());
    message.extend_from_slice(subject.as_bytes());
    message.push(status.as_byte());
    message.extend_from_slice(&(risk.len() as u32).to_be_bytes());
    message.extend_from_slice(risk);
    message
}

/// Domain-separated digest that operators sign
pub fn result_digest(
    request_id: &RequestId,
    subject: &Address,
    status: ComplianceStatus,
    risk_level: &str,
) -> [u8; 32] {
    let message_hash = hash_bytes(&canonical_result_message(
        request_id, subject, status, risk_level,
    ));

    let mut hasher = Sha256::new();
    hasher.update(SIGNED_RESULT_PREFIX);
    hasher.update(message_hash);
    hasher.finalize().into()
}

/// Replay-guard key: hash of the exact signed message (digest + signature)
pub fn replay_fingerprint(digest: &[u8; 32], signature: &OperatorSignature) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(REPLAY_DOMAIN);
    hasher.update(digest);
    hasher.update(signature.as_bytes());
    hasher.finalize().into()
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
