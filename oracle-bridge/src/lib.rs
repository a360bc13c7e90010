//! DelTran Screening Oracle Bridge
//!
//! Lets the transfer ledger defer a compliance decision to an off-chain
//! screening authority and accept the attested result back before funds
//! are released.
//!
//! # Architecture
//!
//! - **Authorization Registry**: owner-controlled operator allow-list
//! - **Replay Guard**: append-only set of consumed signed-message fingerprints
//! - **Signature Verifier**: recovers the operator behind a signed result
//! - **Request Ledger**: one record per request, correlated to its transfer
//! - **Result Forwarder**: pushes accepted outcomes to the transfer ledger
//! - **Bridge**: the façade; **BridgeActor** serializes calls into one order
//!
//! # Invariants
//!
//! - Request ids are pairwise distinct, even within the same instant
//! - A request completes at most once; `PENDING -> COMPLETED` is terminal
//! - A signed message is accepted at most once
//! - Replay-guard insertion and completion are committed together

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod metrics;
pub mod registry;
pub mod replay;
pub mod requests;
pub mod sink;
pub mod types;

// Re-exports
pub use actor::{spawn_bridge_actor, BridgeHandle};
pub use bridge::{BatchReceipt, Bridge, SubmissionReceipt};
pub use config::BridgeConfig;
pub use crypto::{Ed25519Verifier, KeyPair, OperatorSignature, SignatureVerifier};
pub use error::{Error, Result, SinkError};
pub use events::BridgeEvent;
pub use registry::RequesterPolicy;
pub use sink::{ChannelSink, ComplianceSink, ForwardCommand, ForwardOutcome};
pub use types::{
    Address, ComplianceStatus, RequestId, RequestState, ScreeningRequest, TransferId,
};
