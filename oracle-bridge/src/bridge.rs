//! Bridge façade
//!
//! This module ties the registry, replay guard, signature verifier,
//! request ledger and result forwarder into the operations the Transfer
//! Ledger and the operator pipeline call.
//!
//! Every mutator takes `&mut self` and validates all preconditions before
//! touching state, so a call either fails with no effect or commits the
//! replay-guard entry and the completion flag together. Forwarding happens
//! after the commit and is never rolled back.
//!
//! # Example
//!
//! ```
//! use oracle_bridge::{Address, Bridge, ChannelSink, ComplianceStatus, KeyPair, TransferId};
//! use std::sync::Arc;
//!
//! # fn main() -> oracle_bridge::Result<()> {
//! let owner = KeyPair::from_seed(&[1u8; 32]);
//! let (sink, _forwards) = ChannelSink::channel(16);
//! let mut bridge = Bridge::new(owner.address(), Arc::new(sink))?;
//!
//! let ledger = Address::from_bytes([7u8; 32]);
//! let subject = Address::from_bytes([9u8; 32]);
//! let request_id = bridge.request_screening(&ledger, subject, TransferId(42))?;
//!
//! let signature = owner.sign_result(&request_id, &subject, ComplianceStatus::Approved, "low");
//! bridge.submit_screening_result(request_id, ComplianceStatus::Approved, "low", &signature)?;
//! assert!(bridge.is_screening_complete(&request_id));
//! # Ok(())
//! # }
//! ```

use crate::{
    clock::{Clock, SystemClock},
    config::BridgeConfig,
    crypto::{replay_fingerprint, result_digest, Ed25519Verifier, OperatorSignature, SignatureVerifier, BATCH_ID_DOMAIN},
    events::{BridgeEvent, EventBus},
    metrics::Metrics,
    registry::{AuthorizationRegistry, RequesterPolicy},
    replay::ReplayGuard,
    requests::ScreeningRequestLedger,
    sink::{ComplianceSink, ForwardCommand, ForwardOutcome, ResultForwarder},
    types::{
        Address, ComplianceStatus, RequestId, ScreeningOutcome, ScreeningRequest, SubmissionPath,
        TransferId,
    },
    Error, Result,
};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default per-subscriber event buffer
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Result of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Completed request
    pub request_id: RequestId,
    /// Screened address
    pub subject_address: Address,
    /// Transfer the result was forwarded for
    pub transfer_request_id: TransferId,
    /// Accepted status
    pub status: ComplianceStatus,
    /// Transfer-completion forward
    pub forward: ForwardOutcome,
    /// Compliance-status side-channel forward (direct path only)
    pub status_update: Option<ForwardOutcome>,
}

/// Result of a batch compliance update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Updates accepted by the sink
    pub forwarded: usize,
    /// Zero addresses skipped
    pub skipped: usize,
    /// Updates queued for redelivery
    pub deferred: usize,
    /// Synthetic screening id issued per processed address
    pub screening_ids: Vec<(Address, RequestId)>,
}

/// Screening oracle bridge state
pub struct Bridge {
    registry: AuthorizationRegistry,
    replay: ReplayGuard,
    requests: ScreeningRequestLedger,
    forwarder: ResultForwarder,
    verifier: Box<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    metrics: Metrics,
    request_ttl: Option<Duration>,
}

impl Bridge {
    /// Bridge owned by `owner`, forwarding into `sink`
    pub fn new(owner: Address, sink: Arc<dyn ComplianceSink>) -> Result<Self> {
        Ok(Self {
            registry: AuthorizationRegistry::new(owner)?,
            replay: ReplayGuard::new(),
            requests: ScreeningRequestLedger::new(),
            forwarder: ResultForwarder::new(sink),
            verifier: Box::new(Ed25519Verifier),
            clock: Arc::new(SystemClock),
            events: EventBus::new(DEFAULT_EVENT_CAPACITY),
            metrics: Metrics::new()?,
            request_ttl: None,
        })
    }

    /// Bridge built from configuration
    pub fn from_config(config: &BridgeConfig, sink: Arc<dyn ComplianceSink>) -> Result<Self> {
        let owner = config.owner_address()?;
        let mut bridge = Self::new(owner, sink)?
            .with_event_capacity(config.event_capacity)
            .with_request_ttl(config.request_ttl());

        if config.restrict_requesters {
            bridge
                .registry
                .set_requester_policy(&owner, RequesterPolicy::AllowList)?;
        }
        for requester in config.requester_addresses()? {
            bridge.registry.authorize_requester(&owner, requester)?;
        }

        info!(
            service = %config.service_name,
            owner = %owner,
            policy = ?bridge.registry.requester_policy(),
            "Bridge configured"
        );
        Ok(bridge)
    }

    /// Replace the signature scheme
    pub fn with_verifier(mut self, verifier: Box<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Allow expiry of requests older than `ttl`
    pub fn with_request_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.request_ttl = ttl;
        self
    }

    /// Resize the event buffer. Existing subscribers are detached.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventBus::new(capacity);
        self
    }

    // ----- Authorization registry -----

    /// Current owner
    pub fn owner(&self) -> Address {
        self.registry.owner()
    }

    /// Add an operator (owner-only, idempotent)
    pub fn authorize_oracle(&mut self, caller: &Address, operator: Address) -> Result<()> {
        if self.registry.authorize_oracle(caller, operator)? {
            self.events.emit(BridgeEvent::OracleAuthorized { operator });
        }
        Ok(())
    }

    /// Remove an operator (owner-only). Completed requests stay completed.
    pub fn revoke_oracle(&mut self, caller: &Address, operator: &Address) -> Result<()> {
        if self.registry.revoke_oracle(caller, operator)? {
            self.events.emit(BridgeEvent::OracleRevoked {
                operator: *operator,
            });
        }
        Ok(())
    }

    /// Pure lookup
    pub fn is_authorized_oracle(&self, operator: &Address) -> bool {
        self.registry.is_authorized_oracle(operator)
    }

    /// Hand ownership to `new_owner` (owner-only)
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        let previous = self.registry.transfer_ownership(caller, new_owner)?;
        self.events.emit(BridgeEvent::OwnershipTransferred {
            previous,
            new_owner,
        });
        Ok(())
    }

    /// Switch who may open requests (owner-only)
    pub fn set_requester_policy(&mut self, caller: &Address, policy: RequesterPolicy) -> Result<()> {
        self.registry.set_requester_policy(caller, policy)
    }

    /// Allow `requester` to open requests (owner-only)
    pub fn authorize_requester(&mut self, caller: &Address, requester: Address) -> Result<()> {
        if self.registry.authorize_requester(caller, requester)? {
            self.events
                .emit(BridgeEvent::RequesterAuthorized { requester });
        }
        Ok(())
    }

    /// Withdraw a requester (owner-only)
    pub fn revoke_requester(&mut self, caller: &Address, requester: &Address) -> Result<()> {
        if self.registry.revoke_requester(caller, requester)? {
            self.events.emit(BridgeEvent::RequesterRevoked {
                requester: *requester,
            });
        }
        Ok(())
    }

    // ----- Request ledger -----

    /// Open a screening request for `subject` on behalf of `transfer`
    pub fn request_screening(
        &mut self,
        caller: &Address,
        subject: Address,
        transfer: TransferId,
    ) -> Result<RequestId> {
        self.registry.ensure_requester(caller)?;

        let now = self.clock.now();
        let request_id = self.requests.create(subject, transfer, now)?.request_id;

        self.metrics.requests_total.inc();
        self.metrics.pending_requests.inc();
        info!(
            request_id = %request_id,
            subject = %subject,
            transfer = %transfer,
            "Screening requested"
        );

        self.events.emit(BridgeEvent::ScreeningRequested {
            request_id,
            subject_address: subject,
            transfer_request_id: transfer,
        });
        Ok(request_id)
    }

    /// Record by id; the zero-value record when unknown
    pub fn get_screening_request(&self, request_id: &RequestId) -> ScreeningRequest {
        self.requests.get(request_id)
    }

    /// Most recent request for a transfer; the zero id when none
    pub fn get_screening_by_transfer(&self, transfer: TransferId) -> RequestId {
        self.requests.by_transfer(transfer)
    }

    /// True once a result was accepted
    pub fn is_screening_complete(&self, request_id: &RequestId) -> bool {
        self.requests
            .lookup(request_id)
            .map(|r| r.completed)
            .unwrap_or(false)
    }

    /// Requests awaiting a result
    pub fn pending_count(&self) -> usize {
        self.requests.pending_count()
    }

    /// Open request records, oldest first
    pub fn pending_requests(&self) -> Vec<ScreeningRequest> {
        self.requests.pending()
    }

    // ----- Submissions -----

    /// Accept a signed result from an authorized operator
    pub fn submit_screening_result(
        &mut self,
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: &str,
        signature: &OperatorSignature,
    ) -> Result<SubmissionReceipt> {
        let result = self.accept_signed(request_id, status, risk_level, signature);
        self.record_submission(SubmissionPath::Signed, &request_id, &result);
        result
    }

    fn accept_signed(
        &mut self,
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: &str,
        signature: &OperatorSignature,
    ) -> Result<SubmissionReceipt> {
        let subject = self
            .requests
            .lookup(&request_id)
            .ok_or(Error::ScreeningNotFound(request_id))?
            .subject_address;

        let digest = result_digest(&request_id, &subject, status, risk_level);
        let fingerprint = replay_fingerprint(&digest, signature);

        // Replay first: a resubmitted signed message is reported as such
        // whatever state the request is in.
        if self.replay.contains(&fingerprint) {
            return Err(Error::SignatureAlreadyUsed);
        }
        self.requests.ensure_pending(&request_id)?;

        let signer = self
            .verifier
            .recover(&digest, signature)
            .filter(|signer| self.registry.is_authorized_oracle(signer))
            .ok_or(Error::InvalidSignature)?;
        debug!(request_id = %request_id, signer = %signer, "Signature recovered");

        let record = self.requests.complete(
            &request_id,
            ScreeningOutcome {
                status,
                risk_level: risk_level.to_string(),
                path: SubmissionPath::Signed,
            },
            self.clock.now(),
        )?;
        self.replay.consume(fingerprint);

        Ok(self.finish_completion(record, status, None))
    }

    /// Accept an unsigned result from an authorized operator calling directly
    pub fn submit_screening_result_direct(
        &mut self,
        caller: &Address,
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: &str,
    ) -> Result<SubmissionReceipt> {
        let result = self.accept_direct(caller, request_id, status, risk_level);
        self.record_submission(SubmissionPath::Direct, &request_id, &result);
        result
    }

    fn accept_direct(
        &mut self,
        caller: &Address,
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: &str,
    ) -> Result<SubmissionReceipt> {
        if !self.registry.is_authorized_oracle(caller) {
            return Err(Error::NotAuthorizedOracle);
        }

        let record = self.requests.complete(
            &request_id,
            ScreeningOutcome {
                status,
                risk_level: risk_level.to_string(),
                path: SubmissionPath::Direct,
            },
            self.clock.now(),
        )?;

        let status_update = ForwardCommand::UpdateStatus {
            address: record.subject_address,
            status,
            screening_id: request_id,
            risk_level: risk_level.to_string(),
        };
        Ok(self.finish_completion(record, status, Some(status_update)))
    }

    /// Forward and announce a completion that is already committed
    fn finish_completion(
        &mut self,
        record: ScreeningRequest,
        status: ComplianceStatus,
        status_update: Option<ForwardCommand>,
    ) -> SubmissionReceipt {
        self.metrics.pending_requests.dec();

        let forward = self.forward(ForwardCommand::SubmitResult {
            transfer_id: record.transfer_request_id,
            status,
            request_id: record.request_id,
        });
        let status_update = status_update.map(|command| self.forward(command));

        self.events.emit(BridgeEvent::ScreeningCompleted {
            request_id: record.request_id,
            subject_address: record.subject_address,
            status,
        });

        SubmissionReceipt {
            request_id: record.request_id,
            subject_address: record.subject_address,
            transfer_request_id: record.transfer_request_id,
            status,
            forward,
            status_update,
        }
    }

    fn record_submission(
        &self,
        path: SubmissionPath,
        request_id: &RequestId,
        result: &Result<SubmissionReceipt>,
    ) {
        match result {
            Ok(receipt) => {
                self.metrics.record_submission(path.as_str(), "accepted");
                info!(
                    request_id = %request_id,
                    path = path.as_str(),
                    status = %receipt.status,
                    transfer = %receipt.transfer_request_id,
                    "Screening completed"
                );
            }
            Err(e) => {
                self.metrics.record_submission(path.as_str(), e.kind());
                warn!(
                    request_id = %request_id,
                    path = path.as_str(),
                    "Submission rejected: {}",
                    e
                );
            }
        }
    }

    // ----- Manual overrides -----

    /// Push a status for `address` without touching the request ledger (owner-only)
    pub fn direct_compliance_update(
        &mut self,
        caller: &Address,
        address: Address,
        status: ComplianceStatus,
        screening_id: RequestId,
        risk_level: &str,
    ) -> Result<ForwardOutcome> {
        self.registry.ensure_owner(caller)?;
        if address.is_zero() {
            return Err(Error::ZeroAddress("address"));
        }

        info!(address = %address, status = %status, "Manual compliance update");
        Ok(self.push_status_update(address, status, screening_id, risk_level))
    }

    /// Push one status per non-zero address (owner-only).
    ///
    /// Zero entries are skipped. Each processed address gets a synthetic
    /// screening id derived from `(address, timestamp, index)`; no request
    /// records are created.
    pub fn batch_compliance_update(
        &mut self,
        caller: &Address,
        addresses: &[Address],
        status: ComplianceStatus,
        risk_level: &str,
    ) -> Result<BatchReceipt> {
        self.registry.ensure_owner(caller)?;

        let now = self.clock.now();
        let mut receipt = BatchReceipt::default();

        for (index, address) in addresses.iter().enumerate() {
            if address.is_zero() {
                receipt.skipped += 1;
                continue;
            }

            let screening_id = batch_screening_id(address, now, index as u64);
            match self.push_status_update(*address, status, screening_id, risk_level) {
                ForwardOutcome::Delivered => receipt.forwarded += 1,
                ForwardOutcome::Deferred { .. } => receipt.deferred += 1,
            }
            receipt.screening_ids.push((*address, screening_id));
        }

        info!(
            status = %status,
            forwarded = receipt.forwarded,
            deferred = receipt.deferred,
            skipped = receipt.skipped,
            "Batch compliance update"
        );
        Ok(receipt)
    }

    fn push_status_update(
        &mut self,
        address: Address,
        status: ComplianceStatus,
        screening_id: RequestId,
        risk_level: &str,
    ) -> ForwardOutcome {
        let outcome = self.forward(ForwardCommand::UpdateStatus {
            address,
            status,
            screening_id,
            risk_level: risk_level.to_string(),
        });

        self.metrics.compliance_updates.inc();
        self.events.emit(BridgeEvent::ComplianceUpdated {
            address,
            status,
            screening_id,
        });
        outcome
    }

    // ----- Expiry -----

    /// Close a stale pending request (owner-only)
    pub fn expire_screening(&mut self, caller: &Address, request_id: RequestId) -> Result<ScreeningRequest> {
        self.registry.ensure_owner(caller)?;

        let record = self.requests.ensure_pending(&request_id)?;
        if let Some(ttl) = self.request_ttl {
            if self.clock.now() - record.created_at < ttl {
                return Err(Error::ScreeningNotStale(request_id));
            }
        }

        let record = self.requests.expire(&request_id)?;
        self.metrics.pending_requests.dec();
        info!(request_id = %request_id, subject = %record.subject_address, "Screening expired");

        self.events.emit(BridgeEvent::ScreeningExpired {
            request_id,
            subject_address: record.subject_address,
        });
        Ok(record)
    }

    /// Pending requests eligible for expiry, oldest first
    pub fn stale_requests(&self) -> Vec<RequestId> {
        let now = self.clock.now();
        let cutoff = match self.request_ttl {
            Some(ttl) => now - ttl,
            None => now,
        };
        self.requests.pending_before(cutoff)
    }

    // ----- Forwarding -----

    fn forward(&mut self, command: ForwardCommand) -> ForwardOutcome {
        let outcome = self.forwarder.forward(command);
        if let ForwardOutcome::Deferred { reason } = &outcome {
            self.metrics.forwards_deferred.inc();
            self.events.emit(BridgeEvent::ForwardDeferred {
                reason: reason.clone(),
            });
        }
        outcome
    }

    /// Forwards the sink refused, oldest first
    pub fn undelivered_forwards(&self) -> Vec<ForwardCommand> {
        self.forwarder.undelivered()
    }

    /// Retry refused forwards (owner-only); returns how many went through
    pub fn redeliver_forwards(&mut self, caller: &Address) -> Result<usize> {
        self.registry.ensure_owner(caller)?;
        Ok(self.forwarder.redeliver())
    }

    // ----- Observability -----

    /// New event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Event bus handle
    pub fn event_bus(&self) -> EventBus {
        self.events.clone()
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Consumed signed messages
    pub fn consumed_signatures(&self) -> usize {
        self.replay.len()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("owner", &self.registry.owner())
            .field("oracles", &self.registry.oracle_count())
            .field("requests", &self.requests.len())
            .field("consumed_signatures", &self.replay.len())
            .field("forwarder", &self.forwarder)
            .field("request_ttl", &self.request_ttl)
            .finish()
    }
}

/// Synthetic screening id for one batch entry
pub fn batch_screening_id(address: &Address, at: DateTime<Utc>, index: u64) -> RequestId {
    let nanos = at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000));

    let mut hasher = Sha256::new();
    hasher.update(BATCH_ID_DOMAIN);
    hasher.update(address.as_bytes());
    hasher.update(nanos.to_be_bytes());
    hasher.update(index.to_be_bytes());
    RequestId::from_bytes(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::KeyPair;
    use crate::error::SinkError;
    use crate::types::RequestState;
    use parking_lot::Mutex;

    /// Sink recording every call; can be switched to refuse
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<ForwardCommand>>,
        refuse: Mutex<bool>,
        reject_updates: Mutex<bool>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<ForwardCommand> {
            self.calls.lock().clone()
        }

        fn record(&self, command: ForwardCommand) -> std::result::Result<(), SinkError> {
            if *self.refuse.lock() {
                return Err(SinkError::Unavailable("down".to_string()));
            }
            self.calls.lock().push(command);
            Ok(())
        }
    }

    impl ComplianceSink for RecordingSink {
        fn submit_result(
            &self,
            transfer_id: TransferId,
            status: ComplianceStatus,
            request_id: RequestId,
        ) -> std::result::Result<(), SinkError> {
            self.record(ForwardCommand::SubmitResult {
                transfer_id,
                status,
                request_id,
            })
        }

        fn update_status(
            &self,
            address: &Address,
            status: ComplianceStatus,
            screening_id: RequestId,
            risk_level: &str,
        ) -> std::result::Result<(), SinkError> {
            if *self.reject_updates.lock() {
                return Err(SinkError::Rejected(format!("unknown account {}", address)));
            }
            self.record(ForwardCommand::UpdateStatus {
                address: *address,
                status,
                screening_id,
                risk_level: risk_level.to_string(),
            })
        }
    }

    struct Fixture {
        bridge: Bridge,
        sink: Arc<RecordingSink>,
        owner: KeyPair,
        operator: KeyPair,
        ledger: Address,
        subject: Address,
    }

    fn fixture() -> Fixture {
        let owner = KeyPair::from_seed(&[1u8; 32]);
        let operator = KeyPair::from_seed(&[2u8; 32]);
        let sink = Arc::new(RecordingSink::default());
        let mut bridge = Bridge::new(owner.address(), sink.clone()).unwrap();
        bridge
            .authorize_oracle(&owner.address(), operator.address())
            .unwrap();

        Fixture {
            bridge,
            sink,
            owner,
            operator,
            ledger: Address::from_bytes([0xaa; 32]),
            subject: Address::from_bytes([0x5e; 32]),
        }
    }

    #[test]
    fn test_signed_submission_completes_and_forwards() {
        let mut f = fixture();
        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(42))
            .unwrap();
        assert_eq!(f.bridge.get_screening_by_transfer(TransferId(42)), id);

        let sig = f
            .operator
            .sign_result(&id, &f.subject, ComplianceStatus::Rejected, "high");
        let receipt = f
            .bridge
            .submit_screening_result(id, ComplianceStatus::Rejected, "high", &sig)
            .unwrap();

        assert!(receipt.forward.is_delivered());
        assert!(receipt.status_update.is_none());
        assert!(f.bridge.is_screening_complete(&id));
        assert_eq!(
            f.sink.calls(),
            vec![ForwardCommand::SubmitResult {
                transfer_id: TransferId(42),
                status: ComplianceStatus::Rejected,
                request_id: id,
            }]
        );
        assert_eq!(f.bridge.metrics().submissions("signed", "accepted"), 1);
        assert_eq!(f.bridge.metrics().pending_requests.get(), 0);
    }

    #[test]
    fn test_unknown_request_not_found() {
        let mut f = fixture();
        let id = RequestId::from_bytes([3u8; 32]);
        let sig = f
            .operator
            .sign_result(&id, &f.subject, ComplianceStatus::Approved, "low");

        assert!(matches!(
            f.bridge
                .submit_screening_result(id, ComplianceStatus::Approved, "low", &sig),
            Err(Error::ScreeningNotFound(_))
        ));
        assert!(matches!(
            f.bridge.submit_screening_result_direct(
                &f.operator.address(),
                id,
                ComplianceStatus::Approved,
                "low"
            ),
            Err(Error::ScreeningNotFound(_))
        ));
        assert_eq!(
            f.bridge.metrics().submissions("signed", "screening_not_found"),
            1
        );
    }

    #[test]
    fn test_unauthorized_signer_rejected_without_side_effects() {
        let mut f = fixture();
        let outsider = KeyPair::from_seed(&[9u8; 32]);
        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(1))
            .unwrap();

        let sig = outsider.sign_result(&id, &f.subject, ComplianceStatus::Approved, "low");
        assert!(matches!(
            f.bridge
                .submit_screening_result(id, ComplianceStatus::Approved, "low", &sig),
            Err(Error::InvalidSignature)
        ));
        assert!(!f.bridge.is_screening_complete(&id));
        assert_eq!(f.bridge.consumed_signatures(), 0);
        assert!(f.sink.calls().is_empty());
    }

    #[test]
    fn test_signature_over_other_fields_rejected() {
        let mut f = fixture();
        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(1))
            .unwrap();

        // Operator signed "approved", caller claims "rejected"
        let sig = f
            .operator
            .sign_result(&id, &f.subject, ComplianceStatus::Approved, "low");
        assert!(matches!(
            f.bridge
                .submit_screening_result(id, ComplianceStatus::Rejected, "low", &sig),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn test_direct_submission_forwards_both() {
        let mut f = fixture();
        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(5))
            .unwrap();

        let receipt = f
            .bridge
            .submit_screening_result_direct(
                &f.operator.address(),
                id,
                ComplianceStatus::Pending,
                "medium",
            )
            .unwrap();

        assert_eq!(receipt.status_update, Some(ForwardOutcome::Delivered));
        assert_eq!(
            f.sink.calls(),
            vec![
                ForwardCommand::SubmitResult {
                    transfer_id: TransferId(5),
                    status: ComplianceStatus::Pending,
                    request_id: id,
                },
                ForwardCommand::UpdateStatus {
                    address: f.subject,
                    status: ComplianceStatus::Pending,
                    screening_id: id,
                    risk_level: "medium".to_string(),
                },
            ]
        );

        let record = f.bridge.get_screening_request(&id);
        assert_eq!(record.state(), RequestState::Completed);
        assert_eq!(record.outcome.unwrap().path, SubmissionPath::Direct);
    }

    #[test]
    fn test_direct_submission_requires_operator() {
        let mut f = fixture();
        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(5))
            .unwrap();

        assert!(matches!(
            f.bridge.submit_screening_result_direct(
                &f.ledger,
                id,
                ComplianceStatus::Approved,
                "low"
            ),
            Err(Error::NotAuthorizedOracle)
        ));
        assert!(!f.bridge.is_screening_complete(&id));
    }

    #[test]
    fn test_direct_after_signed_already_completed() {
        let mut f = fixture();
        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(5))
            .unwrap();
        let sig = f
            .operator
            .sign_result(&id, &f.subject, ComplianceStatus::Approved, "low");
        f.bridge
            .submit_screening_result(id, ComplianceStatus::Approved, "low", &sig)
            .unwrap();

        assert!(matches!(
            f.bridge.submit_screening_result_direct(
                &f.owner.address(),
                id,
                ComplianceStatus::Rejected,
                "high"
            ),
            Err(Error::ScreeningAlreadyCompleted(_))
        ));
    }

    #[test]
    fn test_sink_failure_keeps_completion() {
        let mut f = fixture();
        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(8))
            .unwrap();
        let mut events = f.bridge.subscribe();

        *f.sink.refuse.lock() = true;
        let sig = f
            .operator
            .sign_result(&id, &f.subject, ComplianceStatus::Approved, "low");
        let receipt = f
            .bridge
            .submit_screening_result(id, ComplianceStatus::Approved, "low", &sig)
            .unwrap();

        assert!(matches!(receipt.forward, ForwardOutcome::Deferred { .. }));
        assert!(f.bridge.is_screening_complete(&id));
        assert_eq!(f.bridge.consumed_signatures(), 1);
        assert_eq!(f.bridge.undelivered_forwards().len(), 1);
        assert_eq!(f.bridge.metrics().forwards_deferred.get(), 1);
        assert!(matches!(
            events.try_recv().unwrap(),
            BridgeEvent::ForwardDeferred { .. }
        ));

        // Only the owner may drive redelivery
        assert!(matches!(
            f.bridge.redeliver_forwards(&f.operator.address()),
            Err(Error::NotOwner)
        ));

        *f.sink.refuse.lock() = false;
        assert_eq!(f.bridge.redeliver_forwards(&f.owner.address()).unwrap(), 1);
        assert!(f.bridge.undelivered_forwards().is_empty());
        assert_eq!(f.sink.calls().len(), 1);
    }

    #[test]
    fn test_direct_compliance_update_owner_only() {
        let mut f = fixture();
        let target = Address::from_bytes([0x77; 32]);
        let screening_id = RequestId::from_bytes([0x11; 32]);

        assert!(matches!(
            f.bridge.direct_compliance_update(
                &f.operator.address(),
                target,
                ComplianceStatus::Approved,
                screening_id,
                "low"
            ),
            Err(Error::NotOwner)
        ));
        assert!(matches!(
            f.bridge.direct_compliance_update(
                &f.owner.address(),
                Address::ZERO,
                ComplianceStatus::Approved,
                screening_id,
                "low"
            ),
            Err(Error::ZeroAddress(_))
        ));

        let outcome = f
            .bridge
            .direct_compliance_update(
                &f.owner.address(),
                target,
                ComplianceStatus::Approved,
                screening_id,
                "low",
            )
            .unwrap();
        assert!(outcome.is_delivered());
        assert_eq!(f.sink.calls().len(), 1);
        // No request bookkeeping
        assert_eq!(f.bridge.get_screening_request(&screening_id).state(), RequestState::Unknown);
    }

    #[test]
    fn test_batch_skips_zero_entries() {
        let mut f = fixture();
        let a = Address::from_bytes([0x01; 32]);
        let b = Address::from_bytes([0x02; 32]);
        let addresses = vec![a, Address::ZERO, b, Address::ZERO];

        let receipt = f
            .bridge
            .batch_compliance_update(&f.owner.address(), &addresses, ComplianceStatus::Approved, "low")
            .unwrap();

        assert_eq!(receipt.forwarded, 2);
        assert_eq!(receipt.skipped, 2);
        assert_eq!(receipt.deferred, 0);
        assert_eq!(f.sink.calls().len(), 2);
        assert_ne!(receipt.screening_ids[0].1, receipt.screening_ids[1].1);
        assert_eq!(f.bridge.pending_count(), 0);
    }

    #[test]
    fn test_batch_owner_only() {
        let mut f = fixture();
        assert!(matches!(
            f.bridge.batch_compliance_update(
                &f.operator.address(),
                &[Address::from_bytes([1u8; 32])],
                ComplianceStatus::Approved,
                "low"
            ),
            Err(Error::NotOwner)
        ));
        assert!(f.sink.calls().is_empty());
    }

    #[test]
    fn test_batch_ids_differ_by_index() {
        let at = Utc::now();
        let a = Address::from_bytes([1u8; 32]);
        assert_ne!(batch_screening_id(&a, at, 0), batch_screening_id(&a, at, 1));
    }

    #[test]
    fn test_requester_allow_list_gates_requests() {
        let mut f = fixture();
        let owner = f.owner.address();
        f.bridge
            .set_requester_policy(&owner, RequesterPolicy::AllowList)
            .unwrap();

        assert!(matches!(
            f.bridge.request_screening(&f.ledger, f.subject, TransferId(1)),
            Err(Error::NotAuthorizedRequester)
        ));

        f.bridge.authorize_requester(&owner, f.ledger).unwrap();
        assert!(f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(1))
            .is_ok());
    }

    #[test]
    fn test_zero_subject_rejected() {
        let mut f = fixture();
        assert!(matches!(
            f.bridge.request_screening(&f.ledger, Address::ZERO, TransferId(1)),
            Err(Error::ZeroAddress(_))
        ));
        assert_eq!(f.bridge.metrics().requests_total.get(), 0);
    }

    #[test]
    fn test_expiry_respects_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut f = fixture();
        let owner = f.owner.address();
        let sink = f.sink.clone();
        f.bridge = Bridge::new(owner, sink)
            .unwrap()
            .with_clock(clock.clone())
            .with_request_ttl(Some(Duration::minutes(10)));

        let id = f
            .bridge
            .request_screening(&f.ledger, f.subject, TransferId(3))
            .unwrap();

        assert!(matches!(
            f.bridge.expire_screening(&owner, id),
            Err(Error::ScreeningNotStale(_))
        ));
        assert!(f.bridge.stale_requests().is_empty());

        clock.advance(Duration::minutes(11));
        assert_eq!(f.bridge.stale_requests(), vec![id]);
        assert!(matches!(
            f.bridge.expire_screening(&f.ledger, id),
            Err(Error::NotOwner)
        ));

        let record = f.bridge.expire_screening(&owner, id).unwrap();
        assert_eq!(record.state(), RequestState::Expired);
        assert!(!f.bridge.is_screening_complete(&id));

        // Owner is auto-authorized, so the direct path reaches the state check
        assert!(matches!(
            f.bridge
                .submit_screening_result_direct(&owner, id, ComplianceStatus::Approved, "low"),
            Err(Error::ScreeningExpired(_))
        ));
        assert!(matches!(
            f.bridge.expire_screening(&owner, id),
            Err(Error::ScreeningExpired(_))
        ));
    }

    #[test]
    fn test_registry_events() {
        let mut f = fixture();
        let owner = f.owner.address();
        let mut events = f.bridge.subscribe();
        let op = Address::from_bytes([0x33; 32]);

        f.bridge.authorize_oracle(&owner, op).unwrap();
        f.bridge.authorize_oracle(&owner, op).unwrap();
        f.bridge.revoke_oracle(&owner, &op).unwrap();
        f.bridge.transfer_ownership(&owner, op).unwrap();

        assert_eq!(events.try_recv().unwrap(), BridgeEvent::OracleAuthorized { operator: op });
        assert_eq!(events.try_recv().unwrap(), BridgeEvent::OracleRevoked { operator: op });
        assert_eq!(
            events.try_recv().unwrap(),
            BridgeEvent::OwnershipTransferred {
                previous: owner,
                new_owner: op
            }
        );
        assert!(events.try_recv().is_err());
        assert_eq!(f.bridge.owner(), op);
    }

    #[test]
    fn test_rejected_status_update_is_queued() {
        let mut f = fixture();
        let target = Address::from_bytes([0x77; 32]);
        *f.sink.reject_updates.lock() = true;

        let outcome = f
            .bridge
            .direct_compliance_update(
                &f.owner.address(),
                target,
                ComplianceStatus::Rejected,
                RequestId::from_bytes([0x11; 32]),
                "severe",
            )
            .unwrap();

        match outcome {
            ForwardOutcome::Deferred { reason } => assert!(reason.contains("rejected")),
            other => panic!("expected deferral, got {:?}", other),
        }
        assert_eq!(f.bridge.undelivered_forwards().len(), 1);

        *f.sink.reject_updates.lock() = false;
        assert_eq!(f.bridge.redeliver_forwards(&f.owner.address()).unwrap(), 1);
        assert_eq!(f.sink.calls().len(), 1);
    }

    #[test]
    fn test_from_config_restricts_requesters() {
        let owner = KeyPair::from_seed(&[1u8; 32]);
        let allowed = Address::from_hex("0x1111111111111111111111111111111111111111").unwrap();
        let outsider = Address::from_bytes([0x99; 32]);
        let config = BridgeConfig {
            owner: owner.address().to_hex(),
            request_ttl_secs: Some(3600),
            restrict_requesters: true,
            allowed_requesters: vec!["0x1111111111111111111111111111111111111111".to_string()],
            ..Default::default()
        };

        let mut bridge =
            Bridge::from_config(&config, Arc::new(RecordingSink::default())).unwrap();
        assert_eq!(bridge.owner(), owner.address());
        assert!(bridge.is_authorized_oracle(&owner.address()));

        assert!(matches!(
            bridge.request_screening(&outsider, Address::from_bytes([4u8; 32]), TransferId(1)),
            Err(Error::NotAuthorizedRequester)
        ));
        let id = bridge
            .request_screening(&allowed, Address::from_bytes([4u8; 32]), TransferId(1))
            .unwrap();

        // A fresh request is younger than the configured TTL
        assert!(matches!(
            bridge.expire_screening(&owner.address(), id),
            Err(Error::ScreeningNotStale(_))
        ));
        assert!(bridge.stale_requests().is_empty());
        assert_eq!(bridge.pending_requests().len(), 1);
    }

    #[test]
    fn test_from_config_rejects_bad_requester() {
        let config = BridgeConfig {
            owner: KeyPair::from_seed(&[1u8; 32]).address().to_hex(),
            allowed_requesters: vec!["not-hex".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            Bridge::from_config(&config, Arc::new(RecordingSink::default())),
            Err(Error::InvalidAddress(_))
        ));
    }
}
