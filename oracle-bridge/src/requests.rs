//! Screening request ledger
//!
//! One record per request id plus a `transfer -> request` correlation
//! index where the most recent request wins. Ids come from a strictly
//! increasing counter hashed together with the request content, so two
//! requests created in the same instant with identical arguments still
//! get distinct ids.

use crate::crypto::REQUEST_ID_DOMAIN;
use crate::types::{Address, RequestId, ScreeningOutcome, ScreeningRequest, TransferId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

/// In-memory request store
#[derive(Debug, Default)]
pub struct ScreeningRequestLedger {
    records: HashMap<RequestId, ScreeningRequest>,
    by_transfer: HashMap<TransferId, RequestId>,
    counter: u64,
}

impl ScreeningRequestLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the id for the next request
    pub fn derive_request_id(
        subject: &Address,
        transfer: TransferId,
        created_at: DateTime<Utc>,
        counter: u64,
    ) -> RequestId {
        let nanos = created_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| created_at.timestamp_micros().saturating_mul(1_000));

        let mut hasher = Sha256::new();
        hasher.update(REQUEST_ID_DOMAIN);
        hasher.update(subject.as_bytes());
        hasher.update(transfer.0.to_be_bytes());
        hasher.update(nanos.to_be_bytes());
        hasher.update(counter.to_be_bytes());
        RequestId::from_bytes(hasher.finalize().into())
    }

    /// Create a pending request and point the transfer index at it
    pub fn create(
        &mut self,
        subject: Address,
        transfer: TransferId,
        created_at: DateTime<Utc>,
    ) -> Result<&ScreeningRequest> {
        if subject.is_zero() {
            return Err(Error::ZeroAddress("subject"));
        }

        self.counter += 1;
        let request_id = Self::derive_request_id(&subject, transfer, created_at, self.counter);

        let record = ScreeningRequest {
            request_id,
            subject_address: subject,
            transfer_request_id: transfer,
            created_at,
            ..ScreeningRequest::default()
        };

        if let Some(previous) = self.by_transfer.insert(transfer, request_id) {
            debug!("Transfer {} re-pointed from {} to {}", transfer, previous, request_id);
        }

        let stored = self.records.entry(request_id).or_insert(record);
        Ok(&*stored)
    }

    /// Record by id, or `None`
    pub fn lookup(&self, request_id: &RequestId) -> Option<&ScreeningRequest> {
        self.records.get(request_id)
    }

    /// Record by id, or the zero-value record
    pub fn get(&self, request_id: &RequestId) -> ScreeningRequest {
        self.lookup(request_id).cloned().unwrap_or_default()
    }

    /// Most recent request for a transfer, or the zero id
    pub fn by_transfer(&self, transfer: TransferId) -> RequestId {
        self.by_transfer.get(&transfer).copied().unwrap_or_default()
    }

    /// Pending record or the matching state error
    pub fn ensure_pending(&self, request_id: &RequestId) -> Result<&ScreeningRequest> {
        let record = self
            .lookup(request_id)
            .ok_or(Error::ScreeningNotFound(*request_id))?;

        if record.completed {
            return Err(Error::ScreeningAlreadyCompleted(*request_id));
        }
        if record.expired {
            return Err(Error::ScreeningExpired(*request_id));
        }
        Ok(record)
    }

    /// `PENDING -> COMPLETED`
    pub fn complete(
        &mut self,
        request_id: &RequestId,
        outcome: ScreeningOutcome,
        at: DateTime<Utc>,
    ) -> Result<ScreeningRequest> {
        self.ensure_pending(request_id)?;
        let record = self
            .records
            .get_mut(request_id)
            .ok_or(Error::ScreeningNotFound(*request_id))?;

        record.completed = true;
        record.completed_at = Some(at);
        record.outcome = Some(outcome);
        Ok(record.clone())
    }

    /// `PENDING -> EXPIRED`
    pub fn expire(&mut self, request_id: &RequestId) -> Result<ScreeningRequest> {
        self.ensure_pending(request_id)?;
        let record = self
            .records
            .get_mut(request_id)
            .ok_or(Error::ScreeningNotFound(*request_id))?;

        record.expired = true;
        Ok(record.clone())
    }

    /// Pending requests created at or before `cutoff`, oldest first
    pub fn pending_before(&self, cutoff: DateTime<Utc>) -> Vec<RequestId> {
        let mut stale: Vec<&ScreeningRequest> = self
            .records
            .values()
            .filter(|r| r.is_pending() && r.created_at <= cutoff)
            .collect();
        stale.sort_by_key(|r| (r.created_at, r.request_id));
        stale.into_iter().map(|r| r.request_id).collect()
    }

    /// Pending records, oldest first
    pub fn pending(&self) -> Vec<ScreeningRequest> {
        let mut pending: Vec<ScreeningRequest> = self
            .records
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.request_id));
        pending
    }

    /// Number of pending requests
    pub fn pending_count(&self) -> usize {
        self.records.values().filter(|r| r.is_pending()).count()
    }

    /// Total number of requests ever created
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no request was created yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
