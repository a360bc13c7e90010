//! Operator backend
//!
//! Listens for `ScreeningRequested` events, assesses the subject with the
//! screening provider, signs the mapped result with the operator key and
//! submits it through the bridge handle.

use crate::config::ProviderConfig;
use crate::error::{PipelineError, Result};
use crate::provider::{map_assessment, provider_address, risk_label, ScreeningProvider};
use crate::rate_limiter::{RateLimitResult, RateLimiter};
use crate::types::ProviderAssessment;
use oracle_bridge::{
    Address, BridgeEvent, BridgeHandle, Error as BridgeError, KeyPair, RequestId,
    SubmissionReceipt,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Limiter action for provider lookups
pub const SCREEN_ACTION: &str = "screen";

type InFlight = Arc<Mutex<HashSet<RequestId>>>;

/// Screens bridge requests and submits signed results
pub struct OperatorBackend {
    keypair: KeyPair,
    provider: Arc<dyn ScreeningProvider>,
    limiter: Arc<RateLimiter>,
    bridge: BridgeHandle,
    settings: ProviderConfig,
}

impl std::fmt::Debug for OperatorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorBackend")
            .field("operator", &self.keypair.address())
            .field("chain", &self.settings.chain)
            .finish()
    }
}

impl OperatorBackend {
    /// Backend signing with `keypair`
    pub fn new(
        keypair: KeyPair,
        provider: Arc<dyn ScreeningProvider>,
        limiter: Arc<RateLimiter>,
        bridge: BridgeHandle,
        settings: ProviderConfig,
    ) -> Self {
        Self {
            keypair,
            provider,
            limiter,
            bridge,
            settings,
        }
    }

    /// Identity results are signed with
    pub fn operator(&self) -> Address {
        self.keypair.address()
    }

    /// Screen one request and submit the signed result
    pub async fn process(
        &self,
        request_id: RequestId,
        subject: Address,
    ) -> Result<SubmissionReceipt> {
        let caller = self.operator().to_hex();
        if let RateLimitResult::Denied { retry_after } =
            self.limiter.check(&caller, SCREEN_ACTION).await
        {
            return Err(PipelineError::RateLimited { retry_after });
        }

        let assessment = self.assess_with_retry(&subject).await?;
        let status = map_assessment(&assessment);
        let risk = risk_label(&assessment);

        let signature = self.keypair.sign_result(&request_id, &subject, status, risk);
        let receipt = self
            .bridge
            .submit_screening_result(request_id, status, risk, signature)
            .await?;

        info!(
            request_id = %request_id,
            subject = %subject,
            status = status.as_str(),
            risk,
            "Screening result submitted"
        );
        Ok(receipt)
    }

    async fn assess_with_retry(&self, subject: &Address) -> Result<ProviderAssessment> {
        let address = provider_address(subject);
        let mut attempt = 0;

        loop {
            let outcome = tokio::time::timeout(
                self.settings.timeout(),
                self.provider.assess(&address, &self.settings.chain),
            )
            .await;

            let failure = match outcome {
                Ok(Ok(assessment)) => return Ok(assessment),
                Ok(Err(e)) => e,
                Err(_) => PipelineError::Timeout(self.settings.timeout_ms),
            };

            if attempt >= self.settings.max_retries {
                error!(address = %address, attempts = attempt + 1, "Screening provider failed: {}", failure);
                return Err(failure);
            }

            attempt += 1;
            let backoff = self.settings.backoff(attempt);
            warn!(address = %address, attempt, ?backoff, "Screening attempt failed, retrying: {}", failure);
            tokio::time::sleep(backoff).await;
        }
    }

    /// Process one request, waiting out rate-limit denials
    async fn handle_request(&self, request_id: RequestId, subject: Address) {
        match self.bridge.get_screening_request(request_id).await {
            Ok(record) if !record.is_pending() => {
                debug!(request_id = %request_id, "Request already closed, skipping");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!(request_id = %request_id, "Bridge unavailable: {}", e);
                return;
            }
        }

        loop {
            match self.process(request_id, subject).await {
                Ok(_) => return,
                Err(PipelineError::RateLimited { retry_after }) => {
                    debug!(request_id = %request_id, ?retry_after, "Rate limited, waiting");
                    tokio::time::sleep(retry_after).await;
                }
                Err(PipelineError::Bridge(
                    e @ (BridgeError::ScreeningAlreadyCompleted(_) | BridgeError::ScreeningExpired(_)),
                )) => {
                    info!(request_id = %request_id, "Request no longer pending: {}", e);
                    return;
                }
                Err(e) => {
                    error!(request_id = %request_id, "Screening failed: {}", e);
                    return;
                }
            }
        }
    }

    /// Consume bridge events until the bus closes.
    ///
    /// Requests are screened on their own tasks, at most
    /// `max_concurrent` at a time. Open requests are picked up from the
    /// bridge on start and again whenever the receiver lags.
    pub async fn run(self, mut events: broadcast::Receiver<BridgeEvent>) {
        info!(operator = %self.operator(), "Operator backend started");

        let backend = Arc::new(self);
        let permits = Arc::new(Semaphore::new(backend.settings.max_concurrent.max(1)));
        let in_flight: InFlight = Arc::new(Mutex::new(HashSet::new()));

        backend.rescan(&permits, &in_flight).await;

        loop {
            match events.recv().await {
                Ok(BridgeEvent::ScreeningRequested {
                    request_id,
                    subject_address,
                    ..
                }) => {
                    Self::dispatch(&backend, &permits, &in_flight, request_id, subject_address);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Operator lagged behind the event bus, rescanning open requests");
                    backend.rescan(&permits, &in_flight).await;
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!("Operator backend stopped");
    }

    /// Dispatch every open request not already being screened
    async fn rescan(self: &Arc<Self>, permits: &Arc<Semaphore>, in_flight: &InFlight) {
        match self.bridge.pending_requests().await {
            Ok(pending) => {
                debug!(open = pending.len(), "Rescanning open requests");
                for record in pending {
                    Self::dispatch(self, permits, in_flight, record.request_id, record.subject_address);
                }
            }
            Err(e) => error!("Failed to list open requests: {}", e),
        }
    }

    fn dispatch(
        backend: &Arc<Self>,
        permits: &Arc<Semaphore>,
        in_flight: &InFlight,
        request_id: RequestId,
        subject: Address,
    ) {
        if !in_flight.lock().insert(request_id) {
            return;
        }

        let backend = backend.clone();
        let permits = permits.clone();
        let in_flight = in_flight.clone();
        tokio::spawn(async move {
            if let Ok(_permit) = permits.acquire_owned().await {
                backend.handle_request(request_id, subject).await;
            }
            in_flight.lock().remove(&request_id);
        });
    }
}
