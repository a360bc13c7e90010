//! Actor-based serialization of bridge calls
//!
//! The bridge is a synchronous state machine; this module gives it the
//! single global call order a ledger runtime would:
//! - One task owns the [`Bridge`] and applies messages one at a time
//! - Callers hold a cloneable [`BridgeHandle`] and await a oneshot reply
//! - Racing submissions for the same request are applied in mailbox order,
//!   so exactly one wins and the rest see `ScreeningAlreadyCompleted`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ Transfer Ledger service  │   │ Operator backends (N)    │
//! └────────────┬─────────────┘   └────────────┬─────────────┘
//!              │     BridgeHandle (Clone)      │
//!              └───────────────┬───────────────┘
//!                              │ mpsc::channel (bounded)
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                BridgeActor (single task)                 │
//! │   Bridge::{request_screening, submit_*, overrides, ...}  │
//! └──────────────┬──────────────────────────┬────────────────┘
//!                │ ComplianceSink           │ EventBus (broadcast)
//!                ▼                          ▼
//!         Transfer Ledger            off-chain pipeline
//! ```

use crate::bridge::{BatchReceipt, Bridge, SubmissionReceipt};
use crate::crypto::OperatorSignature;
use crate::events::{BridgeEvent, EventBus};
use crate::registry::RequesterPolicy;
use crate::sink::{ForwardCommand, ForwardOutcome};
use crate::types::{Address, ComplianceStatus, RequestId, ScreeningRequest, TransferId};
use crate::{Error, Result};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Message sent to the bridge actor
#[derive(Debug)]
pub enum BridgeMessage {
    /// Open a screening request
    RequestScreening {
        caller: Address,
        subject: Address,
        transfer: TransferId,
        response: oneshot::Sender<Result<RequestId>>,
    },

    /// Signed result
    SubmitResult {
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: String,
        signature: OperatorSignature,
        response: oneshot::Sender<Result<SubmissionReceipt>>,
    },

    /// Unsigned result from an authorized operator
    SubmitResultDirect {
        caller: Address,
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: String,
        response: oneshot::Sender<Result<SubmissionReceipt>>,
    },

    /// Manual compliance update
    DirectComplianceUpdate {
        caller: Address,
        address: Address,
        status: ComplianceStatus,
        screening_id: RequestId,
        risk_level: String,
        response: oneshot::Sender<Result<ForwardOutcome>>,
    },

    /// Batch compliance update
    BatchComplianceUpdate {
        caller: Address,
        addresses: Vec<Address>,
        status: ComplianceStatus,
        risk_level: String,
        response: oneshot::Sender<Result<BatchReceipt>>,
    },

    /// Add an operator
    AuthorizeOracle {
        caller: Address,
        operator: Address,
        response: oneshot::Sender<Result<()>>,
    },

    /// Remove an operator
    RevokeOracle {
        caller: Address,
        operator: Address,
        response: oneshot::Sender<Result<()>>,
    },

    /// Change owner
    TransferOwnership {
        caller: Address,
        new_owner: Address,
        response: oneshot::Sender<Result<()>>,
    },

    /// Switch between open and allow-listed requesters
    SetRequesterPolicy {
        caller: Address,
        policy: RequesterPolicy,
        response: oneshot::Sender<Result<()>>,
    },

    /// Allow a requester
    AuthorizeRequester {
        caller: Address,
        requester: Address,
        response: oneshot::Sender<Result<()>>,
    },

    /// Remove a requester
    RevokeRequester {
        caller: Address,
        requester: Address,
        response: oneshot::Sender<Result<()>>,
    },

    /// Expire a stale request
    ExpireScreening {
        caller: Address,
        request_id: RequestId,
        response: oneshot::Sender<Result<ScreeningRequest>>,
    },

    /// Retry refused forwards
    RedeliverForwards {
        caller: Address,
        response: oneshot::Sender<Result<usize>>,
    },

    /// Read a request record
    GetScreeningRequest {
        request_id: RequestId,
        response: oneshot::Sender<ScreeningRequest>,
    },

    /// Correlation lookup
    GetScreeningByTransfer {
        transfer: TransferId,
        response: oneshot::Sender<RequestId>,
    },

    /// Operator lookup
    IsAuthorizedOracle {
        operator: Address,
        response: oneshot::Sender<bool>,
    },

    /// Open requests, oldest first
    PendingRequests {
        response: oneshot::Sender<Vec<ScreeningRequest>>,
    },

    /// Requests eligible for expiry
    StaleRequests {
        response: oneshot::Sender<Vec<RequestId>>,
    },

    /// Forwards waiting for redelivery
    UndeliveredForwards {
        response: oneshot::Sender<Vec<ForwardCommand>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the bridge
#[derive(Debug)]
pub struct BridgeActor {
    /// Bridge state
    bridge: Bridge,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<BridgeMessage>,
}

impl BridgeActor {
    /// Create new actor
    pub fn new(bridge: Bridge, mailbox: mpsc::Receiver<BridgeMessage>) -> Self {
        Self { bridge, mailbox }
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) -> Bridge {
        while let Some(msg) = self.mailbox.recv().await {
            if let BridgeMessage::Shutdown = msg {
                tracing::info!("Bridge actor shutting down");
                break;
            }
            self.handle_message(msg);
        }
        self.bridge
    }

    /// Handle a single message. Dropped reply channels are ignored.
    fn handle_message(&mut self, msg: BridgeMessage) {
        match msg {
            BridgeMessage::RequestScreening {
                caller,
                subject,
                transfer,
                response,
            } => {
                let _ = response.send(self.bridge.request_screening(&caller, subject, transfer));
            }

            BridgeMessage::SubmitResult {
                request_id,
                status,
                risk_level,
                signature,
                response,
            } => {
                let result =
                    self.bridge
                        .submit_screening_result(request_id, status, &risk_level, &signature);
                let _ = response.send(result);
            }

            BridgeMessage::SubmitResultDirect {
                caller,
                request_id,
                status,
                risk_level,
                response,
            } => {
                let result = self.bridge.submit_screening_result_direct(
                    &caller,
                    request_id,
                    status,
                    &risk_level,
                );
                let _ = response.send(result);
            }

            BridgeMessage::DirectComplianceUpdate {
                caller,
                address,
                status,
                screening_id,
                risk_level,
                response,
            } => {
                let result = self.bridge.direct_compliance_update(
                    &caller,
                    address,
                    status,
                    screening_id,
                    &risk_level,
                );
                let _ = response.send(result);
            }

            BridgeMessage::BatchComplianceUpdate {
                caller,
                addresses,
                status,
                risk_level,
                response,
            } => {
                let result =
                    self.bridge
                        .batch_compliance_update(&caller, &addresses, status, &risk_level);
                let _ = response.send(result);
            }

            BridgeMessage::AuthorizeOracle {
                caller,
                operator,
                response,
            } => {
                let _ = response.send(self.bridge.authorize_oracle(&caller, operator));
            }

            BridgeMessage::RevokeOracle {
                caller,
                operator,
                response,
            } => {
                let _ = response.send(self.bridge.revoke_oracle(&caller, &operator));
            }

            BridgeMessage::TransferOwnership {
                caller,
                new_owner,
                response,
            } => {
                let _ = response.send(self.bridge.transfer_ownership(&caller, new_owner));
            }

            BridgeMessage::SetRequesterPolicy {
                caller,
                policy,
                response,
            } => {
                let _ = response.send(self.bridge.set_requester_policy(&caller, policy));
            }

            BridgeMessage::AuthorizeRequester {
                caller,
                requester,
                response,
            } => {
                let _ = response.send(self.bridge.authorize_requester(&caller, requester));
            }

            BridgeMessage::RevokeRequester {
                caller,
                requester,
                response,
            } => {
                let _ = response.send(self.bridge.revoke_requester(&caller, &requester));
            }

            BridgeMessage::ExpireScreening {
                caller,
                request_id,
                response,
            } => {
                let _ = response.send(self.bridge.expire_screening(&caller, request_id));
            }

            BridgeMessage::RedeliverForwards { caller, response } => {
                let _ = response.send(self.bridge.redeliver_forwards(&caller));
            }

            BridgeMessage::GetScreeningRequest {
                request_id,
                response,
            } => {
                let _ = response.send(self.bridge.get_screening_request(&request_id));
            }

            BridgeMessage::GetScreeningByTransfer { transfer, response } => {
                let _ = response.send(self.bridge.get_screening_by_transfer(transfer));
            }

            BridgeMessage::IsAuthorizedOracle { operator, response } => {
                let _ = response.send(self.bridge.is_authorized_oracle(&operator));
            }

            BridgeMessage::PendingRequests { response } => {
                let _ = response.send(self.bridge.pending_requests());
            }

            BridgeMessage::StaleRequests { response } => {
                let _ = response.send(self.bridge.stale_requests());
            }

            BridgeMessage::UndeliveredForwards { response } => {
                let _ = response.send(self.bridge.undelivered_forwards());
            }

            BridgeMessage::Shutdown => {
                // Handled in run loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    sender: mpsc::Sender<BridgeMessage>,
    events: EventBus,
}

impl BridgeHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> BridgeMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Open a screening request
    pub async fn request_screening(
        &self,
        caller: Address,
        subject: Address,
        transfer: TransferId,
    ) -> Result<RequestId> {
        self.call(|response| BridgeMessage::RequestScreening {
            caller,
            subject,
            transfer,
            response,
        })
        .await?
    }

    /// Submit a signed result
    pub async fn submit_screening_result(
        &self,
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: impl Into<String>,
        signature: OperatorSignature,
    ) -> Result<SubmissionReceipt> {
        let risk_level = risk_level.into();
        self.call(|response| BridgeMessage::SubmitResult {
            request_id,
            status,
            risk_level,
            signature,
            response,
        })
        .await?
    }

    /// Submit an unsigned result as `caller`
    pub async fn submit_screening_result_direct(
        &self,
        caller: Address,
        request_id: RequestId,
        status: ComplianceStatus,
        risk_level: impl Into<String>,
    ) -> Result<SubmissionReceipt> {
        let risk_level = risk_level.into();
        self.call(|response| BridgeMessage::SubmitResultDirect {
            caller,
            request_id,
            status,
            risk_level,
            response,
        })
        .await?
    }

    /// Manual compliance update
    pub async fn direct_compliance_update(
        &self,
        caller: Address,
        address: Address,
        status: ComplianceStatus,
        screening_id: RequestId,
        risk_level: impl Into<String>,
    ) -> Result<ForwardOutcome> {
        let risk_level = risk_level.into();
        self.call(|response| BridgeMessage::DirectComplianceUpdate {
            caller,
            address,
            status,
            screening_id,
            risk_level,
            response,
        })
        .await?
    }

    /// Batch compliance update
    pub async fn batch_compliance_update(
        &self,
        caller: Address,
        addresses: Vec<Address>,
        status: ComplianceStatus,
        risk_level: impl Into<String>,
    ) -> Result<BatchReceipt> {
        let risk_level = risk_level.into();
        self.call(|response| BridgeMessage::BatchComplianceUpdate {
            caller,
            addresses,
            status,
            risk_level,
            response,
        })
        .await?
    }

    /// Add an operator
    pub async fn authorize_oracle(&self, caller: Address, operator: Address) -> Result<()> {
        self.call(|response| BridgeMessage::AuthorizeOracle {
            caller,
            operator,
            response,
        })
        .await?
    }

    /// Remove an operator
    pub async fn revoke_oracle(&self, caller: Address, operator: Address) -> Result<()> {
        self.call(|response| BridgeMessage::RevokeOracle {
            caller,
            operator,
            response,
        })
        .await?
    }

    /// Change owner
    pub async fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<()> {
        self.call(|response| BridgeMessage::TransferOwnership {
            caller,
            new_owner,
            response,
        })
        .await?
    }

    /// Switch requester policy (owner-only)
    pub async fn set_requester_policy(
        &self,
        caller: Address,
        policy: RequesterPolicy,
    ) -> Result<()> {
        self.call(|response| BridgeMessage::SetRequesterPolicy {
            caller,
            policy,
            response,
        })
        .await?
    }

    /// Allow a requester (owner-only)
    pub async fn authorize_requester(&self, caller: Address, requester: Address) -> Result<()> {
        self.call(|response| BridgeMessage::AuthorizeRequester {
            caller,
            requester,
            response,
        })
        .await?
    }

    /// Remove a requester (owner-only)
    pub async fn revoke_requester(&self, caller: Address, requester: Address) -> Result<()> {
        self.call(|response| BridgeMessage::RevokeRequester {
            caller,
            requester,
            response,
        })
        .await?
    }

    /// Expire a stale request
    pub async fn expire_screening(
        &self,
        caller: Address,
        request_id: RequestId,
    ) -> Result<ScreeningRequest> {
        self.call(|response| BridgeMessage::ExpireScreening {
            caller,
            request_id,
            response,
        })
        .await?
    }

    /// Retry refused forwards
    pub async fn redeliver_forwards(&self, caller: Address) -> Result<usize> {
        self.call(|response| BridgeMessage::RedeliverForwards { caller, response })
            .await?
    }

    /// Read a request record
    pub async fn get_screening_request(&self, request_id: RequestId) -> Result<ScreeningRequest> {
        self.call(|response| BridgeMessage::GetScreeningRequest {
            request_id,
            response,
        })
        .await
    }

    /// Correlation lookup
    pub async fn get_screening_by_transfer(&self, transfer: TransferId) -> Result<RequestId> {
        self.call(|response| BridgeMessage::GetScreeningByTransfer { transfer, response })
            .await
    }

    /// True once a result was accepted
    pub async fn is_screening_complete(&self, request_id: RequestId) -> Result<bool> {
        Ok(self.get_screening_request(request_id).await?.completed)
    }

    /// Operator lookup
    pub async fn is_authorized_oracle(&self, operator: Address) -> Result<bool> {
        self.call(|response| BridgeMessage::IsAuthorizedOracle { operator, response })
            .await
    }

    /// Open requests, oldest first
    pub async fn pending_requests(&self) -> Result<Vec<ScreeningRequest>> {
        self.call(|response| BridgeMessage::PendingRequests { response })
            .await
    }

    /// Requests eligible for expiry, oldest first
    pub async fn stale_requests(&self) -> Result<Vec<RequestId>> {
        self.call(|response| BridgeMessage::StaleRequests { response })
            .await
    }

    /// Forwards waiting for redelivery, oldest first
    pub async fn undelivered_forwards(&self) -> Result<Vec<ForwardCommand>> {
        self.call(|response| BridgeMessage::UndeliveredForwards { response })
            .await
    }

    /// New event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(BridgeMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the bridge actor, returning its handle and the task that yields
/// the bridge back on shutdown
pub fn spawn_bridge_actor(
    bridge: Bridge,
    mailbox_capacity: usize,
) -> (BridgeHandle, tokio::task::JoinHandle<Bridge>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let events = bridge.event_bus();
    let actor = BridgeActor::new(bridge, rx);

    let task = tokio::spawn(actor.run());

    (BridgeHandle { sender: tx, events }, task)
}
