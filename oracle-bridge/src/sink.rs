//! Result forwarding to the Transfer Ledger
//!
//! [`ComplianceSink`] is the Transfer Ledger seen from the bridge.
//! [`ResultForwarder`] pushes commands into it and keeps the ones it
//! refuses. Bridge state is committed before forwarding and never rolled
//! back, so a refused forward is queued for out-of-band redelivery.

use crate::error::SinkError;
use crate::types::{Address, ComplianceStatus, RequestId, TransferId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// The Transfer Ledger's compliance entry points
pub trait ComplianceSink: Send + Sync {
    /// Completion of a screening tied to a transfer
    fn submit_result(
        &self,
        transfer_id: TransferId,
        status: ComplianceStatus,
        request_id: RequestId,
    ) -> Result<(), SinkError>;

    /// Compliance status of an address
    fn update_status(
        &self,
        address: &Address,
        status: ComplianceStatus,
        screening_id: RequestId,
        risk_level: &str,
    ) -> Result<(), SinkError>;
}

/// One forwarded call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForwardCommand {
    /// `submitComplianceResult(transferRequestId, status, requestId)`
    SubmitResult {
        transfer_id: TransferId,
        status: ComplianceStatus,
        request_id: RequestId,
    },
    /// `updateComplianceStatus(address, status, screeningId, riskLevel)`
    UpdateStatus {
        address: Address,
        status: ComplianceStatus,
        screening_id: RequestId,
        risk_level: String,
    },
}

impl ForwardCommand {
    /// Deliver to `sink`
    pub fn deliver(&self, sink: &dyn ComplianceSink) -> Result<(), SinkError> {
        match self {
            ForwardCommand::SubmitResult {
                transfer_id,
                status,
                request_id,
            } => sink.submit_result(*transfer_id, *status, *request_id),
            ForwardCommand::UpdateStatus {
                address,
                status,
                screening_id,
                risk_level,
            } => sink.update_status(address, *status, *screening_id, risk_level),
        }
    }
}

/// Result of a single forward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardOutcome {
    /// Accepted by the sink
    Delivered,
    /// Refused; queued for redelivery
    Deferred { reason: String },
}

impl ForwardOutcome {
    /// True when the sink accepted the command
    pub fn is_delivered(&self) -> bool {
        matches!(self, ForwardOutcome::Delivered)
    }
}

/// Forwards commands and retains the undelivered ones
pub struct ResultForwarder {
    sink: Arc<dyn ComplianceSink>,
    undelivered: VecDeque<ForwardCommand>,
}

impl ResultForwarder {
    /// Forwarder over `sink`
    pub fn new(sink: Arc<dyn ComplianceSink>) -> Self {
        Self {
            sink,
            undelivered: VecDeque::new(),
        }
    }

    /// Deliver now, or queue on failure
    pub fn forward(&mut self, command: ForwardCommand) -> ForwardOutcome {
        match command.deliver(self.sink.as_ref()) {
            Ok(()) => ForwardOutcome::Delivered,
            Err(e) => {
                error!("Forward failed, queued for redelivery: {} ({:?})", e, command);
                self.undelivered.push_back(command);
                ForwardOutcome::Deferred {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Retry queued commands in order, stopping at the first failure.
    /// Returns how many were delivered.
    pub fn redeliver(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(command) = self.undelivered.front() {
            if let Err(e) = command.deliver(self.sink.as_ref()) {
                error!(
                    "Redelivery stopped after {} commands: {} ({} still queued)",
                    delivered,
                    e,
                    self.undelivered.len()
                );
                break;
            }
            self.undelivered.pop_front();
            delivered += 1;
        }

        if delivered > 0 {
            info!("Redelivered {} forward commands", delivered);
        }
        delivered
    }

    /// Snapshot of the queue
    pub fn undelivered(&self) -> Vec<ForwardCommand> {
        self.undelivered.iter().cloned().collect()
    }
}

impl std::fmt::Debug for ResultForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultForwarder")
            .field("undelivered", &self.undelivered.len())
            .finish()
    }
}

/// Sink that hands commands to the Transfer Ledger integration task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<ForwardCommand>,
}

impl ChannelSink {
    /// Sink plus the receiving end, with a bounded buffer
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ForwardCommand>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    fn push(&self, command: ForwardCommand) -> Result<(), SinkError> {
        self.sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                SinkError::Unavailable("transfer ledger queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                SinkError::Unavailable("transfer ledger channel closed".to_string())
            }
        })
    }
}

impl ComplianceSink for ChannelSink {
    fn submit_result(
        &self,
        transfer_id: TransferId,
        status: ComplianceStatus,
        request_id: RequestId,
    ) -> Result<(), SinkError> {
        self.push(ForwardCommand::SubmitResult {
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
    ) -> Result<(), SinkError> {
        self.push(ForwardCommand::UpdateStatus {
            address: *address,
            status,
            screening_id,
            risk_level: risk_level.to_string(),
        })
    }
}
