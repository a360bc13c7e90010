//! Observable bridge events
//!
//! The off-chain pipeline discovers work by subscribing here. Delivery is
//! best-effort broadcast: a subscriber that falls behind loses the oldest
//! events and is told how many it missed.

use crate::types::{Address, ComplianceStatus, RequestId, TransferId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Event emitted on every state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A new request awaits screening
    ScreeningRequested {
        request_id: RequestId,
        subject_address: Address,
        transfer_request_id: TransferId,
    },
    /// A result was accepted
    ScreeningCompleted {
        request_id: RequestId,
        subject_address: Address,
        status: ComplianceStatus,
    },
    /// A stale request was expired
    ScreeningExpired {
        request_id: RequestId,
        subject_address: Address,
    },
    /// Operator added
    OracleAuthorized { operator: Address },
    /// Operator removed
    OracleRevoked { operator: Address },
    /// Requester added
    RequesterAuthorized { requester: Address },
    /// Requester removed
    RequesterRevoked { requester: Address },
    /// Owner changed
    OwnershipTransferred { previous: Address, new_owner: Address },
    /// Manual or batch compliance update pushed
    ComplianceUpdated {
        address: Address,
        status: ComplianceStatus,
        screening_id: RequestId,
    },
    /// The compliance sink refused a forward; it is queued for redelivery
    ForwardDeferred { reason: String },
}

impl BridgeEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::ScreeningRequested { .. } => "screening_requested",
            BridgeEvent::ScreeningCompleted { .. } => "screening_completed",
            BridgeEvent::ScreeningExpired { .. } => "screening_expired",
            BridgeEvent::OracleAuthorized { .. } => "oracle_authorized",
            BridgeEvent::OracleRevoked { .. } => "oracle_revoked",
            BridgeEvent::RequesterAuthorized { .. } => "requester_authorized",
            BridgeEvent::RequesterRevoked { .. } => "requester_revoked",
            BridgeEvent::OwnershipTransferred { .. } => "ownership_transferred",
            BridgeEvent::ComplianceUpdated { .. } => "compliance_updated",
            BridgeEvent::ForwardDeferred { .. } => "forward_deferred",
        }
    }
}

/// Broadcast fan-out of bridge events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Bus retaining up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish; having no subscribers is not an error
    pub fn emit(&self, event: BridgeEvent) {
        trace!(event = event.name(), "bridge event");
        let _ = self.sender.send(event);
    }

    /// New subscriber, seeing events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit(BridgeEvent::OracleAuthorized {
            operator: Address::from_bytes([1u8; 32]),
        });
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let a = Address::from_bytes([1u8; 32]);

        bus.emit(BridgeEvent::OracleAuthorized { operator: a });
        bus.emit(BridgeEvent::OracleRevoked { operator: a });

        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::OracleAuthorized { operator: a });
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::OracleRevoked { operator: a });
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = BridgeEvent::OracleRevoked {
            operator: Address::from_bytes([2u8; 32]),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "oracle_revoked");
    }
}
