//! Notifications pushed to observers (indexers, WebSocket clients)
//!
//! Every event the ledger emits is stamped with a sequence number that is
//! unique for the ledger's lifetime. Delivery is at-least-once; consumers
//! de-duplicate on [`EventRecord::dedup_key`].

use crate::ledger::operation::OperationId;
use crate::ledger::principal::Principal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum LedgerEvent {
    Proposed {
        id: OperationId,
        submitter: Principal,
        target: String,
        payload_hash: String,
    },
    Approved {
        id: OperationId,
        principal: Principal,
    },
    Revoked {
        id: OperationId,
        principal: Principal,
    },
    /// `success == false` reports a failed attempt; the operation is still pending
    Executed {
        id: OperationId,
        success: bool,
    },
    Cancelled {
        id: OperationId,
        principal: Principal,
    },
    /// Approvals dropped because the principal set changed
    ApprovalsInvalidated {
        id: OperationId,
        count: usize,
    },
    MembershipChanged {
        epoch: u64,
        principals: usize,
        threshold: usize,
    },
}

impl LedgerEvent {
    /// Operation the event concerns, if any
    pub fn operation_id(&self) -> Option<OperationId> {
        match self {
            LedgerEvent::Proposed { id, .. }
            | LedgerEvent::Approved { id, .. }
            | LedgerEvent::Revoked { id, .. }
            | LedgerEvent::Executed { id, .. }
            | LedgerEvent::Cancelled { id, .. }
            | LedgerEvent::ApprovalsInvalidated { id, .. } => Some(*id),
            LedgerEvent::MembershipChanged { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::Proposed { .. } => "proposed",
            LedgerEvent::Approved { .. } => "approved",
            LedgerEvent::Revoked { .. } => "revoked",
            LedgerEvent::Executed { .. } => "executed",
            LedgerEvent::Cancelled { .. } => "cancelled",
            LedgerEvent::ApprovalsInvalidated { .. } => "approvals_invalidated",
            LedgerEvent::MembershipChanged { .. } => "membership_changed",
        }
    }
}

/// An event with its position in the ledger's event stream
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub seq: u64,
    pub event: LedgerEvent,
}

impl EventRecord {
    /// Key observers use to drop redelivered events
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.seq, self.event.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = LedgerEvent::Executed { id: 4, success: true };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Executed\""));
        assert!(json.contains("\"success\":true"));
    }

    #[test]
    fn test_dedup_key_from_sequence() {
        let approved = LedgerEvent::Approved {
            id: 1,
            principal: "A".into(),
        };
        assert_eq!(approved.operation_id(), Some(1));

        let first = EventRecord {
            seq: 3,
            event: approved.clone(),
        };
        let again = EventRecord {
            seq: 5,
            event: approved,
        };
        assert_eq!(first.dedup_key(), "3:approved");
        assert_ne!(first.dedup_key(), again.dedup_key());

        let changed = LedgerEvent::MembershipChanged {
            epoch: 2,
            principals: 4,
            threshold: 3,
        };
        assert_eq!(changed.operation_id(), None);
    }

    #[test]
    fn test_record_serialization() {
        let record = EventRecord {
            seq: 9,
            event: LedgerEvent::Executed { id: 4, success: false },
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"seq\":9"));
        assert!(json.contains("\"type\":\"Executed\""));

        let back: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
