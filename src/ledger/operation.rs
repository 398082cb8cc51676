//! Proposed operations and the append-only operation log

use crate::crypto::digest_json;
use crate::ledger::error::LedgerError;
use crate::ledger::principal::{MembershipChange, Principal, PrincipalSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation identifier, allocated sequentially from 0
pub type OperationId = u64;

/// Lifecycle state of an operation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Collecting approvals
    Pending,
    /// Effect performed; terminal
    Executed,
    /// Withdrawn by its submitter; terminal
    Cancelled,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Pending => "pending",
            OperationState::Executed => "executed",
            OperationState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What an operation does once executed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Move value from the treasury to the target
    TransferValue { amount: u64 },
    /// Run an action the target has registered with the host
    InvokeNamedAction {
        action: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Change the ledger's own principals or threshold
    ChangeMembership(MembershipChange),
}

impl Effect {
    /// Hex SHA-256 of the canonical encoding, announced to observers
    pub fn payload_hash(&self) -> Result<String, LedgerError> {
        let digest = digest_json(self)?;
        Ok(hex::encode(digest))
    }

    /// Membership changes are applied by the ledger, never by the host
    pub fn is_membership_change(&self) -> bool {
        matches!(self, Effect::ChangeMembership(_))
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::TransferValue { amount } => write!(f, "transfer {}", amount),
            Effect::InvokeNamedAction { action, args } if args.is_empty() => {
                write!(f, "invoke {}", action)
            }
            Effect::InvokeNamedAction { action, args } => {
                write!(f, "invoke {}({})", action, args.join(", "))
            }
            Effect::ChangeMembership(change) => write!(f, "membership: {}", change),
        }
    }
}

/// A proposed action awaiting approvals
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub submitter: Principal,
    /// Recipient of the effect
    pub target: String,
    pub effect: Effect,
    pub state: OperationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn is_pending(&self) -> bool {
        self.state == OperationState::Pending
    }

    /// Fail with `NotPending` unless the operation is still pending
    pub fn ensure_pending(&self) -> Result<(), LedgerError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(LedgerError::NotPending {
                id: self.id,
                state: self.state,
            })
        }
    }

    /// Short id used in logs, e.g. "#3 (transfer 50 -> bob)"
    pub fn summary(&self) -> String {
        format!("#{} ({} -> {})", self.id, self.effect, self.target)
    }
}

/// Append-only store of operations; owns id allocation
///
/// Operations are never removed, so the id of an operation is its index.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationLog {
    operations: Vec<Operation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Append a pending operation proposed by `submitter`
    pub fn submit(
        &mut self,
        principals: &PrincipalSet,
        submitter: &Principal,
        target: &str,
        effect: Effect,
    ) -> Result<&Operation, LedgerError> {
        if !principals.is_principal(submitter) {
            return Err(LedgerError::NotAuthorized(submitter.clone()));
        }

        let now = Utc::now();
        let id = self.operations.len() as OperationId;
        self.operations.push(Operation {
            id,
            submitter: submitter.clone(),
            target: target.to_string(),
            effect,
            state: OperationState::Pending,
            created_at: now,
            updated_at: now,
            executed_at: None,
        });

        Ok(&self.operations[id as usize])
    }

    pub fn get(&self, id: OperationId) -> Result<&Operation, LedgerError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.operations.get(index))
            .ok_or(LedgerError::NotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: OperationId) -> Result<&mut Operation, LedgerError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.operations.get_mut(index))
            .ok_or(LedgerError::NotFound(id))
    }

    /// Id the next submission will receive
    pub fn next_id(&self) -> OperationId {
        self.operations.len() as OperationId
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_pending())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }
}

/// Identifier for a target that is the ledger itself
pub fn self_target(ledger_address: &str) -> String {
    format!("ledger:{}", ledger_address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principals() -> PrincipalSet {
        PrincipalSet::new(2, vec!["A".into(), "B".into(), "C".into()]).unwrap()
    }

    #[test]
    fn test_ids_are_sequential() {
        let set = principals();
        let mut log = OperationLog::new();

        for expected in 0..3 {
            let op = log
                .submit(&set, &"A".into(), "X", Effect::TransferValue { amount: 1 })
                .unwrap();
            assert_eq!(op.id, expected);
            assert_eq!(op.state, OperationState::Pending);
        }
        assert_eq!(log.next_id(), 3);
        assert_eq!(log.pending_count(), 3);
    }

    #[test]
    fn test_submit_requires_principal() {
        let set = principals();
        let mut log = OperationLog::new();

        let result = log.submit(&set, &"Z".into(), "X", Effect::TransferValue { amount: 1 });
        assert!(matches!(result, Err(LedgerError::NotAuthorized(_))));
        assert!(log.is_empty());
        assert_eq!(log.next_id(), 0);
    }

    #[test]
    fn test_get_unknown_id() {
        let log = OperationLog::new();
        assert!(matches!(log.get(0), Err(LedgerError::NotFound(0))));
        assert!(matches!(log.get(u64::MAX), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_payload_hash_distinguishes_effects() {
        let transfer = Effect::TransferValue { amount: 10 };
        let invoke = Effect::InvokeNamedAction {
            action: "pause".to_string(),
            args: vec![],
        };

        let hash = transfer.payload_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, Effect::TransferValue { amount: 10 }.payload_hash().unwrap());
        assert_ne!(hash, invoke.payload_hash().unwrap());
    }

    #[test]
    fn test_effect_encoding() {
        let effect = Effect::ChangeMembership(MembershipChange::SetThreshold { threshold: 3 });
        let json = serde_json::to_string(&effect).unwrap();
        assert!(json.contains("change_membership"));
        assert!(json.contains("set_threshold"));

        let decoded: Effect = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, effect);
        assert!(decoded.is_membership_change());
    }
}
