//! Per-operation approval bookkeeping
//!
//! Approving twice is an error rather than a no-op, and approvals only
//! change while the operation is pending. Once an operation reaches a
//! terminal state its approval set is frozen.

use crate::ledger::error::LedgerError;
use crate::ledger::operation::{OperationId, OperationLog};
use crate::ledger::principal::{Principal, PrincipalSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Approvals by operation id
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ApprovalTracker {
    approvals: BTreeMap<OperationId, BTreeSet<Principal>>,
}

impl ApprovalTracker {
    pub fn new() -> Self {
        Self {
            approvals: BTreeMap::new(),
        }
    }

    /// Record `principal`'s approval of a pending operation
    pub fn approve(
        &mut self,
        principals: &PrincipalSet,
        log: &OperationLog,
        id: OperationId,
        principal: &Principal,
    ) -> Result<usize, LedgerError> {
        if !principals.is_principal(principal) {
            return Err(LedgerError::NotAuthorized(principal.clone()));
        }
        log.get(id)?.ensure_pending()?;

        if self.has_approved(id, principal) {
            return Err(LedgerError::AlreadyApproved {
                id,
                principal: principal.clone(),
            });
        }

        let set = self.approvals.entry(id).or_default();
        set.insert(principal.clone());
        Ok(set.len())
    }

    /// Withdraw a previously given approval
    pub fn revoke(
        &mut self,
        principals: &PrincipalSet,
        log: &OperationLog,
        id: OperationId,
        principal: &Principal,
    ) -> Result<usize, LedgerError> {
        if !principals.is_principal(principal) {
            return Err(LedgerError::NotAuthorized(principal.clone()));
        }
        log.get(id)?.ensure_pending()?;

        let removed = self
            .approvals
            .get_mut(&id)
            .map(|set| set.remove(principal))
            .unwrap_or(false);
        if !removed {
            return Err(LedgerError::NotApproved {
                id,
                principal: principal.clone(),
            });
        }

        let remaining = self.count(id);
        if remaining == 0 {
            self.approvals.remove(&id);
        }
        Ok(remaining)
    }

    pub fn has_approved(&self, id: OperationId, principal: &Principal) -> bool {
        self.approvals
            .get(&id)
            .map(|set| set.contains(principal))
            .unwrap_or(false)
    }

    pub fn count(&self, id: OperationId) -> usize {
        self.approvals.get(&id).map(BTreeSet::len).unwrap_or(0)
    }

    /// Approving principals in sorted order
    pub fn approvals(&self, id: OperationId) -> Vec<Principal> {
        self.approvals
            .get(&id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear approvals on every pending operation except `keep`
    ///
    /// Returns the ids that lost approvals and how many each lost.
    pub fn invalidate_pending(
        &mut self,
        log: &OperationLog,
        keep: OperationId,
    ) -> Vec<(OperationId, usize)> {
        let stale: Vec<OperationId> = self
            .approvals
            .keys()
            .copied()
            .filter(|id| *id != keep)
            .filter(|id| log.get(*id).map(|op| op.is_pending()).unwrap_or(false))
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.approvals.remove(&id).map(|set| (id, set.len())))
            .collect()
    }
}
