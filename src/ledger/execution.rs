//! Exactly-once execution of approved operations
//!
//! The operation is marked executed before the host sees the effect, and
//! the mark is rolled back if the effect fails. While the engine runs it
//! holds exclusive borrows of the ledger's tables, so a host cannot call
//! back into the ledger mid-effect.

use crate::ledger::approvals::ApprovalTracker;
use crate::ledger::error::LedgerError;
use crate::ledger::operation::{Effect, OperationId, OperationLog, OperationState};
use crate::ledger::principal::{MembershipChange, Principal, PrincipalSet};
use chrono::Utc;
use thiserror::Error;

/// Failure reported by the host while performing an effect
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("Recipient {target} rejected the effect: {reason}")]
    Rejected { target: String, reason: String },
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Unknown action {action} on {target}")]
    UnknownAction { target: String, action: String },
    #[error("Unsupported effect: {0}")]
    Unsupported(String),
}

/// Capability supplied by the host to perform effects
///
/// This is the only place side effects leave the ledger.
pub trait EffectExecutor {
    fn perform_effect(&mut self, target: &str, effect: &Effect) -> Result<(), EffectError>;
}

/// What a successful execution changed besides the operation itself
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub id: OperationId,
    /// Set when the operation changed the principal set
    pub membership: Option<MembershipUpdate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipUpdate {
    pub epoch: u64,
    pub principals: usize,
    pub threshold: usize,
    /// Pending operations whose approvals were cleared, with the count cleared
    pub invalidated: Vec<(OperationId, usize)>,
}

/// Executes operations against borrowed ledger tables
pub struct ExecutionEngine<'a> {
    principals: &'a mut PrincipalSet,
    log: &'a mut OperationLog,
    approvals: &'a mut ApprovalTracker,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(
        principals: &'a mut PrincipalSet,
        log: &'a mut OperationLog,
        approvals: &'a mut ApprovalTracker,
    ) -> Self {
        Self {
            principals,
            log,
            approvals,
        }
    }

    /// Finalize operation `id` if quorum holds right now
    ///
    /// Any principal may trigger execution. Quorum is evaluated against
    /// the approvals present at call time.
    pub fn execute(
        &mut self,
        id: OperationId,
        caller: &Principal,
        host: &mut dyn EffectExecutor,
    ) -> Result<ExecutionReport, LedgerError> {
        if !self.principals.is_principal(caller) {
            return Err(LedgerError::NotAuthorized(caller.clone()));
        }

        let op = self.log.get(id)?;
        op.ensure_pending()?;

        let have = self.approvals.count(id);
        let need = self.principals.threshold();
        if have < need {
            return Err(LedgerError::QuorumNotMet { id, have, need });
        }

        let target = op.target.clone();
        let effect = op.effect.clone();

        // Mark before the effect runs
        let op = self.log.get_mut(id)?;
        let prior = (op.state, op.updated_at, op.executed_at);
        let now = Utc::now();
        op.state = OperationState::Executed;
        op.updated_at = now;
        op.executed_at = Some(now);

        let outcome = match &effect {
            Effect::ChangeMembership(change) => self.apply_membership(id, change).map(Some),
            _ => host
                .perform_effect(&target, &effect)
                .map(|()| None)
                .map_err(|source| LedgerError::EffectFailed { id, source }),
        };

        match outcome {
            Ok(membership) => Ok(ExecutionReport { id, membership }),
            Err(e) => {
                let op = self.log.get_mut(id)?;
                (op.state, op.updated_at, op.executed_at) = prior;
                Err(e)
            }
        }
    }

    fn apply_membership(
        &mut self,
        id: OperationId,
        change: &MembershipChange,
    ) -> Result<MembershipUpdate, LedgerError> {
        self.principals.apply(change)?;
        let invalidated = self.approvals.invalidate_pending(&*self.log, id);

        Ok(MembershipUpdate {
            epoch: self.principals.epoch(),
            principals: self.principals.len(),
            threshold: self.principals.threshold(),
            invalidated,
        })
    }
}
