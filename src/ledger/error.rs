//! Ledger error taxonomy

use crate::crypto::KeyError;
use crate::ledger::execution::EffectError;
use crate::ledger::operation::{OperationId, OperationState};
use crate::ledger::principal::Principal;
use thiserror::Error;

/// Errors returned by ledger calls
///
/// Every variant means the call was rejected before any state changed.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not authorized: {0} is not a principal for this call")]
    NotAuthorized(Principal),
    #[error("Operation not found: {0}")]
    NotFound(OperationId),
    #[error("Operation {id} is {state}, not pending")]
    NotPending { id: OperationId, state: OperationState },
    #[error("Operation {id} already approved by {principal}")]
    AlreadyApproved { id: OperationId, principal: Principal },
    #[error("Operation {id} was not approved by {principal}")]
    NotApproved { id: OperationId, principal: Principal },
    #[error("Quorum not met for operation {id}: have {have}, need {need}")]
    QuorumNotMet {
        id: OperationId,
        have: usize,
        need: usize,
    },
    #[error("Effect of operation {id} failed: {source}")]
    EffectFailed {
        id: OperationId,
        #[source]
        source: EffectError,
    },
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Invalid signature on call from {0}")]
    InvalidSignature(String),
    #[error("Stale nonce: expected {expected}, got {got}")]
    StaleNonce { expected: u64, got: u64 },
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Encoding error: {0}")]
    EncodingError(#[from] serde_json::Error),
}
