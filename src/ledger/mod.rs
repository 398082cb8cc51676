//! Multi-party authorization ledger
//!
//! Operations are proposed by principals, approved by distinct principals,
//! and executed exactly once when the number of current approvals reaches
//! the threshold.
//!
//! # Example
//!
//! ```ignore
//! let config = LedgerConfig::new(2, vec!["alice".into(), "bob".into(), "carol".into()], None)?;
//! let mut ledger = Ledger::new(config)?;
//!
//! let id = ledger.submit(&"alice".into(), "vendor", Effect::TransferValue { amount: 50 })?;
//! ledger.approve(id, &"alice".into())?;
//! ledger.approve(id, &"bob".into())?;
//! ledger.execute(id, &"carol".into(), &mut treasury)?;
//! ```

pub mod approvals;
pub mod auth;
pub mod error;
pub mod events;
pub mod execution;
pub mod manager;
pub mod operation;
pub mod principal;

pub use approvals::ApprovalTracker;
pub use auth::{call_digest, CallOutcome, LedgerCall, SignedCall};
pub use error::LedgerError;
pub use events::{EventRecord, LedgerEvent};
pub use execution::{
    EffectError, EffectExecutor, ExecutionEngine, ExecutionReport, MembershipUpdate,
};
pub use manager::{Ledger, OperationStatus};
pub use operation::{self_target, Effect, Operation, OperationId, OperationLog, OperationState};
pub use principal::{LedgerConfig, MembershipChange, Principal, PrincipalSet};
