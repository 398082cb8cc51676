//! Effect hosts
//!
//! A host is whatever performs the effects of executed operations. The
//! treasury here keeps value and registered actions in memory and is
//! persisted next to the ledger.

pub mod treasury;

pub use treasury::{Invocation, Treasury, TreasuryError, TransferRecord};
