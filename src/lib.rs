//! Quorum Ledger: an M-of-N multi-party authorization ledger
//!
//! This crate provides:
//! - A fixed set of principals with an approval threshold
//! - Operations proposed, approved and revoked by principals
//! - Exactly-once execution once quorum is met, with rollback on failure
//! - Governance of the principal set through the ledger's own operations
//! - secp256k1-signed calls with per-principal replay protection
//! - Events for indexers over a WebSocket stream
//! - JSON persistence with rotating backups
//!
//! # Example
//!
//! ```rust
//! use quorum_ledger::host::Treasury;
//! use quorum_ledger::ledger::{Effect, Ledger, LedgerConfig, Principal};
//!
//! let principals = vec!["alice".into(), "bob".into(), "carol".into()];
//! let mut ledger = Ledger::new(LedgerConfig::new(2, principals, None).unwrap()).unwrap();
//! let mut treasury = Treasury::with_balance(100);
//!
//! let alice = Principal::from("alice");
//! let id = ledger.submit(&alice, "vendor", Effect::TransferValue { amount: 30 }).unwrap();
//! ledger.approve(id, &alice).unwrap();
//! ledger.approve(id, &Principal::from("bob")).unwrap();
//! ledger.execute(id, &Principal::from("carol"), &mut treasury).unwrap();
//!
//! assert_eq!(treasury.balance_of("vendor"), 30);
//! ```

pub mod api;
pub mod cli;
pub mod crypto;
pub mod host;
pub mod ledger;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use crypto::KeyPair;
pub use host::Treasury;
pub use ledger::{
    Effect, EffectExecutor, EventRecord, Ledger, LedgerConfig, LedgerError, LedgerEvent, Principal,
    SignedCall,
};
pub use storage::{Snapshot, Storage, StorageConfig};
