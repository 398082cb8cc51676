//! Signed call envelopes
//!
//! A signed call binds a principal's key to one ledger, one nonce and one
//! call. The ledger verifies the signature, derives the principal address
//! from the public key, and consumes the nonce when the call succeeds, so
//! a successful call can never be replayed and a call signed for one ledger
//! is useless against another.

use crate::crypto::{
    digest_json, public_key_from_hex, public_key_to_address, verify_signature, KeyPair,
};
use crate::ledger::error::LedgerError;
use crate::ledger::operation::{Effect, OperationId};
use crate::ledger::principal::Principal;
use serde::{Deserialize, Serialize};

/// A mutating call on the ledger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LedgerCall {
    Submit { target: String, effect: Effect },
    Approve { id: OperationId },
    Revoke { id: OperationId },
    Execute { id: OperationId },
    Cancel { id: OperationId },
}

/// Result of a dispatched call
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    Submitted { id: OperationId },
    Approved { id: OperationId, approvals: usize },
    Revoked { id: OperationId, approvals: usize },
    Executed { id: OperationId },
    Cancelled { id: OperationId },
}

#[derive(Serialize)]
struct CallMessage<'a> {
    ledger: &'a str,
    nonce: u64,
    call: &'a LedgerCall,
}

/// Digest a principal signs to authorize `call`
pub fn call_digest(
    ledger_address: &str,
    nonce: u64,
    call: &LedgerCall,
) -> Result<Vec<u8>, LedgerError> {
    let message = CallMessage {
        ledger: ledger_address,
        nonce,
        call,
    };
    Ok(digest_json(&message)?)
}

/// A call plus the signature authorizing it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SignedCall {
    pub call: LedgerCall,
    pub nonce: u64,
    /// Compressed secp256k1 public key (hex)
    pub public_key: String,
    /// Compact ECDSA signature over [`call_digest`] (hex)
    pub signature: String,
}

impl SignedCall {
    /// Sign `call` for the given ledger and nonce
    pub fn sign(
        key_pair: &KeyPair,
        ledger_address: &str,
        nonce: u64,
        call: LedgerCall,
    ) -> Result<Self, LedgerError> {
        let digest = call_digest(ledger_address, nonce, &call)?;
        let signature = key_pair.sign(&digest)?;

        Ok(Self {
            call,
            nonce,
            public_key: key_pair.public_key_hex(),
            signature: hex::encode(signature),
        })
    }

    /// Principal address of the signing key
    pub fn signer(&self) -> Result<Principal, LedgerError> {
        let public_key = public_key_from_hex(&self.public_key)?;
        Ok(Principal::new(public_key_to_address(&public_key)))
    }

    /// Check the signature for `ledger_address`, returning the signer
    ///
    /// Nonce freshness is the ledger's concern, not checked here.
    pub fn verify(&self, ledger_address: &str) -> Result<Principal, LedgerError> {
        let public_key = public_key_from_hex(&self.public_key)?;
        let signature = hex::decode(&self.signature)
            .map_err(|_| LedgerError::InvalidSignature(self.public_key.clone()))?;
        let digest = call_digest(ledger_address, self.nonce, &self.call)?;

        if !verify_signature(&public_key, &digest, &signature)? {
            return Err(LedgerError::InvalidSignature(self.public_key.clone()));
        }

        Ok(Principal::new(public_key_to_address(&public_key)))
    }
}
