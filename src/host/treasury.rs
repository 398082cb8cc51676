//! In-memory treasury that performs ledger effects
//!
//! Holds the value a ledger can move and the actions targets have
//! registered. Every effect is checked in full before anything changes,
//! so a failed effect leaves the treasury untouched.

use crate::ledger::{Effect, EffectError, EffectExecutor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Number of transfer and invocation records kept
const HISTORY_LIMIT: usize = 100;

/// Treasury-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreasuryError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Invalid amount: amount must be greater than 0")]
    InvalidAmount,
    #[error("Balance overflow")]
    Overflow,
    #[error("Recipient {0} refuses transfers")]
    RecipientRefused(String),
}

impl From<TreasuryError> for EffectError {
    fn from(e: TreasuryError) -> Self {
        match e {
            TreasuryError::InsufficientFunds { have, need } => {
                EffectError::InsufficientFunds { have, need }
            }
            TreasuryError::RecipientRefused(target) => EffectError::Rejected {
                target,
                reason: "recipient refuses transfers".to_string(),
            },
            other => EffectError::Unsupported(other.to_string()),
        }
    }
}

/// A completed transfer out of the treasury
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferRecord {
    pub to: String,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
}

/// A completed named-action invocation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Invocation {
    pub target: String,
    pub action: String,
    pub args: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Treasury {
    /// Value available to transfer
    balance: u64,
    /// Value credited to each target
    accounts: BTreeMap<String, u64>,
    /// Targets that refuse incoming transfers
    rejecting: BTreeSet<String>,
    /// Actions each target accepts
    actions: BTreeMap<String, BTreeSet<String>>,
    pub transfers: Vec<TransferRecord>,
    pub invocations: Vec<Invocation>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treasury funded with `balance`
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Value credited to `target`
    pub fn balance_of(&self, target: &str) -> u64 {
        self.accounts.get(target).copied().unwrap_or(0)
    }

    pub fn accounts(&self) -> &BTreeMap<String, u64> {
        &self.accounts
    }

    /// Add funds; returns the new balance
    pub fn deposit(&mut self, amount: u64) -> Result<u64, TreasuryError> {
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount);
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(TreasuryError::Overflow)?;

        log::info!("Treasury deposit of {} (balance {})", amount, self.balance);
        Ok(self.balance)
    }

    /// Make `target` refuse transfers
    pub fn reject_recipient(&mut self, target: &str) {
        self.rejecting.insert(target.to_string());
    }

    pub fn accept_recipient(&mut self, target: &str) {
        self.rejecting.remove(target);
    }

    /// Allow `action` to be invoked on `target`
    pub fn register_action(&mut self, target: &str, action: &str) {
        self.actions
            .entry(target.to_string())
            .or_default()
            .insert(action.to_string());
    }

    pub fn has_action(&self, target: &str, action: &str) -> bool {
        self.actions
            .get(target)
            .map(|actions| actions.contains(action))
            .unwrap_or(false)
    }

    /// Move `amount` from the treasury to `to`
    pub fn transfer(&mut self, to: &str, amount: u64) -> Result<TransferRecord, TreasuryError> {
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount);
        }
        if self.rejecting.contains(to) {
            return Err(TreasuryError::RecipientRefused(to.to_string()));
        }
        if self.balance < amount {
            return Err(TreasuryError::InsufficientFunds {
                have: self.balance,
                need: amount,
            });
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TreasuryError::Overflow)?;

        self.balance -= amount;
        self.accounts.insert(to.to_string(), credited);

        let record = TransferRecord {
            to: to.to_string(),
            amount,
            timestamp: Utc::now(),
        };
        self.transfers.push(record.clone());
        if self.transfers.len() > HISTORY_LIMIT {
            self.transfers.remove(0);
        }

        Ok(record)
    }

    fn invoke(&mut self, target: &str, action: &str, args: &[String]) -> Result<(), EffectError> {
        if !self.has_action(target, action) {
            return Err(EffectError::UnknownAction {
                target: target.to_string(),
                action: action.to_string(),
            });
        }

        self.invocations.push(Invocation {
            target: target.to_string(),
            action: action.to_string(),
            args: args.to_vec(),
            timestamp: Utc::now(),
        });
        if self.invocations.len() > HISTORY_LIMIT {
            self.invocations.remove(0);
        }
        Ok(())
    }
}

impl EffectExecutor for Treasury {
    fn perform_effect(&mut self, target: &str, effect: &Effect) -> Result<(), EffectError> {
        match effect {
            Effect::TransferValue { amount } => {
                self.transfer(target, *amount)?;
                log::info!("Transferred {} to {}", amount, target);
                Ok(())
            }
            Effect::InvokeNamedAction { action, args } => {
                self.invoke(target, action, args)?;
                log::info!("Invoked {} on {}", action, target);
                Ok(())
            }
            Effect::ChangeMembership(_) => Err(EffectError::Unsupported(
                "membership changes are applied by the ledger".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MembershipChange;

    #[test]
    fn test_deposit_and_transfer() {
        let mut treasury = Treasury::new();
        assert_eq!(treasury.deposit(500).unwrap(), 500);

        treasury
            .perform_effect("vendor", &Effect::TransferValue { amount: 200 })
            .unwrap();
        assert_eq!(treasury.balance(), 300);
        assert_eq!(treasury.balance_of("vendor"), 200);
        assert_eq!(treasury.transfers.len(), 1);
    }

    #[test]
    fn test_deposit_zero() {
        let mut treasury = Treasury::new();
        assert_eq!(treasury.deposit(0), Err(TreasuryError::InvalidAmount));
        assert_eq!(
            Treasury::with_balance(u64::MAX).deposit(1),
            Err(TreasuryError::Overflow)
        );
    }

    #[test]
    fn test_insufficient_funds_leaves_treasury_unchanged() {
        let mut treasury = Treasury::with_balance(50);
        let before = treasury.clone();

        let result = treasury.perform_effect("vendor", &Effect::TransferValue { amount: 51 });
        assert_eq!(
            result,
            Err(EffectError::InsufficientFunds { have: 50, need: 51 })
        );
        assert_eq!(treasury, before);
    }

    #[test]
    fn test_rejecting_recipient() {
        let mut treasury = Treasury::with_balance(50);
        treasury.reject_recipient("closed");

        let result = treasury.perform_effect("closed", &Effect::TransferValue { amount: 5 });
        assert!(matches!(result, Err(EffectError::Rejected { .. })));
        assert_eq!(treasury.balance(), 50);

        treasury.accept_recipient("closed");
        treasury
            .perform_effect("closed", &Effect::TransferValue { amount: 5 })
            .unwrap();
        assert_eq!(treasury.balance_of("closed"), 5);
    }

    #[test]
    fn test_named_actions() {
        let mut treasury = Treasury::new();
        let pause = Effect::InvokeNamedAction {
            action: "pause".to_string(),
            args: vec!["now".to_string()],
        };

        assert!(matches!(
            treasury.perform_effect("bridge", &pause),
            Err(EffectError::UnknownAction { .. })
        ));

        treasury.register_action("bridge", "pause");
        treasury.perform_effect("bridge", &pause).unwrap();
        assert_eq!(treasury.invocations.len(), 1);
        assert_eq!(treasury.invocations[0].args, vec!["now".to_string()]);
    }

    #[test]
    fn test_membership_effect_unsupported() {
        let mut treasury = Treasury::new();
        let effect = Effect::ChangeMembership(MembershipChange::SetThreshold { threshold: 1 });
        assert!(matches!(
            treasury.perform_effect("self", &effect),
            Err(EffectError::Unsupported(_))
        ));
    }
}
