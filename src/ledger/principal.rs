//! Principals and the approval threshold
//!
//! A [`PrincipalSet`] is the authoritative membership list of a ledger
//! together with the number of distinct approvals an operation needs.
//! `1 <= threshold <= len` holds after every call; mutations that would
//! break it are rejected without touching the set.

use crate::ledger::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// An authorized identity, usually a principal address
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A change to the membership or the threshold
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipChange {
    AddPrincipal { principal: Principal },
    RemovePrincipal { principal: Principal },
    SetThreshold { threshold: usize },
}

impl fmt::Display for MembershipChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipChange::AddPrincipal { principal } => write!(f, "add {}", principal),
            MembershipChange::RemovePrincipal { principal } => write!(f, "remove {}", principal),
            MembershipChange::SetThreshold { threshold } => write!(f, "threshold {}", threshold),
        }
    }
}

/// Initial configuration of a ledger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Approvals required to execute (M in M-of-N)
    pub threshold: usize,
    /// Authorized principals (N)
    pub principals: Vec<Principal>,
    /// Optional human-readable label
    pub label: Option<String>,
}

impl LedgerConfig {
    /// Create a validated configuration
    ///
    /// # Errors
    /// `InvariantViolation` if the threshold is zero or exceeds the number
    /// of principals, if no principals are given, or if one is listed twice.
    pub fn new(
        threshold: usize,
        principals: Vec<Principal>,
        label: Option<String>,
    ) -> Result<Self, LedgerError> {
        if principals.is_empty() {
            return Err(LedgerError::InvariantViolation(
                "at least one principal is required".to_string(),
            ));
        }

        check_threshold(threshold, principals.len())?;

        let mut seen = HashSet::with_capacity(principals.len());
        for principal in &principals {
            if !seen.insert(principal) {
                return Err(LedgerError::InvariantViolation(format!(
                    "duplicate principal {}",
                    principal
                )));
            }
        }

        Ok(Self {
            threshold,
            principals,
            label,
        })
    }
}

fn check_threshold(threshold: usize, count: usize) -> Result<(), LedgerError> {
    if threshold == 0 {
        return Err(LedgerError::InvariantViolation(
            "threshold must be at least 1".to_string(),
        ));
    }
    if threshold > count {
        return Err(LedgerError::InvariantViolation(format!(
            "threshold {} exceeds principal count {}",
            threshold, count
        )));
    }
    Ok(())
}

/// Authoritative membership plus quorum threshold
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PrincipalSet {
    members: HashSet<Principal>,
    threshold: usize,
    /// Bumped on every successful membership change
    epoch: u64,
}

impl PrincipalSet {
    /// Build the set from a validated configuration
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            members: config.principals.iter().cloned().collect(),
            threshold: config.threshold,
            epoch: 0,
        }
    }

    /// Build and validate in one step
    pub fn new(threshold: usize, principals: Vec<Principal>) -> Result<Self, LedgerError> {
        let config = LedgerConfig::new(threshold, principals, None)?;
        Ok(Self::from_config(&config))
    }

    pub fn is_principal(&self, principal: &Principal) -> bool {
        self.members.contains(principal)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// All principals, sorted
    pub fn principals(&self) -> Vec<Principal> {
        let mut principals: Vec<Principal> = self.members.iter().cloned().collect();
        principals.sort();
        principals
    }

    /// Description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.members.len())
    }

    pub fn add_principal(&mut self, principal: Principal) -> Result<(), LedgerError> {
        self.apply(&MembershipChange::AddPrincipal { principal })
    }

    pub fn remove_principal(&mut self, principal: &Principal) -> Result<(), LedgerError> {
        self.apply(&MembershipChange::RemovePrincipal {
            principal: principal.clone(),
        })
    }

    pub fn set_threshold(&mut self, threshold: usize) -> Result<(), LedgerError> {
        self.apply(&MembershipChange::SetThreshold { threshold })
    }

    /// Check a change against the current set without applying it
    pub fn validate(&self, change: &MembershipChange) -> Result<(), LedgerError> {
        match change {
            MembershipChange::AddPrincipal { principal } => {
                if self.members.contains(principal) {
                    return Err(LedgerError::InvariantViolation(format!(
                        "{} is already a principal",
                        principal
                    )));
                }
                Ok(())
            }
            MembershipChange::RemovePrincipal { principal } => {
                if !self.members.contains(principal) {
                    return Err(LedgerError::InvariantViolation(format!(
                        "{} is not a principal",
                        principal
                    )));
                }
                check_threshold(self.threshold, self.members.len() - 1)
            }
            MembershipChange::SetThreshold { threshold } => {
                check_threshold(*threshold, self.members.len())
            }
        }
    }

    /// Apply a change atomically: validated first, then committed
    pub fn apply(&mut self, change: &MembershipChange) -> Result<(), LedgerError> {
        self.validate(change)?;

        match change {
            MembershipChange::AddPrincipal { principal } => {
                self.members.insert(principal.clone());
            }
            MembershipChange::RemovePrincipal { principal } => {
                self.members.remove(principal);
            }
            MembershipChange::SetThreshold { threshold } => {
                self.threshold = *threshold;
            }
        }
        self.epoch += 1;

        Ok(())
    }
}
