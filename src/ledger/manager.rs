//! The ledger: principals, operations and approvals in one store
//!
//! Every call is applied in full or not at all. A rejected call leaves the
//! serialized ledger unchanged; only successful calls change state and push
//! events to the outbox. The one exception is a failed effect: the operation
//! stays as it was, but the failure is reported as an event and takes the
//! next event sequence number.

use crate::crypto::{base58check, hash160};
use crate::ledger::approvals::ApprovalTracker;
use crate::ledger::auth::{CallOutcome, LedgerCall, SignedCall};
use crate::ledger::error::LedgerError;
use crate::ledger::events::{EventRecord, LedgerEvent};
use crate::ledger::execution::{EffectExecutor, ExecutionEngine};
use crate::ledger::operation::{Effect, Operation, OperationId, OperationLog, OperationState};
use crate::ledger::principal::{LedgerConfig, Principal, PrincipalSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version byte for ledger addresses (P2SH-style, addresses start with '3')
const LEDGER_VERSION: u8 = 0x05;

/// An operation together with its approval state
#[derive(Clone, Debug, Serialize)]
pub struct OperationStatus {
    #[serde(flatten)]
    pub operation: Operation,
    pub approvals: Vec<Principal>,
    pub threshold: usize,
    pub quorum_met: bool,
}

/// Multi-party authorization ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ledger {
    address: String,
    label: Option<String>,
    created_at: DateTime<Utc>,
    principals: PrincipalSet,
    log: OperationLog,
    approvals: ApprovalTracker,
    /// Next expected signed-call nonce per principal
    nonces: BTreeMap<Principal, u64>,
    /// Sequence number of the next emitted event
    #[serde(default)]
    event_seq: u64,
    #[serde(skip)]
    outbox: Vec<EventRecord>,
}

impl Ledger {
    /// Create a ledger from a configuration
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let config = LedgerConfig::new(config.threshold, config.principals, config.label)?;
        let created_at = Utc::now();
        let address = Self::generate_address(&config, created_at);

        log::info!(
            "Ledger {} created ({}-of-{})",
            address,
            config.threshold,
            config.principals.len()
        );

        Ok(Self {
            address,
            principals: PrincipalSet::from_config(&config),
            label: config.label,
            created_at,
            log: OperationLog::new(),
            approvals: ApprovalTracker::new(),
            nonces: BTreeMap::new(),
            event_seq: 0,
            outbox: Vec::new(),
        })
    }

    /// Base58Check(0x05 || HASH160(threshold || sorted principals || creation time))
    ///
    /// The creation time keeps two ledgers with the same membership apart,
    /// so signed calls cannot be replayed across them.
    fn generate_address(config: &LedgerConfig, created_at: DateTime<Utc>) -> String {
        let mut sorted = config.principals.clone();
        sorted.sort();

        let mut data = config.threshold.to_be_bytes().to_vec();
        for principal in &sorted {
            data.extend_from_slice(principal.as_str().as_bytes());
            data.push(0);
        }
        data.extend_from_slice(&created_at.timestamp_nanos_opt().unwrap_or(0).to_be_bytes());

        base58check(LEDGER_VERSION, &hash160(&data))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn principal_set(&self) -> &PrincipalSet {
        &self.principals
    }

    pub fn principals(&self) -> Vec<Principal> {
        self.principals.principals()
    }

    pub fn is_principal(&self, principal: &Principal) -> bool {
        self.principals.is_principal(principal)
    }

    pub fn threshold(&self) -> usize {
        self.principals.threshold()
    }

    pub fn pending_count(&self) -> usize {
        self.log.pending_count()
    }

    pub fn operation_count(&self) -> usize {
        self.log.len()
    }

    pub fn get(&self, id: OperationId) -> Result<&Operation, LedgerError> {
        self.log.get(id)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.log.iter()
    }

    pub fn approvals(&self, id: OperationId) -> Vec<Principal> {
        self.approvals.approvals(id)
    }

    /// Operation plus approvals and whether it could execute right now
    pub fn status(&self, id: OperationId) -> Result<OperationStatus, LedgerError> {
        let operation = self.log.get(id)?.clone();
        let approvals = self.approvals.approvals(id);
        let threshold = self.principals.threshold();
        let quorum_met = operation.is_pending() && approvals.len() >= threshold;

        Ok(OperationStatus {
            operation,
            approvals,
            threshold,
            quorum_met,
        })
    }

    /// Nonce the principal's next signed call must carry
    pub fn next_nonce(&self, principal: &Principal) -> u64 {
        self.nonces.get(principal).copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Propose an operation; returns its id
    pub fn submit(
        &mut self,
        submitter: &Principal,
        target: &str,
        effect: Effect,
    ) -> Result<OperationId, LedgerError> {
        let payload_hash = effect.payload_hash()?;
        let op = self.log.submit(&self.principals, submitter, target, effect)?;
        let id = op.id;

        log::info!("Operation {} proposed by {}", op.summary(), submitter);
        self.emit(LedgerEvent::Proposed {
            id,
            submitter: submitter.clone(),
            target: target.to_string(),
            payload_hash,
        });

        Ok(id)
    }

    /// Approve a pending operation; returns the approval count
    pub fn approve(
        &mut self,
        id: OperationId,
        principal: &Principal,
    ) -> Result<usize, LedgerError> {
        let count = self
            .approvals
            .approve(&self.principals, &self.log, id, principal)?;

        log::debug!(
            "Operation #{} approved by {} ({}/{})",
            id,
            principal,
            count,
            self.principals.threshold()
        );
        self.emit(LedgerEvent::Approved {
            id,
            principal: principal.clone(),
        });

        Ok(count)
    }

    /// Withdraw an approval; returns the remaining approval count
    pub fn revoke(&mut self, id: OperationId, principal: &Principal) -> Result<usize, LedgerError> {
        let count = self
            .approvals
            .revoke(&self.principals, &self.log, id, principal)?;

        log::debug!("Operation #{} approval revoked by {} ({} left)", id, principal, count);
        self.emit(LedgerEvent::Revoked {
            id,
            principal: principal.clone(),
        });

        Ok(count)
    }

    /// Execute an operation whose quorum is met right now
    pub fn execute(
        &mut self,
        id: OperationId,
        caller: &Principal,
        host: &mut dyn EffectExecutor,
    ) -> Result<(), LedgerError> {
        let result = ExecutionEngine::new(&mut self.principals, &mut self.log, &mut self.approvals)
            .execute(id, caller, host);

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                // Failures after quorum was confirmed are reported to observers
                if matches!(
                    e,
                    LedgerError::EffectFailed { .. } | LedgerError::InvariantViolation(_)
                ) {
                    log::warn!("Execution of operation #{} failed: {}", id, e);
                    self.emit(LedgerEvent::Executed { id, success: false });
                }
                return Err(e);
            }
        };

        log::info!("Operation #{} executed by {}", id, caller);
        self.emit(LedgerEvent::Executed { id, success: true });

        if let Some(update) = report.membership {
            log::info!(
                "Principal set changed: epoch {}, {}-of-{}",
                update.epoch,
                update.threshold,
                update.principals
            );
            for (stale, count) in update.invalidated {
                self.emit(LedgerEvent::ApprovalsInvalidated { id: stale, count });
            }
            self.emit(LedgerEvent::MembershipChanged {
                epoch: update.epoch,
                principals: update.principals,
                threshold: update.threshold,
            });
        }

        Ok(())
    }

    /// Withdraw a pending operation; only its submitter may do so
    pub fn cancel(&mut self, id: OperationId, caller: &Principal) -> Result<(), LedgerError> {
        if !self.principals.is_principal(caller) {
            return Err(LedgerError::NotAuthorized(caller.clone()));
        }

        let op = self.log.get_mut(id)?;
        op.ensure_pending()?;
        if &op.submitter != caller {
            return Err(LedgerError::NotAuthorized(caller.clone()));
        }

        op.state = OperationState::Cancelled;
        op.updated_at = Utc::now();

        log::info!("Operation #{} cancelled by {}", id, caller);
        self.emit(LedgerEvent::Cancelled {
            id,
            principal: caller.clone(),
        });

        Ok(())
    }

    // ------------------------------------------------------------------
    // Signed calls
    // ------------------------------------------------------------------

    /// Verify a signed call for this ledger and return its principal
    pub fn authenticate(&self, signed: &SignedCall) -> Result<Principal, LedgerError> {
        let principal = signed.verify(&self.address)?;

        let expected = self.next_nonce(&principal);
        if signed.nonce != expected {
            return Err(LedgerError::StaleNonce {
                expected,
                got: signed.nonce,
            });
        }

        Ok(principal)
    }

    /// Authenticate and apply a signed call
    ///
    /// The nonce is consumed only when the call succeeds.
    pub fn dispatch(
        &mut self,
        signed: &SignedCall,
        host: &mut dyn EffectExecutor,
    ) -> Result<CallOutcome, LedgerError> {
        let principal = self.authenticate(signed)?;

        let outcome = match &signed.call {
            LedgerCall::Submit { target, effect } => {
                let id = self.submit(&principal, target, effect.clone())?;
                CallOutcome::Submitted { id }
            }
            LedgerCall::Approve { id } => {
                let approvals = self.approve(*id, &principal)?;
                CallOutcome::Approved { id: *id, approvals }
            }
            LedgerCall::Revoke { id } => {
                let approvals = self.revoke(*id, &principal)?;
                CallOutcome::Revoked { id: *id, approvals }
            }
            LedgerCall::Execute { id } => {
                self.execute(*id, &principal, host)?;
                CallOutcome::Executed { id: *id }
            }
            LedgerCall::Cancel { id } => {
                self.cancel(*id, &principal)?;
                CallOutcome::Cancelled { id: *id }
            }
        };

        *self.nonces.entry(principal).or_insert(0) += 1;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn emit(&mut self, event: LedgerEvent) {
        self.outbox.push(EventRecord {
            seq: self.event_seq,
            event,
        });
        self.event_seq += 1;
    }

    /// Sequence number the next event will carry
    pub fn next_event_seq(&self) -> u64 {
        self.event_seq
    }

    /// Events produced since the last drain, oldest first
    pub fn pending_events(&self) -> &[EventRecord] {
        &self.outbox
    }

    /// Take all queued events
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::ledger::execution::EffectError;
    use crate::ledger::principal::MembershipChange;

    /// Host that records effects and can be told to refuse them
    #[derive(Default)]
    struct TestHost {
        fired: Vec<(String, Effect)>,
        refuse: bool,
    }

    impl EffectExecutor for TestHost {
        fn perform_effect(&mut self, target: &str, effect: &Effect) -> Result<(), EffectError> {
            if self.refuse {
                return Err(EffectError::Rejected {
                    target: target.to_string(),
                    reason: "recipient refused".to_string(),
                });
            }
            self.fired.push((target.to_string(), effect.clone()));
            Ok(())
        }
    }

    fn p(id: &str) -> Principal {
        Principal::from(id)
    }

    fn abc_ledger() -> Ledger {
        let config = LedgerConfig::new(2, vec![p("A"), p("B"), p("C")], None).unwrap();
        Ledger::new(config).unwrap()
    }

    fn transfer(amount: u64) -> Effect {
        Effect::TransferValue { amount }
    }

    fn snapshot(ledger: &Ledger) -> String {
        serde_json::to_string(ledger).unwrap()
    }

    /// Serialized ledger without the event counter
    fn state_of(ledger: &Ledger) -> serde_json::Value {
        let mut value = serde_json::to_value(ledger).unwrap();
        value.as_object_mut().unwrap().remove("event_seq");
        value
    }

    #[test]
    fn test_two_of_three_scenario() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();

        let id = ledger.submit(&p("A"), "X", transfer(100)).unwrap();
        assert_eq!(id, 0);

        ledger.approve(id, &p("A")).unwrap();
        assert!(matches!(
            ledger.execute(id, &p("A"), &mut host),
            Err(LedgerError::QuorumNotMet { have: 1, need: 2, .. })
        ));

        ledger.approve(id, &p("B")).unwrap();
        ledger.execute(id, &p("A"), &mut host).unwrap();
        assert_eq!(host.fired, vec![("X".to_string(), transfer(100))]);
        assert_eq!(ledger.get(id).unwrap().state, OperationState::Executed);

        assert!(matches!(
            ledger.approve(id, &p("C")),
            Err(LedgerError::NotPending { .. })
        ));
    }

    #[test]
    fn test_second_execute_fails_not_pending() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("A")).unwrap();
        ledger.approve(id, &p("B")).unwrap();

        ledger.execute(id, &p("B"), &mut host).unwrap();
        let before = snapshot(&ledger);

        let second = ledger.execute(id, &p("C"), &mut host);
        assert!(matches!(
            second,
            Err(LedgerError::NotPending {
                state: OperationState::Executed,
                ..
            })
        ));
        assert_eq!(host.fired.len(), 1);
        assert_eq!(snapshot(&ledger), before);
    }

    #[test]
    fn test_double_approve_rejected_without_change() {
        let mut ledger = abc_ledger();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("B")).unwrap();
        let before = snapshot(&ledger);

        let result = ledger.approve(id, &p("B"));
        assert!(matches!(result, Err(LedgerError::AlreadyApproved { .. })));
        assert_eq!(ledger.approvals(id).len(), 1);
        assert_eq!(snapshot(&ledger), before);
    }

    #[test]
    fn test_quorum_uses_current_approvals() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();

        ledger.approve(id, &p("A")).unwrap();
        ledger.approve(id, &p("B")).unwrap();
        ledger.revoke(id, &p("B")).unwrap();
        ledger.approve(id, &p("C")).unwrap();

        ledger.execute(id, &p("B"), &mut host).unwrap();
        assert_eq!(ledger.approvals(id), vec![p("A"), p("C")]);
    }

    #[test]
    fn test_revoke_before_execute_drops_quorum() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();

        ledger.approve(id, &p("A")).unwrap();
        ledger.approve(id, &p("B")).unwrap();
        assert!(ledger.status(id).unwrap().quorum_met);
        ledger.revoke(id, &p("B")).unwrap();

        let result = ledger.execute(id, &p("A"), &mut host);
        assert!(matches!(result, Err(LedgerError::QuorumNotMet { have: 1, .. })));
        assert!(host.fired.is_empty());
    }

    #[test]
    fn test_approvals_frozen_after_execution() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("A")).unwrap();
        ledger.approve(id, &p("B")).unwrap();
        ledger.execute(id, &p("A"), &mut host).unwrap();

        assert!(matches!(
            ledger.revoke(id, &p("A")),
            Err(LedgerError::NotPending { .. })
        ));
        assert_eq!(ledger.approvals(id), vec![p("A"), p("B")]);
    }

    #[test]
    fn test_effect_failure_keeps_operation_pending() {
        let mut ledger = abc_ledger();
        let mut host = TestHost {
            refuse: true,
            ..Default::default()
        };
        let id = ledger.submit(&p("A"), "X", transfer(5)).unwrap();
        ledger.approve(id, &p("A")).unwrap();
        ledger.approve(id, &p("B")).unwrap();
        ledger.drain_events();
        let before = state_of(&ledger);

        let result = ledger.execute(id, &p("C"), &mut host);
        assert!(matches!(result, Err(LedgerError::EffectFailed { id: 0, .. })));
        assert_eq!(state_of(&ledger), before);
        assert_eq!(ledger.approvals(id), vec![p("A"), p("B")]);
        assert_eq!(
            ledger.drain_events(),
            vec![EventRecord {
                seq: 3,
                event: LedgerEvent::Executed { id, success: false },
            }]
        );

        host.refuse = false;
        ledger.execute(id, &p("C"), &mut host).unwrap();
        assert_eq!(host.fired.len(), 1);
        assert_eq!(ledger.get(id).unwrap().state, OperationState::Executed);
    }

    #[test]
    fn test_rejected_calls_leave_state_unchanged() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("A")).unwrap();
        ledger.drain_events();
        let before = snapshot(&ledger);

        assert!(ledger.submit(&p("Z"), "X", transfer(1)).is_err());
        assert!(ledger.approve(id, &p("Z")).is_err());
        assert!(ledger.approve(42, &p("A")).is_err());
        assert!(ledger.revoke(id, &p("B")).is_err());
        assert!(ledger.execute(id, &p("A"), &mut host).is_err());
        assert!(ledger.cancel(id, &p("B")).is_err());

        assert_eq!(snapshot(&ledger), before);
        assert!(ledger.pending_events().is_empty());
        assert_eq!(ledger.operation_count(), 1);
    }

    #[test]
    fn test_cancel_by_submitter_only() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("A")).unwrap();
        ledger.approve(id, &p("B")).unwrap();

        assert!(matches!(
            ledger.cancel(id, &p("B")),
            Err(LedgerError::NotAuthorized(_))
        ));
        ledger.cancel(id, &p("A")).unwrap();
        assert_eq!(ledger.pending_count(), 0);

        assert!(matches!(
            ledger.execute(id, &p("A"), &mut host),
            Err(LedgerError::NotPending {
                state: OperationState::Cancelled,
                ..
            })
        ));
        assert!(host.fired.is_empty());
    }

    #[test]
    fn test_events_in_order() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();
        let id = ledger.submit(&p("A"), "X", transfer(3)).unwrap();
        ledger.approve(id, &p("A")).unwrap();
        ledger.approve(id, &p("B")).unwrap();
        ledger.revoke(id, &p("B")).unwrap();
        ledger.approve(id, &p("C")).unwrap();
        ledger.execute(id, &p("C"), &mut host).unwrap();

        let kinds: Vec<&str> = ledger.pending_events().iter().map(|r| r.event.kind()).collect();
        assert_eq!(
            kinds,
            vec!["proposed", "approved", "approved", "revoked", "approved", "executed"]
        );

        match &ledger.pending_events()[0].event {
            LedgerEvent::Proposed { payload_hash, .. } => {
                assert_eq!(payload_hash, &transfer(3).payload_hash().unwrap());
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert_eq!(ledger.drain_events().len(), 6);
        assert!(ledger.pending_events().is_empty());
    }

    #[test]
    fn test_regranted_approval_gets_fresh_dedup_key() {
        let mut ledger = abc_ledger();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("A")).unwrap();
        ledger.revoke(id, &p("A")).unwrap();
        ledger.approve(id, &p("A")).unwrap();

        // An observer replaying the stream must end with the ledger's approvals
        let mut seen = std::collections::HashSet::new();
        let mut indexed = std::collections::BTreeSet::new();
        let records = ledger.drain_events();
        for record in records.iter().chain(records.iter()) {
            if !seen.insert(record.dedup_key()) {
                continue;
            }
            match &record.event {
                LedgerEvent::Approved { principal, .. } => {
                    indexed.insert(principal.clone());
                }
                LedgerEvent::Revoked { principal, .. } => {
                    indexed.remove(principal);
                }
                _ => {}
            }
        }

        assert_eq!(seen.len(), 4);
        assert_eq!(indexed.into_iter().collect::<Vec<_>>(), ledger.approvals(id));
        assert_eq!(
            records.iter().map(|r| r.seq).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_event_sequence_survives_snapshot() {
        let mut ledger = abc_ledger();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("B")).unwrap();
        assert_eq!(ledger.next_event_seq(), 2);

        let mut restored: Ledger = serde_json::from_str(&snapshot(&ledger)).unwrap();
        restored.revoke(id, &p("B")).unwrap();
        assert_eq!(restored.drain_events()[0].seq, 2);
    }

    #[test]
    fn test_membership_change_invalidates_other_approvals() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();

        let payment = ledger.submit(&p("B"), "X", transfer(9)).unwrap();
        ledger.approve(payment, &p("B")).unwrap();
        ledger.approve(payment, &p("C")).unwrap();

        let address = ledger.address().to_string();
        let change = ledger
            .submit(
                &p("A"),
                &address,
                Effect::ChangeMembership(MembershipChange::RemovePrincipal { principal: p("C") }),
            )
            .unwrap();
        ledger.approve(change, &p("A")).unwrap();
        ledger.approve(change, &p("B")).unwrap();
        ledger.drain_events();

        ledger.execute(change, &p("A"), &mut host).unwrap();
        assert!(!ledger.is_principal(&p("C")));
        assert_eq!(ledger.principal_set().epoch(), 1);
        assert!(ledger.approvals(payment).is_empty());

        let events: Vec<LedgerEvent> =
            ledger.drain_events().into_iter().map(|r| r.event).collect();
        assert!(events.contains(&LedgerEvent::ApprovalsInvalidated {
            id: payment,
            count: 2
        }));
        assert!(events.contains(&LedgerEvent::MembershipChanged {
            epoch: 1,
            principals: 2,
            threshold: 2
        }));

        // The removed principal is locked out; the payment needs fresh approvals
        assert!(matches!(
            ledger.approve(payment, &p("C")),
            Err(LedgerError::NotAuthorized(_))
        ));
        assert!(ledger.execute(payment, &p("A"), &mut host).is_err());
        ledger.approve(payment, &p("A")).unwrap();
        ledger.approve(payment, &p("B")).unwrap();
        ledger.execute(payment, &p("B"), &mut host).unwrap();
        assert_eq!(host.fired.len(), 1);
    }

    #[test]
    fn test_invalid_threshold_change_rejected() {
        let mut ledger = abc_ledger();
        let mut host = TestHost::default();

        for threshold in [0, 4] {
            let id = ledger
                .submit(
                    &p("A"),
                    "self",
                    Effect::ChangeMembership(MembershipChange::SetThreshold { threshold }),
                )
                .unwrap();
            ledger.approve(id, &p("A")).unwrap();
            ledger.approve(id, &p("B")).unwrap();
            let before = state_of(&ledger);

            let result = ledger.execute(id, &p("A"), &mut host);
            assert!(matches!(result, Err(LedgerError::InvariantViolation(_))));
            assert_eq!(state_of(&ledger), before);
            assert_eq!(ledger.threshold(), 2);
        }
    }

    #[test]
    fn test_signed_dispatch_consumes_nonce() {
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let principals = keys.iter().map(|k| Principal::new(k.address())).collect();
        let mut ledger = Ledger::new(LedgerConfig::new(2, principals, None).unwrap()).unwrap();
        let mut host = TestHost::default();
        let address = ledger.address().to_string();

        let submit = SignedCall::sign(
            &keys[0],
            &address,
            0,
            LedgerCall::Submit {
                target: "X".to_string(),
                effect: transfer(10),
            },
        )
        .unwrap();
        let outcome = ledger.dispatch(&submit, &mut host).unwrap();
        assert_eq!(outcome, CallOutcome::Submitted { id: 0 });

        // Replaying the same envelope fails on the nonce
        assert!(matches!(
            ledger.dispatch(&submit, &mut host),
            Err(LedgerError::StaleNonce { expected: 1, got: 0 })
        ));

        for key in &keys[..2] {
            let principal = Principal::new(key.address());
            let nonce = ledger.next_nonce(&principal);
            let approve =
                SignedCall::sign(key, &address, nonce, LedgerCall::Approve { id: 0 }).unwrap();
            ledger.dispatch(&approve, &mut host).unwrap();
        }

        // A failed call does not consume the nonce
        let early = SignedCall::sign(&keys[2], &address, 0, LedgerCall::Revoke { id: 0 }).unwrap();
        assert!(matches!(
            ledger.dispatch(&early, &mut host),
            Err(LedgerError::NotApproved { .. })
        ));
        assert_eq!(ledger.next_nonce(&Principal::new(keys[2].address())), 0);

        let execute =
            SignedCall::sign(&keys[2], &address, 0, LedgerCall::Execute { id: 0 }).unwrap();
        assert_eq!(
            ledger.dispatch(&execute, &mut host).unwrap(),
            CallOutcome::Executed { id: 0 }
        );
        assert_eq!(host.fired.len(), 1);
    }

    #[test]
    fn test_signed_call_from_outsider() {
        let insider = KeyPair::generate();
        let outsider = KeyPair::generate();
        let config =
            LedgerConfig::new(1, vec![Principal::new(insider.address())], None).unwrap();
        let mut ledger = Ledger::new(config).unwrap();
        let mut host = TestHost::default();

        let call = SignedCall::sign(
            &outsider,
            ledger.address(),
            0,
            LedgerCall::Submit {
                target: "X".to_string(),
                effect: transfer(1),
            },
        )
        .unwrap();
        assert!(matches!(
            ledger.dispatch(&call, &mut host),
            Err(LedgerError::NotAuthorized(_))
        ));
    }

    #[test]
    fn test_snapshot_roundtrip_drops_outbox() {
        let mut ledger = abc_ledger();
        let id = ledger.submit(&p("A"), "X", transfer(1)).unwrap();
        ledger.approve(id, &p("C")).unwrap();

        let restored: Ledger = serde_json::from_str(&snapshot(&ledger)).unwrap();
        assert_eq!(restored.address(), ledger.address());
        assert_eq!(restored.approvals(id), vec![p("C")]);
        assert_eq!(restored.principal_set(), ledger.principal_set());
        assert!(restored.pending_events().is_empty());
    }
}
