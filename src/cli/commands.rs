//! CLI commands for the ledger
//!
//! Mutating commands sign a call with the caller's private key and apply it
//! to the ledger stored in the data directory.

use crate::crypto::{public_key_from_hex, public_key_to_address, KeyPair};
use crate::host::Treasury;
use crate::ledger::{
    self_target, CallOutcome, Effect, EventRecord, Ledger, LedgerCall, LedgerConfig, LedgerEvent,
    OperationId, Principal, SignedCall,
};
use crate::storage::{Storage, StorageConfig};
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub ledger: Ledger,
    pub treasury: Treasury,
    pub storage: Storage,
    pub data_dir: PathBuf,
}

fn open_storage(data_dir: &Path) -> CliResult<Storage> {
    let storage_config = StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    };
    Ok(Storage::new(storage_config)?)
}

impl AppState {
    /// Load the ledger stored in `data_dir`
    pub fn load(data_dir: PathBuf) -> CliResult<Self> {
        let storage = open_storage(&data_dir)?;

        if !storage.exists() {
            return Err(format!(
                "No ledger in {:?}. Create one with: ledger init",
                data_dir
            )
            .into());
        }

        let snapshot = storage.load()?;
        Ok(Self {
            ledger: snapshot.ledger,
            treasury: snapshot.treasury,
            storage,
            data_dir,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.ledger, &self.treasury)?;
        Ok(())
    }

    /// Sign `call` with `key` and apply it
    ///
    /// Saves on success, and after a failed effect so its reported event
    /// keeps its sequence number.
    pub fn apply(&mut self, key: &KeyPair, call: LedgerCall) -> CliResult<CallOutcome> {
        let principal = Principal::new(key.address());
        let nonce = self.ledger.next_nonce(&principal);
        let signed = SignedCall::sign(key, self.ledger.address(), nonce, call)?;

        let result = self.ledger.dispatch(&signed, &mut self.treasury);
        let events = self.ledger.drain_events();
        for record in &events {
            print_event(record);
        }

        if result.is_ok() || !events.is_empty() {
            self.save()?;
        }
        Ok(result?)
    }
}

/// Accept either a principal address or a hex public key
pub fn parse_principal(value: &str) -> Principal {
    match public_key_from_hex(value) {
        Ok(public_key) => Principal::new(public_key_to_address(&public_key)),
        Err(_) => Principal::new(value),
    }
}

/// Load a signing key from its hex private key
pub fn parse_key(private_key_hex: &str) -> CliResult<KeyPair> {
    Ok(KeyPair::from_private_key_hex(private_key_hex)?)
}

fn print_event(record: &EventRecord) {
    match &record.event {
        LedgerEvent::Proposed {
            id, payload_hash, ..
        } => println!(
            "   📣 Proposed #{} (payload {}...)",
            id,
            payload_hash.get(..16).unwrap_or(payload_hash)
        ),
        LedgerEvent::Approved { id, principal } => {
            println!("   ✍️  #{} approved by {}", id, principal)
        }
        LedgerEvent::Revoked { id, principal } => {
            println!("   ↩️  #{} approval revoked by {}", id, principal)
        }
        LedgerEvent::Executed { id, success: true } => println!("   ⚡ #{} executed", id),
        LedgerEvent::Executed { id, success: false } => {
            println!("   ⚠️  #{} execution failed, still pending", id)
        }
        LedgerEvent::Cancelled { id, principal } => {
            println!("   🚫 #{} cancelled by {}", id, principal)
        }
        LedgerEvent::ApprovalsInvalidated { id, count } => {
            println!("   🧹 #{} lost {} approval(s)", id, count)
        }
        LedgerEvent::MembershipChanged {
            epoch,
            principals,
            threshold,
        } => println!(
            "   👥 Membership now {}-of-{} (epoch {})",
            threshold, principals, epoch
        ),
    }
}

/// Generate a new key pair
pub fn cmd_keygen() -> CliResult<()> {
    let key = KeyPair::generate();

    println!("🔐 New key pair generated!");
    println!("   📍 Address: {}", key.address());
    println!("   🔑 Public Key: {}", key.public_key_hex());
    println!("   🗝️  Private Key: {}", key.private_key_hex());
    println!("\n   ⚠️  IMPORTANT: Store the private key safely. It is not saved anywhere.");

    Ok(())
}

/// Initialize a new ledger
pub fn cmd_init(
    data_dir: &Path,
    threshold: usize,
    principals: &[String],
    label: Option<String>,
    balance: u64,
    force: bool,
) -> CliResult<()> {
    let storage = open_storage(data_dir)?;

    if storage.exists() && !force {
        println!("⚠️  Ledger already exists at {:?}", data_dir);
        println!("   Use --force to reinitialize (this will replace existing data)");
        return Ok(());
    }

    let principals = principals.iter().map(|p| parse_principal(p)).collect();
    let config = LedgerConfig::new(threshold, principals, label)?;
    let ledger = Ledger::new(config)?;
    let treasury = Treasury::with_balance(balance);

    storage.save(&ledger, &treasury)?;

    println!("✅ Ledger initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   📍 Address: {}", ledger.address());
    println!("   🔧 Policy: {}", ledger.principal_set().description());
    for principal in ledger.principals() {
        println!("   └─ {}", principal);
    }
    println!("   💰 Treasury: {}", treasury.balance());

    Ok(())
}

/// Display ledger information
pub fn cmd_info(state: &AppState) -> CliResult<()> {
    let set = state.ledger.principal_set();
    let stats = state.storage.stats()?;

    println!("📒 Ledger Info");
    println!("   ├─ Address: {}", state.ledger.address());
    if let Some(label) = state.ledger.label() {
        println!("   ├─ Label: {}", label);
    }
    println!("   ├─ Policy: {} (epoch {})", set.description(), set.epoch());
    println!("   ├─ Operations: {}", state.ledger.operation_count());
    println!("   ├─ Pending: {}", state.ledger.pending_count());
    println!("   ├─ Treasury: {}", state.treasury.balance());
    println!(
        "   └─ Snapshot: {} bytes, {} backup(s)",
        stats.file_size, stats.backup_count
    );

    println!("\n👥 Principals:");
    for principal in state.ledger.principals() {
        println!(
            "   {} (next nonce {})",
            principal,
            state.ledger.next_nonce(&principal)
        );
    }

    Ok(())
}

/// Propose an operation
pub fn cmd_submit(
    state: &mut AppState,
    key: &KeyPair,
    target: Option<String>,
    effect: Effect,
) -> CliResult<()> {
    let target = target.unwrap_or_else(|| self_target(state.ledger.address()));
    let call = LedgerCall::Submit {
        target: target.clone(),
        effect: effect.clone(),
    };

    if let CallOutcome::Submitted { id } = state.apply(key, call)? {
        println!("\n✅ Operation #{} proposed", id);
        println!("   Effect: {}", effect);
        println!("   Target: {}", target);
        println!(
            "   Needs {} approval(s) before it can execute",
            state.ledger.threshold()
        );
    }

    Ok(())
}

/// Approve a pending operation
pub fn cmd_approve(state: &mut AppState, key: &KeyPair, id: OperationId) -> CliResult<()> {
    if let CallOutcome::Approved { approvals, .. } =
        state.apply(key, LedgerCall::Approve { id })?
    {
        let threshold = state.ledger.threshold();
        println!("\n✅ Approval recorded ({}/{})", approvals, threshold);
        if approvals >= threshold {
            println!("   Quorum met. Any principal can now run: ledger execute --id {}", id);
        }
    }
    Ok(())
}

/// Withdraw an approval
pub fn cmd_revoke(state: &mut AppState, key: &KeyPair, id: OperationId) -> CliResult<()> {
    if let CallOutcome::Revoked { approvals, .. } = state.apply(key, LedgerCall::Revoke { id })? {
        println!(
            "\n✅ Approval withdrawn ({}/{})",
            approvals,
            state.ledger.threshold()
        );
    }
    Ok(())
}

/// Execute an operation whose quorum is met
pub fn cmd_execute(state: &mut AppState, key: &KeyPair, id: OperationId) -> CliResult<()> {
    state.apply(key, LedgerCall::Execute { id })?;
    println!("\n✅ Operation #{} executed", id);
    println!("   💰 Treasury balance: {}", state.treasury.balance());
    Ok(())
}

/// Cancel an operation you submitted
pub fn cmd_cancel(state: &mut AppState, key: &KeyPair, id: OperationId) -> CliResult<()> {
    state.apply(key, LedgerCall::Cancel { id })?;
    println!("\n✅ Operation #{} cancelled", id);
    Ok(())
}

/// Show one operation
pub fn cmd_show(state: &AppState, id: OperationId) -> CliResult<()> {
    let status = state.ledger.status(id)?;
    let op = &status.operation;

    println!("📄 Operation #{}", op.id);
    println!("   ├─ State: {}", op.state);
    println!("   ├─ Effect: {}", op.effect);
    println!("   ├─ Target: {}", op.target);
    println!("   ├─ Submitter: {}", op.submitter);
    println!(
        "   ├─ Created: {}",
        op.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(executed_at) = op.executed_at {
        println!("   ├─ Executed: {}", executed_at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!(
        "   └─ Approvals: {}/{}{}",
        status.approvals.len(),
        status.threshold,
        if status.quorum_met { " (quorum met)" } else { "" }
    );
    for principal in &status.approvals {
        println!("      └─ {}", principal);
    }

    Ok(())
}

/// List operations
pub fn cmd_list(state: &AppState, pending_only: bool) -> CliResult<()> {
    let operations: Vec<_> = state
        .ledger
        .operations()
        .filter(|op| !pending_only || op.is_pending())
        .collect();

    if operations.is_empty() {
        println!("📭 No operations found. Propose one with: ledger submit");
        return Ok(());
    }

    println!("📋 Operations:");
    for op in operations {
        println!(
            "   #{} | {:<9} | {}/{} | {} -> {}",
            op.id,
            op.state,
            state.ledger.approvals(op.id).len(),
            state.ledger.threshold(),
            op.effect,
            op.target
        );
    }

    Ok(())
}

/// Show treasury balances
pub fn cmd_treasury(state: &AppState) -> CliResult<()> {
    println!("💰 Treasury balance: {}", state.treasury.balance());

    if !state.treasury.accounts().is_empty() {
        println!("\n   Credited accounts:");
        for (target, amount) in state.treasury.accounts() {
            println!("   └─ {} = {}", target, amount);
        }
    }

    if !state.treasury.invocations.is_empty() {
        println!("\n   Recent actions:");
        for invocation in state.treasury.invocations.iter().rev().take(10) {
            println!(
                "   └─ {} on {} ({})",
                invocation.action,
                invocation.target,
                invocation.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}

/// Fund the treasury
pub fn cmd_deposit(state: &mut AppState, amount: u64) -> CliResult<()> {
    let balance = state.treasury.deposit(amount)?;
    state.save()?;
    println!("✅ Deposited {}. Treasury balance: {}", amount, balance);
    Ok(())
}

/// Let `target` accept a named action
pub fn cmd_register_action(state: &mut AppState, target: &str, action: &str) -> CliResult<()> {
    state.treasury.register_action(target, action);
    state.save()?;
    println!("✅ {} now accepts action '{}'", target, action);
    Ok(())
}
