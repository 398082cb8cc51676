//! REST API handlers for ledger operations

use crate::api::websocket::{WsBroadcaster, WsEvent};
use crate::host::{TransferRecord, Treasury};
use crate::ledger::{
    CallOutcome, EventRecord, Ledger, LedgerError, OperationId, OperationStatus, Principal,
    SignedCall,
};
use crate::storage::Storage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
///
/// Mutating handlers lock the ledger first and the treasury second.
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<RwLock<Ledger>>,
    pub treasury: Arc<RwLock<Treasury>>,
    pub storage: Arc<Storage>,
    pub ws_broadcaster: Arc<WsBroadcaster>,
}

impl ApiState {
    pub fn new(ledger: Ledger, treasury: Treasury, storage: Storage) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            treasury: Arc::new(RwLock::new(treasury)),
            storage: Arc::new(storage),
            ws_broadcaster: Arc::new(WsBroadcaster::new()),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct LedgerInfo {
    pub address: String,
    pub label: Option<String>,
    pub description: String,
    pub threshold: usize,
    pub principals: Vec<Principal>,
    pub epoch: u64,
    pub operations: usize,
    pub pending: usize,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct CallResponse {
    pub outcome: CallOutcome,
    pub events: Vec<EventRecord>,
    /// False when the call was applied in memory but the snapshot failed to save
    pub persisted: bool,
}

#[derive(Serialize)]
pub struct NonceResponse {
    pub principal: Principal,
    pub is_principal: bool,
    pub next_nonce: u64,
}

#[derive(Serialize)]
pub struct TreasuryInfo {
    pub balance: u64,
    pub accounts: BTreeMap<String, u64>,
    pub recent_transfers: Vec<TransferRecord>,
    pub invocations: usize,
}

#[derive(Serialize, Debug)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize, Default)]
pub struct OperationsQuery {
    /// Only list operations still collecting approvals
    #[serde(default)]
    pub pending: bool,
}

/// Map a rejected call to an HTTP status
fn status_for(error: &LedgerError) -> StatusCode {
    match error {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        LedgerError::InvalidSignature(_) | LedgerError::CryptoError(_) => {
            StatusCode::UNAUTHORIZED
        }
        LedgerError::NotPending { .. }
        | LedgerError::AlreadyApproved { .. }
        | LedgerError::NotApproved { .. }
        | LedgerError::QuorumNotMet { .. }
        | LedgerError::StaleNonce { .. } => StatusCode::CONFLICT,
        LedgerError::EffectFailed { .. } | LedgerError::InvariantViolation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::EncodingError(_) => StatusCode::BAD_REQUEST,
    }
}

fn error_response(error: LedgerError) -> (StatusCode, Json<ApiError>) {
    (
        status_for(&error),
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/ledger - Ledger info
pub async fn get_ledger_info(State(state): State<ApiState>) -> Json<LedgerInfo> {
    let ledger = state.ledger.read().await;
    let set = ledger.principal_set();

    Json(LedgerInfo {
        address: ledger.address().to_string(),
        label: ledger.label().map(str::to_string),
        description: set.description(),
        threshold: set.threshold(),
        principals: set.principals(),
        epoch: set.epoch(),
        operations: ledger.operation_count(),
        pending: ledger.pending_count(),
        created_at: ledger.created_at().to_rfc3339(),
    })
}

/// GET /api/operations - List operations, optionally only pending ones
pub async fn list_operations(
    State(state): State<ApiState>,
    Query(query): Query<OperationsQuery>,
) -> ApiResult<Vec<OperationStatus>> {
    let ledger = state.ledger.read().await;

    let statuses = ledger
        .operations()
        .filter(|op| !query.pending || op.is_pending())
        .map(|op| ledger.status(op.id))
        .collect::<Result<Vec<_>, _>>()
        .map_err(error_response)?;

    Ok(Json(statuses))
}

/// GET /api/operations/{id} - Operation with approvals
pub async fn get_operation(
    State(state): State<ApiState>,
    Path(id): Path<OperationId>,
) -> ApiResult<OperationStatus> {
    let ledger = state.ledger.read().await;
    ledger.status(id).map(Json).map_err(error_response)
}

/// GET /api/principals/{principal}/nonce - Nonce for the next signed call
pub async fn get_nonce(
    State(state): State<ApiState>,
    Path(principal): Path<String>,
) -> Json<NonceResponse> {
    let ledger = state.ledger.read().await;
    let principal = Principal::new(principal);

    Json(NonceResponse {
        is_principal: ledger.is_principal(&principal),
        next_nonce: ledger.next_nonce(&principal),
        principal,
    })
}

/// POST /api/calls - Apply a signed call
pub async fn submit_call(
    State(state): State<ApiState>,
    Json(signed): Json<SignedCall>,
) -> ApiResult<CallResponse> {
    let mut ledger = state.ledger.write().await;
    let mut treasury = state.treasury.write().await;

    let result = ledger.dispatch(&signed, &mut *treasury);

    // Failed executions still produce an event, which advances the event sequence
    let events = ledger.drain_events();
    for event in &events {
        state.ws_broadcaster.broadcast(WsEvent::from(event.clone()));
    }

    let persisted = if result.is_ok() || !events.is_empty() {
        match state.storage.save(&ledger, &treasury) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save ledger: {}", e);
                false
            }
        }
    } else {
        true
    };

    let outcome = result.map_err(|e| {
        log::debug!("Rejected call {:?}: {}", signed.call, e);
        error_response(e)
    })?;

    Ok(Json(CallResponse {
        outcome,
        events,
        persisted,
    }))
}

/// GET /api/treasury - Treasury balances
pub async fn get_treasury(State(state): State<ApiState>) -> Json<TreasuryInfo> {
    let treasury = state.treasury.read().await;

    Json(TreasuryInfo {
        balance: treasury.balance(),
        accounts: treasury.accounts().clone(),
        recent_transfers: treasury.transfers.iter().rev().take(10).cloned().collect(),
        invocations: treasury.invocations.len(),
    })
}
