//! REST API module
//!
//! Provides HTTP access to the ledger. Mutations arrive as signed calls.
//!
//! # Endpoints
//!
//! ## Ledger
//! - `GET /api/ledger` - Address, principals, threshold, counts
//! - `GET /api/operations` - List operations (`?pending=true` for pending only)
//! - `GET /api/operations/{id}` - Operation with approvals
//! - `GET /api/principals/{principal}/nonce` - Nonce for the next signed call
//!
//! ## Calls
//! - `POST /api/calls` - Apply a signed submit/approve/revoke/execute/cancel
//!
//! ## Treasury
//! - `GET /api/treasury` - Balance and credited accounts
//!
//! ## WebSocket
//! - `GET /ws` - Ledger events (Proposed, Approved, Revoked, Executed, ...)

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::{WsBroadcaster, WsEvent};
