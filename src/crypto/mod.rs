//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing and Base58Check encoding
//! - ECDSA key handling (secp256k1) for principal identities

pub mod hash;
pub mod keys;

pub use hash::{base58check, digest_json, double_sha256, hash160, sha256, sha256_hex};
pub use keys::{public_key_from_hex, public_key_to_address, verify_signature, KeyError, KeyPair};
