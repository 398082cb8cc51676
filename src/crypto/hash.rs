//! Hashing utilities for the ledger
//!
//! SHA-256 digests are used for payload hashes announced to observers,
//! for signed-call messages and for ledger address derivation.

use ripemd::Ripemd160;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// RIPEMD160(SHA256(data)), the 20-byte hash behind every address
pub fn hash160(data: &[u8]) -> Vec<u8> {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().to_vec()
}

/// Base58Check encoding: version byte, payload, 4-byte double SHA-256 checksum
pub fn base58check(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(payload.len() + 5);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let checksum = double_sha256(&bytes);
    bytes.extend_from_slice(&checksum[..4]);
    bs58::encode(bytes).into_string()
}

/// SHA-256 over the canonical JSON encoding of a value
///
/// serde_json emits struct fields in declaration order, so the same value
/// always hashes to the same digest.
pub fn digest_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let encoded = serde_json::to_vec(value)?;
    Ok(sha256(&encoded))
}
