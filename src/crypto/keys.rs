//! secp256k1 keys for principals
//!
//! A principal's identity is the Base58Check address of its public key.
//! The ledger only ever verifies signatures; [`KeyPair`] exists so hosts,
//! the CLI and tests can produce them.

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{base58check, hash160, sha256};

/// Version byte for principal addresses (mainnet P2PKH, addresses start with '1')
const PRINCIPAL_VERSION: u8 = 0x00;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A private key and its public key
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Private key as hex. Keep this secret.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Compressed public key as hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Address identifying this key as a principal
    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key)
    }

    /// Sign a message, returning the compact 64-byte signature
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let message = to_message(message)?;
        let signature = Secp256k1::new().sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact().to_vec())
    }
}

/// Derive the principal address of a public key
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    base58check(PRINCIPAL_VERSION, &hash160(&public_key.serialize()))
}

/// Parse a compressed or uncompressed public key from hex
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Verify a compact signature against a public key
///
/// Returns `Ok(false)` for a well-formed signature that does not match;
/// malformed input is an error.
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let message = to_message(message)?;
    let signature = Signature::from_compact(signature).map_err(|_| KeyError::InvalidSignature)?;
    Ok(Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, public_key)
        .is_ok())
}

// Messages that are not already a 32-byte digest get hashed first.
fn to_message(message: &[u8]) -> Result<Message, KeyError> {
    let digest = if message.len() == 32 {
        message.to_vec()
    } else {
        sha256(message)
    };
    Ok(Message::from_digest_slice(&digest)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let message = sha256(b"approve op 7");

        let signature = kp.sign(&message).unwrap();
        let public_key = public_key_from_hex(&kp.public_key_hex()).unwrap();
        assert!(verify_signature(&public_key, &message, &signature).unwrap());

        let other = sha256(b"approve op 8");
        assert!(!verify_signature(&public_key, &other, &signature).unwrap());
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::from_private_key_hex(&kp1.private_key_hex()).unwrap();
        assert_eq!(kp1.public_key_hex(), kp2.public_key_hex());
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_address_format() {
        let kp = KeyPair::generate();
        assert!(kp.address().starts_with('1'));
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        assert!(matches!(
            KeyPair::from_private_key_hex("zz"),
            Err(KeyError::InvalidPrivateKey)
        ));
        assert!(matches!(
            public_key_from_hex("0102"),
            Err(KeyError::InvalidPublicKey)
        ));

        let kp = KeyPair::generate();
        let public_key = public_key_from_hex(&kp.public_key_hex()).unwrap();
        assert!(matches!(
            verify_signature(&public_key, b"msg", &[0u8; 10]),
            Err(KeyError::InvalidSignature)
        ));
    }
}
