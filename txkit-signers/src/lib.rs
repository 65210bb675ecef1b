#![cfg_attr(docsrs, feature(doc_cfg))]
//! Provides the [`Signer`] boundary used by the transaction builders to produce chain-native
//! signatures, and [`LocalSigner`] which signs with in-memory key material.
//!
//! ```
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! use txkit_core::types::{Algorithm, KeyMaterial};
//! use txkit_core::utils::sha256;
//! use txkit_signers::{LocalSigner, Signer};
//!
//! let key = KeyMaterial::random(Algorithm::Secp256k1, &mut rand::thread_rng());
//! let digest = sha256(b"unsigned transaction bytes");
//! let signature = LocalSigner.sign(&digest, &key).await?;
//! assert_eq!(signature.len(), 65);
//! # Ok(())
//! # }
//! ```
mod local;
pub use local::LocalSigner;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use txkit_core::types::{Algorithm, Bytes, KeyMaterial, SignerId};

/// Error thrown by a [`Signer`]
#[derive(Debug, Error)]
pub enum SignerError {
    /// The key has no private component
    #[error("key {0} has no private component")]
    MissingPrivateKey(SignerId),
    /// The message is not in the form the algorithm signs, e.g. not a 32-byte digest
    #[error("cannot sign message with {algorithm}: {reason}")]
    InvalidMessage { algorithm: Algorithm, reason: String },
    /// The signer refused to sign
    #[error("signer rejected the request: {0}")]
    Rejected(String),
    /// Error in the underlying elliptic curve implementation
    #[error("signing failed: {0}")]
    Crypto(String),
}

/// The chain-native signing boundary.
///
/// Builders hand a signer the exact message their chain signs over (a 32-byte digest for
/// secp256k1 chains, the prefixed transaction bytes for ed25519 chains) together with the key
/// to sign with. Implement this trait to route signing to remote or hardware signers.
#[async_trait]
pub trait Signer: fmt::Debug + Send + Sync {
    /// Signs `message` with `key`.
    ///
    /// secp256k1 signatures are returned as 65-byte `r || s || v` with `v` in `{0, 1}`;
    /// ed25519 signatures as their 64-byte encoding.
    async fn sign(&self, message: &[u8], key: &KeyMaterial) -> Result<Bytes, SignerError>;

    /// Whether this signer can produce signatures for `algorithm`
    fn supports(&self, _algorithm: Algorithm) -> bool {
        true
    }
}
