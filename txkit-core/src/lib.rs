#![cfg_attr(docsrs, feature(doc_cfg))]
//! Core types for building and signing transactions across chains.
//!
//! - [`types::KeyMaterial`] wraps a secp256k1 or ed25519 key pair.
//! - [`types::SignatureLedger`] collects signatures for one transaction, rejects duplicate
//!   signers and checks thresholds.
//! - [`types::TransactionRecord`] is the immutable result of a build.
//! - [`config`] holds the static network tables.
//! - [`utils`] provides the hashing and address encodings the chain codecs rely on.
pub mod config;
pub mod types;
pub mod utils;

// re-export the crypto crates so that downstream users do not need to pin them
pub use ed25519_dalek;
pub use k256;
pub use rand;
