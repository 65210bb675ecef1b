#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # txkit
//!
//! > Build, sign and resume transactions for Algorand, Stacks, Tron and EOS.
//!
//! # Quickstart
//!
//! A prelude is provided which imports all the important things for you. Pick a coin, get a
//! builder from the factory, set its fields, queue the keys that sign and build.
//!
//! ```
//! use txkit::prelude::*;
//!
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let key = KeyMaterial::random(Algorithm::Secp256k1, &mut rand::thread_rng());
//! let sender = txkit::chains::trx::key_address(&key)?;
//!
//! let factory = TransactionBuilderFactory::new(Coin::Ttrx);
//! let mut builder = factory.transfer()?;
//! builder
//!     .as_trx_transfer_mut()
//!     .expect("tron transfer")
//!     .source(&sender)?
//!     .block(51407, "0000000000badb0d89177fd84c5d9196021cc1085b9e689b3e9a6195cac8bcae")?
//!     .timestamp(1612964127000)?
//!     .to("TVHsEa7nqPebk8fU5yc9ctf8n5X7DZKxkb")?
//!     .amount(1_000_000)?;
//! builder.queue_signer(key)?;
//!
//! let tx = builder.build().await?;
//! println!("{}", tx.to_explain_json());
//! # Ok(())
//! # }
//! ```
//!
//! ## Collecting signatures across parties
//!
//! A multisig transaction is usually signed by several parties that never share keys. Each
//! builds with [`TransactionBuilder::build_partial`], hands over the broadcast bytes and the
//! next party resumes them with [`TransactionBuilderFactory::from_raw`]. Signatures already
//! collected travel with the bytes and survive every resume.

/// # Core types
///
/// Key material, the signature ledger, the transaction record, the static network tables and
/// the hashing and address encodings shared by the chains.
pub mod core {
    pub use txkit_core::*;
}

/// # Signers
///
/// The signing boundary. [`signers::LocalSigner`] signs with in-memory keys; implement
/// [`signers::Signer`] to route signing to a remote service or a hardware device.
pub mod signers {
    pub use txkit_signers::*;
}

/// # Chains
///
/// The per-chain builders and codecs, and the factory that selects between them.
pub mod chains {
    pub use txkit_chains::*;
}

/// Easy imports of frequently used type definitions and traits
pub mod prelude {
    pub use txkit_chains::{
        builder_from_raw, new_builder, AnyBuilder, BuilderError, BuilderKind, Phase,
        TransactionBuilder, TransactionBuilderFactory,
    };
    pub use txkit_core::{
        config::{ChainFamily, Coin, CoinConfig},
        types::{
            Algorithm, Authority, DeclaredKey, Discipline, Entry, KeyMaterial, SignatureLedger,
            SignerId, ThresholdPolicy, TransactionRecord, TransactionType,
        },
    };
    pub use txkit_signers::{LocalSigner, Signer};
}

// re-export the crypto crates so that downstream users do not need to pin them
pub use txkit_core::{ed25519_dalek, k256, rand};
