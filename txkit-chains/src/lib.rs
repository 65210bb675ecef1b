#![cfg_attr(docsrs, feature(doc_cfg))]
//! Transaction builders for Algorand, Stacks, Tron and EOS.
//!
//! Every builder follows the same lifecycle: set fields through validating setters, queue the
//! keys that should sign, then [`TransactionBuilder::build`] into an immutable
//! [`txkit_core::types::TransactionRecord`]. Unsigned or partially signed bytes can be handed
//! to another party who resumes them with [`TransactionBuilder::load_from_raw`] or, without
//! knowing the transaction type, with [`TransactionBuilderFactory::from_raw`].
//!
//! ```
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! use txkit_chains::{new_builder, TransactionBuilder};
//! use txkit_core::types::{Algorithm, KeyMaterial, TransactionType};
//!
//! let key = KeyMaterial::random(Algorithm::Ed25519, &mut rand::thread_rng());
//! let sender = txkit_chains::algo::key_address(&key)?;
//!
//! let mut builder = new_builder("talgo", TransactionType::Send)?;
//! builder
//!     .as_algo_transfer_mut()
//!     .expect("algorand transfer")
//!     .sender(&sender)?
//!     .fee(1000)?
//!     .first_round(1)?
//!     .last_round(100)?
//!     .genesis_id("testnet-v1.0")?
//!     .genesis_hash("SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=")?
//!     .receiver(&sender)?
//!     .amount(10_000)?;
//! builder.queue_signer(key)?;
//! let tx = builder.build().await?;
//! assert!(tx.is_fully_signed());
//! # Ok(())
//! # }
//! ```
mod error;
pub use error::BuilderError;

pub mod codec;
pub use codec::{ChainCodec, Decoded};

pub mod builder;
pub use builder::{Lifecycle, Phase, Sealed, Summary, TransactionBuilder};

pub mod algo;
pub mod eos;
pub mod stx;
pub mod trx;

mod any;
pub use any::{AnyBuilder, BuilderKind};

mod factory;
pub use factory::{builder_from_raw, new_builder, TransactionBuilderFactory};
