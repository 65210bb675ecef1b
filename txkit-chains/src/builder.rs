//! The lifecycle every chain builder implements.
//!
//! A builder accumulates fields through validating setters, optionally resumes a serialized
//! transaction, queues signers and finally builds a [`TransactionRecord`]. The bookkeeping that
//! is identical across chains (phase tracking, queued signers, the signature ledger and the
//! sign-then-commit step) lives in [`Lifecycle`], which each builder embeds.
use crate::{codec::ChainCodec, BuilderError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use txkit_core::{
    config::CoinConfig,
    types::{
        verify_signature, Algorithm, Bytes, Discipline, Entry, KeyMaterial, LedgerError,
        RecordParts, SignatureLedger, SignerId, TransactionRecord, TransactionType,
    },
};
use txkit_signers::{LocalSigner, Signer};

/// Where a builder is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing set yet
    Empty,
    /// Fields set or signers queued since the last build
    Configured,
    /// The last operation was a successful build
    Built,
}

/// The lifecycle contract shared by every chain builder.
///
/// Setters are inherent methods on the concrete builders since their fields differ per chain
/// and transaction type; they validate in isolation and return `&mut Self` for chaining.
#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    /// The network the builder targets
    fn coin(&self) -> &CoinConfig;

    /// The type of transaction this builder produces
    fn tx_type(&self) -> TransactionType;

    fn phase(&self) -> Phase;

    /// Signatures collected so far
    fn ledger(&self) -> &SignatureLedger;

    /// Identities queued for the next build
    fn pending_signers(&self) -> Vec<SignerId>;

    /// Replaces the builder state with a previously serialized transaction, restoring any
    /// signatures it carries.
    fn load_from_raw(&mut self, raw: &[u8]) -> Result<&mut Self, BuilderError>
    where
        Self: Sized;

    /// Queues a key to sign with on the next build
    fn queue_signer(&mut self, key: KeyMaterial) -> Result<&mut Self, BuilderError>
    where
        Self: Sized;

    /// Validates, signs with every queued key and emits the transaction.
    ///
    /// Fails unless the collected signatures satisfy the authorization threshold.
    async fn build(&mut self) -> Result<TransactionRecord, BuilderError>;

    /// Like [`build`](TransactionBuilder::build) but accepts a signature set below the
    /// threshold, so the transaction can be handed to the next signer.
    async fn build_partial(&mut self) -> Result<TransactionRecord, BuilderError>;
}

/// The output of [`Lifecycle::seal`]
#[derive(Clone, Debug)]
pub struct Sealed {
    pub id: String,
    pub unsigned: Bytes,
    pub broadcast: Bytes,
    ledger: SignatureLedger,
}

/// Chain specific parts of a record
#[derive(Clone, Debug, Default)]
pub struct Summary {
    pub sender: String,
    pub fee: u64,
    pub inputs: Vec<Entry>,
    pub outputs: Vec<Entry>,
    pub details: Map<String, Value>,
}

impl Sealed {
    pub fn into_record(
        self,
        tx_type: TransactionType,
        coin: &CoinConfig,
        summary: Summary,
    ) -> TransactionRecord {
        let ledger = self.ledger;
        RecordParts {
            id: self.id,
            tx_type,
            coin: coin.name.clone(),
            sender: summary.sender,
            fee: summary.fee,
            inputs: summary.inputs,
            outputs: summary.outputs,
            raw: self.unsigned,
            broadcast: self.broadcast,
            signatures: ledger.ordered().into_iter().cloned().collect(),
            signature_weight: ledger.collected_weight(),
            threshold: ledger.threshold(),
            fully_signed: ledger.is_satisfied(),
            details: summary.details,
        }
        .into()
    }
}

/// Phase, signature ledger and queued signers of one builder
#[derive(Clone)]
pub struct Lifecycle {
    config: CoinConfig,
    algorithm: Algorithm,
    phase: Phase,
    ledger: SignatureLedger,
    pending: Vec<KeyMaterial>,
    signer: Arc<dyn Signer>,
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("coin", &self.config.name)
            .field("phase", &self.phase)
            .field("ledger", &self.ledger)
            .field("pending", &self.pending_signers())
            .field("signer", &self.signer)
            .finish()
    }
}

impl Lifecycle {
    /// A lifecycle signing with [`LocalSigner`]
    pub fn new(config: CoinConfig, algorithm: Algorithm) -> Self {
        Self {
            config,
            algorithm,
            phase: Phase::Empty,
            ledger: SignatureLedger::new(),
            pending: Vec::new(),
            signer: Arc::new(LocalSigner),
        }
    }

    pub fn set_signer(&mut self, signer: Arc<dyn Signer>) {
        self.signer = signer;
    }

    pub fn config(&self) -> &CoinConfig {
        &self.config
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ledger(&self) -> &SignatureLedger {
        &self.ledger
    }

    pub fn pending(&self) -> &[KeyMaterial] {
        &self.pending
    }

    pub fn pending_signers(&self) -> Vec<SignerId> {
        self.pending.iter().map(KeyMaterial::identity).collect()
    }

    /// Records that a setter accepted a value
    pub fn touch(&mut self) {
        self.phase = Phase::Configured;
    }

    /// Binds the ledger to a discipline. Collected and queued signers must fit it.
    pub fn bind(&mut self, discipline: Discipline) -> Result<(), BuilderError> {
        let mut ledger = self.ledger.clone();
        ledger.set_discipline(discipline)?;
        let mut admitted: Vec<SignerId> = Vec::with_capacity(self.pending.len());
        for identity in self.pending_signers() {
            ledger.admit(&identity, &admitted)?;
            admitted.push(identity);
        }
        self.ledger = ledger;
        self.touch();
        Ok(())
    }

    pub fn queue(&mut self, key: KeyMaterial) -> Result<(), BuilderError> {
        let identity = key.identity();
        if !key.has_private_key() {
            return Err(BuilderError::Signing {
                signer: identity,
                reason: "key has no private component".into(),
            })
        }
        if key.algorithm() != self.algorithm {
            return Err(BuilderError::invalid(
                "signer",
                &identity,
                format!(
                    "{} requires {} keys, got {}",
                    self.config.name,
                    self.algorithm,
                    key.algorithm()
                ),
            ))
        }
        if !self.signer.supports(self.algorithm) {
            return Err(BuilderError::Signing {
                signer: identity,
                reason: format!("signer does not support {}", self.algorithm),
            })
        }
        self.ledger.admit(&identity, &self.pending_signers())?;
        debug!(signer = %identity, queued = self.pending.len() + 1, "queued signer");
        self.pending.push(key);
        self.touch();
        Ok(())
    }

    /// Replaces the ledger with signatures decoded from raw bytes and drops queued signers.
    ///
    /// Nothing changes unless the restored signatures are consistent.
    pub fn restore(
        &mut self,
        signatures: Vec<(SignerId, Bytes)>,
        discipline: Option<Discipline>,
    ) -> Result<(), BuilderError> {
        let mut ledger = SignatureLedger::with_discipline(self.ledger.discipline().clone());
        ledger.restore(signatures)?;
        if let Some(discipline) = discipline {
            ledger.set_discipline(discipline)?;
        }
        self.ledger = ledger;
        self.pending.clear();
        self.touch();
        Ok(())
    }

    /// Encodes `tx`, signs it with every queued key and aggregates the signatures.
    ///
    /// Signing happens against a copy of the ledger which replaces the builder's only once
    /// every step has succeeded, so a failed build leaves the builder untouched.
    pub async fn seal<C: ChainCodec>(
        &mut self,
        codec: &C,
        tx: &C::Transaction,
        strict: bool,
    ) -> Result<Sealed, BuilderError> {
        let unsigned = codec.encode(tx);
        let message = codec.signing_message(&unsigned);
        for entry in self.ledger.entries() {
            verify_signature(self.algorithm, &entry.signer, &message, &entry.signature).map_err(
                |_| {
                    BuilderError::InvalidConfiguration(format!(
                        "signature by {} does not cover the current fields",
                        entry.signer
                    ))
                },
            )?;
        }
        let mut ledger = self.ledger.clone();

        for key in &self.pending {
            let signer = key.identity();
            let refused =
                |reason: String| BuilderError::Signing { signer: signer.clone(), reason };
            let signature =
                self.signer.sign(&message, key).await.map_err(|e| refused(e.to_string()))?;
            verify_signature(self.algorithm, &signer, &message, &signature)
                .map_err(|e| refused(e.to_string()))?;
            ledger.append(signer, signature)?;
        }

        match ledger.check_threshold() {
            Err(LedgerError::ThresholdNotMet { .. }) if !strict => {}
            other => other?,
        }

        let broadcast = codec.aggregate(&unsigned, &ledger)?;
        let id = codec.compute_id(&unsigned);
        debug!(
            %id,
            coin = %self.config.name,
            signatures = ledger.len(),
            weight = ledger.collected_weight(),
            threshold = ledger.threshold(),
            "sealed transaction"
        );

        self.ledger = ledger.clone();
        self.pending.clear();
        self.phase = Phase::Built;
        Ok(Sealed { id, unsigned: unsigned.into(), broadcast: broadcast.into(), ledger })
    }
}

/// Reads a mandatory field, failing with [`BuilderError::MissingField`]
pub(crate) fn require<T: Clone>(value: &Option<T>, field: &'static str) -> Result<T, BuilderError> {
    value.clone().ok_or(BuilderError::MissingField(field))
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// Signs a 32-byte digest with a secp256k1 key, as `r || s || v`
    pub fn sign_prehash(key: &KeyMaterial, digest: &[u8]) -> Bytes {
        let (signature, recovery_id) =
            key.secp256k1_signing_key().unwrap().sign_prehash_recoverable(digest).unwrap();
        let mut out = signature.to_bytes().to_vec();
        out.push(recovery_id.to_byte());
        out.into()
    }

    /// Routes log output through the test harness
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    /// A signer that returns a well formed signature from the wrong key
    #[derive(Debug)]
    pub struct ForgingSigner;

    #[async_trait]
    impl Signer for ForgingSigner {
        async fn sign(
            &self,
            message: &[u8],
            key: &KeyMaterial,
        ) -> Result<Bytes, txkit_signers::SignerError> {
            let other = KeyMaterial::random(key.algorithm(), &mut rand::thread_rng());
            LocalSigner.sign(message, &other).await
        }
    }

    /// A signer that refuses every request
    #[derive(Debug)]
    pub struct RefusingSigner;

    #[async_trait]
    impl Signer for RefusingSigner {
        async fn sign(
            &self,
            _message: &[u8],
            _key: &KeyMaterial,
        ) -> Result<Bytes, txkit_signers::SignerError> {
            Err(txkit_signers::SignerError::Rejected("operator declined".into()))
        }
    }
}
