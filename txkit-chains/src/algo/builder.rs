use super::{
    address::{decode_address, encode_address, MULTISIG_VERSION},
    codec::{authority_account, AlgoCodec, AlgoPayload, AlgoTransaction},
};
use crate::{
    builder::{require, Lifecycle, Phase, Summary, TransactionBuilder},
    codec::{self, ChainCodec},
    BuilderError,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::{fmt, sync::Arc};
use tracing::{debug, trace};
use txkit_core::{
    config::{ChainFamily, Coin, CoinConfig, NetworkParams},
    types::{
        Algorithm, Authority, Discipline, Entry, KeyMaterial, SignatureLedger, SignatureOrder,
        SignerId, ThresholdPolicy, TransactionRecord, TransactionType,
    },
};
use txkit_signers::Signer;

/// Maximum note size in bytes
pub const MAX_NOTE_LEN: usize = 1024;

/// The fields specific to one Algorand transaction type
pub trait AlgoKind: Clone + Default + fmt::Debug + Send + Sync + 'static {
    const TYPE: TransactionType;
    const DISCRIMINATOR: &'static str;

    /// Assembles the type specific payload, failing on the first missing field and then on
    /// the type's invariants
    fn payload(&self) -> Result<AlgoPayload, BuilderError>;

    fn from_payload(payload: &AlgoPayload) -> Option<Self>;

    fn summarize(payload: &AlgoPayload, coin: &str, summary: &mut Summary);
}

/// Payment fields
#[derive(Clone, Debug, Default)]
pub struct Transfer {
    receiver: Option<[u8; 32]>,
    amount: Option<u64>,
    close_remainder_to: Option<[u8; 32]>,
}

impl AlgoKind for Transfer {
    const TYPE: TransactionType = TransactionType::Send;
    const DISCRIMINATOR: &'static str = "pay";

    fn payload(&self) -> Result<AlgoPayload, BuilderError> {
        Ok(AlgoPayload::Payment {
            receiver: require(&self.receiver, "receiver")?,
            amount: require(&self.amount, "amount")?,
            close_remainder_to: self.close_remainder_to,
        })
    }

    fn from_payload(payload: &AlgoPayload) -> Option<Self> {
        match payload {
            AlgoPayload::Payment { receiver, amount, close_remainder_to } => Some(Self {
                receiver: Some(*receiver),
                amount: Some(*amount),
                close_remainder_to: *close_remainder_to,
            }),
            _ => None,
        }
    }

    fn summarize(payload: &AlgoPayload, coin: &str, summary: &mut Summary) {
        if let AlgoPayload::Payment { receiver, amount, close_remainder_to } = payload {
            summary.inputs.push(Entry::new(summary.sender.clone(), amount.to_string(), coin));
            summary.outputs.push(Entry::new(encode_address(receiver), amount.to_string(), coin));
            if let Some(close) = close_remainder_to {
                summary.details.insert("closeRemainderTo".into(), json!(encode_address(close)));
            }
        }
    }
}

/// Online key registration fields
#[derive(Clone, Debug, Default)]
pub struct KeyRegistration {
    vote_key: Option<[u8; 32]>,
    selection_key: Option<[u8; 32]>,
    vote_first: Option<u64>,
    vote_last: Option<u64>,
    vote_key_dilution: Option<u64>,
}

impl AlgoKind for KeyRegistration {
    const TYPE: TransactionType = TransactionType::KeyRegistration;
    const DISCRIMINATOR: &'static str = "keyreg";

    fn payload(&self) -> Result<AlgoPayload, BuilderError> {
        let vote_key = require(&self.vote_key, "vote_key")?;
        let selection_key = require(&self.selection_key, "selection_key")?;
        let vote_first = require(&self.vote_first, "vote_first")?;
        let vote_last = require(&self.vote_last, "vote_last")?;
        let vote_key_dilution = require(&self.vote_key_dilution, "vote_key_dilution")?;
        if vote_first > vote_last {
            return Err(BuilderError::invalid(
                "vote_last",
                vote_last,
                format!("must not precede vote_first {vote_first}"),
            ))
        }
        Ok(AlgoPayload::KeyRegistration {
            vote_key,
            selection_key,
            vote_first,
            vote_last,
            vote_key_dilution,
        })
    }

    fn from_payload(payload: &AlgoPayload) -> Option<Self> {
        match payload {
            AlgoPayload::KeyRegistration {
                vote_key,
                selection_key,
                vote_first,
                vote_last,
                vote_key_dilution,
            } => Some(Self {
                vote_key: Some(*vote_key),
                selection_key: Some(*selection_key),
                vote_first: Some(*vote_first),
                vote_last: Some(*vote_last),
                vote_key_dilution: Some(*vote_key_dilution),
            }),
            _ => None,
        }
    }

    fn summarize(payload: &AlgoPayload, _coin: &str, summary: &mut Summary) {
        if let AlgoPayload::KeyRegistration {
            vote_key,
            selection_key,
            vote_first,
            vote_last,
            vote_key_dilution,
        } = payload
        {
            let details = &mut summary.details;
            details.insert("voteKey".into(), json!(STANDARD.encode(vote_key)));
            details.insert("selectionKey".into(), json!(STANDARD.encode(selection_key)));
            details.insert("voteFirst".into(), json!(vote_first));
            details.insert("voteLast".into(), json!(vote_last));
            details.insert("voteKeyDilution".into(), json!(vote_key_dilution));
        }
    }
}

/// Builds Algorand transactions of kind `K`.
///
/// ```
/// # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
/// use txkit_chains::{algo::TransferBuilder, TransactionBuilder};
/// use txkit_core::{config::Coin, types::{Algorithm, KeyMaterial}};
///
/// let key = KeyMaterial::random(Algorithm::Ed25519, &mut rand::thread_rng());
/// let sender = txkit_chains::algo::key_address(&key)?;
///
/// let mut builder = TransferBuilder::new(Coin::Talgo.config())?;
/// builder
///     .fee(1000)?
///     .sender(&sender)?
///     .first_round(1)?
///     .last_round(1000)?
///     .testnet()
///     .receiver(&sender)?
///     .amount(10_000)?
///     .queue_signer(key)?;
/// let tx = builder.build().await?;
/// assert!(tx.is_fully_signed());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Builder<K> {
    lifecycle: Lifecycle,
    fee: Option<u64>,
    sender: Option<[u8; 32]>,
    first_round: Option<u64>,
    last_round: Option<u64>,
    genesis_id: Option<String>,
    genesis_hash: Option<[u8; 32]>,
    note: Vec<u8>,
    lease: Option<[u8; 32]>,
    rekey_to: Option<[u8; 32]>,
    kind: K,
}

/// Builds payments
pub type TransferBuilder = Builder<Transfer>;

/// Builds online key registrations
pub type KeyRegistrationBuilder = Builder<KeyRegistration>;

/// The address an ed25519 key signs for
pub fn key_address(key: &KeyMaterial) -> Result<String, BuilderError> {
    let public: [u8; 32] = key.public_key().as_ref().try_into().map_err(|_| {
        BuilderError::invalid("key", key.identity(), "not an ed25519 public key")
    })?;
    Ok(encode_address(&public))
}

fn parse_address(field: &'static str, address: &str) -> Result<[u8; 32], BuilderError> {
    decode_address(address).map_err(|e| BuilderError::address(field, address, e))
}

fn parse_key32(field: &'static str, value: &str) -> Result<[u8; 32], BuilderError> {
    let bytes = STANDARD.decode(value).map_err(|e| BuilderError::invalid(field, value, e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| {
            BuilderError::invalid(field, value, format!("expected 32 bytes, got {}", b.len()))
        })
}

impl<K: AlgoKind> Builder<K> {
    pub fn new(config: CoinConfig) -> Result<Self, BuilderError> {
        if config.family != ChainFamily::Algorand {
            return Err(BuilderError::UnsupportedCoin(config.name))
        }
        Ok(Self {
            lifecycle: Lifecycle::new(config, Algorithm::Ed25519),
            fee: None,
            sender: None,
            first_round: None,
            last_round: None,
            genesis_id: None,
            genesis_hash: None,
            note: Vec::new(),
            lease: None,
            rekey_to: None,
            kind: K::default(),
        })
    }

    /// Routes signing through `signer` instead of the local signer
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.lifecycle.set_signer(signer);
        self
    }

    fn accepted(&mut self, field: &'static str) -> &mut Self {
        trace!(field, "accepted field");
        self.lifecycle.touch();
        self
    }

    fn check_fee(&self, fee: u64) -> Result<(), BuilderError> {
        let min = self.lifecycle.config().min_fee;
        if fee < min {
            return Err(BuilderError::invalid("fee", fee, format!("below the minimum of {min}")))
        }
        Ok(())
    }

    /// Sets the fee in microalgos
    pub fn fee(&mut self, fee: u64) -> Result<&mut Self, BuilderError> {
        self.check_fee(fee)?;
        self.fee = Some(fee);
        Ok(self.accepted("fee"))
    }

    pub fn sender(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.sender = Some(parse_address("sender", address)?);
        Ok(self.accepted("sender"))
    }

    pub fn first_round(&mut self, round: u64) -> Result<&mut Self, BuilderError> {
        self.first_round = Some(round);
        Ok(self.accepted("first_round"))
    }

    pub fn last_round(&mut self, round: u64) -> Result<&mut Self, BuilderError> {
        self.last_round = Some(round);
        Ok(self.accepted("last_round"))
    }

    pub fn genesis_id(&mut self, id: &str) -> Result<&mut Self, BuilderError> {
        if id.is_empty() {
            return Err(BuilderError::invalid("genesis_id", id, "must not be empty"))
        }
        self.genesis_id = Some(id.to_string());
        Ok(self.accepted("genesis_id"))
    }

    /// Sets the base64 encoded genesis hash
    pub fn genesis_hash(&mut self, hash: &str) -> Result<&mut Self, BuilderError> {
        self.genesis_hash = Some(parse_key32("genesis_hash", hash)?);
        Ok(self.accepted("genesis_hash"))
    }

    fn network(&mut self, coin: Coin) -> &mut Self {
        if let NetworkParams::Algorand { genesis_id, genesis_hash } = coin.config().params {
            if let Ok(hash) = parse_key32("genesis_hash", &genesis_hash) {
                self.genesis_id = Some(genesis_id);
                self.genesis_hash = Some(hash);
            }
        }
        self.accepted("genesis")
    }

    /// Fills the genesis id and hash of mainnet
    pub fn mainnet(&mut self) -> &mut Self {
        self.network(Coin::Algo)
    }

    /// Fills the genesis id and hash of testnet
    pub fn testnet(&mut self) -> &mut Self {
        self.network(Coin::Talgo)
    }

    pub fn note(&mut self, note: &[u8]) -> Result<&mut Self, BuilderError> {
        if note.len() > MAX_NOTE_LEN {
            return Err(BuilderError::invalid(
                "note",
                format!("{} bytes", note.len()),
                format!("exceeds {MAX_NOTE_LEN} bytes"),
            ))
        }
        self.note = note.to_vec();
        Ok(self.accepted("note"))
    }

    pub fn lease(&mut self, lease: &[u8]) -> Result<&mut Self, BuilderError> {
        let lease: [u8; 32] = lease
            .try_into()
            .map_err(|_| BuilderError::invalid("lease", hex::encode(lease), "must be 32 bytes"))?;
        self.lease = Some(lease);
        Ok(self.accepted("lease"))
    }

    pub fn rekey_to(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.rekey_to = Some(parse_address("rekey_to", address)?);
        Ok(self.accepted("rekey_to"))
    }

    /// Declares a `threshold`-of-N multisig over the given addresses. The sender must be the
    /// resulting multisig account.
    pub fn multisig(
        &mut self,
        version: u8,
        threshold: u32,
        addresses: &[&str],
    ) -> Result<&mut Self, BuilderError> {
        if version != MULTISIG_VERSION {
            return Err(BuilderError::invalid("multisig version", version, "only version 1 exists"))
        }
        if threshold > u8::MAX as u32 {
            return Err(BuilderError::invalid("threshold", threshold, "must fit in one byte"))
        }
        let mut declared = Vec::with_capacity(addresses.len());
        for address in addresses {
            let key = parse_address("multisig address", address)?;
            declared.push(SignerId::from_public_key(Algorithm::Ed25519, &key)?);
        }
        let authority = Authority::unweighted(threshold, declared)?;
        self.lifecycle.bind(Discipline::Threshold {
            authority,
            order: SignatureOrder::Declared,
            policy: ThresholdPolicy::AtLeast,
        })?;
        Ok(self.accepted("multisig"))
    }

    /// The multisig account address of the declared authority, if any
    pub fn multisig_address(&self) -> Option<String> {
        match self.lifecycle.ledger().discipline() {
            Discipline::Threshold { authority, .. } => {
                Some(encode_address(&authority_account(authority)))
            }
            Discipline::SingleKey => None,
        }
    }

    fn transaction(&self) -> Result<AlgoTransaction, BuilderError> {
        let fee = require(&self.fee, "fee")?;
        let sender = require(&self.sender, "sender")?;
        let first_round = require(&self.first_round, "first_round")?;
        let last_round = require(&self.last_round, "last_round")?;
        let genesis_id = require(&self.genesis_id, "genesis_id")?;
        let genesis_hash = require(&self.genesis_hash, "genesis_hash")?;
        let payload = self.kind.payload()?;

        self.check_fee(fee)?;
        if last_round < first_round {
            return Err(BuilderError::invalid(
                "last_round",
                last_round,
                format!("must not precede first_round {first_round}"),
            ))
        }
        if let Discipline::Threshold { authority, .. } = self.lifecycle.ledger().discipline() {
            let account = authority_account(authority);
            if account != sender {
                return Err(BuilderError::InvalidConfiguration(format!(
                    "sender {} is not the multisig account {}",
                    encode_address(&sender),
                    encode_address(&account)
                )))
            }
        }

        Ok(AlgoTransaction {
            fee,
            first_round,
            last_round,
            genesis_id,
            genesis_hash,
            sender,
            note: self.note.clone(),
            lease: self.lease,
            rekey_to: self.rekey_to,
            payload,
        })
    }

    fn summary(&self, tx: &AlgoTransaction) -> Summary {
        let coin = &self.lifecycle.config().name;
        let mut summary =
            Summary { sender: encode_address(&tx.sender), fee: tx.fee, ..Default::default() };
        K::summarize(&tx.payload, coin, &mut summary);
        let details = &mut summary.details;
        details.insert("firstRound".into(), json!(tx.first_round));
        details.insert("lastRound".into(), json!(tx.last_round));
        details.insert("genesisId".into(), json!(tx.genesis_id));
        if !tx.note.is_empty() {
            details.insert("note".into(), json!(String::from_utf8_lossy(&tx.note)));
        }
        if let Some(rekey_to) = &tx.rekey_to {
            details.insert("rekeyTo".into(), json!(encode_address(rekey_to)));
        }
        summary
    }

    async fn build_with(&mut self, strict: bool) -> Result<TransactionRecord, BuilderError> {
        debug!(coin = %self.lifecycle.config().name, tx_type = %K::TYPE, strict, "building");
        let tx = self.transaction()?;
        let sealed = self.lifecycle.seal(&AlgoCodec, &tx, strict).await?;
        Ok(sealed.into_record(K::TYPE, self.lifecycle.config(), self.summary(&tx)))
    }
}

impl Builder<Transfer> {
    pub fn receiver(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.kind.receiver = Some(parse_address("receiver", address)?);
        Ok(self.accepted("receiver"))
    }

    /// Sets the amount in microalgos
    pub fn amount(&mut self, amount: u64) -> Result<&mut Self, BuilderError> {
        self.kind.amount = Some(amount);
        Ok(self.accepted("amount"))
    }

    /// Closes the sender account, sending the remaining balance to `address`
    pub fn close_remainder_to(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.kind.close_remainder_to = Some(parse_address("close_remainder_to", address)?);
        Ok(self.accepted("close_remainder_to"))
    }
}

impl Builder<KeyRegistration> {
    /// Sets the base64 encoded participation vote key
    pub fn vote_key(&mut self, key: &str) -> Result<&mut Self, BuilderError> {
        self.kind.vote_key = Some(parse_key32("vote_key", key)?);
        Ok(self.accepted("vote_key"))
    }

    /// Sets the base64 encoded VRF selection key
    pub fn selection_key(&mut self, key: &str) -> Result<&mut Self, BuilderError> {
        self.kind.selection_key = Some(parse_key32("selection_key", key)?);
        Ok(self.accepted("selection_key"))
    }

    pub fn vote_first(&mut self, round: u64) -> Result<&mut Self, BuilderError> {
        self.kind.vote_first = Some(round);
        Ok(self.accepted("vote_first"))
    }

    pub fn vote_last(&mut self, round: u64) -> Result<&mut Self, BuilderError> {
        self.kind.vote_last = Some(round);
        Ok(self.accepted("vote_last"))
    }

    pub fn vote_key_dilution(&mut self, dilution: u64) -> Result<&mut Self, BuilderError> {
        if dilution == 0 {
            return Err(BuilderError::invalid("vote_key_dilution", dilution, "must be positive"))
        }
        self.kind.vote_key_dilution = Some(dilution);
        Ok(self.accepted("vote_key_dilution"))
    }
}

#[async_trait]
impl<K: AlgoKind> TransactionBuilder for Builder<K> {
    fn coin(&self) -> &CoinConfig {
        self.lifecycle.config()
    }

    fn tx_type(&self) -> TransactionType {
        K::TYPE
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    fn ledger(&self) -> &SignatureLedger {
        self.lifecycle.ledger()
    }

    fn pending_signers(&self) -> Vec<SignerId> {
        self.lifecycle.pending_signers()
    }

    fn load_from_raw(&mut self, raw: &[u8]) -> Result<&mut Self, BuilderError> {
        let discriminator = codec::discriminator(raw)?;
        if discriminator != K::DISCRIMINATOR {
            return Err(BuilderError::UnrecognizedTransactionType(discriminator))
        }
        let decoded = AlgoCodec.decode(raw)?;
        let tx = decoded.transaction;
        let kind = K::from_payload(&tx.payload)
            .ok_or_else(|| BuilderError::UnrecognizedTransactionType(discriminator.clone()))?;
        let restored = decoded.signatures.len();
        self.lifecycle.restore(decoded.signatures, decoded.discipline)?;

        self.fee = Some(tx.fee);
        self.sender = Some(tx.sender);
        self.first_round = Some(tx.first_round);
        self.last_round = Some(tx.last_round);
        self.genesis_id = Some(tx.genesis_id);
        self.genesis_hash = Some(tx.genesis_hash);
        self.note = tx.note;
        self.lease = tx.lease;
        self.rekey_to = tx.rekey_to;
        self.kind = kind;
        debug!(%discriminator, restored, "loaded raw transaction");
        Ok(self)
    }

    fn queue_signer(&mut self, key: KeyMaterial) -> Result<&mut Self, BuilderError> {
        self.lifecycle.queue(key)?;
        Ok(self)
    }

    async fn build(&mut self) -> Result<TransactionRecord, BuilderError> {
        self.build_with(true).await
    }

    async fn build_partial(&mut self) -> Result<TransactionRecord, BuilderError> {
        self.build_with(false).await
    }
}
