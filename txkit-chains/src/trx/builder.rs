use super::{
    address::{decode_address, encode_address, signer_address, TronAddress},
    codec::{TrxCodec, TrxContract, TrxTransaction, TRANSFER_CONTRACT, TRIGGER_SMART_CONTRACT},
};
use crate::{
    builder::{require, Lifecycle, Phase, Summary, TransactionBuilder},
    codec::{self, ChainCodec},
    BuilderError,
};
use async_trait::async_trait;
use serde_json::json;
use std::{fmt, sync::Arc};
use tracing::{debug, trace};
use txkit_core::{
    config::{CoinConfig, NetworkParams},
    types::{
        Algorithm, Authority, DeclaredKey, Discipline, Entry, KeyMaterial, SignatureLedger,
        SignatureOrder, SignerId, ThresholdPolicy, TransactionRecord, TransactionType,
    },
};
use txkit_signers::Signer;

/// The contract specific fields of one Tron transaction type
pub trait TrxKind: Clone + Default + fmt::Debug + Send + Sync + 'static {
    const TYPE: TransactionType;
    const CONTRACT_TYPE: &'static str;
    const FEE_LIMIT_REQUIRED: bool;

    fn contract(&self) -> Result<TrxContract, BuilderError>;

    fn from_contract(contract: &TrxContract) -> Option<Self>;

    fn summarize(contract: &TrxContract, coin: &str, summary: &mut Summary);
}

/// TRX transfer fields
#[derive(Clone, Debug, Default)]
pub struct Transfer {
    to: Option<TronAddress>,
    amount: Option<u64>,
}

impl TrxKind for Transfer {
    const TYPE: TransactionType = TransactionType::Send;
    const CONTRACT_TYPE: &'static str = TRANSFER_CONTRACT;
    const FEE_LIMIT_REQUIRED: bool = false;

    fn contract(&self) -> Result<TrxContract, BuilderError> {
        Ok(TrxContract::Transfer {
            to: require(&self.to, "to")?,
            amount: require(&self.amount, "amount")?,
        })
    }

    fn from_contract(contract: &TrxContract) -> Option<Self> {
        match contract {
            TrxContract::Transfer { to, amount } => {
                Some(Self { to: Some(*to), amount: Some(*amount) })
            }
            _ => None,
        }
    }

    fn summarize(contract: &TrxContract, coin: &str, summary: &mut Summary) {
        if let TrxContract::Transfer { to, amount } = contract {
            summary.inputs.push(Entry::new(summary.sender.clone(), amount.to_string(), coin));
            summary.outputs.push(Entry::new(encode_address(to), amount.to_string(), coin));
        }
    }
}

/// Smart contract call fields
#[derive(Clone, Debug, Default)]
pub struct ContractCall {
    contract: Option<TronAddress>,
    data: Option<Vec<u8>>,
    call_value: u64,
}

impl TrxKind for ContractCall {
    const TYPE: TransactionType = TransactionType::ContractCall;
    const CONTRACT_TYPE: &'static str = TRIGGER_SMART_CONTRACT;
    const FEE_LIMIT_REQUIRED: bool = true;

    fn contract(&self) -> Result<TrxContract, BuilderError> {
        Ok(TrxContract::TriggerSmartContract {
            contract: require(&self.contract, "to")?,
            data: require(&self.data, "data")?,
            call_value: self.call_value,
        })
    }

    fn from_contract(contract: &TrxContract) -> Option<Self> {
        match contract {
            TrxContract::TriggerSmartContract { contract, data, call_value } => Some(Self {
                contract: Some(*contract),
                data: Some(data.clone()),
                call_value: *call_value,
            }),
            _ => None,
        }
    }

    fn summarize(contract: &TrxContract, coin: &str, summary: &mut Summary) {
        if let TrxContract::TriggerSmartContract { contract, data, call_value } = contract {
            let value = call_value.to_string();
            summary.inputs.push(Entry::new(summary.sender.clone(), value.clone(), coin));
            summary.outputs.push(Entry::new(encode_address(contract), value, coin));
            summary.details.insert("data".into(), json!(hex::encode(data)));
        }
    }
}

/// Builds Tron transactions of kind `K`.
///
/// The expiration can be set freely until a build or a raw load fixes it. From then on it can
/// only be pushed back with [`extend_validity`](Builder::extend_validity), and only while the
/// transaction carries no signatures.
#[derive(Clone, Debug)]
pub struct Builder<K> {
    lifecycle: Lifecycle,
    default_expiration_ms: u64,
    max_expiration_ms: u64,
    fee_limit: Option<u64>,
    source: Option<TronAddress>,
    ref_block: Option<([u8; 2], [u8; 8])>,
    timestamp: Option<u64>,
    expiration: Option<u64>,
    expiration_fixed: bool,
    kind: K,
}

/// Builds TRX transfers
pub type TransferBuilder = Builder<Transfer>;

/// Builds smart contract calls
pub type ContractCallBuilder = Builder<ContractCall>;

/// The base58check account of a secp256k1 key
pub fn key_address(key: &KeyMaterial) -> Result<String, BuilderError> {
    let identity = key.identity();
    signer_address(&identity)
        .map(|address| encode_address(&address))
        .map_err(|e| BuilderError::address("key", &identity.to_string(), e))
}

fn parse_address(field: &'static str, address: &str) -> Result<TronAddress, BuilderError> {
    decode_address(address).map_err(|e| BuilderError::address(field, address, e))
}

impl<K: TrxKind> Builder<K> {
    pub fn new(config: CoinConfig) -> Result<Self, BuilderError> {
        let (default_expiration_ms, max_expiration_ms) = match config.params {
            NetworkParams::Tron { default_expiration_ms, max_expiration_ms } => {
                (default_expiration_ms, max_expiration_ms)
            }
            _ => return Err(BuilderError::UnsupportedCoin(config.name)),
        };
        Ok(Self {
            lifecycle: Lifecycle::new(config, Algorithm::Secp256k1),
            default_expiration_ms,
            max_expiration_ms,
            fee_limit: None,
            source: None,
            ref_block: None,
            timestamp: None,
            expiration: None,
            expiration_fixed: false,
            kind: K::default(),
        })
    }

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

    /// Maximum energy fee in sun the owner pays for a contract call
    pub fn fee_limit(&mut self, fee_limit: u64) -> Result<&mut Self, BuilderError> {
        if fee_limit == 0 {
            return Err(BuilderError::invalid("fee_limit", fee_limit, "must be positive"))
        }
        self.fee_limit = Some(fee_limit);
        Ok(self.accepted("fee_limit"))
    }

    /// The owner account, base58check or hex
    pub fn source(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.source = Some(parse_address("source", address)?);
        Ok(self.accepted("source"))
    }

    /// References a recent block by number and hex encoded hash
    pub fn block(&mut self, number: u64, hash: &str) -> Result<&mut Self, BuilderError> {
        let bytes = hex::decode(hash.trim_start_matches("0x"))
            .map_err(|e| BuilderError::invalid("block", hash, e))?;
        if bytes.len() != 32 {
            return Err(BuilderError::invalid("block", hash, "block hash must be 32 bytes"))
        }
        let number = number.to_be_bytes();
        let mut ref_block_bytes = [0u8; 2];
        ref_block_bytes.copy_from_slice(&number[6..8]);
        let mut ref_block_hash = [0u8; 8];
        ref_block_hash.copy_from_slice(&bytes[8..16]);
        self.ref_block = Some((ref_block_bytes, ref_block_hash));
        Ok(self.accepted("block"))
    }

    /// Creation time in milliseconds since the epoch
    pub fn timestamp(&mut self, timestamp: u64) -> Result<&mut Self, BuilderError> {
        if timestamp == 0 {
            return Err(BuilderError::invalid("timestamp", timestamp, "must be positive"))
        }
        self.timestamp = Some(timestamp);
        Ok(self.accepted("timestamp"))
    }

    /// Expiration in milliseconds since the epoch
    pub fn expiration(&mut self, expiration: u64) -> Result<&mut Self, BuilderError> {
        if self.expiration_fixed {
            return Err(BuilderError::invalid(
                "expiration",
                expiration,
                "expiration is fixed, use extend_validity",
            ))
        }
        self.expiration = Some(expiration);
        Ok(self.accepted("expiration"))
    }

    /// Pushes the expiration back by `extension_ms`
    pub fn extend_validity(&mut self, extension_ms: u64) -> Result<&mut Self, BuilderError> {
        if extension_ms == 0 {
            return Err(BuilderError::invalid("extension", extension_ms, "must be positive"))
        }
        if !self.lifecycle.ledger().is_empty() {
            return Err(BuilderError::invalid(
                "extension",
                extension_ms,
                "the transaction already carries signatures",
            ))
        }
        let current = match (self.expiration, self.timestamp) {
            (Some(expiration), _) => expiration,
            (None, Some(timestamp)) => timestamp.saturating_add(self.default_expiration_ms),
            (None, None) => return Err(BuilderError::MissingField("timestamp")),
        };
        let extended = current.checked_add(extension_ms).ok_or_else(|| {
            BuilderError::invalid("extension", extension_ms, "expiration overflows")
        })?;
        if let Some(timestamp) = self.timestamp {
            self.check_window(timestamp, extended).map_err(|_| {
                BuilderError::invalid(
                    "extension",
                    extension_ms,
                    format!(
                        "expiration may be at most {} ms after the timestamp",
                        self.max_expiration_ms
                    ),
                )
            })?;
        }
        self.expiration = Some(extended);
        Ok(self.accepted("expiration"))
    }

    /// Lets the given weighted keys approve the transaction once their weights reach
    /// `threshold`. Keys are hex encoded public keys.
    pub fn permission(
        &mut self,
        threshold: u32,
        keys: &[(&str, u32)],
    ) -> Result<&mut Self, BuilderError> {
        let keys = keys
            .iter()
            .map(|(key, weight)| {
                KeyMaterial::from_public_hex(Algorithm::Secp256k1, key)
                    .map(|k| DeclaredKey { signer: k.identity(), weight: *weight })
                    .map_err(|e| BuilderError::invalid("keys", key, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let authority = Authority::new(threshold, keys)?;
        self.lifecycle.bind(Discipline::Threshold {
            authority,
            order: SignatureOrder::Insertion,
            policy: ThresholdPolicy::AtLeast,
        })?;
        Ok(self.accepted("permission"))
    }

    fn check_window(&self, timestamp: u64, expiration: u64) -> Result<(), BuilderError> {
        if expiration <= timestamp {
            return Err(BuilderError::invalid(
                "expiration",
                expiration,
                format!("must be after the timestamp {timestamp}"),
            ))
        }
        if expiration - timestamp > self.max_expiration_ms {
            return Err(BuilderError::invalid(
                "expiration",
                expiration,
                format!("may be at most {} ms after the timestamp", self.max_expiration_ms),
            ))
        }
        Ok(())
    }

    fn transaction(&self) -> Result<TrxTransaction, BuilderError> {
        let fee_limit = if K::FEE_LIMIT_REQUIRED {
            Some(require(&self.fee_limit, "fee_limit")?)
        } else {
            self.fee_limit
        };
        let owner = require(&self.source, "source")?;
        let (ref_block_bytes, ref_block_hash) = require(&self.ref_block, "block")?;
        let timestamp = require(&self.timestamp, "timestamp")?;
        let contract = self.kind.contract()?;
        let expiration =
            self.expiration.unwrap_or_else(|| timestamp.saturating_add(self.default_expiration_ms));
        self.check_window(timestamp, expiration)?;

        Ok(TrxTransaction {
            ref_block_bytes,
            ref_block_hash,
            expiration,
            timestamp,
            fee_limit,
            owner,
            contract,
        })
    }

    fn summary(&self, tx: &TrxTransaction) -> Summary {
        let coin = &self.lifecycle.config().name;
        let mut summary = Summary {
            sender: encode_address(&tx.owner),
            fee: tx.fee_limit.unwrap_or_default(),
            ..Default::default()
        };
        K::summarize(&tx.contract, coin, &mut summary);
        let details = &mut summary.details;
        details.insert("contractType".into(), json!(tx.contract.contract_type()));
        details.insert("refBlockBytes".into(), json!(hex::encode(tx.ref_block_bytes)));
        details.insert("refBlockHash".into(), json!(hex::encode(tx.ref_block_hash)));
        details.insert("timestamp".into(), json!(tx.timestamp));
        details.insert("expiration".into(), json!(tx.expiration));
        summary
    }

    async fn build_with(&mut self, strict: bool) -> Result<TransactionRecord, BuilderError> {
        debug!(coin = %self.lifecycle.config().name, tx_type = %K::TYPE, strict, "building");
        let tx = self.transaction()?;
        let sealed = self.lifecycle.seal(&TrxCodec, &tx, strict).await?;
        self.expiration = Some(tx.expiration);
        self.expiration_fixed = true;
        Ok(sealed.into_record(K::TYPE, self.lifecycle.config(), self.summary(&tx)))
    }
}

impl Builder<Transfer> {
    pub fn to(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.kind.to = Some(parse_address("to", address)?);
        Ok(self.accepted("to"))
    }

    /// Sets the amount in sun
    pub fn amount(&mut self, amount: u64) -> Result<&mut Self, BuilderError> {
        if amount == 0 {
            return Err(BuilderError::invalid("amount", amount, "must be positive"))
        }
        self.kind.amount = Some(amount);
        Ok(self.accepted("amount"))
    }
}

impl Builder<ContractCall> {
    /// The contract to call
    pub fn to(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.kind.contract = Some(parse_address("to", address)?);
        Ok(self.accepted("to"))
    }

    /// ABI encoded call data as hex
    pub fn data(&mut self, data: &str) -> Result<&mut Self, BuilderError> {
        let bytes = hex::decode(data.trim_start_matches("0x"))
            .map_err(|e| BuilderError::invalid("data", data, e))?;
        if bytes.is_empty() {
            return Err(BuilderError::invalid("data", data, "must not be empty"))
        }
        self.kind.data = Some(bytes);
        Ok(self.accepted("data"))
    }

    /// TRX in sun sent along with the call
    pub fn call_value(&mut self, value: u64) -> Result<&mut Self, BuilderError> {
        self.kind.call_value = value;
        Ok(self.accepted("call_value"))
    }
}

#[async_trait]
impl<K: TrxKind> TransactionBuilder for Builder<K> {
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
        if discriminator != K::CONTRACT_TYPE {
            return Err(BuilderError::UnrecognizedTransactionType(discriminator))
        }
        let decoded = TrxCodec.decode(raw)?;
        let tx = decoded.transaction;
        let kind = K::from_contract(&tx.contract)
            .ok_or_else(|| BuilderError::UnrecognizedTransactionType(discriminator.clone()))?;
        let restored = decoded.signatures.len();
        self.lifecycle.restore(decoded.signatures, decoded.discipline)?;

        self.fee_limit = tx.fee_limit;
        self.source = Some(tx.owner);
        self.ref_block = Some((tx.ref_block_bytes, tx.ref_block_hash));
        self.timestamp = Some(tx.timestamp);
        self.expiration = Some(tx.expiration);
        self.expiration_fixed = true;
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

#[cfg(test)]
mod tests {
    use super::*;
    use txkit_core::config::Coin;

    const FROM_PK: &str = "EB94159C7EBC2959720B9F0321849F792B60FCBC7BFA4A9115F7E7A72B9ACE6F";
    const CUSTODIAN_PK: &str = "280DA606E22BB0F857753D74B2450D80BBE0B03E70F15873180A932D689CEDD8";
    const MERCHANT_PK: &str = "C87C22691E6423F48CFA2D2C5F60EB946E0DA6F31AEA3AA414D01B7670AA1092";
    const FROM: &str = "TGeT2sfMYcjx3ra2HhQUvMyBcVhjBc1Lbk";
    const CUSTODIAN: &str = "TVHsEa7nqPebk8fU5yc9ctf8n5X7DZKxkb";
    const FACTORY: &str = "TRHsfoMda4ADiSUPnJ9XL3PhyNw6X14UMi";
    const BLOCK_NUMBER: u64 = 51407;
    const BLOCK_HASH: &str = "0000000000badb0d89177fd84c5d9196021cc1085b9e689b3e9a6195cac8bcae";
    const MINT_CONFIRM_DATA: &str =
        "2bf90baa1273140c3e1b5756b242cc88cd7c4dd8a61bf85cb5c1dd5f50ba61e066b53a15";
    const TIMESTAMP: u64 = 1612964127000;
    const EXPIRATION: u64 = 1612964187000;

    fn key(private: &str) -> KeyMaterial {
        KeyMaterial::from_private_hex(Algorithm::Secp256k1, private).unwrap()
    }

    fn contract_call() -> ContractCallBuilder {
        let mut builder = ContractCallBuilder::new(Coin::Ttrx.config()).unwrap();
        builder
            .fee_limit(10000)
            .unwrap()
            .source(CUSTODIAN)
            .unwrap()
            .block(BLOCK_NUMBER, BLOCK_HASH)
            .unwrap()
            .timestamp(TIMESTAMP)
            .unwrap()
            .to(FACTORY)
            .unwrap()
            .data(MINT_CONFIRM_DATA)
            .unwrap();
        builder
    }

    #[tokio::test]
    async fn contract_call_with_default_expiration() {
        let mut builder = contract_call();
        builder.queue_signer(key(CUSTODIAN_PK)).unwrap();
        let tx = builder.build().await.unwrap();

        assert!(tx.is_fully_signed());
        assert_eq!(tx.tx_type(), TransactionType::ContractCall);
        assert_eq!(tx.fee(), 10000);
        assert_eq!(tx.id(), TrxCodec.compute_id(tx.raw_bytes()));

        let explain = tx.to_explain_json();
        assert_eq!(explain["from"], CUSTODIAN);
        assert_eq!(explain["to"], FACTORY);
        assert_eq!(explain["amount"], "0");
        assert_eq!(explain["expiration"], EXPIRATION);
        assert_eq!(explain["refBlockBytes"], "c8cf");
        assert_eq!(explain["refBlockHash"], "89177fd84c5d9196");
        assert_eq!(explain["data"], MINT_CONFIRM_DATA);
    }

    #[tokio::test]
    async fn fee_limit_is_mandatory_for_calls() {
        let mut builder = ContractCallBuilder::new(Coin::Ttrx.config()).unwrap();
        builder.source(CUSTODIAN).unwrap();
        assert!(matches!(builder.build().await, Err(BuilderError::MissingField("fee_limit"))));
        builder.fee_limit(10000).unwrap();
        assert!(matches!(builder.build().await, Err(BuilderError::MissingField("block"))));
        assert!(matches!(builder.data("zz"), Err(BuilderError::Validation { field: "data", .. })));
        assert!(matches!(builder.block(1, "00ff"), Err(BuilderError::Validation { .. })));
    }

    #[tokio::test]
    async fn transfer_without_fee_limit() {
        let mut builder = TransferBuilder::new(Coin::Ttrx.config()).unwrap();
        builder
            .source(FROM)
            .unwrap()
            .block(BLOCK_NUMBER, BLOCK_HASH)
            .unwrap()
            .timestamp(TIMESTAMP)
            .unwrap()
            .to(CUSTODIAN)
            .unwrap()
            .amount(1_000_000)
            .unwrap()
            .queue_signer(key(FROM_PK))
            .unwrap();
        let tx = builder.build().await.unwrap();
        assert_eq!(tx.fee(), 0);
        assert_eq!(tx.outputs()[0].address, CUSTODIAN);
        assert_eq!(tx.outputs()[0].value, "1000000");
    }

    #[tokio::test]
    async fn expiration_is_fixed_after_build() {
        let mut builder = contract_call();
        builder.expiration(TIMESTAMP).unwrap();
        assert!(matches!(
            builder.build().await,
            Err(BuilderError::Validation { field: "expiration", .. })
        ));
        builder.expiration(TIMESTAMP + 24 * 3_600_000 + 1).unwrap();
        assert!(matches!(
            builder.build().await,
            Err(BuilderError::Validation { field: "expiration", .. })
        ));

        builder.expiration(EXPIRATION).unwrap();
        let first = builder.build_partial().await.unwrap();
        assert!(matches!(
            builder.expiration(EXPIRATION + 1000),
            Err(BuilderError::Validation { field: "expiration", .. })
        ));
        builder.extend_validity(60_000).unwrap();
        let extended = builder.build_partial().await.unwrap();
        assert_ne!(first.id(), extended.id());
        assert_eq!(extended.to_explain_json()["expiration"], EXPIRATION + 60_000);
        assert!(matches!(
            builder.extend_validity(24 * 3_600_000),
            Err(BuilderError::Validation { field: "extension", .. })
        ));

        let mut resumed = ContractCallBuilder::new(Coin::Ttrx.config()).unwrap();
        resumed.load_from_raw(&first.to_broadcast_bytes()).unwrap();
        assert!(resumed.expiration(EXPIRATION).is_err());

        resumed.queue_signer(key(CUSTODIAN_PK)).unwrap();
        resumed.build().await.unwrap();
        assert!(matches!(
            resumed.extend_validity(1000),
            Err(BuilderError::Validation { field: "extension", .. })
        ));
    }

    #[tokio::test]
    async fn changed_fields_invalidate_collected_signatures() {
        let mut builder = contract_call();
        builder.queue_signer(key(CUSTODIAN_PK)).unwrap();
        builder.build().await.unwrap();
        builder.call_value(5).unwrap();
        assert!(matches!(builder.build().await, Err(BuilderError::InvalidConfiguration(_))));
        builder.call_value(0).unwrap();
        assert!(builder.build().await.unwrap().is_fully_signed());
    }

    #[tokio::test]
    async fn weighted_permission_keeps_insertion_order() {
        let keys = [key(FROM_PK), key(CUSTODIAN_PK), key(MERCHANT_PK)];
        let public: Vec<String> = keys.iter().map(|k| hex::encode(k.public_key())).collect();
        let declared = [(public[0].as_str(), 1), (public[1].as_str(), 1), (public[2].as_str(), 2)];

        let mut builder = contract_call();
        builder.permission(2, &declared).unwrap();
        builder.queue_signer(keys[1].clone()).unwrap();
        let partial = builder.build_partial().await.unwrap();
        assert!(!partial.is_fully_signed());
        assert_eq!(partial.threshold(), 2);

        let mut resumed = ContractCallBuilder::new(Coin::Ttrx.config()).unwrap();
        resumed.load_from_raw(&partial.to_broadcast_bytes()).unwrap();
        resumed.queue_signer(keys[0].clone()).unwrap();
        let full = resumed.build().await.unwrap();
        assert!(full.is_fully_signed());
        let order: Vec<SignerId> = full.signatures().iter().map(|e| e.signer.clone()).collect();
        assert_eq!(order, vec![keys[1].identity(), keys[0].identity()]);
        assert_eq!(full.id(), partial.id());

        // the merchant alone carries enough weight
        let mut merchant = contract_call();
        merchant.permission(2, &declared).unwrap();
        merchant.queue_signer(keys[2].clone()).unwrap();
        assert_eq!(merchant.build().await.unwrap().signature_weight(), 2);
    }

    #[tokio::test]
    async fn rejects_transfer_bytes_in_call_builder() {
        let mut transfer = TransferBuilder::new(Coin::Ttrx.config()).unwrap();
        transfer
            .source(FROM)
            .unwrap()
            .block(BLOCK_NUMBER, BLOCK_HASH)
            .unwrap()
            .timestamp(TIMESTAMP)
            .unwrap()
            .to(CUSTODIAN)
            .unwrap()
            .amount(1)
            .unwrap();
        let tx = transfer.build_partial().await.unwrap();

        let mut call = ContractCallBuilder::new(Coin::Ttrx.config()).unwrap();
        assert!(matches!(
            call.load_from_raw(tx.raw_bytes()),
            Err(BuilderError::UnrecognizedTransactionType(t)) if t == TRANSFER_CONTRACT
        ));
        assert_eq!(call.phase(), Phase::Empty);
    }

    #[test]
    fn malformed_permission_keys_name_their_field() {
        let public = hex::encode(key(FROM_PK).public_key());
        let mut builder = TransferBuilder::new(Coin::Ttrx.config()).unwrap();
        let err = builder.permission(1, &[(public.as_str(), 1), ("0401zz", 1)]).unwrap_err();
        assert!(matches!(err, BuilderError::Validation { field: "keys", .. }));
        assert!(err.to_string().contains("0401zz"));
        assert_eq!(builder.phase(), Phase::Empty);
    }
}
