use super::{
    address::{StacksAddress, MAX_MULTISIG_KEYS},
    codec::{HashMode, StxCodec, StxTransaction, MAX_MEMO_LEN, TOKEN_TRANSFER},
};
use crate::{
    builder::{require, Lifecycle, Phase, Summary, TransactionBuilder},
    codec::{self, ChainCodec},
    BuilderError,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, trace};
use txkit_core::{
    config::{CoinConfig, NetworkParams},
    types::{
        Algorithm, Authority, Discipline, Entry, KeyMaterial, SignatureLedger, SignatureOrder,
        SignerId, ThresholdPolicy, TransactionRecord, TransactionType,
    },
};
use txkit_signers::Signer;

#[derive(Clone, Copy, Debug)]
struct Network {
    chain_id: u32,
    transaction_version: u8,
    single_sig_version: u8,
    multisig_version: u8,
}

/// Builds STX token transfers from a single key or a P2SH multisig.
#[derive(Clone, Debug)]
pub struct TransferBuilder {
    lifecycle: Lifecycle,
    network: Network,
    fee: Option<u64>,
    nonce: Option<u64>,
    source: Option<StacksAddress>,
    to: Option<StacksAddress>,
    amount: Option<u64>,
    memo: Vec<u8>,
}

/// The c32check address of a secp256k1 key on the given network
pub fn key_address(config: &CoinConfig, key: &KeyMaterial) -> Result<String, BuilderError> {
    match &config.params {
        NetworkParams::Stacks { single_sig_version, .. } => {
            StacksAddress::from_public_key(*single_sig_version, &key.identity())
                .encode()
                .map_err(|e| BuilderError::address("key", &key.identity().to_string(), e))
        }
        _ => Err(BuilderError::UnsupportedCoin(config.name.clone())),
    }
}

fn render(address: &StacksAddress) -> Result<String, BuilderError> {
    address.encode().map_err(|e| {
        BuilderError::InvalidConfiguration(format!("cannot encode address {address:?}: {e}"))
    })
}

impl TransferBuilder {
    pub fn new(config: CoinConfig) -> Result<Self, BuilderError> {
        let network = match config.params {
            NetworkParams::Stacks {
                chain_id,
                transaction_version,
                single_sig_version,
                multisig_version,
            } => Network { chain_id, transaction_version, single_sig_version, multisig_version },
            _ => return Err(BuilderError::UnsupportedCoin(config.name)),
        };
        Ok(Self {
            lifecycle: Lifecycle::new(config, Algorithm::Secp256k1),
            network,
            fee: None,
            nonce: None,
            source: None,
            to: None,
            amount: None,
            memo: Vec::new(),
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

    fn check_fee(&self, fee: u64) -> Result<(), BuilderError> {
        let min = self.lifecycle.config().min_fee;
        if fee < min {
            return Err(BuilderError::invalid("fee", fee, format!("below the minimum of {min}")))
        }
        Ok(())
    }

    fn parse_address(
        &self,
        field: &'static str,
        address: &str,
    ) -> Result<StacksAddress, BuilderError> {
        let parsed =
            StacksAddress::parse(address).map_err(|e| BuilderError::address(field, address, e))?;
        let Network { single_sig_version, multisig_version, .. } = self.network;
        if parsed.version != single_sig_version && parsed.version != multisig_version {
            return Err(BuilderError::invalid(
                field,
                address,
                format!("not an address on {}", self.lifecycle.config().name),
            ))
        }
        Ok(parsed)
    }

    /// Sets the fee in micro-STX
    pub fn fee(&mut self, fee: u64) -> Result<&mut Self, BuilderError> {
        self.check_fee(fee)?;
        self.fee = Some(fee);
        Ok(self.accepted("fee"))
    }

    pub fn nonce(&mut self, nonce: u64) -> Result<&mut Self, BuilderError> {
        self.nonce = Some(nonce);
        Ok(self.accepted("nonce"))
    }

    /// The origin account, a single signature or multisig address
    pub fn source(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.source = Some(self.parse_address("source", address)?);
        Ok(self.accepted("source"))
    }

    pub fn to(&mut self, address: &str) -> Result<&mut Self, BuilderError> {
        self.to = Some(self.parse_address("to", address)?);
        Ok(self.accepted("to"))
    }

    /// Sets the amount in micro-STX
    pub fn amount(&mut self, amount: u64) -> Result<&mut Self, BuilderError> {
        if amount == 0 {
            return Err(BuilderError::invalid("amount", amount, "must be positive"))
        }
        self.amount = Some(amount);
        Ok(self.accepted("amount"))
    }

    pub fn memo(&mut self, memo: &str) -> Result<&mut Self, BuilderError> {
        if memo.len() > MAX_MEMO_LEN {
            return Err(BuilderError::invalid("memo", memo, format!("exceeds {MAX_MEMO_LEN} bytes")))
        }
        self.memo = memo.as_bytes().to_vec();
        Ok(self.accepted("memo"))
    }

    /// Declares a `threshold`-of-N multisig over hex encoded public keys. Exactly `threshold`
    /// signatures must be collected, and the source must be the resulting multisig address.
    pub fn multisig(
        &mut self,
        threshold: u32,
        public_keys: &[&str],
    ) -> Result<&mut Self, BuilderError> {
        if public_keys.len() > MAX_MULTISIG_KEYS {
            return Err(BuilderError::invalid(
                "public_keys",
                public_keys.len(),
                format!("at most {MAX_MULTISIG_KEYS} keys"),
            ))
        }
        let declared = public_keys
            .iter()
            .map(|key| {
                KeyMaterial::from_public_hex(Algorithm::Secp256k1, key)
                    .map(|k| k.identity())
                    .map_err(|e| BuilderError::invalid("public_keys", key, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let authority = Authority::unweighted(threshold, declared)?;
        self.lifecycle.bind(Discipline::Threshold {
            authority,
            order: SignatureOrder::Declared,
            policy: ThresholdPolicy::Exactly,
        })?;
        Ok(self.accepted("multisig"))
    }

    fn multisig_account(&self, authority: &Authority) -> Result<StacksAddress, BuilderError> {
        let keys: Vec<SignerId> = authority.keys().iter().map(|k| k.signer.clone()).collect();
        let threshold = u8::try_from(authority.threshold()).map_err(|_| {
            BuilderError::InvalidConfiguration("multisig threshold above 255".into())
        })?;
        StacksAddress::from_multisig(self.network.multisig_version, threshold, &keys)
            .map_err(|e| BuilderError::InvalidConfiguration(e.to_string()))
    }

    /// The P2SH address of the declared multisig.
    ///
    /// Fails with [`BuilderError::InvalidConfiguration`] when no multisig is declared.
    pub fn multisig_address(&self) -> Result<String, BuilderError> {
        match self.lifecycle.ledger().discipline() {
            Discipline::Threshold { authority, .. } => render(&self.multisig_account(authority)?),
            Discipline::SingleKey => {
                Err(BuilderError::InvalidConfiguration("no multisig declared".into()))
            }
        }
    }

    fn transaction(&self) -> Result<StxTransaction, BuilderError> {
        let fee = require(&self.fee, "fee")?;
        let source = require(&self.source, "source")?;
        let nonce = require(&self.nonce, "nonce")?;
        let to = require(&self.to, "to")?;
        let amount = require(&self.amount, "amount")?;
        self.check_fee(fee)?;

        let hash_mode = match self.lifecycle.ledger().discipline() {
            Discipline::SingleKey => {
                if source.version != self.network.single_sig_version {
                    return Err(BuilderError::InvalidConfiguration(format!(
                        "source {} is a multisig address but no multisig is declared",
                        render(&source)?
                    )))
                }
                let signers = self
                    .lifecycle
                    .ledger()
                    .entries()
                    .iter()
                    .map(|e| e.signer.clone())
                    .chain(self.lifecycle.pending_signers());
                for signer in signers {
                    let address = StacksAddress::from_public_key(source.version, &signer);
                    if address != source {
                        return Err(BuilderError::InvalidConfiguration(format!(
                            "signer {signer} controls {}, not the source {}",
                            render(&address)?,
                            render(&source)?
                        )))
                    }
                }
                HashMode::P2pkh
            }
            Discipline::Threshold { authority, .. } => {
                let account = self.multisig_account(authority)?;
                if account != source {
                    return Err(BuilderError::InvalidConfiguration(format!(
                        "source {} is not the multisig address {}",
                        render(&source)?,
                        render(&account)?
                    )))
                }
                HashMode::P2sh
            }
        };

        Ok(StxTransaction {
            version: self.network.transaction_version,
            chain_id: self.network.chain_id,
            hash_mode,
            signer: source.hash,
            nonce,
            fee,
            recipient: to,
            amount,
            memo: self.memo.clone(),
        })
    }

    fn summary(&self, tx: &StxTransaction) -> Result<Summary, BuilderError> {
        let coin = &self.lifecycle.config().name;
        let version = match tx.hash_mode {
            HashMode::P2pkh => self.network.single_sig_version,
            HashMode::P2sh => self.network.multisig_version,
        };
        let sender = render(&StacksAddress::new(version, tx.signer))?;
        let amount = tx.amount.to_string();
        let mut summary = Summary {
            inputs: vec![Entry::new(sender.clone(), amount.clone(), coin)],
            outputs: vec![Entry::new(render(&tx.recipient)?, amount, coin)],
            sender,
            fee: tx.fee,
            ..Default::default()
        };
        summary.details.insert("nonce".into(), json!(tx.nonce));
        summary.details.insert("memo".into(), json!(String::from_utf8_lossy(&tx.memo)));
        Ok(summary)
    }

    async fn build_with(&mut self, strict: bool) -> Result<TransactionRecord, BuilderError> {
        debug!(
            coin = %self.lifecycle.config().name,
            tx_type = %TransactionType::Send,
            strict,
            "building"
        );
        let tx = self.transaction()?;
        let summary = self.summary(&tx)?;
        let sealed = self.lifecycle.seal(&StxCodec, &tx, strict).await?;
        Ok(sealed.into_record(TransactionType::Send, self.lifecycle.config(), summary))
    }
}

#[async_trait]
impl TransactionBuilder for TransferBuilder {
    fn coin(&self) -> &CoinConfig {
        self.lifecycle.config()
    }

    fn tx_type(&self) -> TransactionType {
        TransactionType::Send
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
        if discriminator != TOKEN_TRANSFER {
            return Err(BuilderError::UnrecognizedTransactionType(discriminator))
        }
        let decoded = StxCodec.decode(raw)?;
        let tx = decoded.transaction;
        if tx.chain_id != self.network.chain_id || tx.version != self.network.transaction_version {
            return Err(BuilderError::Parse(format!(
                "transaction targets chain {:#010x}, not {}",
                tx.chain_id,
                self.lifecycle.config().name
            )))
        }
        let Network { single_sig_version, multisig_version, .. } = self.network;
        if tx.recipient.version != single_sig_version && tx.recipient.version != multisig_version {
            return Err(BuilderError::Parse(format!(
                "recipient version {} is not an address on {}",
                tx.recipient.version,
                self.lifecycle.config().name
            )))
        }
        let restored = decoded.signatures.len();
        self.lifecycle.restore(decoded.signatures, decoded.discipline)?;

        let version = match tx.hash_mode {
            HashMode::P2pkh => self.network.single_sig_version,
            HashMode::P2sh => self.network.multisig_version,
        };
        self.fee = Some(tx.fee);
        self.nonce = Some(tx.nonce);
        self.source = Some(StacksAddress::new(version, tx.signer));
        self.to = Some(tx.recipient);
        self.amount = Some(tx.amount);
        self.memo = tx.memo;
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
