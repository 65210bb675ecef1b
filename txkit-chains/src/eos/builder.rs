use super::{
    account::{decode_public_key, encode_public_key, is_valid_name, Asset},
    codec::{
        ActionData, EosAction, EosCodec, EosTransaction, DELEGATE_BW, NEW_ACCOUNT, TRANSFER,
        UNDELEGATE_BW,
    },
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
    config::{CoinConfig, ConfigError, NetworkParams},
    types::{
        Algorithm, Authority, DeclaredKey, Discipline, Entry, KeyMaterial, SignatureLedger,
        SignatureOrder, SignerId, ThresholdPolicy, TransactionRecord, TransactionType,
    },
};
use txkit_signers::Signer;

/// Maximum transfer memo size in bytes
pub const MAX_MEMO_LEN: usize = 256;

/// Symbol of the system token staked for resources
pub const CORE_SYMBOL: &str = "EOS";

/// Contract account of the system token
pub const TOKEN_CONTRACT: &str = "eosio.token";

/// Account of the system contract
pub const SYSTEM_CONTRACT: &str = "eosio";

/// The action specific fields of one EOS transaction type
pub trait EosKind: Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// Names of the first action a raw transaction of this kind starts with
    const ACTIONS: &'static [&'static str];

    fn tx_type(&self) -> TransactionType;

    fn actions(&self, actor: &str) -> Result<Vec<EosAction>, BuilderError>;

    fn from_actions(actions: &[EosAction]) -> Option<Self>;

    fn summarize(actions: &[EosAction], coin: &str, summary: &mut Summary);
}

/// Token transfer fields
#[derive(Clone, Debug, Default)]
pub struct Transfer {
    to: Option<String>,
    quantity: Option<Asset>,
    memo: String,
    contract: Option<String>,
}

impl EosKind for Transfer {
    const ACTIONS: &'static [&'static str] = &[TRANSFER];

    fn tx_type(&self) -> TransactionType {
        TransactionType::Send
    }

    fn actions(&self, actor: &str) -> Result<Vec<EosAction>, BuilderError> {
        let data = ActionData::Transfer {
            from: actor.to_string(),
            to: require(&self.to, "to")?,
            quantity: require(&self.quantity, "quantity")?,
            memo: self.memo.clone(),
        };
        let account = self.contract.clone().unwrap_or_else(|| TOKEN_CONTRACT.to_string());
        Ok(vec![EosAction { account, actor: actor.to_string(), data }])
    }

    fn from_actions(actions: &[EosAction]) -> Option<Self> {
        match actions {
            [EosAction { account, actor, data: ActionData::Transfer { from, to, quantity, memo } }]
                if actor == from =>
            {
                Some(Self {
                    to: Some(to.clone()),
                    quantity: Some(quantity.clone()),
                    memo: memo.clone(),
                    contract: (account != TOKEN_CONTRACT).then(|| account.clone()),
                })
            }
            _ => None,
        }
    }

    fn summarize(actions: &[EosAction], coin: &str, summary: &mut Summary) {
        if let [EosAction { account, data: ActionData::Transfer { to, quantity, memo, .. }, .. }] =
            actions
        {
            let value = quantity.to_string();
            summary.inputs.push(Entry::new(summary.sender.clone(), value.clone(), coin));
            summary.outputs.push(Entry::new(to.clone(), value, coin));
            summary.details.insert("memo".into(), json!(memo));
            summary.details.insert("contract".into(), json!(account));
        }
    }
}

/// Staking and unstaking fields. A builder starts out delegating.
#[derive(Clone, Debug, Default)]
pub struct Staking {
    withdraw: bool,
    receiver: Option<String>,
    net: Option<Asset>,
    cpu: Option<Asset>,
    transfer: bool,
}

impl EosKind for Staking {
    const ACTIONS: &'static [&'static str] = &[DELEGATE_BW, UNDELEGATE_BW];

    fn tx_type(&self) -> TransactionType {
        if self.withdraw {
            TransactionType::StakingWithdraw
        } else {
            TransactionType::StakingActivate
        }
    }

    fn actions(&self, actor: &str) -> Result<Vec<EosAction>, BuilderError> {
        let receiver = require(&self.receiver, "receiver")?;
        let net = require(&self.net, "net_quantity")?;
        let cpu = require(&self.cpu, "cpu_quantity")?;
        if net.amount == 0 && cpu.amount == 0 {
            return Err(BuilderError::invalid(
                "net_quantity",
                &net,
                "net and cpu quantities are both zero",
            ))
        }
        if self.withdraw && self.transfer {
            return Err(BuilderError::invalid(
                "transfer",
                self.transfer,
                "only delegation can transfer the stake",
            ))
        }
        let from = actor.to_string();
        let data = if self.withdraw {
            ActionData::UndelegateBw { from, receiver, net, cpu }
        } else {
            ActionData::DelegateBw { from, receiver, net, cpu, transfer: self.transfer }
        };
        Ok(vec![EosAction { account: SYSTEM_CONTRACT.into(), actor: actor.to_string(), data }])
    }

    fn from_actions(actions: &[EosAction]) -> Option<Self> {
        let [EosAction { account, actor, data }] = actions else { return None };
        if account != SYSTEM_CONTRACT {
            return None
        }
        match data {
            ActionData::DelegateBw { from, receiver, net, cpu, transfer } if from == actor => {
                Some(Self {
                    withdraw: false,
                    receiver: Some(receiver.clone()),
                    net: Some(net.clone()),
                    cpu: Some(cpu.clone()),
                    transfer: *transfer,
                })
            }
            ActionData::UndelegateBw { from, receiver, net, cpu } if from == actor => Some(Self {
                withdraw: true,
                receiver: Some(receiver.clone()),
                net: Some(net.clone()),
                cpu: Some(cpu.clone()),
                transfer: false,
            }),
            _ => None,
        }
    }

    fn summarize(actions: &[EosAction], coin: &str, summary: &mut Summary) {
        let (receiver, net, cpu, transfer) = match actions {
            [EosAction {
                data: ActionData::DelegateBw { receiver, net, cpu, transfer, .. }, ..
            }] => (receiver, net, cpu, *transfer),
            [EosAction { data: ActionData::UndelegateBw { receiver, net, cpu, .. }, .. }] => {
                (receiver, net, cpu, false)
            }
            _ => return,
        };
        let value = net.checked_add(cpu).map(|total| total.to_string()).unwrap_or_default();
        summary.inputs.push(Entry::new(summary.sender.clone(), value.clone(), coin));
        summary.outputs.push(Entry::new(receiver.clone(), value, coin));
        let details = &mut summary.details;
        details.insert("netQuantity".into(), json!(net.to_string()));
        details.insert("cpuQuantity".into(), json!(cpu.to_string()));
        details.insert("transfer".into(), json!(transfer));
    }
}

/// New account fields: the account is created, given RAM and staked for bandwidth in one
/// transaction.
#[derive(Clone, Debug, Default)]
pub struct WalletInitialization {
    name: Option<String>,
    owner: Option<[u8; 33]>,
    active: Option<[u8; 33]>,
    ram_bytes: Option<u32>,
    net: Option<Asset>,
    cpu: Option<Asset>,
}

impl EosKind for WalletInitialization {
    const ACTIONS: &'static [&'static str] = &[NEW_ACCOUNT];

    fn tx_type(&self) -> TransactionType {
        TransactionType::WalletInitialization
    }

    fn actions(&self, actor: &str) -> Result<Vec<EosAction>, BuilderError> {
        let name = require(&self.name, "name")?;
        let owner = require(&self.owner, "owner_key")?;
        let active = require(&self.active, "active_key")?;
        let bytes = require(&self.ram_bytes, "ram_bytes")?;
        let net = require(&self.net, "net_quantity")?;
        let cpu = require(&self.cpu, "cpu_quantity")?;
        if name == actor {
            return Err(BuilderError::invalid("name", &name, "an account cannot create itself"))
        }
        let action = |data| EosAction {
            account: SYSTEM_CONTRACT.into(),
            actor: actor.to_string(),
            data,
        };
        Ok(vec![
            action(ActionData::NewAccount {
                creator: actor.to_string(),
                name: name.clone(),
                owner,
                active,
            }),
            action(ActionData::BuyRamBytes {
                payer: actor.to_string(),
                receiver: name.clone(),
                bytes,
            }),
            action(ActionData::DelegateBw {
                from: actor.to_string(),
                receiver: name,
                net,
                cpu,
                transfer: true,
            }),
        ])
    }

    fn from_actions(actions: &[EosAction]) -> Option<Self> {
        let [new_account, buy_ram, delegate] = actions else { return None };
        if actions.iter().any(|a| a.account != SYSTEM_CONTRACT || a.actor != new_account.actor) {
            return None
        }
        let actor = &new_account.actor;
        match (&new_account.data, &buy_ram.data, &delegate.data) {
            (
                ActionData::NewAccount { creator, name, owner, active },
                ActionData::BuyRamBytes { payer, receiver: ram_receiver, bytes },
                ActionData::DelegateBw { from, receiver, net, cpu, transfer: true },
            ) if creator == actor &&
                payer == actor &&
                from == actor &&
                ram_receiver == name &&
                receiver == name =>
            {
                Some(Self {
                    name: Some(name.clone()),
                    owner: Some(*owner),
                    active: Some(*active),
                    ram_bytes: Some(*bytes),
                    net: Some(net.clone()),
                    cpu: Some(cpu.clone()),
                })
            }
            _ => None,
        }
    }

    fn summarize(actions: &[EosAction], coin: &str, summary: &mut Summary) {
        let [new_account, buy_ram, delegate] = actions else { return };
        if let (
            ActionData::NewAccount { name, owner, active, .. },
            ActionData::BuyRamBytes { bytes, .. },
            ActionData::DelegateBw { net, cpu, .. },
        ) = (&new_account.data, &buy_ram.data, &delegate.data)
        {
            let value = net.checked_add(cpu).map(|total| total.to_string()).unwrap_or_default();
            summary.inputs.push(Entry::new(summary.sender.clone(), value.clone(), coin));
            summary.outputs.push(Entry::new(name.clone(), value, coin));
            let details = &mut summary.details;
            details.insert("name".into(), json!(name));
            details.insert("ownerKey".into(), json!(encode_public_key(owner)));
            details.insert("activeKey".into(), json!(encode_public_key(active)));
            details.insert("ramBytes".into(), json!(bytes));
        }
    }
}

/// Builds EOS transactions of kind `K`.
///
/// EOS has no transaction fee, so validation starts at the actor and records report a fee
/// of zero.
#[derive(Clone, Debug)]
pub struct Builder<K> {
    lifecycle: Lifecycle,
    codec: EosCodec,
    actor: Option<String>,
    expiration: Option<u32>,
    ref_block: Option<(u16, u32)>,
    kind: K,
}

/// Builds token transfers
pub type TransferBuilder = Builder<Transfer>;

/// Builds `delegatebw` and `undelegatebw` transactions
pub type StakingBuilder = Builder<Staking>;

/// Builds new account transactions
pub type WalletInitializationBuilder = Builder<WalletInitialization>;

/// The text form of a secp256k1 key's public component
pub fn key_text(key: &KeyMaterial) -> Result<String, BuilderError> {
    let public = <[u8; 33]>::try_from(&key.public_key()[..]).map_err(|_| {
        BuilderError::invalid("key", key.identity(), "expected a compressed secp256k1 key")
    })?;
    Ok(encode_public_key(&public))
}

fn parse_name(field: &'static str, name: &str) -> Result<String, BuilderError> {
    if !is_valid_name(name) {
        return Err(BuilderError::invalid(
            field,
            name,
            "expected 1 to 12 characters of a-z, 1-5 and '.', not ending in '.'",
        ))
    }
    Ok(name.to_string())
}

fn parse_key(field: &'static str, key: &str) -> Result<[u8; 33], BuilderError> {
    let public = decode_public_key(key).map_err(|e| BuilderError::address(field, key, e))?;
    KeyMaterial::from_public(Algorithm::Secp256k1, &public)?;
    Ok(public)
}

impl<K: EosKind> Builder<K> {
    pub fn new(config: CoinConfig) -> Result<Self, BuilderError> {
        let chain_id = match &config.params {
            NetworkParams::Eos { chain_id } => hex::decode(chain_id)
                .ok()
                .and_then(|id| <[u8; 32]>::try_from(id).ok())
                .ok_or_else(|| ConfigError::InvalidParameter {
                    field: "chainId",
                    reason: "must be 32 hex encoded bytes".into(),
                })?,
            _ => return Err(BuilderError::UnsupportedCoin(config.name)),
        };
        Ok(Self {
            lifecycle: Lifecycle::new(config, Algorithm::Secp256k1),
            codec: EosCodec::new(chain_id),
            actor: None,
            expiration: None,
            ref_block: None,
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

    /// Parses a quantity of the network's system token
    fn core_asset(&self, field: &'static str, quantity: &str) -> Result<Asset, BuilderError> {
        let asset: Asset =
            quantity.parse().map_err(|e| BuilderError::invalid(field, quantity, e))?;
        let decimals = self.lifecycle.config().decimals;
        if asset.symbol != CORE_SYMBOL || u32::from(asset.precision) != decimals {
            return Err(BuilderError::invalid(
                field,
                quantity,
                format!("expected {CORE_SYMBOL} with {decimals} decimals"),
            ))
        }
        Ok(asset)
    }

    /// The account that authorizes every action
    pub fn actor(&mut self, account: &str) -> Result<&mut Self, BuilderError> {
        self.actor = Some(parse_name("actor", account)?);
        Ok(self.accepted("actor"))
    }

    /// Expiration in seconds since the epoch
    pub fn expiration(&mut self, expiration: u32) -> Result<&mut Self, BuilderError> {
        if expiration == 0 {
            return Err(BuilderError::invalid("expiration", expiration, "must be positive"))
        }
        self.expiration = Some(expiration);
        Ok(self.accepted("expiration"))
    }

    /// Sets the TaPoS reference directly
    pub fn ref_block(&mut self, num: u16, prefix: u32) -> Result<&mut Self, BuilderError> {
        self.ref_block = Some((num, prefix));
        Ok(self.accepted("ref_block"))
    }

    /// Derives the TaPoS reference from a block number and its hex encoded id
    pub fn block(&mut self, number: u32, id: &str) -> Result<&mut Self, BuilderError> {
        let bytes = hex::decode(id.trim_start_matches("0x"))
            .map_err(|e| BuilderError::invalid("block", id, e))?;
        if bytes.len() != 32 {
            return Err(BuilderError::invalid("block", id, "block id must be 32 bytes"))
        }
        let prefix = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        self.ref_block = Some(((number & 0xffff) as u16, prefix));
        Ok(self.accepted("ref_block"))
    }

    /// Lets the given weighted keys approve the transaction once their weights reach
    /// `threshold`. Keys are in `EOS...` or `PUB_K1_...` form.
    pub fn authority(
        &mut self,
        threshold: u32,
        keys: &[(&str, u32)],
    ) -> Result<&mut Self, BuilderError> {
        let keys = keys
            .iter()
            .map(|(key, weight)| {
                let public = parse_key("authority", key)?;
                let signer = SignerId::from_public_key(Algorithm::Secp256k1, &public)?;
                Ok(DeclaredKey { signer, weight: *weight })
            })
            .collect::<Result<Vec<_>, BuilderError>>()?;
        let authority = Authority::new(threshold, keys)?;
        self.lifecycle.bind(Discipline::Threshold {
            authority,
            order: SignatureOrder::Insertion,
            policy: ThresholdPolicy::AtLeast,
        })?;
        Ok(self.accepted("authority"))
    }

    fn transaction(&self) -> Result<EosTransaction, BuilderError> {
        let actor = require(&self.actor, "actor")?;
        let expiration = require(&self.expiration, "expiration")?;
        let (ref_block_num, ref_block_prefix) = require(&self.ref_block, "ref_block")?;
        let actions = self.kind.actions(&actor)?;
        Ok(EosTransaction { expiration, ref_block_num, ref_block_prefix, actions })
    }

    fn summary(&self, tx: &EosTransaction) -> Summary {
        let coin = &self.lifecycle.config().name;
        let mut summary = Summary {
            sender: self.actor.clone().unwrap_or_default(),
            fee: 0,
            ..Default::default()
        };
        K::summarize(&tx.actions, coin, &mut summary);
        let names: Vec<&str> = tx.actions.iter().map(EosAction::name).collect();
        let details = &mut summary.details;
        details.insert("actions".into(), json!(names));
        details.insert("expiration".into(), json!(tx.expiration));
        details.insert("refBlockNum".into(), json!(tx.ref_block_num));
        details.insert("refBlockPrefix".into(), json!(tx.ref_block_prefix));
        summary
    }

    async fn build_with(&mut self, strict: bool) -> Result<TransactionRecord, BuilderError> {
        let tx_type = self.kind.tx_type();
        debug!(coin = %self.lifecycle.config().name, %tx_type, strict, "building");
        let tx = self.transaction()?;
        let sealed = self.lifecycle.seal(&self.codec, &tx, strict).await?;
        Ok(sealed.into_record(tx_type, self.lifecycle.config(), self.summary(&tx)))
    }
}

impl Builder<Transfer> {
    pub fn to(&mut self, account: &str) -> Result<&mut Self, BuilderError> {
        self.kind.to = Some(parse_name("to", account)?);
        Ok(self.accepted("to"))
    }

    /// The amount in asset syntax, `1.0000 EOS`
    pub fn quantity(&mut self, quantity: &str) -> Result<&mut Self, BuilderError> {
        let asset: Asset =
            quantity.parse().map_err(|e| BuilderError::invalid("quantity", quantity, e))?;
        if asset.amount == 0 {
            return Err(BuilderError::invalid("quantity", quantity, "must be positive"))
        }
        self.kind.quantity = Some(asset);
        Ok(self.accepted("quantity"))
    }

    pub fn memo(&mut self, memo: &str) -> Result<&mut Self, BuilderError> {
        if memo.len() > MAX_MEMO_LEN {
            return Err(BuilderError::invalid(
                "memo",
                memo,
                format!("may be at most {MAX_MEMO_LEN} bytes"),
            ))
        }
        self.kind.memo = memo.to_string();
        Ok(self.accepted("memo"))
    }

    /// The token contract, `eosio.token` unless set
    pub fn contract(&mut self, account: &str) -> Result<&mut Self, BuilderError> {
        self.kind.contract = Some(parse_name("contract", account)?);
        Ok(self.accepted("contract"))
    }
}

impl Builder<Staking> {
    /// Delegates bandwidth to the receiver
    pub fn activate(&mut self) -> &mut Self {
        self.kind.withdraw = false;
        self.accepted("activate")
    }

    /// Undelegates bandwidth from the receiver
    pub fn withdraw(&mut self) -> &mut Self {
        self.kind.withdraw = true;
        self.accepted("withdraw")
    }

    pub fn receiver(&mut self, account: &str) -> Result<&mut Self, BuilderError> {
        self.kind.receiver = Some(parse_name("receiver", account)?);
        Ok(self.accepted("receiver"))
    }

    pub fn net_quantity(&mut self, quantity: &str) -> Result<&mut Self, BuilderError> {
        self.kind.net = Some(self.core_asset("net_quantity", quantity)?);
        Ok(self.accepted("net_quantity"))
    }

    pub fn cpu_quantity(&mut self, quantity: &str) -> Result<&mut Self, BuilderError> {
        self.kind.cpu = Some(self.core_asset("cpu_quantity", quantity)?);
        Ok(self.accepted("cpu_quantity"))
    }

    /// Hands the staked tokens to the receiver. Only valid when delegating.
    pub fn transfer(&mut self, transfer: bool) -> &mut Self {
        self.kind.transfer = transfer;
        self.accepted("transfer")
    }
}

impl Builder<WalletInitialization> {
    /// Name of the account to create
    pub fn name(&mut self, account: &str) -> Result<&mut Self, BuilderError> {
        self.kind.name = Some(parse_name("name", account)?);
        Ok(self.accepted("name"))
    }

    pub fn owner_key(&mut self, key: &str) -> Result<&mut Self, BuilderError> {
        self.kind.owner = Some(parse_key("owner_key", key)?);
        Ok(self.accepted("owner_key"))
    }

    pub fn active_key(&mut self, key: &str) -> Result<&mut Self, BuilderError> {
        self.kind.active = Some(parse_key("active_key", key)?);
        Ok(self.accepted("active_key"))
    }

    /// RAM bought for the new account
    pub fn ram_bytes(&mut self, bytes: u32) -> Result<&mut Self, BuilderError> {
        if bytes == 0 {
            return Err(BuilderError::invalid("ram_bytes", bytes, "must be positive"))
        }
        self.kind.ram_bytes = Some(bytes);
        Ok(self.accepted("ram_bytes"))
    }

    pub fn net_quantity(&mut self, quantity: &str) -> Result<&mut Self, BuilderError> {
        self.kind.net = Some(self.core_asset("net_quantity", quantity)?);
        Ok(self.accepted("net_quantity"))
    }

    pub fn cpu_quantity(&mut self, quantity: &str) -> Result<&mut Self, BuilderError> {
        self.kind.cpu = Some(self.core_asset("cpu_quantity", quantity)?);
        Ok(self.accepted("cpu_quantity"))
    }
}

#[async_trait]
impl<K: EosKind> TransactionBuilder for Builder<K> {
    fn coin(&self) -> &CoinConfig {
        self.lifecycle.config()
    }

    fn tx_type(&self) -> TransactionType {
        self.kind.tx_type()
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
        if !K::ACTIONS.contains(&discriminator.as_str()) {
            return Err(BuilderError::UnrecognizedTransactionType(discriminator))
        }
        let decoded = self.codec.decode(raw)?;
        let tx = decoded.transaction;
        let kind = K::from_actions(&tx.actions)
            .ok_or_else(|| BuilderError::UnrecognizedTransactionType(discriminator.clone()))?;
        let restored = decoded.signatures.len();
        self.lifecycle.restore(decoded.signatures, decoded.discipline)?;

        self.actor = tx.actions.first().map(|action| action.actor.clone());
        self.expiration = Some(tx.expiration);
        self.ref_block = Some((tx.ref_block_num, tx.ref_block_prefix));
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
