//! A single type over every concrete builder, for callers that only learn which chain and
//! transaction type they hold at runtime.
use crate::{algo, builder::Phase, eos, stx, trx, BuilderError, TransactionBuilder};
use async_trait::async_trait;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString};
use txkit_core::{
    config::{ChainFamily, CoinConfig},
    types::{KeyMaterial, SignatureLedger, SignerId, TransactionRecord, TransactionType},
};
use txkit_signers::Signer;

/// Identifies one concrete builder. Raw transactions resolve to exactly one kind through
/// [`BuilderKind::from_discriminator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum BuilderKind {
    AlgoTransfer,
    AlgoKeyRegistration,
    StxTransfer,
    TrxTransfer,
    TrxContractCall,
    EosTransfer,
    EosStaking,
    EosWalletInitialization,
}

impl BuilderKind {
    pub fn family(&self) -> ChainFamily {
        match self {
            BuilderKind::AlgoTransfer | BuilderKind::AlgoKeyRegistration => ChainFamily::Algorand,
            BuilderKind::StxTransfer => ChainFamily::Stacks,
            BuilderKind::TrxTransfer | BuilderKind::TrxContractCall => ChainFamily::Tron,
            BuilderKind::EosTransfer |
            BuilderKind::EosStaking |
            BuilderKind::EosWalletInitialization => ChainFamily::Eos,
        }
    }

    /// The builder producing `tx_type` on `family`
    pub fn for_type(family: ChainFamily, tx_type: TransactionType) -> Result<Self, BuilderError> {
        let kind = match (family, tx_type) {
            (ChainFamily::Algorand, TransactionType::Send) => BuilderKind::AlgoTransfer,
            (ChainFamily::Algorand, TransactionType::KeyRegistration) => {
                BuilderKind::AlgoKeyRegistration
            }
            (ChainFamily::Stacks, TransactionType::Send) => BuilderKind::StxTransfer,
            (ChainFamily::Tron, TransactionType::Send) => BuilderKind::TrxTransfer,
            (ChainFamily::Tron, TransactionType::ContractCall) => BuilderKind::TrxContractCall,
            (ChainFamily::Eos, TransactionType::Send) => BuilderKind::EosTransfer,
            (
                ChainFamily::Eos,
                TransactionType::StakingActivate | TransactionType::StakingWithdraw,
            ) => BuilderKind::EosStaking,
            (ChainFamily::Eos, TransactionType::WalletInitialization) => {
                BuilderKind::EosWalletInitialization
            }
            (family, tx_type) => {
                return Err(BuilderError::UnrecognizedTransactionType(format!(
                    "{tx_type} is not supported on {family}"
                )))
            }
        };
        Ok(kind)
    }

    /// Resolves the discriminator of a raw `family` transaction
    pub fn from_discriminator(
        family: ChainFamily,
        discriminator: &str,
    ) -> Result<Self, BuilderError> {
        let kind = match family {
            ChainFamily::Algorand => match discriminator {
                d if d == <algo::Transfer as algo::AlgoKind>::DISCRIMINATOR => {
                    Some(BuilderKind::AlgoTransfer)
                }
                d if d == <algo::KeyRegistration as algo::AlgoKind>::DISCRIMINATOR => {
                    Some(BuilderKind::AlgoKeyRegistration)
                }
                _ => None,
            },
            ChainFamily::Stacks => match discriminator {
                stx::TOKEN_TRANSFER => Some(BuilderKind::StxTransfer),
                _ => None,
            },
            ChainFamily::Tron => match discriminator {
                trx::TRANSFER_CONTRACT => Some(BuilderKind::TrxTransfer),
                trx::TRIGGER_SMART_CONTRACT => Some(BuilderKind::TrxContractCall),
                _ => None,
            },
            ChainFamily::Eos => match discriminator {
                eos::TRANSFER => Some(BuilderKind::EosTransfer),
                eos::DELEGATE_BW | eos::UNDELEGATE_BW => Some(BuilderKind::EosStaking),
                eos::NEW_ACCOUNT => Some(BuilderKind::EosWalletInitialization),
                _ => None,
            },
        };
        kind.ok_or_else(|| BuilderError::UnrecognizedTransactionType(discriminator.to_string()))
    }
}

/// Any concrete builder.
///
/// Implements [`TransactionBuilder`] by delegating to the wrapped builder; the `as_*_mut`
/// accessors reach the chain specific setters.
#[derive(Clone, Debug)]
pub enum AnyBuilder {
    AlgoTransfer(algo::TransferBuilder),
    AlgoKeyRegistration(algo::KeyRegistrationBuilder),
    StxTransfer(stx::TransferBuilder),
    TrxTransfer(trx::TransferBuilder),
    TrxContractCall(trx::ContractCallBuilder),
    EosTransfer(eos::TransferBuilder),
    EosStaking(eos::StakingBuilder),
    EosWalletInitialization(eos::WalletInitializationBuilder),
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            AnyBuilder::AlgoTransfer($inner) => $body,
            AnyBuilder::AlgoKeyRegistration($inner) => $body,
            AnyBuilder::StxTransfer($inner) => $body,
            AnyBuilder::TrxTransfer($inner) => $body,
            AnyBuilder::TrxContractCall($inner) => $body,
            AnyBuilder::EosTransfer($inner) => $body,
            AnyBuilder::EosStaking($inner) => $body,
            AnyBuilder::EosWalletInitialization($inner) => $body,
        }
    };
}

macro_rules! impl_variant {
    ($variant:ident, $builder:ty, $as_ref:ident, $as_mut:ident) => {
        impl From<$builder> for AnyBuilder {
            fn from(builder: $builder) -> Self {
                AnyBuilder::$variant(builder)
            }
        }

        impl AnyBuilder {
            pub fn $as_ref(&self) -> Option<&$builder> {
                match self {
                    AnyBuilder::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            pub fn $as_mut(&mut self) -> Option<&mut $builder> {
                match self {
                    AnyBuilder::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_variant!(AlgoTransfer, algo::TransferBuilder, as_algo_transfer, as_algo_transfer_mut);
impl_variant!(
    AlgoKeyRegistration,
    algo::KeyRegistrationBuilder,
    as_algo_key_registration,
    as_algo_key_registration_mut
);
impl_variant!(StxTransfer, stx::TransferBuilder, as_stx_transfer, as_stx_transfer_mut);
impl_variant!(TrxTransfer, trx::TransferBuilder, as_trx_transfer, as_trx_transfer_mut);
impl_variant!(
    TrxContractCall,
    trx::ContractCallBuilder,
    as_trx_contract_call,
    as_trx_contract_call_mut
);
impl_variant!(EosTransfer, eos::TransferBuilder, as_eos_transfer, as_eos_transfer_mut);
impl_variant!(EosStaking, eos::StakingBuilder, as_eos_staking, as_eos_staking_mut);
impl_variant!(
    EosWalletInitialization,
    eos::WalletInitializationBuilder,
    as_eos_wallet_initialization,
    as_eos_wallet_initialization_mut
);

impl AnyBuilder {
    /// An empty builder of `kind` for `config`
    pub fn new(kind: BuilderKind, config: CoinConfig) -> Result<Self, BuilderError> {
        if kind.family() != config.family {
            return Err(BuilderError::UnsupportedCoin(config.name))
        }
        let builder = match kind {
            BuilderKind::AlgoTransfer => algo::TransferBuilder::new(config)?.into(),
            BuilderKind::AlgoKeyRegistration => algo::KeyRegistrationBuilder::new(config)?.into(),
            BuilderKind::StxTransfer => stx::TransferBuilder::new(config)?.into(),
            BuilderKind::TrxTransfer => trx::TransferBuilder::new(config)?.into(),
            BuilderKind::TrxContractCall => trx::ContractCallBuilder::new(config)?.into(),
            BuilderKind::EosTransfer => eos::TransferBuilder::new(config)?.into(),
            BuilderKind::EosStaking => eos::StakingBuilder::new(config)?.into(),
            BuilderKind::EosWalletInitialization => {
                eos::WalletInitializationBuilder::new(config)?.into()
            }
        };
        Ok(builder)
    }

    pub fn kind(&self) -> BuilderKind {
        match self {
            AnyBuilder::AlgoTransfer(_) => BuilderKind::AlgoTransfer,
            AnyBuilder::AlgoKeyRegistration(_) => BuilderKind::AlgoKeyRegistration,
            AnyBuilder::StxTransfer(_) => BuilderKind::StxTransfer,
            AnyBuilder::TrxTransfer(_) => BuilderKind::TrxTransfer,
            AnyBuilder::TrxContractCall(_) => BuilderKind::TrxContractCall,
            AnyBuilder::EosTransfer(_) => BuilderKind::EosTransfer,
            AnyBuilder::EosStaking(_) => BuilderKind::EosStaking,
            AnyBuilder::EosWalletInitialization(_) => BuilderKind::EosWalletInitialization,
        }
    }

    /// Replaces the signer the wrapped builder signs through
    #[must_use]
    pub fn with_signer(self, signer: Arc<dyn Signer>) -> Self {
        match self {
            AnyBuilder::AlgoTransfer(b) => b.with_signer(signer).into(),
            AnyBuilder::AlgoKeyRegistration(b) => b.with_signer(signer).into(),
            AnyBuilder::StxTransfer(b) => b.with_signer(signer).into(),
            AnyBuilder::TrxTransfer(b) => b.with_signer(signer).into(),
            AnyBuilder::TrxContractCall(b) => b.with_signer(signer).into(),
            AnyBuilder::EosTransfer(b) => b.with_signer(signer).into(),
            AnyBuilder::EosStaking(b) => b.with_signer(signer).into(),
            AnyBuilder::EosWalletInitialization(b) => b.with_signer(signer).into(),
        }
    }
}

#[async_trait]
impl TransactionBuilder for AnyBuilder {
    fn coin(&self) -> &CoinConfig {
        delegate!(self, inner => inner.coin())
    }

    fn tx_type(&self) -> TransactionType {
        delegate!(self, inner => inner.tx_type())
    }

    fn phase(&self) -> Phase {
        delegate!(self, inner => inner.phase())
    }

    fn ledger(&self) -> &SignatureLedger {
        delegate!(self, inner => inner.ledger())
    }

    fn pending_signers(&self) -> Vec<SignerId> {
        delegate!(self, inner => inner.pending_signers())
    }

    fn load_from_raw(&mut self, raw: &[u8]) -> Result<&mut Self, BuilderError> {
        delegate!(self, inner => {
            inner.load_from_raw(raw)?;
        });
        Ok(self)
    }

    fn queue_signer(&mut self, key: KeyMaterial) -> Result<&mut Self, BuilderError> {
        delegate!(self, inner => {
            inner.queue_signer(key)?;
        });
        Ok(self)
    }

    async fn build(&mut self) -> Result<TransactionRecord, BuilderError> {
        delegate!(self, inner => inner.build().await)
    }

    async fn build_partial(&mut self) -> Result<TransactionRecord, BuilderError> {
        delegate!(self, inner => inner.build_partial().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;
    use txkit_core::config::Coin;

    #[test]
    fn every_kind_builds_for_its_family() {
        for kind in BuilderKind::iter() {
            let coin = Coin::iter().find(|coin| coin.family() == kind.family()).unwrap();
            let builder = AnyBuilder::new(kind, coin.config()).unwrap();
            assert_eq!(builder.kind(), kind);
            assert_eq!(builder.phase(), Phase::Empty);
            assert_eq!(kind.to_string().parse::<BuilderKind>().unwrap(), kind);
        }
        assert!(matches!(
            AnyBuilder::new(BuilderKind::EosStaking, Coin::Algo.config()),
            Err(BuilderError::UnsupportedCoin(_))
        ));
    }

    #[test]
    fn resolves_discriminators() {
        assert_eq!(
            BuilderKind::from_discriminator(ChainFamily::Eos, "undelegatebw").unwrap(),
            BuilderKind::EosStaking
        );
        assert_eq!(
            BuilderKind::from_discriminator(ChainFamily::Algorand, "keyreg").unwrap(),
            BuilderKind::AlgoKeyRegistration
        );
        // a Tron contract type is meaningless on EOS
        assert!(matches!(
            BuilderKind::from_discriminator(ChainFamily::Eos, "TransferContract"),
            Err(BuilderError::UnrecognizedTransactionType(d)) if d == "TransferContract"
        ));
        assert!(matches!(
            BuilderKind::for_type(ChainFamily::Stacks, TransactionType::ContractCall),
            Err(BuilderError::UnrecognizedTransactionType(_))
        ));
        assert_eq!(
            BuilderKind::for_type(ChainFamily::Eos, TransactionType::StakingWithdraw).unwrap(),
            BuilderKind::EosStaking
        );
    }

    #[tokio::test]
    async fn delegates_to_the_wrapped_builder() {
        let mut builder = AnyBuilder::new(BuilderKind::TrxTransfer, Coin::Ttrx.config()).unwrap();
        builder
            .as_trx_transfer_mut()
            .unwrap()
            .source("TGeT2sfMYcjx3ra2HhQUvMyBcVhjBc1Lbk")
            .unwrap();
        assert!(builder.as_eos_transfer_mut().is_none());
        assert_eq!(builder.phase(), Phase::Configured);
        assert!(matches!(builder.build().await, Err(BuilderError::MissingField("block"))));
    }
}
