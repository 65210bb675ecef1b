use crate::{
    any::{AnyBuilder, BuilderKind},
    codec, BuilderError, TransactionBuilder,
};
use std::sync::Arc;
use tracing::debug;
use txkit_core::{
    config::{Coin, CoinConfig},
    types::TransactionType,
};
use txkit_signers::Signer;

/// Hands out builders for one network.
///
/// Every call returns a fresh builder; the factory itself holds no transaction state.
///
/// ```
/// # async fn foo() -> Result<(), txkit_chains::BuilderError> {
/// use txkit_chains::{TransactionBuilder, TransactionBuilderFactory};
/// use txkit_core::config::Coin;
///
/// let factory = TransactionBuilderFactory::new(Coin::Teos);
/// let mut builder = factory.transfer()?;
/// builder
///     .as_eos_transfer_mut()
///     .expect("eos transfer")
///     .actor("alice")?
///     .expiration(1_700_000_000)?
///     .ref_block(1, 2)?
///     .to("bob")?
///     .quantity("1.0000 EOS")?;
/// let unsigned = builder.build_partial().await?;
///
/// // hand the bytes to the next party, who resumes them without knowing the type
/// let mut resumed = factory.from_raw(&unsigned.to_broadcast_bytes())?;
/// assert_eq!(resumed.build_partial().await?, unsigned);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TransactionBuilderFactory {
    config: CoinConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl TransactionBuilderFactory {
    /// A factory for one of the built-in networks
    pub fn new(coin: Coin) -> Self {
        Self { config: coin.config(), signer: None }
    }

    /// A factory for a custom network table
    pub fn from_config(config: CoinConfig) -> Result<Self, BuilderError> {
        config.validate()?;
        Ok(Self { config, signer: None })
    }

    /// Builders created from now on sign through `signer`
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(&self) -> &CoinConfig {
        &self.config
    }

    fn create(&self, kind: BuilderKind) -> Result<AnyBuilder, BuilderError> {
        let builder = AnyBuilder::new(kind, self.config.clone())?;
        debug!(coin = %self.config.name, %kind, "created builder");
        Ok(match &self.signer {
            Some(signer) => builder.with_signer(signer.clone()),
            None => builder,
        })
    }

    /// A builder for `tx_type`, failing when the network has no such transaction
    pub fn builder(&self, tx_type: TransactionType) -> Result<AnyBuilder, BuilderError> {
        let mut builder = self.create(BuilderKind::for_type(self.config.family, tx_type)?)?;
        if tx_type == TransactionType::StakingWithdraw {
            if let Some(staking) = builder.as_eos_staking_mut() {
                staking.withdraw();
            }
        }
        Ok(builder)
    }

    pub fn transfer(&self) -> Result<AnyBuilder, BuilderError> {
        self.builder(TransactionType::Send)
    }

    pub fn contract_call(&self) -> Result<AnyBuilder, BuilderError> {
        self.builder(TransactionType::ContractCall)
    }

    pub fn key_registration(&self) -> Result<AnyBuilder, BuilderError> {
        self.builder(TransactionType::KeyRegistration)
    }

    /// A staking builder, delegating until told to withdraw
    pub fn staking(&self) -> Result<AnyBuilder, BuilderError> {
        self.builder(TransactionType::StakingActivate)
    }

    pub fn wallet_initialization(&self) -> Result<AnyBuilder, BuilderError> {
        self.builder(TransactionType::WalletInitialization)
    }

    /// Selects the builder able to resume `raw` from its discriminator and loads it.
    ///
    /// Fails with [`BuilderError::UnrecognizedTransactionType`] when the discriminator does
    /// not belong to a known builder of this network.
    pub fn from_raw(&self, raw: &[u8]) -> Result<AnyBuilder, BuilderError> {
        let discriminator = codec::discriminator(raw)?;
        let kind = BuilderKind::from_discriminator(self.config.family, &discriminator)?;
        let mut builder = self.create(kind)?;
        builder.load_from_raw(raw)?;
        Ok(builder)
    }
}

fn coin(coin_id: &str) -> Result<Coin, BuilderError> {
    coin_id.parse().map_err(|_| BuilderError::UnsupportedCoin(coin_id.to_string()))
}

/// An empty builder of `tx_type` for the coin named `coin_id`, e.g. `talgo`
pub fn new_builder(coin_id: &str, tx_type: TransactionType) -> Result<AnyBuilder, BuilderError> {
    TransactionBuilderFactory::new(coin(coin_id)?).builder(tx_type)
}

/// A builder for the coin named `coin_id`, resumed from unsigned or broadcast bytes
pub fn builder_from_raw(coin_id: &str, raw: &[u8]) -> Result<AnyBuilder, BuilderError> {
    TransactionBuilderFactory::new(coin(coin_id)?).from_raw(raw)
}
