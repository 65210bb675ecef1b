//! Static network parameter tables.
//!
//! Every supported coin maps to a [`CoinConfig`]. Custom networks can be described in JSON
//! and loaded with [`CoinConfig::from_json`].
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

/// An error raised while resolving or loading a network configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown coin {0:?}")]
    UnknownCoin(String),
    #[error("network parameters for {params} do not match chain family {family}")]
    FamilyMismatch { family: ChainFamily, params: ChainFamily },
    #[error("invalid network parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// The supported coins, mainnet and testnet
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Coin {
    Algo,
    Talgo,
    Stx,
    Tstx,
    Trx,
    Ttrx,
    Eos,
    Teos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChainFamily {
    Algorand,
    Stacks,
    Tron,
    Eos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

/// Chain family specific network parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum NetworkParams {
    Algorand {
        genesis_id: String,
        /// base64 encoded
        genesis_hash: String,
    },
    Stacks {
        chain_id: u32,
        transaction_version: u8,
        single_sig_version: u8,
        multisig_version: u8,
    },
    Tron {
        /// Expiration window applied when none is set, in milliseconds
        default_expiration_ms: u64,
        /// Maximum distance between timestamp and expiration, in milliseconds
        max_expiration_ms: u64,
    },
    Eos {
        /// hex encoded
        chain_id: String,
    },
}

impl NetworkParams {
    pub fn family(&self) -> ChainFamily {
        match self {
            NetworkParams::Algorand { .. } => ChainFamily::Algorand,
            NetworkParams::Stacks { .. } => ChainFamily::Stacks,
            NetworkParams::Tron { .. } => ChainFamily::Tron,
            NetworkParams::Eos { .. } => ChainFamily::Eos,
        }
    }
}

/// Static description of one coin on one network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinConfig {
    pub name: String,
    pub full_name: String,
    pub family: ChainFamily,
    pub network: NetworkType,
    pub decimals: u32,
    /// Minimum fee in base units, 0 for chains without a fee floor
    pub min_fee: u64,
    pub params: NetworkParams,
}

impl CoinConfig {
    /// Parses and validates a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CoinConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the parameters belong to the declared chain family and are well formed
    pub fn validate(&self) -> Result<(), ConfigError> {
        let params = self.params.family();
        if params != self.family {
            return Err(ConfigError::FamilyMismatch { family: self.family, params })
        }
        match &self.params {
            NetworkParams::Algorand { genesis_id, .. } if genesis_id.is_empty() => {
                Err(ConfigError::InvalidParameter {
                    field: "genesisId",
                    reason: "must not be empty".into(),
                })
            }
            NetworkParams::Algorand { genesis_hash, .. } => match STANDARD.decode(genesis_hash) {
                Ok(hash) if hash.len() == 32 => Ok(()),
                _ => Err(ConfigError::InvalidParameter {
                    field: "genesisHash",
                    reason: "must be 32 base64 encoded bytes".into(),
                }),
            },
            NetworkParams::Tron { default_expiration_ms, max_expiration_ms }
                if default_expiration_ms > max_expiration_ms =>
            {
                Err(ConfigError::InvalidParameter {
                    field: "defaultExpirationMs",
                    reason: format!("exceeds the maximum of {max_expiration_ms}"),
                })
            }
            NetworkParams::Eos { chain_id } => match hex::decode(chain_id) {
                Ok(id) if id.len() == 32 => Ok(()),
                _ => Err(ConfigError::InvalidParameter {
                    field: "chainId",
                    reason: "must be 32 hex encoded bytes".into(),
                }),
            },
            _ => Ok(()),
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.network == NetworkType::Mainnet
    }
}

const ALGORAND_MAINNET_GENESIS_HASH: &str = "wGHE2Pwdvd7S12BL5FaOP20EGYesN73ktiC1qzkkit8=";
const ALGORAND_TESTNET_GENESIS_HASH: &str = "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=";
const EOS_MAINNET_CHAIN_ID: &str =
    "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906";
const EOS_TESTNET_CHAIN_ID: &str =
    "e70aaab8997e1dfce58fbfac80cbbb8fecec7b99cf982a9444273cbc64c41473";

impl Coin {
    pub fn family(&self) -> ChainFamily {
        match self {
            Coin::Algo | Coin::Talgo => ChainFamily::Algorand,
            Coin::Stx | Coin::Tstx => ChainFamily::Stacks,
            Coin::Trx | Coin::Ttrx => ChainFamily::Tron,
            Coin::Eos | Coin::Teos => ChainFamily::Eos,
        }
    }

    pub fn network(&self) -> NetworkType {
        match self {
            Coin::Algo | Coin::Stx | Coin::Trx | Coin::Eos => NetworkType::Mainnet,
            Coin::Talgo | Coin::Tstx | Coin::Ttrx | Coin::Teos => NetworkType::Testnet,
        }
    }

    /// The built-in network table entry for this coin
    pub fn config(&self) -> CoinConfig {
        let mainnet = self.network() == NetworkType::Mainnet;
        let (full_name, decimals, min_fee, params) = match self.family() {
            ChainFamily::Algorand => (
                "Algorand",
                6,
                1000,
                NetworkParams::Algorand {
                    genesis_id: if mainnet { "mainnet-v1.0" } else { "testnet-v1.0" }.into(),
                    genesis_hash: if mainnet {
                        ALGORAND_MAINNET_GENESIS_HASH
                    } else {
                        ALGORAND_TESTNET_GENESIS_HASH
                    }
                    .into(),
                },
            ),
            ChainFamily::Stacks => (
                "Stacks",
                6,
                180,
                if mainnet {
                    NetworkParams::Stacks {
                        chain_id: 0x0000_0001,
                        transaction_version: 0x00,
                        single_sig_version: 22,
                        multisig_version: 20,
                    }
                } else {
                    NetworkParams::Stacks {
                        chain_id: 0x8000_0000,
                        transaction_version: 0x80,
                        single_sig_version: 26,
                        multisig_version: 21,
                    }
                },
            ),
            ChainFamily::Tron => (
                "Tron",
                6,
                0,
                NetworkParams::Tron {
                    default_expiration_ms: 60_000,
                    max_expiration_ms: 86_400_000,
                },
            ),
            ChainFamily::Eos => (
                "EOS",
                4,
                0,
                NetworkParams::Eos {
                    chain_id: if mainnet { EOS_MAINNET_CHAIN_ID } else { EOS_TESTNET_CHAIN_ID }
                        .into(),
                },
            ),
        };
        CoinConfig {
            name: self.to_string(),
            full_name: if mainnet { full_name.to_string() } else { format!("Testnet {full_name}") },
            family: self.family(),
            network: self.network(),
            decimals,
            min_fee,
            params,
        }
    }

    /// Resolves a coin identifier such as `"tstx"`
    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        Coin::from_str(&id.to_ascii_lowercase()).map_err(|_| ConfigError::UnknownCoin(id.into()))
    }
}
