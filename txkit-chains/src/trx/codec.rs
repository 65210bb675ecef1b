use super::address::TronAddress;
use crate::{
    codec::{
        append_weighted, decode_weighted, expect_items, fixed, open_envelope, seal_envelope,
        ChainCodec, Decoded,
    },
    BuilderError,
};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use txkit_core::{types::SignatureLedger, utils::sha256};

pub const TRANSFER_CONTRACT: &str = "TransferContract";
pub const TRIGGER_SMART_CONTRACT: &str = "TriggerSmartContract";

const COMMON_FIELDS: usize = 7;

/// The single contract a transaction carries
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrxContract {
    Transfer { to: TronAddress, amount: u64 },
    TriggerSmartContract { contract: TronAddress, data: Vec<u8>, call_value: u64 },
}

impl TrxContract {
    pub fn contract_type(&self) -> &'static str {
        match self {
            TrxContract::Transfer { .. } => TRANSFER_CONTRACT,
            TrxContract::TriggerSmartContract { .. } => TRIGGER_SMART_CONTRACT,
        }
    }
}

/// The raw data of a Tron transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrxTransaction {
    /// Bytes 6 and 7 of the reference block number
    pub ref_block_bytes: [u8; 2],
    /// Bytes 8 to 15 of the reference block hash
    pub ref_block_hash: [u8; 8],
    /// Milliseconds since the epoch
    pub expiration: u64,
    /// Milliseconds since the epoch
    pub timestamp: u64,
    pub fee_limit: Option<u64>,
    pub owner: TronAddress,
    pub contract: TrxContract,
}

impl Encodable for TrxTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        let extra = match self.contract {
            TrxContract::Transfer { .. } => 2,
            TrxContract::TriggerSmartContract { .. } => 3,
        };
        s.begin_list(COMMON_FIELDS + extra);
        s.append(&self.contract.contract_type());
        s.append(&self.ref_block_bytes.to_vec());
        s.append(&self.ref_block_hash.to_vec());
        s.append(&self.expiration);
        s.append(&self.timestamp);
        s.append(&self.fee_limit.unwrap_or_default());
        s.append(&self.owner.to_vec());
        match &self.contract {
            TrxContract::Transfer { to, amount } => {
                s.append(&to.to_vec());
                s.append(amount);
            }
            TrxContract::TriggerSmartContract { contract, data, call_value } => {
                s.append(&contract.to_vec());
                s.append(data);
                s.append(call_value);
            }
        }
    }
}

impl Decodable for TrxTransaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let contract_type: String = rlp.val_at(0)?;
        let contract = match contract_type.as_str() {
            TRANSFER_CONTRACT => {
                expect_items(rlp, COMMON_FIELDS + 2)?;
                TrxContract::Transfer {
                    to: fixed(rlp, COMMON_FIELDS)?,
                    amount: rlp.val_at(COMMON_FIELDS + 1)?,
                }
            }
            TRIGGER_SMART_CONTRACT => {
                expect_items(rlp, COMMON_FIELDS + 3)?;
                TrxContract::TriggerSmartContract {
                    contract: fixed(rlp, COMMON_FIELDS)?,
                    data: rlp.val_at(COMMON_FIELDS + 1)?,
                    call_value: rlp.val_at(COMMON_FIELDS + 2)?,
                }
            }
            _ => return Err(DecoderError::Custom("unknown contract type")),
        };
        let fee_limit: u64 = rlp.val_at(5)?;
        Ok(Self {
            ref_block_bytes: fixed(rlp, 1)?,
            ref_block_hash: fixed(rlp, 2)?,
            expiration: rlp.val_at(3)?,
            timestamp: rlp.val_at(4)?,
            fee_limit: (fee_limit > 0).then_some(fee_limit),
            owner: fixed(rlp, 6)?,
            contract,
        })
    }
}

/// Tron framing. The authorization carries the signatures in the order they were collected
/// and the permission they answer to, either the owner key alone or a weighted key set.
///
/// Signers are recovered from the signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrxCodec;

impl ChainCodec for TrxCodec {
    type Transaction = TrxTransaction;

    fn encode(&self, tx: &TrxTransaction) -> Vec<u8> {
        rlp::encode(tx).to_vec()
    }

    fn decode(&self, raw: &[u8]) -> Result<Decoded<TrxTransaction>, BuilderError> {
        let (unsigned, auth) = open_envelope(raw)?;
        let transaction: TrxTransaction = unsigned.as_val()?;
        let Some(auth) = auth else {
            return Ok(Decoded { transaction, signatures: Vec::new(), discipline: None })
        };
        let digest = self.signing_message(unsigned.as_raw());
        let (signatures, discipline) = decode_weighted(&auth, &digest)?;
        Ok(Decoded { transaction, signatures, discipline: Some(discipline) })
    }

    fn compute_id(&self, unsigned: &[u8]) -> String {
        hex::encode(sha256(unsigned))
    }

    fn signing_message(&self, unsigned: &[u8]) -> Vec<u8> {
        sha256(unsigned).to_vec()
    }

    fn aggregate(
        &self,
        unsigned: &[u8],
        ledger: &SignatureLedger,
    ) -> Result<Vec<u8>, BuilderError> {
        let mut s = RlpStream::new();
        append_weighted(&mut s, ledger);
        Ok(seal_envelope(unsigned, &s.out()))
    }
}
