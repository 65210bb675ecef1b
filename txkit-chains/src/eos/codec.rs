use super::account::Asset;
use crate::{
    codec::{
        append_weighted, decode_weighted, expect_items, fixed, open_envelope, seal_envelope,
        ChainCodec, Decoded,
    },
    BuilderError,
};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use txkit_core::{
    types::SignatureLedger,
    utils::{sha256, sha256_concat},
};

pub const TRANSFER: &str = "transfer";
pub const DELEGATE_BW: &str = "delegatebw";
pub const UNDELEGATE_BW: &str = "undelegatebw";
pub const NEW_ACCOUNT: &str = "newaccount";
pub const BUY_RAM_BYTES: &str = "buyrambytes";

/// Permission level every action is authorized with
pub const ACTIVE_PERMISSION: &str = "active";

/// The payload of one action, keyed by action name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionData {
    Transfer { from: String, to: String, quantity: Asset, memo: String },
    DelegateBw { from: String, receiver: String, net: Asset, cpu: Asset, transfer: bool },
    UndelegateBw { from: String, receiver: String, net: Asset, cpu: Asset },
    NewAccount { creator: String, name: String, owner: [u8; 33], active: [u8; 33] },
    BuyRamBytes { payer: String, receiver: String, bytes: u32 },
}

impl ActionData {
    pub fn name(&self) -> &'static str {
        match self {
            ActionData::Transfer { .. } => TRANSFER,
            ActionData::DelegateBw { .. } => DELEGATE_BW,
            ActionData::UndelegateBw { .. } => UNDELEGATE_BW,
            ActionData::NewAccount { .. } => NEW_ACCOUNT,
            ActionData::BuyRamBytes { .. } => BUY_RAM_BYTES,
        }
    }

    fn decode(name: &str, rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        let asset = |index: usize| -> Result<Asset, DecoderError> {
            rlp.val_at::<String>(index)?
                .parse()
                .map_err(|_| DecoderError::Custom("malformed asset"))
        };
        let data = match name {
            TRANSFER => {
                expect_items(rlp, 4)?;
                ActionData::Transfer {
                    from: rlp.val_at(0)?,
                    to: rlp.val_at(1)?,
                    quantity: asset(2)?,
                    memo: rlp.val_at(3)?,
                }
            }
            DELEGATE_BW => {
                expect_items(rlp, 5)?;
                ActionData::DelegateBw {
                    from: rlp.val_at(0)?,
                    receiver: rlp.val_at(1)?,
                    net: asset(2)?,
                    cpu: asset(3)?,
                    transfer: rlp.val_at(4)?,
                }
            }
            UNDELEGATE_BW => {
                expect_items(rlp, 4)?;
                ActionData::UndelegateBw {
                    from: rlp.val_at(0)?,
                    receiver: rlp.val_at(1)?,
                    net: asset(2)?,
                    cpu: asset(3)?,
                }
            }
            NEW_ACCOUNT => {
                expect_items(rlp, 4)?;
                ActionData::NewAccount {
                    creator: rlp.val_at(0)?,
                    name: rlp.val_at(1)?,
                    owner: fixed(rlp, 2)?,
                    active: fixed(rlp, 3)?,
                }
            }
            BUY_RAM_BYTES => {
                expect_items(rlp, 3)?;
                ActionData::BuyRamBytes {
                    payer: rlp.val_at(0)?,
                    receiver: rlp.val_at(1)?,
                    bytes: rlp.val_at(2)?,
                }
            }
            _ => return Err(DecoderError::Custom("unknown action")),
        };
        Ok(data)
    }
}

impl Encodable for ActionData {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            ActionData::Transfer { from, to, quantity, memo } => {
                s.begin_list(4);
                s.append(from).append(to).append(&quantity.to_string()).append(memo);
            }
            ActionData::DelegateBw { from, receiver, net, cpu, transfer } => {
                s.begin_list(5);
                s.append(from).append(receiver).append(&net.to_string()).append(&cpu.to_string());
                s.append(transfer);
            }
            ActionData::UndelegateBw { from, receiver, net, cpu } => {
                s.begin_list(4);
                s.append(from).append(receiver).append(&net.to_string()).append(&cpu.to_string());
            }
            ActionData::NewAccount { creator, name, owner, active } => {
                s.begin_list(4);
                s.append(creator).append(name).append(&owner.to_vec()).append(&active.to_vec());
            }
            ActionData::BuyRamBytes { payer, receiver, bytes } => {
                s.begin_list(3);
                s.append(payer).append(receiver).append(bytes);
            }
        }
    }
}

/// A contract action authorized by `actor@active`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EosAction {
    /// The contract account
    pub account: String,
    pub actor: String,
    pub data: ActionData,
}

impl EosAction {
    pub fn name(&self) -> &'static str {
        self.data.name()
    }
}

impl Encodable for EosAction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&self.account);
        s.append(&self.name());
        s.append(&self.actor);
        s.append(&ACTIVE_PERMISSION);
        s.append(&self.data);
    }
}

impl Decodable for EosAction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        expect_items(rlp, 5)?;
        let name: String = rlp.val_at(1)?;
        let permission: String = rlp.val_at(3)?;
        if permission != ACTIVE_PERMISSION {
            return Err(DecoderError::Custom("unsupported permission"))
        }
        Ok(Self {
            account: rlp.val_at(0)?,
            actor: rlp.val_at(2)?,
            data: ActionData::decode(&name, &rlp.at(4)?)?,
        })
    }
}

/// An unsigned EOS transaction. It has no fee field; resources are billed to the actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EosTransaction {
    /// Seconds since the epoch
    pub expiration: u32,
    /// Lower 16 bits of the reference block number
    pub ref_block_num: u16,
    /// Bytes 8 to 11 of the reference block id, little endian
    pub ref_block_prefix: u32,
    pub actions: Vec<EosAction>,
}

impl Encodable for EosTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&self.actions.first().map(EosAction::name).unwrap_or_default());
        s.append(&self.expiration);
        s.append(&self.ref_block_num);
        s.append(&self.ref_block_prefix);
        s.append_list::<EosAction, _>(&self.actions);
    }
}

impl Decodable for EosTransaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        expect_items(rlp, 5)?;
        let discriminator: String = rlp.val_at(0)?;
        let actions: Vec<EosAction> = rlp.list_at(4)?;
        match actions.first() {
            Some(first) if first.name() == discriminator => {}
            Some(_) => return Err(DecoderError::Custom("discriminator does not match actions")),
            None => return Err(DecoderError::Custom("transaction has no actions")),
        }
        Ok(Self {
            expiration: rlp.val_at(1)?,
            ref_block_num: rlp.val_at(2)?,
            ref_block_prefix: rlp.val_at(3)?,
            actions,
        })
    }
}

/// EOS framing. Signatures cover the chain id, so the same bytes cannot be replayed on
/// another network. The authorization has the same shape as Tron's: signatures in the order
/// they were collected followed by the weighted keys they answer to.
#[derive(Clone, Copy, Debug)]
pub struct EosCodec {
    pub chain_id: [u8; 32],
}

impl EosCodec {
    pub fn new(chain_id: [u8; 32]) -> Self {
        Self { chain_id }
    }
}

impl ChainCodec for EosCodec {
    type Transaction = EosTransaction;

    fn encode(&self, tx: &EosTransaction) -> Vec<u8> {
        rlp::encode(tx).to_vec()
    }

    fn decode(&self, raw: &[u8]) -> Result<Decoded<EosTransaction>, BuilderError> {
        let (unsigned, auth) = open_envelope(raw)?;
        let transaction: EosTransaction = unsigned.as_val()?;
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
        sha256_concat(&[&self.chain_id[..], unsigned, &[0u8; 32][..]]).to_vec()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_utils::sign_prehash;
    use txkit_core::types::{Algorithm, KeyMaterial};

    fn eos(amount: u64) -> Asset {
        Asset::new(amount, 4, "EOS")
    }

    fn wallet_initialization() -> EosTransaction {
        let key = hex_literal::hex!(
            "02c0ded2bc1f1305fb0faac5e6c03ee3a1924234985427b6167ca569d13df435cf"
        );
        let action = |data| EosAction { account: "eosio".into(), actor: "creator".into(), data };
        EosTransaction {
            expiration: 1_600_000_000,
            ref_block_num: 0x1234,
            ref_block_prefix: 0xdeadbeef,
            actions: vec![
                action(ActionData::NewAccount {
                    creator: "creator".into(),
                    name: "newaccount11".into(),
                    owner: key,
                    active: key,
                }),
                action(ActionData::BuyRamBytes {
                    payer: "creator".into(),
                    receiver: "newaccount11".into(),
                    bytes: 8192,
                }),
                action(ActionData::DelegateBw {
                    from: "creator".into(),
                    receiver: "newaccount11".into(),
                    net: eos(10_000),
                    cpu: eos(10_000),
                    transfer: true,
                }),
            ],
        }
    }

    #[test]
    fn decodes_every_action() {
        let codec = EosCodec::new([7u8; 32]);
        let tx = wallet_initialization();
        let unsigned = codec.encode(&tx);
        assert_eq!(crate::codec::discriminator(&unsigned).unwrap(), NEW_ACCOUNT);
        assert_eq!(codec.decode(&unsigned).unwrap().transaction, tx);
    }

    #[test]
    fn signatures_are_bound_to_the_chain() {
        let key = KeyMaterial::from_private(Algorithm::Secp256k1, &[1u8; 32]).unwrap();
        let mainnet = EosCodec::new([1u8; 32]);
        let testnet = EosCodec::new([2u8; 32]);
        let unsigned = mainnet.encode(&wallet_initialization());
        assert_ne!(mainnet.signing_message(&unsigned), testnet.signing_message(&unsigned));
        assert_eq!(mainnet.compute_id(&unsigned), testnet.compute_id(&unsigned));

        let mut ledger = SignatureLedger::new();
        let signature = sign_prehash(&key, &mainnet.signing_message(&unsigned));
        ledger.append(key.identity(), signature).unwrap();
        let broadcast = mainnet.aggregate(&unsigned, &ledger).unwrap();

        assert_eq!(mainnet.decode(&broadcast).unwrap().signatures[0].0, key.identity());
        // recovery on the other chain yields some other key
        assert_ne!(testnet.decode(&broadcast).unwrap().signatures[0].0, key.identity());
    }

    #[test]
    fn rejects_mismatched_discriminator() {
        let mut s = RlpStream::new_list(5);
        s.append(&TRANSFER);
        s.append(&1u32);
        s.append(&1u16);
        s.append(&1u32);
        s.append_list::<EosAction, _>(&wallet_initialization().actions);
        let decoded = EosCodec::new([0u8; 32]).decode(&s.out());
        assert!(matches!(decoded, Err(BuilderError::Parse(_))));
    }
}
