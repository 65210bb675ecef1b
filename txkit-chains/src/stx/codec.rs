use super::address::{StacksAddress, MAX_MULTISIG_KEYS};
use crate::{
    codec::{expect_items, fixed, open_envelope, seal_envelope, ChainCodec, Decoded},
    BuilderError,
};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use txkit_core::{
    types::{
        recover_secp256k1, Algorithm, Authority, Bytes, Discipline, SignatureLedger,
        SignatureOrder, SignerId, ThresholdPolicy,
    },
    utils::sha512_256,
};

/// Payload type of a STX token transfer
pub const TOKEN_TRANSFER: &str = "TokenTransfer";

/// Maximum memo size in bytes
pub const MAX_MEMO_LEN: usize = 34;

const FIELD_PUBLIC_KEY: u8 = 0x00;
const FIELD_SIGNATURE: u8 = 0x02;

/// How the spending condition's signer hash is derived
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashMode {
    /// HASH160 of one public key
    P2pkh = 0x00,
    /// HASH160 of a multisig redeem script
    P2sh = 0x01,
}

impl TryFrom<u8> for HashMode {
    type Error = DecoderError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(HashMode::P2pkh),
            0x01 => Ok(HashMode::P2sh),
            _ => Err(DecoderError::Custom("unknown hash mode")),
        }
    }
}

/// An unsigned STX token transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StxTransaction {
    pub version: u8,
    pub chain_id: u32,
    pub hash_mode: HashMode,
    /// HASH160 identifying the origin account
    pub signer: [u8; 20],
    pub nonce: u64,
    pub fee: u64,
    pub recipient: StacksAddress,
    pub amount: u64,
    pub memo: Vec<u8>,
}

impl Encodable for StxTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(11);
        s.append(&TOKEN_TRANSFER);
        s.append(&self.version);
        s.append(&self.chain_id);
        s.append(&(self.hash_mode as u8));
        s.append(&self.signer.to_vec());
        s.append(&self.nonce);
        s.append(&self.fee);
        s.append(&self.recipient.version);
        s.append(&self.recipient.hash.to_vec());
        s.append(&self.amount);
        s.append(&self.memo);
    }
}

impl Decodable for StxTransaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        expect_items(rlp, 11)?;
        let payload: String = rlp.val_at(0)?;
        if payload != TOKEN_TRANSFER {
            return Err(DecoderError::Custom("unknown payload type"))
        }
        Ok(Self {
            version: rlp.val_at(1)?,
            chain_id: rlp.val_at(2)?,
            hash_mode: HashMode::try_from(rlp.val_at::<u8>(3)?)?,
            signer: fixed(rlp, 4)?,
            nonce: rlp.val_at(5)?,
            fee: rlp.val_at(6)?,
            recipient: StacksAddress::new(rlp.val_at(7)?, fixed(rlp, 8)?),
            amount: rlp.val_at(9)?,
            memo: rlp.val_at(10)?,
        })
    }
}

/// Stacks framing. The authorization is `[threshold, [field ...]]` where each field is
/// `[0x02, signature]` for a key that signed or `[0x00, public key]` for one that did not.
///
/// Single signature transactions carry at most one signature field. Multisig transactions carry
/// one field per declared key in declared order, so the redeem script can be rebuilt from the
/// public keys and the keys recovered from the signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct StxCodec;

impl StxCodec {
    fn decode_authorization(
        tx: &StxTransaction,
        message: &[u8],
        auth: &Rlp<'_>,
    ) -> Result<(Vec<(SignerId, Bytes)>, Option<Discipline>), BuilderError> {
        expect_items(auth, 2)?;
        let threshold: u8 = auth.val_at(0)?;
        let fields = auth.at(1)?;
        let count = fields.item_count()?;
        if count > MAX_MULTISIG_KEYS {
            return Err(BuilderError::Parse(format!(
                "{count} auth fields, at most {MAX_MULTISIG_KEYS} allowed"
            )))
        }
        let mut declared = Vec::with_capacity(count);
        let mut signatures = Vec::new();
        for field in fields.iter() {
            expect_items(&field, 2)?;
            let kind: u8 = field.val_at(0)?;
            let data: Bytes = field.val_at(1)?;
            let key = match kind {
                FIELD_PUBLIC_KEY => SignerId::from_public_key(Algorithm::Secp256k1, &data)
                    .map_err(|e| BuilderError::Parse(e.to_string()))?,
                FIELD_SIGNATURE => {
                    let signer = recover_secp256k1(message, &data)
                        .map_err(|e| BuilderError::Parse(e.to_string()))?;
                    signatures.push((signer.clone(), data));
                    signer
                }
                other => {
                    return Err(BuilderError::Parse(format!("unknown auth field {other:#04x}")))
                }
            };
            declared.push(key);
        }

        match tx.hash_mode {
            HashMode::P2pkh => {
                if threshold != 1 || declared.len() > 1 {
                    return Err(BuilderError::Parse("malformed single signature auth".into()))
                }
                if let Some(signer) = declared.first() {
                    if StacksAddress::from_public_key(0, signer).hash != tx.signer {
                        return Err(BuilderError::Parse(format!(
                            "signature by {signer} does not match the origin account"
                        )))
                    }
                }
                Ok((signatures, Some(Discipline::SingleKey)))
            }
            HashMode::P2sh => {
                let script_hash = StacksAddress::from_multisig(0, threshold, &declared)
                    .map_err(|e| BuilderError::Parse(e.to_string()))?
                    .hash;
                if script_hash != tx.signer {
                    return Err(BuilderError::Parse(
                        "multisig keys do not match the origin account".into(),
                    ))
                }
                let authority = Authority::unweighted(threshold as u32, declared)
                    .map_err(|e| BuilderError::Parse(e.to_string()))?;
                Ok((
                    signatures,
                    Some(Discipline::Threshold {
                        authority,
                        order: SignatureOrder::Declared,
                        policy: ThresholdPolicy::Exactly,
                    }),
                ))
            }
        }
    }
}

fn append_field(s: &mut RlpStream, kind: u8, data: &[u8]) {
    s.begin_list(2);
    s.append(&kind);
    s.append(&data);
}

impl ChainCodec for StxCodec {
    type Transaction = StxTransaction;

    fn encode(&self, tx: &StxTransaction) -> Vec<u8> {
        rlp::encode(tx).to_vec()
    }

    fn decode(&self, raw: &[u8]) -> Result<Decoded<StxTransaction>, BuilderError> {
        let (unsigned, auth) = open_envelope(raw)?;
        let transaction: StxTransaction = unsigned.as_val()?;
        let (signatures, discipline) = match auth {
            Some(auth) => {
                let message = self.signing_message(unsigned.as_raw());
                Self::decode_authorization(&transaction, &message, &auth)?
            }
            None => (Vec::new(), None),
        };
        Ok(Decoded { transaction, signatures, discipline })
    }

    fn compute_id(&self, unsigned: &[u8]) -> String {
        hex::encode(sha512_256(unsigned))
    }

    fn signing_message(&self, unsigned: &[u8]) -> Vec<u8> {
        sha512_256(unsigned).to_vec()
    }

    fn aggregate(
        &self,
        unsigned: &[u8],
        ledger: &SignatureLedger,
    ) -> Result<Vec<u8>, BuilderError> {
        let mut s = RlpStream::new_list(2);
        match ledger.discipline() {
            Discipline::SingleKey => {
                s.append(&1u8);
                s.begin_list(ledger.len());
                for entry in ledger.entries() {
                    append_field(&mut s, FIELD_SIGNATURE, &entry.signature);
                }
            }
            Discipline::Threshold { authority, .. } => {
                let threshold = u8::try_from(authority.threshold()).map_err(|_| {
                    BuilderError::InvalidConfiguration("multisig threshold above 255".into())
                })?;
                let slots = ledger.positional();
                s.append(&threshold);
                s.begin_list(slots.len());
                for (key, entry) in slots {
                    match entry {
                        Some(entry) => append_field(&mut s, FIELD_SIGNATURE, &entry.signature),
                        None => append_field(&mut s, FIELD_PUBLIC_KEY, key.signer.as_bytes()),
                    }
                }
            }
        }
        Ok(seal_envelope(unsigned, &s.out()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_utils::sign_prehash;
    use txkit_core::types::KeyMaterial;

    fn key(seed: u8) -> KeyMaterial {
        KeyMaterial::from_private(Algorithm::Secp256k1, &[seed; 32]).unwrap()
    }

    fn transfer(hash_mode: HashMode, signer: [u8; 20]) -> StxTransaction {
        StxTransaction {
            version: 0x80,
            chain_id: 0x8000_0000,
            hash_mode,
            signer,
            nonce: 3,
            fee: 180,
            recipient: StacksAddress::new(26, [7u8; 20]),
            amount: 1000,
            memo: b"invoice 12".to_vec(),
        }
    }

    #[test]
    fn single_signature_restores_signer() {
        let key = key(1);
        let origin = StacksAddress::from_public_key(26, &key.identity()).hash;
        let tx = transfer(HashMode::P2pkh, origin);
        let codec = StxCodec;
        let unsigned = codec.encode(&tx);
        let mut ledger = SignatureLedger::new();
        let signature = sign_prehash(&key, &codec.signing_message(&unsigned));
        ledger.append(key.identity(), signature).unwrap();

        let decoded = codec.decode(&codec.aggregate(&unsigned, &ledger).unwrap()).unwrap();
        assert_eq!(decoded.transaction, tx);
        assert_eq!(decoded.signatures.len(), 1);
        assert_eq!(decoded.signatures[0].0, key.identity());
        assert_eq!(decoded.discipline, Some(Discipline::SingleKey));
        assert_eq!(codec.compute_id(&unsigned).len(), 64);
    }

    #[test]
    fn rejects_signature_from_another_account() {
        let tx = transfer(HashMode::P2pkh, [0u8; 20]);
        let codec = StxCodec;
        let unsigned = codec.encode(&tx);
        let key = key(2);
        let mut ledger = SignatureLedger::new();
        let signature = sign_prehash(&key, &codec.signing_message(&unsigned));
        ledger.append(key.identity(), signature).unwrap();
        let broadcast = codec.aggregate(&unsigned, &ledger).unwrap();
        assert!(matches!(codec.decode(&broadcast), Err(BuilderError::Parse(_))));
    }

    #[test]
    fn multisig_fields_keep_declared_order() {
        let keys: Vec<KeyMaterial> = (1..=3).map(key).collect();
        let ids: Vec<SignerId> = keys.iter().map(KeyMaterial::identity).collect();
        let tx = transfer(HashMode::P2sh, StacksAddress::from_multisig(21, 2, &ids).unwrap().hash);
        let discipline = Discipline::Threshold {
            authority: Authority::unweighted(2, ids.clone()).unwrap(),
            order: SignatureOrder::Declared,
            policy: ThresholdPolicy::Exactly,
        };
        let codec = StxCodec;
        let unsigned = codec.encode(&tx);
        let digest = codec.signing_message(&unsigned);
        let mut ledger = SignatureLedger::with_discipline(discipline.clone());
        ledger.append(ids[2].clone(), sign_prehash(&keys[2], &digest)).unwrap();

        let decoded = codec.decode(&codec.aggregate(&unsigned, &ledger).unwrap()).unwrap();
        assert_eq!(decoded.discipline, Some(discipline));
        assert_eq!(decoded.signatures.len(), 1);
        assert_eq!(decoded.signatures[0].0, ids[2]);
    }

    #[test]
    fn rejects_unknown_hash_mode() {
        let mut s = RlpStream::new_list(11);
        s.append(&TOKEN_TRANSFER);
        s.append(&0x80u8);
        s.append(&1u32);
        s.append(&7u8);
        for _ in 0..7 {
            s.append_empty_data();
        }
        assert!(matches!(StxCodec.decode(&s.out()), Err(BuilderError::Parse(_))));
    }

    fn public_field(s: &mut RlpStream, key: &KeyMaterial) {
        append_field(s, FIELD_PUBLIC_KEY, key.public_key());
    }

    #[test]
    fn rejects_corrupt_multisig_authorizations() {
        let keys: Vec<KeyMaterial> = (1..=17).map(key).collect();
        let ids: Vec<SignerId> = keys[..3].iter().map(KeyMaterial::identity).collect();
        let tx = transfer(HashMode::P2sh, StacksAddress::from_multisig(21, 2, &ids).unwrap().hash);
        let unsigned = StxCodec.encode(&tx);

        let mut cases = Vec::new();
        // thresholds no redeem script can express
        for threshold in [0u8, 4, 200] {
            let mut s = RlpStream::new_list(2);
            s.append(&threshold);
            s.begin_list(3);
            for key in &keys[..3] {
                public_field(&mut s, key);
            }
            cases.push(s.out().to_vec());
        }
        let mut s = RlpStream::new_list(2);
        s.append(&200u8);
        s.begin_list(0);
        cases.push(s.out().to_vec());
        // more keys than a script can hold
        let mut s = RlpStream::new_list(2);
        s.append(&2u8);
        s.begin_list(17);
        for key in &keys {
            public_field(&mut s, key);
        }
        cases.push(s.out().to_vec());
        // unknown field kind
        let mut s = RlpStream::new_list(2);
        s.append(&2u8);
        s.begin_list(1);
        append_field(&mut s, 0x07, keys[0].public_key());
        cases.push(s.out().to_vec());
        // truncated signature
        let mut s = RlpStream::new_list(2);
        s.append(&2u8);
        s.begin_list(1);
        append_field(&mut s, FIELD_SIGNATURE, &[1u8; 10]);
        cases.push(s.out().to_vec());

        for auth in cases {
            let raw = seal_envelope(&unsigned, &auth);
            assert!(
                matches!(StxCodec.decode(&raw), Err(BuilderError::Parse(_))),
                "accepted {}",
                hex::encode(&auth)
            );
        }
    }
}
