use super::address::{multisig_account, MULTISIG_VERSION};
use crate::{
    codec::{
        append_opt, expect_items, fixed, fixed_opt, open_envelope, seal_envelope, ChainCodec,
        Decoded,
    },
    BuilderError,
};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use txkit_core::{
    types::{
        verify_signature, Algorithm, Authority, Bytes, Discipline, SignatureLedger,
        SignatureOrder, SignerId, ThresholdPolicy,
    },
    utils::{base32_encode, sha512_256_concat},
};

/// Domain separation prefix for transaction signatures and ids
pub const TX_PREFIX: &[u8] = b"TX";

const PAY: &str = "pay";
const KEYREG: &str = "keyreg";

/// Number of fields shared by every transaction type, including the discriminator
const COMMON_FIELDS: usize = 10;

/// Type specific fields of an Algorand transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AlgoPayload {
    Payment {
        receiver: [u8; 32],
        amount: u64,
        close_remainder_to: Option<[u8; 32]>,
    },
    KeyRegistration {
        vote_key: [u8; 32],
        selection_key: [u8; 32],
        vote_first: u64,
        vote_last: u64,
        vote_key_dilution: u64,
    },
}

impl AlgoPayload {
    pub fn discriminator(&self) -> &'static str {
        match self {
            AlgoPayload::Payment { .. } => PAY,
            AlgoPayload::KeyRegistration { .. } => KEYREG,
        }
    }

    fn field_count(&self) -> usize {
        match self {
            AlgoPayload::Payment { .. } => 3,
            AlgoPayload::KeyRegistration { .. } => 5,
        }
    }
}

/// An unsigned Algorand transaction. Accounts are held as their 32-byte public keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlgoTransaction {
    pub fee: u64,
    pub first_round: u64,
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
    pub sender: [u8; 32],
    pub note: Vec<u8>,
    pub lease: Option<[u8; 32]>,
    pub rekey_to: Option<[u8; 32]>,
    pub payload: AlgoPayload,
}

impl Encodable for AlgoTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(COMMON_FIELDS + self.payload.field_count());
        s.append(&self.payload.discriminator());
        s.append(&self.fee);
        s.append(&self.first_round);
        s.append(&self.last_round);
        s.append(&self.genesis_id);
        s.append(&self.genesis_hash.to_vec());
        s.append(&self.sender.to_vec());
        s.append(&self.note);
        append_opt(s, self.lease.as_ref().map(|l| &l[..]));
        append_opt(s, self.rekey_to.as_ref().map(|r| &r[..]));
        match &self.payload {
            AlgoPayload::Payment { receiver, amount, close_remainder_to } => {
                s.append(&receiver.to_vec());
                s.append(amount);
                append_opt(s, close_remainder_to.as_ref().map(|c| &c[..]));
            }
            AlgoPayload::KeyRegistration {
                vote_key,
                selection_key,
                vote_first,
                vote_last,
                vote_key_dilution,
            } => {
                s.append(&vote_key.to_vec());
                s.append(&selection_key.to_vec());
                s.append(vote_first);
                s.append(vote_last);
                s.append(vote_key_dilution);
            }
        }
    }
}

impl Decodable for AlgoTransaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let discriminator: String = rlp.val_at(0)?;
        let payload = match discriminator.as_str() {
            PAY => {
                expect_items(rlp, COMMON_FIELDS + 3)?;
                AlgoPayload::Payment {
                    receiver: fixed(rlp, COMMON_FIELDS)?,
                    amount: rlp.val_at(COMMON_FIELDS + 1)?,
                    close_remainder_to: fixed_opt(rlp, COMMON_FIELDS + 2)?,
                }
            }
            KEYREG => {
                expect_items(rlp, COMMON_FIELDS + 5)?;
                AlgoPayload::KeyRegistration {
                    vote_key: fixed(rlp, COMMON_FIELDS)?,
                    selection_key: fixed(rlp, COMMON_FIELDS + 1)?,
                    vote_first: rlp.val_at(COMMON_FIELDS + 2)?,
                    vote_last: rlp.val_at(COMMON_FIELDS + 3)?,
                    vote_key_dilution: rlp.val_at(COMMON_FIELDS + 4)?,
                }
            }
            _ => return Err(DecoderError::Custom("unknown transaction type")),
        };
        Ok(Self {
            fee: rlp.val_at(1)?,
            first_round: rlp.val_at(2)?,
            last_round: rlp.val_at(3)?,
            genesis_id: rlp.val_at(4)?,
            genesis_hash: fixed(rlp, 5)?,
            sender: fixed(rlp, 6)?,
            note: rlp.val_at(7)?,
            lease: fixed_opt(rlp, 8)?,
            rekey_to: fixed_opt(rlp, 9)?,
            payload,
        })
    }
}

const SINGLE_SIG: &str = "sig";
const MULTI_SIG: &str = "msig";

/// Algorand framing. The authorization is one of
///
/// ```text
/// []                                                  unsigned
/// ["sig", signer, signature]                          single signature
/// ["msig", version, threshold, [[key, sig | ""] ...]] one subsignature per declared key
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct AlgoCodec;

impl AlgoCodec {
    fn decode_authorization(
        auth: &Rlp<'_>,
    ) -> Result<(Vec<(SignerId, Bytes)>, Option<Discipline>), BuilderError> {
        if auth.item_count()? == 0 {
            return Ok((Vec::new(), None))
        }
        let kind: String = auth.val_at(0)?;
        match kind.as_str() {
            SINGLE_SIG => {
                expect_items(auth, 3)?;
                let signer: [u8; 32] = fixed(auth, 1)?;
                let signature: Bytes = auth.val_at(2)?;
                let signer = SignerId::from_public_key(Algorithm::Ed25519, &signer)
                    .map_err(|e| BuilderError::Parse(e.to_string()))?;
                Ok((vec![(signer, signature)], Some(Discipline::SingleKey)))
            }
            MULTI_SIG => {
                expect_items(auth, 4)?;
                let version: u8 = auth.val_at(1)?;
                if version != MULTISIG_VERSION {
                    return Err(BuilderError::Parse(format!(
                        "unsupported multisig version {version}"
                    )))
                }
                let threshold: u8 = auth.val_at(2)?;
                let subsigs = auth.at(3)?;
                let mut declared = Vec::with_capacity(subsigs.item_count()?);
                let mut signatures = Vec::new();
                for subsig in subsigs.iter() {
                    expect_items(&subsig, 2)?;
                    let key: [u8; 32] = fixed(&subsig, 0)?;
                    let signer = SignerId::from_public_key(Algorithm::Ed25519, &key)
                        .map_err(|e| BuilderError::Parse(e.to_string()))?;
                    let signature: Bytes = subsig.val_at(1)?;
                    if !signature.is_empty() {
                        signatures.push((signer.clone(), signature));
                    }
                    declared.push(signer);
                }
                let authority = Authority::unweighted(threshold as u32, declared)
                    .map_err(|e| BuilderError::Parse(e.to_string()))?;
                Ok((
                    signatures,
                    Some(Discipline::Threshold {
                        authority,
                        order: SignatureOrder::Declared,
                        policy: ThresholdPolicy::AtLeast,
                    }),
                ))
            }
            other => Err(BuilderError::Parse(format!("unknown authorization {other:?}"))),
        }
    }
}

/// The declared keys of a multisig authority as raw ed25519 public keys
pub(crate) fn declared_keys(authority: &Authority) -> Vec<[u8; 32]> {
    authority
        .keys()
        .iter()
        .filter_map(|k| k.signer.as_bytes().try_into().ok())
        .collect()
}

/// The account a multisig authority signs for
pub(crate) fn authority_account(authority: &Authority) -> [u8; 32] {
    let threshold = u8::try_from(authority.threshold()).unwrap_or(u8::MAX);
    multisig_account(MULTISIG_VERSION, threshold, &declared_keys(authority))
}

impl ChainCodec for AlgoCodec {
    type Transaction = AlgoTransaction;

    fn encode(&self, tx: &AlgoTransaction) -> Vec<u8> {
        rlp::encode(tx).to_vec()
    }

    fn decode(&self, raw: &[u8]) -> Result<Decoded<AlgoTransaction>, BuilderError> {
        let (unsigned, auth) = open_envelope(raw)?;
        let transaction: AlgoTransaction = unsigned.as_val()?;
        let (signatures, discipline) = match auth {
            Some(auth) => Self::decode_authorization(&auth)?,
            None => (Vec::new(), None),
        };
        let message = self.signing_message(unsigned.as_raw());
        for (signer, signature) in &signatures {
            verify_signature(Algorithm::Ed25519, signer, &message, signature).map_err(|e| {
                BuilderError::Parse(format!("signature by {signer} does not verify: {e}"))
            })?;
        }
        Ok(Decoded { transaction, signatures, discipline })
    }

    fn compute_id(&self, unsigned: &[u8]) -> String {
        base32_encode(&sha512_256_concat(&[TX_PREFIX, unsigned]))
    }

    fn signing_message(&self, unsigned: &[u8]) -> Vec<u8> {
        [TX_PREFIX, unsigned].concat()
    }

    fn aggregate(
        &self,
        unsigned: &[u8],
        ledger: &SignatureLedger,
    ) -> Result<Vec<u8>, BuilderError> {
        let mut s = RlpStream::new();
        match ledger.discipline() {
            Discipline::SingleKey => match ledger.entries() {
                [] => {
                    s.begin_list(0);
                }
                [entry] => {
                    s.begin_list(3);
                    s.append(&SINGLE_SIG);
                    s.append(&entry.signer.as_bytes());
                    s.append(&entry.signature);
                }
                entries => {
                    return Err(BuilderError::InvalidConfiguration(format!(
                        "{} signatures on a single signature transaction",
                        entries.len()
                    )))
                }
            },
            Discipline::Threshold { authority, .. } => {
                let threshold = u8::try_from(authority.threshold()).map_err(|_| {
                    BuilderError::InvalidConfiguration("multisig threshold above 255".into())
                })?;
                let slots = ledger.positional();
                s.begin_list(4);
                s.append(&MULTI_SIG);
                s.append(&MULTISIG_VERSION);
                s.append(&threshold);
                s.begin_list(slots.len());
                for (key, entry) in slots {
                    s.begin_list(2);
                    s.append(&key.signer.as_bytes());
                    match entry {
                        Some(entry) => s.append(&entry.signature),
                        None => s.append_empty_data(),
                    };
                }
            }
        }
        Ok(seal_envelope(unsigned, &s.out()))
    }
}
