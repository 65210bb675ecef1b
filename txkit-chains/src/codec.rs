//! The chain-native encoder boundary and the framing shared by every chain.
//!
//! Unsigned transactions are RLP lists whose first item is the discriminator string (a
//! contract type, an action name or a payload type). Broadcast transactions wrap the unsigned
//! list together with the chain's authorization structure:
//!
//! ```text
//! unsigned  = [discriminator, field, ...]
//! broadcast = [unsigned, authorization]
//! ```
//!
//! Decoding accepts either form, so a transaction can be resumed before or after signing.
use crate::BuilderError;
use rlp::{DecoderError, Rlp, RlpStream};
use txkit_core::types::{
    recover_secp256k1, Algorithm, Authority, Bytes, DeclaredKey, Discipline, SignatureLedger,
    SignatureOrder, SignerId, ThresholdPolicy,
};

/// A decoded transaction: its fields plus any signatures it already carries
#[derive(Clone, Debug)]
pub struct Decoded<T> {
    pub transaction: T,
    /// Signatures in the order they appear in the encoding
    pub signatures: Vec<(SignerId, Bytes)>,
    /// The authorization, when the encoding declares it
    pub discipline: Option<Discipline>,
}

/// Encodes, decodes and identifies transactions for one chain.
///
/// Implementations must be deterministic: the same transaction always encodes to the same
/// bytes.
pub trait ChainCodec: Send + Sync {
    type Transaction: Send + Sync;

    /// The unsigned encoding
    fn encode(&self, tx: &Self::Transaction) -> Vec<u8>;

    /// Decodes unsigned or broadcast bytes
    fn decode(&self, raw: &[u8]) -> Result<Decoded<Self::Transaction>, BuilderError>;

    /// The chain defined transaction identifier of an unsigned encoding
    fn compute_id(&self, unsigned: &[u8]) -> String;

    /// The exact message handed to the signer
    fn signing_message(&self, unsigned: &[u8]) -> Vec<u8>;

    /// Combines the unsigned encoding with the ledger's signatures into broadcast bytes
    fn aggregate(&self, unsigned: &[u8], ledger: &SignatureLedger)
        -> Result<Vec<u8>, BuilderError>;
}

/// Rejects input that is empty, not a list, or followed by trailing bytes
fn checked_list(raw: &[u8]) -> Result<Rlp<'_>, BuilderError> {
    let rlp = Rlp::new(raw);
    let info = rlp.payload_info()?;
    if info.header_len + info.value_len != raw.len() {
        return Err(BuilderError::Parse(format!(
            "encoded length {} does not match input length {}",
            info.header_len + info.value_len,
            raw.len()
        )))
    }
    if !rlp.is_list() {
        return Err(BuilderError::Parse("expected a list".into()))
    }
    Ok(rlp)
}

/// Splits raw bytes into the unsigned list and, for broadcast bytes, the authorization item
pub fn open_envelope(raw: &[u8]) -> Result<(Rlp<'_>, Option<Rlp<'_>>), BuilderError> {
    let rlp = checked_list(raw)?;
    let first = rlp.at(0)?;
    if !first.is_list() {
        return Ok((rlp, None))
    }
    if rlp.item_count()? != 2 {
        return Err(BuilderError::Parse("broadcast envelope must have two items".into()))
    }
    Ok((first, Some(rlp.at(1)?)))
}

/// Wraps an unsigned encoding and an authorization item into broadcast bytes
pub fn seal_envelope(unsigned: &[u8], authorization: &[u8]) -> Vec<u8> {
    let mut s = RlpStream::new_list(2);
    s.append_raw(unsigned, 1);
    s.append_raw(authorization, 1);
    s.out().to_vec()
}

/// Reads the discriminator of unsigned or broadcast bytes without decoding the rest
pub fn discriminator(raw: &[u8]) -> Result<String, BuilderError> {
    let (unsigned, _) = open_envelope(raw)?;
    Ok(unsigned.val_at::<String>(0)?)
}

/// Checks the item count of a decoded list
pub(crate) fn expect_items(rlp: &Rlp<'_>, expected: usize) -> Result<(), DecoderError> {
    match rlp.item_count()? {
        n if n == expected => Ok(()),
        n if n < expected => Err(DecoderError::RlpIsTooShort),
        _ => Err(DecoderError::RlpIsTooBig),
    }
}

/// Reads a fixed size byte string
pub(crate) fn fixed<const N: usize>(rlp: &Rlp<'_>, index: usize) -> Result<[u8; N], DecoderError> {
    let data = rlp.at(index)?;
    data.data()?.try_into().map_err(|_| DecoderError::Custom("unexpected field length"))
}

/// Reads an optional fixed size byte string, encoded as empty when absent
pub(crate) fn fixed_opt<const N: usize>(
    rlp: &Rlp<'_>,
    index: usize,
) -> Result<Option<[u8; N]>, DecoderError> {
    let data = rlp.at(index)?;
    if data.is_empty() {
        return Ok(None)
    }
    fixed(rlp, index).map(Some)
}

pub(crate) fn append_opt(s: &mut RlpStream, value: Option<&[u8]>) {
    match value {
        Some(value) => s.append(&value),
        None => s.append_empty_data(),
    };
}

/// Appends the signatures in ledger order followed by the authority they answer to:
///
/// ```text
/// [[signature ...], []]                                      single key
/// [[signature ...], [threshold, [[public key, weight] ...]]] weighted authority
/// ```
pub(crate) fn append_weighted(s: &mut RlpStream, ledger: &SignatureLedger) {
    s.begin_list(2);
    let ordered = ledger.ordered();
    s.begin_list(ordered.len());
    for entry in ordered {
        s.append(&entry.signature);
    }
    match ledger.discipline() {
        Discipline::SingleKey => {
            s.begin_list(0);
        }
        Discipline::Threshold { authority, .. } => {
            s.begin_list(2);
            s.append(&authority.threshold());
            s.begin_list(authority.keys().len());
            for key in authority.keys() {
                s.begin_list(2);
                s.append(&key.signer.as_bytes());
                s.append(&key.weight);
            }
        }
    }
}

/// Inverse of [`append_weighted`], recovering each signer from its signature over `digest`
pub(crate) fn decode_weighted(
    auth: &Rlp<'_>,
    digest: &[u8],
) -> Result<(Vec<(SignerId, Bytes)>, Discipline), BuilderError> {
    expect_items(auth, 2)?;
    let mut signatures = Vec::new();
    for signature in auth.at(0)?.iter() {
        let signature: Bytes = signature.as_val()?;
        let signer =
            recover_secp256k1(digest, &signature).map_err(|e| BuilderError::Parse(e.to_string()))?;
        signatures.push((signer, signature));
    }

    let permission = auth.at(1)?;
    if permission.item_count()? == 0 {
        return Ok((signatures, Discipline::SingleKey))
    }
    expect_items(&permission, 2)?;
    let threshold: u32 = permission.val_at(0)?;
    let mut keys = Vec::new();
    for key in permission.at(1)?.iter() {
        expect_items(&key, 2)?;
        let public: Bytes = key.val_at(0)?;
        let signer = SignerId::from_public_key(Algorithm::Secp256k1, &public)
            .map_err(|e| BuilderError::Parse(e.to_string()))?;
        keys.push(DeclaredKey { signer, weight: key.val_at(1)? });
    }
    let authority =
        Authority::new(threshold, keys).map_err(|e| BuilderError::Parse(e.to_string()))?;
    let discipline = Discipline::Threshold {
        authority,
        order: SignatureOrder::Insertion,
        policy: ThresholdPolicy::AtLeast,
    };
    Ok((signatures, discipline))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned() -> Vec<u8> {
        let mut s = RlpStream::new_list(2);
        s.append(&"pay");
        s.append(&1000u64);
        s.out().to_vec()
    }

    #[test]
    fn reads_discriminator_of_both_forms() {
        let unsigned = unsigned();
        assert_eq!(discriminator(&unsigned).unwrap(), "pay");

        // empty authorization list
        let broadcast = seal_envelope(&unsigned, &[0xc0]);
        assert_eq!(discriminator(&broadcast).unwrap(), "pay");

        let (inner, authorization) = open_envelope(&broadcast).unwrap();
        assert_eq!(inner.as_raw(), &unsigned[..]);
        assert_eq!(authorization.unwrap().item_count().unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(discriminator(&[]), Err(BuilderError::Parse(_))));
        assert!(matches!(discriminator(&[0xde, 0xad, 0xbe, 0xef]), Err(BuilderError::Parse(_))));
        // a string, not a list
        assert!(matches!(discriminator(&[0x83, b'p', b'a', b'y']), Err(BuilderError::Parse(_))));

        let mut trailing = unsigned();
        trailing.push(0x00);
        assert!(matches!(discriminator(&trailing), Err(BuilderError::Parse(_))));
    }

    #[test]
    fn optional_fixed_fields() {
        let mut s = RlpStream::new_list(2);
        append_opt(&mut s, None);
        append_opt(&mut s, Some(&[7u8; 4][..]));
        let out = s.out();
        let rlp = Rlp::new(&out);
        assert_eq!(fixed_opt::<4>(&rlp, 0).unwrap(), None);
        assert_eq!(fixed_opt::<4>(&rlp, 1).unwrap(), Some([7u8; 4]));
        assert!(fixed::<3>(&rlp, 1).is_err());
        assert!(expect_items(&rlp, 3).is_err());
    }
}
