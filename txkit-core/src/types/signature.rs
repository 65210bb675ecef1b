use super::{Algorithm, Bytes, SignerId};
use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey as Ed25519VerifyingKey};
use k256::{
    ecdsa::{RecoveryId, Signature as Secp256k1Signature, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey as K256PublicKey,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a recoverable secp256k1 signature: `r || s || v`
pub const RECOVERABLE_SIGNATURE_LENGTH: usize = 65;

/// An error involving a signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Invalid length, secp256k1 signatures are 65 bytes and ed25519 signatures 64 bytes
    #[error("invalid signature length, got {got}, expected {expected}")]
    InvalidLength { got: usize, expected: usize },
    /// secp256k1 signatures are produced over a 32-byte digest
    #[error("expected a 32-byte message digest, got {0} bytes")]
    InvalidDigest(usize),
    /// The recovery byte is not 0, 1, 27 or 28
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    /// Internal error during signature recovery
    #[error(transparent)]
    K256Error(#[from] k256::ecdsa::Error),
    /// ed25519 signature parsing or verification failure
    #[error("ed25519: {0}")]
    Ed25519Error(String),
    /// Error in recovering public key from signature
    #[error("public key recovery error")]
    RecoveryError,
    /// The signature is well formed but was not produced by the expected signer
    #[error("signature not produced by {0}")]
    VerificationError(SignerId),
}

/// One signature applied to an in-progress transaction, with the position at which it was
/// added to its ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signer: SignerId,
    pub signature: Bytes,
    pub order: usize,
}

impl SignatureEntry {
    pub fn new(signer: SignerId, signature: impl Into<Bytes>, order: usize) -> Self {
        Self { signer, signature: signature.into(), order }
    }
}

fn split_recoverable(
    signature: &[u8],
) -> Result<(Secp256k1Signature, RecoveryId), SignatureError> {
    if signature.len() != RECOVERABLE_SIGNATURE_LENGTH {
        return Err(SignatureError::InvalidLength {
            got: signature.len(),
            expected: RECOVERABLE_SIGNATURE_LENGTH,
        })
    }
    let v = signature[64];
    let normalized = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => return Err(SignatureError::InvalidRecoveryId(v)),
    };
    let recovery_id =
        RecoveryId::from_byte(normalized).ok_or(SignatureError::InvalidRecoveryId(v))?;
    Ok((Secp256k1Signature::from_slice(&signature[..64])?, recovery_id))
}

/// Recovers the compressed public key that produced a 65-byte `r || s || v` signature over
/// `digest`.
pub fn recover_secp256k1(digest: &[u8], signature: &[u8]) -> Result<SignerId, SignatureError> {
    if digest.len() != 32 {
        return Err(SignatureError::InvalidDigest(digest.len()))
    }
    let (signature, recovery_id) = split_recoverable(signature)?;
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|_| SignatureError::RecoveryError)?;
    let compressed = K256PublicKey::from(&key).to_encoded_point(true);
    SignerId::from_public_key(Algorithm::Secp256k1, compressed.as_bytes())
        .map_err(|_| SignatureError::RecoveryError)
}

/// Verifies that `signature` over `message` was produced by `signer`.
///
/// For secp256k1 the message is the 32-byte digest that was signed; for ed25519 it is the
/// full message.
pub fn verify_signature(
    algorithm: Algorithm,
    signer: &SignerId,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    match algorithm {
        Algorithm::Secp256k1 => {
            let recovered = recover_secp256k1(message, signature)?;
            if &recovered != signer {
                return Err(SignatureError::VerificationError(signer.clone()))
            }
            Ok(())
        }
        Algorithm::Ed25519 => {
            let raw: [u8; 32] = signer.as_bytes().try_into().map_err(|_| {
                SignatureError::Ed25519Error(format!(
                    "public key must be 32 bytes, got {}",
                    signer.as_bytes().len()
                ))
            })?;
            let key = Ed25519VerifyingKey::from_bytes(&raw)
                .map_err(|e| SignatureError::Ed25519Error(e.to_string()))?;
            let signature: [u8; 64] =
                signature.try_into().map_err(|_| SignatureError::InvalidLength {
                    got: signature.len(),
                    expected: 64,
                })?;
            key.verify(message, &Ed25519Signature::from_bytes(&signature))
                .map_err(|_| SignatureError::VerificationError(signer.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{types::KeyMaterial, utils::sha256};
    use ed25519_dalek::Signer as _;

    fn sign_digest(key: &KeyMaterial, digest: &[u8; 32]) -> Vec<u8> {
        let signing_key = key.secp256k1_signing_key().unwrap();
        let (signature, recovery_id) = signing_key.sign_prehash_recoverable(digest).unwrap();
        let mut out = signature.to_bytes().to_vec();
        out.push(recovery_id.to_byte());
        out
    }

    #[test]
    fn recovers_secp256k1_signer() {
        let key = KeyMaterial::random(Algorithm::Secp256k1, &mut rand::thread_rng());
        let digest = sha256(b"some transaction");
        let signature = sign_digest(&key, &digest);

        assert_eq!(recover_secp256k1(&digest, &signature).unwrap(), key.identity());
        verify_signature(Algorithm::Secp256k1, &key.identity(), &digest, &signature).unwrap();

        // the legacy 27/28 recovery byte is accepted as well
        let mut legacy = signature.clone();
        legacy[64] += 27;
        assert_eq!(recover_secp256k1(&digest, &legacy).unwrap(), key.identity());
    }

    #[test]
    fn rejects_foreign_signature() {
        let key = KeyMaterial::random(Algorithm::Secp256k1, &mut rand::thread_rng());
        let other = KeyMaterial::random(Algorithm::Secp256k1, &mut rand::thread_rng());
        let digest = sha256(b"payload");
        let signature = sign_digest(&other, &digest);

        let err = verify_signature(Algorithm::Secp256k1, &key.identity(), &digest, &signature)
            .unwrap_err();
        assert!(matches!(err, SignatureError::VerificationError(_)));
    }

    #[test]
    fn rejects_malformed_input() {
        let digest = [0u8; 32];
        assert!(matches!(
            recover_secp256k1(&digest, &[0u8; 64]),
            Err(SignatureError::InvalidLength { got: 64, expected: 65 })
        ));
        assert!(matches!(
            recover_secp256k1(&digest[..31], &[0u8; 65]),
            Err(SignatureError::InvalidDigest(31))
        ));
        let mut bad_v = [1u8; 65];
        bad_v[64] = 5;
        assert!(matches!(
            recover_secp256k1(&digest, &bad_v),
            Err(SignatureError::InvalidRecoveryId(5))
        ));
    }

    #[test]
    fn verifies_ed25519() {
        let key = KeyMaterial::random(Algorithm::Ed25519, &mut rand::thread_rng());
        let signing_key = key.ed25519_signing_key().unwrap();
        let signature = signing_key.sign(b"TXpayload").to_bytes();

        verify_signature(Algorithm::Ed25519, &key.identity(), b"TXpayload", &signature).unwrap();
        assert!(
            verify_signature(Algorithm::Ed25519, &key.identity(), b"TXother", &signature).is_err()
        );
    }
}
