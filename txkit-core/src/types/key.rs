use super::Bytes;
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use k256::{
    ecdsa::SigningKey as Secp256k1SigningKey, elliptic_curve::sec1::ToEncodedPoint,
    PublicKey as K256PublicKey,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{Display, EnumString};
use thiserror::Error;

/// The signing algorithm family a key belongs to
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Algorithm {
    Secp256k1,
    Ed25519,
}

/// An error involving key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The private component could not be parsed for the algorithm
    #[error("invalid {algorithm} private key: {reason}")]
    InvalidPrivateKey { algorithm: Algorithm, reason: String },
    /// The public component could not be parsed for the algorithm
    #[error("invalid {algorithm} public key: {reason}")]
    InvalidPublicKey { algorithm: Algorithm, reason: String },
    /// When parsing a key from a hex string
    #[error(transparent)]
    HexError(#[from] hex::FromHexError),
}

/// The value used to deduplicate signers: the signer's public key.
///
/// secp256k1 identities are always the 33-byte compressed SEC1 encoding so that a key
/// supplied compressed and the same key recovered from a signature compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignerId(Bytes);

impl SignerId {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Builds an identity from raw public key bytes, normalizing secp256k1 keys to their
    /// compressed form
    pub fn from_public_key(algorithm: Algorithm, public: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(normalize_public(algorithm, public)?))
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl fmt::Debug for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerId({})", self.0.to_hex())
    }
}

impl AsRef<[u8]> for SignerId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

fn normalize_public(algorithm: Algorithm, public: &[u8]) -> Result<Bytes, KeyError> {
    match algorithm {
        Algorithm::Secp256k1 => {
            let key = K256PublicKey::from_sec1_bytes(public).map_err(|e| {
                KeyError::InvalidPublicKey { algorithm, reason: e.to_string() }
            })?;
            Ok(key.to_encoded_point(true).as_bytes().to_vec().into())
        }
        Algorithm::Ed25519 => {
            let raw: [u8; 32] = public.try_into().map_err(|_| KeyError::InvalidPublicKey {
                algorithm,
                reason: format!("expected 32 bytes, got {}", public.len()),
            })?;
            Ed25519VerifyingKey::from_bytes(&raw)
                .map_err(|e| KeyError::InvalidPublicKey { algorithm, reason: e.to_string() })?;
            Ok(raw.into())
        }
    }
}

/// A public key with an optional private key for one signing algorithm family.
///
/// Key material is immutable once constructed. Two keys compare equal when both carry
/// private components that are byte-equal; keys without a private component compare by
/// algorithm and public key.
///
/// ```
/// use txkit_core::types::{Algorithm, KeyMaterial};
///
/// let key = KeyMaterial::from_private_hex(
///     Algorithm::Secp256k1,
///     "35794adf0dd2a313c18bc118b422740bb94f85114134be34703ff706658087e4",
/// )
/// .unwrap();
/// assert_eq!(
///     key.public_key().to_hex(),
///     "0321d6f42c99f7d23ec2c0dc21208a9c5edfce4e5bc7b63972e68e86e3cea6f41a"
/// );
/// ```
#[derive(Clone)]
pub struct KeyMaterial {
    algorithm: Algorithm,
    public: Bytes,
    private: Option<[u8; 32]>,
}

impl KeyMaterial {
    /// Creates key material from a raw private key.
    ///
    /// ed25519 keys may also be given in the 64-byte `seed || public` layout, in which case
    /// the trailing public key must match the one derived from the seed.
    pub fn from_private(algorithm: Algorithm, private: &[u8]) -> Result<Self, KeyError> {
        let invalid = |reason: String| KeyError::InvalidPrivateKey { algorithm, reason };
        match algorithm {
            Algorithm::Secp256k1 => {
                let signer = Secp256k1SigningKey::from_slice(private)
                    .map_err(|e| invalid(e.to_string()))?;
                let public = K256PublicKey::from(signer.verifying_key());
                let mut raw = [0u8; 32];
                raw.copy_from_slice(&signer.to_bytes());
                Ok(Self {
                    algorithm,
                    public: public.to_encoded_point(true).as_bytes().to_vec().into(),
                    private: Some(raw),
                })
            }
            Algorithm::Ed25519 => {
                let (seed, tail) = match private.len() {
                    32 => (private, None),
                    64 => (&private[..32], Some(&private[32..])),
                    len => return Err(invalid(format!("expected 32 or 64 bytes, got {len}"))),
                };
                let mut raw = [0u8; 32];
                raw.copy_from_slice(seed);
                let public = Ed25519SigningKey::from_bytes(&raw).verifying_key().to_bytes();
                if tail.map_or(false, |tail| tail != public) {
                    return Err(invalid("public key suffix does not match the seed".into()))
                }
                Ok(Self { algorithm, public: public.into(), private: Some(raw) })
            }
        }
    }

    /// Creates public-only key material, usable to declare signers but not to sign.
    pub fn from_public(algorithm: Algorithm, public: &[u8]) -> Result<Self, KeyError> {
        Ok(Self { algorithm, public: normalize_public(algorithm, public)?, private: None })
    }

    pub fn from_private_hex(algorithm: Algorithm, private: &str) -> Result<Self, KeyError> {
        Self::from_private(algorithm, &hex::decode(private.trim_start_matches("0x"))?)
    }

    pub fn from_public_hex(algorithm: Algorithm, public: &str) -> Result<Self, KeyError> {
        Self::from_public(algorithm, &hex::decode(public.trim_start_matches("0x"))?)
    }

    /// Creates a new random key pair seeded with the provided RNG
    pub fn random<R: RngCore + CryptoRng>(algorithm: Algorithm, rng: &mut R) -> Self {
        let mut raw = [0u8; 32];
        match algorithm {
            Algorithm::Secp256k1 => {
                let signer = Secp256k1SigningKey::random(rng);
                raw.copy_from_slice(&signer.to_bytes());
                let public = K256PublicKey::from(signer.verifying_key());
                Self {
                    algorithm,
                    public: public.to_encoded_point(true).as_bytes().to_vec().into(),
                    private: Some(raw),
                }
            }
            Algorithm::Ed25519 => {
                let signer = Ed25519SigningKey::generate(rng);
                raw.copy_from_slice(&signer.to_bytes());
                Self {
                    algorithm,
                    public: signer.verifying_key().to_bytes().into(),
                    private: Some(raw),
                }
            }
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The public key: compressed SEC1 for secp256k1, raw 32 bytes for ed25519
    pub fn public_key(&self) -> &Bytes {
        &self.public
    }

    /// The 65-byte uncompressed SEC1 public key, for secp256k1 keys only
    pub fn uncompressed_public_key(&self) -> Option<Vec<u8>> {
        match self.algorithm {
            Algorithm::Secp256k1 => K256PublicKey::from_sec1_bytes(&self.public)
                .ok()
                .map(|key| key.to_encoded_point(false).as_bytes().to_vec()),
            Algorithm::Ed25519 => None,
        }
    }

    pub fn private_key(&self) -> Option<&[u8; 32]> {
        self.private.as_ref()
    }

    pub fn has_private_key(&self) -> bool {
        self.private.is_some()
    }

    /// The identity this key signs under
    pub fn identity(&self) -> SignerId {
        SignerId(self.public.clone())
    }

    /// Drops the private component
    pub fn to_public(&self) -> Self {
        Self { algorithm: self.algorithm, public: self.public.clone(), private: None }
    }

    /// The secp256k1 signing key, when this is a secp256k1 key with a private component
    pub fn secp256k1_signing_key(&self) -> Option<Secp256k1SigningKey> {
        match (self.algorithm, self.private.as_ref()) {
            (Algorithm::Secp256k1, Some(raw)) => Secp256k1SigningKey::from_slice(raw).ok(),
            _ => None,
        }
    }

    /// The ed25519 signing key, when this is an ed25519 key with a private component
    pub fn ed25519_signing_key(&self) -> Option<Ed25519SigningKey> {
        match (self.algorithm, self.private.as_ref()) {
            (Algorithm::Ed25519, Some(raw)) => Some(Ed25519SigningKey::from_bytes(raw)),
            _ => None,
        }
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        match (&self.private, &other.private) {
            (Some(a), Some(b)) => self.algorithm == other.algorithm && a == b,
            _ => self.algorithm == other.algorithm && self.public == other.public,
        }
    }
}

impl Eq for KeyMaterial {}

// do not log the private key
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("public", &self.public)
            .field("has_private", &self.private.is_some())
            .finish()
    }
}

/// Parses `<algorithm>:<private key hex>`, e.g. `ed25519:0001..1f`
impl FromStr for KeyMaterial {
    type Err = KeyError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let (algorithm, key) = src.split_once(':').ok_or_else(|| KeyError::InvalidPrivateKey {
            algorithm: Algorithm::Secp256k1,
            reason: "expected <algorithm>:<hex>".into(),
        })?;
        let algorithm = algorithm.parse::<Algorithm>().map_err(|_| {
            KeyError::InvalidPrivateKey {
                algorithm: Algorithm::Secp256k1,
                reason: format!("unknown algorithm {algorithm}"),
            }
        })?;
        Self::from_private_hex(algorithm, key)
    }
}
