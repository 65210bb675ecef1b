//! Digest helpers shared by the chain codecs.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512_256};
use tiny_keccak::{Hasher, Keccak};

/// Compute the Keccak-256 hash of input bytes.
pub fn keccak256<T: AsRef<[u8]>>(bytes: T) -> [u8; 32] {
    let mut output = [0u8; 32];

    let mut hasher = Keccak::v256();
    hasher.update(bytes.as_ref());
    hasher.finalize(&mut output);

    output
}

/// Compute the SHA-256 hash of input bytes.
pub fn sha256<T: AsRef<[u8]>>(bytes: T) -> [u8; 32] {
    Sha256::digest(bytes.as_ref()).into()
}

/// Compute SHA-256 over the concatenation of `parts` without copying them together first.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the SHA-512/256 hash of input bytes.
pub fn sha512_256<T: AsRef<[u8]>>(bytes: T) -> [u8; 32] {
    Sha512_256::digest(bytes.as_ref()).into()
}

/// Compute SHA-512/256 over the concatenation of `parts`.
pub fn sha512_256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the RIPEMD-160 hash of input bytes.
pub fn ripemd160<T: AsRef<[u8]>>(bytes: T) -> [u8; 20] {
    Ripemd160::digest(bytes.as_ref()).into()
}

/// RIPEMD-160 of SHA-256, the bitcoin-style public key hash.
pub fn hash160<T: AsRef<[u8]>>(bytes: T) -> [u8; 20] {
    ripemd160(sha256(bytes))
}
