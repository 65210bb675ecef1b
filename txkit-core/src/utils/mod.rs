//! Hashing and address encoding utilities.
mod hash;
pub use hash::{
    hash160, keccak256, ripemd160, sha256, sha256_concat, sha512_256, sha512_256_concat,
};

mod base32;
pub use base32::{base32_decode, base32_encode};

mod c32;
pub use c32::{c32_address, c32_address_decode, c32_decode, c32_encode};

use thiserror::Error;

/// An error raised while decoding a chain address or key string
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("checksum mismatch")]
    Checksum,
    #[error("unsupported version byte {0}")]
    Version(u8),
    #[error("missing prefix {0:?}")]
    Prefix(&'static str),
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("cannot script a {threshold}-of-{keys} multisig")]
    MultisigSize { threshold: u8, keys: usize },
}

/// Base58 with the double SHA-256 checksum suffix.
pub fn base58check_encode<T: AsRef<[u8]>>(payload: T) -> String {
    bs58::encode(payload.as_ref()).with_check().into_string()
}

/// Decodes base58check, verifying and stripping the checksum.
pub fn base58check_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    bs58::decode(input).with_check(None).into_vec().map_err(|e| match e {
        bs58::decode::Error::InvalidChecksum { .. } => AddressError::Checksum,
        other => AddressError::Base58(other.to_string()),
    })
}

/// Plain base58 (no checksum), for formats that carry their own checksum.
pub fn base58_encode<T: AsRef<[u8]>>(payload: T) -> String {
    bs58::encode(payload.as_ref()).into_string()
}

pub fn base58_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    bs58::decode(input).into_vec().map_err(|e| AddressError::Base58(e.to_string()))
}

/// Convert a number of base units into a decimal string with `decimals` fractional digits
pub fn format_units(amount: u128, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string()
    }
    let base = 10u128.pow(decimals);
    format!("{}.{:0width$}", amount / base, amount % base, width = decimals as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58check_roundtrip_and_checksum() {
        let encoded = base58check_encode([0x41, 1, 2, 3]);
        assert_eq!(base58check_decode(&encoded).unwrap(), vec![0x41, 1, 2, 3]);

        let mut tampered = encoded.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'2' { b'3' } else { b'2' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(base58check_decode(&tampered).is_err());
    }

    #[test]
    fn formats_units() {
        assert_eq!(format_units(12_345, 4), "1.2345");
        assert_eq!(format_units(5, 4), "0.0005");
        assert_eq!(format_units(42, 0), "42");
    }
}
