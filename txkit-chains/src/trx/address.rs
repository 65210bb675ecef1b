//! Tron addresses: base58check of `0x41 || keccak256(uncompressed key)[12..]`.
use txkit_core::{
    k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey},
    types::SignerId,
    utils::{base58check_decode, base58check_encode, keccak256, AddressError},
};

/// Version byte of every mainnet and testnet address
pub const ADDRESS_PREFIX: u8 = 0x41;

pub const ADDRESS_LEN: usize = 21;

/// A 21-byte Tron account
pub type TronAddress = [u8; ADDRESS_LEN];

/// Derives the account of a secp256k1 signer
pub fn signer_address(signer: &SignerId) -> Result<TronAddress, AddressError> {
    let key = PublicKey::from_sec1_bytes(signer.as_bytes())
        .map_err(|_| AddressError::InvalidLength {
            expected: 33,
            actual: signer.as_bytes().len(),
        })?;
    let uncompressed = key.to_encoded_point(false);
    let hash = keccak256(&uncompressed.as_bytes()[1..]);
    let mut address = [0u8; ADDRESS_LEN];
    address[0] = ADDRESS_PREFIX;
    address[1..].copy_from_slice(&hash[12..]);
    Ok(address)
}

pub fn encode_address(address: &TronAddress) -> String {
    base58check_encode(address)
}

/// Parses a base58check address or its 42 character hex form
pub fn decode_address(address: &str) -> Result<TronAddress, AddressError> {
    let bytes = if address.len() == ADDRESS_LEN * 2 && address.starts_with("41") {
        hex::decode(address).map_err(|e| AddressError::Base58(e.to_string()))?
    } else {
        base58check_decode(address)?
    };
    let address: TronAddress = bytes
        .as_slice()
        .try_into()
        .map_err(|_| AddressError::InvalidLength { expected: ADDRESS_LEN, actual: bytes.len() })?;
    if address[0] != ADDRESS_PREFIX {
        return Err(AddressError::Version(address[0]))
    }
    Ok(address)
}
