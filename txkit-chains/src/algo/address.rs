//! Algorand account addresses.
use txkit_core::utils::{base32_decode, base32_encode, sha512_256, sha512_256_concat, AddressError};

const CHECKSUM_LEN: usize = 4;
const MULTISIG_PREFIX: &[u8] = b"MultisigAddr";

/// The only multisig version Algorand defines
pub const MULTISIG_VERSION: u8 = 1;

/// base32 of the public key followed by the last 4 bytes of its SHA-512/256
pub fn encode_address(public_key: &[u8; 32]) -> String {
    let digest = sha512_256(public_key);
    let mut payload = public_key.to_vec();
    payload.extend_from_slice(&digest[32 - CHECKSUM_LEN..]);
    base32_encode(&payload)
}

/// Parses an address back into its public key, verifying the checksum
pub fn decode_address(address: &str) -> Result<[u8; 32], AddressError> {
    let payload = base32_decode(address)?;
    if payload.len() != 32 + CHECKSUM_LEN {
        return Err(AddressError::InvalidLength {
            expected: 32 + CHECKSUM_LEN,
            actual: payload.len(),
        })
    }
    let (key, checksum) = payload.split_at(32);
    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(key);
    if sha512_256(public_key)[32 - CHECKSUM_LEN..] != *checksum {
        return Err(AddressError::Checksum)
    }
    Ok(public_key)
}

/// The account key of a multisig: SHA-512/256 of the prefix, version, threshold and keys
pub fn multisig_account(version: u8, threshold: u8, keys: &[[u8; 32]]) -> [u8; 32] {
    let header = [version, threshold];
    let mut parts: Vec<&[u8]> = Vec::with_capacity(keys.len() + 2);
    parts.push(MULTISIG_PREFIX);
    parts.push(&header);
    parts.extend(keys.iter().map(|k| &k[..]));
    sha512_256_concat(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const KEY_A: [u8; 32] = hex!("03a107bff3ce10be1d70dd18e74bc09967e4d6309ba50d5f1ddc8664125531b8");
    const KEY_B: [u8; 32] = hex!("ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c");

    #[test]
    fn encodes_known_accounts() {
        assert_eq!(
            encode_address(&KEY_A),
            "AOQQPP7TZYIL4HLQ3UMOOS6ATFT6JVRQTOSQ2XY53SDGIESVGG4MPFYUMQ"
        );
        assert_eq!(
            encode_address(&KEY_B),
            "5JFGYY7CTRJAVPXVKB5RGLWF7GKUO5VOX27HXESCD3VGSFCG2IWAKDM5YU"
        );
        assert_eq!(
            decode_address("AOQQPP7TZYIL4HLQ3UMOOS6ATFT6JVRQTOSQ2XY53SDGIESVGG4MPFYUMQ").unwrap(),
            KEY_A
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        assert_eq!(
            decode_address("AOQQPP7TZYIL4HLQ3UMOOS6ATFT6JVRQTOSQ2XY53SDGIESVGG4MPFYUMA").unwrap_err(),
            AddressError::Checksum
        );
        assert!(matches!(decode_address("AOQQ"), Err(AddressError::InvalidLength { .. })));
        let lowercase = "aoqqpp7tzyil4hlq3umoos6atft6jvrqtosq2xy53sdgiesvgg4mpfyumq";
        assert!(decode_address(lowercase).is_err());
    }

    #[test]
    fn derives_multisig_accounts() {
        let two_of_two = multisig_account(MULTISIG_VERSION, 2, &[KEY_A, KEY_B]);
        assert_eq!(
            encode_address(&two_of_two),
            "MQK4WTSJDAAKPSYZKCIUJQPPIZZL32PHBCI4XI6JDWJ5WJBL6SGCIBIGDM"
        );
        let one_of_two = multisig_account(MULTISIG_VERSION, 1, &[KEY_A, KEY_B]);
        assert_eq!(
            encode_address(&one_of_two),
            "PU75GCGNRNIITPTVTZWJJEFMFJDXPLRO3C25M4C7HSEHXVTATZXS27CL34"
        );
        // key order is part of the account
        assert_ne!(multisig_account(MULTISIG_VERSION, 2, &[KEY_B, KEY_A]), two_of_two);
    }
}
