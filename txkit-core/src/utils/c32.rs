//! Crockford base32 ("c32") and the c32check address format used by Stacks.

use super::{hash::sha256, AddressError};

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

fn c32_value(c: u8) -> Result<u8, AddressError> {
    let c = match c.to_ascii_uppercase() {
        b'O' => b'0',
        b'L' | b'I' => b'1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|a| *a == c)
        .map(|p| p as u8)
        .ok_or(AddressError::InvalidCharacter(c as char))
}

/// Encodes `data` as a big-endian number in c32, keeping one `0` digit per leading zero byte.
pub fn c32_encode(data: &[u8]) -> String {
    let mut digits = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &byte in data.iter().rev() {
        acc |= (byte as u32) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push(C32_ALPHABET[(acc & 31) as usize]);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push(C32_ALPHABET[(acc & 31) as usize]);
    }
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    let zeros = data.iter().take_while(|b| **b == 0).count();
    digits.extend(std::iter::repeat(b'0').take(zeros));
    digits.iter().rev().map(|d| *d as char).collect()
}

/// Inverse of [`c32_encode`].
pub fn c32_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    let values = input.bytes().map(c32_value).collect::<Result<Vec<_>, _>>()?;
    let zeros = values.iter().take_while(|v| **v == 0).count();

    let mut out = Vec::with_capacity(values.len() * 5 / 8 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &v in values[zeros..].iter().rev() {
        acc |= (v as u32) << bits;
        bits += 5;
        if bits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 && acc != 0 {
        out.push(acc as u8);
    }
    while out.last() == Some(&0) {
        out.pop();
    }
    out.extend(std::iter::repeat(0u8).take(zeros));
    out.reverse();
    Ok(out)
}

fn c32_checksum(version: u8, hash: &[u8]) -> [u8; 4] {
    let mut preimage = Vec::with_capacity(hash.len() + 1);
    preimage.push(version);
    preimage.extend_from_slice(hash);
    let digest = sha256(sha256(preimage));
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Renders `S<version><c32(hash160 || checksum)>`.
pub fn c32_address(version: u8, hash160: &[u8; 20]) -> Result<String, AddressError> {
    if version >= 32 {
        return Err(AddressError::Version(version))
    }
    let mut payload = hash160.to_vec();
    payload.extend_from_slice(&c32_checksum(version, hash160));
    Ok(format!("S{}{}", C32_ALPHABET[version as usize] as char, c32_encode(&payload)))
}

/// Parses a c32check address into its version and 20-byte hash, verifying the checksum.
pub fn c32_address_decode(address: &str) -> Result<(u8, [u8; 20]), AddressError> {
    let rest = address.strip_prefix('S').ok_or(AddressError::Prefix("S"))?;
    let mut chars = rest.bytes();
    let version = chars.next().ok_or(AddressError::InvalidLength { expected: 24, actual: 0 })?;
    let version = c32_value(version)?;
    let data = c32_decode(&rest[1..])?;
    if data.len() != 24 {
        return Err(AddressError::InvalidLength { expected: 24, actual: data.len() })
    }
    let (hash, checksum) = data.split_at(20);
    if checksum != c32_checksum(version, hash) {
        return Err(AddressError::Checksum)
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(hash);
    Ok((version, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn encodes_leading_zero_bytes() {
        let data = hex!("0000a46ff88886c2ef9762d970b4d2c63678835bd39d");
        let encoded = c32_encode(&data);
        assert_eq!(encoded, "00MHQZH246RBQSERPSE2TD5HHPF21NQMWX");
        assert_eq!(c32_decode(&encoded).unwrap(), data.to_vec());
    }

    #[test]
    fn known_mainnet_address() {
        let hash = hex!("40f6c6f723c4f04e34a9be22628aa43a548c79bc");
        let address = c32_address(22, &hash).unwrap();
        assert_eq!(address, "SP10FDHQQ4F2F0KHMN6Z24RMAMGX5933SQJCWKAAR");
        assert_eq!(c32_address_decode(&address).unwrap(), (22, hash));
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = c32_address_decode("SP10FDHQQ4F2F0KHMN6Z24RMAMGX5933SQJCWKAAA").unwrap_err();
        assert_eq!(err, AddressError::Checksum);
        assert!(c32_address_decode("XP10FDHQQ4F2F0KHMN6Z24RMAMGX5933SQJCWKAAR").is_err());
        assert!(c32_address_decode("SPU").is_err());
    }

    #[test]
    fn normalizes_ambiguous_characters() {
        assert_eq!(c32_decode("O1").unwrap(), c32_decode("01").unwrap());
        assert_eq!(c32_decode("l").unwrap(), c32_decode("1").unwrap());
    }
}
