//! Stacks addresses: c32check over a version byte and a HASH160.
use txkit_core::{
    types::SignerId,
    utils::{c32_address, c32_address_decode, hash160, AddressError},
};

const OP_CHECKMULTISIG: u8 = 0xae;
const OP_PUSH_KEY: u8 = 0x21;
const OP_1: u8 = 0x50;

/// Largest key count a redeem script can express with a single opcode
pub const MAX_MULTISIG_KEYS: usize = 16;

/// A decoded Stacks address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    pub version: u8,
    pub hash: [u8; 20],
}

impl StacksAddress {
    pub fn new(version: u8, hash: [u8; 20]) -> Self {
        Self { version, hash }
    }

    /// The single signature address of a compressed public key
    pub fn from_public_key(version: u8, key: &SignerId) -> Self {
        Self::new(version, hash160(key.as_bytes()))
    }

    /// The pay-to-script-hash address of an m-of-n multisig
    pub fn from_multisig(
        version: u8,
        threshold: u8,
        keys: &[SignerId],
    ) -> Result<Self, AddressError> {
        Ok(Self::new(version, hash160(redeem_script(threshold, keys)?)))
    }

    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let (version, hash) = c32_address_decode(address)?;
        Ok(Self { version, hash })
    }

    pub fn encode(&self) -> Result<String, AddressError> {
        c32_address(self.version, &self.hash)
    }
}

/// `OP_m <key>... OP_n OP_CHECKMULTISIG`, for `1 <= m <= n <= 16`
pub fn redeem_script(threshold: u8, keys: &[SignerId]) -> Result<Vec<u8>, AddressError> {
    if threshold == 0 || threshold as usize > keys.len() || keys.len() > MAX_MULTISIG_KEYS {
        return Err(AddressError::MultisigSize { threshold, keys: keys.len() })
    }
    let mut script = Vec::with_capacity(keys.len() * 34 + 3);
    // both counts are at most 16 here
    script.push(OP_1 - 1 + threshold);
    for key in keys {
        script.push(OP_PUSH_KEY);
        script.extend_from_slice(key.as_bytes());
    }
    script.push(OP_1 - 1 + keys.len() as u8);
    script.push(OP_CHECKMULTISIG);
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use txkit_core::types::{Algorithm, KeyMaterial};

    fn keys() -> Vec<SignerId> {
        [
            "031b84c5567b126440995d3ed5aaba0565d71e1834604819ff9c17f5e9d5dd078f",
            "024d4b6cd1361032ca9bd2aeb9d900aa4d45d9ead80ac9423374c451a7254d0766",
            "02531fe6068134503d2723133227c867ac8fa6c83c537e9a44c3c5bdbdcb1fe337",
        ]
        .iter()
        .map(|k| SignerId::from_public_key(Algorithm::Secp256k1, &hex::decode(k).unwrap()).unwrap())
        .collect()
    }

    #[test]
    fn single_signature_addresses() {
        let key = &keys()[0];
        let testnet = StacksAddress::from_public_key(26, key).encode().unwrap();
        let mainnet = StacksAddress::from_public_key(22, key).encode().unwrap();
        assert_eq!(testnet, "ST1WV0048ERKB55592H81MK6J4TTRP8TSGE8VSTHJ");
        assert_eq!(mainnet, "SP1WV0048ERKB55592H81MK6J4TTRP8TSGC4JX54N");
        let expected = StacksAddress::from_public_key(26, key);
        assert_eq!(StacksAddress::parse(&testnet).unwrap(), expected);
    }

    #[test]
    fn multisig_address() {
        let keys = keys();
        let script = redeem_script(2, &keys).unwrap();
        assert_eq!(script.len(), 3 * 34 + 3);
        assert_eq!(script[0], 0x52);
        assert_eq!(&script[script.len() - 2..], &[0x53, 0xae]);
        assert_eq!(
            StacksAddress::from_multisig(21, 2, &keys).unwrap().encode().unwrap(),
            "SN2Q7K41AWCWG1DKSRXPEV1BP6RQ4NERNX392YBBV"
        );
        assert_eq!(
            StacksAddress::from_multisig(20, 2, &keys).unwrap().encode().unwrap(),
            "SM2Q7K41AWCWG1DKSRXPEV1BP6RQ4NERNX01MJK57"
        );
    }

    #[test]
    fn rejects_unscriptable_multisigs() {
        let keys = keys();
        for threshold in [0, 4, 177, 200, u8::MAX] {
            assert!(matches!(
                redeem_script(threshold, &keys),
                Err(AddressError::MultisigSize { keys: 3, .. })
            ));
        }
        let many: Vec<SignerId> = (1..=17u8)
            .map(|seed| KeyMaterial::from_private(Algorithm::Secp256k1, &[seed; 32]).unwrap())
            .map(|key| key.identity())
            .collect();
        assert!(StacksAddress::from_multisig(21, 2, &many).is_err());
        assert!(StacksAddress::from_multisig(21, 16, &many[..16]).is_ok());
        assert!(redeem_script(1, &[]).is_err());
    }
}
