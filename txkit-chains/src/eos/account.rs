//! EOS account names, asset quantities and public key text.
use std::{fmt, str::FromStr};
use thiserror::Error;
use txkit_core::utils::{base58_decode, base58_encode, format_units, ripemd160, AddressError};

/// Maximum length of an account name
pub const MAX_NAME_LEN: usize = 12;

const LEGACY_KEY_PREFIX: &str = "EOS";
const K1_KEY_PREFIX: &str = "PUB_K1_";
const KEY_LEN: usize = 33;
const CHECKSUM_LEN: usize = 4;
const MAX_PRECISION: u8 = 18;
const MAX_SYMBOL_LEN: usize = 7;

/// Whether `name` is a valid account name: 1 to 12 characters of `.12345a-z`, not ending in
/// a dot.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() &&
        name.len() <= MAX_NAME_LEN &&
        !name.ends_with('.') &&
        name.bytes().all(|c| matches!(c, b'a'..=b'z' | b'1'..=b'5' | b'.'))
}

/// Formats a compressed secp256k1 key the legacy way, `EOS` followed by base58 of the key and
/// the first four bytes of its RIPEMD-160.
pub fn encode_public_key(key: &[u8; KEY_LEN]) -> String {
    let checksum = ripemd160(key);
    let mut payload = key.to_vec();
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    format!("{LEGACY_KEY_PREFIX}{}", base58_encode(payload))
}

/// Parses a public key in legacy `EOS...` or `PUB_K1_...` form
pub fn decode_public_key(text: &str) -> Result<[u8; KEY_LEN], AddressError> {
    let (encoded, suffix): (&str, &[u8]) = if let Some(rest) = text.strip_prefix(K1_KEY_PREFIX) {
        (rest, &b"K1"[..])
    } else if let Some(rest) = text.strip_prefix(LEGACY_KEY_PREFIX) {
        (rest, &[][..])
    } else {
        return Err(AddressError::Prefix(LEGACY_KEY_PREFIX))
    };
    let payload = base58_decode(encoded)?;
    if payload.len() != KEY_LEN + CHECKSUM_LEN {
        return Err(AddressError::InvalidLength {
            expected: KEY_LEN + CHECKSUM_LEN,
            actual: payload.len(),
        })
    }
    let (key, checksum) = payload.split_at(KEY_LEN);
    let expected = ripemd160([key, suffix].concat());
    if checksum != &expected[..CHECKSUM_LEN] {
        return Err(AddressError::Checksum)
    }
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(key);
    Ok(out)
}

/// An error raised while parsing an asset quantity
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("expected \"<amount> <symbol>\"")]
    Format,
    #[error("invalid amount {0:?}")]
    Amount(String),
    #[error("invalid symbol {0:?}")]
    Symbol(String),
    #[error("precision above 18")]
    Precision,
}

/// A token quantity such as `1.0000 EOS`.
///
/// The amount is kept in base units; the precision is the number of fractional digits the
/// text form carries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Asset {
    pub amount: u64,
    pub precision: u8,
    pub symbol: String,
}

impl Asset {
    pub fn new(amount: u64, precision: u8, symbol: impl Into<String>) -> Self {
        Self { amount, precision, symbol: symbol.into() }
    }

    /// Whether both quantities are denominated in the same token
    pub fn same_token(&self, other: &Asset) -> bool {
        self.precision == other.precision && self.symbol == other.symbol
    }

    pub fn checked_add(&self, other: &Asset) -> Option<Asset> {
        if !self.same_token(other) {
            return None
        }
        Some(Asset { amount: self.amount.checked_add(other.amount)?, ..self.clone() })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_units(self.amount as u128, self.precision as u32), self.symbol)
    }
}

impl FromStr for Asset {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, symbol) = s.split_once(' ').ok_or(AssetError::Format)?;
        if symbol.is_empty() ||
            symbol.len() > MAX_SYMBOL_LEN ||
            !symbol.bytes().all(|c| c.is_ascii_uppercase())
        {
            return Err(AssetError::Symbol(symbol.to_string()))
        }

        let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
        let digits = |part: &str| part.bytes().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !digits(whole) || !digits(fraction) ||
            (amount.contains('.') && fraction.is_empty())
        {
            return Err(AssetError::Amount(amount.to_string()))
        }
        let precision = u8::try_from(fraction.len()).map_err(|_| AssetError::Precision)?;
        if precision > MAX_PRECISION {
            return Err(AssetError::Precision)
        }
        let amount = format!("{whole}{fraction}")
            .parse::<u64>()
            .map_err(|_| AssetError::Amount(amount.to_string()))?;
        Ok(Asset { amount, precision, symbol: symbol.to_string() })
    }
}
