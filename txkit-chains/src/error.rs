use thiserror::Error;
use txkit_core::{
    config::ConfigError,
    types::{KeyError, LedgerError, SignerId},
    utils::AddressError,
};

/// Error thrown by a transaction builder or the builder factory
#[derive(Debug, Error)]
pub enum BuilderError {
    /// A single field failed its local constraint. The builder state is unchanged.
    #[error("invalid {field} {value:?}: {reason}")]
    Validation { field: &'static str, value: String, reason: String },
    /// `build` was invoked before a mandatory field was set
    #[error("missing mandatory field {0}")]
    MissingField(&'static str),
    /// The same signer identity is queued or already present in the ledger
    #[error("signer {0} has already signed or is already queued")]
    DuplicateSigner(SignerId),
    /// The raw transaction's discriminator does not map to a known builder
    #[error("unrecognized transaction type {0:?}")]
    UnrecognizedTransactionType(String),
    /// The raw bytes are not a valid encoding for the chain
    #[error("failed to parse raw transaction: {0}")]
    Parse(String),
    /// The signer rejected the key or produced an unusable signature
    #[error("signing with {signer} failed: {reason}")]
    Signing { signer: SignerId, reason: String },
    /// The signers do not fit the authorization the transaction is bound to
    #[error("invalid signer configuration: {0}")]
    InvalidConfiguration(String),
    /// Fewer signatures than the threshold requires
    #[error("threshold not met: {collected} of {required} required")]
    ThresholdNotMet { required: u32, collected: u32 },
    #[error("unsupported coin {0:?}")]
    UnsupportedCoin(String),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BuilderError {
    pub(crate) fn invalid(
        field: &'static str,
        value: impl ToString,
        reason: impl ToString,
    ) -> Self {
        BuilderError::Validation { field, value: value.to_string(), reason: reason.to_string() }
    }

    pub(crate) fn address(field: &'static str, value: &str, err: AddressError) -> Self {
        Self::invalid(field, value, err)
    }

    /// Whether the build failed because something required has not been provided yet,
    /// either a mandatory field or enough signatures
    pub fn is_incomplete(&self) -> bool {
        matches!(self, BuilderError::MissingField(_) | BuilderError::ThresholdNotMet { .. })
    }
}

impl From<LedgerError> for BuilderError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateSigner(signer) => BuilderError::DuplicateSigner(signer),
            LedgerError::ThresholdNotMet { required, collected } => {
                BuilderError::ThresholdNotMet { required, collected }
            }
            LedgerError::InvalidConfiguration(reason) => {
                BuilderError::InvalidConfiguration(reason)
            }
            other @ (LedgerError::UndeclaredSigner(_) | LedgerError::OverThreshold { .. }) => {
                BuilderError::InvalidConfiguration(other.to_string())
            }
        }
    }
}

impl From<rlp::DecoderError> for BuilderError {
    fn from(err: rlp::DecoderError) -> Self {
        BuilderError::Parse(err.to_string())
    }
}
