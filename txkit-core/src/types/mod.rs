mod bytes;
pub use self::bytes::{Bytes, ParseBytesError};

mod key;
pub use key::{Algorithm, KeyError, KeyMaterial, SignerId};

mod signature;
pub use signature::{
    recover_secp256k1, verify_signature, SignatureEntry, SignatureError,
    RECOVERABLE_SIGNATURE_LENGTH,
};

mod ledger;
pub use ledger::{
    Authority, DeclaredKey, Discipline, LedgerError, SignatureLedger, SignatureOrder,
    ThresholdPolicy,
};

mod record;
pub use record::{Entry, RecordParts, TransactionRecord, TransactionType};
