//! Algorand payments and key registrations, signed with ed25519 by a single account or a
//! version 1 multisig.
mod address;
pub use address::{decode_address, encode_address, multisig_account, MULTISIG_VERSION};

mod codec;
pub use codec::{AlgoCodec, AlgoPayload, AlgoTransaction, TX_PREFIX};

mod builder;
pub use builder::{
    key_address, AlgoKind, Builder, KeyRegistration, KeyRegistrationBuilder, Transfer,
    TransferBuilder, MAX_NOTE_LEN,
};
