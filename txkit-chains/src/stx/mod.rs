//! Stacks STX token transfers, signed with secp256k1 by a single key or a P2SH multisig.
mod address;
pub use address::{redeem_script, StacksAddress, MAX_MULTISIG_KEYS};

mod codec;
pub use codec::{HashMode, StxCodec, StxTransaction, MAX_MEMO_LEN, TOKEN_TRANSFER};

mod builder;
pub use builder::{key_address, TransferBuilder};
