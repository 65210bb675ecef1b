//! Tron transfers and smart contract calls, signed with secp256k1 by the owner key or a
//! weighted permission.
mod address;
pub use address::{
    decode_address, encode_address, signer_address, TronAddress, ADDRESS_LEN, ADDRESS_PREFIX,
};

mod codec;
pub use codec::{TrxCodec, TrxContract, TrxTransaction, TRANSFER_CONTRACT, TRIGGER_SMART_CONTRACT};

mod builder;
pub use builder::{
    key_address, Builder, ContractCall, ContractCallBuilder, Transfer, TransferBuilder, TrxKind,
};
