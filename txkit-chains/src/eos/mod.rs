//! EOS token transfers, staking and account creation, signed with secp256k1 by a single key
//! or a weighted authority.
mod account;
pub use account::{
    decode_public_key, encode_public_key, is_valid_name, Asset, AssetError, MAX_NAME_LEN,
};

mod codec;
pub use codec::{
    ActionData, EosAction, EosCodec, EosTransaction, ACTIVE_PERMISSION, BUY_RAM_BYTES,
    DELEGATE_BW, NEW_ACCOUNT, TRANSFER, UNDELEGATE_BW,
};

mod builder;
pub use builder::{
    key_text, Builder, EosKind, Staking, StakingBuilder, Transfer, TransferBuilder,
    WalletInitialization, WalletInitializationBuilder, CORE_SYMBOL, MAX_MEMO_LEN,
    SYSTEM_CONTRACT, TOKEN_CONTRACT,
};
