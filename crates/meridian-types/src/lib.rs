//! Core data types for the meridian chain client.
//!
//! This crate provides bech32 account addresses, coin amounts, and the
//! transaction data model with its JSON and protobuf encodings.

pub mod address;
pub mod coin;
pub mod msgs;
pub mod tx;

pub use address::{AccAddress, AddressError};
pub use coin::{Coin, CoinError, Coins, DecCoin};
pub use msgs::MsgSend;
pub use tx::{
    AnyMessage, AuthInfo, Fee, ModeInfo, ModeInfoSingle, Msg, MsgError, SignDoc, SignerInfo, Tip,
    Tx, TxBody, TxError,
};
