//! Message types understood by this client.

pub mod bank;

pub use bank::MsgSend;
