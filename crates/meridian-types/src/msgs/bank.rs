//! Bank module message types

use crate::coin::Coins;
use crate::tx::{Msg, MsgError};
use prost::Message as _;
use serde::{Deserialize, Serialize};

/// Internal protobuf representation of MsgSend
#[derive(Clone, PartialEq, prost::Message)]
struct MsgSendProto {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<CoinProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct CoinProto {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

/// MsgSend represents a message to send coins from one account to another.
/// Addresses are carried as plain strings; the node validates them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from_address: String,
    pub to_address: String,
    pub amount: Coins,
}

impl MsgSend {
    pub fn new(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        amount: Coins,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
        }
    }
}

impl Msg for MsgSend {
    fn type_url(&self) -> &'static str {
        "/cosmos.bank.v1beta1.MsgSend"
    }

    fn validate_basic(&self) -> Result<(), MsgError> {
        if self.from_address.is_empty() {
            return Err(MsgError::Invalid("from address cannot be empty".to_string()));
        }
        if self.to_address.is_empty() {
            return Err(MsgError::Invalid("to address cannot be empty".to_string()));
        }
        Ok(())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "from_address": self.from_address,
            "to_address": self.to_address,
            "amount": self.amount,
        })
    }

    fn encode(&self) -> Vec<u8> {
        MsgSendProto {
            from_address: self.from_address.clone(),
            to_address: self.to_address.clone(),
            amount: self
                .amount
                .as_slice()
                .iter()
                .map(|coin| CoinProto {
                    denom: coin.denom.clone(),
                    amount: coin.amount.to_string(),
                })
                .collect(),
        }
        .encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::Coin;

    fn sample_coins() -> Coins {
        Coins::new(vec![Coin::new("token", 1).unwrap()]).unwrap()
    }

    #[test]
    fn test_validate_basic() {
        let msg = MsgSend::new("from", "to", sample_coins());
        assert!(msg.validate_basic().is_ok());

        let msg = MsgSend::new("", "to", sample_coins());
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_json_fields() {
        let msg = MsgSend::new("from", "to", sample_coins());
        assert_eq!(
            msg.to_json(),
            serde_json::json!({
                "from_address": "from",
                "to_address": "to",
                "amount": [{"denom": "token", "amount": "1"}],
            })
        );
    }

    #[test]
    fn test_encode_is_nonempty() {
        let msg = MsgSend::new("from", "to", sample_coins());
        assert!(!msg.encode().is_empty());
    }
}
