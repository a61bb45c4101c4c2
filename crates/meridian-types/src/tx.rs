//! Transaction data model: JSON and protobuf encodings.
//!
//! The JSON encoding reproduces the node wire format exactly: unsigned 64-bit
//! integers are rendered as decimal strings, empty lists stay `[]` and absent
//! optional objects are `null`, not omitted.

use crate::coin::Coin;
use base64::Engine;
use prost::Message as _;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("protobuf decode error:: {0}")]
    Decode(String),

    #[error("json encode error:: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field:: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum MsgError {
    #[error("invalid message:: {0}")]
    Invalid(String),
}

/// Contract for messages carried in a transaction. The client treats message
/// payloads as opaque: it only needs the type url, the two encodings and a
/// stateless validity check.
pub trait Msg: Send + Sync {
    /// Protobuf type URL (e.g. "/cosmos.bank.v1beta1.MsgSend")
    fn type_url(&self) -> &'static str;

    /// Perform stateless validation
    fn validate_basic(&self) -> Result<(), MsgError>;

    /// JSON value of the message fields, without the "@type" discriminator
    fn to_json(&self) -> serde_json::Value;

    /// Encode the message to protobuf bytes
    fn encode(&self) -> Vec<u8>;
}

/// Opaque message carrier, the `Any` of the wire encoding.
///
/// Messages built from a [`Msg`] keep their JSON rendering; messages decoded
/// from protobuf bytes carry only the type url and raw value.
#[derive(Clone, Debug, PartialEq)]
pub struct AnyMessage {
    pub type_url: String,
    pub value: Vec<u8>,
    json: Option<serde_json::Value>,
}

impl AnyMessage {
    pub fn from_msg(msg: &dyn Msg) -> Self {
        Self {
            type_url: msg.type_url().to_string(),
            value: msg.encode(),
            json: Some(msg.to_json()),
        }
    }

    pub fn from_parts(type_url: String, value: Vec<u8>) -> Self {
        Self {
            type_url,
            value,
            json: None,
        }
    }
}

impl Serialize for AnyMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("@type", &self.type_url)?;
        match &self.json {
            Some(serde_json::Value::Object(fields)) => {
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
            }
            Some(other) => map.serialize_entry("value", other)?,
            None => map.serialize_entry(
                "value",
                &base64::engine::general_purpose::STANDARD.encode(&self.value),
            )?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AnyMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = serde_json::Map::deserialize(deserializer)?;
        let type_url = match fields.remove("@type") {
            Some(serde_json::Value::String(url)) => url,
            _ => return Err(D::Error::custom("missing @type field")),
        };
        Ok(Self {
            type_url,
            value: Vec::new(),
            json: Some(serde_json::Value::Object(fields)),
        })
    }
}

/// Transaction body containing messages and metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<AnyMessage>,
    pub memo: String,
    #[serde(with = "u64_string")]
    pub timeout_height: u64,
    pub extension_options: Vec<AnyMessage>,
    pub non_critical_extension_options: Vec<AnyMessage>,
}

impl TxBody {
    /// Protobuf encoding, used for the sign doc
    pub fn to_bytes(&self) -> Vec<u8> {
        TxBodyProto::from(self).encode_to_vec()
    }
}

/// Authentication info for a transaction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
    pub tip: Option<Tip>,
}

impl AuthInfo {
    /// Protobuf encoding, used for the sign doc
    pub fn to_bytes(&self) -> Vec<u8> {
        AuthInfoProto::from(self).encode_to_vec()
    }
}

/// Transaction tip, never set by this client but kept in the encoding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub amount: Vec<Coin>,
    pub tipper: String,
}

/// Fee information
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    #[serde(with = "u64_string")]
    pub gas_limit: u64,
    pub payer: String,
    pub granter: String,
}

/// Signer information
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignerInfo {
    pub public_key: Option<AnyMessage>,
    pub mode_info: ModeInfo,
    #[serde(with = "u64_string")]
    pub sequence: u64,
}

/// Signing mode info
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeInfo {
    pub single: Option<ModeInfoSingle>,
}

/// Single signer mode info; mode 1 is SIGN_MODE_DIRECT
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeInfoSingle {
    pub mode: u32,
}

/// A complete transaction: messages, auth info and signatures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    #[serde(with = "base64_list")]
    pub signatures: Vec<Vec<u8>>,
}

impl Tx {
    /// Encode to the JSON wire format
    pub fn encode_json(&self) -> Result<Vec<u8>, TxError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Encode to protobuf bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        TxProto {
            body: Some(TxBodyProto::from(&self.body)),
            auth_info: Some(AuthInfoProto::from(&self.auth_info)),
            signatures: self.signatures.clone(),
        }
        .encode_to_vec()
    }

    /// Decode from protobuf bytes. Decoded messages keep only their type url
    /// and raw value; the JSON field rendering is not recoverable.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        let proto = TxProto::decode(bytes).map_err(|e| TxError::Decode(e.to_string()))?;
        let body = proto
            .body
            .ok_or_else(|| TxError::MissingField("body".to_string()))?;
        let auth_info = proto
            .auth_info
            .ok_or_else(|| TxError::MissingField("auth_info".to_string()))?;
        let fee = auth_info
            .fee
            .ok_or_else(|| TxError::MissingField("fee".to_string()))?;
        Ok(Self {
            body: TxBody {
                messages: body.messages.into_iter().map(any_from_proto).collect(),
                memo: body.memo,
                timeout_height: body.timeout_height,
                extension_options: body
                    .extension_options
                    .into_iter()
                    .map(any_from_proto)
                    .collect(),
                non_critical_extension_options: body
                    .non_critical_extension_options
                    .into_iter()
                    .map(any_from_proto)
                    .collect(),
            },
            auth_info: AuthInfo {
                signer_infos: auth_info
                    .signer_infos
                    .into_iter()
                    .map(|si| SignerInfo {
                        public_key: si.public_key.map(any_from_proto),
                        mode_info: ModeInfo {
                            single: si
                                .mode_info
                                .and_then(|mi| mi.single)
                                .map(|s| ModeInfoSingle { mode: s.mode as u32 }),
                        },
                        sequence: si.sequence,
                    })
                    .collect(),
                fee: Fee {
                    amount: fee
                        .amount
                        .into_iter()
                        .map(|c| {
                            let amount = c.amount.parse().map_err(|_| {
                                TxError::Decode(format!("invalid fee amount:: {}", c.amount))
                            })?;
                            Ok(Coin {
                                denom: c.denom,
                                amount,
                            })
                        })
                        .collect::<Result<Vec<Coin>, TxError>>()?,
                    gas_limit: fee.gas_limit,
                    payer: fee.payer,
                    granter: fee.granter,
                },
                tip: None,
            },
            signatures: proto.signatures,
        })
    }
}

/// Direct sign doc over the serialized body and auth info
#[derive(Clone, PartialEq, prost::Message)]
pub struct SignDoc {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

impl SignDoc {
    pub fn new(
        body_bytes: Vec<u8>,
        auth_info_bytes: Vec<u8>,
        chain_id: String,
        account_number: u64,
    ) -> Self {
        Self {
            body_bytes,
            auth_info_bytes,
            chain_id,
            account_number,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }
}

// Protobuf representations, tags per the Cosmos SDK tx format.

#[derive(Clone, PartialEq, prost::Message)]
struct AnyProto {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct TxProto {
    #[prost(message, optional, tag = "1")]
    pub body: Option<TxBodyProto>,
    #[prost(message, optional, tag = "2")]
    pub auth_info: Option<AuthInfoProto>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct TxBodyProto {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<AnyProto>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
    #[prost(message, repeated, tag = "1023")]
    pub extension_options: Vec<AnyProto>,
    #[prost(message, repeated, tag = "2047")]
    pub non_critical_extension_options: Vec<AnyProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct AuthInfoProto {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfoProto>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<FeeProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct SignerInfoProto {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<AnyProto>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfoProto>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ModeInfoProto {
    #[prost(message, optional, tag = "1")]
    pub single: Option<ModeInfoSingleProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ModeInfoSingleProto {
    #[prost(int32, tag = "1")]
    pub mode: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
struct FeeProto {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<CoinProto>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct CoinProto {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

fn any_to_proto(any: &AnyMessage) -> AnyProto {
    AnyProto {
        type_url: any.type_url.clone(),
        value: any.value.clone(),
    }
}

fn any_from_proto(proto: AnyProto) -> AnyMessage {
    AnyMessage::from_parts(proto.type_url, proto.value)
}

impl From<&TxBody> for TxBodyProto {
    fn from(body: &TxBody) -> Self {
        Self {
            messages: body.messages.iter().map(any_to_proto).collect(),
            memo: body.memo.clone(),
            timeout_height: body.timeout_height,
            extension_options: body.extension_options.iter().map(any_to_proto).collect(),
            non_critical_extension_options: body
                .non_critical_extension_options
                .iter()
                .map(any_to_proto)
                .collect(),
        }
    }
}

impl From<&AuthInfo> for AuthInfoProto {
    fn from(auth_info: &AuthInfo) -> Self {
        Self {
            signer_infos: auth_info
                .signer_infos
                .iter()
                .map(|si| SignerInfoProto {
                    public_key: si.public_key.as_ref().map(any_to_proto),
                    mode_info: Some(ModeInfoProto {
                        single: si.mode_info.single.as_ref().map(|s| ModeInfoSingleProto {
                            mode: s.mode as i32,
                        }),
                    }),
                    sequence: si.sequence,
                })
                .collect(),
            fee: Some(FeeProto {
                amount: auth_info
                    .fee
                    .amount
                    .iter()
                    .map(|c| CoinProto {
                        denom: c.denom.clone(),
                        amount: c.amount.to_string(),
                    })
                    .collect(),
                gas_limit: auth_info.fee.gas_limit,
                payer: auth_info.fee.payer.clone(),
                granter: auth_info.fee.granter.clone(),
            }),
        }
    }
}

/// Serialize u64 fields as decimal strings, per the observed wire encoding
mod u64_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Serialize signatures as base64 strings
mod base64_list {
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

    pub fn serialize<S: Serializer>(v: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = v.iter().map(|sig| ENGINE.encode(sig)).collect();
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(d)?;
        encoded
            .into_iter()
            .map(|s| ENGINE.decode(s).map_err(de::Error::custom))
            .collect()
    }
}
