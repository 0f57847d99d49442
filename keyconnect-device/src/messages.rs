//! Typed device messages exchanged with a [`Session`](crate::transport::Session)

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Envelope for one device message: `{"type": ..., "message": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Value,
}

impl Message {
    pub fn new(kind: impl Into<String>, message: Value) -> Self {
        Self {
            kind: kind.into(),
            message,
        }
    }

    pub fn encode<T: WireMessage + Serialize>(payload: &T) -> Result<Self> {
        Ok(Self::new(T::TYPE, serde_json::to_value(payload)?))
    }

    /// Decode the payload, checking the message type first.
    ///
    /// A `Failure` message decodes to [`Error::Failure`] unless a `Failure`
    /// was asked for.
    pub fn decode<T: WireMessage + DeserializeOwned>(self) -> Result<T> {
        if self.kind == Failure::TYPE && T::TYPE != Failure::TYPE {
            let failure: Failure = serde_json::from_value(self.message).unwrap_or_default();
            return Err(Error::failure(
                failure.code.unwrap_or_default(),
                failure.message.unwrap_or_else(|| "Device failure".to_string()),
            ));
        }
        if self.kind != T::TYPE {
            return Err(Error::UnexpectedMessage {
                expected: T::TYPE.to_string(),
                got: self.kind,
            });
        }
        let message = if self.message.is_null() {
            Value::Object(Default::default())
        } else {
            self.message
        };
        Ok(serde_json::from_value(message)?)
    }

    pub fn is<T: WireMessage>(&self) -> bool {
        self.kind == T::TYPE
    }
}

/// A message with a fixed wire type name
pub trait WireMessage {
    const TYPE: &'static str;
}

macro_rules! wire_message {
    ($($ty:ident),* $(,)?) => {
        $(impl WireMessage for $ty {
            const TYPE: &'static str = stringify!($ty);
        })*
    };
}

wire_message!(
    Initialize,
    Features,
    Failure,
    PinMatrixRequest,
    PinMatrixAck,
    PassphraseRequest,
    PassphraseAck,
    ButtonRequest,
    ButtonAck,
    SignIdentity,
    SignedIdentity,
    GetPublicKey,
    PublicKey,
    GetAddress,
    Address,
    RippleGetAddress,
    RippleAddress,
    SignTx,
    TxRequest,
    TxAck,
);

/// Failure codes reported by the device
pub mod failure_codes {
    pub const PIN_INVALID: &str = "Failure_PinInvalid";
    pub const PIN_CANCELLED: &str = "Failure_PinCancelled";
    pub const ACTION_CANCELLED: &str = "Failure_ActionCancelled";
    pub const DATA_ERROR: &str = "Failure_DataError";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Initialize {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub major_version: Option<u32>,
    #[serde(default)]
    pub minor_version: Option<u32>,
    #[serde(default)]
    pub patch_version: Option<u32>,
    #[serde(default)]
    pub bootloader_mode: bool,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub pin_protection: Option<bool>,
    #[serde(default)]
    pub passphrase_protection: Option<bool>,
    #[serde(default)]
    pub coins: Vec<CoinType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinType {
    pub coin_name: String,
    #[serde(default)]
    pub coin_shortcut: Option<String>,
    #[serde(default)]
    pub address_type: Option<u32>,
    #[serde(default)]
    pub maxfee_kb: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Failure {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinMatrixRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinMatrixAck {
    pub pin: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassphraseRequest {
    #[serde(default)]
    pub on_device: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassphraseAck {
    pub passphrase: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ButtonRequest {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ButtonAck {}

/// Identity a login challenge is signed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityType {
    pub proto: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignIdentity {
    pub identity: IdentityType,
    pub challenge_hidden: String,
    pub challenge_visual: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedIdentity {
    #[serde(default)]
    pub address: Option<String>,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPublicKey {
    pub address_n: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKey {
    pub xpub: String,
    #[serde(default)]
    pub node: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAddress {
    pub address_n: Vec<u32>,
    pub coin_name: String,
    pub show_display: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RippleGetAddress {
    pub address_n: Vec<u32>,
    pub show_display: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RippleAddress {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignTx {
    pub inputs_count: u32,
    pub outputs_count: u32,
    pub coin_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxRequestType {
    #[serde(rename = "TXINPUT")]
    Input,
    #[serde(rename = "TXOUTPUT")]
    Output,
    #[serde(rename = "TXMETA")]
    Meta,
    #[serde(rename = "TXFINISHED")]
    Finished,
    #[serde(rename = "TXEXTRADATA")]
    ExtraData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRequest {
    pub request_type: TxRequestType,
    #[serde(default)]
    pub details: Option<TxRequestDetails>,
    #[serde(default)]
    pub serialized: Option<TxRequestSerialized>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxRequestDetails {
    #[serde(default)]
    pub request_index: Option<u32>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxRequestSerialized {
    #[serde(default)]
    pub signature_index: Option<u32>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub serialized_tx: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxAck {
    pub tx: TransactionType,
}

/// Transaction fragment sent in a `TxAck`; only the requested part is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_cnt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_cnt: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TxInputType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TxOutputType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bin_outputs: Vec<TxOutputBinType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInputType {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address_n: Vec<u32>,
    pub prev_hash: String,
    pub prev_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutputType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address_n: Vec<u32>,
    pub amount: u64,
    pub script_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutputBinType {
    pub amount: u64,
    pub script_pubkey: String,
}
