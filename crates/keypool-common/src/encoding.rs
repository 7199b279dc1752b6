//! Payload Encodings
//!
//! A pool never looks inside arguments or results. The caller names a
//! request and a response [`Encoding`]; the pool hands both to the
//! transport, which uses them to turn a [`serde_json::Value`] into payload
//! bytes and back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::protocol::error::TransportError;

/// How a payload is represented on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Any JSON value, serialized as JSON text
    #[default]
    Json,
    /// A JSON string, sent as its raw UTF-8 bytes
    Utf8,
    /// A hex string, sent as the bytes it spells out
    Binary,
}

impl Encoding {
    /// Encodes a value into payload bytes.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, TransportError> {
        match self {
            Encoding::Json => serde_json::to_vec(value)
                .map_err(|e| TransportError::encoding(format!("json encode failed: {}", e))),
            Encoding::Utf8 => match value {
                Value::String(s) => Ok(s.as_bytes().to_vec()),
                other => Err(TransportError::encoding(format!(
                    "utf8 encoding expects a string, got {}",
                    kind_of(other)
                ))),
            },
            Encoding::Binary => match value {
                Value::String(s) => hex::decode(s)
                    .map_err(|e| TransportError::encoding(format!("binary encoding expects hex: {}", e))),
                other => Err(TransportError::encoding(format!(
                    "binary encoding expects a hex string, got {}",
                    kind_of(other)
                ))),
            },
        }
    }

    /// Decodes payload bytes back into a value.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, TransportError> {
        match self {
            Encoding::Json => serde_json::from_slice(bytes)
                .map_err(|e| TransportError::encoding(format!("json decode failed: {}", e))),
            Encoding::Utf8 => std::str::from_utf8(bytes)
                .map(|s| Value::String(s.to_string()))
                .map_err(|e| TransportError::encoding(format!("payload is not utf8: {}", e))),
            Encoding::Binary => Ok(Value::String(hex::encode(bytes))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Json => "json",
            Encoding::Utf8 => "utf8",
            Encoding::Binary => "binary",
        };
        f.write_str(name)
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Encoding::Json),
            "utf8" | "string" => Ok(Encoding::Utf8),
            "binary" | "raw" => Ok(Encoding::Binary),
            other => Err(format!("unknown encoding '{}' (expected json, utf8 or binary)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TransportErrorKind;
    use serde_json::json;

    #[test]
    fn test_utf8_sends_raw_string_bytes() {
        assert_eq!(Encoding::Utf8.encode(&json!("hi")).unwrap(), b"hi");
        assert_eq!(Encoding::Utf8.decode(b"hi").unwrap(), json!("hi"));
    }

    #[test]
    fn test_utf8_rejects_non_strings() {
        let err = Encoding::Utf8.encode(&json!({"a": 1})).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Encoding);
        assert!(err.message.contains("object"));
    }

    #[test]
    fn test_binary_uses_hex_strings() {
        assert_eq!(Encoding::Binary.encode(&json!("00ff")).unwrap(), vec![0x00, 0xff]);
        assert_eq!(Encoding::Binary.decode(&[0xde, 0xad]).unwrap(), json!("dead"));
        assert!(Encoding::Binary.encode(&json!("xyz")).is_err());
    }

    #[test]
    fn test_json_nested_values() {
        let value = json!({"nested": {"array": [1, 2, "three", null], "flag": true}});
        let bytes = Encoding::Json.encode(&value).unwrap();
        assert_eq!(Encoding::Json.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_invalid_utf8_payload() {
        let err = Encoding::Utf8.decode(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Encoding);
    }

    #[test]
    fn test_parse_encoding_names() {
        assert_eq!("JSON".parse::<Encoding>().unwrap(), Encoding::Json);
        assert_eq!("string".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("raw".parse::<Encoding>().unwrap(), Encoding::Binary);
        assert!("cbor".parse::<Encoding>().is_err());
        assert_eq!(Encoding::Binary.to_string(), "binary");
    }
}
