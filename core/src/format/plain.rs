//! Plain-text codec and the text encodings shared by the other codecs.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::tree::{self, Node};
use crate::error::{DecodeError, EncodeError};

/// Character encoding used for text payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    /// ISO-8859-1.
    Latin1,
}

impl TextEncoding {
    /// IANA charset name, as used in `Content-Type` parameters.
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "us-ascii",
            TextEncoding::Latin1 => "iso-8859-1",
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodeError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Ascii if text.is_ascii() => Ok(text.as_bytes().to_vec()),
            TextEncoding::Ascii => Err(EncodeError::Text { encoding: *self }),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| EncodeError::Text { encoding: *self }))
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| DecodeError::data_corrupted(format!("failed to decode using encoding {self}"))),
            TextEncoding::Ascii if bytes.is_ascii() => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
            TextEncoding::Ascii => Err(DecodeError::data_corrupted(format!(
                "failed to decode using encoding {self}"
            ))),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn content_type(encoding: TextEncoding) -> String {
    format!("text/plain; charset={}", encoding.name())
}

/// Encodes a value that serializes to a single string.
pub fn encode<T: Serialize + ?Sized>(value: &T, encoding: TextEncoding) -> Result<Vec<u8>, EncodeError> {
    match tree::to_node(value)? {
        Node::Text(text) => encoding.encode(&text),
        _ => Err(EncodeError::Unsupported {
            format: "plain text",
            reason: "body must serialize to a single string".to_string(),
        }),
    }
}

/// Decodes the whole payload as one string and hands it to `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], encoding: TextEncoding) -> Result<T, DecodeError> {
    let text = encoding.decode(bytes)?;
    serde_json::from_value(serde_json::Value::String(text)).map_err(super::json::decode_error)
}
