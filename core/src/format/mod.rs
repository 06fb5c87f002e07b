//! Wire formats for request and response bodies.
//!
//! # Design
//! A `Format` is chosen per payload type, not per value: types implement
//! `Payload` and return their format from an associated function. The
//! request builder and response parser dispatch into the codec the format
//! names. Codecs are plain functions over `serde` so any type deriving
//! `Serialize`/`Deserialize` can act as a body.

pub mod date;
pub mod form;
pub mod json;
pub mod multipart;
pub mod plain;
pub(crate) mod tree;
pub(crate) mod unflatten;

use std::fmt;

use convert_case::{Boundary, Case, Converter};
use serde::de::{self, DeserializeOwned, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{CodingPath, DecodeError, EncodeError};

pub use date::{DateFormat, Timestamp};
pub use multipart::{mime_type, MultipartEncoder};
pub use plain::TextEncoding;

/// Casing of object keys on the wire.
///
/// Rust field names are snake_case, so encoding converts into the wire
/// casing and decoding converts back into snake_case. Words split only at
/// underscores and at a lowercase letter or digit followed by an uppercase
/// letter, so digits stay attached to their word (`address_line2` and
/// `addressLine2` map onto each other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyCasing {
    #[default]
    Identity,
    SnakeCase,
    CamelCase,
}

impl KeyCasing {
    /// Field name to wire key.
    pub fn wire_key(&self, key: &str) -> String {
        match self {
            KeyCasing::Identity => key.to_string(),
            KeyCasing::SnakeCase => convert(key, Case::Snake),
            KeyCasing::CamelCase => convert(key, Case::Camel),
        }
    }

    /// Wire key to field name.
    pub fn field_key(&self, key: &str) -> String {
        match self {
            KeyCasing::Identity => key.to_string(),
            KeyCasing::SnakeCase | KeyCasing::CamelCase => convert(key, Case::Snake),
        }
    }
}

const WORD_BOUNDARIES: [Boundary; 3] = [Boundary::Underscore, Boundary::LowerUpper, Boundary::DigitUpper];

fn convert(key: &str, case: Case) -> String {
    Converter::new().set_boundaries(&WORD_BOUNDARIES).to_case(case).convert(key)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonConfig {
    pub key_casing: KeyCasing,
    pub date_format: DateFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormConfig {
    pub key_casing: KeyCasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MultipartConfig {
    pub text_encoding: TextEncoding,
}

/// Body format of a payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    Json(JsonConfig),
    FormUrlEncoded(FormConfig),
    Multipart(MultipartConfig),
    PlainText(TextEncoding),
}

impl Format {
    pub fn json() -> Self {
        Format::Json(JsonConfig::default())
    }

    pub fn json_with(key_casing: KeyCasing, date_format: DateFormat) -> Self {
        Format::Json(JsonConfig {
            key_casing,
            date_format,
        })
    }

    pub fn form(key_casing: KeyCasing) -> Self {
        Format::FormUrlEncoded(FormConfig { key_casing })
    }

    pub fn multipart(text_encoding: TextEncoding) -> Self {
        Format::Multipart(MultipartConfig { text_encoding })
    }

    pub fn plain_text(encoding: TextEncoding) -> Self {
        Format::PlainText(encoding)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Json(_) => "json",
            Format::FormUrlEncoded(_) => "form-urlencoded",
            Format::Multipart(_) => "multipart",
            Format::PlainText(_) => "plain-text",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoded bytes together with the codec's canonical content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub fn encode<T: Serialize + ?Sized>(format: &Format, value: &T) -> Result<EncodedBody, EncodeError> {
    match format {
        Format::Json(config) => Ok(EncodedBody {
            content_type: json::CONTENT_TYPE.to_string(),
            bytes: json::encode(value, config)?,
        }),
        Format::FormUrlEncoded(config) => Ok(EncodedBody {
            content_type: form::CONTENT_TYPE.to_string(),
            bytes: form::encode(value, config)?,
        }),
        Format::Multipart(config) => {
            let encoder = MultipartEncoder::new(config.text_encoding);
            Ok(EncodedBody {
                content_type: encoder.content_type(),
                bytes: encoder.encode(value)?,
            })
        }
        Format::PlainText(encoding) => Ok(EncodedBody {
            content_type: plain::content_type(*encoding),
            bytes: plain::encode(value, *encoding)?,
        }),
    }
}

pub fn decode<T: DeserializeOwned>(format: &Format, bytes: &[u8]) -> Result<T, DecodeError> {
    match format {
        Format::Json(config) => json::decode(bytes, config),
        Format::FormUrlEncoded(config) => form::decode(bytes, config),
        Format::Multipart(_) => Err(DecodeError::type_mismatch("multipart bodies cannot be decoded")),
        Format::PlainText(encoding) => plain::decode(bytes, *encoding),
    }
}

/// Coding path of a failure located by `serde_path_to_error`.
pub(crate) fn coding_path(path: &serde_path_to_error::Path) -> CodingPath {
    use serde_path_to_error::Segment;

    path.iter()
        .filter_map(|segment| match segment {
            Segment::Seq { index } => Some(index.to_string()),
            Segment::Map { key } => Some(key.clone()),
            Segment::Enum { variant } => Some(variant.clone()),
            Segment::Unknown => None,
        })
        .collect()
}

fn rewrite_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (rename(&key), rewrite_keys(child, rename)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|item| rewrite_keys(item, rename)).collect()),
        other => other,
    }
}

fn encode_error(err: serde_json::Error) -> EncodeError {
    EncodeError::Serialize(err.to_string())
}

/// A type usable as a request or response body.
///
/// Collections delegate to their element type, so `Vec<Todo>` is decoded
/// with whatever format `Todo` declares.
pub trait Payload {
    fn format() -> Format;
}

impl Payload for String {
    fn format() -> Format {
        Format::PlainText(TextEncoding::Utf8)
    }
}

impl Payload for serde_json::Value {
    fn format() -> Format {
        Format::json()
    }
}

impl<T: Payload> Payload for Vec<T> {
    fn format() -> Format {
        T::format()
    }
}

/// Object-safe encoding hook used by request body fields.
pub trait BodyPayload {
    fn encode_body(&self, format: &Format) -> Result<EncodedBody, EncodeError>;
}

impl<T: Serialize> BodyPayload for T {
    fn encode_body(&self, format: &Format) -> Result<EncodedBody, EncodeError> {
        encode(format, self)
    }
}

/// Raw bytes that multipart bodies send as a file part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binary(pub Vec<u8>);

impl From<Vec<u8>> for Binary {
    fn from(value: Vec<u8>) -> Self {
        Binary(value)
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BinaryVisitor;

        impl<'de> Visitor<'de> for BinaryVisitor {
            type Value = Binary;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte buffer")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Binary, E> {
                Ok(Binary(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Binary, E> {
                Ok(Binary(v))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Binary, A::Error> {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                Ok(Binary(bytes))
            }
        }

        deserializer.deserialize_byte_buf(BinaryVisitor)
    }
}
