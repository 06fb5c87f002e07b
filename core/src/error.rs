//! Error types for request building, response parsing and transport.
//!
//! # Design
//! `ApiError` is what every public entry point returns. Codec failures keep
//! their own types (`EncodeError`, `DecodeError`) so callers can match on the
//! precise cause; decode errors also carry the coding path of the field that
//! failed. Transport failures pass through opaquely, classified only as far
//! as the retry coordinator needs.

use std::fmt;

use thiserror::Error;

use crate::format::TextEncoding;
use crate::transport::TransportError;

/// Errors returned by the request builder, the response parser and the
/// client send methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The base URL, the custom URL or the resolved URL is malformed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// A request body or field value could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodeError),

    /// The transport returned something that is not a usable HTTP response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A required response header was absent.
    #[error("missing response header `{name}`")]
    MissingHeader { name: String },

    /// A response body or header could not be decoded into its target type.
    #[error(transparent)]
    Decoding(#[from] DecodeError),

    /// Passthrough from the transport adapter.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Codec-level encoding failures.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value contains text that cannot be represented in the encoding.
    #[error("failed to encode text using encoding {encoding}")]
    Text { encoding: TextEncoding },

    /// The value's `Serialize` implementation failed.
    #[error("failed to serialize value: {0}")]
    Serialize(String),

    /// A header name or value would break the request framing.
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: &'static str },

    /// The value's shape is not representable in the chosen format.
    #[error("{format} cannot encode this value: {reason}")]
    Unsupported { format: &'static str, reason: String },
}

/// What went wrong while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("missing key `{0}`")]
    KeyNotFound(String),

    #[error("corrupted data: {0}")]
    DataCorrupted(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("value not found: {0}")]
    ValueNotFound(String),
}

/// Sequence of field names or indices identifying where a decode failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingPath(Vec<String>);

impl CodingPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    /// Returns the path with `segment` inserted in front.
    pub fn prefixed(mut self, segment: impl Into<String>) -> Self {
        self.0.insert(0, segment.into());
        self
    }
}

impl fmt::Display for CodingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl<S: Into<String>> FromIterator<S> for CodingPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A decode failure together with the coding path it occurred at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode `{path}`: {kind}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub path: CodingPath,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            path: CodingPath::new(),
        }
    }

    pub fn at(kind: DecodeErrorKind, path: CodingPath) -> Self {
        Self { kind, path }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::TypeMismatch(message.into()))
    }

    pub fn data_corrupted(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::DataCorrupted(message.into()))
    }

    /// Prefixes the coding path with the path of the enclosing value.
    pub fn under(mut self, prefix: CodingPath) -> Self {
        let mut segments = prefix.0;
        segments.append(&mut self.path.0);
        self.path = CodingPath(segments);
        self
    }

    /// Prefixes the coding path with the name of the enclosing field.
    pub fn within(mut self, field: &str) -> Self {
        self.path = self.path.prefixed(field);
        self
    }
}
