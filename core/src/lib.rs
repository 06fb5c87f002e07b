//! Declarative HTTP request/response marshaling.
//!
//! # Overview
//! Request and response types describe themselves as ordered lists of
//! role-tagged fields (path, path parameter, query, header, cookies, method,
//! custom URL, body; status code, response header, body, error body). The
//! engine walks those lists once to build a `RequestDescriptor`, and once to
//! populate a response from a `ResponseDescriptor`. Network I/O stays
//! outside the engine (host-does-IO pattern), behind the `Transport` and
//! `AsyncTransport` traits.
//!
//! # Design
//! - `ApiClient` is stateless: a base URL plus a retry policy.
//! - Body formats (JSON, URL-encoded form, multipart, plain text) are
//!   declared per payload type through `Payload`, not chosen per call.
//! - Whether a response body is decoded depends on a per-field strategy
//!   evaluated against the status code, so one response type can carry
//!   both a success body and an error body.
//! - Only connectivity failures are retried, and only by the client's
//!   retry coordinator.

pub mod client;
pub mod cookie;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod field;
pub mod format;
pub mod http;
pub mod retry;
pub mod strategy;
pub mod transport;
pub mod value;

pub use client::ApiClient;
pub use cookie::{Cookie, SameSite};
pub use error::{ApiError, CodingPath, DecodeError, DecodeErrorKind, EncodeError};
pub use field::{EmptyResponse, Field, Request, RequestRole, Response, ResponseField, ResponseRole};
pub use format::{Binary, DateFormat, Format, KeyCasing, Payload, TextEncoding, Timestamp};
pub use http::{HttpMethod, RequestDescriptor, ResponseDescriptor};
pub use retry::{RetryPolicy, RetryState, Retrier};
pub use strategy::{
    BodyStrategy, DefaultBodyStrategy, DefaultErrorBodyStrategy, ErrorBodyStrategy, ExactStatus, HeaderStrategy,
    OptionalContentStrategy, StatusRange,
};
pub use transport::{AsyncTransport, Transport, TransportError, TransportErrorKind};
