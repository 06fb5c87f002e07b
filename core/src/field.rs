//! Field roles: what each field of a request or response type means on the
//! wire.
//!
//! # Design
//! A request type lists its fields in declaration order as `Field` values,
//! each pairing the Rust field name with a `RequestRole`. A response type
//! does the same with `ResponseField`, handing out mutable sinks into its
//! own fields so the parser can fill them in. The builder and parser walk
//! these lists once; nothing is discovered at runtime by type inspection.
//!
//! ```
//! use fieldwire_core::{Field, Request, EmptyResponse, HttpMethod};
//!
//! struct DeleteTodo {
//!     id: u32,
//! }
//!
//! impl Request for DeleteTodo {
//!     type Response = EmptyResponse;
//!
//!     fn fields(&self) -> Vec<Field<'_>> {
//!         vec![
//!             Field::path("path", "/todos/{id}"),
//!             Field::path_parameter("id", &self.id),
//!             Field::method("method", HttpMethod::Delete),
//!         ]
//!     }
//! }
//! ```

use serde::Serialize;

use crate::cookie::Cookie;
use crate::format::{BodyPayload, Format, Payload};
use crate::http::HttpMethod;
use crate::strategy::{
    BodyStrategy, DefaultBodyStrategy, DefaultErrorBodyStrategy, ErrorBodyStrategy, HeaderStrategy,
};
use crate::value::{BodySink, HeaderSink, HeaderValue, PathValue, QueryItems, QueryValue};

/// A request type: an ordered list of role-tagged fields plus the response
/// type it expects back.
pub trait Request {
    type Response: Response;

    fn fields(&self) -> Vec<Field<'_>>;
}

/// A response type, built from `Default` and filled field by field.
pub trait Response: Default {
    fn fields(&mut self) -> Vec<ResponseField<'_>>;
}

/// A response with nothing to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyResponse;

impl Response for EmptyResponse {
    fn fields(&mut self) -> Vec<ResponseField<'_>> {
        Vec::new()
    }
}

/// Encoded request body together with its declared format.
pub struct Body<'a> {
    pub format: Format,
    pub payload: &'a dyn BodyPayload,
}

impl std::fmt::Debug for Body<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body").field("format", &self.format).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum RequestRole<'a> {
    /// Path template relative to the base URL, with `{name}` tokens.
    Path(&'a str),
    /// Replaces `{name}` tokens; `name` defaults to the field name.
    PathParameter { name: Option<&'a str>, value: Option<String> },
    Query { name: Option<&'a str>, items: QueryItems },
    Header { name: Option<&'a str>, value: Option<String> },
    Cookies(&'a [Cookie]),
    Method(HttpMethod),
    /// Absolute URL replacing the base URL and path template.
    Url(Option<&'a str>),
    Body(Body<'a>),
}

#[derive(Debug)]
pub struct Field<'a> {
    pub name: &'static str,
    pub role: RequestRole<'a>,
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, role: RequestRole<'a>) -> Self {
        Self { name, role }
    }

    pub fn path(name: &'static str, template: &'a str) -> Self {
        Self::new(name, RequestRole::Path(template))
    }

    pub fn path_parameter(name: &'static str, value: &impl PathValue) -> Self {
        Self::new(
            name,
            RequestRole::PathParameter {
                name: None,
                value: value.path_value(),
            },
        )
    }

    pub fn query(name: &'static str, value: &impl QueryValue) -> Self {
        Self::new(
            name,
            RequestRole::Query {
                name: None,
                items: value.query_items(),
            },
        )
    }

    pub fn header(name: &'static str, value: &impl HeaderValue) -> Self {
        Self::new(
            name,
            RequestRole::Header {
                name: None,
                value: value.header_value(),
            },
        )
    }

    pub fn cookies(name: &'static str, cookies: &'a [Cookie]) -> Self {
        Self::new(name, RequestRole::Cookies(cookies))
    }

    pub fn method(name: &'static str, method: HttpMethod) -> Self {
        Self::new(name, RequestRole::Method(method))
    }

    pub fn url(name: &'static str, url: Option<&'a str>) -> Self {
        Self::new(name, RequestRole::Url(url))
    }

    /// A body encoded with the format its type declares.
    pub fn body<T: Payload + Serialize>(name: &'static str, payload: &'a T) -> Self {
        Self::new(
            name,
            RequestRole::Body(Body {
                format: T::format(),
                payload,
            }),
        )
    }

    /// Overrides the wire name of a path parameter, query item or header.
    /// Other roles are returned unchanged.
    pub fn named(mut self, wire_name: &'a str) -> Self {
        match &mut self.role {
            RequestRole::PathParameter { name, .. }
            | RequestRole::Query { name, .. }
            | RequestRole::Header { name, .. } => *name = Some(wire_name),
            _ => {}
        }
        self
    }
}

pub enum ResponseRole<'a> {
    StatusCode(&'a mut u16),
    Header {
        strategy: HeaderStrategy,
        name: Option<&'a str>,
        sink: &'a mut dyn HeaderSink,
    },
    Body {
        strategy: Box<dyn BodyStrategy>,
        sink: &'a mut dyn BodySink,
    },
    ErrorBody {
        strategy: Box<dyn ErrorBodyStrategy>,
        sink: &'a mut dyn BodySink,
    },
    /// Every `Set-Cookie` header of the response.
    Cookies(&'a mut Vec<Cookie>),
}

impl ResponseRole<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseRole::StatusCode(_) => "status code",
            ResponseRole::Header { .. } => "header",
            ResponseRole::Body { .. } => "body",
            ResponseRole::ErrorBody { .. } => "error body",
            ResponseRole::Cookies(_) => "cookies",
        }
    }
}

pub struct ResponseField<'a> {
    pub name: &'static str,
    pub role: ResponseRole<'a>,
}

impl<'a> ResponseField<'a> {
    pub fn new(name: &'static str, role: ResponseRole<'a>) -> Self {
        Self { name, role }
    }

    pub fn status_code(name: &'static str, sink: &'a mut u16) -> Self {
        Self::new(name, ResponseRole::StatusCode(sink))
    }

    /// A header matched case-insensitively against the field name.
    pub fn header(name: &'static str, sink: &'a mut dyn HeaderSink) -> Self {
        Self::new(
            name,
            ResponseRole::Header {
                strategy: HeaderStrategy::default(),
                name: None,
                sink,
            },
        )
    }

    /// A body decoded for 2xx responses.
    pub fn body(name: &'static str, sink: &'a mut dyn BodySink) -> Self {
        Self::new(
            name,
            ResponseRole::Body {
                strategy: Box::new(DefaultBodyStrategy),
                sink,
            },
        )
    }

    /// An error body decoded for responses with status `>= 400`.
    pub fn error_body(name: &'static str, sink: &'a mut dyn BodySink) -> Self {
        Self::new(
            name,
            ResponseRole::ErrorBody {
                strategy: Box::new(DefaultErrorBodyStrategy),
                sink,
            },
        )
    }

    pub fn cookies(name: &'static str, sink: &'a mut Vec<Cookie>) -> Self {
        Self::new(name, ResponseRole::Cookies(sink))
    }

    pub fn with_body_strategy(mut self, strategy: impl BodyStrategy + 'static) -> Self {
        if let ResponseRole::Body { strategy: slot, .. } = &mut self.role {
            *slot = Box::new(strategy);
        }
        self
    }

    pub fn with_error_strategy(mut self, strategy: impl ErrorBodyStrategy + 'static) -> Self {
        if let ResponseRole::ErrorBody { strategy: slot, .. } = &mut self.role {
            *slot = Box::new(strategy);
        }
        self
    }

    pub fn with_header_strategy(mut self, strategy: HeaderStrategy) -> Self {
        if let ResponseRole::Header { strategy: slot, .. } = &mut self.role {
            *slot = strategy;
        }
        self
    }

    /// Looks the header up under `wire_name` instead of the field name.
    pub fn named(mut self, wire_name: &'a str) -> Self {
        if let ResponseRole::Header { name, .. } = &mut self.role {
            *name = Some(wire_name);
        }
        self
    }
}
