//! Status-code predicates that decide whether a response field is decoded.
//!
//! Body strategies answer two questions for a status code: should the body
//! be decoded at all, and is an empty body an acceptable "no value". Error
//! body strategies answer only whether the status denotes the error their
//! field models.

use std::ops::RangeInclusive;

pub trait BodyStrategy: Send + Sync {
    fn validate(&self, status: u16) -> bool;

    fn allows_empty_content(&self, _status: u16) -> bool {
        false
    }
}

pub trait ErrorBodyStrategy: Send + Sync {
    fn is_error(&self, status: u16) -> bool;
}

/// Decodes any 2xx response; empty bodies are a decode error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBodyStrategy;

impl BodyStrategy for DefaultBodyStrategy {
    fn validate(&self, status: u16) -> bool {
        (200..=299).contains(&status)
    }
}

/// Like the default strategy, but a `204 No Content` with an empty body
/// yields no value instead of an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalContentStrategy;

impl BodyStrategy for OptionalContentStrategy {
    fn validate(&self, status: u16) -> bool {
        (200..=299).contains(&status)
    }

    fn allows_empty_content(&self, status: u16) -> bool {
        status == 204
    }
}

/// Matches any status `>= 400`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorBodyStrategy;

impl ErrorBodyStrategy for DefaultErrorBodyStrategy {
    fn is_error(&self, status: u16) -> bool {
        status >= 400
    }
}

/// Matches exactly one status code. Usable for bodies and error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactStatus(pub u16);

impl ExactStatus {
    pub const CREATED: ExactStatus = ExactStatus(201);
    pub const SEE_OTHER: ExactStatus = ExactStatus(303);
    pub const BAD_REQUEST: ExactStatus = ExactStatus(400);
    pub const UNAUTHORIZED: ExactStatus = ExactStatus(401);
    pub const FORBIDDEN: ExactStatus = ExactStatus(403);
    pub const NOT_FOUND: ExactStatus = ExactStatus(404);
    pub const GONE: ExactStatus = ExactStatus(410);
    pub const UNPROCESSABLE_ENTITY: ExactStatus = ExactStatus(422);
}

impl BodyStrategy for ExactStatus {
    fn validate(&self, status: u16) -> bool {
        status == self.0
    }
}

impl ErrorBodyStrategy for ExactStatus {
    fn is_error(&self, status: u16) -> bool {
        status == self.0
    }
}

/// Matches an inclusive range of status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRange(pub RangeInclusive<u16>);

impl BodyStrategy for StatusRange {
    fn validate(&self, status: u16) -> bool {
        self.0.contains(&status)
    }
}

impl ErrorBodyStrategy for StatusRange {
    fn is_error(&self, status: u16) -> bool {
        self.0.contains(&status)
    }
}

/// How a response header field finds its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderStrategy {
    /// Ignores ASCII case and `-`/`_` separators, so `Content-Type`
    /// matches `content_type` and `contentType`.
    #[default]
    CaseInsensitive,
    /// Byte-exact name comparison.
    Exact,
}

impl HeaderStrategy {
    pub fn matches(&self, wire_name: &str, declared: &str) -> bool {
        match self {
            HeaderStrategy::Exact => wire_name == declared,
            HeaderStrategy::CaseInsensitive => normalize(wire_name) == normalize(declared),
        }
    }

    /// First header value matching `declared`.
    pub fn lookup<'a>(&self, headers: &'a [(String, String)], declared: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(name, _)| self.matches(name, declared))
            .map(|(_, value)| value.as_str())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
