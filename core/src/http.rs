//! HTTP descriptor types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! request builder produces a `RequestDescriptor` and the response parser
//! consumes a `ResponseDescriptor`; the engine never touches the network.
//! The caller (or a `Transport` adapter) performs the actual I/O.
//!
//! Both descriptors own their data so they can be moved across threads and
//! into transports without lifetime concerns. Request headers keep
//! case-sensitive names in insertion order; response headers are looked up
//! case-insensitively.

use std::fmt;

use bytes::Bytes;
use url::Url;

use crate::error::{ApiError, EncodeError};

/// Maximum number of headers accepted when parsing a raw response.
const MAX_HEADER_NUM: usize = 64;

/// Checks that a header can be written on the wire as one line: the name
/// is a non-empty token and the value carries no CR, LF or NUL.
pub fn validate_header(name: &str, value: &str) -> Result<(), EncodeError> {
    let invalid = |reason: &'static str| EncodeError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if !name.bytes().all(is_token_byte) {
        return Err(invalid("name is not an HTTP token"));
    }
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
        return Err(invalid("value contains a line break or NUL"));
    }
    Ok(())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// HTTP method for a request. Defaults to `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved, transport-ready HTTP request.
///
/// Built by the request builder. The caller is responsible for executing
/// this request against the network and returning the corresponding
/// `ResponseDescriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Value of the header whose name matches `name` exactly.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether a header with this name is present, ignoring ASCII case.
    pub fn has_header_ignore_case(&self, name: &str) -> bool {
        self.headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Sets a header. An existing header with the same (case-sensitive)
    /// name is overwritten in place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Renders the request as HTTP/1.1 bytes: request line, headers, blank
    /// line, body. `Host` and `Content-Length` are added unless the caller
    /// already set them. Headers are written verbatim; the request builder
    /// only emits headers that pass `validate_header`.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut target = self.url.path().to_string();
        if let Some(query) = self.url.query() {
            target.push('?');
            target.push_str(query);
        }

        let mut head = format!("{} {} HTTP/1.1\r\n", self.method, target);
        if !self.has_header_ignore_case("host") {
            if let Some(host) = self.url.host_str() {
                match self.url.port() {
                    Some(port) => head.push_str(&format!("Host: {host}:{port}\r\n")),
                    None => head.push_str(&format!("Host: {host}\r\n")),
                }
            }
        }
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if !self.body.is_empty() && !self.has_header_ignore_case("content-length") {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("\r\n");

        let mut wire = head.into_bytes();
        wire.extend_from_slice(&self.body);
        wire
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the caller (or a transport) after executing a request,
/// then handed to the response parser. It is never mutated during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseDescriptor {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// First header value whose name matches `name`, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All values for headers named `name`, ignoring ASCII case.
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses a raw HTTP/1.x response.
    ///
    /// The body is everything after the header block, truncated to
    /// `Content-Length` when that header is present. Chunked transfer
    /// coding is not decoded.
    pub fn from_wire(raw: &[u8]) -> Result<Self, ApiError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut response = httparse::Response::new(&mut headers);

        let body_offset = match response.parse(raw) {
            Ok(httparse::Status::Complete(offset)) => offset,
            Ok(httparse::Status::Partial) => {
                return Err(ApiError::InvalidResponse("incomplete response head".to_string()))
            }
            Err(e) => return Err(ApiError::InvalidResponse(e.to_string())),
        };

        let status = response
            .code
            .ok_or_else(|| ApiError::InvalidResponse("missing status code".to_string()))?;

        let mut parsed = Vec::with_capacity(response.headers.len());
        for header in response.headers.iter() {
            let value = std::str::from_utf8(header.value)
                .map_err(|_| ApiError::InvalidResponse(format!("header {} is not utf-8", header.name)))?;
            parsed.push((header.name.to_string(), value.trim().to_string()));
        }

        let mut body = &raw[body_offset..];
        let declared = parsed
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.parse::<usize>());
        if let Some(length) = declared {
            let length = length
                .map_err(|_| ApiError::InvalidResponse("invalid content-length".to_string()))?;
            if length > body.len() {
                return Err(ApiError::InvalidResponse(format!(
                    "body shorter than content-length {length}"
                )));
            }
            body = &body[..length];
        }

        Ok(Self {
            status,
            headers: parsed,
            body: Bytes::copy_from_slice(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_validation_rejects_line_breaks_and_bad_names() {
        assert!(validate_header("X-Note", "plain value; with=symbols").is_ok());
        assert!(matches!(
            validate_header("X-Note", "a\r\nX-Injected: 1"),
            Err(EncodeError::InvalidHeader { .. })
        ));
        assert!(validate_header("X-Note", "a\nb").is_err());
        assert!(validate_header("Bad Name", "v").is_err());
        assert!(validate_header("X-Evil:", "v").is_err());
        assert!(validate_header("", "v").is_err());
    }

    fn request() -> RequestDescriptor {
        RequestDescriptor::new(HttpMethod::Post, Url::parse("http://localhost:3000/todos?page=2").unwrap())
    }

    #[test]
    fn method_defaults_to_get() {
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn set_header_overwrites_same_name_in_place() {
        let mut req = request();
        req.set_header("Accept", "text/plain");
        req.set_header("X-Id", "1");
        req.set_header("Accept", "application/json");
        assert_eq!(
            req.headers,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Id".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn set_header_is_case_sensitive() {
        let mut req = request();
        req.set_header("accept", "a");
        req.set_header("Accept", "b");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.header("accept"), Some("a"));
        assert!(req.has_header_ignore_case("ACCEPT"));
    }

    #[test]
    fn to_wire_renders_request_line_and_body() {
        let mut req = request();
        req.set_header("Content-Type", "text/plain; charset=utf-8");
        req.body = Bytes::from_static(b"hello");
        let wire = String::from_utf8(req.to_wire()).unwrap();
        assert_eq!(
            wire,
            "POST /todos?page=2 HTTP/1.1\r\n\
             Host: localhost:3000\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Length: 5\r\n\
             \r\n\
             hello"
        );
    }

    #[test]
    fn to_wire_omits_content_length_for_empty_body() {
        let req = RequestDescriptor::new(HttpMethod::Get, Url::parse("https://example.local/").unwrap());
        let wire = String::from_utf8(req.to_wire()).unwrap();
        assert_eq!(wire, "GET / HTTP/1.1\r\nHost: example.local\r\n\r\n");
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let response = ResponseDescriptor::new(
            200,
            vec![
                ("Set-Cookie".to_string(), "a=1".to_string()),
                ("set-cookie".to_string(), "b=2".to_string()),
            ],
            Bytes::new(),
        );
        assert_eq!(response.header("SET-COOKIE"), Some("a=1"));
        assert_eq!(response.headers_named("set-cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn from_wire_parses_status_headers_and_body() {
        let raw = b"HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}trailing";
        let response = ResponseDescriptor::from_wire(raw).unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(&response.body[..], b"{}");
    }

    #[test]
    fn from_wire_rejects_incomplete_head() {
        let err = ResponseDescriptor::from_wire(b"HTTP/1.1 200 OK\r\nContent-Type").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn from_wire_rejects_garbage() {
        let err = ResponseDescriptor::from_wire(b"not http at all\r\n\r\n").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
