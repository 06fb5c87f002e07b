//! The seam between the engine and whatever performs network I/O.
//!
//! # Design
//! The engine only builds and parses descriptors. A `Transport` (blocking)
//! or `AsyncTransport` takes a `RequestDescriptor` and returns the raw
//! `ResponseDescriptor`; status codes are data, never transport errors.
//! Adapters classify their failures into `TransportErrorKind` so the retry
//! coordinator can tell connectivity problems from everything else.

use std::future::Future;

use thiserror::Error;

use crate::http::{RequestDescriptor, ResponseDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    NotConnected,
    ConnectionLost,
    TimedOut,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotConnected, message)
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionLost, message)
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::TimedOut, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// Whether the failure is a transient connectivity problem worth
    /// retrying.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::NotConnected | TransportErrorKind::ConnectionLost | TransportErrorKind::TimedOut
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::NotConnected | ErrorKind::AddrNotAvailable => {
                TransportErrorKind::NotConnected
            }
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => {
                TransportErrorKind::ConnectionLost
            }
            ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportErrorKind::TimedOut,
            _ => TransportErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// Blocking transport.
pub trait Transport {
    fn send(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&RequestDescriptor) -> Result<ResponseDescriptor, TransportError>,
{
    fn send(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor, TransportError> {
        self(request)
    }
}

/// Asynchronous transport.
pub trait AsyncTransport: Send + Sync {
    fn send(
        &self,
        request: &RequestDescriptor,
    ) -> impl Future<Output = Result<ResponseDescriptor, TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn connectivity_kinds_are_retryable() {
        assert!(TransportError::not_connected("offline").is_connectivity());
        assert!(TransportError::connection_lost("reset").is_connectivity());
        assert!(TransportError::timed_out("slow").is_connectivity());
        assert!(!TransportError::other("tls").is_connectivity());
    }

    #[test]
    fn io_errors_are_classified() {
        let refused: TransportError = io::Error::from(io::ErrorKind::ConnectionRefused).into();
        assert_eq!(refused.kind, TransportErrorKind::NotConnected);
        let reset: TransportError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert_eq!(reset.kind, TransportErrorKind::ConnectionLost);
        let timeout: TransportError = io::Error::from(io::ErrorKind::TimedOut).into();
        assert_eq!(timeout.kind, TransportErrorKind::TimedOut);
        let denied: TransportError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert_eq!(denied.kind, TransportErrorKind::Other);
    }

    #[test]
    fn closures_are_transports() {
        let transport = |_: &RequestDescriptor| -> Result<ResponseDescriptor, TransportError> {
            Ok(ResponseDescriptor::new(204, Vec::new(), bytes::Bytes::new()))
        };
        let request = RequestDescriptor::new(
            crate::http::HttpMethod::Get,
            url::Url::parse("http://localhost/").unwrap(),
        );
        assert_eq!(transport.send(&request).unwrap().status, 204);
    }
}
