//! Client facade over the request builder and response parser.
//!
//! # Design
//! `ApiClient` holds only a base URL and a retry policy and carries no
//! mutable state between calls. `build` and `parse` keep the I/O boundary
//! explicit for callers that run the HTTP round-trip themselves. The `send*`
//! methods drive a `Transport` or `AsyncTransport` through the same two
//! steps in four calling conventions: blocking, async, callback and
//! single-element stream.

use std::sync::Arc;

use futures::Stream;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::decoder;
use crate::encoder;
use crate::error::ApiError;
use crate::field::Request;
use crate::http::{RequestDescriptor, ResponseDescriptor};
use crate::retry::{Retrier, RetryPolicy};
use crate::transport::{AsyncTransport, Transport};

/// Stateless client bound to one base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Validates `base_url` and normalizes it to end with `/` so path
    /// templates are appended to it.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!("{base_url} cannot be a base url")));
        }
        Ok(Self {
            base_url,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn build<R: Request + ?Sized>(&self, request: &R) -> Result<RequestDescriptor, ApiError> {
        encoder::encode(&self.base_url, request)
    }

    pub fn parse<R: Request + ?Sized>(&self, response: &ResponseDescriptor) -> Result<R::Response, ApiError> {
        debug!(status = response.status, "parsing response");
        decoder::decode(response)
    }

    /// Blocking round-trip, retrying connectivity failures with a thread
    /// sleep between attempts.
    pub fn send<R, T>(&self, transport: &T, request: &R) -> Result<R::Response, ApiError>
    where
        R: Request + ?Sized,
        T: Transport + ?Sized,
    {
        let descriptor = self.build(request)?;
        let response = Retrier::new(self.retry).run(std::thread::sleep, || transport.send(&descriptor))?;
        self.parse::<R>(&response)
    }

    pub async fn send_async<R, T>(&self, transport: &T, request: &R) -> Result<R::Response, ApiError>
    where
        R: Request + Sync + ?Sized,
        T: AsyncTransport + ?Sized,
    {
        let descriptor = self.build(request)?;
        let descriptor = &descriptor;
        let response = Retrier::new(self.retry)
            .run_async(move || transport.send(descriptor))
            .await?;
        self.parse::<R>(&response)
    }

    /// Spawns the round-trip on `handle` and hands the result to
    /// `callback` on that runtime.
    pub fn send_with_callback<R, T, F>(&self, handle: &Handle, transport: Arc<T>, request: R, callback: F) -> JoinHandle<()>
    where
        R: Request + Send + Sync + 'static,
        R::Response: Send,
        T: AsyncTransport + 'static,
        F: FnOnce(Result<R::Response, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        handle.spawn(async move {
            let result = client.send_async(transport.as_ref(), &request).await;
            callback(result);
        })
    }

    /// A stream yielding exactly one item: the response or the error.
    pub fn send_stream<'a, R, T>(
        &'a self,
        transport: &'a T,
        request: &'a R,
    ) -> impl Stream<Item = Result<R::Response, ApiError>> + 'a
    where
        R: Request + Sync + ?Sized,
        T: AsyncTransport + ?Sized,
    {
        futures::stream::once(self.send_async(transport, request))
    }
}
