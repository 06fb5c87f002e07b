//! Response parser: fills a role-tagged response type from a
//! `ResponseDescriptor`.
//!
//! Body fields are decoded only when their strategy accepts the status
//! code. An empty body under a strategy that allows empty content yields
//! `None` before the strategy's `validate` is consulted, so a `204 No
//! Content` never reaches a codec.

use tracing::{debug, trace};

use crate::cookie::Cookie;
use crate::error::ApiError;
use crate::field::{Response, ResponseRole};
use crate::http::ResponseDescriptor;

pub fn decode<T: Response>(response: &ResponseDescriptor) -> Result<T, ApiError> {
    let status = response.status;
    if !(100..=599).contains(&status) {
        return Err(ApiError::InvalidResponse(format!("status code {status} is out of range")));
    }

    let mut value = T::default();
    for field in value.fields() {
        trace!(field = field.name, role = field.role.kind(), status, "visiting response field");
        match field.role {
            ResponseRole::StatusCode(sink) => *sink = status,
            ResponseRole::Header { strategy, name, sink } => {
                let name = name.unwrap_or(field.name);
                sink.receive(name, strategy.lookup(&response.headers, name))?;
            }
            ResponseRole::Body { strategy, sink } => {
                if response.body.is_empty() && strategy.allows_empty_content(status) {
                    debug!(field = field.name, status, "empty content accepted");
                    sink.clear();
                } else if !strategy.validate(status) {
                    debug!(field = field.name, status, "body skipped by strategy");
                    sink.clear();
                } else {
                    sink.decode(&response.body).map_err(|e| e.within(field.name))?;
                }
            }
            ResponseRole::ErrorBody { strategy, sink } => {
                if strategy.is_error(status) {
                    sink.decode(&response.body).map_err(|e| e.within(field.name))?;
                } else {
                    sink.clear();
                }
            }
            ResponseRole::Cookies(sink) => {
                *sink = response
                    .headers_named("set-cookie")
                    .filter_map(Cookie::parse_set_cookie)
                    .collect();
            }
        }
    }
    Ok(value)
}
