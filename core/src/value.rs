//! Conversions between field values and their textual wire forms.
//!
//! Request-side traits turn a field into the string(s) placed in the path,
//! the query or a header. Response-side sinks receive a header value or a
//! body and store it into the field they wrap.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{ApiError, DecodeError};
use crate::format::{self, Payload};

/// A value substituted for a `{name}` token in the path template.
///
/// `None` means the value is absent; the builder then writes the literal
/// `nil` so the gap stays visible in the resulting URL.
pub trait PathValue {
    fn path_value(&self) -> Option<String>;
}

/// What a query field contributes to the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryItems {
    Absent,
    Single(String),
    Many(Vec<String>),
}

impl QueryItems {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            QueryItems::Absent => Vec::new(),
            QueryItems::Single(value) => vec![value],
            QueryItems::Many(values) => values,
        }
    }
}

pub trait QueryValue {
    fn query_items(&self) -> QueryItems;
}

/// A request header value. `None` omits the header.
pub trait HeaderValue {
    fn header_value(&self) -> Option<String>;
}

macro_rules! scalar_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PathValue for $ty {
                fn path_value(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }

            impl QueryValue for $ty {
                fn query_items(&self) -> QueryItems {
                    QueryItems::Single(self.to_string())
                }
            }

            impl HeaderValue for $ty {
                fn header_value(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

scalar_values!(
    str, String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, Uuid,
);

impl<T: PathValue + ?Sized> PathValue for &T {
    fn path_value(&self) -> Option<String> {
        (**self).path_value()
    }
}

impl<T: PathValue> PathValue for Option<T> {
    fn path_value(&self) -> Option<String> {
        self.as_ref().and_then(PathValue::path_value)
    }
}

impl<T: QueryValue + ?Sized> QueryValue for &T {
    fn query_items(&self) -> QueryItems {
        (**self).query_items()
    }
}

impl<T: QueryValue> QueryValue for Option<T> {
    fn query_items(&self) -> QueryItems {
        match self {
            Some(value) => value.query_items(),
            None => QueryItems::Absent,
        }
    }
}

impl<T: QueryValue> QueryValue for [T] {
    fn query_items(&self) -> QueryItems {
        QueryItems::Many(self.iter().flat_map(|item| item.query_items().into_vec()).collect())
    }
}

impl<T: QueryValue> QueryValue for Vec<T> {
    fn query_items(&self) -> QueryItems {
        self.as_slice().query_items()
    }
}

impl<T: HeaderValue + ?Sized> HeaderValue for &T {
    fn header_value(&self) -> Option<String> {
        (**self).header_value()
    }
}

impl<T: HeaderValue> HeaderValue for Option<T> {
    fn header_value(&self) -> Option<String> {
        self.as_ref().and_then(HeaderValue::header_value)
    }
}

/// Receives a response header value, or `None` when the header is absent.
pub trait HeaderSink {
    fn receive(&mut self, name: &str, value: Option<&str>) -> Result<(), ApiError>;
}

fn parse_header<T>(name: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        DecodeError::type_mismatch(format!("header value `{raw}` is not a valid {}: {e}", std::any::type_name::<T>()))
            .within(name)
            .into()
    })
}

macro_rules! header_sinks {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HeaderSink for $ty {
                fn receive(&mut self, name: &str, value: Option<&str>) -> Result<(), ApiError> {
                    let raw = value.ok_or_else(|| ApiError::MissingHeader { name: name.to_string() })?;
                    *self = parse_header(name, raw)?;
                    Ok(())
                }
            }

            impl HeaderSink for Option<$ty> {
                fn receive(&mut self, name: &str, value: Option<&str>) -> Result<(), ApiError> {
                    *self = match value {
                        Some(raw) => Some(parse_header(name, raw)?),
                        None => None,
                    };
                    Ok(())
                }
            }
        )*
    };
}

header_sinks!(String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, Uuid);

/// Receives a response body. Only `Option<T>` implements it: a body that
/// is skipped by its strategy leaves `None`.
pub trait BodySink {
    fn clear(&mut self);

    fn decode(&mut self, bytes: &[u8]) -> Result<(), DecodeError>;
}

impl<T: Payload + DeserializeOwned> BodySink for Option<T> {
    fn clear(&mut self) {
        *self = None;
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        *self = Some(format::decode(&T::format(), bytes)?);
        Ok(())
    }
}
