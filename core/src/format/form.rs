//! `application/x-www-form-urlencoded` codec.
//!
//! Encoding flattens the value into dotted keys (`address.city=London`) and
//! repeats the key for every list element. Decoding groups the pairs back
//! by key and lets the target type decide whether a key is a list, so empty
//! and one-element lists survive the round trip.

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::form_urlencoded;

use super::tree::{self, Leaf};
use super::{unflatten, FormConfig};
use crate::error::{DecodeError, EncodeError};

pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const FORMAT: &str = "form-urlencoded";

pub fn encode<T: Serialize + ?Sized>(value: &T, config: &FormConfig) -> Result<Vec<u8>, EncodeError> {
    let pairs = tree::flatten(tree::to_node(value)?, FORMAT, &|key| config.key_casing.wire_key(key))?;

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, leaf) in pairs {
        match leaf {
            Leaf::Text(text) => {
                serializer.append_pair(&key, &text);
            }
            Leaf::Bytes(_) => {
                return Err(EncodeError::Unsupported {
                    format: FORMAT,
                    reason: format!("binary field `{key}` needs a multipart body"),
                })
            }
        }
    }
    Ok(serializer.finish().into_bytes())
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8], config: &FormConfig) -> Result<T, DecodeError> {
    let pairs = form_urlencoded::parse(bytes).map(|(key, value)| (key.into_owned(), value.into_owned()));
    let root = unflatten::group(pairs, &|segment| config.key_casing.field_key(segment))?;
    unflatten::deserialize(root)
}
