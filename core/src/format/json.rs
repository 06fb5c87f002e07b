//! JSON codec with configurable key casing and date format.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::date::with_date_format;
use super::{encode_error, rewrite_keys, JsonConfig, KeyCasing};
use crate::error::{CodingPath, DecodeError, DecodeErrorKind, EncodeError};

pub const CONTENT_TYPE: &str = "application/json";

pub fn encode<T: Serialize + ?Sized>(value: &T, config: &JsonConfig) -> Result<Vec<u8>, EncodeError> {
    with_date_format(&config.date_format, || {
        if config.key_casing == KeyCasing::Identity {
            return serde_json::to_vec(value).map_err(encode_error);
        }
        let tree = serde_json::to_value(value).map_err(encode_error)?;
        let tree = rewrite_keys(tree, &|key| config.key_casing.wire_key(key));
        serde_json::to_vec(&tree).map_err(encode_error)
    })
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8], config: &JsonConfig) -> Result<T, DecodeError> {
    with_date_format(&config.date_format, || {
        if config.key_casing == KeyCasing::Identity {
            let mut de = serde_json::Deserializer::from_slice(bytes);
            let value = tracked(&mut de)?;
            de.end().map_err(decode_error)?;
            return Ok(value);
        }
        let tree: Value = serde_json::from_slice(bytes).map_err(decode_error)?;
        tracked(rewrite_keys(tree, &|key| config.key_casing.field_key(key)))
    })
}

/// Deserializes while recording the path of the value being visited, so a
/// failure deep inside a nested value reports every field and index above it.
fn tracked<'de, D, T>(de: D) -> Result<T, DecodeError>
where
    D: serde::Deserializer<'de, Error = serde_json::Error>,
    T: serde::Deserialize<'de>,
{
    serde_path_to_error::deserialize(de).map_err(|err| {
        let path = super::coding_path(err.path());
        decode_error(err.into_inner()).under(path)
    })
}

/// Maps a `serde_json` failure onto the decode error taxonomy.
pub(crate) fn decode_error(err: serde_json::Error) -> DecodeError {
    use serde_json::error::Category;

    let message = err.to_string();
    match err.classify() {
        Category::Data => {
            if let Some(key) = backticked_after(&message, "missing field ") {
                let path: CodingPath = [key.clone()].into_iter().collect();
                DecodeError::at(DecodeErrorKind::KeyNotFound(key), path)
            } else if message.starts_with("invalid type: null") {
                DecodeError::new(DecodeErrorKind::ValueNotFound(message))
            } else {
                DecodeError::type_mismatch(message)
            }
        }
        Category::Syntax | Category::Eof | Category::Io => DecodeError::data_corrupted(message),
    }
}

/// Extracts `name` from a message shaped like "<prefix>`name`...".
fn backticked_after(message: &str, prefix: &str) -> Option<String> {
    let rest = message.strip_prefix(prefix)?.strip_prefix('`')?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}
