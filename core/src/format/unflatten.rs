//! Serde deserializer over flattened `(dotted.key, value)` pairs.
//!
//! This is the inverse of `tree::flatten`: dotted keys nest into groups and
//! a repeated key holds one value per list element. The wire does not say
//! whether a key is a list, so the target type decides. A sequence accepts
//! any number of values including none at all (an absent key), while a
//! scalar accepts exactly one.

use std::fmt;

use serde::de::value::StringDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Unexpected, Visitor,
};

use crate::error::{DecodeError, DecodeErrorKind};

/// Values gathered under one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Values(Vec<String>),
    Group(Vec<(String, Entry)>),
}

/// Nests `pairs` by their dotted keys, renaming every key segment.
pub fn group<I>(pairs: I, rename: &dyn Fn(&str) -> String) -> Result<Entry, DecodeError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut root = Vec::new();
    for (key, value) in pairs {
        let segments: Vec<String> = key.split('.').map(rename).collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut entries = &mut root;
        for parent in parents {
            entries = match child(entries, parent, || Entry::Group(Vec::new())) {
                Entry::Group(children) => children,
                Entry::Values(_) => return Err(conflict(&key)),
            };
        }
        match child(entries, last, || Entry::Values(Vec::new())) {
            Entry::Values(values) => values.push(value),
            Entry::Group(_) => return Err(conflict(&key)),
        }
    }
    Ok(Entry::Group(root))
}

fn child<'a>(entries: &'a mut Vec<(String, Entry)>, key: &str, make: impl FnOnce() -> Entry) -> &'a mut Entry {
    let index = match entries.iter().position(|(name, _)| name == key) {
        Some(index) => index,
        None => {
            entries.push((key.to_string(), make()));
            entries.len() - 1
        }
    };
    &mut entries[index].1
}

fn conflict(key: &str) -> DecodeError {
    DecodeError::data_corrupted(format!("key `{key}` is used both as a value and as a group"))
}

/// Deserializes `T` from a grouped entry, reporting the coding path of any
/// failure.
pub fn deserialize<T: DeserializeOwned>(root: Entry) -> Result<T, DecodeError> {
    serde_path_to_error::deserialize(Slot::Present(root)).map_err(|err| {
        let mut path = super::coding_path(err.path());
        let FormError(kind) = err.into_inner();
        if let DecodeErrorKind::KeyNotFound(key) = &kind {
            if path.segments().last() != Some(key) {
                path.push(key.clone());
            }
        }
        DecodeError::at(kind, path)
    })
}

#[derive(Debug)]
pub struct FormError(DecodeErrorKind);

impl FormError {
    fn mismatch(message: impl Into<String>) -> Self {
        FormError(DecodeErrorKind::TypeMismatch(message.into()))
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for FormError {}

impl de::Error for FormError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        FormError::mismatch(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        FormError(DecodeErrorKind::KeyNotFound(field.to_string()))
    }
}

/// A struct field's entry, or the name of a field the body did not carry.
enum Slot {
    Present(Entry),
    Absent(&'static str),
}

impl Slot {
    fn single(self) -> Result<String, FormError> {
        match self {
            Slot::Present(Entry::Values(mut values)) if values.len() == 1 => Ok(values.remove(0)),
            Slot::Present(Entry::Values(values)) => Err(FormError::mismatch(format!(
                "expected a single value, found {}",
                values.len()
            ))),
            Slot::Present(Entry::Group(_)) => Err(FormError::mismatch("expected a value, found a group of keys")),
            Slot::Absent(field) => Err(de::Error::missing_field(field)),
        }
    }

    fn children(self, fields: &'static [&'static str]) -> Result<GroupAccess, FormError> {
        let mut entries: Vec<(String, Slot)> = match self {
            Slot::Present(Entry::Group(children)) => children
                .into_iter()
                .map(|(key, entry)| (key, Slot::Present(entry)))
                .collect(),
            Slot::Present(Entry::Values(_)) => {
                return Err(FormError::mismatch("expected a group of keys, found a value"))
            }
            Slot::Absent(_) => Vec::new(),
        };
        for field in fields {
            if !entries.iter().any(|(key, _)| key.as_str() == *field) {
                entries.push((field.to_string(), Slot::Absent(*field)));
            }
        }
        Ok(GroupAccess {
            entries: entries.into_iter(),
            pending: None,
        })
    }
}

macro_rules! parse_scalar {
    ($($method:ident => $visit:ident,)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
            let text = self.single()?;
            match text.parse() {
                Ok(value) => visitor.$visit(value),
                Err(_) => Err(de::Error::invalid_value(Unexpected::Str(&text), &visitor)),
            }
        }
    )*};
}

impl<'de> Deserializer<'de> for Slot {
    type Error = FormError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        match self {
            Slot::Present(Entry::Values(mut values)) if values.len() == 1 => visitor.visit_string(values.remove(0)),
            Slot::Present(Entry::Values(values)) => visitor.visit_seq(ValuesAccess(values.into_iter())),
            group @ Slot::Present(Entry::Group(_)) => group.deserialize_map(visitor),
            Slot::Absent(field) => Err(de::Error::missing_field(field)),
        }
    }

    parse_scalar! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
        deserialize_char => visit_char,
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_string(self.single()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_string(self.single()?)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_string(self.single()?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_byte_buf(self.single()?.into_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_byte_buf(self.single()?.into_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        match self {
            Slot::Absent(_) => visitor.visit_none(),
            present => visitor.visit_some(present),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        match self {
            Slot::Present(Entry::Values(values)) => visitor.visit_seq(ValuesAccess(values.into_iter())),
            Slot::Present(Entry::Group(_)) => Err(FormError::mismatch("expected a list, found a group of keys")),
            Slot::Absent(_) => visitor.visit_seq(ValuesAccess(Vec::new().into_iter())),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, FormError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_map(self.children(&[])?)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        visitor.visit_map(self.children(fields)?)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        let variant: StringDeserializer<FormError> = self.single()?.into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }
}

/// List elements, one value each.
struct ValuesAccess(std::vec::IntoIter<String>);

impl<'de> SeqAccess<'de> for ValuesAccess {
    type Error = FormError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, FormError> {
        match self.0.next() {
            Some(value) => seed.deserialize(Slot::Present(Entry::Values(vec![value]))).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

struct GroupAccess {
    entries: std::vec::IntoIter<(String, Slot)>,
    pending: Option<Slot>,
}

impl<'de> MapAccess<'de> for GroupAccess {
    type Error = FormError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, FormError> {
        match self.entries.next() {
            Some((key, slot)) => {
                self.pending = Some(slot);
                let key: StringDeserializer<FormError> = key.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, FormError> {
        match self.pending.take() {
            Some(slot) => seed.deserialize(slot),
            None => Err(FormError::mismatch("map value requested before its key")),
        }
    }
}
