//! Serde bridge that lowers any `Serialize` value into a small value tree.
//!
//! The form and multipart codecs only care about leaves (text or raw bytes)
//! and how they nest, so this tree keeps exactly that. Scalars are rendered
//! to their string form here; byte buffers stay binary so the multipart
//! codec can emit them as file parts.

use std::fmt;

use serde::ser::{self, Impossible, Serialize, Serializer as _};

use crate::error::EncodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Node>),
    Map(Vec<(String, Node)>),
}

/// One leaf of a flattened tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Text(String),
    Bytes(Vec<u8>),
}

pub fn to_node<T: Serialize + ?Sized>(value: &T) -> Result<Node, EncodeError> {
    value
        .serialize(NodeSerializer)
        .map_err(|e| EncodeError::Serialize(e.0))
}

/// Flattens a tree into `(dotted.key, leaf)` pairs in declaration order.
///
/// The top level must be a struct or map (or nothing at all). Lists repeat
/// their parent key once per element, nulls are dropped, and every key
/// segment passes through `rename`.
pub fn flatten(
    node: Node,
    format: &'static str,
    rename: &dyn Fn(&str) -> String,
) -> Result<Vec<(String, Leaf)>, EncodeError> {
    let mut out = Vec::new();
    match node {
        Node::Null => {}
        Node::Map(entries) => {
            for (key, child) in entries {
                flatten_into(child, rename(&key), rename, &mut out);
            }
        }
        _ => {
            return Err(EncodeError::Unsupported {
                format,
                reason: "top-level value must be a struct or map".to_string(),
            })
        }
    }
    Ok(out)
}

fn flatten_into(node: Node, key: String, rename: &dyn Fn(&str) -> String, out: &mut Vec<(String, Leaf)>) {
    match node {
        Node::Null => {}
        Node::Text(text) => out.push((key, Leaf::Text(text))),
        Node::Bytes(bytes) => out.push((key, Leaf::Bytes(bytes))),
        Node::List(items) => {
            for item in items {
                flatten_into(item, key.clone(), rename, out);
            }
        }
        Node::Map(entries) => {
            for (child_key, child) in entries {
                flatten_into(child, format!("{key}.{}", rename(&child_key)), rename, out);
            }
        }
    }
}

#[derive(Debug)]
pub struct TreeError(String);

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TreeError {}

impl ser::Error for TreeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        TreeError(msg.to_string())
    }
}

struct NodeSerializer;

fn text(value: impl ToString) -> Result<Node, TreeError> {
    Ok(Node::Text(value.to_string()))
}

impl ser::Serializer for NodeSerializer {
    type Ok = Node;
    type Error = TreeError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantBuilder<SeqBuilder>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantBuilder<MapBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_i8(self, v: i8) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_i16(self, v: i16) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_i32(self, v: i32) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_i64(self, v: i64) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_u8(self, v: u8) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_u16(self, v: u16) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_u32(self, v: u32) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_u64(self, v: u64) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_f32(self, v: f32) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_f64(self, v: f64) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_char(self, v: char) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_str(self, v: &str) -> Result<Node, TreeError> {
        text(v)
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<Node, TreeError> {
        Ok(Node::Bytes(v.to_vec()))
    }
    fn serialize_none(self) -> Result<Node, TreeError> {
        Ok(Node::Null)
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Node, TreeError> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<Node, TreeError> {
        Ok(Node::Null)
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<Node, TreeError> {
        Ok(Node::Null)
    }
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Node, TreeError> {
        text(variant)
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _name: &'static str, value: &T) -> Result<Node, TreeError> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Node, TreeError> {
        Ok(Node::Map(vec![(variant.to_string(), value.serialize(NodeSerializer)?)]))
    }
    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, TreeError> {
        Ok(SeqBuilder(Vec::with_capacity(len.unwrap_or(0))))
    }
    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, TreeError> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder, TreeError> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<SeqBuilder>, TreeError> {
        Ok(VariantBuilder {
            variant,
            inner: SeqBuilder(Vec::with_capacity(len)),
        })
    }
    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, TreeError> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }
    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, TreeError> {
        self.serialize_map(Some(len))
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<MapBuilder>, TreeError> {
        Ok(VariantBuilder {
            variant,
            inner: MapBuilder {
                entries: Vec::with_capacity(len),
                pending_key: None,
            },
        })
    }
}

pub struct SeqBuilder(Vec<Node>);

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Node;
    type Error = TreeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), TreeError> {
        self.0.push(value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Node, TreeError> {
        Ok(Node::List(self.0))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Node;
    type Error = TreeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), TreeError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, TreeError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Node;
    type Error = TreeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), TreeError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, TreeError> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapBuilder {
    entries: Vec<(String, Node)>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Node;
    type Error = TreeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), TreeError> {
        self.pending_key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), TreeError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| TreeError("map value serialized before its key".to_string()))?;
        self.entries.push((key, value.serialize(NodeSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Node, TreeError> {
        Ok(Node::Map(self.entries))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Node;
    type Error = TreeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), TreeError> {
        self.entries.push((key.to_string(), value.serialize(NodeSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Node, TreeError> {
        Ok(Node::Map(self.entries))
    }
}

pub struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

impl ser::SerializeTupleVariant for VariantBuilder<SeqBuilder> {
    type Ok = Node;
    type Error = TreeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), TreeError> {
        ser::SerializeSeq::serialize_element(&mut self.inner, value)
    }

    fn end(self) -> Result<Node, TreeError> {
        let inner = ser::SerializeSeq::end(self.inner)?;
        Ok(Node::Map(vec![(self.variant.to_string(), inner)]))
    }
}

impl ser::SerializeStructVariant for VariantBuilder<MapBuilder> {
    type Ok = Node;
    type Error = TreeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), TreeError> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Node, TreeError> {
        let inner = ser::SerializeStruct::end(self.inner)?;
        Ok(Node::Map(vec![(self.variant.to_string(), inner)]))
    }
}

/// Map keys must render to plain strings.
struct KeySerializer;

fn key_error() -> TreeError {
    TreeError("map keys must be strings or scalars".to_string())
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = TreeError;
    type SerializeSeq = Impossible<String, TreeError>;
    type SerializeTuple = Impossible<String, TreeError>;
    type SerializeTupleStruct = Impossible<String, TreeError>;
    type SerializeTupleVariant = Impossible<String, TreeError>;
    type SerializeMap = Impossible<String, TreeError>;
    type SerializeStruct = Impossible<String, TreeError>;
    type SerializeStructVariant = Impossible<String, TreeError>;

    fn serialize_bool(self, v: bool) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_i8(self, v: i8) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_i16(self, v: i16) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_i32(self, v: i32) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_i64(self, v: i64) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_u8(self, v: u8) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_u16(self, v: u16) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_u32(self, v: u32) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_u64(self, v: u64) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_f32(self, v: f32) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_f64(self, v: f64) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_char(self, v: char) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_str(self, v: &str) -> Result<String, TreeError> {
        Ok(v.to_string())
    }
    fn serialize_bytes(self, _v: &[u8]) -> Result<String, TreeError> {
        Err(key_error())
    }
    fn serialize_none(self) -> Result<String, TreeError> {
        Err(key_error())
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, TreeError> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<String, TreeError> {
        Err(key_error())
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, TreeError> {
        Err(key_error())
    }
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, TreeError> {
        Ok(variant.to_string())
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _name: &'static str, value: &T) -> Result<String, TreeError> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, TreeError> {
        Err(key_error())
    }
    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, TreeError> {
        Err(key_error())
    }
    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, TreeError> {
        Err(key_error())
    }
    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct, TreeError> {
        Err(key_error())
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, TreeError> {
        Err(key_error())
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, TreeError> {
        Err(key_error())
    }
    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, TreeError> {
        Err(key_error())
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, TreeError> {
        Err(key_error())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;
    use crate::format::Binary;

    #[derive(Serialize)]
    struct Address {
        city: String,
        zip: Option<u32>,
    }

    #[derive(Serialize)]
    struct Profile {
        name: String,
        age: u8,
        active: bool,
        tags: Vec<String>,
        address: Address,
        avatar: Binary,
    }

    fn identity(key: &str) -> String {
        key.to_string()
    }

    #[test]
    fn scalars_become_text() {
        assert_eq!(to_node(&3.5f32).unwrap(), Node::Text("3.5".to_string()));
        assert_eq!(to_node(&false).unwrap(), Node::Text("false".to_string()));
        assert_eq!(to_node(&None::<u8>).unwrap(), Node::Null);
    }

    #[test]
    fn flatten_uses_dotted_keys_and_repeats_lists() {
        let profile = Profile {
            name: "Ada".to_string(),
            age: 36,
            active: true,
            tags: vec!["math".to_string(), "code".to_string()],
            address: Address {
                city: "London".to_string(),
                zip: None,
            },
            avatar: Binary(vec![0x89, 0x50]),
        };
        let pairs = flatten(to_node(&profile).unwrap(), "test", &identity).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), Leaf::Text("Ada".to_string())),
                ("age".to_string(), Leaf::Text("36".to_string())),
                ("active".to_string(), Leaf::Text("true".to_string())),
                ("tags".to_string(), Leaf::Text("math".to_string())),
                ("tags".to_string(), Leaf::Text("code".to_string())),
                ("address.city".to_string(), Leaf::Text("London".to_string())),
                ("avatar".to_string(), Leaf::Bytes(vec![0x89, 0x50])),
            ]
        );
    }

    #[test]
    fn flatten_renames_every_segment() {
        let mut map = BTreeMap::new();
        map.insert("outer_key", BTreeMap::from([("inner_key", 1)]));
        let pairs = flatten(to_node(&map).unwrap(), "test", &|k: &str| k.to_uppercase()).unwrap();
        assert_eq!(pairs, vec![("OUTER_KEY.INNER_KEY".to_string(), Leaf::Text("1".to_string()))]);
    }

    #[test]
    fn flatten_rejects_scalar_top_level() {
        let err = flatten(to_node("just text").unwrap(), "test", &identity).unwrap_err();
        assert!(matches!(err, EncodeError::Unsupported { format: "test", .. }));
    }

    #[test]
    fn non_string_map_keys_are_rejected() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(to_node(&map), Err(EncodeError::Serialize(_))));
    }
}
