//! Objects: the immutable, content-addressed values held by the store.
//!
//! Every object is persisted as the canonical CBOR array `[tag, payload]`.
//! The tag identifies the object kind so one namespace can hold many kinds,
//! and a loader can ask for "any of these kinds" when a link's target type
//! is not known statically (see [`ObjectVariant`] and [`Node`]).

use std::collections::BTreeMap;

use bytes::Bytes;
use ciborium::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::canonical::{decode_value, encode_value};
use crate::error::CoreError;
use crate::types::ObjectId;

/// The kind of object, written as the leading tag of its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectKind {
    /// Opaque bytes.
    Blob = 0x01,
    /// Named links to other objects.
    Tree = 0x02,
}

impl ObjectKind {
    /// Convert to the on-disk tag.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse an on-disk tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Blob),
            0x02 => Some(Self::Tree),
            _ => None,
        }
    }

    /// Human-readable name for errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
        }
    }
}

/// A single object kind that can be stored and loaded.
pub trait Object: Serialize + DeserializeOwned {
    /// Tag written in front of the payload.
    const KIND: ObjectKind;

    /// Canonical tagged encoding; the exact bytes written to disk.
    fn encode_tagged(&self) -> Result<Vec<u8>, CoreError> {
        encode_tagged(Self::KIND, self)
    }

    /// Content address of this object.
    fn compute_id(&self) -> Result<ObjectId, CoreError> {
        Ok(ObjectId::hash(&self.encode_tagged()?))
    }
}

/// A closed set of object kinds a loader is willing to accept.
///
/// Every [`Object`] is a one-member set; enums such as [`Node`] accept
/// several kinds and dispatch on the tag.
pub trait ObjectVariant: Sized {
    /// Build a value from a decoded tag and payload.
    fn from_tagged(tag: u8, payload: Value) -> Result<Self, CoreError>;
}

impl<T: Object> ObjectVariant for T {
    fn from_tagged(tag: u8, payload: Value) -> Result<Self, CoreError> {
        match ObjectKind::from_u8(tag) {
            Some(kind) if kind == T::KIND => deserialize_payload(&payload),
            Some(_) => Err(CoreError::TypeMismatch {
                expected: T::KIND.name(),
                found: tag,
            }),
            None => Err(CoreError::UnknownTag(tag)),
        }
    }
}

/// Encode `payload` behind `kind`'s tag.
pub fn encode_tagged<T: Serialize + ?Sized>(kind: ObjectKind, payload: &T) -> Result<Vec<u8>, CoreError> {
    let payload = Value::serialized(payload).map_err(|e| CoreError::Encoding(e.to_string()))?;
    encode_value(&Value::Array(vec![
        Value::Integer(kind.to_u8().into()),
        payload,
    ]))
}

/// Split an encoded object into its tag and undecoded payload.
pub fn split_tagged(bytes: &[u8]) -> Result<(u8, Value), CoreError> {
    let value = decode_value(bytes)?;
    let mut items = match value {
        Value::Array(items) if items.len() == 2 => items,
        _ => {
            return Err(CoreError::MalformedObject(
                "expected [tag, payload] array".into(),
            ))
        }
    };

    let payload = items.pop().unwrap_or(Value::Null);
    let tag = match items.pop() {
        Some(Value::Integer(i)) => {
            let n: i128 = i.into();
            u8::try_from(n).map_err(|_| CoreError::MalformedObject(format!("invalid tag: {}", n)))?
        }
        _ => return Err(CoreError::MalformedObject("missing tag".into())),
    };

    Ok((tag, payload))
}

/// Decode an encoded object as any member of `V`.
pub fn decode_tagged<V: ObjectVariant>(bytes: &[u8]) -> Result<V, CoreError> {
    let (tag, payload) = split_tagged(bytes)?;
    V::from_tagged(tag, payload)
}

fn deserialize_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, CoreError> {
    payload
        .deserialized()
        .map_err(|e| CoreError::Decoding(e.to_string()))
}

/// Opaque file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Bytes,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl Object for Blob {
    const KIND: ObjectKind = ObjectKind::Blob;
}

/// A directory-like node: names mapped to child object ids.
///
/// Entries live in a `BTreeMap` so iteration order, and therefore the
/// encoding, never depends on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: BTreeMap<String, ObjectId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ObjectId> {
        self.entries.get(name)
    }

    /// Insert or replace a link, returning the previous target.
    pub fn insert(&mut self, name: impl Into<String>, id: ObjectId) -> Option<ObjectId> {
        self.entries.insert(name.into(), id)
    }

    pub fn remove(&mut self, name: &str) -> Option<ObjectId> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), id))
    }
}

impl Object for Tree {
    const KIND: ObjectKind = ObjectKind::Tree;
}

/// Either kind of tree node, for links whose target kind isn't known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Blob(Blob),
    Tree(Tree),
}

impl Node {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Node::Blob(_) => ObjectKind::Blob,
            Node::Tree(_) => ObjectKind::Tree,
        }
    }

    pub fn encode_tagged(&self) -> Result<Vec<u8>, CoreError> {
        match self {
            Node::Blob(blob) => blob.encode_tagged(),
            Node::Tree(tree) => tree.encode_tagged(),
        }
    }
}

impl ObjectVariant for Node {
    fn from_tagged(tag: u8, payload: Value) -> Result<Self, CoreError> {
        match ObjectKind::from_u8(tag) {
            Some(ObjectKind::Blob) => Ok(Node::Blob(deserialize_payload(&payload)?)),
            Some(ObjectKind::Tree) => Ok(Node::Tree(deserialize_payload(&payload)?)),
            None => Err(CoreError::UnknownTag(tag)),
        }
    }
}

impl From<Blob> for Node {
    fn from(blob: Blob) -> Self {
        Node::Blob(blob)
    }
}

impl From<Tree> for Node {
    fn from(tree: Tree) -> Self {
        Node::Tree(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_encoding_layout() {
        let blob = Blob::new(&b"hi"[..]);
        let bytes = blob.encode_tagged().unwrap();
        // [1, {"data": h'6869'}]
        assert_eq!(
            bytes,
            vec![0x82, 0x01, 0xa1, 0x64, b'd', b'a', b't', b'a', 0x42, b'h', b'i']
        );
    }

    #[test]
    fn test_identical_content_identical_id() {
        let a = Blob::new(&b"same"[..]);
        let b = Blob::new(b"same".to_vec());
        assert_eq!(a.compute_id().unwrap(), b.compute_id().unwrap());
    }

    #[test]
    fn test_kind_is_part_of_identity() {
        // An empty tree and an empty-ish blob must never collide.
        let tree = Tree::new();
        let blob = Blob::new(Bytes::new());
        assert_ne!(tree.compute_id().unwrap(), blob.compute_id().unwrap());
    }

    #[test]
    fn test_tree_id_independent_of_insertion_order() {
        let x = ObjectId::from_bytes([1; 32]);
        let y = ObjectId::from_bytes([2; 32]);

        let mut first = Tree::new();
        first.insert("a", x);
        first.insert("b", y);

        let mut second = Tree::new();
        second.insert("b", y);
        second.insert("a", x);

        assert_eq!(first.compute_id().unwrap(), second.compute_id().unwrap());
    }

    #[test]
    fn test_decode_single_kind() {
        let mut tree = Tree::new();
        tree.insert("file", ObjectId::from_bytes([9; 32]));
        let bytes = tree.encode_tagged().unwrap();
        let back: Tree = decode_tagged(&bytes).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_decode_wrong_kind() {
        let bytes = Blob::new(&b"x"[..]).encode_tagged().unwrap();
        let err = decode_tagged::<Tree>(&bytes).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { expected: "tree", found: 1 }));
    }

    #[test]
    fn test_decode_variant_dispatches_on_tag() {
        let bytes = Blob::new(&b"x"[..]).encode_tagged().unwrap();
        let node: Node = decode_tagged(&bytes).unwrap();
        assert_eq!(node.kind(), ObjectKind::Blob);
    }

    #[test]
    fn test_unknown_tag() {
        let bytes = encode_tagged_raw(0x7f);
        assert!(matches!(
            decode_tagged::<Node>(&bytes),
            Err(CoreError::UnknownTag(0x7f))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(decode_tagged::<Node>(&[0x01, 0x02]).is_err());
        assert!(matches!(
            decode_tagged::<Node>(&[0x80]),
            Err(CoreError::MalformedObject(_))
        ));
    }

    fn encode_tagged_raw(tag: u8) -> Vec<u8> {
        encode_value(&Value::Array(vec![Value::Integer(tag.into()), Value::Null])).unwrap()
    }
}
