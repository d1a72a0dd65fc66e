//! Canonical encoding vectors.
//!
//! Each vector pairs a value with the exact bytes the canonical encoder must
//! produce for it. Object ids are not listed; they follow from the bytes.

use serde::Serialize;

use mirrorsync_core::{canonical_bytes, Blob, Node, ObjectId, Tree, UserId, VersionVector};

/// The value a vector encodes.
#[derive(Debug, Clone)]
pub enum Subject {
    /// A tagged object.
    Node(Node),
    /// A bare version vector, as carried in branch files and messages.
    VersionVector(VersionVector),
}

/// An encoding test vector.
#[derive(Debug, Clone)]
pub struct EncodingVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub subject: Subject,
    /// Expected canonical bytes (hex).
    pub expected_hex: String,
}

impl EncodingVector {
    /// Canonical bytes of the subject.
    pub fn encode(&self) -> Vec<u8> {
        let encoded = match &self.subject {
            Subject::Node(node) => node.encode_tagged(),
            Subject::VersionVector(vv) => canonical_bytes(vv),
        };
        encoded.unwrap_or_else(|e| panic!("vector '{}' failed to encode: {}", self.name, e))
    }

    /// Canonical bytes of the subject, hex encoded.
    pub fn encode_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Content address, for object subjects.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self.subject {
            Subject::Node(_) => Some(ObjectId::hash(&self.encode())),
            Subject::VersionVector(_) => None,
        }
    }
}

fn repeat(byte: &str, count: usize) -> String {
    byte.repeat(count)
}

/// Get all encoding vectors.
pub fn all_vectors() -> Vec<EncodingVector> {
    let entries_key = "67656e7472696573"; // "entries"
    let data_key = "6464617461"; // "data"

    let mut two_entries = Tree::new();
    two_entries.insert("b", ObjectId::from_bytes([0x22; 32]));
    two_entries.insert("a", ObjectId::from_bytes([0x11; 32]));

    // "aa" sorts before "z" as a string but after it as encoded bytes.
    let mut length_first = Tree::new();
    length_first.insert("aa", ObjectId::from_bytes([0x11; 32]));
    length_first.insert("z", ObjectId::from_bytes([0x22; 32]));

    let mut single = Tree::new();
    single.insert("a", ObjectId::from_bytes([0x11; 32]));

    vec![
        EncodingVector {
            name: "empty blob",
            subject: Subject::Node(Blob::new(Vec::new()).into()),
            expected_hex: format!("8201a1{data_key}40"),
        },
        EncodingVector {
            name: "blob hi",
            subject: Subject::Node(Blob::new(&b"hi"[..]).into()),
            expected_hex: format!("8201a1{data_key}426869"),
        },
        EncodingVector {
            name: "blob hello world",
            subject: Subject::Node(Blob::new(&b"hello world"[..]).into()),
            expected_hex: format!("8201a1{data_key}4b68656c6c6f20776f726c64"),
        },
        EncodingVector {
            name: "empty tree",
            subject: Subject::Node(Tree::new().into()),
            expected_hex: format!("8202a1{entries_key}a0"),
        },
        EncodingVector {
            name: "tree with one entry",
            subject: Subject::Node(single.into()),
            expected_hex: format!("8202a1{entries_key}a161615820{}", repeat("11", 32)),
        },
        EncodingVector {
            name: "tree entries in key order",
            subject: Subject::Node(two_entries.into()),
            expected_hex: format!(
                "8202a1{entries_key}a261615820{}61625820{}",
                repeat("11", 32),
                repeat("22", 32)
            ),
        },
        EncodingVector {
            name: "tree keys sorted by encoded length first",
            subject: Subject::Node(length_first.into()),
            expected_hex: format!(
                "8202a1{entries_key}a2617a5820{}6261615820{}",
                repeat("22", 32),
                repeat("11", 32)
            ),
        },
        EncodingVector {
            name: "empty version vector",
            subject: Subject::VersionVector(VersionVector::new()),
            expected_hex: "a0".into(),
        },
        EncodingVector {
            name: "version vector with two replicas",
            subject: Subject::VersionVector(
                [
                    (UserId::from_bytes([0x02; 32]), 1),
                    (UserId::from_bytes([0x01; 32]), 300),
                ]
                .into_iter()
                .collect(),
            ),
            expected_hex: format!(
                "a25820{}19012c5820{}01",
                repeat("01", 32),
                repeat("02", 32)
            ),
        },
    ]
}

#[derive(Serialize)]
struct ExportedVector {
    name: &'static str,
    encoded: String,
    object_id: Option<String>,
}

/// Render every vector, with computed ids, as pretty JSON.
///
/// Other encoders can load this file and compare byte for byte.
pub fn export_json() -> serde_json::Result<String> {
    let exported: Vec<ExportedVector> = all_vectors()
        .iter()
        .map(|v| ExportedVector {
            name: v.name,
            encoded: v.encode_hex(),
            object_id: v.object_id().map(|id| id.to_hex()),
        })
        .collect();
    serde_json::to_string_pretty(&exported)
}
