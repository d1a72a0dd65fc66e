//! Proptest generators for property-based testing.

use proptest::prelude::*;

use mirrorsync_core::{Blob, Node, ObjectId, Tree, UserId, VersionVector};
use mirrorsync_sync::Message;

/// Generate a random UserId.
pub fn user_id() -> impl Strategy<Value = UserId> {
    any::<[u8; 32]>().prop_map(UserId::from_bytes)
}

/// Generate a UserId from a pool of `pool` replicas, so vectors overlap.
pub fn pooled_user_id(pool: u8) -> impl Strategy<Value = UserId> {
    (0..pool.max(1)).prop_map(|i| UserId::from_bytes([i; 32]))
}

/// Generate a random ObjectId.
pub fn object_id() -> impl Strategy<Value = ObjectId> {
    any::<[u8; 32]>().prop_map(ObjectId::from_bytes)
}

/// Generate a version vector over at most `pool` replicas.
pub fn version_vector(pool: u8) -> impl Strategy<Value = VersionVector> {
    prop::collection::vec((pooled_user_id(pool), 0u64..16), 0..=pool as usize)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a valid tree entry name.
pub fn entry_name() -> impl Strategy<Value = String> {
    "[a-z0-9_.-]{1,12}".prop_filter("reserved name", |n| n.as_str() != "." && n.as_str() != "..")
}

/// Generate a relative path of one to `depth` components.
pub fn relative_path(depth: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(entry_name(), 1..=depth.max(1)).prop_map(|parts| parts.join("/"))
}

/// Generate a Blob.
pub fn blob() -> impl Strategy<Value = Blob> {
    payload(256).prop_map(Blob::new)
}

/// Generate a Tree of up to `max_entries` children.
pub fn tree(max_entries: usize) -> impl Strategy<Value = Tree> {
    prop::collection::btree_map(entry_name(), object_id(), 0..=max_entries)
        .prop_map(|entries| Tree { entries })
}

/// Generate a Node of either kind.
pub fn node() -> impl Strategy<Value = Node> {
    prop_oneof![blob().prop_map(Node::Blob), tree(8).prop_map(Node::Tree)]
}

/// Generate a protocol message.
pub fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        Just(Message::RqBranchList),
        prop::collection::vec(user_id(), 0..16).prop_map(Message::RsBranchList),
        user_id().prop_map(|branch_id| Message::RqBranch { branch_id }),
        (version_vector(4), object_id()).prop_map(|(version_vector, root_id)| {
            Message::RsBranch {
                version_vector,
                root_id,
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorsync_core::Object;

    proptest! {
        #[test]
        fn object_id_is_deterministic(blob in blob()) {
            prop_assert_eq!(blob.compute_id().unwrap(), blob.clone().compute_id().unwrap());
        }

        #[test]
        fn node_id_matches_concrete_kind(node in node()) {
            let id = ObjectId::hash(&node.encode_tagged().unwrap());
            let concrete = match &node {
                Node::Blob(b) => b.compute_id().unwrap(),
                Node::Tree(t) => t.compute_id().unwrap(),
            };
            prop_assert_eq!(id, concrete);
        }

        #[test]
        fn message_roundtrips(message in message()) {
            let bytes = message.encode().unwrap();
            prop_assert_eq!(Message::decode(&bytes).unwrap(), message);
        }

        #[test]
        fn generated_paths_are_relative(path in relative_path(4)) {
            prop_assert!(!path.starts_with('/'));
            prop_assert!(path.split('/').all(|p| !p.is_empty() && p != ".."));
        }
    }
}
