use serde::{Deserialize, Serialize};

use super::BPlusKey;

/// Node identifier (index into node storage)
pub type NodeId = usize;

/// Internal node: stores separator keys and child pointers
///
/// In this B+ tree variant:
/// - children[i] holds keys < keys[i], children[i + 1] holds keys >= keys[i]
/// - children.len() == keys.len() + 1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalNode {
    /// Separator keys (sorted)
    pub keys: Vec<BPlusKey>,
    /// Child node IDs
    pub children: Vec<NodeId>,
}

impl InternalNode {
    /// Create a new internal node with given keys and children
    pub fn new(keys: Vec<BPlusKey>, children: Vec<NodeId>) -> Self {
        debug_assert_eq!(keys.len() + 1, children.len());
        Self { keys, children }
    }

    /// Number of separator keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if node has no separator keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Find the child index for a given key
    /// Returns the number of separators <= key, so equal keys route right
    pub fn find_child_index(&self, key: BPlusKey) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Insert a separator and its right child next to the child at `child_idx`
    /// Used after the child at `child_idx` split
    pub fn insert_child_after(&mut self, child_idx: usize, key: BPlusKey, child: NodeId) {
        self.keys.insert(child_idx, key);
        self.children.insert(child_idx + 1, child);
    }

    /// Split this node around `mid`, returning the promoted key and the new right sibling
    ///
    /// Keys after `mid` and children after index `mid` move right; `keys[mid]`
    /// leaves the node entirely. Returns `None` if the node has no key at `mid`.
    pub fn split(&mut self, mid: usize) -> Option<(BPlusKey, InternalNode)> {
        if mid >= self.keys.len() {
            return None;
        }

        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let promoted = self.keys.pop()?;

        Some((promoted, InternalNode::new(right_keys, right_children)))
    }
}

/// Leaf node: stores keys, linked to next leaf
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafNode {
    /// Keys (sorted, duplicates allowed)
    pub keys: Vec<BPlusKey>,
    /// Link to next leaf for ordered scans
    pub next: Option<NodeId>,
}

impl LeafNode {
    /// Create a new empty leaf node
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            next: None,
        }
    }

    /// Create a leaf node holding already sorted keys
    pub fn with_keys(keys: Vec<BPlusKey>) -> Self {
        debug_assert!(keys.is_sorted());
        Self { keys, next: None }
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if leaf is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert a key in sorted order
    /// Allows duplicate keys
    pub fn insert(&mut self, key: BPlusKey) {
        // Insert after existing keys with the same value
        let pos = self.keys.partition_point(|&k| k <= key);
        self.keys.insert(pos, key);
    }

    /// Check whether the key is stored here
    pub fn contains(&self, key: BPlusKey) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Get the minimum key in this leaf
    pub fn min_key(&self) -> Option<BPlusKey> {
        self.keys.first().copied()
    }

    /// Get the maximum key in this leaf
    pub fn max_key(&self) -> Option<BPlusKey> {
        self.keys.last().copied()
    }

    /// Split this leaf at `mid`, returning the new right sibling
    /// This node keeps keys before `mid`; the caller links the sibling into the chain
    pub fn split_off(&mut self, mid: usize) -> LeafNode {
        LeafNode::with_keys(self.keys.split_off(mid.min(self.keys.len())))
    }
}

/// B+ tree node (either internal or leaf)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BPlusNode {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl BPlusNode {
    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        matches!(self, BPlusNode::Leaf(_))
    }

    /// Check if this is an internal node
    pub fn is_internal(&self) -> bool {
        matches!(self, BPlusNode::Internal(_))
    }

    /// Keys held by this node (separators for internal nodes)
    pub fn keys(&self) -> &[BPlusKey] {
        match self {
            BPlusNode::Internal(node) => &node.keys,
            BPlusNode::Leaf(node) => &node.keys,
        }
    }

    /// Get as internal node reference
    pub fn as_internal(&self) -> Option<&InternalNode> {
        match self {
            BPlusNode::Internal(node) => Some(node),
            BPlusNode::Leaf(_) => None,
        }
    }

    /// Get as internal node mutable reference
    pub fn as_internal_mut(&mut self) -> Option<&mut InternalNode> {
        match self {
            BPlusNode::Internal(node) => Some(node),
            BPlusNode::Leaf(_) => None,
        }
    }

    /// Get as leaf node reference
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            BPlusNode::Internal(_) => None,
            BPlusNode::Leaf(node) => Some(node),
        }
    }

    /// Get as leaf node mutable reference
    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafNode> {
        match self {
            BPlusNode::Internal(_) => None,
            BPlusNode::Leaf(node) => Some(node),
        }
    }
}
