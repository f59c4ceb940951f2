//! B+ Tree implementation for range-partitioned integer indexes
//!
//! This module provides an in-memory B+ tree over `i64` keys. It supports:
//! - Incremental insertion with leaf/internal splits
//! - Bottom-up bulk construction from an unordered batch
//! - Duplicate keys (stored side by side, reported by presence only)
//! - Ordered scans via linked leaf nodes
//!
//! The tree is a key-presence index: leaves hold keys, not values.

mod bulk;
mod error;
mod node;
mod query;
mod snapshot;
#[cfg(test)]
mod tests;

pub use error::{BPlusTreeError, BPlusTreeResult};
pub use node::{BPlusNode, InternalNode, LeafNode, NodeId};
pub use query::BPlusTreeIter;
pub use snapshot::SNAPSHOT_VERSION;

use tracing::debug;

/// Key type for B+ tree
pub type BPlusKey = i64;

/// Default B+ tree order, as used by the per-range tree builders
pub const DEFAULT_ORDER: usize = 4;

/// Smallest order a tree accepts
pub const MIN_ORDER: usize = 3;

/// One step of a root-to-leaf descent: the internal node and the child index taken
type PathEntry = (NodeId, usize);

/// B+ Tree data structure
///
/// Order `m` means:
/// - Internal nodes have at most `m` children
/// - Every node holds at most `m-1` keys once an operation completes
/// - All leaves sit at the same depth
///
/// Trees are persisted only through [`BPlusTree::to_snapshot`] and
/// [`BPlusTree::from_snapshot`], which validates what it loads.
#[derive(Debug, Clone)]
pub struct BPlusTree {
    /// Root node ID (always present; an empty tree is a single empty leaf)
    root: NodeId,

    /// Tree order (max children per internal node)
    order: usize,

    /// Node storage
    nodes: Vec<BPlusNode>,

    /// First leaf node (start of the leaf chain)
    first_leaf: NodeId,

    /// Total number of keys stored in leaves, duplicates included
    entry_count: usize,
}

impl BPlusTree {
    /// Create a new empty B+ tree with the given order
    ///
    /// # Arguments
    /// * `order` - The tree order (must be >= 3)
    ///
    /// # Returns
    /// * `Ok(BPlusTree)` - A tree whose root is a single empty leaf
    /// * `Err(BPlusTreeError)` - If order is invalid
    pub fn new(order: usize) -> BPlusTreeResult<Self> {
        if order < MIN_ORDER {
            return Err(BPlusTreeError::InvalidOrder(order));
        }

        Ok(Self::empty(order))
    }

    /// Create a new B+ tree with the default order
    pub fn default_order() -> Self {
        Self::empty(DEFAULT_ORDER)
    }

    fn empty(order: usize) -> Self {
        Self {
            root: 0,
            order,
            nodes: vec![BPlusNode::Leaf(LeafNode::new())],
            first_leaf: 0,
            entry_count: 0,
        }
    }

    /// Get the tree order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Check if tree holds no keys
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Get number of keys in the tree (duplicates counted)
    pub fn len(&self) -> usize {
        self.entry_count
    }

    /// Maximum keys in any node
    fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Index at which an overflowing node is split
    fn split_point(&self) -> usize {
        (self.order + 1) / 2
    }

    // ========== Node Management ==========

    /// Allocate a new node, returning its ID
    fn allocate_node(&mut self, node: BPlusNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Get a reference to a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&BPlusNode> {
        self.nodes.get(id)
    }

    /// Get a mutable reference to a node by ID
    fn get_node_mut(&mut self, id: NodeId) -> Option<&mut BPlusNode> {
        self.nodes.get_mut(id)
    }

    fn leaf_mut(&mut self, id: NodeId) -> BPlusTreeResult<&mut LeafNode> {
        self.get_node_mut(id)
            .and_then(|n| n.as_leaf_mut())
            .ok_or(BPlusTreeError::NodeNotFound(id))
    }

    fn internal_mut(&mut self, id: NodeId) -> BPlusTreeResult<&mut InternalNode> {
        self.get_node_mut(id)
            .and_then(|n| n.as_internal_mut())
            .ok_or(BPlusTreeError::NodeNotFound(id))
    }

    /// Get the root node ID
    pub fn root_node_id(&self) -> NodeId {
        self.root
    }

    /// Get the first leaf node ID
    pub fn first_leaf_id(&self) -> NodeId {
        self.first_leaf
    }

    // ========== Search Operations ==========

    /// Check whether the key is stored in the tree
    pub fn search(&self, key: BPlusKey) -> bool {
        self.find_leaf(key)
            .and_then(|id| self.get_node(id))
            .and_then(|n| n.as_leaf())
            .is_some_and(|leaf| leaf.contains(key))
    }

    /// Find the leaf node that should contain the given key
    pub fn find_leaf(&self, key: BPlusKey) -> Option<NodeId> {
        let mut current = self.root;

        loop {
            match self.get_node(current)? {
                BPlusNode::Leaf(_) => return Some(current),
                BPlusNode::Internal(node) => {
                    let child_idx = node.find_child_index(key);
                    current = *node.children.get(child_idx)?;
                }
            }
        }
    }

    /// Find the leaf node and the path from root to it
    fn find_leaf_with_path(&self, key: BPlusKey) -> BPlusTreeResult<(NodeId, Vec<PathEntry>)> {
        let mut current = self.root;
        let mut path = Vec::new();

        loop {
            match self
                .get_node(current)
                .ok_or(BPlusTreeError::NodeNotFound(current))?
            {
                BPlusNode::Leaf(_) => return Ok((current, path)),
                BPlusNode::Internal(node) => {
                    let child_idx = node.find_child_index(key);
                    path.push((current, child_idx));
                    current = *node.children.get(child_idx).ok_or_else(|| {
                        BPlusTreeError::InvalidState(format!(
                            "internal node {} has no child {}",
                            current, child_idx
                        ))
                    })?;
                }
            }
        }
    }

    /// Find the parent of a node by searching the whole tree
    ///
    /// Returns `None` for the root and for nodes not reachable from it.
    /// Splits never need this: they walk back up the descent path instead.
    pub fn find_parent(&self, target: NodeId) -> Option<NodeId> {
        self.find_parent_from(self.root, target)
    }

    fn find_parent_from(&self, current: NodeId, target: NodeId) -> Option<NodeId> {
        let node = self.get_node(current)?.as_internal()?;

        for &child in &node.children {
            if child == target {
                return Some(current);
            }
            if let Some(parent) = self.find_parent_from(child, target) {
                return Some(parent);
            }
        }

        None
    }

    // ========== Insert Operations ==========

    /// Insert a key into the tree
    ///
    /// Duplicates are kept next to the equal keys already stored. Any split
    /// cascade completes before this returns.
    pub fn insert(&mut self, key: BPlusKey) -> BPlusTreeResult<()> {
        let (leaf_id, path) = self.find_leaf_with_path(key)?;
        let max_keys = self.max_keys();

        let overflow = {
            let leaf = self.leaf_mut(leaf_id)?;
            leaf.insert(key);
            leaf.len() > max_keys
        };

        self.entry_count += 1;

        if overflow {
            self.split_leaf(leaf_id, &path)?;
        }

        Ok(())
    }

    /// Split an overflowing leaf node
    fn split_leaf(&mut self, leaf_id: NodeId, path: &[PathEntry]) -> BPlusTreeResult<()> {
        let mid = self.split_point();
        let right_id = self.allocate_node(BPlusNode::Leaf(LeafNode::new()));

        let right = {
            let leaf = self.leaf_mut(leaf_id)?;
            let mut right = leaf.split_off(mid);

            // Splice the new leaf into the chain right after the old one
            right.next = leaf.next.replace(right_id);
            right
        };

        let separator = right.min_key().ok_or_else(|| {
            BPlusTreeError::InvalidState(format!("split of leaf {} left no upper half", leaf_id))
        })?;
        self.nodes[right_id] = BPlusNode::Leaf(right);

        self.insert_into_parent(path, leaf_id, separator, right_id)
    }

    /// Insert a new child into the parent after a split
    fn insert_into_parent(
        &mut self,
        path: &[PathEntry],
        left_id: NodeId,
        separator: BPlusKey,
        right_id: NodeId,
    ) -> BPlusTreeResult<()> {
        let Some((&(parent_id, child_idx), ancestors)) = path.split_last() else {
            // The root split - grow a new root
            self.grow_root(left_id, separator, right_id);
            return Ok(());
        };

        let max_keys = self.max_keys();

        let overflow = {
            let parent = self.internal_mut(parent_id)?;

            if parent.children.get(child_idx) != Some(&left_id) {
                return Err(BPlusTreeError::ParentNotFound(left_id));
            }

            parent.insert_child_after(child_idx, separator, right_id);
            parent.len() > max_keys
        };

        if overflow {
            self.split_internal(parent_id, ancestors)?;
        }

        Ok(())
    }

    /// Split an overflowing internal node
    fn split_internal(&mut self, node_id: NodeId, path: &[PathEntry]) -> BPlusTreeResult<()> {
        let mid = self.split_point();
        let right_id = self.allocate_node(BPlusNode::Internal(InternalNode::default()));

        let (promoted, right) = self.internal_mut(node_id)?.split(mid).ok_or_else(|| {
            BPlusTreeError::InvalidState(format!(
                "internal node {} has no key at split point {}",
                node_id, mid
            ))
        })?;
        self.nodes[right_id] = BPlusNode::Internal(right);

        self.insert_into_parent(path, node_id, promoted, right_id)
    }

    /// Replace the root with a two-child internal node
    fn grow_root(&mut self, left_id: NodeId, separator: BPlusKey, right_id: NodeId) {
        let new_root = InternalNode::new(vec![separator], vec![left_id, right_id]);
        self.root = self.allocate_node(BPlusNode::Internal(new_root));

        debug!(
            root = self.root,
            separator,
            height = self.height(),
            "root split, tree grew a level"
        );
    }
}
