//! Bottom-up bulk construction
//!
//! Builds a fresh tree from an unordered batch in two phases: pack sorted
//! keys into full leaves, then group each level into parents until a single
//! root remains. The result is denser and usually shallower than the same
//! keys inserted one by one.

use tracing::{debug, warn};

use super::{BPlusKey, BPlusNode, BPlusTree, InternalNode, LeafNode, NodeId};

impl BPlusTree {
    /// Replace the whole tree with one built bottom-up from `keys`
    ///
    /// An empty batch leaves the current tree untouched and returns `false`.
    /// Otherwise every previously stored key is discarded and `true` is returned.
    pub fn build_bottom_up<I>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = BPlusKey>,
    {
        let mut keys: Vec<BPlusKey> = keys.into_iter().collect();

        if keys.is_empty() {
            warn!(
                order = self.order,
                "empty key batch, bulk build skipped and existing tree kept"
            );
            return false;
        }

        keys.sort_unstable();

        let max_keys = self.max_keys();
        let leaf_count = keys.len().div_ceil(max_keys);
        let mut nodes = Vec::with_capacity(leaf_count * 2);

        // Each entry is a node on the level being built plus the smallest key in its subtree
        let mut level: Vec<(NodeId, BPlusKey)> = Vec::with_capacity(leaf_count);

        // Leaf phase: leaf i is node i, so the chain link is simply i + 1
        for (i, chunk) in keys.chunks(max_keys).enumerate() {
            let mut leaf = LeafNode::with_keys(chunk.to_vec());
            leaf.next = (i + 1 < leaf_count).then_some(i + 1);
            nodes.push(BPlusNode::Leaf(leaf));
            level.push((i, chunk[0]));
        }

        // Level phase: group up to `order` nodes under each parent
        while level.len() > 1 {
            level = level
                .chunks(self.order)
                .map(|group| {
                    let separators = group[1..].iter().map(|&(_, low)| low).collect();
                    let children = group.iter().map(|&(id, _)| id).collect();

                    let id = nodes.len();
                    nodes.push(BPlusNode::Internal(InternalNode::new(separators, children)));
                    (id, group[0].1)
                })
                .collect();
        }

        let (root, _) = level[0];

        self.nodes = nodes;
        self.root = root;
        self.first_leaf = 0;
        self.entry_count = keys.len();

        debug!(
            keys = self.entry_count,
            leaves = leaf_count,
            nodes = self.nodes.len(),
            height = self.height(),
            expected_height = Self::bulk_height(self.entry_count, self.order),
            "bulk build complete"
        );

        true
    }

    /// Height a bottom-up build of `key_count` keys produces at the given order
    ///
    /// Returns 1 for an empty batch (the tree stays a single leaf).
    pub fn bulk_height(key_count: usize, order: usize) -> usize {
        if key_count == 0 || order < 3 {
            return 1;
        }

        let mut nodes = key_count.div_ceil(order - 1);
        let mut height = 1;

        while nodes > 1 {
            nodes = nodes.div_ceil(order);
            height += 1;
        }

        height
    }
}
