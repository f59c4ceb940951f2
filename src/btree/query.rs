//! Read-only queries, introspection and invariant checking

use std::fmt;

use super::{BPlusKey, BPlusNode, BPlusTree, BPlusTreeError, BPlusTreeResult, NodeId};

impl BPlusTree {
    // ========== Introspection ==========

    /// Collect keys by structural traversal
    ///
    /// Leaves contribute their keys; an internal node emits `keys[i]` right
    /// after traversing `children[i]`. A separator equal to a stored key is
    /// therefore emitted twice.
    pub fn all_keys(&self) -> Vec<BPlusKey> {
        let mut keys = Vec::with_capacity(self.entry_count);
        self.collect_keys(self.root, &mut keys);
        keys
    }

    fn collect_keys(&self, id: NodeId, out: &mut Vec<BPlusKey>) {
        match self.get_node(id) {
            Some(BPlusNode::Leaf(leaf)) => out.extend_from_slice(&leaf.keys),
            Some(BPlusNode::Internal(node)) => {
                for (i, &child) in node.children.iter().enumerate() {
                    self.collect_keys(child, out);
                    if let Some(&separator) = node.keys.get(i) {
                        out.push(separator);
                    }
                }
            }
            None => {}
        }
    }

    /// Get tree height (1 for a single leaf)
    ///
    /// Follows the leftmost children only; all leaves share one depth.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root;

        while let Some(BPlusNode::Internal(node)) = self.get_node(current) {
            match node.children.first() {
                Some(&child_id) => {
                    current = child_id;
                    height += 1;
                }
                None => break,
            }
        }

        height
    }

    /// Count every node reachable from the root
    pub fn node_count(&self) -> usize {
        self.count_nodes(self.root)
    }

    fn count_nodes(&self, id: NodeId) -> usize {
        match self.get_node(id) {
            Some(BPlusNode::Internal(node)) => {
                1 + node
                    .children
                    .iter()
                    .map(|&child| self.count_nodes(child))
                    .sum::<usize>()
            }
            Some(BPlusNode::Leaf(_)) => 1,
            None => 0,
        }
    }

    /// Keys of every leaf, in leaf-chain order
    pub fn leaf_chain(&self) -> Vec<Vec<BPlusKey>> {
        let mut leaves = Vec::new();
        let mut current = Some(self.first_leaf);

        while let Some(id) = current {
            let Some(leaf) = self.get_node(id).and_then(|n| n.as_leaf()) else {
                break;
            };
            leaves.push(leaf.keys.clone());
            current = leaf.next;
        }

        leaves
    }

    /// Range scan: return all stored keys where lower <= key <= upper
    pub fn range(&self, lower: BPlusKey, upper: BPlusKey) -> Vec<BPlusKey> {
        let mut results = Vec::new();

        if lower > upper {
            return results;
        }

        let mut current_id = self.find_leftmost_leaf(lower);

        while let Some(id) = current_id {
            let Some(leaf) = self.get_node(id).and_then(|n| n.as_leaf()) else {
                break;
            };

            for &k in &leaf.keys {
                if k > upper {
                    return results;
                }
                if k >= lower {
                    results.push(k);
                }
            }

            current_id = leaf.next;
        }

        results
    }

    /// Find the leftmost leaf that may hold `key`
    ///
    /// Duplicates of a separator can sit left of it, so descend past
    /// separators strictly below `key` only.
    fn find_leftmost_leaf(&self, key: BPlusKey) -> Option<NodeId> {
        let mut current = self.root;

        loop {
            match self.get_node(current)? {
                BPlusNode::Leaf(_) => return Some(current),
                BPlusNode::Internal(node) => {
                    let child_idx = node.keys.partition_point(|&k| k < key);
                    current = *node.children.get(child_idx)?;
                }
            }
        }
    }

    /// Iterate over all stored keys in leaf-chain order
    pub fn iter(&self) -> BPlusTreeIter<'_> {
        BPlusTreeIter::new(self)
    }

    // ========== Diagnostics ==========

    /// Render the tree depth-first, one line per node
    ///
    /// Debugging aid only; the format is not stable.
    pub fn dump(&self) -> String {
        self.to_string()
    }

    /// Print the tree dump to stdout
    pub fn print_tree(&self) {
        print!("{}", self);
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, level: usize) -> fmt::Result {
        let Some(node) = self.get_node(id) else {
            return writeln!(
                f,
                "{:indent$}Level {}: <missing node {}>",
                "",
                level,
                id,
                indent = level * 2
            );
        };

        writeln!(
            f,
            "{:indent$}Level {}: {:?}",
            "",
            level,
            node.keys(),
            indent = level * 2
        )?;

        if let BPlusNode::Internal(internal) = node {
            for &child in &internal.children {
                self.write_node(f, child, level + 1)?;
            }
        }

        Ok(())
    }

    /// Check the structural invariants
    ///
    /// - internal nodes have one more child than keys
    /// - no node holds more than `order - 1` keys
    /// - all leaves are at the same depth
    /// - every node except the root has exactly one parent
    /// - keys respect their separators and the leaf chain is in key order
    pub fn validate(&self) -> BPlusTreeResult<()> {
        let mut check = Validation {
            tree: self,
            seen: vec![false; self.nodes.len()],
            leaves: Vec::new(),
            leaf_depth: None,
        };
        check.visit(self.root, 1, None, None)?;

        // The chain must visit exactly the leaves found structurally, in order
        let mut chained = Vec::with_capacity(check.leaves.len());
        let mut current = Some(self.first_leaf);
        while let Some(id) = current {
            if chained.len() > check.leaves.len() {
                return Err(invalid("leaf chain is longer than the leaf level"));
            }
            let leaf = self
                .get_node(id)
                .and_then(|n| n.as_leaf())
                .ok_or_else(|| invalid(format!("leaf chain reaches non-leaf node {}", id)))?;
            chained.push(id);
            current = leaf.next;
        }
        if chained != check.leaves {
            return Err(invalid(format!(
                "leaf chain {:?} does not match leaf order {:?}",
                chained, check.leaves
            )));
        }

        let mut previous: Option<BPlusKey> = None;
        for key in self.iter() {
            if previous.is_some_and(|p| p > key) {
                return Err(invalid(format!("leaf chain out of order at key {}", key)));
            }
            previous = Some(key);
        }

        let stored: usize = self.leaf_chain().iter().map(Vec::len).sum();
        if stored != self.entry_count {
            return Err(invalid(format!(
                "tree records {} keys but leaves hold {}",
                self.entry_count, stored
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> BPlusTreeError {
    BPlusTreeError::InvalidState(message.into())
}

/// Depth-first invariant walk state
struct Validation<'a> {
    tree: &'a BPlusTree,
    seen: Vec<bool>,
    leaves: Vec<NodeId>,
    leaf_depth: Option<usize>,
}

impl Validation<'_> {
    fn visit(
        &mut self,
        id: NodeId,
        depth: usize,
        lower: Option<BPlusKey>,
        upper: Option<BPlusKey>,
    ) -> BPlusTreeResult<()> {
        let tree = self.tree;
        let node = tree.get_node(id).ok_or(BPlusTreeError::NodeNotFound(id))?;

        match self.seen.get_mut(id) {
            Some(seen) if *seen => {
                return Err(invalid(format!("node {} is referenced more than once", id)));
            }
            Some(seen) => *seen = true,
            None => return Err(BPlusTreeError::NodeNotFound(id)),
        }

        let keys = node.keys();
        if keys.len() > tree.max_keys() {
            return Err(invalid(format!(
                "node {} holds {} keys, limit is {}",
                id,
                keys.len(),
                tree.max_keys()
            )));
        }
        if !keys.is_sorted() {
            return Err(invalid(format!("node {} keys are not sorted", id)));
        }
        if let (Some(low), Some(&first)) = (lower, keys.first()) {
            if first < low {
                return Err(invalid(format!(
                    "node {} key {} is below separator {}",
                    id, first, low
                )));
            }
        }
        if let (Some(high), Some(&last)) = (upper, keys.last()) {
            if last > high {
                return Err(invalid(format!(
                    "node {} key {} is above separator {}",
                    id, last, high
                )));
            }
        }

        match node {
            BPlusNode::Leaf(leaf) => {
                if leaf.is_empty() && id != tree.root {
                    return Err(invalid(format!("non-root leaf {} is empty", id)));
                }
                match self.leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(invalid(format!(
                            "leaf {} at depth {}, other leaves at depth {}",
                            id, depth, expected
                        )));
                    }
                    Some(_) => {}
                    None => self.leaf_depth = Some(depth),
                }
                self.leaves.push(id);
            }
            BPlusNode::Internal(internal) => {
                if internal.children.len() != internal.keys.len() + 1 {
                    return Err(invalid(format!(
                        "internal node {} has {} keys and {} children",
                        id,
                        internal.keys.len(),
                        internal.children.len()
                    )));
                }
                for (i, &child) in internal.children.iter().enumerate() {
                    let low = if i == 0 { lower } else { Some(internal.keys[i - 1]) };
                    let high = internal.keys.get(i).copied().or(upper);
                    self.visit(child, depth + 1, low, high)?;
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for BPlusTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.root, 0)
    }
}

/// Iterator over B+ tree keys in leaf-chain order
pub struct BPlusTreeIter<'a> {
    tree: &'a BPlusTree,
    current_leaf: Option<NodeId>,
    current_idx: usize,
}

impl<'a> BPlusTreeIter<'a> {
    fn new(tree: &'a BPlusTree) -> Self {
        Self {
            tree,
            current_leaf: Some(tree.first_leaf),
            current_idx: 0,
        }
    }
}

impl Iterator for BPlusTreeIter<'_> {
    type Item = BPlusKey;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf_id = self.current_leaf?;
            let leaf = self.tree.get_node(leaf_id)?.as_leaf()?;

            if let Some(&key) = leaf.keys.get(self.current_idx) {
                self.current_idx += 1;
                return Some(key);
            }

            // Move to next leaf
            self.current_leaf = leaf.next;
            self.current_idx = 0;
        }
    }
}

impl<'a> IntoIterator for &'a BPlusTree {
    type Item = BPlusKey;
    type IntoIter = BPlusTreeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::{InternalNode, LeafNode};

    fn tree_with(order: usize, keys: impl IntoIterator<Item = BPlusKey>) -> BPlusTree {
        let mut tree = BPlusTree::new(order).unwrap();
        for key in keys {
            tree.insert(key).unwrap();
        }
        tree
    }

    #[test]
    fn test_all_keys_repeats_separators() {
        let tree = tree_with(3, [1, 2, 3, 4]);
        assert_eq!(tree.all_keys(), vec![1, 2, 3, 3, 4]);
    }

    #[test]
    fn test_all_keys_single_leaf() {
        let tree = tree_with(4, [9, 3, 6]);
        assert_eq!(tree.all_keys(), vec![3, 6, 9]);
        assert!(BPlusTree::new(4).unwrap().all_keys().is_empty());
    }

    #[test]
    fn test_node_count_matches_storage() {
        let tree = tree_with(3, 0..50);
        assert_eq!(tree.node_count(), tree.nodes.len());
    }

    #[test]
    fn test_range_search() {
        let tree = tree_with(4, (0..10).map(|i| i * 10));

        assert_eq!(tree.range(25, 55), vec![30, 40, 50]);
        assert_eq!(tree.range(0, 0), vec![0]);
        assert_eq!(tree.range(-100, 15), vec![0, 10]);
    }

    #[test]
    fn test_range_search_empty() {
        let tree = tree_with(4, (0..10).map(|i| i * 10));

        // Range with no entries
        assert!(tree.range(100, 200).is_empty());

        // Reversed range
        assert!(tree.range(50, 20).is_empty());
    }

    #[test]
    fn test_range_includes_duplicates() {
        let tree = tree_with(3, [5, 5, 5, 6, 4, 5]);
        assert_eq!(tree.range(5, 5), vec![5, 5, 5, 5]);
    }

    #[test]
    fn test_iterator() {
        // Insert in random order
        let tree = tree_with(4, [5, 2, 8, 1, 9, 3, 7, 4, 6, 0]);

        let keys: Vec<_> = tree.iter().collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());

        let via_ref: Vec<_> = (&tree).into_iter().collect();
        assert_eq!(via_ref, keys);
    }

    #[test]
    fn test_dump_format() {
        let tree = tree_with(3, [1, 2, 3, 4]);

        assert_eq!(
            tree.dump(),
            "Level 0: [3]\n  Level 1: [1, 2]\n  Level 1: [3, 4]\n"
        );
        assert_eq!(BPlusTree::new(3).unwrap().dump(), "Level 0: []\n");
    }

    #[test]
    fn test_validate_accepts_built_trees() {
        tree_with(3, 0..100).validate().unwrap();
        tree_with(7, (0..100).rev()).validate().unwrap();
        BPlusTree::new(3).unwrap().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_child_count_mismatch() {
        let mut tree = tree_with(3, [1, 2, 3]);
        let root = tree.root;
        tree.nodes[root] = BPlusNode::Internal(InternalNode {
            keys: vec![3, 4],
            children: vec![0, 1],
        });

        assert!(matches!(tree.validate(), Err(BPlusTreeError::InvalidState(_))));
    }

    #[test]
    fn test_validate_rejects_overfull_leaf() {
        let mut tree = tree_with(3, [1, 2]);
        tree.nodes[0] = BPlusNode::Leaf(LeafNode::with_keys(vec![1, 2, 3]));
        tree.entry_count = 3;

        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_broken_chain() {
        let mut tree = tree_with(3, [1, 2, 3, 4]);
        tree.nodes[0].as_leaf_mut().unwrap().next = None;

        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shared_child() {
        let mut tree = tree_with(3, [1, 2, 3, 4]);
        let root = tree.root;
        tree.nodes[root].as_internal_mut().unwrap().children = vec![0, 0];

        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_misrouted_key() {
        let mut tree = tree_with(3, [1, 2, 3, 4]);
        // Left leaf may not hold keys above the root separator
        tree.nodes[0] = BPlusNode::Leaf(LeafNode {
            keys: vec![1, 7],
            next: Some(1),
        });

        assert!(tree.validate().is_err());
    }
}
