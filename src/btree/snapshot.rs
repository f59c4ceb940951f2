//! Whole-tree byte snapshots
//!
//! The snapshot is an opaque blob for transport or storage. It carries a
//! version tag; no other version is ever read back. The tree's fields are
//! mirrored here so nothing outside this module can decode a tree without
//! validating it.

use serde::{Deserialize, Serialize};

use super::{BPlusNode, BPlusTree, BPlusTreeError, BPlusTreeResult, MIN_ORDER, NodeId};

/// Current snapshot version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct TreeRef<'a> {
    root: NodeId,
    order: usize,
    nodes: &'a [BPlusNode],
    first_leaf: NodeId,
    entry_count: usize,
}

#[derive(Deserialize)]
struct TreeOwned {
    root: NodeId,
    order: usize,
    nodes: Vec<BPlusNode>,
    first_leaf: NodeId,
    entry_count: usize,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    tree: TreeRef<'a>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    version: u32,
    tree: TreeOwned,
}

impl BPlusTree {
    /// Serialize the whole tree into a byte snapshot
    pub fn to_snapshot(&self) -> BPlusTreeResult<Vec<u8>> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            tree: TreeRef {
                root: self.root,
                order: self.order,
                nodes: &self.nodes,
                first_leaf: self.first_leaf,
                entry_count: self.entry_count,
            },
        };

        serde_json::to_vec(&snapshot).map_err(|e| BPlusTreeError::Snapshot(e.to_string()))
    }

    /// Restore a tree from a byte snapshot
    ///
    /// The restored tree is validated before it is handed back.
    pub fn from_snapshot(bytes: &[u8]) -> BPlusTreeResult<Self> {
        let snapshot: SnapshotOwned =
            serde_json::from_slice(bytes).map_err(|e| BPlusTreeError::Snapshot(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(BPlusTreeError::UnsupportedSnapshotVersion(snapshot.version));
        }

        let TreeOwned {
            root,
            order,
            nodes,
            first_leaf,
            entry_count,
        } = snapshot.tree;
        if order < MIN_ORDER {
            return Err(BPlusTreeError::InvalidOrder(order));
        }

        let tree = BPlusTree {
            root,
            order,
            nodes,
            first_leaf,
            entry_count,
        };
        tree.validate()?;

        Ok(tree)
    }
}
