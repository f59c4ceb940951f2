use thiserror::Error;

use super::node::NodeId;

/// Errors that can occur during B+ tree operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BPlusTreeError {
    #[error("Invalid order: {0} (must be >= 3)")]
    InvalidOrder(usize),

    #[error("Invalid tree state: {0}")]
    InvalidState(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Parent not found for node {0}")]
    ParentNotFound(NodeId),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedSnapshotVersion(u32),
}

pub type BPlusTreeResult<T> = Result<T, BPlusTreeError>;
