use thiserror::Error;

use super::Partition;
use crate::btree::BPlusTreeError;

/// Result type for partitioning operations
pub type PartitionResult<T> = Result<T, PartitionError>;

/// Errors that can occur while partitioning records and building range trees
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("B+ tree error: {0}")]
    BPlusTreeError(#[from] BPlusTreeError),

    #[error("Invalid partition thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tree builder for {0} panicked")]
    WorkerPanicked(Partition),
}
