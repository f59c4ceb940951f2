pub mod btree;
pub mod partition;

pub use btree::{
    BPlusKey, BPlusNode, BPlusTree, BPlusTreeError, BPlusTreeResult, DEFAULT_ORDER, MIN_ORDER,
};
pub use partition::{
    JobConfig, Partition, PartitionError, PartitionReport, PartitionResult, PartitionTree,
    PartitionedBatch, RangePartitioner, build_range_trees,
};
