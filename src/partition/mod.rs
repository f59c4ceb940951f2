//! Range partitioning of integer records into per-range trees
//!
//! Records are read one integer per line, bucketed into five fixed key
//! ranges, and each non-empty range is bulk-built into its own tree by its
//! own worker thread. Malformed records never reach a tree: they are
//! reported and counted here.

mod config;
mod error;

pub use config::JobConfig;
pub use error::{PartitionError, PartitionResult};

use csv::{ByteRecord, ReaderBuilder, Trim};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{info, warn};

use crate::btree::{BPlusKey, BPlusTree};

/// Number of key ranges
pub const PARTITION_COUNT: usize = 5;

/// Number of thresholds separating the ranges
pub const THRESHOLD_COUNT: usize = PARTITION_COUNT - 1;

/// Default range thresholds
pub const DEFAULT_THRESHOLDS: [BPlusKey; THRESHOLD_COUNT] = [20_000, 40_000, 60_000, 80_000];

/// One of the fixed key ranges, displayed as `range-1` .. `range-5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition(usize);

impl Partition {
    pub fn new(index: usize) -> Option<Self> {
        (index < PARTITION_COUNT).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Partition> {
        (0..PARTITION_COUNT).map(Partition)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "range-{}", self.0 + 1)
    }
}

impl Serialize for Partition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a single record field as an integer key
pub fn parse_value(field: &str) -> Option<BPlusKey> {
    field.trim().parse().ok()
}

fn parse_record(record: &ByteRecord) -> Option<BPlusKey> {
    if record.len() != 1 {
        return None;
    }
    let field = std::str::from_utf8(record.get(0)?).ok()?;
    parse_value(field)
}

fn describe_record(record: &ByteRecord) -> String {
    record
        .iter()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(",")
}

/// Buckets values into ranges by four ascending thresholds
///
/// Range `i` holds values `v` with `thresholds[i - 1] <= v < thresholds[i]`;
/// the first range is unbounded below and the last unbounded above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePartitioner {
    thresholds: [BPlusKey; THRESHOLD_COUNT],
}

impl Default for RangePartitioner {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS,
        }
    }
}

impl RangePartitioner {
    pub fn new(thresholds: [BPlusKey; THRESHOLD_COUNT]) -> PartitionResult<Self> {
        if !thresholds.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(PartitionError::InvalidThresholds(format!(
                "{:?} is not strictly ascending",
                thresholds
            )));
        }

        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[BPlusKey; THRESHOLD_COUNT] {
        &self.thresholds
    }

    /// Range a value belongs to
    pub fn partition_of(&self, value: BPlusKey) -> Partition {
        Partition(self.thresholds.partition_point(|&t| t <= value))
    }

    /// Inclusive lower and exclusive upper bound of a range
    pub fn bounds(&self, partition: Partition) -> (Option<BPlusKey>, Option<BPlusKey>) {
        let lower = partition
            .index()
            .checked_sub(1)
            .map(|i| self.thresholds[i]);
        let upper = self.thresholds.get(partition.index()).copied();
        (lower, upper)
    }

    /// Partition records from a file, one integer per line
    pub fn partition_file(&self, path: &Path) -> PartitionResult<PartitionedBatch> {
        let file = File::open(path)?;
        self.partition_reader(file)
    }

    /// Partition records from any reader, one integer per line
    ///
    /// Lines that are not a single integer are skipped and counted. Quotes
    /// carry no meaning, so a stray `"` only costs its own line.
    pub fn partition_reader<R: Read>(&self, input: R) -> PartitionResult<PartitionedBatch> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .quoting(false)
            .from_reader(input);

        let mut batch = PartitionedBatch::default();
        let mut record = ByteRecord::new();

        while reader.read_byte_record(&mut record)? {
            match parse_record(&record) {
                Some(value) => batch.push(self.partition_of(value), value),
                None => {
                    let line = record.position().map(|p| p.line()).unwrap_or_default();
                    warn!(line, record = %describe_record(&record), "skipping malformed record");
                    batch.rejected += 1;
                }
            }
        }

        Ok(batch)
    }
}

/// Values bucketed by range, plus the count of rejected records
#[derive(Debug, Clone, Default)]
pub struct PartitionedBatch {
    buckets: [Vec<BPlusKey>; PARTITION_COUNT],
    rejected: usize,
}

impl PartitionedBatch {
    pub fn push(&mut self, partition: Partition, value: BPlusKey) {
        self.buckets[partition.index()].push(value);
    }

    pub fn bucket(&self, partition: Partition) -> &[BPlusKey] {
        &self.buckets[partition.index()]
    }

    /// Number of records delivered to some range
    pub fn accepted(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Number of malformed records skipped
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn into_buckets(self) -> impl Iterator<Item = (Partition, Vec<BPlusKey>)> {
        Partition::all().zip(self.buckets)
    }
}

/// A range's tree, built and owned by one worker
#[derive(Debug)]
pub struct PartitionTree {
    pub partition: Partition,
    pub tree: BPlusTree,
}

/// Shape summary of one range's tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    pub partition: Partition,
    pub lower: Option<BPlusKey>,
    pub upper: Option<BPlusKey>,
    pub keys: usize,
    pub height: usize,
    pub nodes: usize,
}

impl PartitionTree {
    pub fn report(&self, partitioner: &RangePartitioner) -> PartitionReport {
        let (lower, upper) = partitioner.bounds(self.partition);
        PartitionReport {
            partition: self.partition,
            lower,
            upper,
            keys: self.tree.len(),
            height: self.tree.height(),
            nodes: self.tree.node_count(),
        }
    }

    /// Write this tree's snapshot to `<dir>/<partition>.snapshot`
    pub fn write_snapshot(&self, dir: &Path) -> PartitionResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.snapshot", self.partition));
        fs::write(&path, self.tree.to_snapshot()?)?;
        Ok(path)
    }
}

/// Bulk-build one tree per non-empty range, each on its own thread
///
/// Trees come back in range order. Empty ranges get no tree.
pub fn build_range_trees(
    batch: PartitionedBatch,
    order: usize,
) -> PartitionResult<Vec<PartitionTree>> {
    // Reject a bad order before any worker starts
    BPlusTree::new(order)?;

    thread::scope(|scope| {
        let workers: Vec<_> = batch
            .into_buckets()
            .filter_map(|(partition, keys)| {
                if keys.is_empty() {
                    warn!(%partition, "no records for range, tree not built");
                    return None;
                }

                let handle = scope.spawn(move || -> PartitionResult<PartitionTree> {
                    let mut tree = BPlusTree::new(order)?;
                    tree.build_bottom_up(keys);
                    info!(
                        %partition,
                        keys = tree.len(),
                        height = tree.height(),
                        nodes = tree.node_count(),
                        "range tree built"
                    );
                    Ok(PartitionTree { partition, tree })
                });
                Some((partition, handle))
            })
            .collect();

        workers
            .into_iter()
            .map(|(partition, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(PartitionError::WorkerPanicked(partition)))
            })
            .collect()
    })
}
