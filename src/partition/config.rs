//! Job configuration for the range-partitioned build

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::{PartitionError, PartitionResult};
use super::{DEFAULT_THRESHOLDS, RangePartitioner, THRESHOLD_COUNT};
use crate::btree::{BPlusKey, DEFAULT_ORDER, MIN_ORDER};

/// Settings for one partition-and-build run
///
/// Missing fields fall back to their defaults, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Order of every per-range tree
    pub order: usize,
    /// Ascending upper bounds (exclusive) of the first four ranges
    pub thresholds: [BPlusKey; THRESHOLD_COUNT],
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            thresholds: DEFAULT_THRESHOLDS,
        }
    }
}

impl JobConfig {
    pub fn load(path: &Path) -> PartitionResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: JobConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> PartitionResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> PartitionResult<()> {
        if self.order < MIN_ORDER {
            return Err(PartitionError::InvalidConfig(format!(
                "order {} is below {}",
                self.order, MIN_ORDER
            )));
        }
        RangePartitioner::new(self.thresholds)?;
        Ok(())
    }

    /// Partitioner for the configured thresholds
    pub fn partitioner(&self) -> PartitionResult<RangePartitioner> {
        RangePartitioner::new(self.thresholds)
    }
}
