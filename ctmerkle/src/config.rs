//! Configuration module for ctmerkle.
//!
//! This module provides the options that control how a tree is built:
//! - Leaf store capacity
//! - Build parallelism
//!
//! The hash function is not a per-build option. It is selected once per
//! process with [`install`](crate::utils::hasher::install), and every store
//! created from a `Config` hashes with it.
//!
//! # Performance Tuning
//!
//! ## Parallelism
//! - `worker_count`: Upper bound on build threads per level (default: available
//!   parallelism). Always clamped to the available parallelism.
//! - `min_leaves_per_worker`: Levels too small to give every worker this many
//!   nodes use fewer workers, down to a single-threaded reduction.
//!
//! ## Memory Management
//! - `initial_capacity`: Pre-allocation bound of the leaf store. Adding past it
//!   fails with `CapacityExceeded` until the store is grown.
//!
//! # Usage Examples
//! ```
//! use ctmerkle::config::Config;
//!
//! let mut config = Config::from_capacity(100_000);
//! config.set_worker_count(8);
//! ```

use std::num::NonZeroUsize;
use std::thread;

use crate::def::{DEFAULT_LEAF_CAPACITY, MIN_LEAVES_PER_WORKER};

/// Configuration for building a Merkle tree.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of leaves the store accepts before it must be grown
    pub initial_capacity: usize,
    /// Requested number of build threads; 0 is treated as 1
    pub worker_count: usize,
    /// Minimum nodes each worker must receive before a level fans out
    pub min_leaves_per_worker: usize,
}

impl Default for Config {
    /// Creates a new Config instance with default values.
    ///
    /// # Default Values
    /// - `initial_capacity`: 1,048,576 leaves
    /// - `worker_count`: available parallelism
    /// - `min_leaves_per_worker`: 4096
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_LEAF_CAPACITY,
            worker_count: available_workers(),
            min_leaves_per_worker: MIN_LEAVES_PER_WORKER,
        }
    }
}

/// Number of threads the machine can run in parallel, at least 1.
pub fn available_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl Config {
    /// Creates a new Config instance with custom values.
    ///
    /// # Arguments
    /// * `initial_capacity` - Leaf store capacity
    /// * `worker_count` - Requested build threads
    /// * `min_leaves_per_worker` - Fan-out threshold per worker
    pub fn new(
        initial_capacity: usize,
        worker_count: usize,
        min_leaves_per_worker: usize,
    ) -> Self {
        Self {
            initial_capacity,
            worker_count,
            min_leaves_per_worker,
        }
    }

    /// Creates a Config with default values except for the capacity.
    pub fn from_capacity(initial_capacity: usize) -> Self {
        Config {
            initial_capacity,
            ..Config::default()
        }
    }

    /// Creates a Config that builds with exactly `worker_count` threads on
    /// every level that has enough pairs, ignoring the small-level threshold.
    pub fn with_workers(worker_count: usize) -> Self {
        Config {
            worker_count,
            min_leaves_per_worker: 1,
            ..Config::default()
        }
    }

    /// Creates a Config that never spawns build threads.
    pub fn single_threaded() -> Self {
        Config {
            worker_count: 1,
            ..Config::default()
        }
    }

    pub fn set_worker_count(&mut self, worker_count: usize) {
        self.worker_count = worker_count;
    }

    /// Number of workers to use for a level of `level_len` nodes.
    ///
    /// The result is at least 1, never more than the available parallelism
    /// or the number of pairs at this level, and small enough that every
    /// worker receives `min_leaves_per_worker` nodes.
    pub fn effective_workers(&self, level_len: usize) -> usize {
        let pairs = level_len / 2;
        let by_size = level_len / self.min_leaves_per_worker.max(1);
        self.requested_workers()
            .min(pairs)
            .min(by_size)
            .max(1)
    }

    /// `worker_count` clamped to `1..=available_workers()`.
    pub fn requested_workers(&self) -> usize {
        self.worker_count.clamp(1, available_workers())
    }
}
