//! Bottom-up tree construction with per-level parallel hashing.
//!
//! Each level is reduced by pairing nodes `2i` and `2i + 1` into parent `i`.
//! A trailing odd node is moved up unchanged. The current level is split into
//! contiguous ranges of an even number of nodes, one per worker, and every
//! worker writes its parents into its own slice of the pre-allocated next
//! level. Workers of one level are joined before the next level starts.
//!
//! Pairing is strictly positional. For any leaf count this produces the
//! RFC6962 tree, whose left subtree always covers the largest power of two
//! smaller than the leaf count.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::leafstore::LeafStore;
use super::node::TreeNode;
use super::tree::MerkleTree;
use crate::config::{available_workers, Config};
use crate::error::{MerkleError, Result};
use crate::utils::hasher::Hasher;

/// Timings and shape of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Leaves the tree was built from
    pub leaf_count: usize,
    /// Number of level reductions performed (equals the root height)
    pub levels: usize,
    /// Largest number of workers used on a single level
    pub max_workers: usize,
    /// Levels that were reduced by more than one worker
    pub parallel_levels: usize,
    /// Wall time from the first leaf node to the root
    pub elapsed: Duration,
}

type Level = Vec<Option<TreeNode>>;

pub(crate) fn build(store: LeafStore, config: &Config) -> Result<MerkleTree> {
    if store.is_empty() {
        return Err(MerkleError::EmptyTree);
    }
    if config.worker_count > available_workers() {
        warn!(
            "requested {} build workers, only {} available",
            config.worker_count,
            available_workers()
        );
    }

    let start = Instant::now();
    let hasher = store.hasher();
    let mut stats = BuildStats {
        leaf_count: store.len(),
        max_workers: 1,
        ..BuildStats::default()
    };

    let mut level: Level = Vec::new();
    level.try_reserve_exact(store.len())?;
    level.extend(store.leaf_hashes().iter().map(|h| Some(TreeNode::leaf(*h))));

    while level.len() > 1 {
        let workers = config.effective_workers(level.len());
        debug!(
            "level {}: {} nodes, {} workers",
            stats.levels,
            level.len(),
            workers
        );
        level = reduce_level(hasher, &mut level, workers)?;
        stats.levels += 1;
        stats.max_workers = stats.max_workers.max(workers);
        if workers > 1 {
            stats.parallel_levels += 1;
        }
    }

    let root = level
        .pop()
        .flatten()
        .ok_or_else(|| MerkleError::Inconsistent("build produced no root".to_string()))?;
    stats.elapsed = start.elapsed();
    info!(
        "built tree of {} leaves: height {}, up to {} workers, {:?}, root {}",
        stats.leaf_count,
        root.height(),
        stats.max_workers,
        stats.elapsed,
        hex::encode(root.hash())
    );
    Ok(MerkleTree::from_parts(store, root, stats))
}

/// Reduces one level into a freshly allocated parent level.
fn reduce_level(
    hasher: &dyn Hasher,
    current: &mut [Option<TreeNode>],
    workers: usize,
) -> Result<Level> {
    let next_len = current.len().div_ceil(2);
    let mut next: Level = Vec::new();
    next.try_reserve_exact(next_len)?;
    next.resize_with(next_len, || None);

    if workers <= 1 {
        reduce_range(hasher, current, &mut next)?;
    } else {
        // an even input range per worker keeps every pair inside one range
        let pairs_per_worker = next_len.div_ceil(workers);
        thread::scope(|s| {
            let handles: Vec<_> = current
                .chunks_mut(2 * pairs_per_worker)
                .zip(next.chunks_mut(pairs_per_worker))
                .map(|(input, output)| s.spawn(move || reduce_range(hasher, input, output)))
                .collect();
            join_workers(handles.into_iter().map(|h| h.join()))
        })?;
    }

    if next.iter().any(Option::is_none) {
        return Err(MerkleError::Inconsistent(
            "level reduction left an empty slot".to_string(),
        ));
    }
    Ok(next)
}

/// Folds the joined results of one level's workers. Every worker has been
/// joined by the time this returns; a panic takes precedence over an error
/// a worker returned.
fn join_workers<I>(results: I) -> Result<()>
where
    I: IntoIterator<Item = thread::Result<Result<()>>>,
{
    let mut panicked = 0;
    let mut first_err = None;
    for r in results {
        match r {
            Err(_) => panicked += 1,
            Ok(Err(e)) => {
                first_err.get_or_insert(e);
            }
            Ok(Ok(())) => {}
        }
    }
    if panicked > 0 {
        return Err(MerkleError::WorkerPanicked);
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Pairs `input[2i]` with `input[2i + 1]` into `output[i]`, moving a trailing
/// odd node up as is.
fn reduce_range(
    hasher: &dyn Hasher,
    input: &mut [Option<TreeNode>],
    output: &mut [Option<TreeNode>],
) -> Result<()> {
    for (pair, slot) in input.chunks_mut(2).zip(output.iter_mut()) {
        *slot = match pair {
            [left, right] => match (left.take(), right.take()) {
                (Some(l), Some(r)) => Some(TreeNode::parent(hasher, l, r)?),
                (l, r) => l.or(r),
            },
            [odd] => odd.take(),
            _ => None,
        };
    }
    Ok(())
}
