//! Divergence localization between two replicas' trees.
//!
//! Comparison walks both trees top-down with an explicit stack. Equal
//! digests prune the whole subtree with a single comparison, so the cost is
//! proportional to the number of differing leaves times the depth, not to the
//! size of the tree.

use std::num::NonZeroUsize;
use std::thread;

use corelib::hash::StrongHasher;
use tracing::debug;

use crate::error::{MerkleError, Result};
use crate::range::KeyRange;
use crate::tree::{MerkleNode, MerkleTree};

/// Outcome of a tree comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Leaf ranges whose digests differ, in key-space order.
    pub ranges: Vec<KeyRange>,
    /// Node pairs whose digests were compared.
    pub comparisons: usize,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn absorb(&mut self, other: TreeDiff) {
        self.ranges.extend(other.ranges);
        self.comparisons += other.comparisons;
    }
}

fn check_shapes<H: StrongHasher>(a: &MerkleTree<H>, b: &MerkleTree<H>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(MerkleError::StructuralMismatch(format!(
            "{:?} vs {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(())
}

/// Compare the subtrees rooted at each pair with an explicit stack.
fn diff_pairs<'a>(pairs: Vec<(&'a MerkleNode, &'a MerkleNode)>) -> Result<TreeDiff> {
    let mut out = TreeDiff::default();
    let mut stack = pairs;

    while let Some((a, b)) = stack.pop() {
        if a.range() != b.range() {
            return Err(MerkleError::StructuralMismatch(format!(
                "node ranges {} and {} do not align",
                a.range(),
                b.range()
            )));
        }
        out.comparisons += 1;
        if a.digest() == b.digest() {
            continue;
        }
        match (a.is_leaf(), b.is_leaf()) {
            (true, true) => out.ranges.push(a.range()),
            (false, false) if a.children().len() == b.children().len() => {
                stack.extend(a.children().iter().zip(b.children()).rev());
            }
            _ => {
                return Err(MerkleError::StructuralMismatch(format!(
                    "nodes at {} have different layouts",
                    a.range()
                )))
            }
        }
    }

    out.ranges.sort();
    Ok(out)
}

/// Leaf ranges where `a` and `b` differ.
///
/// Fails with [`MerkleError::StructuralMismatch`] if the trees were built
/// with different shapes.
pub fn diff<H: StrongHasher>(a: &MerkleTree<H>, b: &MerkleTree<H>) -> Result<TreeDiff> {
    check_shapes(a, b)?;
    let out = diff_pairs(vec![(a.root(), b.root())])?;
    debug!(
        ranges = out.ranges.len(),
        comparisons = out.comparisons,
        "merkle diff"
    );
    Ok(out)
}

/// Same result as [`diff`], with the root's child pairs spread over scoped
/// worker threads. Subtree comparisons are read-only and independent.
pub fn par_diff<H: StrongHasher>(a: &MerkleTree<H>, b: &MerkleTree<H>) -> Result<TreeDiff> {
    check_shapes(a, b)?;
    let (ra, rb) = (a.root(), b.root());
    if ra.range() != rb.range() {
        return Err(MerkleError::StructuralMismatch("root ranges differ".into()));
    }

    let mut out = TreeDiff {
        ranges: Vec::new(),
        comparisons: 1,
    };
    if ra.digest() == rb.digest() {
        return Ok(out);
    }
    if ra.is_leaf() || rb.is_leaf() || ra.children().len() != rb.children().len() {
        out.absorb(diff_pairs(vec![(ra, rb)])?);
        out.comparisons -= 1;
        return Ok(out);
    }

    let pairs: Vec<(&MerkleNode, &MerkleNode)> = ra.children().iter().zip(rb.children()).collect();
    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(pairs.len());
    let chunk_size = pairs.len().div_ceil(workers);

    let results: Vec<Result<TreeDiff>> = crossbeam::scope(|scope| {
        let handles: Vec<_> = pairs
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                scope.spawn(move |_| diff_pairs(chunk))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(MerkleError::WorkerPanicked)))
            .collect()
    })
    .map_err(|_| MerkleError::WorkerPanicked)?;

    for result in results {
        out.absorb(result?);
    }
    out.ranges.sort();
    debug!(
        ranges = out.ranges.len(),
        comparisons = out.comparisons,
        workers,
        "parallel merkle diff"
    );
    Ok(out)
}

impl<H: StrongHasher> MerkleTree<H> {
    /// Ranges where `self` and `other` differ.
    pub fn diff(&self, other: &Self) -> Result<Vec<KeyRange>> {
        diff(self, other).map(|d| d.ranges)
    }
}
