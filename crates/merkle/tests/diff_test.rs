//! Diff locality: the work done and the ranges reported depend on what
//! changed, not on how much data the trees hold.

use std::collections::BTreeSet;

use corelib::hash::{Blake3Hasher, Digest, StrongHasher};
use merkle::{diff, par_diff, KeyRange, MerkleTree, TreeShape};
use proptest::prelude::*;

fn replica(shape: TreeShape, n: usize) -> MerkleTree {
    MerkleTree::build(
        shape,
        (0..n).map(|i| {
            (
                format!("user:{}", i).into_bytes(),
                Blake3Hasher.digest(format!("profile-{}", i).as_bytes()),
            )
        }),
    )
}

#[test]
fn test_diff_cost_tracks_changes_not_size() {
    let shape = TreeShape::new(16, 3).unwrap();
    let small = replica(shape, 1_000);
    let large = replica(shape, 20_000);

    let mut small_changed = small.clone();
    small_changed.insert(b"user:5".to_vec(), Digest([1; 32]));
    let mut large_changed = large.clone();
    large_changed.insert(b"user:5".to_vec(), Digest([1; 32]));

    let small_diff = diff(&small, &small_changed).unwrap();
    let large_diff = diff(&large, &large_changed).unwrap();

    assert_eq!(small_diff.ranges.len(), 1);
    assert_eq!(large_diff.ranges.len(), 1);
    assert_eq!(small_diff.comparisons, large_diff.comparisons);
}

#[test]
fn test_empty_against_full_reports_every_populated_leaf() {
    let shape = TreeShape::new(4, 2).unwrap();
    let empty = MerkleTree::empty(shape);
    let full = replica(shape, 500);
    let d = diff(&empty, &full).unwrap();
    // 500 keys over 16 leaves: every leaf is populated.
    assert_eq!(d.ranges.len(), 16);
    let leaves: Vec<KeyRange> = KeyRange::full()
        .split(4)
        .iter()
        .flat_map(|r| r.split(4))
        .collect();
    assert_eq!(d.ranges, leaves);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_diff_reports_exactly_the_touched_leaves(
        changed in proptest::collection::btree_set(0usize..2_000, 1..20),
    ) {
        let shape = TreeShape::new(8, 3).unwrap();
        let base = replica(shape, 2_000);
        let mut edited = base.clone();
        for i in &changed {
            edited.insert(format!("user:{}", i).into_bytes(), Digest([0xee; 32]));
        }

        let expected: BTreeSet<KeyRange> = changed
            .iter()
            .map(|i| base.leaf_range(format!("user:{}", i).as_bytes()))
            .collect();
        let d = diff(&base, &edited).unwrap();
        prop_assert_eq!(d.ranges.iter().copied().collect::<BTreeSet<_>>(), expected.clone());
        prop_assert_eq!(d.ranges.len(), expected.len());
        prop_assert!(d.comparisons <= 1 + expected.len() * 8 * 3);
        prop_assert_eq!(par_diff(&base, &edited).unwrap(), d);
    }
}
