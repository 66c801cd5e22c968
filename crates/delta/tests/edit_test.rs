//! Replaying a delta reproduces the target for arbitrary edits.

use delta::{apply_delta, compute_delta, DeltaBlock, Signature};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize, Vec<u8>),
    Delete(usize, usize),
    Overwrite(usize, Vec<u8>),
}

fn apply_edit(data: &mut Vec<u8>, edit: &Edit) {
    match edit {
        Edit::Insert(at, bytes) => {
            let at = at % (data.len() + 1);
            data.splice(at..at, bytes.iter().copied());
        }
        Edit::Delete(at, len) => {
            if data.is_empty() {
                return;
            }
            let at = at % data.len();
            let end = (at + len).min(data.len());
            data.drain(at..end);
        }
        Edit::Overwrite(at, bytes) => {
            if data.is_empty() {
                return;
            }
            let at = at % data.len();
            for (i, byte) in bytes.iter().enumerate() {
                if let Some(slot) = data.get_mut(at + i) {
                    *slot = *byte;
                }
            }
        }
    }
}

fn edit() -> impl Strategy<Value = Edit> {
    let bytes = || prop::collection::vec(any::<u8>(), 1..64);
    prop_oneof![
        (any::<usize>(), bytes()).prop_map(|(a, b)| Edit::Insert(a, b)),
        (any::<usize>(), 1usize..64).prop_map(|(a, l)| Edit::Delete(a, l)),
        (any::<usize>(), bytes()).prop_map(|(a, b)| Edit::Overwrite(a, b)),
    ]
}

proptest! {
    #[test]
    fn replay_reproduces_target(
        base in prop::collection::vec(any::<u8>(), 0..2_048),
        edits in prop::collection::vec(edit(), 0..6),
        block_size in 1usize..200,
    ) {
        let mut target = base.clone();
        for edit in &edits {
            apply_edit(&mut target, edit);
        }
        let signature = Signature::generate(&base, block_size).unwrap();
        let delta = compute_delta(&signature, &target);
        prop_assert_eq!(apply_delta(&base, &delta).unwrap(), target.clone());
        prop_assert_eq!(delta.target_len, target.len() as u64);
    }

    #[test]
    fn adjacent_blocks_are_coalesced(
        base in prop::collection::vec(any::<u8>(), 0..2_048),
        block_size in 1usize..200,
    ) {
        let delta = compute_delta(&Signature::generate(&base, block_size).unwrap(), &base);
        for pair in delta.blocks.windows(2) {
            match (&pair[0], &pair[1]) {
                (DeltaBlock::Literal(_), DeltaBlock::Literal(_)) => {
                    prop_assert!(false, "split literal")
                }
                (DeltaBlock::Copy { offset, len }, DeltaBlock::Copy { offset: next, .. }) => {
                    prop_assert_ne!(offset + len, *next)
                }
                _ => {}
            }
        }
    }
}

#[test]
fn unchanged_content_sends_no_literals() {
    let base: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8 ^ (i >> 8) as u8).collect();
    let delta = compute_delta(&Signature::generate(&base, 512).unwrap(), &base);
    assert_eq!(delta.literal_bytes(), 0);
    assert!(delta.is_identity(base.len() as u64));
}
