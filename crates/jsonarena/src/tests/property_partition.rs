use alloc::{rc::Rc, string::ToString, vec::Vec};

use quickcheck::{QuickCheck, TestResult};

use super::{arbitrary::Doc, utils::parse_chunks};
use crate::{MonotonicResource, PoolResource, Storage, parse, split_at_offsets};

fn test_count() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;
    tests
}

/// Property: however the serialized document is cut up, parsing the pieces
/// yields the document back.
#[test]
fn partition_roundtrip_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(doc: Doc, splits: Vec<usize>) -> TestResult {
        let Ok(expected) = doc.to_value(&Storage::system()) else {
            return TestResult::error("system allocation failed");
        };
        let text = expected.to_string();
        let bytes = text.as_bytes();
        let offsets: Vec<usize> = splits.iter().map(|s| s % (bytes.len() + 1)).collect();
        let chunks = split_at_offsets(bytes, &offsets);

        let whole = match parse(bytes) {
            Ok(value) => value,
            Err(err) => return TestResult::error(alloc::format!("{text}: {err}")),
        };
        let pieces = match parse_chunks(&chunks, Storage::new(MonotonicResource::new())) {
            Ok(value) => value,
            Err(err) => return TestResult::error(alloc::format!("{text} in {chunks:?}: {err}")),
        };
        TestResult::from_bool(whole == expected && pieces == expected)
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(Doc, Vec<usize>) -> TestResult);
}

/// Property: a pool that has served a parse and taken the tree back serves
/// the next parse from its free lists.
#[test]
fn pool_reuse_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(doc: Doc) -> bool {
        let pool = Rc::new(PoolResource::new());
        let Ok(value) = doc.to_value(&Storage::system()) else {
            return false;
        };
        let text = value.to_string();
        for _ in 0..2 {
            let Ok(parsed) = crate::parse_with(&text, Storage::from(pool.clone())) else {
                return false;
            };
            if parsed != value {
                return false;
            }
        }
        let after_two = pool.upstream_allocations();
        let Ok(parsed) = crate::parse_with(&text, Storage::from(pool.clone())) else {
            return false;
        };
        parsed == value && pool.upstream_allocations() == after_two
    }

    QuickCheck::new()
        .tests(test_count() / 10)
        .quickcheck(prop as fn(Doc) -> bool);
}
