//! Property-based tests for batch partitioning.
//!
//! For any suite count and shard count, the shards must tile the suite list:
//! concatenating shards 1..=total rebuilds it exactly, and only the last shard
//! may exceed the chunk size.

use proptest::prelude::*;
use suite_runner::suites::{BatchSpec, partition};

fn shards(n: usize, total: usize) -> Vec<Vec<usize>> {
    (1..=total)
        .map(|index| partition((0..n).collect(), Some(BatchSpec { index, total })))
        .collect()
}

proptest! {
    #[test]
    fn shards_rebuild_the_list(n in 0usize..200, total in 1usize..40) {
        let rebuilt: Vec<usize> = shards(n, total).into_iter().flatten().collect();
        prop_assert_eq!(rebuilt, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn only_last_shard_may_exceed_chunk(n in 0usize..200, total in 1usize..40) {
        let chunk = n.div_ceil(total);
        let all = shards(n, total);
        for shard in &all[..total - 1] {
            prop_assert!(shard.len() <= chunk);
        }
    }

    #[test]
    fn batch_strings_parse(total in 1usize..100, index_seed in 0usize..100) {
        let index = index_seed % total + 1;
        let parsed = BatchSpec::parse(&format!("{}-{}", index, total)).unwrap();
        prop_assert_eq!(parsed, BatchSpec { index, total });
    }
}

#[test]
fn seven_suites_in_three_shards() {
    assert_eq!(shards(7, 3), vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
}
