use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vsdn_placement::domain::utils::union_find::LabeledUnionFind;

/// Relabels every member of the old block; quadratic but obviously right.
struct NaivePartition {
    block: Vec<usize>,
}

impl NaivePartition {
    fn new(n: usize) -> Self {
        NaivePartition { block: (0..n).collect() }
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (from, to) = (self.block[a], self.block[b]);
        if from == to {
            return false;
        }
        for x in self.block.iter_mut() {
            if *x == from {
                *x = to;
            }
        }
        true
    }

    /// Blocks sorted internally and ordered by their smallest member.
    fn blocks(&self) -> Vec<Vec<usize>> {
        let mut by_block: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (x, &b) in self.block.iter().enumerate() {
            by_block.entry(b).or_default().push(x);
        }
        let mut blocks: Vec<Vec<usize>> = by_block.into_values().collect();
        blocks.sort();
        blocks
    }
}

#[test]
fn test_matches_naive_partition() {
    let n = 40;
    let mut rng = StdRng::seed_from_u64(2024);
    let mut uf = LabeledUnionFind::new(0..n);
    let mut naive = NaivePartition::new(n);

    for step in 0..200 {
        let (a, b) = (rng.random_range(0..n), rng.random_range(0..n));
        assert_eq!(uf.union(&a, &b), Some(naive.union(a, b)), "Step {}: union({}, {}) disagrees", step, a, b);

        if step % 20 == 0 {
            assert_eq!(uf.components(), naive.blocks(), "Step {}: partitions differ", step);
        }
    }

    let blocks = uf.components();
    assert_eq!(blocks, naive.blocks());
    assert_eq!(blocks.iter().map(Vec::len).sum::<usize>(), n, "Every label lands in exactly one block");
}

#[test]
fn test_string_labels_and_unknowns() {
    let mut uf = LabeledUnionFind::new(vec!["b".to_string(), "a".to_string(), "c".to_string(), "a".to_string()]);

    assert_eq!(uf.union(&"a".to_string(), &"c".to_string()), Some(true));
    assert_eq!(uf.union(&"c".to_string(), &"a".to_string()), Some(false));
    assert_eq!(uf.union(&"a".to_string(), &"z".to_string()), None);
    assert!(uf.find(&"z".to_string()).is_none());

    let root = uf.find(&"c".to_string()).cloned();
    assert_eq!(root, uf.find(&"a".to_string()).cloned(), "Merged labels share a representative");
    assert_eq!(uf.components(), vec![vec!["a".to_string(), "c".to_string()], vec!["b".to_string()]], "Blocks are ordered by their smallest label");
}
