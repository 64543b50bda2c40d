use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use union_find::{QuickUnionUf, UnionByRank, UnionFind};

/// Disjoint-set forest over an arbitrary, finite label set.
///
/// Labels are mapped to dense indices once at construction; the forest itself is the
/// `union-find` crate's quick-union structure with union-by-rank. A fresh instance is
/// cheap to build, so callers that need the components of a changing vertex set simply
/// construct a new one per query.
pub struct LabeledUnionFind<L> {
    index_of: HashMap<L, usize>,
    labels: Vec<L>,
    dsu: QuickUnionUf<UnionByRank>,
}

impl<L: Clone + Eq + Hash + Ord> LabeledUnionFind<L> {
    /// Creates singleton sets for every distinct label. Duplicates are ignored.
    pub fn new<I: IntoIterator<Item = L>>(labels: I) -> Self {
        let mut index_of = HashMap::new();
        let mut dense = Vec::new();

        for label in labels {
            if !index_of.contains_key(&label) {
                index_of.insert(label.clone(), dense.len());
                dense.push(label);
            }
        }

        let dsu = QuickUnionUf::<UnionByRank>::new(dense.len());
        LabeledUnionFind { index_of, labels: dense, dsu }
    }

    /// Representative of the set containing `label`, or `None` for an unknown label.
    pub fn find(&mut self, label: &L) -> Option<&L> {
        let index = *self.index_of.get(label)?;
        let root = self.dsu.find(index);
        self.labels.get(root)
    }

    /// Merges the sets of `a` and `b`. Returns `Some(true)` if two distinct sets were merged,
    /// `Some(false)` if they already were one set and `None` if either label is unknown.
    pub fn union(&mut self, a: &L, b: &L) -> Option<bool> {
        let ia = *self.index_of.get(a)?;
        let ib = *self.index_of.get(b)?;
        Some(self.dsu.union(ia, ib))
    }

    /// The current partition. Blocks are sorted internally and ordered by their smallest label.
    pub fn components(&mut self) -> Vec<Vec<L>> {
        let mut blocks: HashMap<usize, Vec<L>> = HashMap::new();
        for index in 0..self.labels.len() {
            let root = self.dsu.find(index);
            blocks.entry(root).or_default().push(self.labels[index].clone());
        }

        let mut ordered: BTreeMap<L, Vec<L>> = BTreeMap::new();
        for (_, mut block) in blocks {
            block.sort();
            ordered.insert(block[0].clone(), block);
        }
        ordered.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_until_union() {
        let mut uf = LabeledUnionFind::new(vec!["a", "b", "c"]);
        assert_eq!(uf.components().len(), 3);

        assert_eq!(uf.union(&"a", &"c"), Some(true));
        assert_eq!(uf.union(&"c", &"a"), Some(false));
        assert_eq!(uf.components(), vec![vec!["a", "c"], vec!["b"]]);
    }

    #[test]
    fn test_unknown_labels() {
        let mut uf = LabeledUnionFind::new(vec![3usize, 7, 7]);
        assert_eq!(uf.union(&3, &42), None);
        assert_eq!(uf.components(), vec![vec![3], vec![7]], "Duplicate labels must be collapsed");
        assert!(uf.find(&42).is_none());
        assert_eq!(uf.find(&7), Some(&7));
    }
}
