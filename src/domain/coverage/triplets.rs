use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::coverage::quartets::{HypervisorPair, QuartetIndex};
use crate::domain::graph::Vertex;

/// Switch `switch` can be covered by the hypervisors of `pair`, for some controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triplet {
    pub switch: Vertex,
    pub pair: HypervisorPair,
}

/// Triplet relation indexed by switch and by hypervisor.
#[derive(Debug, Clone, Default)]
pub struct TripletIndex {
    triplets: Vec<Triplet>,
    by_switch: HashMap<Vertex, Vec<Triplet>>,
    by_hypervisor: HashMap<Vertex, Vec<Triplet>>,
}

impl TripletIndex {
    /// Projects the controller out of every quartet.
    pub fn from_quartets(quartets: &QuartetIndex) -> Self {
        TripletIndex::from_triplets(quartets.iter().map(|q| Triplet { switch: q.switch, pair: q.pair }))
    }

    pub fn from_triplets<I: IntoIterator<Item = Triplet>>(triplets: I) -> Self {
        let unique: BTreeSet<Triplet> = triplets.into_iter().collect();
        let mut index = TripletIndex::default();

        for t in unique {
            index.by_switch.entry(t.switch).or_default().push(t);
            index.by_hypervisor.entry(t.pair.first()).or_default().push(t);
            if !t.pair.is_single() {
                index.by_hypervisor.entry(t.pair.second()).or_default().push(t);
            }
            index.triplets.push(t);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triplet> {
        self.triplets.iter()
    }

    pub fn for_switch(&self, s: Vertex) -> &[Triplet] {
        self.by_switch.get(&s).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn for_hypervisor(&self, h: Vertex) -> &[Triplet] {
        self.by_hypervisor.get(&h).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every hypervisor pair allowed per switch.
    pub fn allowed_pairs_by_switch(&self) -> BTreeMap<Vertex, Vec<HypervisorPair>> {
        self.by_switch.iter().map(|(&s, ts)| (s, ts.iter().map(|t| t.pair).collect())).collect()
    }

    /// Pairs of `s` whose hypervisors are both in `active`.
    pub fn pairs_within(&self, s: Vertex, active: &BTreeSet<Vertex>) -> Vec<HypervisorPair> {
        self.for_switch(s).iter().filter(|t| t.pair.within(active)).map(|t| t.pair).collect()
    }

    /// A switch is covered when it hosts a hypervisor itself or when one of its pairs lies
    /// completely inside `active`.
    pub fn is_covered(&self, s: Vertex, active: &BTreeSet<Vertex>) -> bool {
        active.contains(&s) || self.for_switch(s).iter().any(|t| t.pair.within(active))
    }

    pub fn covered_customers(&self, active: &BTreeSet<Vertex>, customers: &[Vertex]) -> BTreeSet<Vertex> {
        customers.iter().copied().filter(|&s| self.is_covered(s, active)).collect()
    }
}
