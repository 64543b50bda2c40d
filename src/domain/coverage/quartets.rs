use itertools::Itertools;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Instant;

use crate::domain::graph::Vertex;
use crate::domain::routing::control_path::control_path_exists;
use crate::domain::routing::path_index::PathIndex;

/// Unordered pair of hypervisors, stored with the smaller vertex first. `(s, s)` is the
/// self pair of a switch that hosts a hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HypervisorPair(Vertex, Vertex);

impl HypervisorPair {
    pub fn new(a: Vertex, b: Vertex) -> Self {
        HypervisorPair(a.min(b), a.max(b))
    }

    pub fn single(v: Vertex) -> Self {
        HypervisorPair(v, v)
    }

    pub fn first(&self) -> Vertex {
        self.0
    }

    pub fn second(&self) -> Vertex {
        self.1
    }

    pub fn is_single(&self) -> bool {
        self.0 == self.1
    }

    pub fn contains(&self, v: Vertex) -> bool {
        self.0 == v || self.1 == v
    }

    /// Both hypervisors are members of `set`.
    pub fn within(&self, set: &BTreeSet<Vertex>) -> bool {
        set.contains(&self.0) && set.contains(&self.1)
    }

    pub fn members(&self) -> [Vertex; 2] {
        [self.0, self.1]
    }
}

impl fmt::Display for HypervisorPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Controller `controller` can reach `switch` resiliently through the two hypervisors of `pair`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quartet {
    pub controller: Vertex,
    pub pair: HypervisorPair,
    pub switch: Vertex,
}

/// The canonical quartet set together with its lookup views.
///
/// All views are derived once in [`QuartetIndex::from_quartets`] and never modified on their own.
#[derive(Debug, Clone, Default)]
pub struct QuartetIndex {
    quartets: Vec<Quartet>,
    by_controller: HashMap<Vertex, Vec<Quartet>>,
    by_switch: HashMap<Vertex, Vec<Quartet>>,
    by_cs: HashMap<(Vertex, Vertex), BTreeSet<HypervisorPair>>,
    by_pair: HashMap<HypervisorPair, Vec<(Vertex, Vertex)>>,
}

impl QuartetIndex {
    /// Finds every valid quartet for the given controller, switch and hypervisor candidates.
    ///
    /// For each `(c, s)`:
    /// * `(c, c, c, c)` when `c = s` and `c` may host a hypervisor,
    /// * `(c, s, s, s)` when `s` hosts a hypervisor and a path `c -> s` fits the bound,
    /// * `(c, c, h, s)` for a hypervisor-capable controller and a triangle control path,
    /// * `(c, h, h', s)` for all other hypervisor pairs with a diamond control path.
    pub fn construct(index: &PathIndex, controllers: &[Vertex], switches: &[Vertex], hypervisors: &[Vertex]) -> Self {
        let started = Instant::now();
        let hypervisor_set: BTreeSet<Vertex> = hypervisors.iter().copied().collect();

        let per_controller: Vec<Vec<Quartet>> =
            controllers.par_iter().map(|&c| quartets_for_controller(index, c, switches, &hypervisor_set)).collect();

        let quartets = QuartetIndex::from_quartets(per_controller.into_iter().flatten());

        log::info!(
            "Constructed {} quartets for {} controllers, {} switches and {} hypervisor candidates in {:.2?}.",
            quartets.len(),
            controllers.len(),
            switches.len(),
            hypervisors.len(),
            started.elapsed()
        );
        quartets
    }

    /// Builds the index views over `quartets`; duplicates are dropped.
    pub fn from_quartets<I: IntoIterator<Item = Quartet>>(quartets: I) -> Self {
        let unique: BTreeSet<Quartet> = quartets.into_iter().collect();
        let mut index = QuartetIndex::default();

        for q in unique {
            index.by_controller.entry(q.controller).or_default().push(q);
            index.by_switch.entry(q.switch).or_default().push(q);
            index.by_cs.entry((q.controller, q.switch)).or_default().insert(q.pair);
            index.by_pair.entry(q.pair).or_default().push((q.controller, q.switch));
            index.quartets.push(q);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.quartets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quartets.is_empty()
    }

    /// All quartets in `(controller, pair, switch)` order.
    pub fn iter(&self) -> impl Iterator<Item = &Quartet> {
        self.quartets.iter()
    }

    pub fn for_controller(&self, c: Vertex) -> &[Quartet] {
        self.by_controller.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn for_switch(&self, s: Vertex) -> &[Quartet] {
        self.by_switch.get(&s).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hypervisor pairs through which `c` controls `s`.
    pub fn pairs_for(&self, c: Vertex, s: Vertex) -> Option<&BTreeSet<HypervisorPair>> {
        self.by_cs.get(&(c, s))
    }

    /// `(controller, switch)` combinations served by `pair`.
    pub fn options_for_pair(&self, pair: HypervisorPair) -> &[(Vertex, Vertex)] {
        self.by_pair.get(&pair).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Membership test; the hypervisor order does not matter.
    pub fn contains(&self, c: Vertex, h: Vertex, h2: Vertex, s: Vertex) -> bool {
        self.by_cs.get(&(c, s)).is_some_and(|pairs| pairs.contains(&HypervisorPair::new(h, h2)))
    }

    /// Controllers that reach `switch` through `pair`.
    pub fn admitted_controllers(&self, pair: HypervisorPair, switch: Vertex) -> BTreeSet<Vertex> {
        self.options_for_pair(pair).iter().filter(|(_, s)| *s == switch).map(|(c, _)| *c).collect()
    }

    /// For every controller, the switches it reaches with both hypervisors inside `active`.
    pub fn controllable_switches(&self, active: &BTreeSet<Vertex>, controllers: &[Vertex]) -> BTreeMap<Vertex, BTreeSet<Vertex>> {
        controllers
            .iter()
            .map(|&c| {
                let switches = self.for_controller(c).iter().filter(|q| q.pair.within(active)).map(|q| q.switch).collect();
                (c, switches)
            })
            .collect()
    }
}

fn quartets_for_controller(index: &PathIndex, c: Vertex, switches: &[Vertex], hypervisors: &BTreeSet<Vertex>) -> Vec<Quartet> {
    let mut found = Vec::new();
    let c_is_hypervisor = hypervisors.contains(&c);

    for &s in switches {
        if c == s && c_is_hypervisor {
            found.push(Quartet { controller: c, pair: HypervisorPair::single(c), switch: s });
        }

        if c != s && hypervisors.contains(&s) && index.best(c, s).is_some() {
            found.push(Quartet { controller: c, pair: HypervisorPair::single(s), switch: s });
        }

        let others: Vec<Vertex> = hypervisors.iter().copied().filter(|&h| h != c && h != s).collect();

        if c != s && c_is_hypervisor {
            for &h in &others {
                if control_path_exists(index, c, c, h, s) {
                    found.push(Quartet { controller: c, pair: HypervisorPair::new(c, h), switch: s });
                }
            }
        }

        for (h, h2) in others.iter().copied().tuple_combinations() {
            if control_path_exists(index, c, h, h2, s) {
                found.push(Quartet { controller: c, pair: HypervisorPair::new(h, h2), switch: s });
            }
        }
    }

    log::debug!("Controller {}: {} quartets.", c, found.len());
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::Graph;

    #[test]
    fn test_pair_is_unordered() {
        assert_eq!(HypervisorPair::new(4, 1), HypervisorPair::new(1, 4));
        assert!(HypervisorPair::single(3).is_single());
        let active: BTreeSet<Vertex> = [1, 4].into_iter().collect();
        assert!(HypervisorPair::new(4, 1).within(&active));
        assert!(!HypervisorPair::new(4, 2).within(&active));
    }

    #[test]
    fn test_line_graph_has_no_resilient_pairs() {
        // A path 0 - 1 - 2 has no link-disjoint routes at all.
        let g = Graph::from_unit_edges(vec![("0", "1"), ("1", "2")]).unwrap();
        let index = PathIndex::build(&g, 10.0, 4).unwrap();
        let all: Vec<Vertex> = g.vertices().collect();
        let quartets = QuartetIndex::construct(&index, &all, &all, &all);

        for q in quartets.iter() {
            assert!(q.pair.is_single(), "Unexpected two-hypervisor quartet {:?}", q);
        }
        assert!(quartets.contains(0, 0, 0, 0));
        assert!(quartets.contains(0, 2, 2, 2), "Radial quartet needs only a single path");
        assert_eq!(quartets.admitted_controllers(HypervisorPair::single(2), 2), [0, 1, 2].into_iter().collect());
    }
}
