use itertools::Itertools;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::BTreeSet;

use crate::domain::coverage::quartets::QuartetIndex;
use crate::domain::coverage::triplets::TripletIndex;
use crate::domain::graph::{Graph, Vertex};
use crate::error::{Error, Result};

/// Gains below this are treated as no gain at all.
const GAIN_EPSILON: f64 = 1e-9;

/// The covering instance: which switches must be covered, which vertices may host a hypervisor
/// and which hypervisor pairs cover which switch.
#[derive(Clone, Copy)]
pub struct CoverProblem<'a> {
    pub graph: &'a Graph,
    pub customers: &'a [Vertex],
    pub candidates: &'a [Vertex],
    pub triplets: &'a TripletIndex,
}

impl CoverProblem<'_> {
    pub fn covered(&self, active: &BTreeSet<Vertex>) -> BTreeSet<Vertex> {
        self.triplets.covered_customers(active, self.customers)
    }

    pub fn uncovered_labels(&self, active: &BTreeSet<Vertex>) -> Vec<String> {
        let covered = self.covered(active);
        self.customers.iter().filter(|s| !covered.contains(s)).map(|&s| self.graph.label(s).to_string()).collect()
    }
}

/// Value of a hypervisor set. Scores must not decrease when hypervisors are added.
pub trait CoverageObjective: Sync {
    fn name(&self) -> &'static str;

    fn score(&self, problem: &CoverProblem, active: &BTreeSet<Vertex>) -> f64;

    /// The greedy loop stops successfully once this holds.
    fn is_complete(&self, problem: &CoverProblem, covered: &BTreeSet<Vertex>) -> bool {
        covered.len() == problem.customers.len()
    }
}

/// Number of covered switches.
pub struct SwitchCoverage;

impl CoverageObjective for SwitchCoverage {
    fn name(&self) -> &'static str {
        "switch-coverage"
    }

    fn score(&self, problem: &CoverProblem, active: &BTreeSet<Vertex>) -> f64 {
        problem.covered(active).len() as f64
    }
}

/// Covered switches plus `weight` times the average number of switches a controller can reach.
pub struct CombinedSwitchController<'a> {
    pub weight: f64,
    pub quartets: &'a QuartetIndex,
    pub controllers: &'a [Vertex],
}

impl CoverageObjective for CombinedSwitchController<'_> {
    fn name(&self) -> &'static str {
        "combined-s-cs"
    }

    fn score(&self, problem: &CoverProblem, active: &BTreeSet<Vertex>) -> f64 {
        let switches = problem.covered(active).len() as f64;
        if self.controllers.is_empty() {
            return switches;
        }
        let pairs: usize = self.quartets.controllable_switches(active, self.controllers).values().map(BTreeSet::len).sum();
        switches + self.weight * pairs as f64 / self.controllers.len() as f64
    }
}

/// Covered switches plus `weight` times the number of requests that some single controller can
/// serve completely.
pub struct RequestWeighted<'a> {
    pub weight: f64,
    pub quartets: &'a QuartetIndex,
    pub controllers: &'a [Vertex],
    pub requests: &'a [Vec<Vertex>],
}

impl RequestWeighted<'_> {
    pub fn servable_requests(&self, active: &BTreeSet<Vertex>) -> usize {
        let reachable = self.quartets.controllable_switches(active, self.controllers);
        self.requests.iter().filter(|request| reachable.values().any(|switches| request.iter().all(|s| switches.contains(s)))).count()
    }
}

impl CoverageObjective for RequestWeighted<'_> {
    fn name(&self) -> &'static str {
        "request-coverage"
    }

    fn score(&self, problem: &CoverProblem, active: &BTreeSet<Vertex>) -> f64 {
        problem.covered(active).len() as f64 + self.weight * self.servable_requests(active) as f64
    }
}

/// Greedy set cover with minimization: add the candidate with the largest gain, then drop every
/// member whose removal does not lower the score, until all switches are covered.
pub struct GreedyCover<'a, O: CoverageObjective + ?Sized> {
    problem: CoverProblem<'a>,
    objective: &'a O,
    start_with_pair: bool,
}

impl<'a, O: CoverageObjective + ?Sized> GreedyCover<'a, O> {
    pub fn new(problem: CoverProblem<'a>, objective: &'a O, start_with_pair: bool) -> Self {
        GreedyCover { problem, objective, start_with_pair }
    }

    pub fn problem(&self) -> &CoverProblem<'a> {
        &self.problem
    }

    /// Candidate with the largest strictly positive gain; ties are broken uniformly at random.
    pub fn best_single_addition<R: Rng + ?Sized>(&self, active: &BTreeSet<Vertex>, rng: &mut R) -> Option<Vertex> {
        let base = self.objective.score(&self.problem, active);
        let gains = self.problem.candidates.iter().filter(|f| !active.contains(f)).map(|&f| {
            let mut extended = active.clone();
            extended.insert(f);
            (f, self.objective.score(&self.problem, &extended) - base)
        });
        pick_best(gains, rng)
    }

    /// Pair of candidates with the largest strictly positive joint gain.
    pub fn best_pair_addition<R: Rng + ?Sized>(&self, active: &BTreeSet<Vertex>, rng: &mut R) -> Option<(Vertex, Vertex)> {
        let base = self.objective.score(&self.problem, active);
        let gains = self.problem.candidates.iter().copied().filter(|f| !active.contains(f)).tuple_combinations().map(|(f, g)| {
            let mut extended = active.clone();
            extended.insert(f);
            extended.insert(g);
            ((f, g), self.objective.score(&self.problem, &extended) - base)
        });
        pick_best(gains, rng)
    }

    /// Drops members whose removal keeps the score. One pass suffices because scores are monotone.
    pub fn minimize_cover(&self, active: &BTreeSet<Vertex>) -> BTreeSet<Vertex> {
        let mut kept = active.clone();
        for &f in active {
            let current = self.objective.score(&self.problem, &kept);
            kept.remove(&f);
            if self.objective.score(&self.problem, &kept) < current - GAIN_EPSILON {
                kept.insert(f);
            }
        }
        kept
    }

    pub fn solve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<BTreeSet<Vertex>> {
        if self.problem.candidates.is_empty() {
            return Err(Error::InvalidArgument("No hypervisor candidates to place".to_string()));
        }

        let mut active: BTreeSet<Vertex> = BTreeSet::new();
        if self.start_with_pair && let Some((f, g)) = self.best_pair_addition(&active, rng) {
            active.insert(f);
            active.insert(g);
        }

        let mut iteration = 0;
        loop {
            let covered = self.problem.covered(&active);
            if self.objective.is_complete(&self.problem, &covered) {
                break;
            }
            iteration += 1;
            log::debug!("Greedy iteration {}: {} hypervisors cover {}/{} switches.", iteration, active.len(), covered.len(), self.problem.customers.len());

            // Some switches can only be covered by two new hypervisors at once.
            if let Some(f) = self.best_single_addition(&active, rng) {
                active.insert(f);
            } else if let Some((f, g)) = self.best_pair_addition(&active, rng) {
                active.insert(f);
                active.insert(g);
            } else {
                let uncovered = self.problem.uncovered_labels(&active);
                log::warn!("No hypervisor improves the cover any further, uncovered: {:?}", uncovered);
                return Err(Error::NoFeasibleCover { uncovered });
            }
            active = self.minimize_cover(&active);
        }

        log::debug!("{} cover with {} hypervisors after {} iterations.", self.objective.name(), active.len(), iteration);
        Ok(active)
    }
}

fn pick_best<T: Copy, R: Rng + ?Sized>(gains: impl Iterator<Item = (T, f64)>, rng: &mut R) -> Option<T> {
    let mut best_gain = GAIN_EPSILON;
    let mut best: Vec<T> = Vec::new();
    for (item, gain) in gains {
        if gain > best_gain + GAIN_EPSILON {
            best_gain = gain;
            best.clear();
            best.push(item);
        } else if (gain - best_gain).abs() <= GAIN_EPSILON && gain > GAIN_EPSILON {
            best.push(item);
        }
    }
    best.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coverage::quartets::HypervisorPair;
    use crate::domain::coverage::triplets::Triplet;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn triplet(s: Vertex, h: Vertex, h2: Vertex) -> Triplet {
        Triplet { switch: s, pair: HypervisorPair::new(h, h2) }
    }

    fn line(n: usize) -> Graph {
        let labels: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        Graph::from_unit_edges(labels.windows(2).map(|w| (w[0].clone(), w[1].clone())).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_pair_only_switch_needs_pair_fallback() {
        // Switch 0 is only coverable through (1, 2); neither 1 nor 2 adds any gain alone.
        let g = line(3);
        let triplets = TripletIndex::from_triplets(vec![triplet(0, 1, 2)]);
        let customers = [0];
        let candidates = [1, 2];
        let problem = CoverProblem { graph: &g, customers: &customers, candidates: &candidates, triplets: &triplets };

        let mut rng = StdRng::seed_from_u64(3);
        let greedy = GreedyCover::new(problem, &SwitchCoverage, false);
        assert_eq!(greedy.best_single_addition(&BTreeSet::new(), &mut rng), None);
        assert_eq!(greedy.solve(&mut rng).unwrap(), [1, 2].into_iter().collect());
    }

    #[test]
    fn test_minimize_drops_redundant_members() {
        let g = line(4);
        let triplets = TripletIndex::from_triplets(vec![triplet(0, 1, 2), triplet(3, 1, 2)]);
        let customers = [0, 1, 2, 3];
        let candidates = [0, 1, 2, 3];
        let problem = CoverProblem { graph: &g, customers: &customers, candidates: &candidates, triplets: &triplets };
        let greedy = GreedyCover::new(problem, &SwitchCoverage, false);

        let all: BTreeSet<Vertex> = [0, 1, 2, 3].into_iter().collect();
        assert_eq!(greedy.minimize_cover(&all), [1, 2].into_iter().collect());
    }

    #[test]
    fn test_infeasible_cover_lists_switches() {
        let g = line(3);
        let triplets = TripletIndex::default();
        let customers = [0, 1, 2];
        let candidates = [1];
        let problem = CoverProblem { graph: &g, customers: &customers, candidates: &candidates, triplets: &triplets };
        let mut rng = StdRng::seed_from_u64(0);

        match GreedyCover::new(problem, &SwitchCoverage, true).solve(&mut rng) {
            Err(Error::NoFeasibleCover { uncovered }) => assert_eq!(uncovered, vec!["0", "2"]),
            other => panic!("Expected NoFeasibleCover, got {:?}", other),
        }
    }
}
