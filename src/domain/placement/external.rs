use std::collections::{BTreeMap, BTreeSet};

use crate::domain::coverage::quartets::{HypervisorPair, QuartetIndex};
use crate::domain::coverage::triplets::TripletIndex;
use crate::domain::graph::{Graph, Vertex};
use crate::error::{Error, Result};

/// What an external covering solver should optimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IlpObjective {
    MinHypervisorCount,
    MaxAcceptedRequests,
}

/// Input handed to a [`CoveringIlpSolver`].
#[derive(Debug, Clone)]
pub struct CoveringProblem {
    pub switches: Vec<Vertex>,
    pub candidates: Vec<Vertex>,
    pub controllers: Vec<Vertex>,
    pub allowed_pairs: BTreeMap<Vertex, Vec<HypervisorPair>>,

    /// Pairs per `(controller, switch)`.
    pub control_options: BTreeMap<(Vertex, Vertex), Vec<HypervisorPair>>,
    pub requests: Vec<Vec<Vertex>>,

    /// Upper bound on active hypervisors, if any.
    pub capacity: Option<usize>,
    pub objective: IlpObjective,
}

impl CoveringProblem {
    pub fn new(switches: &[Vertex], candidates: &[Vertex], controllers: &[Vertex], triplets: &TripletIndex, quartets: &QuartetIndex) -> Self {
        let mut control_options: BTreeMap<(Vertex, Vertex), Vec<HypervisorPair>> = BTreeMap::new();
        for q in quartets.iter() {
            control_options.entry((q.controller, q.switch)).or_default().push(q.pair);
        }

        CoveringProblem {
            switches: switches.to_vec(),
            candidates: candidates.to_vec(),
            controllers: controllers.to_vec(),
            allowed_pairs: triplets.allowed_pairs_by_switch(),
            control_options,
            requests: Vec::new(),
            capacity: None,
            objective: IlpObjective::MinHypervisorCount,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IlpSolution {
    pub active_hypervisors: BTreeSet<Vertex>,

    /// Pair chosen per switch; may be left empty.
    pub assignment: BTreeMap<Vertex, HypervisorPair>,
}

/// Boundary to an external mixed-integer solver for the covering model.
pub trait CoveringIlpSolver: Sync {
    fn solve(&self, problem: &CoveringProblem) -> Result<IlpSolution>;
}

/// Checks a solver result against the covering rules before it is trusted.
pub fn validate_solution(problem: &CoveringProblem, solution: &IlpSolution, graph: &Graph) -> Result<()> {
    let candidates: BTreeSet<Vertex> = problem.candidates.iter().copied().collect();
    if let Some(h) = solution.active_hypervisors.iter().find(|h| !candidates.contains(h)) {
        return Err(Error::ExternalSolver(format!("Hypervisor {} is not a candidate location", graph.label(*h))));
    }
    if let Some(cap) = problem.capacity
        && solution.active_hypervisors.len() > cap
    {
        return Err(Error::ExternalSolver(format!("{} hypervisors exceed the capacity of {}", solution.active_hypervisors.len(), cap)));
    }

    let active = &solution.active_hypervisors;
    let no_pairs = Vec::new();
    let uncovered: Vec<String> = problem
        .switches
        .iter()
        .filter(|s| !active.contains(s) && !problem.allowed_pairs.get(s).unwrap_or(&no_pairs).iter().any(|p| p.within(active)))
        .map(|&s| graph.label(s).to_string())
        .collect();
    if !uncovered.is_empty() {
        return Err(Error::NoFeasibleCover { uncovered });
    }

    for (&s, pair) in &solution.assignment {
        let allowed = problem.allowed_pairs.get(&s).is_some_and(|pairs| pairs.contains(pair));
        let self_pair = pair.is_single() && pair.first() == s && active.contains(&s);
        if !(self_pair || (allowed && pair.within(active))) {
            return Err(Error::ExternalSolver(format!("Switch {} assigned to invalid pair {}", graph.label(s), pair)));
        }
    }
    Ok(())
}

/// Per-node features, each column normalized by its maximum.
#[derive(Debug, Clone, Default)]
pub struct NodeFeatures {
    pub degree: Vec<f64>,
    pub allowed_pairs: Vec<f64>,
    pub controller_quartets: Vec<f64>,
    pub corpus_occurrences: Vec<f64>,
}

impl NodeFeatures {
    pub fn compute(graph: &Graph, triplets: &TripletIndex, quartets: &QuartetIndex, corpus: &[Vec<Vertex>]) -> Self {
        let n = graph.vertex_count();
        let mut occurrences = vec![0.0; n];
        for subgraph in corpus {
            for &v in subgraph {
                if v < n {
                    occurrences[v] += 1.0;
                }
            }
        }

        NodeFeatures {
            degree: normalized(graph.vertices().map(|v| graph.degree(v) as f64).collect()),
            allowed_pairs: normalized(graph.vertices().map(|v| triplets.for_switch(v).len() as f64).collect()),
            controller_quartets: normalized(graph.vertices().map(|v| quartets.for_controller(v).len() as f64).collect()),
            corpus_occurrences: normalized(occurrences),
        }
    }
}

fn normalized(column: Vec<f64>) -> Vec<f64> {
    let max = column.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return column;
    }
    column.into_iter().map(|x| x / max).collect()
}

/// Scores hypervisor candidate locations; higher is better.
pub trait NodeScorer: Sync {
    fn score(&self, graph: &Graph, features: &NodeFeatures) -> Result<Vec<f64>>;
}

pub struct DegreeScorer;

impl NodeScorer for DegreeScorer {
    fn score(&self, graph: &Graph, features: &NodeFeatures) -> Result<Vec<f64>> {
        if features.degree.len() != graph.vertex_count() {
            return Err(Error::InvalidArgument("Feature table does not match the graph".to_string()));
        }
        Ok(features.degree.clone())
    }
}

/// The `limit` best-scored candidates, ties by vertex index.
pub fn restrict_candidates(candidates: &[Vertex], scores: &[f64], limit: usize) -> Vec<Vertex> {
    let mut ranked: Vec<Vertex> = candidates.to_vec();
    ranked.sort_by(|&a, &b| {
        let (sa, sb) = (scores.get(a).copied().unwrap_or(0.0), scores.get(b).copied().unwrap_or(0.0));
        sb.total_cmp(&sa).then(a.cmp(&b))
    });
    ranked.truncate(limit);
    ranked.sort_unstable();
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coverage::triplets::Triplet;

    #[test]
    fn test_restrict_candidates_by_score() {
        let scores = [0.5, 1.0, 0.5, 0.1];
        assert_eq!(restrict_candidates(&[0, 1, 2, 3], &scores, 2), vec![0, 1]);
        assert_eq!(restrict_candidates(&[0, 1, 2, 3], &scores, 10), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_degree_features_are_normalized() {
        let g = Graph::from_unit_edges(vec![("0", "1"), ("0", "2"), ("0", "3")]).unwrap();
        let features = NodeFeatures::compute(&g, &TripletIndex::default(), &QuartetIndex::default(), &[vec![1, 2]]);
        assert_eq!(features.degree, vec![1.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert_eq!(features.corpus_occurrences, vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(DegreeScorer.score(&g, &features).unwrap()[0], 1.0);
    }

    #[test]
    fn test_validation_rejects_uncovering_solution() {
        let g = Graph::from_unit_edges(vec![("0", "1"), ("1", "2")]).unwrap();
        let triplets = TripletIndex::from_triplets(vec![Triplet { switch: 0, pair: HypervisorPair::new(1, 2) }]);
        let problem = CoveringProblem::new(&[0, 1, 2], &[0, 1, 2], &[0], &triplets, &QuartetIndex::default());

        let partial = IlpSolution { active_hypervisors: [1].into_iter().collect(), ..Default::default() };
        assert!(matches!(validate_solution(&problem, &partial, &g), Err(Error::NoFeasibleCover { .. })));

        let mut full = IlpSolution { active_hypervisors: [1, 2].into_iter().collect(), ..Default::default() };
        assert!(validate_solution(&problem, &full, &g).is_ok());

        full.assignment.insert(0, HypervisorPair::new(1, 2));
        full.assignment.insert(1, HypervisorPair::single(1));
        assert!(validate_solution(&problem, &full, &g).is_ok());

        full.assignment.insert(2, HypervisorPair::new(1, 2));
        assert!(matches!(validate_solution(&problem, &full, &g), Err(Error::ExternalSolver(_))), "(1, 2) is not allowed for switch 2");
    }
}
