use rand::Rng;
use rand::seq::IndexedRandom;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::domain::assignment::controller_assignment::find_possible_controllers;
use crate::domain::assignment::hypervisor_assignment::{AssignmentInput, assign_shortest_paths};
use crate::domain::coverage::quartets::{HypervisorPair, Quartet, QuartetIndex};
use crate::domain::coverage::triplets::{Triplet, TripletIndex};
use crate::domain::graph::{Graph, Vertex};
use crate::domain::placement::external::{CoveringIlpSolver, CoveringProblem, IlpObjective, validate_solution};
use crate::domain::placement::set_cover::{CombinedSwitchController, CoverProblem, CoverageObjective, GreedyCover, RequestWeighted, SwitchCoverage};
use crate::domain::request::VsdnRequest;
use crate::domain::routing::control_path::ControlPathObjective;
use crate::domain::routing::path_index::PathIndex;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementHeuristic {
    /// Fewest hypervisors covering every switch.
    #[default]
    HypervisorCount,
    /// Covered switches plus weighted controller reach.
    CombinedSwitchController,
    /// Cover built around the controller location that reaches the most switches.
    MainController,
    /// Incremental placement by controller votes per hypervisor pair.
    OverallCoverage,
    /// Covered switches plus weighted servable requests.
    RequestCoverage,
    ExternalIlp,
}

impl FromStr for PlacementHeuristic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(' ', "-").as_str() {
            "hypervisor-count" => Ok(PlacementHeuristic::HypervisorCount),
            "combined-s-cs" => Ok(PlacementHeuristic::CombinedSwitchController),
            "main-controller" => Ok(PlacementHeuristic::MainController),
            "overall-coverage" => Ok(PlacementHeuristic::OverallCoverage),
            "request-coverage" => Ok(PlacementHeuristic::RequestCoverage),
            "external-ilp" | "ilp" => Ok(PlacementHeuristic::ExternalIlp),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for PlacementHeuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlacementHeuristic::HypervisorCount => "hypervisor-count",
            PlacementHeuristic::CombinedSwitchController => "combined-s-cs",
            PlacementHeuristic::MainController => "main-controller",
            PlacementHeuristic::OverallCoverage => "overall-coverage",
            PlacementHeuristic::RequestCoverage => "request-coverage",
            PlacementHeuristic::ExternalIlp => "external-ilp",
        };
        f.write_str(name)
    }
}

/// Choice among several minimum-size greedy solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolutionSelection {
    #[default]
    Random,
    /// Highest share of held-out requests that can be served.
    AcceptanceRatio,
}

impl FromStr for SolutionSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(' ', "-").as_str() {
            "random" => Ok(SolutionSelection::Random),
            "acceptance-ratio" => Ok(SolutionSelection::AcceptanceRatio),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlacementConfig {
    pub heuristic: PlacementHeuristic,

    /// Number of randomized greedy runs.
    pub repeat: usize,
    pub start_with_pair: bool,
    pub selection: SolutionSelection,

    /// Share of the best vote a pair needs to count in overall-coverage voting.
    pub relative_threshold: f64,
    pub controller_weight: f64,
    pub request_weight: f64,

    /// Hypervisor limit passed to an external solver.
    pub capacity: Option<usize>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        PlacementConfig {
            heuristic: PlacementHeuristic::HypervisorCount,
            repeat: 1,
            start_with_pair: false,
            selection: SolutionSelection::Random,
            relative_threshold: 0.8,
            controller_weight: 1.0,
            request_weight: 1.0,
            capacity: None,
        }
    }
}

impl PlacementConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repeat == 0 {
            return Err(Error::InvalidArgument("repeat must be at least 1".to_string()));
        }
        if !(self.relative_threshold > 0.0 && self.relative_threshold <= 1.0) {
            return Err(Error::InvalidArgument(format!("relative_threshold {} is not within (0, 1]", self.relative_threshold)));
        }
        if self.controller_weight < 0.0 || self.request_weight < 0.0 {
            return Err(Error::InvalidArgument("objective weights must not be negative".to_string()));
        }
        Ok(())
    }
}

/// Read-only inputs of a placement run.
#[derive(Clone, Copy)]
pub struct PlacementContext<'a> {
    pub graph: &'a Graph,
    pub paths: &'a PathIndex,
    pub quartets: &'a QuartetIndex,
    pub triplets: &'a TripletIndex,
    pub switches: &'a [Vertex],
    pub controllers: &'a [Vertex],
    pub candidates: &'a [Vertex],
}

impl<'a> PlacementContext<'a> {
    fn cover_problem<'b>(&self, triplets: &'b TripletIndex, candidates: &'b [Vertex]) -> CoverProblem<'b>
    where
        'a: 'b,
    {
        CoverProblem { graph: self.graph, customers: self.switches, candidates, triplets }
    }
}

#[derive(Debug, Clone)]
pub struct PlacementOutcome {
    pub heuristic: PlacementHeuristic,
    pub active_hypervisors: BTreeSet<Vertex>,
    pub main_controller: Option<Vertex>,
    pub controllable_by_main: BTreeSet<Vertex>,

    /// Triplets the assignment has to use instead of the full relation.
    pub restricted_triplets: Option<TripletIndex>,

    /// Pairs fixed by an external solver.
    pub fixed_pairs: Option<BTreeMap<Vertex, HypervisorPair>>,
    pub acceptance_ratio: Option<f64>,
    pub elapsed: Duration,
}

impl PlacementOutcome {
    fn new(heuristic: PlacementHeuristic, active_hypervisors: BTreeSet<Vertex>) -> Self {
        PlacementOutcome {
            heuristic,
            active_hypervisors,
            main_controller: None,
            controllable_by_main: BTreeSet::new(),
            restricted_triplets: None,
            fixed_pairs: None,
            acceptance_ratio: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn triplets<'a>(&'a self, full: &'a TripletIndex) -> &'a TripletIndex {
        self.restricted_triplets.as_ref().unwrap_or(full)
    }
}

/// Runs one placement heuristic over a prepared context.
pub struct PlacementEngine<'a> {
    ctx: PlacementContext<'a>,
    config: &'a PlacementConfig,
    ilp: Option<&'a dyn CoveringIlpSolver>,
}

impl<'a> PlacementEngine<'a> {
    pub fn new(ctx: PlacementContext<'a>, config: &'a PlacementConfig) -> Self {
        PlacementEngine { ctx, config, ilp: None }
    }

    pub fn with_ilp_solver(mut self, solver: &'a dyn CoveringIlpSolver) -> Self {
        self.ilp = Some(solver);
        self
    }

    /// Places hypervisors. `held_out` requests are only read: they steer solution selection and
    /// the request-coverage objective.
    pub fn place<R: Rng + ?Sized>(&self, held_out: &[VsdnRequest], rng: &mut R) -> Result<PlacementOutcome> {
        self.config.validate()?;
        if self.ctx.candidates.is_empty() {
            return Err(Error::InvalidArgument("No hypervisor candidates to place".to_string()));
        }

        let started = Instant::now();
        let request_sets: Vec<Vec<Vertex>> = held_out.iter().map(|r| r.switches.clone()).collect();

        let mut outcome = match self.config.heuristic {
            PlacementHeuristic::HypervisorCount => self.multiple_greedy(&SwitchCoverage, &request_sets, rng)?,
            PlacementHeuristic::CombinedSwitchController => {
                let objective = CombinedSwitchController { weight: self.config.controller_weight, quartets: self.ctx.quartets, controllers: self.ctx.controllers };
                self.multiple_greedy(&objective, &request_sets, rng)?
            }
            PlacementHeuristic::RequestCoverage => {
                let objective =
                    RequestWeighted { weight: self.config.request_weight, quartets: self.ctx.quartets, controllers: self.ctx.controllers, requests: &request_sets };
                self.multiple_greedy(&objective, &request_sets, rng)?
            }
            PlacementHeuristic::MainController => self.main_controller(rng)?,
            PlacementHeuristic::OverallCoverage => self.overall_coverage()?,
            PlacementHeuristic::ExternalIlp => self.external(&request_sets)?,
        };
        outcome.heuristic = self.config.heuristic;
        outcome.elapsed = started.elapsed();

        log::info!(
            "Placement {}: {} active hypervisors {:?} in {:.2?}.",
            self.config.heuristic,
            outcome.active_hypervisors.len(),
            self.ctx.graph.canonical_labels(&outcome.active_hypervisors.iter().copied().collect::<Vec<_>>()),
            outcome.elapsed
        );
        Ok(outcome)
    }

    /// Repeats the randomized greedy cover and picks one of the smallest solutions.
    fn multiple_greedy<O: CoverageObjective, R: Rng + ?Sized>(&self, objective: &O, requests: &[Vec<Vertex>], rng: &mut R) -> Result<PlacementOutcome> {
        let problem = self.ctx.cover_problem(self.ctx.triplets, self.ctx.candidates);
        let greedy = GreedyCover::new(problem, objective, self.config.start_with_pair);

        let mut solutions: Vec<BTreeSet<Vertex>> = Vec::with_capacity(self.config.repeat);
        for _ in 0..self.config.repeat {
            solutions.push(greedy.solve(rng)?);
        }

        let smallest = solutions.iter().map(BTreeSet::len).min().unwrap_or(0);
        let mut minimal: Vec<BTreeSet<Vertex>> = Vec::new();
        for solution in solutions {
            if solution.len() == smallest && !minimal.contains(&solution) {
                minimal.push(solution);
            }
        }
        log::debug!("{} distinct minimal solutions of size {}.", minimal.len(), smallest);

        match self.config.selection {
            SolutionSelection::Random => {
                let chosen = minimal.choose(rng).cloned().unwrap_or_default();
                Ok(PlacementOutcome::new(self.config.heuristic, chosen))
            }
            SolutionSelection::AcceptanceRatio => {
                let ratios: Vec<f64> = minimal.par_iter().map(|active| acceptance_ratio(&self.ctx, active, requests)).collect();
                let mut best = 0;
                for (i, ratio) in ratios.iter().enumerate() {
                    if *ratio > ratios[best] {
                        best = i;
                    }
                }
                let mut outcome = PlacementOutcome::new(self.config.heuristic, minimal.swap_remove(best));
                outcome.acceptance_ratio = ratios.get(best).copied();
                Ok(outcome)
            }
        }
    }

    /// Picks the controller location that reaches the most switches, then covers the remaining
    /// switches with the triplets of all other controllers.
    fn main_controller<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PlacementOutcome> {
        let candidates: BTreeSet<Vertex> = self.ctx.candidates.iter().copied().collect();
        let placeable = |q: &&Quartet| q.pair.members().iter().all(|h| candidates.contains(h));

        let mut best: Option<(Vertex, BTreeSet<Vertex>, BTreeSet<Vertex>, Vec<Triplet>)> = None;
        'controllers: for &c in self.ctx.controllers {
            let own: Vec<&Quartet> = self.ctx.quartets.for_controller(c).iter().filter(placeable).collect();
            let controllable: BTreeSet<Vertex> = own.iter().map(|q| q.switch).collect();
            let mut usable: BTreeSet<Vertex> = own.iter().flat_map(|q| q.pair.members()).collect();
            let mut triplets: Vec<Triplet> = own.iter().map(|q| Triplet { switch: q.switch, pair: q.pair }).collect();

            for &s in self.ctx.switches.iter().filter(|s| !controllable.contains(s)) {
                let others: Vec<&Quartet> = self.ctx.quartets.for_switch(s).iter().filter(placeable).collect();
                if others.is_empty() {
                    continue 'controllers;
                }
                usable.extend(others.iter().flat_map(|q| q.pair.members()));
                triplets.extend(others.iter().map(|q| Triplet { switch: s, pair: q.pair }));
            }

            if best.as_ref().is_none_or(|(_, reach, _, _)| controllable.len() > reach.len()) {
                best = Some((c, controllable, usable, triplets));
            }
        }

        let Some((main, controllable, usable, triplets)) = best else {
            let uncovered = self.uncovered_labels(&candidates);
            return Err(Error::NoFeasibleCover { uncovered });
        };
        log::info!("Main controller {} reaches {} switches.", self.ctx.graph.label(main), controllable.len());

        let restricted = TripletIndex::from_triplets(triplets);
        let usable: Vec<Vertex> = usable.into_iter().collect();
        let problem = self.ctx.cover_problem(&restricted, &usable);
        let active = GreedyCover::new(problem, &SwitchCoverage, self.config.start_with_pair).solve(rng)?;

        let mut outcome = PlacementOutcome::new(self.config.heuristic, active);
        outcome.main_controller = Some(main);
        outcome.controllable_by_main = controllable;
        outcome.restricted_triplets = Some(restricted);
        Ok(outcome)
    }

    /// Grows the hypervisor set by the votes of controllers for hypervisor pairs.
    fn overall_coverage(&self) -> Result<PlacementOutcome> {
        let candidates: BTreeSet<Vertex> = self.ctx.candidates.iter().copied().collect();
        let controllers: BTreeSet<Vertex> = self.ctx.controllers.iter().copied().collect();

        // 1. Votes per switch: pair -> number of controllers admitting it, best first.
        let mut ranked: BTreeMap<Vertex, Vec<(HypervisorPair, usize)>> = BTreeMap::new();
        let mut totals: BTreeMap<HypervisorPair, usize> = BTreeMap::new();
        for &s in self.ctx.switches {
            let mut votes: BTreeMap<HypervisorPair, usize> = BTreeMap::new();
            for q in self.ctx.quartets.for_switch(s) {
                if controllers.contains(&q.controller) && q.pair.members().iter().all(|h| candidates.contains(h)) {
                    *votes.entry(q.pair).or_default() += 1;
                }
            }
            for (&pair, &count) in &votes {
                *totals.entry(pair).or_default() += count;
            }
            let mut list: Vec<(HypervisorPair, usize)> = votes.into_iter().collect();
            list.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            ranked.insert(s, list);
        }

        // 2. Seed with the most popular pair overall.
        let mut active: BTreeSet<Vertex> = BTreeSet::new();
        if let Some((pair, _)) = totals.iter().max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0))) {
            active.extend(pair.members());
        }

        // 3. Add the most voted hypervisor until every switch has a pair inside the set.
        let mut covered: BTreeSet<Vertex> = BTreeSet::new();
        loop {
            let mut next_votes: BTreeMap<Vertex, usize> = BTreeMap::new();
            for (&s, list) in &ranked {
                if covered.contains(&s) {
                    continue;
                }
                if active.contains(&s) {
                    covered.insert(s);
                    continue;
                }

                let mut wanted: BTreeMap<Vertex, usize> = BTreeMap::new();
                for &(pair, count) in list {
                    if pair.within(&active) {
                        covered.insert(s);
                        break;
                    }
                    let strongest = wanted.values().copied().max().unwrap_or(0);
                    if (count as f64) < self.config.relative_threshold * strongest as f64 {
                        break;
                    }
                    let (h, h2) = (pair.first(), pair.second());
                    match (active.contains(&h), active.contains(&h2)) {
                        (false, false) if pair.is_single() => {
                            wanted.entry(h).or_insert(count);
                        }
                        (false, false) => continue,
                        (true, false) => {
                            wanted.entry(h2).or_insert(count);
                        }
                        (false, true) => {
                            wanted.entry(h).or_insert(count);
                        }
                        (true, true) => {}
                    }
                }
                for (h, count) in wanted {
                    *next_votes.entry(h).or_default() += count;
                }
            }

            if covered.len() == ranked.len() {
                break;
            }
            match next_votes.iter().max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0))) {
                Some((&h, _)) => {
                    log::debug!("Overall coverage adds hypervisor {} ({} switches covered).", self.ctx.graph.label(h), covered.len());
                    active.insert(h);
                }
                None => break,
            }
        }

        // 4. Hosts keep their own hypervisor, every other switch takes its most voted pair inside
        // the set. Hypervisors no switch ends up using are dropped.
        let mut pairs: BTreeMap<Vertex, HypervisorPair> = BTreeMap::new();
        let mut uncovered: Vec<String> = Vec::new();
        for (&s, list) in &ranked {
            if active.contains(&s) {
                pairs.insert(s, HypervisorPair::single(s));
            } else if let Some(&(pair, _)) = list.iter().find(|(pair, _)| pair.within(&active)) {
                pairs.insert(s, pair);
            } else {
                uncovered.push(self.ctx.graph.label(s).to_string());
            }
        }
        if !uncovered.is_empty() {
            log::warn!("Overall coverage stalled with {} uncovered switches.", uncovered.len());
            return Err(Error::NoFeasibleCover { uncovered });
        }

        let used: BTreeSet<Vertex> = pairs.values().flat_map(|pair| pair.members()).collect();
        if used.len() < active.len() {
            log::debug!("Overall coverage drops {} unused hypervisors.", active.len() - used.len());
        }
        let mut outcome = PlacementOutcome::new(self.config.heuristic, used);
        outcome.fixed_pairs = Some(pairs);
        Ok(outcome)
    }

    fn external(&self, requests: &[Vec<Vertex>]) -> Result<PlacementOutcome> {
        let solver = self.ilp.ok_or_else(|| Error::InvalidArgument("The external-ilp heuristic needs a covering solver".to_string()))?;

        let mut problem = CoveringProblem::new(self.ctx.switches, self.ctx.candidates, self.ctx.controllers, self.ctx.triplets, self.ctx.quartets);
        problem.requests = requests.to_vec();
        problem.capacity = self.config.capacity;
        if !requests.is_empty() {
            problem.objective = IlpObjective::MaxAcceptedRequests;
        }

        let solution = solver.solve(&problem).map_err(|e| match e {
            Error::ExternalSolver(_) => e,
            other => Error::ExternalSolver(other.to_string()),
        })?;
        validate_solution(&problem, &solution, self.ctx.graph)?;

        let mut outcome = PlacementOutcome::new(self.config.heuristic, solution.active_hypervisors);
        if !solution.assignment.is_empty() {
            outcome.fixed_pairs = Some(solution.assignment);
        }
        Ok(outcome)
    }

    fn uncovered_labels(&self, active: &BTreeSet<Vertex>) -> Vec<String> {
        self.ctx.switches.iter().filter(|&&s| !self.ctx.triplets.is_covered(s, active)).map(|&s| self.ctx.graph.label(s).to_string()).collect()
    }
}

/// Share of `requests` for which at least one controller reaches all switches after assigning
/// `active` with the shortest-paths strategy. Infeasible assignments score 0.
pub fn acceptance_ratio(ctx: &PlacementContext, active: &BTreeSet<Vertex>, requests: &[Vec<Vertex>]) -> f64 {
    if requests.is_empty() {
        return 0.0;
    }
    let input = AssignmentInput {
        graph: ctx.graph,
        paths: ctx.paths,
        triplets: ctx.triplets,
        switches: ctx.switches,
        active,
        main_controller: None,
        main_controllable: &BTreeSet::new(),
        objective: ControlPathObjective::MinAvg,
    };
    let Ok(assignment) = assign_shortest_paths(&input) else {
        return 0.0;
    };

    let accepted = requests.iter().filter(|r| !find_possible_controllers(r, &assignment, ctx.quartets, ctx.controllers).is_empty()).count();
    accepted as f64 / requests.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_names() {
        assert_eq!("hypervisor count".parse::<PlacementHeuristic>().unwrap(), PlacementHeuristic::HypervisorCount);
        assert_eq!("combined-S-CS".parse::<PlacementHeuristic>().unwrap(), PlacementHeuristic::CombinedSwitchController);
        assert_eq!(PlacementHeuristic::OverallCoverage.to_string(), "overall-coverage");
        assert!("lp".parse::<PlacementHeuristic>().is_err());
        assert_eq!("acceptance ratio".parse::<SolutionSelection>().unwrap(), SolutionSelection::AcceptanceRatio);
    }

    #[test]
    fn test_config_validation() {
        assert!(PlacementConfig::default().validate().is_ok());
        assert!(PlacementConfig { repeat: 0, ..Default::default() }.validate().is_err());
        assert!(PlacementConfig { relative_threshold: 1.5, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_overall_coverage_drops_unused_seed_member() {
        let graph = Graph::from_unit_edges((0..8).map(|i| (i.to_string(), (i + 1).to_string()))).unwrap();
        let paths = PathIndex::build(&graph, 20.0, 2).unwrap();
        let quartet = |c: Vertex, h: Vertex, h2: Vertex, s: Vertex| Quartet { controller: c, pair: HypervisorPair::new(h, h2), switch: s };

        // (0, 1) is the most popular pair and seeds the set, but switch 4 pulls in hypervisor 3,
        // which then hosts switch 3 itself.
        let quartets = QuartetIndex::from_quartets(vec![quartet(6, 0, 1, 3), quartet(7, 0, 1, 3), quartet(8, 0, 1, 3), quartet(6, 0, 3, 4)]);
        let triplets = TripletIndex::from_quartets(&quartets);
        let ctx = PlacementContext {
            graph: &graph,
            paths: &paths,
            quartets: &quartets,
            triplets: &triplets,
            switches: &[3, 4],
            controllers: &[6, 7, 8],
            candidates: &[0, 1, 2, 3],
        };
        let config = PlacementConfig { heuristic: PlacementHeuristic::OverallCoverage, ..Default::default() };
        let outcome = PlacementEngine::new(ctx, &config).place(&[], &mut rand::rng()).unwrap();

        assert_eq!(outcome.active_hypervisors, [0, 3].into_iter().collect::<BTreeSet<Vertex>>(), "Hypervisor 1 serves no switch");
        let pairs = outcome.fixed_pairs.expect("Voted pairs are handed to the assignment");
        assert_eq!(pairs.get(&3), Some(&HypervisorPair::single(3)));
        assert_eq!(pairs.get(&4), Some(&HypervisorPair::new(0, 3)));
    }
}
