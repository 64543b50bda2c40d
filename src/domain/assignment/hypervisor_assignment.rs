use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::domain::coverage::quartets::{HypervisorPair, QuartetIndex};
use crate::domain::coverage::triplets::TripletIndex;
use crate::domain::graph::{Graph, Vertex};
use crate::domain::routing::control_path::{ControlPathObjective, ControlPathShape, FullControlPath, full_control_path, is_better_full_control_path};
use crate::domain::routing::path::{WeightedPath, best_disjoint_pair, is_better_path_pair};
use crate::domain::routing::path_index::PathIndex;
use crate::error::{Error, Result};

/// How every switch picks its hypervisor pair among the active ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchAssignmentStrategy {
    /// Shortest disjoint path pair; switches of the main controller use full control paths.
    #[default]
    ShortestPaths,
    /// The active pair offering the most `(controller, switch)` options.
    MaxControlOptions,
}

impl FromStr for SwitchAssignmentStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "shortest-paths" | "shortest paths" => Ok(SwitchAssignmentStrategy::ShortestPaths),
            "max-control-options" | "max control options" => Ok(SwitchAssignmentStrategy::MaxControlOptions),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SwitchAssignmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchAssignmentStrategy::ShortestPaths => write!(f, "shortest-paths"),
            SwitchAssignmentStrategy::MaxControlOptions => write!(f, "max-control-options"),
        }
    }
}

/// The hypervisor pair serving one switch, primary hypervisor first, with its two disjoint paths.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchAssignment {
    pub primary: Vertex,
    pub backup: Vertex,
    pub primary_path: WeightedPath,
    pub backup_path: WeightedPath,
}

impl SwitchAssignment {
    fn new(h: Vertex, p: &WeightedPath, h2: Vertex, q: &WeightedPath) -> Self {
        if q.length() < p.length() {
            SwitchAssignment { primary: h2, backup: h, primary_path: q.clone(), backup_path: p.clone() }
        } else {
            SwitchAssignment { primary: h, backup: h2, primary_path: p.clone(), backup_path: q.clone() }
        }
    }

    fn hosted(s: Vertex) -> Self {
        SwitchAssignment { primary: s, backup: s, primary_path: WeightedPath::trivial(s), backup_path: WeightedPath::trivial(s) }
    }

    pub fn pair(&self) -> HypervisorPair {
        HypervisorPair::new(self.primary, self.backup)
    }
}

/// Switch -> hypervisor pair mapping of the current placement.
#[derive(Debug, Clone, Default)]
pub struct HypervisorAssignment {
    switches: BTreeMap<Vertex, SwitchAssignment>,
}

impl HypervisorAssignment {
    pub fn get(&self, s: Vertex) -> Option<&SwitchAssignment> {
        self.switches.get(&s)
    }

    pub fn pair(&self, s: Vertex) -> Option<HypervisorPair> {
        self.switches.get(&s).map(SwitchAssignment::pair)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vertex, &SwitchAssignment)> {
        self.switches.iter()
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Primary and backup path lengths of all switches that do not host a hypervisor.
    pub fn latencies(&self) -> (Vec<f64>, Vec<f64>) {
        self.switches.iter().filter(|(s, a)| !(a.primary == **s && a.backup == **s)).map(|(_, a)| (a.primary_path.length(), a.backup_path.length())).unzip()
    }
}

/// Everything the shortest-paths assignment looks at.
pub struct AssignmentInput<'a> {
    pub graph: &'a Graph,
    pub paths: &'a PathIndex,
    pub triplets: &'a TripletIndex,
    pub switches: &'a [Vertex],
    pub active: &'a BTreeSet<Vertex>,
    pub main_controller: Option<Vertex>,

    /// Switches routed through full control paths of `main_controller`.
    pub main_controllable: &'a BTreeSet<Vertex>,
    pub objective: ControlPathObjective,
}

pub fn assign_shortest_paths(input: &AssignmentInput) -> Result<HypervisorAssignment> {
    let mut assignment = HypervisorAssignment::default();

    for &s in input.switches {
        if input.active.contains(&s) {
            assignment.switches.insert(s, SwitchAssignment::hosted(s));
            continue;
        }

        let pairs = input.triplets.pairs_within(s, input.active);
        if pairs.is_empty() {
            log::warn!("Switch {} has no allowed pair among the active hypervisors.", input.graph.label(s));
            return Err(Error::NoFeasibleAssignment(format!("switch {} is not covered by {:?}", input.graph.label(s), input.active)));
        }

        let via_main = match input.main_controller {
            Some(mc) if input.main_controllable.contains(&s) => best_by_control_path(input.paths, mc, s, &pairs, input.objective),
            _ => None,
        };
        let chosen = via_main.or_else(|| best_by_disjoint_paths(input.paths, s, &pairs)).ok_or_else(|| {
            Error::NoFeasibleAssignment(format!("no disjoint path pair from any allowed hypervisor pair to switch {}", input.graph.label(s)))
        })?;
        assignment.switches.insert(s, chosen);
    }

    log::info!("Assigned {} switches to {} active hypervisors.", assignment.len(), input.active.len());
    Ok(assignment)
}

fn best_by_disjoint_paths(paths: &PathIndex, s: Vertex, pairs: &[HypervisorPair]) -> Option<SwitchAssignment> {
    let mut best: Option<(Vertex, &WeightedPath, Vertex, &WeightedPath)> = None;
    for pair in pairs {
        let (h, h2) = (pair.first(), pair.second());
        let Some((p, q)) = best_disjoint_pair(paths.get_paths(h, s), paths.get_paths(h2, s)) else {
            continue;
        };
        match best {
            Some((_, bp, _, bq)) if !is_better_path_pair(bp, bq, p, q) => {}
            _ => best = Some((h, p, h2, q)),
        }
    }
    best.map(|(h, p, h2, q)| SwitchAssignment::new(h, p, h2, q))
}

fn best_by_control_path(paths: &PathIndex, mc: Vertex, s: Vertex, pairs: &[HypervisorPair], objective: ControlPathObjective) -> Option<SwitchAssignment> {
    let mut best: Option<(FullControlPath, Vertex, Vertex)> = None;
    for pair in pairs {
        let (h, h2) = (pair.first(), pair.second());
        let Some(cp) = full_control_path(paths, mc, h, h2, s) else {
            continue;
        };
        if best.as_ref().is_some_and(|(current, _, _)| !is_better_full_control_path(&cp, current, objective)) {
            continue;
        }
        // The `p` legs belong to the controller itself in the triangle case.
        let (ph, qh) = match ControlPathShape::of(mc, h, h2, s) {
            ControlPathShape::Triangle => (mc, if mc == h { h2 } else { h }),
            _ => (h, h2),
        };
        best = Some((cp, ph, qh));
    }

    let (cp, ph, qh) = best?;
    match (&cp.ps, &cp.qs) {
        (Some(p), Some(q)) => Some(SwitchAssignment::new(ph, p, qh, q)),
        _ => None,
    }
}

/// Assigns every switch the active pair with the most control options, ties by pair order.
pub fn assign_max_control_options(graph: &Graph, paths: &PathIndex, quartets: &QuartetIndex, triplets: &TripletIndex, switches: &[Vertex], active: &BTreeSet<Vertex>) -> Result<HypervisorAssignment> {
    let mut assignment = HypervisorAssignment::default();

    for &s in switches {
        if active.contains(&s) {
            assignment.switches.insert(s, SwitchAssignment::hosted(s));
            continue;
        }

        let mut pairs = triplets.pairs_within(s, active);
        pairs.sort();
        let mut chosen: Option<(usize, HypervisorPair)> = None;
        for pair in pairs {
            let options = quartets.options_for_pair(pair).iter().filter(|(_, t)| *t == s).count();
            if chosen.is_none_or(|(best, _)| options > best) {
                chosen = Some((options, pair));
            }
        }

        let Some((_, pair)) = chosen else {
            return Err(Error::NoFeasibleAssignment(format!("switch {} is not covered", graph.label(s))));
        };
        let single = best_by_disjoint_paths(paths, s, &[pair])
            .ok_or_else(|| Error::NoFeasibleAssignment(format!("pair {} has no disjoint paths to switch {}", pair, graph.label(s))))?;
        assignment.switches.insert(s, single);
    }
    Ok(assignment)
}

/// Rebuilds an assignment from externally chosen pairs.
pub fn assign_fixed_pairs(graph: &Graph, paths: &PathIndex, pairs: &BTreeMap<Vertex, HypervisorPair>) -> Result<HypervisorAssignment> {
    let mut assignment = HypervisorAssignment::default();
    for (&s, &pair) in pairs {
        let single = if pair.is_single() && pair.first() == s {
            SwitchAssignment::hosted(s)
        } else {
            best_by_disjoint_paths(paths, s, &[pair])
                .ok_or_else(|| Error::NoFeasibleAssignment(format!("pair {} has no disjoint paths to switch {}", pair, graph.label(s))))?
        };
        assignment.switches.insert(s, single);
    }
    Ok(assignment)
}
