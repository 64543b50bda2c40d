use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::assignment::controller_assignment::{ControllerSelection, find_possible_controllers, select_controller};
use crate::domain::assignment::hypervisor_assignment::{
    AssignmentInput, HypervisorAssignment, SwitchAssignmentStrategy, assign_fixed_pairs, assign_max_control_options, assign_shortest_paths,
};
use crate::domain::coverage::quartets::QuartetIndex;
use crate::domain::coverage::triplets::TripletIndex;
use crate::domain::graph::{Graph, Vertex};
use crate::domain::placement::external::{CoveringIlpSolver, NodeFeatures, NodeScorer, restrict_candidates};
use crate::domain::placement::heuristics::{PlacementConfig, PlacementContext, PlacementEngine, PlacementOutcome};
use crate::domain::request::VsdnRequest;
use crate::domain::routing::control_path::{ControlPathObjective, FullControlPath, full_control_path};
use crate::domain::routing::path_index::{DEFAULT_SHORTEST_K, PathIndex};
use crate::domain::utils::id::RequestId;
use crate::domain::utils::statistics::{StatParameter, StatisticEvent};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PathConfig {
    /// `max_length = latency_factor * diameter`.
    pub latency_factor: f64,
    pub shortest_k: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        PathConfig { latency_factor: 1.0, shortest_k: DEFAULT_SHORTEST_K }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentConfig {
    pub strategy: SwitchAssignmentStrategy,
    pub objective: ControlPathObjective,
    pub controller_selection: ControllerSelection,
}

#[derive(Debug, Clone, Default)]
pub struct OperatorConfig {
    pub path: PathConfig,
    pub placement: PlacementConfig,
    pub assignment: AssignmentConfig,
    pub seed: Option<u64>,
}

/// Path index and the quartet/triplet relations derived from it.
#[derive(Debug, Clone)]
pub struct ControlRelations {
    pub paths: PathIndex,
    pub quartets: QuartetIndex,
    pub triplets: TripletIndex,
}

/// Aggregated lengths of the installed full control paths.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlPathStats {
    pub count: usize,
    pub avg_primary: f64,
    pub avg_backup: f64,
    pub max_primary: f64,
    pub max_backup: f64,
}

impl ControlPathStats {
    pub fn fill(&self, event: &mut StatisticEvent) {
        event
            .set(StatParameter::AvgPrimaryLength, self.avg_primary)
            .set(StatParameter::AvgBackupLength, self.avg_backup)
            .set(StatParameter::MaxPrimaryLength, self.max_primary)
            .set(StatParameter::MaxBackupLength, self.max_backup);
    }
}

/// The infrastructure provider: owns the physical network, the hypervisor placement and all
/// accepted vSDN requests together with their control paths.
pub struct NetworkOperator {
    graph: Graph,
    config: OperatorConfig,
    diameter: f64,

    switches: Vec<Vertex>,
    hypervisor_candidates: Vec<Vertex>,
    controller_candidates: Vec<Vertex>,

    relations: Option<ControlRelations>,
    placement: Option<PlacementOutcome>,
    assignment: HypervisorAssignment,

    active_requests: BTreeMap<RequestId, VsdnRequest>,

    /// Per request, the full control path of every switch, keyed by switch.
    control_paths: BTreeMap<RequestId, BTreeMap<Vertex, FullControlPath>>,
    rng: StdRng,
}

impl NetworkOperator {
    /// Every vertex is a switch and may host a hypervisor or a controller.
    pub fn new(graph: Graph, config: OperatorConfig) -> Result<Self> {
        if !(config.path.latency_factor > 0.0) {
            return Err(Error::InvalidArgument(format!("latency_factor must be positive, got {}", config.path.latency_factor)));
        }
        if config.path.shortest_k == 0 {
            return Err(Error::InvalidArgument("shortest_k must be at least 1".to_string()));
        }
        config.placement.validate()?;

        let diameter = graph.diameter();
        let all: Vec<Vertex> = graph.vertices().collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        log::info!("Network operator on {} nodes, {} links, diameter {:.2}.", graph.vertex_count(), graph.edge_count(), diameter);

        Ok(NetworkOperator {
            graph,
            config,
            diameter,
            switches: all.clone(),
            hypervisor_candidates: all.clone(),
            controller_candidates: all,
            relations: None,
            placement: None,
            assignment: HypervisorAssignment::default(),
            active_requests: BTreeMap::new(),
            control_paths: BTreeMap::new(),
            rng,
        })
    }

    pub fn with_hypervisor_candidates(mut self, candidates: Vec<Vertex>) -> Self {
        self.hypervisor_candidates = candidates;
        self
    }

    pub fn with_controller_candidates(mut self, candidates: Vec<Vertex>) -> Self {
        self.controller_candidates = candidates;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn max_length(&self) -> f64 {
        self.config.path.latency_factor * self.diameter
    }

    pub fn hypervisor_candidates(&self) -> &[Vertex] {
        &self.hypervisor_candidates
    }

    pub fn relations(&self) -> Option<&ControlRelations> {
        self.relations.as_ref()
    }

    pub fn placement(&self) -> Option<&PlacementOutcome> {
        self.placement.as_ref()
    }

    pub fn assignment(&self) -> &HypervisorAssignment {
        &self.assignment
    }

    fn require_relations(&self) -> Result<&ControlRelations> {
        self.relations.as_ref().ok_or_else(missing_relations)
    }

    /// Builds the path index and the quartet and triplet relations for the current bound.
    pub fn control_path_calculation(&mut self) -> Result<&ControlRelations> {
        let max_length = self.max_length();
        if !(max_length > 0.0) {
            return Err(Error::InvalidArgument(format!("Network has no positive diameter, max_length={}", max_length)));
        }

        let paths = PathIndex::build(&self.graph, max_length, self.config.path.shortest_k)?;
        let quartets = QuartetIndex::construct(&paths, &self.controller_candidates, &self.switches, &self.hypervisor_candidates);
        let triplets = TripletIndex::from_quartets(&quartets);
        log::info!("{} triplets from {} quartets.", triplets.len(), quartets.len());

        Ok(self.relations.insert(ControlRelations { paths, quartets, triplets }))
    }

    /// Keeps only the `limit` best-scored hypervisor candidates.
    pub fn restrict_hypervisor_candidates(&mut self, scorer: &dyn NodeScorer, limit: usize, corpus: &[Vec<Vertex>]) -> Result<&[Vertex]> {
        let relations = self.require_relations()?;
        let features = NodeFeatures::compute(&self.graph, &relations.triplets, &relations.quartets, corpus);
        let scores = scorer.score(&self.graph, &features)?;
        self.hypervisor_candidates = restrict_candidates(&self.hypervisor_candidates, &scores, limit);
        log::info!("Hypervisor candidates restricted to {:?}.", self.graph.canonical_labels(&self.hypervisor_candidates));
        Ok(&self.hypervisor_candidates)
    }

    /// Places the hypervisors and assigns every switch its pair. Previously accepted requests
    /// are released, since their control paths depend on the old placement.
    pub fn hypervisor_placement(&mut self, held_out: &[VsdnRequest], ilp: Option<&dyn CoveringIlpSolver>) -> Result<&PlacementOutcome> {
        let relations = self.relations.as_ref().ok_or_else(missing_relations)?;
        let ctx = PlacementContext {
            graph: &self.graph,
            paths: &relations.paths,
            quartets: &relations.quartets,
            triplets: &relations.triplets,
            switches: &self.switches,
            controllers: &self.controller_candidates,
            candidates: &self.hypervisor_candidates,
        };

        let mut engine = PlacementEngine::new(ctx, &self.config.placement);
        if let Some(solver) = ilp {
            engine = engine.with_ilp_solver(solver);
        }
        let outcome = engine.place(held_out, &mut self.rng)?;

        let assignment = match (&outcome.fixed_pairs, self.config.assignment.strategy) {
            (Some(pairs), _) => assign_fixed_pairs(&self.graph, &relations.paths, pairs)?,
            (None, SwitchAssignmentStrategy::ShortestPaths) => assign_shortest_paths(&AssignmentInput {
                graph: &self.graph,
                paths: &relations.paths,
                triplets: outcome.triplets(&relations.triplets),
                switches: &self.switches,
                active: &outcome.active_hypervisors,
                main_controller: outcome.main_controller,
                main_controllable: &outcome.controllable_by_main,
                objective: self.config.assignment.objective,
            })?,
            (None, SwitchAssignmentStrategy::MaxControlOptions) => assign_max_control_options(
                &self.graph,
                &relations.paths,
                &relations.quartets,
                outcome.triplets(&relations.triplets),
                &self.switches,
                &outcome.active_hypervisors,
            )?,
        };

        if !self.active_requests.is_empty() {
            log::info!("Releasing {} requests placed under the previous placement.", self.active_requests.len());
            self.discard_all();
        }
        self.assignment = assignment;
        Ok(self.placement.insert(outcome))
    }

    /// Admits what it can. A request is accepted when one controller reaches all of its switches
    /// through their assigned pairs; its control paths are stored. Returns the accepted count.
    pub fn process_requests(&mut self, requests: &mut [VsdnRequest]) -> Result<usize> {
        if self.placement.is_none() {
            return Err(Error::InvalidArgument("No hypervisor placement to process requests against".to_string()));
        }
        let relations = self.relations.as_ref().ok_or_else(missing_relations)?;

        let n = self.graph.vertex_count();
        let mut accepted = 0;
        for request in requests.iter_mut() {
            if let Some(&bad) = request.switches.iter().find(|&&s| s >= n) {
                return Err(Error::InvalidArgument(format!("Request {} names unknown switch index {}", request.id, bad)));
            }

            let possible = find_possible_controllers(&request.switches, &self.assignment, &relations.quartets, &self.controller_candidates);
            let Some(c) = select_controller(request, &possible, self.config.assignment.controller_selection, &relations.quartets, &mut self.rng) else {
                log::debug!("Request {} rejected: no admissible controller.", request.id);
                continue;
            };

            let mut paths = BTreeMap::new();
            for &s in &request.switches {
                let Some(pair) = self.assignment.pair(s) else {
                    break;
                };
                if let Some(cp) = full_control_path(&relations.paths, c, pair.first(), pair.second(), s) {
                    paths.insert(s, cp);
                }
            }
            if paths.len() != request.switches.len() {
                log::warn!("Request {} rejected: controller {} lost a control path.", request.id, self.graph.label(c));
                continue;
            }

            request.accept(c);
            self.control_paths.insert(request.id.clone(), paths);
            self.active_requests.insert(request.id.clone(), request.clone());
            accepted += 1;
        }

        log::info!("Accepted {} of {} requests ({} active).", accepted, requests.len(), self.active_requests.len());
        Ok(accepted)
    }

    pub fn discard(&mut self, id: &RequestId) -> Option<VsdnRequest> {
        self.control_paths.remove(id);
        self.active_requests.remove(id).map(|mut r| {
            r.deactivate();
            r
        })
    }

    pub fn discard_all(&mut self) {
        self.control_paths.clear();
        self.active_requests.clear();
    }

    /// Releases every request whose lifetime ends at `time`.
    pub fn discard_old(&mut self, time: u64) -> Vec<RequestId> {
        let expired: Vec<RequestId> = self.active_requests.values().filter(|r| r.end_time == time).map(|r| r.id.clone()).collect();
        for id in &expired {
            self.discard(id);
        }
        if !expired.is_empty() {
            log::debug!("Discarded {} requests at time {}.", expired.len(), time);
        }
        expired
    }

    pub fn active_requests(&self) -> impl Iterator<Item = &VsdnRequest> {
        self.active_requests.values()
    }

    pub fn active_request_count(&self) -> usize {
        self.active_requests.len()
    }

    pub fn control_paths(&self, id: &RequestId) -> Option<&BTreeMap<Vertex, FullControlPath>> {
        self.control_paths.get(id)
    }

    pub fn control_path_stats(&self) -> ControlPathStats {
        let lengths: Vec<(f64, f64)> = self.control_paths.values().flat_map(|per_switch| per_switch.values().map(FullControlPath::lengths)).collect();
        if lengths.is_empty() {
            return ControlPathStats::default();
        }

        let count = lengths.len();
        ControlPathStats {
            count,
            avg_primary: lengths.iter().map(|l| l.0).sum::<f64>() / count as f64,
            avg_backup: lengths.iter().map(|l| l.1).sum::<f64>() / count as f64,
            max_primary: lengths.iter().map(|l| l.0).fold(0.0, f64::max),
            max_backup: lengths.iter().map(|l| l.1).fold(0.0, f64::max),
        }
    }

    /// Primary and backup lengths between each switch and its hypervisors.
    pub fn hypervisor_switch_latencies(&self) -> (Vec<f64>, Vec<f64>) {
        self.assignment.latencies()
    }

    pub fn active_controllers(&self) -> BTreeSet<Vertex> {
        self.active_requests.values().filter_map(|r| r.controller).collect()
    }
}

fn missing_relations() -> Error {
    Error::InvalidArgument("Control paths have not been calculated yet".to_string())
}
