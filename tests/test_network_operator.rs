use std::fs;
use std::path::PathBuf;

use vsdn_placement::build_simulation;
use vsdn_placement::domain::assignment::controller_assignment::ControllerSelection;
use vsdn_placement::domain::assignment::hypervisor_assignment::SwitchAssignmentStrategy;
use vsdn_placement::domain::enumeration::context::CollectingSink;
use vsdn_placement::domain::enumeration::{EnumerationAlgorithm, enumerate};
use vsdn_placement::domain::graph::{Graph, Vertex};
use vsdn_placement::domain::network_operator::{AssignmentConfig, NetworkOperator, OperatorConfig, PathConfig};
use vsdn_placement::domain::placement::heuristics::{PlacementConfig, PlacementHeuristic};
use vsdn_placement::domain::request::{RequestGenerator, VsdnRequest};
use vsdn_placement::domain::routing::control_path::ControlPathObjective;
use vsdn_placement::domain::simulation::{Simulation, SimulationConfig, SimulationMode};
use vsdn_placement::domain::utils::id::SimulationId;
use vsdn_placement::domain::utils::statistics::StatsCollector;

fn ring_with_chord() -> Graph {
    Graph::from_unit_edges(vec![("0", "1"), ("1", "2"), ("2", "3"), ("3", "4"), ("4", "5"), ("5", "0"), ("0", "3")]).unwrap()
}

fn operator_config(heuristic: PlacementHeuristic, strategy: SwitchAssignmentStrategy) -> OperatorConfig {
    OperatorConfig {
        path: PathConfig { latency_factor: 3.0, shortest_k: 8 },
        placement: PlacementConfig { heuristic, repeat: 2, ..Default::default() },
        assignment: AssignmentConfig { strategy, objective: ControlPathObjective::MinAvg, controller_selection: ControllerSelection::MaxTotalHpair },
        seed: Some(7),
    }
}

fn placed_operator(heuristic: PlacementHeuristic, strategy: SwitchAssignmentStrategy) -> NetworkOperator {
    let mut operator = NetworkOperator::new(ring_with_chord(), operator_config(heuristic, strategy)).unwrap();
    operator.control_path_calculation().unwrap();
    operator.hypervisor_placement(&[], None).unwrap();
    operator
}

fn link_requests(n: usize, ttl: u64) -> Vec<VsdnRequest> {
    (0..n).map(|s| VsdnRequest::new(vec![s, (s + 1) % n], ttl, 0).unwrap()).collect()
}

#[test]
fn test_link_requests_store_control_paths() {
    let mut operator = placed_operator(PlacementHeuristic::HypervisorCount, SwitchAssignmentStrategy::ShortestPaths);
    let mut requests = link_requests(6, 3);

    let accepted = operator.process_requests(&mut requests).unwrap();
    assert!(accepted > 0, "A generous latency bound lets some controller reach neighbouring switches");
    assert_eq!(operator.active_request_count(), accepted);
    for request in requests.iter().filter(|r| r.accepted) {
        assert!(request.active);
        let paths = operator.control_paths(&request.id).unwrap();
        assert_eq!(paths.keys().copied().collect::<Vec<Vertex>>(), request.switches);
    }
    for request in requests.iter().filter(|r| !r.accepted) {
        assert!(!request.active && operator.control_paths(&request.id).is_none());
    }
    assert_eq!(operator.control_path_stats().count, 2 * accepted);

    let released = operator.discard_old(3);
    assert_eq!(released.len(), accepted, "All requests end at time 3");
    assert_eq!(operator.active_request_count(), 0);
    assert_eq!(operator.control_path_stats().count, 0);
}

#[test]
fn test_replacement_releases_requests() {
    let mut operator = placed_operator(PlacementHeuristic::CombinedSwitchController, SwitchAssignmentStrategy::ShortestPaths);
    let mut requests = link_requests(6, 5);
    let accepted = operator.process_requests(&mut requests).unwrap();
    assert_eq!(operator.active_request_count(), accepted);

    if let Some(request) = requests.iter().find(|r| r.accepted) {
        assert!(operator.discard(&request.id).is_some());
        assert!(operator.discard(&request.id).is_none(), "Discarding twice is a no-op");
    }
    let mut requests = link_requests(6, 5);
    operator.process_requests(&mut requests).unwrap();

    operator.hypervisor_placement(&[], None).unwrap();
    assert_eq!(operator.active_request_count(), 0, "A new placement invalidates old control paths");
}

#[test]
fn test_static_simulation_offers_corpus_share() {
    let graph = ring_with_chord();
    let mut generator = RequestGenerator::new(4, Some(5)).unwrap();
    for k in [2, 3] {
        let mut sink = CollectingSink::default();
        enumerate(&graph, EnumerationAlgorithm::PivotImproved, k, None, &mut sink).unwrap();
        generator.add_labelled_corpus(&graph, k, &sink.subgraphs).unwrap();
    }
    let pair_count = generator.corpus(2).len();

    let operator = NetworkOperator::new(graph, operator_config(PlacementHeuristic::HypervisorCount, SwitchAssignmentStrategy::ShortestPaths)).unwrap();
    let config = SimulationConfig {
        id: SimulationId::new("ring-static"),
        mode: SimulationMode::Static,
        request_sizes: vec![2, 3],
        coverage: 1.0,
        timesteps: 0,
        requests_per_timestep: 0,
        max_request_size: 3,
        held_out_requests: 0,
    };

    let stats = StatsCollector::init(None).unwrap();
    let results = Simulation::new(config, operator, generator).run(&stats).unwrap();
    stats.shutdown();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].offered, pair_count, "Full coverage offers the whole corpus");
    for result in &results {
        assert!(result.accepted <= result.offered);
        assert_eq!(result.active, result.accepted, "Static steps start from an empty network");
    }
}

#[test]
fn test_dynamic_simulation_from_files() {
    let dir = std::env::temp_dir().join(format!("vsdn_placement_sim_{}", std::process::id()));
    let corpus_dir = dir.join("corpus");
    fs::create_dir_all(&corpus_dir).unwrap();

    let topology: PathBuf = dir.join("ring.txt");
    fs::write(&topology, "# ring with chord\n0 1\n1 2\n2 3\n3 4\n4 5\n5 0\n0 3\n").unwrap();
    fs::write(corpus_dir.join("k2.txt"), "0 1\n1 2\n2 3\n3 4\n4 5\n0 5\n0 3\n").unwrap();
    fs::write(corpus_dir.join("k3.txt"), "0 1 2\n1 2 3\n3 4 5\n0 4 5\n").unwrap();

    let config = dir.join("config.json");
    fs::write(
        &config,
        r#"{
            "id": "ring-dynamic",
            "latencyFactor": 3.0,
            "heuristic": "overall-coverage",
            "mode": "dynamic",
            "timesteps": 4,
            "requestsPerTimestep": 3,
            "maxRequestSize": 3,
            "maxTtl": 2,
            "seed": 9
        }"#,
    )
    .unwrap();

    let mut simulation = build_simulation(&topology, &config, &corpus_dir).unwrap();
    let stats = StatsCollector::init(None).unwrap();
    let results = simulation.run(&stats).unwrap();
    stats.shutdown();

    assert_eq!(results.len(), 4);
    for result in &results {
        assert_eq!(result.offered, 3);
        assert!(result.active <= 3 * (result.step as usize + 1));
    }

    fs::remove_dir_all(&dir).ok();
}
