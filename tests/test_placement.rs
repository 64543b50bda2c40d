use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use vsdn_placement::domain::coverage::quartets::QuartetIndex;
use vsdn_placement::domain::coverage::triplets::TripletIndex;
use vsdn_placement::domain::graph::{Graph, Vertex};
use vsdn_placement::domain::placement::heuristics::{PlacementConfig, PlacementContext, PlacementEngine, PlacementHeuristic};
use vsdn_placement::domain::placement::set_cover::{CoverProblem, GreedyCover, SwitchCoverage};
use vsdn_placement::domain::routing::path_index::PathIndex;
use vsdn_placement::error::Error;

struct Fixture {
    graph: Graph,
    paths: PathIndex,
    quartets: QuartetIndex,
    triplets: TripletIndex,
    all: Vec<Vertex>,
}

fn fixture(graph: Graph, max_length: f64) -> Fixture {
    let paths = PathIndex::build(&graph, max_length, 8).unwrap();
    let all: Vec<Vertex> = graph.vertices().collect();
    let quartets = QuartetIndex::construct(&paths, &all, &all, &all);
    let triplets = TripletIndex::from_quartets(&quartets);
    Fixture { graph, paths, quartets, triplets, all }
}

fn ring_with_chords() -> Graph {
    Graph::from_unit_edges(vec![
        ("0", "1"),
        ("1", "2"),
        ("2", "3"),
        ("3", "4"),
        ("4", "5"),
        ("5", "6"),
        ("6", "7"),
        ("7", "0"),
        ("0", "4"),
        ("2", "6"),
    ])
    .unwrap()
}

fn context(f: &Fixture) -> PlacementContext<'_> {
    PlacementContext {
        graph: &f.graph,
        paths: &f.paths,
        quartets: &f.quartets,
        triplets: &f.triplets,
        switches: &f.all,
        controllers: &f.all,
        candidates: &f.all,
    }
}

#[test]
fn test_greedy_cover_is_total_and_irreducible() {
    let f = fixture(ring_with_chords(), 8.0);
    let problem = CoverProblem { graph: &f.graph, customers: &f.all, candidates: &f.all, triplets: &f.triplets };

    for seed in 0..5 {
        let mut rng = StdRng::seed_from_u64(seed);
        let cover = GreedyCover::new(problem, &SwitchCoverage, seed % 2 == 0).solve(&mut rng).unwrap();

        assert_eq!(problem.covered(&cover).len(), f.all.len(), "Seed {}: cover {:?} misses switches", seed, cover);
        for &h in &cover {
            let mut reduced = cover.clone();
            reduced.remove(&h);
            assert!(problem.covered(&reduced).len() < f.all.len(), "Seed {}: {} is redundant in {:?}", seed, h, cover);
        }
    }
}

#[test]
fn test_same_seed_gives_same_cover() {
    let f = fixture(ring_with_chords(), 8.0);
    let problem = CoverProblem { graph: &f.graph, customers: &f.all, candidates: &f.all, triplets: &f.triplets };
    let greedy = GreedyCover::new(problem, &SwitchCoverage, false);

    let first = greedy.solve(&mut StdRng::seed_from_u64(42)).unwrap();
    let second = greedy.solve(&mut StdRng::seed_from_u64(42)).unwrap();
    assert_eq!(first, second, "Tie breaking must only depend on the rng");
}

#[test]
fn test_unreachable_switches_are_reported() {
    let f = fixture(Graph::from_unit_edges(vec![("0", "1"), ("1", "2")]).unwrap(), 10.0);
    let candidates = [0];
    let problem = CoverProblem { graph: &f.graph, customers: &f.all, candidates: &candidates, triplets: &f.triplets };

    let result = GreedyCover::new(problem, &SwitchCoverage, false).solve(&mut StdRng::seed_from_u64(1));
    match result {
        Err(Error::NoFeasibleCover { uncovered }) => assert_eq!(uncovered, vec!["1".to_string(), "2".to_string()]),
        other => panic!("Expected NoFeasibleCover, got {:?}", other),
    }
}

#[test]
fn test_heuristics_cover_every_switch() {
    let f = fixture(ring_with_chords(), 8.0);
    let heuristics = [
        PlacementHeuristic::HypervisorCount,
        PlacementHeuristic::CombinedSwitchController,
        PlacementHeuristic::MainController,
        PlacementHeuristic::OverallCoverage,
    ];

    for heuristic in heuristics {
        let config = PlacementConfig { heuristic, repeat: 3, ..Default::default() };
        let engine = PlacementEngine::new(context(&f), &config);
        let outcome = engine.place(&[], &mut StdRng::seed_from_u64(3)).unwrap();

        let triplets = outcome.triplets(&f.triplets);
        let covered: BTreeSet<Vertex> = triplets.covered_customers(&outcome.active_hypervisors, &f.all);
        assert_eq!(covered.len(), f.all.len(), "{} left switches uncovered", heuristic);
        assert!(!outcome.active_hypervisors.is_empty());
        if heuristic == PlacementHeuristic::MainController {
            assert!(outcome.main_controller.is_some(), "main-controller must name its controller");
        }
    }
}

#[test]
fn test_external_heuristic_needs_a_solver() {
    let f = fixture(ring_with_chords(), 8.0);
    let config = PlacementConfig { heuristic: PlacementHeuristic::ExternalIlp, ..Default::default() };
    let engine = PlacementEngine::new(context(&f), &config);
    assert!(engine.place(&[], &mut StdRng::seed_from_u64(3)).is_err());
}
