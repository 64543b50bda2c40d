use std::collections::BTreeSet;

use vsdn_placement::domain::coverage::quartets::{HypervisorPair, QuartetIndex};
use vsdn_placement::domain::coverage::triplets::TripletIndex;
use vsdn_placement::domain::graph::{Graph, Vertex};
use vsdn_placement::domain::routing::control_path::control_path_exists;
use vsdn_placement::domain::routing::path_index::PathIndex;

fn ring(n: usize) -> Graph {
    let labels: Vec<String> = (0..n).map(|i| i.to_string()).collect();
    Graph::from_unit_edges((0..n).map(|i| (labels[i].clone(), labels[(i + 1) % n].clone()))).unwrap()
}

fn relations(graph: &Graph, max_length: f64) -> (PathIndex, QuartetIndex, TripletIndex) {
    let paths = PathIndex::build(graph, max_length, 8).unwrap();
    let all: Vec<Vertex> = graph.vertices().collect();
    let quartets = QuartetIndex::construct(&paths, &all, &all, &all);
    let triplets = TripletIndex::from_quartets(&quartets);
    (paths, quartets, triplets)
}

#[test]
fn test_opposite_hypervisors_cover_a_ring() {
    let g = ring(4);
    let (_, quartets, triplets) = relations(&g, 10.0);

    assert!(quartets.contains(0, 1, 3, 2), "Controller 0 reaches switch 2 through 1 and 3");
    assert!(quartets.contains(0, 3, 1, 2), "Pairs are unordered");
    assert!(!quartets.contains(0, 1, 2, 3));

    let active: BTreeSet<Vertex> = [1, 3].into_iter().collect();
    assert!(triplets.is_covered(2, &active));
    assert!(!triplets.is_covered(2, &[1].into_iter().collect()));
    assert_eq!(triplets.covered_customers(&active, &[0, 1, 2, 3]).len(), 4, "Hosts cover themselves, 0 and 2 use the pair");
}

#[test]
fn test_every_quartet_has_a_control_path() {
    let g = Graph::from_unit_edges(vec![("0", "1"), ("1", "2"), ("2", "3"), ("3", "4"), ("4", "5"), ("5", "0"), ("0", "3")]).unwrap();
    let (paths, quartets, triplets) = relations(&g, 6.0);

    assert!(!quartets.is_empty());
    for q in quartets.iter() {
        assert!(
            control_path_exists(&paths, q.controller, q.pair.first(), q.pair.second(), q.switch),
            "Quartet {:?} has no valid control path",
            q
        );
    }

    let projected: BTreeSet<(Vertex, HypervisorPair)> = quartets.iter().map(|q| (q.switch, q.pair)).collect();
    let stored: BTreeSet<(Vertex, HypervisorPair)> = triplets.iter().map(|t| (t.switch, t.pair)).collect();
    assert_eq!(projected, stored, "Triplets are the projection of the quartets");
}

#[test]
fn test_tight_bound_removes_resilient_pairs() {
    let g = ring(6);
    let (_, loose, _) = relations(&g, 10.0);
    let (_, tight, _) = relations(&g, 3.0);
    assert!(tight.len() < loose.len(), "A smaller latency bound cannot admit more quartets");
    for q in tight.iter() {
        assert!(loose.contains(q.controller, q.pair.first(), q.pair.second(), q.switch));
    }
}

#[test]
fn test_controllable_switches() {
    let g = ring(4);
    let (_, quartets, _) = relations(&g, 10.0);
    let active: BTreeSet<Vertex> = [1, 3].into_iter().collect();
    let controllable = quartets.controllable_switches(&active, &[0]);
    let expected: BTreeSet<Vertex> = [0, 1, 2, 3].into_iter().collect();
    assert_eq!(controllable.get(&0), Some(&expected), "Controller 0 reaches every switch through 1 and 3");
}
