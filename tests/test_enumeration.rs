use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use itertools::Itertools;
use vsdn_placement::domain::enumeration::context::{CollectingSink, CorpusWriter};
use vsdn_placement::domain::enumeration::{EnumerationAlgorithm, EnumerationConfig, Termination, enumerate, enumerate_with};
use vsdn_placement::domain::graph::{Graph, Vertex};
use vsdn_placement::error::Error;

fn ring_with_chord() -> Graph {
    Graph::from_unit_edges(vec![("0", "1"), ("1", "2"), ("2", "3"), ("3", "4"), ("4", "5"), ("5", "0"), ("0", "3")]).unwrap()
}

fn two_triangles_and_tail() -> Graph {
    Graph::from_unit_edges(vec![("0", "1"), ("1", "2"), ("2", "0"), ("2", "3"), ("3", "4"), ("4", "5"), ("5", "3"), ("5", "6"), ("6", "7")])
        .unwrap()
}

fn is_connected(graph: &Graph, vertices: &[Vertex]) -> bool {
    let members: BTreeSet<Vertex> = vertices.iter().copied().collect();
    let mut seen = BTreeSet::from([vertices[0]]);
    let mut queue = VecDeque::from([vertices[0]]);
    while let Some(v) = queue.pop_front() {
        for &w in graph.neighbors(v) {
            if members.contains(&w) && seen.insert(w) {
                queue.push_back(w);
            }
        }
    }
    seen.len() == members.len()
}

fn brute_force(graph: &Graph, k: usize) -> BTreeSet<Vec<String>> {
    graph.vertices().combinations(k).filter(|c| is_connected(graph, c)).map(|c| graph.canonical_labels(&c)).collect()
}

fn run(graph: &Graph, algorithm: EnumerationAlgorithm, k: usize) -> Vec<Vec<String>> {
    let mut sink = CollectingSink::default();
    let stats = enumerate(graph, algorithm, k, None, &mut sink).unwrap();
    assert_eq!(stats.termination, Termination::Completed, "{} did not complete", algorithm);
    assert_eq!(stats.subgraph_count as usize, sink.subgraphs.len(), "{} miscounted its output", algorithm);
    sink.subgraphs
}

#[test]
fn test_all_algorithms_agree_with_brute_force() {
    for graph in [ring_with_chord(), two_triangles_and_tail()] {
        for k in 2..=5 {
            let expected = brute_force(&graph, k);
            for algorithm in EnumerationAlgorithm::ALL {
                let found = run(&graph, algorithm, k);
                let unique: BTreeSet<Vec<String>> = found.iter().cloned().collect();
                assert_eq!(unique.len(), found.len(), "{} emitted a subgraph twice for k={}", algorithm, k);
                assert_eq!(unique, expected, "{} found a different subgraph set for k={}", algorithm, k);
            }
        }
    }
}

#[test]
fn test_pairs_are_the_edges() {
    let graph = ring_with_chord();
    let found = run(&graph, EnumerationAlgorithm::PivotImproved, 2);
    assert_eq!(found.len(), graph.edge_count(), "Connected 2-subsets are exactly the edges");
}

#[test]
fn test_whole_graph_is_found_once() {
    let graph = two_triangles_and_tail();
    let n = graph.vertex_count();
    for algorithm in EnumerationAlgorithm::ALL {
        assert_eq!(run(&graph, algorithm, n).len(), 1, "{} should find the graph itself", algorithm);
    }
}

fn search_tree_nodes(graph: &Graph, algorithm: EnumerationAlgorithm, k: usize) -> (u64, BTreeSet<Vec<String>>) {
    let mut sink = CollectingSink::default();
    let stats = enumerate(graph, algorithm, k, None, &mut sink).unwrap();
    let nodes = stats.search_tree_nodes.unwrap_or_else(|| panic!("{} has a search tree", algorithm));
    (nodes, sink.subgraphs.into_iter().collect())
}

#[test]
fn test_search_tree_statistics() {
    let graph = two_triangles_and_tail();
    let mut sink = CollectingSink::default();
    let old = enumerate(&graph, EnumerationAlgorithm::PivotOld, 4, None, &mut sink).unwrap();
    let ret = enumerate(&graph, EnumerationAlgorithm::PivotReturn, 4, None, &mut sink).unwrap();
    assert!(old.search_tree_nodes.is_some() && old.discovered.is_none());
    assert_eq!(old.subgraph_count, ret.subgraph_count);

    let reverse = enumerate(&graph, EnumerationAlgorithm::ReverseNew, 4, None, &mut sink).unwrap();
    assert_eq!(reverse.search_tree_nodes, None, "Exchange searches have no search tree");
    assert!(reverse.discovered.is_some_and(|d| d >= reverse.subgraph_count));
}

#[test]
fn test_pruning_never_grows_the_search_tree() {
    let pairs = [
        (EnumerationAlgorithm::ExgenOld, EnumerationAlgorithm::ExgenReturn),
        (EnumerationAlgorithm::KavoshOld, EnumerationAlgorithm::KavoshReturn),
        (EnumerationAlgorithm::SimpleOld, EnumerationAlgorithm::SimpleReturn),
        (EnumerationAlgorithm::PivotOld, EnumerationAlgorithm::PivotReturn),
        (EnumerationAlgorithm::PivotImproved, EnumerationAlgorithm::PivotReturn),
    ];
    for graph in [ring_with_chord(), two_triangles_and_tail()] {
        for k in 2..=5 {
            for (baseline, pruned) in pairs {
                let (baseline_nodes, baseline_found) = search_tree_nodes(&graph, baseline, k);
                let (pruned_nodes, pruned_found) = search_tree_nodes(&graph, pruned, k);
                assert_eq!(pruned_found, baseline_found, "{} and {} disagree for k={}", pruned, baseline, k);
                assert!(pruned_nodes <= baseline_nodes, "{} visited {} nodes, {} only {} for k={}", pruned, pruned_nodes, baseline, baseline_nodes, k);
            }
        }
    }

    // The size cutoff pays off on the ring: one empty subset size ends a level early.
    let graph = ring_with_chord();
    let (old, _) = search_tree_nodes(&graph, EnumerationAlgorithm::ExgenOld, 4);
    let (ret, _) = search_tree_nodes(&graph, EnumerationAlgorithm::ExgenReturn, 4);
    assert!(ret < old, "exgen-return should skip part of the tree ({} vs {})", ret, old);
}

#[test]
fn test_invalid_k_is_rejected() {
    let graph = ring_with_chord();
    let mut sink = CollectingSink::default();
    assert!(matches!(enumerate(&graph, EnumerationAlgorithm::Bdde, 1, None, &mut sink), Err(Error::InvalidArgument(_))));
    assert!(matches!(enumerate(&graph, EnumerationAlgorithm::Bdde, 7, None, &mut sink), Err(Error::InvalidArgument(_))));
    assert!(sink.subgraphs.is_empty());
}

#[test]
fn test_expired_budget_reports_timeout() {
    let graph = two_triangles_and_tail();
    for algorithm in EnumerationAlgorithm::ALL {
        let mut sink = CollectingSink::default();
        let stats = enumerate(&graph, algorithm, 3, Some(Duration::ZERO), &mut sink).unwrap();
        assert_eq!(stats.termination, Termination::TimeBudgetExceeded, "{} ignored the budget", algorithm);
        assert!(stats.is_partial());
        assert!(sink.subgraphs.len() < brute_force(&graph, 3).len());
    }
}

#[test]
fn test_retention_limit_abandons_only_its_start() {
    let mut edges = vec![("0", "1"), ("1", "2"), ("2", "0"), ("2", "3"), ("3", "4"), ("4", "5"), ("5", "3"), ("5", "6"), ("6", "7")];
    edges.extend([("8", "9"), ("9", "10"), ("10", "8")]);
    let graph = Graph::from_unit_edges(edges).unwrap();
    let triangle = vec!["8".to_string(), "9".to_string(), "10".to_string()];

    for algorithm in [EnumerationAlgorithm::DelayOld, EnumerationAlgorithm::DelayNew] {
        let mut config = EnumerationConfig::new(algorithm, 3);
        config.max_retained = Some(2);
        let mut sink = CollectingSink::default();
        let stats = enumerate_with(&graph, &config, &mut sink).unwrap();

        assert_eq!(stats.termination, Termination::ResourceLimit, "{} ignored the retention limit", algorithm);
        assert!(stats.is_partial());
        assert!(sink.subgraphs.contains(&triangle), "{} gave up on the second component as well", algorithm);
        assert!(sink.subgraphs.len() < brute_force(&graph, 3).len());

        let mut unlimited = CollectingSink::default();
        let stats = enumerate(&graph, algorithm, 3, None, &mut unlimited).unwrap();
        assert_eq!(stats.termination, Termination::Completed);
        assert_eq!(unlimited.subgraphs.into_iter().collect::<BTreeSet<_>>(), brute_force(&graph, 3));
    }
}

#[test]
fn test_corpus_writer_output() {
    let graph = ring_with_chord();
    let mut writer = CorpusWriter::new(Vec::new());
    let config = EnumerationConfig::new(EnumerationAlgorithm::SimpleReturn, 3);
    let stats = enumerate_with(&graph, &config, &mut writer).unwrap();
    assert_eq!(writer.written(), stats.subgraph_count);

    let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
    let lines: BTreeSet<Vec<String>> = text.lines().map(|l| l.split(' ').map(str::to_string).collect()).collect();
    assert_eq!(lines, brute_force(&graph, 3), "Corpus lines should list every subgraph");
}

#[test]
fn test_statistics_row() {
    let graph = ring_with_chord();
    let mut sink = CollectingSink::default();
    let stats = enumerate(&graph, EnumerationAlgorithm::DelayNew, 3, None, &mut sink).unwrap();
    let row = stats.to_event("ring", &graph).to_row();
    assert!(row.contains(&"delay-new".to_string()));
    assert!(row.contains(&"completed".to_string()));
}
