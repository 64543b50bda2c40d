use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::domain::enumeration::context::SearchContext;
use crate::domain::graph::{Graph, Vertex};
use crate::domain::utils::union_find::LabeledUnionFind;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NeighbourRule {
    /// Candidates come from the union of the component neighbourhoods and are then checked
    /// against every component.
    Union,
    /// Candidates are the common neighbourhood of all components.
    Common,
}

/// Relabels the graph along a depth-first traversal, counting indices down from `n - 1`, and
/// returns the relabelled graph together with one start subgraph per connected component that
/// has at least `k` vertices (its first `k` visited vertices).
pub(crate) fn dfs_ordering(graph: &Graph, k: usize) -> Result<(Graph, Vec<Vec<Vertex>>)> {
    let n = graph.vertex_count();
    let mut new_index = vec![0; n];
    let mut visited = vec![false; n];
    let mut starts = Vec::new();
    let mut next = n;

    for v in graph.vertices() {
        if visited[v] {
            continue;
        }
        let first = next - 1;
        let mut size = 0;
        let mut stack = vec![v];
        while let Some(e) = stack.pop() {
            if visited[e] {
                continue;
            }
            visited[e] = true;
            next -= 1;
            new_index[e] = next;
            size += 1;
            stack.extend(graph.neighbors(e).iter().copied().filter(|&w| !visited[w]));

            if size == k {
                starts.push((first + 1 - k..=first).collect());
            }
        }
    }

    Ok((graph.permuted(&new_index)?, starts))
}

/// Union-find over the subgraph induced by `vertices`, with its number of components.
fn component_forest(graph: &Graph, vertices: &[Vertex]) -> (LabeledUnionFind<Vertex>, usize) {
    let mut forest = LabeledUnionFind::new(vertices.iter().copied());
    let mut count = vertices.len();
    for (i, &u) in vertices.iter().enumerate() {
        for &v in &vertices[i + 1..] {
            if graph.has_edge(u, v) && forest.union(&u, &v) == Some(true) {
                count -= 1;
            }
        }
    }
    (forest, count)
}

/// Whether `u` has a neighbour in every component of `forest`.
fn joins_all(graph: &Graph, forest: &mut LabeledUnionFind<Vertex>, count: usize, u: Vertex) -> bool {
    let roots: BTreeSet<Vertex> = graph.neighbors(u).iter().filter_map(|w| forest.find(w).copied()).collect();
    roots.len() == count
}

/// Neighbours of one component of `forest`, the cheapest place to look for common neighbours.
fn first_component_neighbours(graph: &Graph, forest: &mut LabeledUnionFind<Vertex>) -> BTreeSet<Vertex> {
    let parts = forest.components();
    parts.first().map(|head| head.iter().flat_map(|&w| graph.neighbors(w).iter().copied()).collect()).unwrap_or_default()
}

/// Vertices that may replace `removed` in `subgraph`: below `removed`, outside the subgraph and
/// adjacent to every component of `rest`.
fn exchange_candidates(graph: &Graph, subgraph: &[Vertex], rest: &[Vertex], removed: Vertex, rule: NeighbourRule) -> Vec<Vertex> {
    let (mut forest, count) = component_forest(graph, rest);
    let pool: BTreeSet<Vertex> = match rule {
        NeighbourRule::Union => rest.iter().flat_map(|&w| graph.neighbors(w).iter().copied()).collect(),
        NeighbourRule::Common => first_component_neighbours(graph, &mut forest),
    };

    pool.into_iter()
        .filter(|&u| u < removed && subgraph.binary_search(&u).is_err())
        .filter(|&u| joins_all(graph, &mut forest, count, u))
        .collect()
}

/// The unique parent step of `subgraph` in the reverse-search tree: the smallest removable vertex
/// `r` for which some larger outside vertex reconnects `subgraph \ {r}`, together with the largest
/// such vertex.
pub(crate) fn predecessor(graph: &Graph, subgraph: &[Vertex]) -> Option<(Vertex, Vertex)> {
    for (i, &r) in subgraph.iter().enumerate() {
        let rest: Vec<Vertex> = subgraph.iter().enumerate().filter(|&(j, _)| j != i).map(|(_, &v)| v).collect();
        let (mut forest, count) = component_forest(graph, &rest);
        let pool = first_component_neighbours(graph, &mut forest);

        let added = pool.into_iter().rev().filter(|&u| u > r && subgraph.binary_search(&u).is_err()).find(|&u| joins_all(graph, &mut forest, count, u));
        if let Some(added) = added {
            return Some((r, added));
        }
    }
    None
}

fn exchange(subgraph: &[Vertex], removed: Vertex, added: Vertex) -> Vec<Vertex> {
    let mut next: Vec<Vertex> = subgraph.iter().copied().filter(|&v| v != removed).collect();
    let position = next.partition_point(|&v| v < added);
    next.insert(position, added);
    next
}

/// Breadth-first exchange search that remembers every subgraph it discovered in the component
/// of the current start. A start whose seen set would grow beyond `max_retained` is abandoned and
/// the search goes on with the next one.
///
/// Returns the number of distinct subgraphs discovered.
pub(crate) fn run_delay(ctx: &mut SearchContext, starts: &[Vec<Vertex>], rule: NeighbourRule, max_retained: Option<usize>) -> u64 {
    let graph = ctx.graph;
    let mut discovered = 0;

    'starts: for start in starts {
        // Starts lie in different components, so their subgraphs never meet.
        let mut seen: HashSet<Vec<Vertex>> = HashSet::from([start.clone()]);
        let mut queue = VecDeque::from([start.clone()]);

        'search: while let Some(subgraph) = queue.pop_front() {
            if ctx.should_stop() {
                discovered += seen.len() as u64;
                break 'starts;
            }
            ctx.emit(&subgraph);

            for &removed in &subgraph {
                let rest: Vec<Vertex> = subgraph.iter().copied().filter(|&v| v != removed).collect();
                for added in exchange_candidates(graph, &subgraph, &rest, removed, rule) {
                    let next = exchange(&subgraph, removed, added);
                    if seen.contains(&next) {
                        continue;
                    }
                    if max_retained.is_some_and(|limit| seen.len() >= limit) {
                        log::warn!("Retained subgraph limit of {} reached, abandoning start {:?}.", seen.len(), graph.canonical_labels(start));
                        ctx.abandoned_starts += 1;
                        break 'search;
                    }
                    seen.insert(next.clone());
                    queue.push_back(next);
                }
            }
        }
        discovered += seen.len() as u64;
    }
    discovered
}

/// Exchange search without memory: a child is followed only when the exchange that produced it
/// is its canonical predecessor step.
///
/// Returns the number of subgraphs taken off the queue.
pub(crate) fn run_reverse(ctx: &mut SearchContext, starts: &[Vec<Vertex>], rule: NeighbourRule) -> u64 {
    let graph = ctx.graph;
    let mut dequeued = 0;

    'starts: for start in starts {
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(subgraph) = queue.pop_front() {
            if ctx.should_stop() {
                break 'starts;
            }
            dequeued += 1;
            ctx.emit(&subgraph);

            for &removed in &subgraph {
                let rest: Vec<Vertex> = subgraph.iter().copied().filter(|&v| v != removed).collect();
                for added in exchange_candidates(graph, &subgraph, &rest, removed, rule) {
                    let next = exchange(&subgraph, removed, added);
                    if predecessor(graph, &next) == Some((added, removed)) {
                        queue.push_back(next);
                    }
                }
            }
        }
    }
    dequeued
}
