use rayon::prelude::*;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::domain::graph::{Graph, HeapEntry, Vertex};
use crate::domain::routing::path::{EdgeKey, WeightedPath, edge_key};
use crate::error::{Error, Result};

/// Default number of shortest paths kept per node pair.
pub const DEFAULT_SHORTEST_K: usize = 16;

/// The k shortest loopless paths between every pair of vertices, restricted to paths that are
/// strictly shorter than `max_length`.
///
/// Built once for a `(max_length, shortest_k)` configuration and read-only afterwards, so it can
/// be shared freely between threads. Both orientations of a pair point at the same path list;
/// vertex sequences in that list run from the smaller to the larger vertex index.
#[derive(Debug, Clone)]
pub struct PathIndex {
    vertex_count: usize,
    max_length: f64,
    shortest_k: usize,

    /// Row-major `vertex_count x vertex_count` table of shared path lists.
    table: Vec<Arc<[WeightedPath]>>,
}

impl PathIndex {
    /// Computes the path lists of all unordered vertex pairs (in parallel).
    pub fn build(graph: &Graph, max_length: f64, shortest_k: usize) -> Result<Self> {
        if shortest_k == 0 {
            return Err(Error::InvalidArgument("shortest_k must be at least 1".to_string()));
        }
        if max_length.is_nan() || max_length <= 0.0 {
            return Err(Error::InvalidArgument(format!("max_length must be positive, got {}", max_length)));
        }

        let started = Instant::now();
        let n = graph.vertex_count();
        let pairs: Vec<(Vertex, Vertex)> = (0..n).flat_map(|u| (u + 1..n).map(move |v| (u, v))).collect();

        let computed: Vec<((Vertex, Vertex), Arc<[WeightedPath]>)> = pairs
            .par_iter()
            .map(|&(u, v)| ((u, v), Arc::from(k_shortest_paths(graph, u, v, max_length, shortest_k))))
            .collect();

        let empty: Arc<[WeightedPath]> = Arc::from(Vec::new());
        let mut table = vec![empty; n * n];
        let mut stored = 0;
        for ((u, v), paths) in computed {
            stored += paths.len();
            table[v * n + u] = Arc::clone(&paths);
            table[u * n + v] = paths;
        }

        log::info!(
            "PathIndex built for {} pairs ({} paths, shortest_k={}, max_length={:.2}) in {:.2?}.",
            n * n.saturating_sub(1) / 2,
            stored,
            shortest_k,
            max_length,
            started.elapsed()
        );

        Ok(PathIndex { vertex_count: n, max_length, shortest_k, table })
    }

    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    pub fn shortest_k(&self) -> usize {
        self.shortest_k
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Paths between `u` and `v` ordered by ascending length. Empty for `u == v`, for
    /// unreachable pairs and for unknown vertices.
    pub fn get_paths(&self, u: Vertex, v: Vertex) -> &[WeightedPath] {
        if u >= self.vertex_count || v >= self.vertex_count {
            return &[];
        }
        &self.table[u * self.vertex_count + v]
    }

    pub fn best(&self, u: Vertex, v: Vertex) -> Option<&WeightedPath> {
        self.get_paths(u, v).first()
    }

    pub fn best_length(&self, u: Vertex, v: Vertex) -> Option<f64> {
        self.best(u, v).map(WeightedPath::length)
    }
}

/// Yen's ranking of loopless paths from `source` to `target`: the (at most) `k` shortest ones
/// with a length strictly below `max_length`, ascending.
pub fn k_shortest_paths(graph: &Graph, source: Vertex, target: Vertex, max_length: f64, k: usize) -> Vec<WeightedPath> {
    if source == target || k == 0 {
        return Vec::new();
    }

    let n = graph.vertex_count();
    let no_vertices = vec![false; n];
    let no_edges = HashSet::new();

    let mut accepted: Vec<(Vec<Vertex>, f64)> = Vec::new();
    match shortest_path_avoiding(graph, source, target, &no_vertices, &no_edges) {
        Some(first) if first.1 < max_length => accepted.push(first),
        _ => return Vec::new(),
    }

    let mut candidates: Vec<(Vec<Vertex>, f64)> = Vec::new();
    let mut known: HashSet<Vec<Vertex>> = HashSet::new();
    known.insert(accepted[0].0.clone());

    while accepted.len() < k {
        let previous = accepted[accepted.len() - 1].0.clone();

        for i in 0..previous.len() - 1 {
            let spur = previous[i];
            let root = &previous[..=i];

            let mut blocked_edges: HashSet<EdgeKey> = HashSet::new();
            for (path, _) in &accepted {
                if path.len() > i + 1 && &path[..=i] == root {
                    blocked_edges.insert(edge_key(path[i], path[i + 1]));
                }
            }

            let mut blocked_vertices = vec![false; n];
            for &v in &root[..i] {
                blocked_vertices[v] = true;
            }

            if let Some((spur_path, spur_length)) = shortest_path_avoiding(graph, spur, target, &blocked_vertices, &blocked_edges) {
                let root_length: f64 = root.windows(2).map(|hop| graph.length(hop[0], hop[1]).unwrap_or(f64::INFINITY)).sum();
                let mut total = root[..i].to_vec();
                total.extend(spur_path);
                if known.insert(total.clone()) {
                    candidates.push((total, root_length + spur_length));
                }
            }
        }

        // Shortest candidate next; equal lengths fall back to the vertex sequence.
        let Some(best) = candidates
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.1.total_cmp(&b.1.1).then_with(|| a.1.0.cmp(&b.1.0)))
            .map(|(index, _)| index)
        else {
            break;
        };

        let next = candidates.swap_remove(best);
        if next.1 >= max_length {
            break;
        }
        accepted.push(next);
    }

    accepted.into_iter().map(|(vertices, length)| WeightedPath::with_length(vertices, length)).collect()
}

/// Dijkstra from `source` to `target` that ignores blocked vertices and links.
fn shortest_path_avoiding(
    graph: &Graph,
    source: Vertex,
    target: Vertex,
    blocked_vertices: &[bool],
    blocked_edges: &HashSet<EdgeKey>,
) -> Option<(Vec<Vertex>, f64)> {
    let n = graph.vertex_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut previous: Vec<Option<Vertex>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    dist[source] = 0.0;
    heap.push(HeapEntry { cost: 0.0, vertex: source });

    while let Some(HeapEntry { cost, vertex }) = heap.pop() {
        if vertex == target {
            break;
        }
        if cost > dist[vertex] {
            continue;
        }
        for &next in graph.neighbors(vertex) {
            if blocked_vertices[next] || blocked_edges.contains(&edge_key(vertex, next)) {
                continue;
            }
            let candidate = cost + graph.length(vertex, next).unwrap_or(f64::INFINITY);
            if candidate < dist[next] {
                dist[next] = candidate;
                previous[next] = Some(vertex);
                heap.push(HeapEntry { cost: candidate, vertex: next });
            }
        }
    }

    if !dist[target].is_finite() {
        return None;
    }

    let mut path = vec![target];
    let mut current = target;
    while let Some(p) = previous[current] {
        path.push(p);
        current = p;
    }
    path.reverse();
    Some((path, dist[target]))
}
