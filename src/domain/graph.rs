use bimap::BiMap;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{Error, Result};

/// Dense vertex index in `0..vertex_count`.
pub type Vertex = usize;

/// Weighted, undirected physical topology.
///
/// Vertices carry stable string labels (`"0"`, `"17"`, `"Frankfurt"`, ...). On construction the
/// labels are sorted in canonical order (numerically if every label is an integer, otherwise
/// lexicographically) and indexed in that order, so comparing two vertex indices is the same as
/// comparing their labels. Graphs produced by [`Graph::permuted`] keep the labels but not this
/// property; use [`Graph::canonical_labels`] whenever labels must come out sorted.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Label <-> index mapping.
    labels: BiMap<String, Vertex>,

    /// Sorted adjacency lists.
    adjacency: Vec<Vec<Vertex>>,

    /// Edge lengths keyed by `(min, max)` of the endpoints.
    lengths: HashMap<(Vertex, Vertex), f64>,

    /// Position of every vertex in canonical label order.
    rank: Vec<usize>,
}

/// Ordering of labels: numeric when all labels parse as integers, lexicographic otherwise.
pub fn canonical_label_order(labels: &mut [String]) {
    if labels.iter().all(|l| l.parse::<i64>().is_ok()) {
        labels.sort_by_key(|l| l.parse::<i64>().unwrap_or(i64::MAX));
    } else {
        labels.sort();
    }
}

impl Graph {
    /// Builds a graph from isolated vertices plus `(source, target, length)` edges.
    ///
    /// Self loops are dropped and for duplicate edges the first length wins. Lengths must be
    /// finite and non-negative.
    pub fn from_weighted_edges<V, E>(vertices: V, edges: E) -> Result<Self>
    where
        V: IntoIterator<Item = String>,
        E: IntoIterator<Item = (String, String, f64)>,
    {
        let edges: Vec<(String, String, f64)> = edges.into_iter().collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut labels: Vec<String> = Vec::new();
        let all_labels = vertices.into_iter().chain(edges.iter().flat_map(|(s, t, _)| [s.clone(), t.clone()]));
        for label in all_labels {
            if seen.insert(label.clone()) {
                labels.push(label);
            }
        }
        canonical_label_order(&mut labels);

        let mut label_map = BiMap::new();
        for (index, label) in labels.into_iter().enumerate() {
            label_map.insert(label, index);
        }

        let n = label_map.len();
        let mut adjacency: Vec<Vec<Vertex>> = vec![Vec::new(); n];
        let mut lengths: HashMap<(Vertex, Vertex), f64> = HashMap::new();

        for (source, target, length) in edges {
            if !length.is_finite() || length < 0.0 {
                return Err(Error::InvalidArgument(format!("Edge {} - {} has invalid length {}", source, target, length)));
            }

            let u = label_map.get_by_left(&source).copied().ok_or_else(|| Error::UnknownVertex(source.clone()))?;
            let v = label_map.get_by_left(&target).copied().ok_or_else(|| Error::UnknownVertex(target.clone()))?;

            if u == v {
                log::debug!("Dropping self loop at '{}'.", source);
                continue;
            }

            let key = (u.min(v), u.max(v));
            if lengths.contains_key(&key) {
                log::debug!("Dropping duplicate edge '{}' - '{}'.", source, target);
                continue;
            }

            lengths.insert(key, length);
            adjacency[u].push(v);
            adjacency[v].push(u);
        }

        for neighbors in adjacency.iter_mut() {
            neighbors.sort_unstable();
        }

        Ok(Graph { labels: label_map, adjacency, lengths, rank: (0..n).collect() })
    }

    /// Unit-length graph from label pairs.
    pub fn from_unit_edges<E, S>(edges: E) -> Result<Self>
    where
        E: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Graph::from_weighted_edges(Vec::new(), edges.into_iter().map(|(s, t)| (s.into(), t.into(), 1.0)))
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn vertices(&self) -> std::ops::Range<Vertex> {
        0..self.adjacency.len()
    }

    /// Edges as `(u, v, length)` with `u < v`, in index order.
    pub fn edges(&self) -> Vec<(Vertex, Vertex, f64)> {
        let mut edges: Vec<(Vertex, Vertex, f64)> = self.lengths.iter().map(|(&(u, v), &l)| (u, v, l)).collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        edges
    }

    pub fn label(&self, vertex: Vertex) -> &str {
        self.labels.get_by_right(&vertex).map(String::as_str).unwrap_or("?")
    }

    pub fn index_of(&self, label: &str) -> Option<Vertex> {
        self.labels.get_by_left(label).copied()
    }

    pub fn vertex(&self, label: &str) -> Result<Vertex> {
        self.index_of(label).ok_or_else(|| Error::UnknownVertex(label.to_string()))
    }

    pub fn neighbors(&self, vertex: Vertex) -> &[Vertex] {
        &self.adjacency[vertex]
    }

    /// Neighbours with an index strictly below `bound`, ascending.
    pub fn neighbors_below(&self, vertex: Vertex, bound: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.adjacency[vertex].iter().copied().take_while(move |&w| w < bound)
    }

    pub fn degree(&self, vertex: Vertex) -> usize {
        self.adjacency[vertex].len()
    }

    pub fn has_edge(&self, u: Vertex, v: Vertex) -> bool {
        self.adjacency.get(u).map(|n| n.binary_search(&v).is_ok()).unwrap_or(false)
    }

    pub fn length(&self, u: Vertex, v: Vertex) -> Option<f64> {
        self.lengths.get(&(u.min(v), u.max(v))).copied()
    }

    /// Labels of `vertices` sorted in canonical label order.
    pub fn canonical_labels(&self, vertices: &[Vertex]) -> Vec<String> {
        let mut sorted: Vec<Vertex> = vertices.to_vec();
        sorted.sort_unstable_by_key(|&v| self.rank[v]);
        sorted.into_iter().map(|v| self.label(v).to_string()).collect()
    }

    /// Copy of the graph in which vertex `v` is renamed to `new_index[v]`. Labels travel with
    /// their vertices.
    pub fn permuted(&self, new_index: &[Vertex]) -> Result<Graph> {
        let n = self.vertex_count();
        let mut check = vec![false; n];
        if new_index.len() != n || new_index.iter().any(|&i| i >= n || std::mem::replace(&mut check[i], true)) {
            return Err(Error::InvalidArgument("Vertex permutation is not a bijection".to_string()));
        }

        let mut labels = BiMap::new();
        let mut rank = vec![0; n];
        let mut adjacency: Vec<Vec<Vertex>> = vec![Vec::new(); n];
        for v in 0..n {
            labels.insert(self.label(v).to_string(), new_index[v]);
            rank[new_index[v]] = self.rank[v];
            adjacency[new_index[v]] = self.adjacency[v].iter().map(|&w| new_index[w]).collect();
            adjacency[new_index[v]].sort_unstable();
        }

        let lengths = self
            .lengths
            .iter()
            .map(|(&(u, v), &l)| {
                let (a, b) = (new_index[u], new_index[v]);
                ((a.min(b), a.max(b)), l)
            })
            .collect();

        Ok(Graph { labels, adjacency, lengths, rank })
    }

    /// Single-source shortest path distances; unreachable vertices get `f64::INFINITY`.
    pub fn dijkstra(&self, source: Vertex) -> Vec<f64> {
        let mut dist = vec![f64::INFINITY; self.vertex_count()];
        let mut heap = BinaryHeap::new();
        dist[source] = 0.0;
        heap.push(HeapEntry { cost: 0.0, vertex: source });

        while let Some(HeapEntry { cost, vertex }) = heap.pop() {
            if cost > dist[vertex] {
                continue;
            }
            for &next in &self.adjacency[vertex] {
                let candidate = cost + self.length(vertex, next).unwrap_or(f64::INFINITY);
                if candidate < dist[next] {
                    dist[next] = candidate;
                    heap.push(HeapEntry { cost: candidate, vertex: next });
                }
            }
        }
        dist
    }

    /// Largest finite shortest-path distance between any two vertices.
    pub fn diameter(&self) -> f64 {
        self.vertices().flat_map(|v| self.dijkstra(v)).filter(|d| d.is_finite()).fold(0.0, f64::max)
    }

    /// Connected components, each sorted, ordered by smallest vertex.
    pub fn connected_components(&self) -> Vec<Vec<Vertex>> {
        let mut visited = vec![false; self.vertex_count()];
        let mut components = Vec::new();

        for start in self.vertices() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut component = vec![start];
            let mut stack = vec![start];
            while let Some(v) = stack.pop() {
                for &w in &self.adjacency[v] {
                    if !visited[w] {
                        visited[w] = true;
                        component.push(w);
                        stack.push(w);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    pub fn largest_component_size(&self) -> usize {
        self.connected_components().iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Min-heap entry for Dijkstra.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HeapEntry {
    pub(crate) cost: f64,
    pub(crate) vertex: Vertex,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize) -> Graph {
        Graph::from_unit_edges((0..n).map(|i| (i.to_string(), ((i + 1) % n).to_string()))).unwrap()
    }

    #[test]
    fn test_numeric_labels_are_indexed_in_numeric_order() {
        let g = Graph::from_unit_edges(vec![("10", "2"), ("2", "1")]).unwrap();
        assert_eq!(g.label(0), "1");
        assert_eq!(g.label(1), "2");
        assert_eq!(g.label(2), "10");
        assert!(g.has_edge(2, 1));
        assert!(!g.has_edge(0, 2));
    }

    #[test]
    fn test_self_loops_and_duplicates_are_dropped() {
        let g = Graph::from_unit_edges(vec![("a", "a"), ("a", "b"), ("b", "a")]).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.neighbors(0), &[1]);
    }

    #[test]
    fn test_negative_length_is_rejected() {
        let result = Graph::from_weighted_edges(Vec::new(), vec![("a".to_string(), "b".to_string(), -1.0)]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_ring_diameter_and_components() {
        let g = ring(5);
        assert_eq!(g.diameter(), 2.0);
        assert_eq!(g.connected_components().len(), 1);
        assert_eq!(g.largest_component_size(), 5);
    }

    #[test]
    fn test_permuted_keeps_labels_and_edges() {
        let g = ring(4);
        let p = g.permuted(&[3, 2, 1, 0]).unwrap();
        assert_eq!(p.label(3), "0");
        assert!(p.has_edge(3, 2));
        assert!(p.has_edge(3, 0));
        assert!(!p.has_edge(3, 1));
        assert_eq!(p.canonical_labels(&[0, 3, 1]), vec!["0", "2", "3"]);
        assert!(g.permuted(&[0, 0, 1, 2]).is_err());
    }
}
