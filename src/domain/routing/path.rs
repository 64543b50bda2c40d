use crate::domain::graph::{Graph, Vertex};
use crate::error::{Error, Result};

/// Undirected link, stored as `(min, max)` of its endpoints.
pub type EdgeKey = (Vertex, Vertex);

pub fn edge_key(u: Vertex, v: Vertex) -> EdgeKey {
    (u.min(v), u.max(v))
}

/// A simple path together with its length and its set of undirected links.
///
/// The link set is kept sorted so two paths can be tested for link-disjointness with a
/// single merge pass.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPath {
    vertices: Vec<Vertex>,
    edges: Vec<EdgeKey>,
    length: f64,
}

impl WeightedPath {
    /// Builds the path along `vertices`; every consecutive pair must be an edge of `graph`.
    pub fn new(graph: &Graph, vertices: Vec<Vertex>) -> Result<Self> {
        let mut length = 0.0;
        for hop in vertices.windows(2) {
            length += graph.length(hop[0], hop[1]).ok_or_else(|| {
                Error::InvalidArgument(format!("'{}' and '{}' are not adjacent", graph.label(hop[0]), graph.label(hop[1])))
            })?;
        }
        Ok(WeightedPath::with_length(vertices, length))
    }

    pub(crate) fn with_length(vertices: Vec<Vertex>, length: f64) -> Self {
        let mut edges: Vec<EdgeKey> = vertices.windows(2).map(|hop| edge_key(hop[0], hop[1])).collect();
        edges.sort_unstable();
        WeightedPath { vertices, edges, length }
    }

    /// Zero-length path that stays at `vertex` (a switch acting as its own hypervisor).
    pub fn trivial(vertex: Vertex) -> Self {
        WeightedPath { vertices: vec![vertex], edges: Vec::new(), length: 0.0 }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[EdgeKey] {
        &self.edges
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    /// A path without links, i.e. a trivial one.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains_edge(&self, edge: EdgeKey) -> bool {
        self.edges.binary_search(&edge).is_ok()
    }
}

/// True iff both paths have links and share none of them.
///
/// An empty path is never disjoint to anything, so a missing leg cannot satisfy a
/// disjointness requirement by accident.
pub fn is_disjoint(p: &WeightedPath, q: &WeightedPath) -> bool {
    if p.is_empty() || q.is_empty() {
        return false;
    }

    let (a, b) = (p.edges(), q.edges());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return false,
        }
    }
    true
}

/// True if `(p_new, q_new)` is a better primary/backup pair than `(p, q)`: smaller length
/// sum, and on equal sums the shorter worse leg.
pub fn is_better_path_pair(p: &WeightedPath, q: &WeightedPath, p_new: &WeightedPath, q_new: &WeightedPath) -> bool {
    let current = p.length() + q.length();
    let candidate = p_new.length() + q_new.length();
    if candidate != current {
        return candidate < current;
    }
    p_new.length().max(q_new.length()) < p.length().max(q.length())
}

/// Best link-disjoint pair out of `ps` x `qs`; the first of equally good pairs is kept.
pub fn best_disjoint_pair<'a>(ps: &'a [WeightedPath], qs: &'a [WeightedPath]) -> Option<(&'a WeightedPath, &'a WeightedPath)> {
    let mut best: Option<(&WeightedPath, &WeightedPath)> = None;

    for p in ps {
        for q in qs {
            if !is_disjoint(p, q) {
                continue;
            }
            match best {
                Some((bp, bq)) if !is_better_path_pair(bp, bq, p, q) => {}
                _ => best = Some((p, q)),
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(vertices: &[Vertex], length: f64) -> WeightedPath {
        WeightedPath::with_length(vertices.to_vec(), length)
    }

    #[test]
    fn test_edges_are_undirected() {
        let p = path(&[0, 1, 2], 2.0);
        let q = path(&[2, 1], 1.0);
        assert!(!is_disjoint(&p, &q), "Reversed traversal of a link is the same link");
        assert!(p.contains_edge((1, 2)));
    }

    #[test]
    fn test_trivial_path_is_never_disjoint() {
        let p = path(&[0, 1], 1.0);
        let t = WeightedPath::trivial(3);
        assert!(t.is_empty());
        assert!(!is_disjoint(&p, &t));
        assert!(!is_disjoint(&t, &t));
    }

    #[test]
    fn test_best_disjoint_pair_prefers_balanced_on_equal_sum() {
        let ps = vec![path(&[0, 1], 1.0), path(&[0, 2, 1], 2.0)];
        let qs = vec![path(&[3, 4, 1], 3.0), path(&[3, 5, 6, 1], 2.0)];
        let (p, q) = best_disjoint_pair(&ps, &qs).unwrap();
        assert_eq!(p.length() + q.length(), 3.0);
        assert_eq!(p.vertices(), &[0, 1]);
        assert_eq!(q.vertices(), &[3, 5, 6, 1]);

        let balanced = vec![path(&[7, 8], 1.5)];
        let other = vec![path(&[9, 8], 1.5)];
        assert!(is_better_path_pair(p, q, &balanced[0], &other[0]));
    }
}
