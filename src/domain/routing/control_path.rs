use std::fmt;
use std::str::FromStr;

use crate::domain::graph::Vertex;
use crate::domain::routing::path::{WeightedPath, is_disjoint};
use crate::domain::routing::path_index::PathIndex;
use crate::error::Error;

/// The (up to) four legs connecting controller `c` to switch `s` through the hypervisors `h`
/// and `h'`: `pc: c -> h`, `ps: h -> s`, `qc: c -> h'`, `qs: h' -> s`.
///
/// Legs that collapse because two of the endpoints coincide are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FullControlPath {
    pub pc: Option<WeightedPath>,
    pub ps: Option<WeightedPath>,
    pub qc: Option<WeightedPath>,
    pub qs: Option<WeightedPath>,
}

/// Position of the controller relative to the hypervisor pair and the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPathShape {
    /// `c = h = h' = s`.
    Degenerate,
    /// `c != s`, `h = h' = s`.
    Radial,
    /// `c` is one of the hypervisors.
    Triangle,
    /// Everything else; usually four distinct vertices.
    Diamond,
}

impl ControlPathShape {
    pub fn of(c: Vertex, h: Vertex, h2: Vertex, s: Vertex) -> Self {
        if c == h && h == h2 && h2 == s {
            ControlPathShape::Degenerate
        } else if c != s && h == s && h2 == s {
            ControlPathShape::Radial
        } else if c == h || c == h2 {
            ControlPathShape::Triangle
        } else {
            ControlPathShape::Diamond
        }
    }
}

fn leg_length(leg: &Option<WeightedPath>) -> f64 {
    leg.as_ref().map(WeightedPath::length).unwrap_or(0.0)
}

impl FullControlPath {
    /// `(primary, backup)` lengths: the shorter and the longer of the two leg sums.
    pub fn lengths(&self) -> (f64, f64) {
        let first = leg_length(&self.pc) + leg_length(&self.ps);
        let second = leg_length(&self.qc) + leg_length(&self.qs);
        if first < second { (first, second) } else { (second, first) }
    }

    pub fn total(&self) -> f64 {
        let (primary, backup) = self.lengths();
        primary + backup
    }

    pub fn is_degenerate(&self) -> bool {
        self.pc.is_none() && self.ps.is_none() && self.qc.is_none() && self.qs.is_none()
    }
}

/// How two feasible control paths are compared when several hypervisor pairs qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlPathObjective {
    /// Smallest sum of primary and backup length.
    #[default]
    MinAvg,
    MinPrimary,
    MinBackup,
}

impl FromStr for ControlPathObjective {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min-avg" | "min avg" => Ok(ControlPathObjective::MinAvg),
            "min-primary" | "min primary" => Ok(ControlPathObjective::MinPrimary),
            "min-backup" | "min backup" => Ok(ControlPathObjective::MinBackup),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for ControlPathObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlPathObjective::MinAvg => "min-avg",
            ControlPathObjective::MinPrimary => "min-primary",
            ControlPathObjective::MinBackup => "min-backup",
        };
        write!(f, "{}", name)
    }
}

/// True if `candidate` strictly beats `current` under `objective`.
pub fn is_better_full_control_path(candidate: &FullControlPath, current: &FullControlPath, objective: ControlPathObjective) -> bool {
    let (cp, cb) = candidate.lengths();
    let (bp, bb) = current.lengths();
    match objective {
        ControlPathObjective::MinAvg => cp + cb < bp + bb,
        ControlPathObjective::MinPrimary => cp < bp,
        ControlPathObjective::MinBackup => cb < bb,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    FirstFeasible,
    MinimumTotal,
}

/// The shortest (by total leg length) full control path for `(c, h, h', s)` that satisfies
/// the disjointness and latency rules of its shape, or `None` if there is none.
///
/// Among leg combinations with the same total the first one found is kept; legs are tried in
/// ascending length order.
pub fn full_control_path(index: &PathIndex, c: Vertex, h: Vertex, h2: Vertex, s: Vertex) -> Option<FullControlPath> {
    search(index, c, h, h2, s, SearchMode::MinimumTotal)
}

/// Whether any valid full control path exists for `(c, h, h', s)`. Stops at the first hit.
pub fn control_path_exists(index: &PathIndex, c: Vertex, h: Vertex, h2: Vertex, s: Vertex) -> bool {
    search(index, c, h, h2, s, SearchMode::FirstFeasible).is_some()
}

fn search(index: &PathIndex, c: Vertex, h: Vertex, h2: Vertex, s: Vertex, mode: SearchMode) -> Option<FullControlPath> {
    match ControlPathShape::of(c, h, h2, s) {
        ControlPathShape::Degenerate => Some(FullControlPath::default()),
        ControlPathShape::Radial => {
            let direct = index.best(c, s)?;
            Some(FullControlPath { pc: Some(direct.clone()), ..Default::default() })
        }
        ControlPathShape::Triangle => {
            let other = if c == h { h2 } else { h };
            triangle(index, c, other, s, mode)
        }
        ControlPathShape::Diamond => diamond(index, c, h, h2, s, mode),
    }
}

/// Keeps the legs whose partner leg, at its best, still fits under `max_length`.
fn prefilter<'a>(legs: &'a [WeightedPath], partner_best: Option<f64>, max_length: f64) -> Vec<&'a WeightedPath> {
    match partner_best {
        Some(best) => legs.iter().filter(|p| p.length() + best < max_length).collect(),
        None => Vec::new(),
    }
}

/// `c` is a hypervisor itself: legs `ps: c -> s`, `qc: c -> other`, `qs: other -> s`.
fn triangle(index: &PathIndex, c: Vertex, other: Vertex, s: Vertex, mode: SearchMode) -> Option<FullControlPath> {
    let max_length = index.max_length();

    let ps_legs: Vec<&WeightedPath> = index.get_paths(c, s).iter().filter(|p| p.length() < max_length).collect();
    let qc_legs = prefilter(index.get_paths(c, other), index.best_length(other, s), max_length);
    let qs_legs = prefilter(index.get_paths(other, s), index.best_length(c, other), max_length);

    let mut best: Option<(f64, [&WeightedPath; 3])> = None;

    for &qc in &qc_legs {
        for &ps in &ps_legs {
            if !is_disjoint(qc, ps) {
                continue;
            }
            for &qs in &qs_legs {
                if qc.length() + qs.length() >= max_length || !is_disjoint(ps, qs) {
                    continue;
                }
                let total = ps.length() + qc.length() + qs.length();
                if best.as_ref().is_none_or(|(t, _)| total < *t) {
                    best = Some((total, [ps, qc, qs]));
                    if mode == SearchMode::FirstFeasible {
                        break;
                    }
                }
            }
            if mode == SearchMode::FirstFeasible && best.is_some() {
                break;
            }
        }
        if mode == SearchMode::FirstFeasible && best.is_some() {
            break;
        }
    }

    best.map(|(_, [ps, qc, qs])| FullControlPath { pc: None, ps: Some(ps.clone()), qc: Some(qc.clone()), qs: Some(qs.clone()) })
}

/// Four legs `pc, ps, qc, qs` with pairwise disjoint `(pc, qc)`, `(ps, qs)`, `(pc, qs)` and `(qc, ps)`.
fn diamond(index: &PathIndex, c: Vertex, h: Vertex, h2: Vertex, s: Vertex, mode: SearchMode) -> Option<FullControlPath> {
    let max_length = index.max_length();

    let pc_legs = prefilter(index.get_paths(c, h), index.best_length(h, s), max_length);
    let ps_legs = prefilter(index.get_paths(h, s), index.best_length(c, h), max_length);
    let qc_legs = prefilter(index.get_paths(c, h2), index.best_length(h2, s), max_length);
    let qs_legs = prefilter(index.get_paths(h2, s), index.best_length(c, h2), max_length);

    if pc_legs.is_empty() || ps_legs.is_empty() || qc_legs.is_empty() || qs_legs.is_empty() {
        return None;
    }

    let mut best: Option<(f64, [&WeightedPath; 4])> = None;

    'search: for &pc in &pc_legs {
        for &qc in &qc_legs {
            if !is_disjoint(pc, qc) {
                continue;
            }
            for &ps in &ps_legs {
                if pc.length() + ps.length() >= max_length || !is_disjoint(qc, ps) {
                    continue;
                }
                for &qs in &qs_legs {
                    if qc.length() + qs.length() >= max_length || !is_disjoint(ps, qs) || !is_disjoint(pc, qs) {
                        continue;
                    }
                    let total = pc.length() + ps.length() + qc.length() + qs.length();
                    if best.as_ref().is_none_or(|(t, _)| total < *t) {
                        best = Some((total, [pc, ps, qc, qs]));
                        if mode == SearchMode::FirstFeasible {
                            break 'search;
                        }
                    }
                }
            }
        }
    }

    best.map(|(_, [pc, ps, qc, qs])| FullControlPath {
        pc: Some(pc.clone()),
        ps: Some(ps.clone()),
        qc: Some(qc.clone()),
        qs: Some(qs.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::Graph;

    /// Two disjoint routes between every pair of a 6-ring, plus a chord 0-3.
    fn ring_with_chord() -> Graph {
        Graph::from_unit_edges(vec![("0", "1"), ("1", "2"), ("2", "3"), ("3", "4"), ("4", "5"), ("5", "0"), ("0", "3")]).unwrap()
    }

    #[test]
    fn test_shapes() {
        assert_eq!(ControlPathShape::of(1, 1, 1, 1), ControlPathShape::Degenerate);
        assert_eq!(ControlPathShape::of(0, 2, 2, 2), ControlPathShape::Radial);
        assert_eq!(ControlPathShape::of(0, 0, 4, 2), ControlPathShape::Triangle);
        assert_eq!(ControlPathShape::of(0, 4, 0, 2), ControlPathShape::Triangle);
        assert_eq!(ControlPathShape::of(0, 1, 4, 2), ControlPathShape::Diamond);
    }

    #[test]
    fn test_degenerate_is_free() {
        let g = ring_with_chord();
        let index = PathIndex::build(&g, 10.0, 4).unwrap();
        let cp = full_control_path(&index, 2, 2, 2, 2).unwrap();
        assert!(cp.is_degenerate());
        assert_eq!(cp.total(), 0.0);
    }

    #[test]
    fn test_triangle_legs_are_disjoint() {
        let g = ring_with_chord();
        let index = PathIndex::build(&g, 10.0, 4).unwrap();

        let cp = full_control_path(&index, 1, 1, 5, 3).expect("controller 1 reaches 3 via itself and 5");
        assert!(cp.pc.is_none());
        let (ps, qc, qs) = (cp.ps.as_ref().unwrap(), cp.qc.as_ref().unwrap(), cp.qs.as_ref().unwrap());
        assert!(is_disjoint(ps, qs));
        assert!(is_disjoint(qc, ps));
        assert!(control_path_exists(&index, 1, 5, 1, 3));
    }

    #[test]
    fn test_diamond_minimizes_total() {
        let g = ring_with_chord();
        let index = PathIndex::build(&g, 10.0, 6).unwrap();

        let cp = full_control_path(&index, 0, 1, 5, 3).expect("0 -> {1, 5} -> 3 is a diamond");
        let legs = [&cp.pc, &cp.ps, &cp.qc, &cp.qs].map(|l| l.as_ref().unwrap());
        assert!(is_disjoint(legs[0], legs[2]));
        assert!(is_disjoint(legs[1], legs[3]));
        assert!(is_disjoint(legs[0], legs[3]));
        assert!(is_disjoint(legs[2], legs[1]));
        assert_eq!(cp.total(), 6.0, "0-1, 1-2-3, 0-5, 5-4-3");
        assert_eq!(cp.lengths(), (3.0, 3.0));
    }

    #[test]
    fn test_latency_bound_rejects() {
        let g = ring_with_chord();
        let index = PathIndex::build(&g, 3.0, 6).unwrap();
        assert!(full_control_path(&index, 0, 1, 5, 3).is_none(), "Each side needs length 3, which is not < 3");
    }
}
