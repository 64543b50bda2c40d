use bit_set::BitSet;

use crate::domain::enumeration::context::SearchContext;
use crate::domain::graph::Vertex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PivotVariant {
    /// Keeps the pivot across sibling calls and retires it with an extra recursion.
    Old,
    /// Iterates the pivots of one level in a loop.
    Improved,
    /// `Improved`, leaving a level once a child produced nothing.
    Return,
}

/// Pivot search: `open` vertices may still contribute neighbours, `closed` ones are exhausted and
/// `forbidden` neighbours were already tried as extensions on this branch.
pub(crate) fn run(ctx: &mut SearchContext, k: usize, variant: PivotVariant) {
    let n = ctx.graph.vertex_count();
    for root in (k - 1..n).rev() {
        if ctx.should_stop() {
            break;
        }
        let mut open = BitSet::with_capacity(n);
        open.insert(root);
        let empty = BitSet::with_capacity(n);
        match variant {
            PivotVariant::Old => {
                extend_old(ctx, k, root, &open, &empty, None, &empty);
            }
            PivotVariant::Improved => {
                extend(ctx, k, root, &open, &empty, &empty, false);
            }
            PivotVariant::Return => {
                extend(ctx, k, root, &open, &empty, &empty, true);
            }
        }
    }
}

fn emit_if_complete(ctx: &mut SearchContext, k: usize, open: &BitSet, closed: &BitSet) -> bool {
    if open.len() + closed.len() != k {
        return false;
    }
    let mut all = open.clone();
    all.union_with(closed);
    ctx.emit_set(&all);
    true
}

fn extend(ctx: &mut SearchContext, k: usize, root: Vertex, open: &BitSet, closed: &BitSet, forbidden: &BitSet, prune: bool) -> u64 {
    if ctx.should_stop() {
        return 0;
    }
    ctx.visit();
    if emit_if_complete(ctx, k, open, closed) {
        return 1;
    }

    let graph = ctx.graph;
    let mut open = open.clone();
    let mut closed = closed.clone();
    let mut forbidden = forbidden.clone();
    let mut found = 0;

    while let Some(pivot) = open.iter().next() {
        for u in graph.neighbors_below(pivot, root) {
            if forbidden.contains(u) || open.contains(u) || closed.contains(u) {
                continue;
            }
            let mut next_open = open.clone();
            next_open.insert(u);
            let child = extend(ctx, k, root, &next_open, &closed, &forbidden, prune);
            forbidden.insert(u);

            found += child;
            if ctx.stopped() || (prune && child == 0) {
                return found;
            }
        }
        open.remove(pivot);
        closed.insert(pivot);
    }
    found
}

fn extend_old(ctx: &mut SearchContext, k: usize, root: Vertex, open: &BitSet, closed: &BitSet, pivot: Option<Vertex>, forbidden: &BitSet) -> u64 {
    if ctx.should_stop() {
        return 0;
    }
    ctx.visit();
    if emit_if_complete(ctx, k, open, closed) {
        return 1;
    }

    let Some(pivot) = pivot.or_else(|| open.iter().next()) else {
        return 0;
    };

    let graph = ctx.graph;
    let mut forbidden = forbidden.clone();
    let mut found = 0;
    for u in graph.neighbors_below(pivot, root) {
        if forbidden.contains(u) || open.contains(u) || closed.contains(u) {
            continue;
        }
        let mut next_open = open.clone();
        next_open.insert(u);
        found += extend_old(ctx, k, root, &next_open, closed, Some(pivot), &forbidden);
        forbidden.insert(u);
        if ctx.stopped() {
            return found;
        }
    }

    let mut next_open = open.clone();
    next_open.remove(pivot);
    let mut next_closed = closed.clone();
    next_closed.insert(pivot);
    found + extend_old(ctx, k, root, &next_open, &next_closed, None, &forbidden)
}
