use bit_set::BitSet;
use itertools::Itertools;

use crate::domain::enumeration::context::SearchContext;
use crate::domain::graph::Vertex;

/// Exhaustive generation rooted at every vertex `r`, from the highest index down. Only vertices
/// below `r` may join, so every subgraph is produced once, from its largest vertex.
///
/// With `prune` set a level of child subsets is abandoned as soon as one subset size produced
/// nothing, since smaller subsets cannot succeed where larger ones failed.
pub(crate) fn run(ctx: &mut SearchContext, k: usize, prune: bool) {
    let n = ctx.graph.vertex_count();
    for root in (k - 1..n).rev() {
        if ctx.should_stop() {
            break;
        }
        let mut pending = BitSet::with_capacity(n);
        pending.insert(root);
        let found = extend(ctx, k, root, &pending, &BitSet::with_capacity(n), &BitSet::with_capacity(n), prune);
        log::trace!("exgen root {}: {} subgraphs", root, found);
    }
}

/// `pending` vertices still have to expand their neighbourhood, `done` already did and
/// `seen` holds every neighbour that was offered before.
fn extend(ctx: &mut SearchContext, k: usize, root: Vertex, pending: &BitSet, done: &BitSet, seen: &BitSet, prune: bool) -> u64 {
    if ctx.should_stop() {
        return 0;
    }
    ctx.visit();

    let size = pending.len() + done.len();
    if size == k {
        let mut all = pending.clone();
        all.union_with(done);
        ctx.emit_set(&all);
        return 1;
    }
    let Some(u) = pending.iter().next() else {
        return 0;
    };

    let graph = ctx.graph;
    let mut rest = pending.clone();
    rest.remove(u);
    let mut next_done = done.clone();
    next_done.insert(u);

    let fresh: Vec<Vertex> = graph
        .neighbors_below(u, root)
        .filter(|&v| !seen.contains(v) && !pending.contains(v) && !done.contains(v))
        .collect();
    let mut next_seen = seen.clone();
    for &v in &fresh {
        next_seen.insert(v);
    }

    let mut found = 0;
    for i in (0..=(k - size).min(fresh.len())).rev() {
        let before = found;
        for subset in fresh.iter().copied().combinations(i) {
            let mut next_pending = rest.clone();
            for v in subset {
                next_pending.insert(v);
            }
            found += extend(ctx, k, root, &next_pending, &next_done, &next_seen, prune);
            if ctx.stopped() {
                return found;
            }
        }
        if prune && before == found {
            return found;
        }
    }
    found
}
