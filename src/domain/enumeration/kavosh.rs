use bit_set::BitSet;
use itertools::Itertools;

use crate::domain::enumeration::context::SearchContext;
use crate::domain::graph::Vertex;

/// Layered composition search: each level picks a non-empty subset of the fresh neighbours of
/// the previous layer.
pub(crate) fn run(ctx: &mut SearchContext, k: usize, prune: bool) {
    let n = ctx.graph.vertex_count();
    for root in (k - 1..n).rev() {
        if ctx.should_stop() {
            break;
        }
        let mut layer = BitSet::with_capacity(n);
        layer.insert(root);
        extend(ctx, k, root, &layer, &BitSet::with_capacity(n), &BitSet::with_capacity(n), prune);
    }
}

fn extend(ctx: &mut SearchContext, k: usize, root: Vertex, layer: &BitSet, chosen: &BitSet, seen: &BitSet, prune: bool) -> u64 {
    if ctx.should_stop() {
        return 0;
    }
    ctx.visit();

    let size = layer.len() + chosen.len();
    if size == k {
        let mut all = layer.clone();
        all.union_with(chosen);
        ctx.emit_set(&all);
        return 1;
    }

    let graph = ctx.graph;
    let mut fresh = BitSet::with_capacity(root);
    for v in layer.iter() {
        for w in graph.neighbors_below(v, root) {
            if !layer.contains(w) && !chosen.contains(w) && !seen.contains(w) {
                fresh.insert(w);
            }
        }
    }
    let fresh: Vec<Vertex> = fresh.iter().collect();

    let mut next_chosen = chosen.clone();
    next_chosen.union_with(layer);
    let mut next_seen = seen.clone();
    for &v in &fresh {
        next_seen.insert(v);
    }

    let mut found = 0;
    for i in (1..=(k - size).min(fresh.len())).rev() {
        let before = found;
        for subset in fresh.iter().copied().combinations(i) {
            let next_layer: BitSet = subset.into_iter().collect();
            found += extend(ctx, k, root, &next_layer, &next_chosen, &next_seen, prune);
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
