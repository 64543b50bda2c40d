use bit_set::BitSet;

use crate::domain::enumeration::context::SearchContext;
use crate::domain::graph::Vertex;

/// Grows the subgraph one vertex at a time from an extension set; a vertex leaves the extension
/// set for good once it was tried.
pub(crate) fn run(ctx: &mut SearchContext, k: usize, prune: bool) {
    let graph = ctx.graph;
    let n = graph.vertex_count();
    for root in (k - 1..n).rev() {
        if ctx.should_stop() {
            break;
        }
        let extension: BitSet = graph.neighbors_below(root, root).collect();
        let mut closed = extension.clone();
        closed.insert(root);
        let mut subgraph = vec![root];
        extend(ctx, k, root, &mut subgraph, &extension, &closed, prune);
    }
}

fn extend(ctx: &mut SearchContext, k: usize, root: Vertex, subgraph: &mut Vec<Vertex>, extension: &BitSet, closed: &BitSet, prune: bool) -> u64 {
    if ctx.should_stop() {
        return 0;
    }
    ctx.visit();

    if subgraph.len() == k {
        ctx.emit(subgraph);
        return 1;
    }

    let graph = ctx.graph;
    let mut extension = extension.clone();
    let mut found = 0;
    while let Some(w) = extension.iter().next() {
        extension.remove(w);

        let neighbours: BitSet = graph.neighbors_below(w, root).collect();
        let mut next_extension = neighbours.clone();
        next_extension.difference_with(closed);
        next_extension.union_with(&extension);
        let mut next_closed = closed.clone();
        next_closed.union_with(&neighbours);

        subgraph.push(w);
        let child = extend(ctx, k, root, subgraph, &next_extension, &next_closed, prune);
        subgraph.pop();

        found += child;
        if ctx.stopped() || (prune && child == 0) {
            return found;
        }
    }
    found
}
