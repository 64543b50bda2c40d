use bit_set::BitSet;

use crate::domain::enumeration::context::SearchContext;
use crate::domain::graph::Vertex;

/// Node of the shared search tree; children index into the same arena.
struct TreeNode {
    vertex: Vertex,
    children: Vec<usize>,
}

/// Breadth-depth decomposition: a depth step extends the current subgraph with a new neighbour,
/// and breadth steps replay subtrees found earlier on sibling branches (the "clones") instead of
/// searching them again.
pub(crate) fn run(ctx: &mut SearchContext, k: usize) {
    let n = ctx.graph.vertex_count();
    for root in (k - 1..n).rev() {
        if ctx.should_stop() {
            break;
        }
        let mut tree: Vec<TreeNode> = Vec::new();
        let mut subgraph: Vec<Vertex> = Vec::with_capacity(k);
        let mut excluded = BitSet::with_capacity(n);
        excluded.insert(root);
        depth(ctx, k, root, &mut subgraph, root, &[], &mut tree, &excluded);
        log::trace!("bdde root {}: search tree of {} nodes", root, tree.len());
    }
}

#[allow(clippy::too_many_arguments)]
fn depth(
    ctx: &mut SearchContext,
    k: usize,
    root: Vertex,
    subgraph: &mut Vec<Vertex>,
    active: Vertex,
    clones: &[usize],
    tree: &mut Vec<TreeNode>,
    excluded: &BitSet,
) -> Option<usize> {
    if ctx.should_stop() {
        return None;
    }

    subgraph.push(active);
    if subgraph.len() == k {
        ctx.visit();
        ctx.emit(subgraph);
        subgraph.pop();
        return None;
    }

    let graph = ctx.graph;
    let neighbours: BitSet = graph.neighbors_below(active, root).collect();
    let mut fresh = neighbours.clone();
    fresh.difference_with(excluded);
    let fresh_order: Vec<Vertex> = fresh.iter().collect();

    let node = tree.len();
    tree.push(TreeNode { vertex: active, children: Vec::new() });

    // 1. Replay the sibling subtrees, skipping anything that becomes adjacent now.
    let mut new_clones = Vec::new();
    for &clone in clones {
        if let Some(copy) = breadth(ctx, k, subgraph, clone, &fresh, tree) {
            new_clones.push(copy);
            tree[node].children.push(copy);
        }
        if ctx.stopped() {
            subgraph.pop();
            return None;
        }
    }

    // 2. Extend with each fresh neighbour; later ones may reuse the trees of earlier ones.
    let mut next_excluded = excluded.clone();
    next_excluded.union_with(&neighbours);
    for v in fresh_order {
        if let Some(child) = depth(ctx, k, root, subgraph, v, &new_clones, tree, &next_excluded) {
            new_clones.push(child);
            tree[node].children.push(child);
        }
        if ctx.stopped() {
            subgraph.pop();
            return None;
        }
    }

    ctx.visit();
    subgraph.pop();
    Some(node)
}

fn breadth(ctx: &mut SearchContext, k: usize, subgraph: &mut Vec<Vertex>, original: usize, forbidden: &BitSet, tree: &mut Vec<TreeNode>) -> Option<usize> {
    let vertex = tree[original].vertex;
    if forbidden.contains(vertex) || ctx.should_stop() {
        return None;
    }

    subgraph.push(vertex);
    if subgraph.len() == k {
        ctx.visit();
        ctx.emit(subgraph);
        subgraph.pop();
        return None;
    }

    let node = tree.len();
    tree.push(TreeNode { vertex, children: Vec::new() });

    let mut i = 0;
    while i < tree[original].children.len() {
        let child = tree[original].children[i];
        i += 1;
        if let Some(copy) = breadth(ctx, k, subgraph, child, forbidden, tree) {
            tree[node].children.push(copy);
        }
        if ctx.stopped() {
            break;
        }
    }

    ctx.visit();
    subgraph.pop();
    Some(node)
}
