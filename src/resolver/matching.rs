//! Simultaneous repeat resolution through matching on the transition graph.
//!
//! Bridging connections between unique anchors become weighted undirected
//! edges between signed anchor identities; a maximum-weight matching then
//! commits every crossing at once. The solver is deterministic: connected
//! components are solved exactly by subset DP while they are small, with a
//! documented greedy fallback for oversized components.

use ahash::{AHashMap, AHashSet};
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::{debug, warn};

use crate::core::graph::{AssemblyGraph, EdgeId};

use super::connections::Connection;
use super::RepeatResolver;

/// Components beyond this many nodes fall back to greedy matching.
const EXACT_MATCHING_LIMIT: usize = 20;

/// Counts from one matching round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchingOutcome {
    /// Anchor pairs committed and rewired.
    pub resolved: usize,
    /// Matched pairs rejected by the confidence floor.
    pub unresolved: usize,
}

impl RepeatResolver<'_> {
    /// Resolves all repeats simultaneously: builds the transition graph
    /// from `connections`, runs the matching, selects a representative
    /// bridging read per committed pair and separates the paths on both
    /// strands.
    pub fn resolve_connections(
        &mut self,
        connections: &[Connection],
        min_support: f32,
    ) -> MatchingOutcome {
        let mut connect_index: AHashMap<EdgeId, Vec<usize>> = AHashMap::new();
        for (i, conn) in connections.iter().enumerate() {
            let front = self.graph.edge(conn.path[0]).edge_id;
            let back = self.graph.edge(*conn.path.last().unwrap()).edge_id;
            for id in [front, front.rc(), back, back.rc()] {
                connect_index.entry(id).or_default().push(i);
            }
        }

        let (trans, left_coverage, right_coverage) =
            build_transition_graph(self.graph, connections);
        let mates = max_weight_matching(&trans);

        let mut used: AHashSet<EdgeId> = AHashSet::new();
        let mut unique_connections: Vec<Connection> = Vec::new();
        let mut unresolved = 0usize;
        for n in trans.node_indices() {
            let Some(mate) = mates[n.index()] else {
                continue;
            };
            let mate = NodeIndex::new(mate);
            let left_id = trans[n];
            let right_id = trans[mate];
            let support = *trans
                .edge_weight(trans.find_edge(n, mate).unwrap())
                .unwrap();

            // each matched pair is handled once, from whichever side comes
            // first; the right side is remembered
            if used.contains(&left_id) {
                continue;
            }
            used.insert(right_id);

            let coverage = left_coverage.get(&left_id).copied().unwrap_or(0)
                + right_coverage.get(&right_id).copied().unwrap_or(0);
            let confidence = support as f32 / coverage.max(1) as f32;
            debug!(
                "connection {} {} support {} confidence {:.3}",
                left_id,
                right_id.rc(),
                support,
                confidence
            );
            if confidence < min_support {
                unresolved += 1;
                continue;
            }

            let mut spanning: Vec<&Connection> = connect_index
                .get(&left_id)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .map(|&i| &connections[i])
                .filter(|conn| {
                    let front = self.graph.edge(conn.path[0]).edge_id;
                    let back = self.graph.edge(*conn.path.last().unwrap()).edge_id;
                    (front == left_id && back == right_id.rc())
                        || (front == right_id && back == left_id.rc())
                })
                .collect();
            if spanning.is_empty() {
                warn!(
                    "no spanning connections for matched pair {} {}",
                    left_id,
                    right_id.rc()
                );
                continue;
            }
            // the bridging read of typical length represents the crossing
            spanning.sort_by_key(|c| (c.read_seq.len(), c.read_seq.read, c.read_seq.start));
            unique_connections.push(spanning[spanning.len() / 2].clone());
        }

        for conn in &unique_connections {
            self.rewire_connection(conn);
        }

        debug!("resolved repeats: {}", unique_connections.len());
        debug!("read links: {}", connections.len() / 2);
        debug!("unresolved links: {}", unresolved);

        MatchingOutcome {
            resolved: unique_connections.len(),
            unresolved,
        }
    }
}

/// Builds the transition graph: one node per signed anchor identity (an
/// anchor and its reverse-complement are distinct nodes), one undirected
/// edge per observed anchor pair, weighted by the connection count.
/// Connections whose anchors coincide or are complementary are skipped, so
/// the graph never holds a self-loop.
fn build_transition_graph(
    graph: &AssemblyGraph,
    connections: &[Connection],
) -> (
    UnGraph<EdgeId, i32>,
    AHashMap<EdgeId, i32>,
    AHashMap<EdgeId, i32>,
) {
    let mut trans: UnGraph<EdgeId, i32> = UnGraph::new_undirected();
    let mut node_of: AHashMap<EdgeId, NodeIndex> = AHashMap::new();
    let mut left_coverage: AHashMap<EdgeId, i32> = AHashMap::new();
    let mut right_coverage: AHashMap<EdgeId, i32> = AHashMap::new();

    for conn in connections {
        let left = graph.edge(conn.path[0]).edge_id;
        let right = graph.edge(*conn.path.last().unwrap()).edge_id;
        if left == right || left == right.rc() {
            continue;
        }

        *left_coverage.entry(left).or_insert(0) += 1;
        *right_coverage.entry(right.rc()).or_insert(0) += 1;

        let ln = *node_of
            .entry(left)
            .or_insert_with(|| trans.add_node(left));
        let rn = *node_of
            .entry(right.rc())
            .or_insert_with(|| trans.add_node(right.rc()));
        let edge = trans
            .find_edge(ln, rn)
            .unwrap_or_else(|| trans.add_edge(ln, rn, 0));
        *trans.edge_weight_mut(edge).unwrap() += 1;
    }

    (trans, left_coverage, right_coverage)
}

/// Deterministic maximum-weight matching. Nodes are visited in ascending
/// insertion order; within a component the subset DP prefers the first
/// optimal pairing it encounters, so ties break towards lower node indices.
pub(crate) fn max_weight_matching(graph: &UnGraph<EdgeId, i32>) -> Vec<Option<usize>> {
    let n = graph.node_count();
    let mut mates: Vec<Option<usize>> = vec![None; n];

    let mut component = vec![usize::MAX; n];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let id = components.len();
        component[start] = id;
        let mut members = vec![start];
        let mut queue = vec![start];
        while let Some(v) = queue.pop() {
            for nb in graph.neighbors(NodeIndex::new(v)) {
                if component[nb.index()] == usize::MAX {
                    component[nb.index()] = id;
                    members.push(nb.index());
                    queue.push(nb.index());
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }

    for members in &components {
        if members.len() < 2 {
            continue;
        }
        if members.len() <= EXACT_MATCHING_LIMIT {
            match_component_exact(graph, members, &mut mates);
        } else {
            warn!(
                "transition component with {} nodes, matching it greedily",
                members.len()
            );
            match_component_greedy(graph, members, &mut mates);
        }
    }
    mates
}

fn component_weights(
    graph: &UnGraph<EdgeId, i32>,
    members: &[usize],
) -> Vec<Vec<Option<i64>>> {
    let m = members.len();
    let mut weights = vec![vec![None; m]; m];
    for (a, &va) in members.iter().enumerate() {
        for (b, &vb) in members.iter().enumerate().skip(a + 1) {
            if let Some(e) = graph.find_edge(NodeIndex::new(va), NodeIndex::new(vb)) {
                let w = *graph.edge_weight(e).unwrap() as i64;
                weights[a][b] = Some(w);
                weights[b][a] = Some(w);
            }
        }
    }
    weights
}

/// Exact matching by DP over node subsets: the lowest member of a subset is
/// either unmatched or paired with one of its neighbors.
fn match_component_exact(
    graph: &UnGraph<EdgeId, i32>,
    members: &[usize],
    mates: &mut [Option<usize>],
) {
    let m = members.len();
    let weights = component_weights(graph, members);
    let full = 1usize << m;
    let mut best = vec![0i64; full];
    // 0 = leave the lowest set bit unmatched, k + 1 = pair it with bit k
    let mut choice = vec![0usize; full];
    for mask in 1..full {
        let i = mask.trailing_zeros() as usize;
        let rest = mask & !(1 << i);
        best[mask] = best[rest];
        for j in (i + 1)..m {
            if mask & (1 << j) == 0 {
                continue;
            }
            if let Some(w) = weights[i][j] {
                let cand = best[rest & !(1 << j)] + w;
                if cand > best[mask] {
                    best[mask] = cand;
                    choice[mask] = j + 1;
                }
            }
        }
    }

    let mut mask = full - 1;
    while mask != 0 {
        let i = mask.trailing_zeros() as usize;
        if choice[mask] == 0 {
            mask &= !(1 << i);
        } else {
            let j = choice[mask] - 1;
            mates[members[i]] = Some(members[j]);
            mates[members[j]] = Some(members[i]);
            mask &= !(1 << i);
            mask &= !(1 << j);
        }
    }
}

/// Weight-descending greedy for oversized components; ties break towards
/// the smaller node pair.
fn match_component_greedy(
    graph: &UnGraph<EdgeId, i32>,
    members: &[usize],
    mates: &mut [Option<usize>],
) {
    let member_set: AHashSet<usize> = members.iter().copied().collect();
    let mut edges: Vec<(i32, usize, usize)> = Vec::new();
    for e in graph.edge_indices() {
        let (a, b) = graph.edge_endpoints(e).unwrap();
        let (a, b) = (a.index().min(b.index()), a.index().max(b.index()));
        if member_set.contains(&a) {
            edges.push((*graph.edge_weight(e).unwrap(), a, b));
        }
    }
    edges.sort_by(|x, y| y.0.cmp(&x.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));
    for (_, a, b) in edges {
        if a != b && mates[a].is_none() && mates[b].is_none() {
            mates[a] = Some(b);
            mates[b] = Some(a);
        }
    }
}
