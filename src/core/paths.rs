//! Maximal unbranching paths over the assembly graph.
//!
//! A maximal walk whose internal nodes all have in-degree = out-degree = 1.
//! Paths are extracted on both strands; a path and its reverse-complement
//! receive paired signed ids so a sibling lookup by `id.rc()` finds the
//! complement (a self-complement path maps back to itself).

use ahash::AHashMap;

use crate::core::graph::{AssemblyGraph, EdgeId, EdgeRef, NodeRef};

#[derive(Debug, Clone)]
pub struct UnbranchingPath {
    pub id: EdgeId,
    pub edges: Vec<EdgeRef>,
    pub length: usize,
    pub mean_coverage: i64,
}

impl UnbranchingPath {
    pub fn is_looped(&self, graph: &AssemblyGraph) -> bool {
        let front = self.edges[0];
        let back = *self.edges.last().unwrap();
        graph.edge(front).node_left == graph.edge(back).node_right
    }

    pub fn node_left(&self, graph: &AssemblyGraph) -> NodeRef {
        graph.edge(self.edges[0]).node_left
    }

    pub fn node_right(&self, graph: &AssemblyGraph) -> NodeRef {
        graph.edge(*self.edges.last().unwrap()).node_right
    }

    /// Signed edge ids joined for log lines.
    pub fn edges_str(&self, graph: &AssemblyGraph) -> String {
        self.edges
            .iter()
            .map(|&e| graph.edge(e).edge_id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn is_passthrough(graph: &AssemblyGraph, node: NodeRef) -> bool {
    let n = graph.node(node);
    n.in_edges.len() == 1 && n.out_edges.len() == 1
}

/// Extracts all maximal unbranching paths, isolated cycles included.
pub fn unbranching_paths(graph: &AssemblyGraph) -> Vec<UnbranchingPath> {
    let slots = graph.iter_edges().max().map_or(0, |e| e + 1);
    let mut visited = vec![false; slots];
    let mut walks: Vec<Vec<EdgeRef>> = Vec::new();

    // walks starting at a branching or terminal node
    for e in graph.iter_edges() {
        if visited[e] || is_passthrough(graph, graph.edge(e).node_left) {
            continue;
        }
        let mut walk = vec![e];
        visited[e] = true;
        let mut cur = e;
        while is_passthrough(graph, graph.edge(cur).node_right) {
            let next = graph.node(graph.edge(cur).node_right).out_edges[0];
            if visited[next] {
                break;
            }
            visited[next] = true;
            walk.push(next);
            cur = next;
        }
        walks.push(walk);
    }

    // leftover edges belong to isolated cycles
    for e in graph.iter_edges() {
        if visited[e] {
            continue;
        }
        let mut walk = vec![e];
        visited[e] = true;
        let mut cur = e;
        loop {
            let next = graph.node(graph.edge(cur).node_right).out_edges[0];
            if next == e || visited[next] {
                break;
            }
            visited[next] = true;
            walk.push(next);
            cur = next;
        }
        walks.push(walk);
    }

    // assign paired path ids: the first walk of a complementary pair gets
    // the forward id, its complement (keyed under the complement of this
    // walk's last edge) the reverse id
    let mut key_to_id: AHashMap<EdgeId, EdgeId> = AHashMap::new();
    let mut next_index = 0u64;
    let mut paths = Vec::with_capacity(walks.len());
    for walk in walks {
        let front_id = graph.edge(walk[0]).edge_id;
        let back_rc = graph.edge(*walk.last().unwrap()).edge_id.rc();
        if !key_to_id.contains_key(&front_id) {
            key_to_id.insert(front_id, EdgeId::new(next_index, true));
            if back_rc != front_id {
                key_to_id.insert(back_rc, EdgeId::new(next_index, false));
            }
            next_index += 1;
        }
        let id = key_to_id[&front_id];

        let mut length = 0usize;
        let mut weighted_cov = 0i64;
        for &e in &walk {
            let edge = graph.edge(e);
            length += edge.length;
            weighted_cov += edge.mean_coverage * edge.length as i64;
        }
        let mean_coverage = weighted_cov / length.max(1) as i64;
        paths.push(UnbranchingPath {
            id,
            edges: walk,
            length,
            mean_coverage,
        });
    }
    paths
}

/// Index from path id to position, for complement sibling lookup.
pub fn path_index(paths: &[UnbranchingPath]) -> AHashMap<EdgeId, usize> {
    paths.iter().enumerate().map(|(i, p)| (p.id, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_collapses_to_one_path_per_strand() {
        // a -> b -> c -> d, mirrored
        let mut graph = AssemblyGraph::new();
        let n: Vec<_> = (0..4).map(|_| graph.add_node()).collect();
        let r: Vec<_> = (0..4).map(|_| graph.add_node()).collect();
        let (e1, _) = graph.add_edge_pair(n[0], n[1], r[1], r[0], 100, 10);
        let (e2, _) = graph.add_edge_pair(n[1], n[2], r[2], r[1], 300, 30);
        let (e3, _) = graph.add_edge_pair(n[2], n[3], r[3], r[2], 100, 10);

        let paths = unbranching_paths(&graph);
        assert_eq!(paths.len(), 2);
        let forward = paths.iter().find(|p| p.id.is_forward()).unwrap();
        assert_eq!(forward.edges, vec![e1, e2, e3]);
        assert_eq!(forward.length, 500);
        // length-weighted: (100*10 + 300*30 + 100*10) / 500
        assert_eq!(forward.mean_coverage, 22);

        let index = path_index(&paths);
        let compl = &paths[index[&forward.id.rc()]];
        assert_eq!(compl.edges.len(), 3);
        assert!(!compl.id.is_forward());
    }

    #[test]
    fn isolated_cycle_is_one_looped_path() {
        let mut graph = AssemblyGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let ra = graph.add_node();
        let rb = graph.add_node();
        graph.add_edge_pair(a, b, rb, ra, 100, 5);
        graph.add_edge_pair(b, a, ra, rb, 200, 5);

        let paths = unbranching_paths(&graph);
        assert_eq!(paths.len(), 2);
        for p in &paths {
            assert_eq!(p.edges.len(), 2);
            assert!(p.is_looped(&graph));
            assert_eq!(p.length, 300);
        }
        assert_eq!(paths.iter().filter(|p| p.id.is_forward()).count(), 1);
    }

    #[test]
    fn self_loop_edge_forms_looped_path() {
        let mut graph = AssemblyGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        graph.add_edge_pair(a, a, b, b, 4999, 5);
        let paths = unbranching_paths(&graph);
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.is_looped(&graph)));
    }
}
