//! Graph cleanup after repeat resolution.

use ahash::AHashSet;

use crate::core::graph::{EdgeRef, NodeRef};

use super::RepeatResolver;

impl RepeatResolver<'_> {
    /// Removes the leftovers of rewired crossings: nodes whose structure
    /// consists of resolved edges only, discovered either as fully
    /// separated nodes or as resolved chains walked from end nodes.
    /// Removal is batched; the alignment index refreshes afterwards.
    pub fn clear_resolved_repeats(&mut self) {
        let graph = &*self.graph;
        let next_edge = |node: NodeRef| -> Option<EdgeRef> {
            graph
                .node(node)
                .out_edges
                .iter()
                .copied()
                .find(|&e| !graph.edge(e).is_looped())
        };
        let should_remove = |e: EdgeRef| graph.edge(e).resolved;

        let mut to_remove: AHashSet<NodeRef> = AHashSet::new();
        for n in graph.iter_nodes() {
            // fully separated nodes
            if graph.neighbors(n).is_empty()
                && graph.node(n).out_edges.iter().all(|&e| should_remove(e))
            {
                to_remove.insert(n);
            }

            // resolved chains start at an end node
            if !graph.node(n).is_end() {
                continue;
            }
            let Some(direction) = next_edge(n) else {
                continue;
            };

            let mut traversed = vec![direction];
            let mut cur = graph.edge(direction).node_right;
            while graph.is_resolved_junction(cur) {
                let Some(next) = next_edge(cur) else {
                    break;
                };
                traversed.push(next);
                cur = graph.edge(next).node_right;
            }

            let remove_last = graph.node(cur).is_end();
            if !traversed.iter().all(|&e| should_remove(e)) {
                continue;
            }

            let compl = graph.complement_path(&traversed);

            // first-last
            to_remove.insert(graph.edge(traversed[0]).node_left);
            if remove_last {
                to_remove.insert(graph.edge(compl[0]).node_left);
            }
            // middle nodes on both strands
            for i in 0..traversed.len() - 1 {
                to_remove.insert(graph.edge(traversed[i]).node_right);
                to_remove.insert(graph.edge(compl[i]).node_right);
            }
            // last-first
            if remove_last {
                to_remove.insert(graph.edge(*traversed.last().unwrap()).node_right);
            }
            to_remove.insert(graph.edge(*compl.last().unwrap()).node_right);
        }

        let mut batch: Vec<NodeRef> = to_remove.into_iter().collect();
        batch.sort_unstable();
        for n in batch {
            self.graph.remove_node(n);
        }
        self.alignments.update(self.graph);
    }
}
