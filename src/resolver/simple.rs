//! Local resolver for short repeats with matching in/out multiplicity.
//!
//! The global matching misses short ambiguous repeats whose anchors are not
//! bifurcations of the right shape; when the reads pair every entry edge
//! with exactly one exit edge, the crossing can still be committed locally.

use ahash::{AHashMap, AHashSet};
use petgraph::unionfind::UnionFind;
use tracing::debug;

use crate::core::graph::EdgeRef;
use crate::core::paths::unbranching_paths;

use super::connections::{Connection, ReadSpan};
use super::RepeatResolver;

/// Read pairs required to trust an entry/exit pairing.
const MIN_JCT_SUPPORT: i32 = 2;

impl RepeatResolver<'_> {
    /// Resolves candidate repeat paths whose inputs and outputs cluster
    /// one-to-one under the bridging reads. Loops (the same edge entering
    /// and leaving) stay unresolved. Returns the number of separated paths.
    pub fn resolve_simple_repeats(&mut self) -> usize {
        let aln_index = self.alignments.make_index();
        let paths = unbranching_paths(self.graph);

        let mut resolved: Vec<Connection> = Vec::new();
        for path in &paths {
            if !path.id.is_forward() {
                continue;
            }
            if self.graph.edge(path.edges[0]).self_complement {
                continue;
            }

            let left_node = path.node_left(self.graph);
            let right_node = path.node_right(self.graph);
            let mut inputs: Vec<EdgeRef> = self.graph.node(left_node).in_edges.clone();
            inputs.sort_unstable();
            inputs.dedup();
            let mut outputs: Vec<EdgeRef> = self.graph.node(right_node).out_edges.clone();
            outputs.sort_unstable();
            outputs.dedup();
            if self.graph.node(left_node).out_edges.len() != 1
                || self.graph.node(right_node).in_edges.len() != 1
                || inputs.len() != outputs.len()
                || inputs.len() <= 1
            {
                continue;
            }

            // count read pairs and remember one bridging substring each
            let output_set: AHashSet<EdgeRef> = outputs.iter().copied().collect();
            let mut pair_counts: AHashMap<(EdgeRef, EdgeRef), i32> = AHashMap::new();
            let mut bridging: AHashMap<(EdgeRef, EdgeRef), ReadSpan> = AHashMap::new();
            for &in_edge in &inputs {
                let in_id = self.graph.edge(in_edge).edge_id;
                for &ai in aln_index.get(&in_id).map(Vec::as_slice).unwrap_or(&[]) {
                    let alignment = &self.alignments.alignments[ai];
                    for i in 0..alignment.len() {
                        if self.graph.edge_by_id(alignment[i].edge) != Some(in_edge) {
                            continue;
                        }
                        for j in i + 1..alignment.len() {
                            let Some(out_edge) = self.graph.edge_by_id(alignment[j].edge)
                            else {
                                continue;
                            };
                            if output_set.contains(&out_edge) {
                                *pair_counts.entry((in_edge, out_edge)).or_insert(0) += 1;
                                bridging.insert(
                                    (in_edge, out_edge),
                                    ReadSpan {
                                        read: alignment[i].overlap.cur_id,
                                        start: alignment[i].overlap.cur_end,
                                        end: alignment[j].overlap.cur_begin,
                                    },
                                );
                                break;
                            }
                        }
                    }
                }
            }

            // cluster entries and exits connected by enough reads
            let mut elements: Vec<EdgeRef> = inputs.clone();
            for &o in &outputs {
                if !elements.contains(&o) {
                    elements.push(o);
                }
            }
            let local: AHashMap<EdgeRef, usize> = elements
                .iter()
                .enumerate()
                .map(|(i, &e)| (e, i))
                .collect();
            let mut sets: UnionFind<usize> = UnionFind::new(elements.len());
            for (&(a, b), &count) in &pair_counts {
                if count >= MIN_JCT_SUPPORT {
                    sets.union(local[&a], local[&b]);
                }
            }

            let mut clusters: AHashMap<usize, Vec<EdgeRef>> = AHashMap::new();
            for (i, &e) in elements.iter().enumerate() {
                clusters.entry(sets.find(i)).or_default().push(e);
            }
            let mut cluster_list: Vec<Vec<EdgeRef>> = clusters.into_values().collect();
            cluster_list.sort_by_key(|cluster| cluster[0]);

            for cluster in cluster_list {
                if cluster.len() != 2 {
                    continue;
                }
                let input_conn = cluster.iter().copied().find(|e| inputs.contains(e));
                let output_conn = cluster.iter().copied().find(|e| output_set.contains(e));
                let (Some(input), Some(output)) = (input_conn, output_conn) else {
                    continue;
                };
                // loops with the same edge on both sides stay unresolved
                if input == output {
                    continue;
                }
                let Some(&span) = bridging.get(&(input, output)) else {
                    continue;
                };
                let mut conn_path = Vec::with_capacity(path.edges.len() + 2);
                conn_path.push(input);
                conn_path.extend_from_slice(&path.edges);
                conn_path.push(output);
                resolved.push(Connection {
                    path: conn_path,
                    read_seq: span,
                    flank_score: 0,
                });
            }
        }

        for conn in &resolved {
            debug!(
                "simple connection {} {}",
                self.graph.edge(conn.path[0]).edge_id,
                self.graph.edge(*conn.path.last().unwrap()).edge_id
            );
            self.rewire_connection(conn);
        }
        debug!("resolved {} simple repeats", resolved.len());
        self.alignments.update(self.graph);
        resolved.len()
    }
}
