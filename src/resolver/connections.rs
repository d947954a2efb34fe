//! Extraction of bridging connections from read alignments.

use tracing::{debug, warn};

use crate::core::alignment::{Overlap, ReadId};
use crate::core::graph::EdgeRef;

use super::RepeatResolver;

/// A substring of a read, `[start, end)`.
#[derive(Debug, Clone, Copy)]
pub struct ReadSpan {
    pub read: ReadId,
    pub start: i32,
    pub end: i32,
}

impl ReadSpan {
    pub fn len(&self) -> i32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A bridging record: a graph walk whose first and last edges are unique
/// anchors with the repeat in between, the read substring spanning the
/// crossing, and the smaller of the two anchor alignment ranges. Emitted
/// together with its reverse-complement twin.
#[derive(Debug, Clone)]
pub struct Connection {
    pub path: Vec<EdgeRef>,
    pub read_seq: ReadSpan,
    pub flank_score: i32,
}

impl RepeatResolver<'_> {
    /// Scans every read alignment for pairs of unique edges the read spans
    /// and returns the bridging connections, each with its
    /// reverse-complement twin.
    pub fn get_connections(&self) -> Vec<Connection> {
        let graph = &*self.graph;
        let placeholder = self.config.bridge_span;
        let safe = |e: EdgeRef| !graph.edge(e).is_repetitive();
        let init_read_start = |ovlp: &Overlap| {
            (ovlp.cur_end + ovlp.ext_len - ovlp.ext_end).min(ovlp.cur_len - placeholder)
        };

        let total_safe = graph
            .iter_edges()
            .filter(|&e| graph.edge(e).edge_id.is_forward() && safe(e))
            .count();
        debug!("total unique edges: {}", total_safe);

        let mut connections = Vec::new();
        for alignment in &self.alignments.alignments {
            let mut current: Vec<(EdgeRef, Overlap)> = Vec::new();
            let mut read_start = 0i32;
            for record in alignment {
                let Some(edge) = graph.edge_by_id(record.edge) else {
                    continue;
                };
                let ovlp = record.overlap;
                if current.is_empty() {
                    if !safe(edge) {
                        continue;
                    }
                    read_start = init_read_start(&ovlp);
                }

                current.push((edge, ovlp));
                if safe(edge) && current[0].0 != edge {
                    let (front, front_ovlp) = current[0];

                    // a crossing that does not block contig extension on
                    // either side needs no resolution
                    let mut reliable = graph.node(graph.edge(front).node_right).is_bifurcation()
                        && graph.node(graph.edge(edge).node_left).is_bifurcation();

                    // two previously-repetitive edges give no new placement
                    if graph.edge(front).resolved && graph.edge(edge).resolved {
                        reliable = false;
                    }

                    // already linked through a haplotype structure
                    if graph.edge(front).right_link.is_some()
                        || graph.edge(edge).left_link.is_some()
                    {
                        reliable = false;
                    }

                    if !reliable {
                        current.clear();
                        current.push((edge, ovlp));
                        read_start = init_read_start(&ovlp);
                        continue;
                    }

                    let flank_score = front_ovlp.cur_range().min(ovlp.cur_range());
                    let path: Vec<EdgeRef> = current.iter().map(|&(e, _)| e).collect();
                    let compl_path = graph.complement_path(&path);

                    // consecutive anchors still get a sliver of read
                    // sequence as a placeholder
                    let read_end =
                        (ovlp.cur_begin - ovlp.ext_begin).max(read_start + placeholder - 1);
                    if read_start < 0 || read_end >= ovlp.cur_len {
                        warn!(
                            "malformed bridging read coordinates {}..{} (read length {})",
                            read_start, read_end, ovlp.cur_len
                        );
                        break;
                    }

                    let read_seq = ReadSpan {
                        read: ovlp.cur_id,
                        start: read_start,
                        end: read_end,
                    };
                    let compl_seq = ReadSpan {
                        read: ovlp.cur_id.rc(),
                        start: ovlp.cur_len - read_end - 1,
                        end: ovlp.cur_len - read_start - 1,
                    };
                    connections.push(Connection {
                        path,
                        read_seq,
                        flank_score,
                    });
                    connections.push(Connection {
                        path: compl_path,
                        read_seq: compl_seq,
                        flank_score,
                    });

                    current.clear();
                    current.push((edge, ovlp));
                    read_start = init_read_start(&ovlp);
                }
            }
        }
        connections
    }
}
