//! Arena-based assembly graph with reverse-complement symmetry.
//!
//! Nodes and edges live in central containers addressed by stable handles;
//! references between them are plain indices, never owning pointers. Every
//! edge has a reverse-complement partner (a self-complement edge is its own
//! partner) and all mutating operations keep the graph closed under
//! reverse-complement.

use std::fmt;

use ahash::AHashMap;
use tracing::debug;

use crate::core::alignment::ReadId;

/// Handle of a node in the graph arena.
pub type NodeRef = usize;
/// Handle of an edge in the graph arena.
pub type EdgeRef = usize;

/// Signed identity of a directed edge. The least significant bit stores the
/// strand; the remaining bits store the identity index, so the
/// reverse-complement identity is a single bit flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u64);

impl EdgeId {
    pub fn new(index: u64, forward: bool) -> Self {
        let mut value = index << 1;
        if !forward {
            value |= 1;
        }
        EdgeId(value)
    }

    /// The reverse-complement identity.
    pub fn rc(self) -> Self {
        EdgeId(self.0 ^ 1)
    }

    pub fn is_forward(self) -> bool {
        self.0 & 1 == 0
    }

    pub fn index(self) -> u64 {
        self.0 >> 1
    }

    /// One-based signed form used in logs and edge names (`+k` / `-k`).
    pub fn signed_id(self) -> i64 {
        if self.is_forward() {
            (self.index() + 1) as i64
        } else {
            -((self.index() + 1) as i64)
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.signed_id())
    }
}

/// Handle of an edge sequence registered with the graph. Sequences are
/// registered in forward/reverse pairs, so the complement handle is a bit
/// flip, mirroring [`EdgeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeqId(u64);

impl SeqId {
    pub fn complement(self) -> Self {
        SeqId(self.0 ^ 1)
    }

    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// A slice of a read registered as the sequence of a graph edge.
#[derive(Debug, Clone)]
pub struct EdgeSequence {
    pub read: ReadId,
    pub start: i32,
    pub len: i32,
    pub name: String,
}

/// A directed edge of the assembly graph.
///
/// Flags are kept symmetric between an edge and its reverse-complement
/// partner by the operations in this module; callers mutating flags directly
/// are responsible for mirroring them.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub edge_id: EdgeId,
    pub node_left: NodeRef,
    pub node_right: NodeRef,
    pub length: usize,
    pub mean_coverage: i64,
    pub repetitive: bool,
    pub resolved: bool,
    pub self_complement: bool,
    pub alt_haplotype: bool,
    pub unreliable: bool,
    /// Sibling edge on the left flank of an alternative-haplotype bubble.
    pub left_link: Option<EdgeRef>,
    /// Sibling edge on the right flank of an alternative-haplotype bubble.
    pub right_link: Option<EdgeRef>,
    pub sequences: Vec<SeqId>,
}

impl GraphEdge {
    pub fn is_repetitive(&self) -> bool {
        self.repetitive
    }

    pub fn is_looped(&self) -> bool {
        self.node_left == self.node_right
    }
}

/// A node of the assembly graph with ordered incident edge lists.
#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    pub in_edges: Vec<EdgeRef>,
    pub out_edges: Vec<EdgeRef>,
}

impl GraphNode {
    /// Degree-1 endpoint of a chain.
    pub fn is_end(&self) -> bool {
        self.in_edges.len() + self.out_edges.len() == 1
    }

    pub fn is_bifurcation(&self) -> bool {
        self.in_edges.len() > 1 || self.out_edges.len() > 1
    }
}

/// The assembly graph arena. Owns nodes, edges and registered edge
/// sequences; removal tombstones the slot so handles stay stable.
#[derive(Debug, Default)]
pub struct AssemblyGraph {
    nodes: Vec<Option<GraphNode>>,
    edges: Vec<Option<GraphEdge>>,
    id_to_edge: AHashMap<EdgeId, EdgeRef>,
    edge_sequences: Vec<EdgeSequence>,
    next_edge_index: u64,
}

impl AssemblyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh signed identity with a paired reverse-complement id.
    pub fn new_edge_id(&mut self) -> EdgeId {
        let id = EdgeId::new(self.next_edge_index, true);
        self.next_edge_index += 1;
        id
    }

    pub fn add_node(&mut self) -> NodeRef {
        self.nodes.push(Some(GraphNode::default()));
        self.nodes.len() - 1
    }

    /// Adds an edge and its reverse-complement partner in one step. The
    /// forward edge runs `left -> right`; the partner runs
    /// `compl_left -> compl_right` (the caller supplies the complement
    /// endpoints of its node layout).
    pub fn add_edge_pair(
        &mut self,
        left: NodeRef,
        right: NodeRef,
        compl_left: NodeRef,
        compl_right: NodeRef,
        length: usize,
        mean_coverage: i64,
    ) -> (EdgeRef, EdgeRef) {
        let id = self.new_edge_id();
        let fwd = self.insert_edge(id, left, right, length, mean_coverage);
        let rev = self.insert_edge(id.rc(), compl_left, compl_right, length, mean_coverage);
        (fwd, rev)
    }

    /// Adds an edge that is its own reverse-complement. Both signed
    /// identities resolve to the same arena slot.
    pub fn add_self_complement_edge(
        &mut self,
        left: NodeRef,
        right: NodeRef,
        length: usize,
        mean_coverage: i64,
    ) -> EdgeRef {
        let id = self.new_edge_id();
        let edge = self.insert_edge(id, left, right, length, mean_coverage);
        self.edge_mut(edge).self_complement = true;
        self.id_to_edge.insert(id.rc(), edge);
        edge
    }

    fn insert_edge(
        &mut self,
        id: EdgeId,
        left: NodeRef,
        right: NodeRef,
        length: usize,
        mean_coverage: i64,
    ) -> EdgeRef {
        let edge = GraphEdge {
            edge_id: id,
            node_left: left,
            node_right: right,
            length,
            mean_coverage,
            repetitive: false,
            resolved: false,
            self_complement: false,
            alt_haplotype: false,
            unreliable: false,
            left_link: None,
            right_link: None,
            sequences: Vec::new(),
        };
        self.edges.push(Some(edge));
        let handle = self.edges.len() - 1;
        self.node_mut(left).out_edges.push(handle);
        self.node_mut(right).in_edges.push(handle);
        self.id_to_edge.insert(id, handle);
        handle
    }

    pub fn edge(&self, handle: EdgeRef) -> &GraphEdge {
        self.edges[handle]
            .as_ref()
            .expect("edge handle refers to a removed edge")
    }

    pub fn edge_mut(&mut self, handle: EdgeRef) -> &mut GraphEdge {
        self.edges[handle]
            .as_mut()
            .expect("edge handle refers to a removed edge")
    }

    pub fn node(&self, handle: NodeRef) -> &GraphNode {
        self.nodes[handle]
            .as_ref()
            .expect("node handle refers to a removed node")
    }

    pub fn node_mut(&mut self, handle: NodeRef) -> &mut GraphNode {
        self.nodes[handle]
            .as_mut()
            .expect("node handle refers to a removed node")
    }

    pub fn edge_by_id(&self, id: EdgeId) -> Option<EdgeRef> {
        self.id_to_edge.get(&id).copied()
    }

    /// The reverse-complement partner of an edge. A missing partner is a
    /// broken symmetry invariant and therefore a programming defect.
    pub fn complement_edge(&self, handle: EdgeRef) -> EdgeRef {
        let id = self.edge(handle).edge_id;
        self.edge_by_id(id.rc())
            .unwrap_or_else(|| panic!("edge {} has no reverse-complement partner", id))
    }

    /// The reverse-complement of a walk: complement every edge, in reverse
    /// order.
    pub fn complement_path(&self, path: &[EdgeRef]) -> Vec<EdgeRef> {
        path.iter()
            .rev()
            .map(|&edge| self.complement_edge(edge))
            .collect()
    }

    /// Live edge handles in deterministic (arena) order.
    pub fn iter_edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
    }

    /// Live node handles in deterministic (arena) order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
    }

    pub fn node_count(&self) -> usize {
        self.iter_nodes().count()
    }

    pub fn edge_count(&self) -> usize {
        self.iter_edges().count()
    }

    /// Adjacent nodes, excluding the node itself (a node whose only edges
    /// are self-loops has no neighbors).
    pub fn neighbors(&self, handle: NodeRef) -> Vec<NodeRef> {
        let node = self.node(handle);
        let mut result = Vec::new();
        for &e in node.in_edges.iter().chain(node.out_edges.iter()) {
            let edge = self.edge(e);
            for other in [edge.node_left, edge.node_right] {
                if other != handle && !result.contains(&other) {
                    result.push(other);
                }
            }
        }
        result
    }

    /// A pass-through junction whose single incoming and single outgoing
    /// edge have both been resolved.
    pub fn is_resolved_junction(&self, handle: NodeRef) -> bool {
        let node = self.node(handle);
        node.in_edges.len() == 1
            && node.out_edges.len() == 1
            && self.edge(node.in_edges[0]).resolved
            && self.edge(node.out_edges[0]).resolved
    }

    /// Registers a read slice as an edge sequence, together with its
    /// reverse-complement twin, and returns the forward handle.
    pub fn add_edge_sequence(
        &mut self,
        read: ReadId,
        read_len: i32,
        start: i32,
        len: i32,
        name: &str,
    ) -> SeqId {
        let handle = SeqId(self.edge_sequences.len() as u64);
        self.edge_sequences.push(EdgeSequence {
            read,
            start,
            len,
            name: name.to_string(),
        });
        self.edge_sequences.push(EdgeSequence {
            read: read.rc(),
            start: read_len - start - len,
            len,
            name: name.to_string(),
        });
        handle
    }

    pub fn edge_sequence(&self, id: SeqId) -> &EdgeSequence {
        &self.edge_sequences[id.slot()]
    }

    /// Materializes a new edge carrying `seq` and reroutes the anchors of
    /// `path` through it: the front anchor's right end and the back anchor's
    /// left end are detached from their junctions onto fresh nodes bridged
    /// by the new edge. Interior edges stay at the junctions for any other
    /// crossing and are marked `resolved`.
    pub fn separate_path(&mut self, path: &[EdgeRef], seq: SeqId, new_id: EdgeId) -> EdgeRef {
        assert!(path.len() >= 2, "cannot separate a single-edge path");
        let front = path[0];
        let back = *path.last().unwrap();

        let coverage =
            (self.edge(front).mean_coverage + self.edge(back).mean_coverage) / 2;
        let length = self.edge_sequence(seq).len.max(0) as usize;

        // re-home the front anchor's right end
        let old_right = self.edge(front).node_right;
        self.node_mut(old_right).in_edges.retain(|&e| e != front);
        let fresh_left = self.add_node();
        self.edge_mut(front).node_right = fresh_left;
        self.node_mut(fresh_left).in_edges.push(front);

        // re-home the back anchor's left end
        let old_left = self.edge(back).node_left;
        self.node_mut(old_left).out_edges.retain(|&e| e != back);
        let fresh_right = self.add_node();
        self.edge_mut(back).node_left = fresh_right;
        self.node_mut(fresh_right).out_edges.push(back);

        for &edge in &path[1..path.len() - 1] {
            self.edge_mut(edge).resolved = true;
        }

        let new_edge = self.insert_edge(new_id, fresh_left, fresh_right, length, coverage);
        self.edge_mut(new_edge).sequences.push(seq);
        debug!(
            "separated {} -> {} through new edge {}",
            self.edge(front).edge_id,
            self.edge(back).edge_id,
            new_id
        );
        new_edge
    }

    /// Removes a node together with all of its incident edges.
    pub fn remove_node(&mut self, handle: NodeRef) {
        let Some(node) = self.nodes[handle].take() else {
            return;
        };
        let mut incident = node.in_edges;
        for e in node.out_edges {
            if !incident.contains(&e) {
                incident.push(e);
            }
        }
        for e in incident {
            let Some(edge) = self.edges[e].take() else {
                continue;
            };
            for endpoint in [edge.node_left, edge.node_right] {
                if endpoint != handle {
                    if let Some(other) = self.nodes[endpoint].as_mut() {
                        other.in_edges.retain(|&x| x != e);
                        other.out_edges.retain(|&x| x != e);
                    }
                }
            }
            self.id_to_edge.remove(&edge.edge_id);
            if edge.self_complement {
                self.id_to_edge.remove(&edge.edge_id.rc());
            }
        }
    }
}
