pub mod alignment;
pub mod graph;
pub mod paths;

// Re-export key types for resolver integration
pub use alignment::{
    reverse_complement, AlignmentRecord, AlignmentSet, GraphAlignment, Overlap, ReadId,
    ReadRecord, ReadStore,
};
pub use graph::{
    AssemblyGraph, EdgeId, EdgeRef, EdgeSequence, GraphEdge, GraphNode, NodeRef, SeqId,
};
pub use paths::{path_index, unbranching_paths, UnbranchingPath};
