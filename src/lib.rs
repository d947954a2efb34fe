//! # RepeatForge - Repeat Resolution for Long-Read Assembly Graphs
//!
//! The repeat resolution core of a long-read genome assembler. Takes an
//! assembly graph and a set of read-to-graph alignments, classifies edges
//! into unique and repetitive, and rewires as many repeat crossings as the
//! reads support: collapsed repeat instances are duplicated so that each
//! copy carries the unique flanking context implied by the reads.
//!
//! The crossings are committed simultaneously through a maximum-weight
//! matching over the transition graph of unique anchor identities; a local
//! union-find fallback handles short repeats with matching in/out
//! multiplicity. The graph stays closed under reverse-complement throughout.

pub mod core;
pub mod resolver;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::core::alignment::{
    reverse_complement, AlignmentRecord, AlignmentSet, GraphAlignment, Overlap, ReadId,
    ReadStore,
};
pub use crate::core::graph::{
    AssemblyGraph, EdgeId, EdgeRef, EdgeSequence, GraphEdge, GraphNode, NodeRef, SeqId,
};
pub use crate::core::paths::{path_index, unbranching_paths, UnbranchingPath};
pub use crate::resolver::connections::{Connection, ReadSpan};
pub use crate::resolver::matching::MatchingOutcome;
pub use crate::resolver::RepeatResolver;
pub use crate::utils::configuration::{ResolverConfig, ResolverError};

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;
