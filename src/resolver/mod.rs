//! Repeat resolution over the assembly graph.
//!
//! The resolver borrows the graph, the read store and the alignment set for
//! the duration of a session and runs single-threaded with respect to the
//! graph it mutates. The top-level operations are [`RepeatResolver::find_repeats`],
//! [`RepeatResolver::resolve_repeats`], [`RepeatResolver::resolve_simple_repeats`]
//! and [`RepeatResolver::finalize_graph`]; an external driver invokes them in
//! that order.

mod classify;
mod cleanup;
pub mod connections;
pub mod matching;
mod simple;

use ahash::AHashMap;
use tracing::debug;

use crate::core::alignment::{AlignmentSet, ReadStore};
use crate::core::graph::{AssemblyGraph, EdgeId};
use crate::core::paths::unbranching_paths;
use crate::utils::configuration::ResolverConfig;

use connections::Connection;

/// A repeat resolution session over borrowed collaborators.
pub struct RepeatResolver<'a> {
    graph: &'a mut AssemblyGraph,
    reads: &'a ReadStore,
    alignments: &'a mut AlignmentSet,
    config: ResolverConfig,
    unique_cov_threshold: i64,
    /// Coverage to subtract from repeat interiors, deferred until
    /// finalization. Owned by the session; reset only on request.
    subtracted_coverage: AHashMap<EdgeId, i64>,
}

impl<'a> RepeatResolver<'a> {
    pub fn new(
        graph: &'a mut AssemblyGraph,
        reads: &'a ReadStore,
        alignments: &'a mut AlignmentSet,
        unique_cov_threshold: i64,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            graph,
            reads,
            alignments,
            config: config.clone(),
            unique_cov_threshold,
            subtracted_coverage: AHashMap::new(),
        }
    }

    /// One round of repeat resolution: extract bridging connections, solve
    /// the matching, rewire the graph and clean up. Single-shot by
    /// contract; a driver that wants a fixed point calls it again.
    /// Returns the number of resolved repeats.
    pub fn resolve_repeats(&mut self) -> usize {
        let min_support = self.config.min_repeat_res_support;
        let connections = self.get_connections();
        let outcome = self.resolve_connections(&connections, min_support);
        self.clear_resolved_repeats();
        self.alignments.update(self.graph);
        outcome.resolved
    }

    /// Undoes over-aggressive repeat marks on long high-confidence paths and
    /// applies the deferred coverage subtractions.
    pub fn finalize_graph(&mut self) {
        let paths = unbranching_paths(self.graph);
        for path in &paths {
            if !path.id.is_forward() {
                continue;
            }
            let high_coverage = path.mean_coverage > self.unique_cov_threshold;
            let front = path.edges[0];
            if !self.graph.edge(front).self_complement
                && self.graph.edge(front).repetitive
                && path.length > self.config.unique_edge_length
                && (self.config.uneven_coverage || !high_coverage)
            {
                for &e in &path.edges {
                    self.graph.edge_mut(e).repetitive = false;
                    let compl = self.graph.complement_edge(e);
                    self.graph.edge_mut(compl).repetitive = false;
                }
                debug!(
                    "fixed: {} {} {}",
                    path.edges_str(self.graph),
                    path.length,
                    path.mean_coverage
                );
            }
        }

        // apply coverage subtractions deferred during resolution
        for path in &paths {
            if path.is_looped(self.graph) {
                continue;
            }
            for &e in &path.edges {
                let id = self.graph.edge(e).edge_id;
                if let Some(&sub) = self.subtracted_coverage.get(&id) {
                    let edge = self.graph.edge_mut(e);
                    edge.mean_coverage = (edge.mean_coverage - sub).max(0);
                }
            }
        }
    }

    /// Clears the deferred coverage map. Whether to call this between
    /// resolution rounds is the driver's choice.
    pub fn reset_subtracted_coverage(&mut self) {
        self.subtracted_coverage.clear();
    }

    pub fn subtracted_coverage(&self) -> &AHashMap<EdgeId, i64> {
        &self.subtracted_coverage
    }

    /// Materializes one selected connection: a fresh id pair, an edge
    /// sequence over the bridging read span, and a path separation on both
    /// strands. Interior edges defer a coverage subtraction.
    fn rewire_connection(&mut self, conn: &Connection) {
        let new_id = self.graph.new_edge_id();
        let span = conn.read_seq;
        let name = format!(
            "edge_{}_0_{}_{}_{}",
            new_id.signed_id(),
            self.reads.description(span.read),
            span.start,
            span.end
        );
        let read_len = self.reads.read_len(span.read) as i32;
        let seq = self
            .graph
            .add_edge_sequence(span.read, read_len, span.start, span.len(), &name);

        let front = conn.path[0];
        let back = *conn.path.last().unwrap();
        let deferred =
            (self.graph.edge(front).mean_coverage + self.graph.edge(back).mean_coverage) / 2;
        let compl_path = self.graph.complement_path(&conn.path);
        for path in [&conn.path, &compl_path] {
            for &e in &path[1..path.len() - 1] {
                let id = self.graph.edge(e).edge_id;
                *self.subtracted_coverage.entry(id).or_insert(0) += deferred;
            }
        }

        self.graph.separate_path(&conn.path, seq, new_id);
        self.graph
            .separate_path(&compl_path, seq.complement(), new_id.rc());
    }
}
