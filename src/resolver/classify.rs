//! Classification of edges into unique and repetitive.
//!
//! Works on unbranching paths rather than single edges; every marking made
//! on a forward-strand path is mirrored to its reverse-complement sibling.

use ahash::AHashMap;
use tracing::debug;

use crate::core::alignment::AlignmentSet;
use crate::core::graph::{AssemblyGraph, EdgeRef};
use crate::core::paths::{path_index, unbranching_paths, UnbranchingPath};

use super::RepeatResolver;

/// Loops shorter than this may contain unglued tandem repeat variation.
const MIN_RELIABLE_LOOP: usize = 5_000;

/// Reads required to call a tandem traversal.
const NEEDED_TANDEM_READS: usize = 5;

impl RepeatResolver<'_> {
    /// Classifies all edges into unique and repetitive based on coverage,
    /// topology and read alignments.
    pub fn find_repeats(&mut self) {
        debug!("finding repeats");
        let aln_index = self.alignments.make_index();

        // all edges are unique at the beginning
        let all_edges: Vec<EdgeRef> = self.graph.iter_edges().collect();
        for &e in &all_edges {
            self.graph.edge_mut(e).repetitive = false;
        }

        let paths = unbranching_paths(self.graph);
        let index = path_index(&paths);
        let compl_of = |i: usize| index.get(&paths[i].id.rc()).copied().unwrap_or(i);
        let alns_of = |graph: &AssemblyGraph, e: EdgeRef| -> Vec<usize> {
            aln_index
                .get(&graph.edge(e).edge_id)
                .cloned()
                .unwrap_or_default()
        };

        // simpler conditions that need no read extension evidence
        for i in 0..paths.len() {
            if !paths[i].id.is_forward() {
                continue;
            }

            // under uniform coverage, high coverage means collapsed copies
            if !self.config.uneven_coverage
                && paths[i].mean_coverage > self.unique_cov_threshold
            {
                mark_path(self.graph, &paths[i]);
                mark_path(self.graph, &paths[compl_of(i)]);
                debug!(
                    "high-cov: {} {} {}",
                    paths[i].edges_str(self.graph),
                    paths[i].length,
                    paths[i].mean_coverage
                );
            }

            // short loops may contain unglued tandem repeat variation
            if paths[i].is_looped(self.graph) && paths[i].length < MIN_RELIABLE_LOOP {
                mark_path(self.graph, &paths[i]);
                mark_path(self.graph, &paths[compl_of(i)]);
                debug!("short-loop: {}", paths[i].edges_str(self.graph));
            }

            if paths[i]
                .edges
                .iter()
                .any(|&e| self.graph.edge(e).self_complement)
            {
                mark_path(self.graph, &paths[i]);
                mark_path(self.graph, &paths[compl_of(i)]);
                debug!("self-compl: {}", paths[i].edges_str(self.graph));
            }

            // haplotype bubbles would confuse the anchor selection
            if paths[i]
                .edges
                .iter()
                .any(|&e| self.graph.edge(e).alt_haplotype)
            {
                mark_path(self.graph, &paths[i]);
                mark_path(self.graph, &paths[compl_of(i)]);
                debug!("haplo-edge: {}", paths[i].edges_str(self.graph));
            }

            if paths[i]
                .edges
                .iter()
                .any(|&e| self.graph.edge(e).unreliable)
            {
                mark_path(self.graph, &paths[i]);
                mark_path(self.graph, &paths[compl_of(i)]);
                debug!("unreliable: {}", paths[i].edges_str(self.graph));
            }

            // edges traversed multiple times within single reads
            for &e in &paths[i].edges {
                if !self.graph.edge(e).repetitive
                    && check_for_tandem_copies(
                        self.graph,
                        self.alignments,
                        &alns_of(self.graph, e),
                        e,
                    )
                {
                    mark_path(self.graph, &paths[i]);
                    mark_path(self.graph, &paths[compl_of(i)]);
                    debug!("tandem: {}", paths[i].edges_str(self.graph));
                    break;
                }
            }
        }

        // then use the read alignments; short paths go first since their
        // marks constrain the longer ones
        let mut order: Vec<usize> = (0..paths.len()).collect();
        order.sort_by_key(|&i| paths[i].length);

        // with uneven coverage some small edges only become visible once
        // the mosaic repeats around them are marked, so run twice
        let num_iters = if self.config.uneven_coverage { 2 } else { 1 };
        for iteration in 0..num_iters {
            debug!("repeat detection iteration {}", iteration + 1);
            for &i in &order {
                if !paths[i].id.is_forward() {
                    continue;
                }
                if self.graph.edge(paths[i].edges[0]).repetitive {
                    continue;
                }

                let right_anchor = *paths[i].edges.last().unwrap();
                let compl_anchor = *paths[compl_of(i)].edges.last().unwrap();
                let right_repeat = check_by_read_extension(
                    self.graph,
                    self.alignments,
                    &alns_of(self.graph, right_anchor),
                    right_anchor,
                    self.config.out_paths_ratio,
                );
                let left_repeat = check_by_read_extension(
                    self.graph,
                    self.alignments,
                    &alns_of(self.graph, compl_anchor),
                    compl_anchor,
                    self.config.out_paths_ratio,
                );
                if right_repeat || left_repeat {
                    mark_path(self.graph, &paths[i]);
                    mark_path(self.graph, &paths[compl_of(i)]);
                    debug!(
                        "mult: {} {} {} ({},{})",
                        paths[i].edges_str(self.graph),
                        paths[i].length,
                        paths[i].mean_coverage,
                        left_repeat,
                        right_repeat
                    );
                }
            }
        }

        propagate_repetitive(self.graph);
    }
}

fn mark_path(graph: &mut AssemblyGraph, path: &UnbranchingPath) {
    for &e in &path.edges {
        graph.edge_mut(e).repetitive = true;
    }
}

/// An edge is tandem-repetitive when enough reads traverse it more than
/// once with both copies fully covered (alignment endpoints excluded).
pub(crate) fn check_for_tandem_copies(
    graph: &AssemblyGraph,
    alignments: &AlignmentSet,
    aln_ids: &[usize],
    check_edge: EdgeRef,
) -> bool {
    let mut read_evidence = 0usize;
    for &ai in aln_ids {
        let aln = &alignments.alignments[ai];
        if aln.len() < 3 {
            continue;
        }
        let mut copies = 0;
        for record in &aln[1..aln.len() - 1] {
            if graph.edge_by_id(record.edge) == Some(check_edge) {
                copies += 1;
            }
        }
        if copies > 1 {
            read_evidence += 1;
        }
    }
    read_evidence >= NEEDED_TANDEM_READS
}

/// Follows every alignment through `check_edge` to the first unique edge
/// beyond it. When the extensions disagree on more than one well-supported
/// continuation, the edge cannot be a unique anchor.
pub(crate) fn check_by_read_extension(
    graph: &AssemblyGraph,
    alignments: &AlignmentSet,
    aln_ids: &[usize],
    check_edge: EdgeRef,
    out_paths_ratio: u32,
) -> bool {
    let check_id = graph.edge(check_edge).edge_id;
    let mut out_flanks: AHashMap<EdgeRef, Vec<i32>> = AHashMap::new();
    let mut out_spans: AHashMap<EdgeRef, Vec<i32>> = AHashMap::new();
    let mut lower_bound = 0i32;

    for &ai in aln_ids {
        let aln = &alignments.alignments[ai];
        if aln.is_empty() {
            continue;
        }
        let mut passed_start = false;
        let mut left_flank = 0i32;
        let mut left_coord = 0i32;
        let mut found_unique = false;
        for record in aln {
            let Some(edge) = graph.edge_by_id(record.edge) else {
                continue;
            };
            if !passed_start && edge == check_edge {
                passed_start = true;
                left_flank = record.overlap.cur_end - aln[0].overlap.cur_begin;
                left_coord = record.overlap.cur_end;
                continue;
            }
            if passed_start && !graph.edge(edge).repetitive {
                if record.edge != check_id && record.edge != check_id.rc() {
                    let right_flank =
                        aln.last().unwrap().overlap.cur_end - record.overlap.cur_begin;
                    let aln_span = record.overlap.cur_begin - left_coord;
                    out_flanks
                        .entry(edge)
                        .or_default()
                        .push(left_flank.min(right_flank));
                    out_spans.entry(edge).or_default().push(aln_span);
                }
                found_unique = true;
                break;
            }
        }
        if !found_unique {
            lower_bound = lower_bound.max(aln.last().unwrap().overlap.cur_begin - left_coord);
        }
    }

    let max_support = out_flanks.values().map(Vec::len).max().unwrap_or(0) as i32;
    let mut min_support = max_support / out_paths_ratio as i32;
    // once any extension is supported by more than one read, a single
    // stray read is never enough for an alternative
    if max_support > 1 {
        min_support = min_support.max(1);
    }

    let unique_mult = out_flanks
        .values()
        .filter(|flanks| flanks.len() as i32 > min_support)
        .count();

    if unique_mult > 1 {
        debug!(
            "extension fork at {}: {} alignments, min span {}",
            check_id,
            aln_ids.len(),
            lower_bound
        );
        let mut forks: Vec<EdgeRef> = out_flanks.keys().copied().collect();
        forks.sort_unstable();
        for e in forks {
            let flanks = &out_flanks[&e];
            let max_flank = flanks.iter().copied().max().unwrap_or(0);
            let min_span = out_spans[&e].iter().copied().min().unwrap_or(0);
            let rep = if graph.edge(e).repetitive { "R" } else { " " };
            let looped = if graph.edge(e).is_looped() { "L" } else { " " };
            let tip = if graph.node(graph.edge(e).node_right).out_edges.is_empty() {
                "T"
            } else {
                " "
            };
            debug!(
                "  {} {} {} {} num:{} flank:{} span:{}",
                rep,
                looped,
                tip,
                graph.edge(e).edge_id,
                flanks.len(),
                max_flank,
                min_span
            );
        }
        return true;
    }
    false
}

/// Extends repetitiveness through pass-through junctions and haplotype
/// sibling links, in both directions, to a fixed point.
pub(crate) fn propagate_repetitive(graph: &mut AssemblyGraph) {
    let all_edges: Vec<EdgeRef> = graph.iter_edges().collect();
    for e in all_edges {
        if !graph.edge(e).repetitive {
            continue;
        }

        let mut cur = e;
        loop {
            graph.edge_mut(cur).repetitive = true;
            let right = graph.edge(cur).node_right;
            let node = graph.node(right);
            if node.in_edges.len() == 1
                && node.out_edges.len() == 1
                && !graph.edge(node.out_edges[0]).repetitive
            {
                cur = node.out_edges[0];
            } else if let Some(link) = graph
                .edge(cur)
                .right_link
                .filter(|&l| !graph.edge(l).repetitive)
            {
                cur = link;
            } else {
                break;
            }
        }

        let mut cur = e;
        loop {
            graph.edge_mut(cur).repetitive = true;
            let left = graph.edge(cur).node_left;
            let node = graph.node(left);
            if node.in_edges.len() == 1
                && node.out_edges.len() == 1
                && !graph.edge(node.in_edges[0]).repetitive
            {
                cur = node.in_edges[0];
            } else if let Some(link) = graph
                .edge(cur)
                .left_link
                .filter(|&l| !graph.edge(l).repetitive)
            {
                cur = link;
            } else {
                break;
            }
        }
    }
}
