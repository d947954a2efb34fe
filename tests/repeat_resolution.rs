//! End-to-end repeat resolution scenarios on small synthetic graphs.

use repeat_forge::{
    AlignmentRecord, AlignmentSet, AssemblyGraph, EdgeId, EdgeRef, Overlap, ReadId, ReadStore,
    RepeatResolver, ResolverConfig,
};

fn read_seq(len: usize) -> Vec<u8> {
    b"ACGT".iter().copied().cycle().take(len).collect()
}

fn hit(
    edge: EdgeId,
    read: ReadId,
    begin: i32,
    end: i32,
    ext: (i32, i32, i32),
) -> AlignmentRecord {
    AlignmentRecord {
        edge,
        overlap: Overlap {
            cur_id: read,
            cur_begin: begin,
            cur_end: end,
            cur_len: 300,
            ext_begin: ext.0,
            ext_end: ext.1,
            ext_len: ext.2,
        },
    }
}

fn assert_rc_symmetric(graph: &AssemblyGraph) {
    for e in graph.iter_edges() {
        let c = graph.complement_edge(e);
        assert_eq!(graph.edge(e).repetitive, graph.edge(c).repetitive);
        assert_eq!(graph.edge(e).resolved, graph.edge(c).resolved);
    }
}

/// Two unique anchors A and B around a repeat R, with sibling edges C
/// (into the left junction) and B2 (out of the right junction) so that
/// both junctions bifurcate. Reads bridge A..R..B and A..R..B2.
struct BridgedRepeat {
    graph: AssemblyGraph,
    reads: ReadStore,
    alignments: AlignmentSet,
    a: EdgeRef,
    c: EdgeRef,
    r: EdgeRef,
    b: EdgeRef,
    j1: usize,
}

fn bridged_repeat(reads_to_b: usize, reads_to_b2: usize) -> BridgedRepeat {
    let mut graph = AssemblyGraph::new();
    let na = graph.add_node();
    let nc = graph.add_node();
    let j1 = graph.add_node();
    let j2 = graph.add_node();
    let nb = graph.add_node();
    let nb2 = graph.add_node();
    let rna = graph.add_node();
    let rnc = graph.add_node();
    let rj1 = graph.add_node();
    let rj2 = graph.add_node();
    let rnb = graph.add_node();
    let rnb2 = graph.add_node();

    let (a, _) = graph.add_edge_pair(na, j1, rj1, rna, 20_000, 30);
    let (c, _) = graph.add_edge_pair(nc, j1, rj1, rnc, 20_000, 30);
    let (r, _) = graph.add_edge_pair(j1, j2, rj2, rj1, 2_000, 60);
    let (b, _) = graph.add_edge_pair(j2, nb, rnb, rj2, 20_000, 30);
    let (b2, _) = graph.add_edge_pair(j2, nb2, rnb2, rj2, 20_000, 30);

    let r_compl = graph.complement_edge(r);
    graph.edge_mut(r).repetitive = true;
    graph.edge_mut(r_compl).repetitive = true;

    let id_a = graph.edge(a).edge_id;
    let id_r = graph.edge(r).edge_id;
    let id_b = graph.edge(b).edge_id;
    let id_b2 = graph.edge(b2).edge_id;

    let mut reads = ReadStore::new();
    let mut alignments = AlignmentSet::new();
    for i in 0..reads_to_b + reads_to_b2 {
        let rid = reads.add_read(format!("read_{i}"), read_seq(300));
        let target = if i < reads_to_b { id_b } else { id_b2 };
        alignments.push(vec![
            hit(id_a, rid, 0, 100, (19_900, 20_000, 20_000)),
            hit(id_r, rid, 100, 200, (0, 2_000, 2_000)),
            hit(target, rid, 200, 300, (0, 100, 20_000)),
        ]);
    }

    BridgedRepeat {
        graph,
        reads,
        alignments,
        a,
        c,
        r,
        b,
        j1,
    }
}

#[test]
fn s1_two_anchor_resolution() {
    let mut fx = bridged_repeat(10, 0);
    let config = ResolverConfig::default();
    let resolved = {
        let mut resolver =
            RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
        resolver.resolve_repeats()
    };
    assert_eq!(resolved, 1);

    // one new edge pair carries the median bridging read
    let new_id = EdgeId::new(5, true);
    let new_edge = fx.graph.edge_by_id(new_id).expect("bridging edge");
    assert!(fx.graph.edge_by_id(new_id.rc()).is_some());
    let seq = fx.graph.edge(new_edge).sequences[0];
    let meta = fx.graph.edge_sequence(seq);
    assert!(meta.name.contains("read_5"));
    assert_eq!(meta.len, 100);

    // the anchor was rerouted away from the junction; the repeat copy
    // stays there for other crossings, marked resolved on both strands
    assert_eq!(fx.graph.node(fx.j1).in_edges, vec![fx.c]);
    assert!(fx.graph.edge(fx.r).resolved);
    assert!(fx.graph.edge(fx.graph.complement_edge(fx.r)).resolved);
    assert!(!fx.graph.edge(fx.a).resolved);
    assert_rc_symmetric(&fx.graph);
}

#[test]
fn s2_confidence_floor() {
    // 16 of 18 links support A<->B2, but a strict floor rejects the pair
    let mut fx = bridged_repeat(2, 8);
    let config = ResolverConfig::default();
    let edges_before = fx.graph.edge_count();
    let outcome = {
        let mut resolver =
            RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
        let connections = resolver.get_connections();
        resolver.resolve_connections(&connections, 0.95)
    };
    assert_eq!(outcome.resolved, 0);
    assert_eq!(outcome.unresolved, 1);
    assert_eq!(fx.graph.edge_count(), edges_before);

    // the default floor accepts the same pair
    let mut fx = bridged_repeat(2, 8);
    let outcome = {
        let mut resolver =
            RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
        let connections = resolver.get_connections();
        resolver.resolve_connections(&connections, config.min_repeat_res_support)
    };
    assert_eq!(outcome.resolved, 1);
    assert_rc_symmetric(&fx.graph);
}

#[test]
fn s6_resolved_anchors_make_no_connection() {
    let mut fx = bridged_repeat(5, 0);
    for e in [fx.a, fx.b] {
        let compl = fx.graph.complement_edge(e);
        fx.graph.edge_mut(e).resolved = true;
        fx.graph.edge_mut(compl).resolved = true;
    }
    let config = ResolverConfig::default();
    let resolver = RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
    assert!(resolver.get_connections().is_empty());
}

#[test]
fn connections_come_with_reverse_complement_twins() {
    let mut fx = bridged_repeat(3, 0);
    let config = ResolverConfig::default();
    let resolver = RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
    let connections = resolver.get_connections();
    drop(resolver);
    assert_eq!(connections.len(), 6);
    for pair in connections.chunks(2) {
        let forward = &pair[0];
        let twin = &pair[1];
        assert_eq!(forward.read_seq.read.rc(), twin.read_seq.read);
        assert_eq!(twin.read_seq.start, 300 - forward.read_seq.end - 1);
        assert_eq!(twin.read_seq.end, 300 - forward.read_seq.start - 1);
        assert_eq!(forward.flank_score, twin.flank_score);
        assert_eq!(twin.path, fx.graph.complement_path(&forward.path));
    }
}

#[test]
fn no_connections_leaves_graph_untouched() {
    let mut fx = bridged_repeat(0, 0);
    let nodes_before = fx.graph.node_count();
    let edges_before = fx.graph.edge_count();
    let config = ResolverConfig::default();
    let resolved = {
        let mut resolver =
            RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
        resolver.resolve_repeats()
    };
    assert_eq!(resolved, 0);
    assert_eq!(fx.graph.node_count(), nodes_before);
    assert_eq!(fx.graph.edge_count(), edges_before);
}

#[test]
fn find_repeats_is_idempotent() {
    let mut fx = bridged_repeat(10, 0);
    let config = ResolverConfig::default();
    let mut resolver =
        RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 40, &config);
    resolver.find_repeats();
    drop(resolver);
    let first: Vec<(EdgeId, bool)> = fx
        .graph
        .iter_edges()
        .map(|e| (fx.graph.edge(e).edge_id, fx.graph.edge(e).repetitive))
        .collect();
    // the repeat is re-derived from coverage, the anchors stay unique
    assert!(fx.graph.edge(fx.r).repetitive);
    assert!(!fx.graph.edge(fx.a).repetitive);
    assert!(!fx.graph.edge(fx.b).repetitive);

    let mut resolver =
        RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 40, &config);
    resolver.find_repeats();
    drop(resolver);
    let second: Vec<(EdgeId, bool)> = fx
        .graph
        .iter_edges()
        .map(|e| (fx.graph.edge(e).edge_id, fx.graph.edge(e).repetitive))
        .collect();
    assert_eq!(first, second);
    assert_rc_symmetric(&fx.graph);
}

#[test]
fn short_loop_boundary_sits_at_5000() {
    let mut graph = AssemblyGraph::new();
    let a = graph.add_node();
    let b = graph.add_node();
    let c = graph.add_node();
    let d = graph.add_node();
    let (short_loop, _) = graph.add_edge_pair(a, a, b, b, 4_999, 5);
    let (long_loop, _) = graph.add_edge_pair(c, c, d, d, 5_000, 5);

    let reads = ReadStore::new();
    let mut alignments = AlignmentSet::new();
    let config = ResolverConfig::default();
    let mut resolver = RepeatResolver::new(&mut graph, &reads, &mut alignments, 1_000, &config);
    resolver.find_repeats();
    drop(resolver);

    assert!(graph.edge(short_loop).repetitive);
    assert!(!graph.edge(long_loop).repetitive);
    assert_rc_symmetric(&graph);
}

#[test]
fn finalize_unmarks_long_trusted_paths() {
    let mut graph = AssemblyGraph::new();
    let edge_pair = |graph: &mut AssemblyGraph, length, coverage| {
        let l = graph.add_node();
        let r = graph.add_node();
        let rl = graph.add_node();
        let rr = graph.add_node();
        let (e, _) = graph.add_edge_pair(l, r, rr, rl, length, coverage);
        let compl = graph.complement_edge(e);
        graph.edge_mut(e).repetitive = true;
        graph.edge_mut(compl).repetitive = true;
        e
    };
    let long_normal = edge_pair(&mut graph, 60_000, 30);
    let short = edge_pair(&mut graph, 10_000, 30);
    let long_high_cov = edge_pair(&mut graph, 60_000, 80);

    let reads = ReadStore::new();
    let mut alignments = AlignmentSet::new();
    let config = ResolverConfig::default();
    let mut resolver = RepeatResolver::new(&mut graph, &reads, &mut alignments, 40, &config);
    resolver.finalize_graph();
    drop(resolver);

    // long and coverage-plausible: trusted as unique again
    assert!(!graph.edge(long_normal).repetitive);
    // too short to trust
    assert!(graph.edge(short).repetitive);
    // high coverage under a uniform assembly stays suspicious
    assert!(graph.edge(long_high_cov).repetitive);
    assert_rc_symmetric(&graph);
}

#[test]
fn finalize_applies_deferred_coverage_once_per_call() {
    let mut fx = bridged_repeat(10, 0);
    let config = ResolverConfig::default();
    let mut resolver =
        RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
    assert_eq!(resolver.resolve_repeats(), 1);

    // the interior deferred the mean anchor coverage
    resolver.finalize_graph();
    drop(resolver);
    assert_eq!(fx.graph.edge(fx.r).mean_coverage, 30);
}

#[test]
fn finalize_without_reset_subtracts_again_and_clamps() {
    let mut fx = bridged_repeat(10, 0);
    let config = ResolverConfig::default();
    let mut resolver =
        RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
    assert_eq!(resolver.resolve_repeats(), 1);
    resolver.finalize_graph();
    resolver.finalize_graph();
    resolver.finalize_graph();
    drop(resolver);
    // 60 -> 30 -> 0, then clamped at zero
    assert_eq!(fx.graph.edge(fx.r).mean_coverage, 0);
}

#[test]
fn finalize_after_reset_changes_nothing() {
    let mut fx = bridged_repeat(10, 0);
    let config = ResolverConfig::default();
    let mut resolver =
        RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
    assert_eq!(resolver.resolve_repeats(), 1);
    assert!(!resolver.subtracted_coverage().is_empty());
    resolver.reset_subtracted_coverage();
    resolver.finalize_graph();
    drop(resolver);
    assert_eq!(fx.graph.edge(fx.r).mean_coverage, 60);
}

/// A repeat path P with three entries and three exits; reads pair each
/// entry with exactly one exit.
struct SimpleRepeat {
    graph: AssemblyGraph,
    reads: ReadStore,
    alignments: AlignmentSet,
    inputs: Vec<EdgeRef>,
    p: EdgeRef,
}

fn simple_repeat(pair_support: [usize; 3]) -> SimpleRepeat {
    let mut graph = AssemblyGraph::new();
    let pl = graph.add_node();
    let pr = graph.add_node();
    let rpl = graph.add_node();
    let rpr = graph.add_node();

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for _ in 0..3 {
        let ni = graph.add_node();
        let rni = graph.add_node();
        let (i, _) = graph.add_edge_pair(ni, pl, rpl, rni, 15_000, 30);
        inputs.push(i);
    }
    let (p, _) = graph.add_edge_pair(pl, pr, rpr, rpl, 3_000, 90);
    for _ in 0..3 {
        let no = graph.add_node();
        let rno = graph.add_node();
        let (o, _) = graph.add_edge_pair(pr, no, rno, rpr, 15_000, 30);
        outputs.push(o);
    }

    let mut reads = ReadStore::new();
    let mut alignments = AlignmentSet::new();
    let mut read_no = 0;
    for k in 0..3 {
        let id_in = graph.edge(inputs[k]).edge_id;
        let id_p = graph.edge(p).edge_id;
        let id_out = graph.edge(outputs[k]).edge_id;
        for _ in 0..pair_support[k] {
            let rid = reads.add_read(format!("read_{read_no}"), read_seq(300));
            read_no += 1;
            alignments.push(vec![
                hit(id_in, rid, 0, 100, (14_900, 15_000, 15_000)),
                hit(id_p, rid, 100, 200, (0, 3_000, 3_000)),
                hit(id_out, rid, 200, 300, (0, 100, 15_000)),
            ]);
        }
    }

    SimpleRepeat {
        graph,
        reads,
        alignments,
        inputs,
        p,
    }
}

#[test]
fn s5_simple_repeat_with_three_pairs() {
    let mut fx = simple_repeat([5, 5, 5]);
    let id_p = fx.graph.edge(fx.p).edge_id;
    let config = ResolverConfig::default();
    let resolved = {
        let mut resolver =
            RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
        let resolved = resolver.resolve_simple_repeats();
        resolver.clear_resolved_repeats();
        resolved
    };
    assert_eq!(resolved, 3);

    // each entry continues through its own new edge
    let mut new_ids = Vec::new();
    for &input in &fx.inputs {
        let fresh = fx.graph.edge(input).node_right;
        assert_eq!(fx.graph.node(fresh).out_edges.len(), 1);
        let bridge = fx.graph.node(fresh).out_edges[0];
        new_ids.push(fx.graph.edge(bridge).edge_id);
    }
    new_ids.sort_unstable();
    new_ids.dedup();
    assert_eq!(new_ids.len(), 3);

    // the repeat itself was excised by the cleanup
    assert!(fx.graph.edge_by_id(id_p).is_none());
    assert!(fx.graph.edge_by_id(id_p.rc()).is_none());
    assert_rc_symmetric(&fx.graph);
}

#[test]
fn weakly_supported_pair_stays_unresolved() {
    let mut fx = simple_repeat([5, 5, 1]);
    let id_p = fx.graph.edge(fx.p).edge_id;
    let config = ResolverConfig::default();
    let resolved = {
        let mut resolver =
            RepeatResolver::new(&mut fx.graph, &fx.reads, &mut fx.alignments, 100, &config);
        let resolved = resolver.resolve_simple_repeats();
        resolver.clear_resolved_repeats();
        resolved
    };
    assert_eq!(resolved, 2);
    // the third entry still runs through the repeat
    assert!(fx.graph.edge_by_id(id_p).is_some());
    assert_rc_symmetric(&fx.graph);
}
