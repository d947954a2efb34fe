//! Read storage and read-to-graph alignments.
//!
//! The aligner itself is an external collaborator; this module holds the
//! materialized form the resolver consumes: per-read chains of edge hits
//! with their overlap coordinates, plus an index from edges to the
//! alignments that traverse them.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};

use crate::core::graph::{AssemblyGraph, EdgeId};

/// Signed identity of a read: index plus strand bit, complement is a bit
/// flip. Mirrors [`EdgeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadId(u64);

impl ReadId {
    pub fn new(index: u64, forward: bool) -> Self {
        let mut value = index << 1;
        if !forward {
            value |= 1;
        }
        ReadId(value)
    }

    pub fn rc(self) -> Self {
        ReadId(self.0 ^ 1)
    }

    pub fn is_forward(self) -> bool {
        self.0 & 1 == 0
    }

    pub fn index(self) -> u64 {
        self.0 >> 1
    }
}

impl fmt::Display for ReadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strand = if self.is_forward() { '+' } else { '-' };
        write!(f, "read{}{}", self.index(), strand)
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base {
            b'A' | b'a' => b'T',
            b'T' | b't' => b'A',
            b'C' | b'c' => b'G',
            b'G' | b'g' => b'C',
            _ => base,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

/// Owned read sequences, addressed by signed [`ReadId`]. The reverse strand
/// is served on demand.
#[derive(Debug, Default)]
pub struct ReadStore {
    reads: Vec<ReadRecord>,
}

impl ReadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&mut self, name: impl Into<String>, seq: Vec<u8>) -> ReadId {
        self.reads.push(ReadRecord {
            name: name.into(),
            seq,
        });
        ReadId::new(self.reads.len() as u64 - 1, true)
    }

    /// Loads reads from a FASTA file.
    pub fn from_fasta(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open read file {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut store = ReadStore::new();
        let mut name: Option<String> = None;
        let mut seq: Vec<u8> = Vec::new();
        for line in reader.lines() {
            let line = line.context("failed to read FASTA line")?;
            if let Some(header) = line.strip_prefix('>') {
                if let Some(prev) = name.take() {
                    store.add_read(prev, std::mem::take(&mut seq));
                }
                name = Some(header.trim().to_string());
            } else {
                seq.extend(line.trim().as_bytes());
            }
        }
        if let Some(prev) = name {
            store.add_read(prev, seq);
        }
        Ok(store)
    }

    pub fn get_seq(&self, id: ReadId) -> Cow<'_, [u8]> {
        let record = &self.reads[id.index() as usize];
        if id.is_forward() {
            Cow::Borrowed(&record.seq)
        } else {
            Cow::Owned(reverse_complement(&record.seq))
        }
    }

    pub fn description(&self, id: ReadId) -> &str {
        &self.reads[id.index() as usize].name
    }

    pub fn read_len(&self, id: ReadId) -> usize {
        self.reads[id.index() as usize].seq.len()
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

/// Coordinates of one edge hit: `cur_*` index the read, `ext_*` index the
/// edge sequence the read was aligned against.
#[derive(Debug, Clone, Copy)]
pub struct Overlap {
    pub cur_id: ReadId,
    pub cur_begin: i32,
    pub cur_end: i32,
    pub cur_len: i32,
    pub ext_begin: i32,
    pub ext_end: i32,
    pub ext_len: i32,
}

impl Overlap {
    /// Covered range on the read.
    pub fn cur_range(&self) -> i32 {
        self.cur_end - self.cur_begin
    }
}

/// One edge hit of a read alignment.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentRecord {
    pub edge: EdgeId,
    pub overlap: Overlap,
}

/// Hits of one read, ordered along the read.
pub type GraphAlignment = Vec<AlignmentRecord>;

/// All read-to-graph alignments, materialized before the resolver runs.
#[derive(Debug, Default)]
pub struct AlignmentSet {
    pub alignments: Vec<GraphAlignment>,
}

impl AlignmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alignment: GraphAlignment) {
        self.alignments.push(alignment);
    }

    /// Maps every edge to the alignments traversing it. An alignment is
    /// listed once per edge even when it hits the edge several times.
    pub fn make_index(&self) -> AHashMap<EdgeId, Vec<usize>> {
        let mut index: AHashMap<EdgeId, Vec<usize>> = AHashMap::new();
        for (i, alignment) in self.alignments.iter().enumerate() {
            let mut seen: AHashSet<EdgeId> = AHashSet::new();
            for record in alignment {
                if seen.insert(record.edge) {
                    index.entry(record.edge).or_default().push(i);
                }
            }
        }
        index
    }

    /// Refresh after graph mutation: drops hits whose edges left the graph
    /// and prunes alignments that no longer chain two edges. Realignment
    /// proper is the aligner's job.
    pub fn update(&mut self, graph: &AssemblyGraph) {
        for alignment in &mut self.alignments {
            alignment.retain(|record| graph.edge_by_id(record.edge).is_some());
        }
        self.alignments.retain(|alignment| alignment.len() >= 2);
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }
}
