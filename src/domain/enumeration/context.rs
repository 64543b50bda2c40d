use bit_set::BitSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::domain::graph::{Graph, Vertex};
use crate::error::{Error, Result};

/// Receives every connected induced subgraph found by an enumerator, as vertex labels in
/// canonical order.
pub trait SubgraphSink {
    fn accept(&mut self, labels: &[String]) -> Result<()>;

    /// Called once after the last subgraph.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes the subgraph corpus: one subgraph per line, labels separated by a single space.
pub struct CorpusWriter<W: Write> {
    out: BufWriter<W>,
    written: u64,
}

impl CorpusWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(CorpusWriter::new(File::create(path)?))
    }
}

impl<W: Write> CorpusWriter<W> {
    pub fn new(out: W) -> Self {
        CorpusWriter { out: BufWriter::new(out), written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and hands back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|e| Error::IoError(e.into_error()))
    }
}

impl<W: Write> SubgraphSink for CorpusWriter<W> {
    fn accept(&mut self, labels: &[String]) -> Result<()> {
        writeln!(self.out, "{}", labels.join(" "))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps every subgraph in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub subgraphs: Vec<Vec<String>>,
}

impl SubgraphSink for CollectingSink {
    fn accept(&mut self, labels: &[String]) -> Result<()> {
        self.subgraphs.push(labels.to_vec());
        Ok(())
    }
}

/// Wall-clock limit of an enumeration run; `None` means unlimited.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Option<Duration>) -> Self {
        Deadline { at: budget.map(|b| Instant::now() + b) }
    }

    pub fn unlimited() -> Self {
        Deadline { at: None }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Mutable state shared by all recursion levels of one enumeration run.
pub(crate) struct SearchContext<'a> {
    pub(crate) graph: &'a Graph,
    sink: &'a mut dyn SubgraphSink,
    deadline: Deadline,
    last_emission: Instant,
    pub(crate) max_delay: Duration,
    pub(crate) nodes: u64,
    pub(crate) count: u64,
    pub(crate) timed_out: bool,

    /// Start subgraphs given up on after hitting a memory bound.
    pub(crate) abandoned_starts: u64,
    pub(crate) error: Option<Error>,
}

impl<'a> SearchContext<'a> {
    pub(crate) fn new(graph: &'a Graph, sink: &'a mut dyn SubgraphSink, deadline: Deadline) -> Self {
        SearchContext {
            graph,
            sink,
            deadline,
            last_emission: Instant::now(),
            max_delay: Duration::ZERO,
            nodes: 0,
            count: 0,
            timed_out: false,
            abandoned_starts: 0,
            error: None,
        }
    }

    /// Checks the deadline. Once it has passed, every later call answers `true` as well, so the
    /// whole recursion unwinds.
    pub(crate) fn should_stop(&mut self) -> bool {
        if self.stopped() {
            return true;
        }
        if self.deadline.expired() {
            self.timed_out = true;
            self.record_gap(Instant::now());
            return true;
        }
        false
    }

    /// Stop flag without another clock read.
    pub(crate) fn stopped(&self) -> bool {
        self.timed_out || self.error.is_some()
    }

    pub(crate) fn visit(&mut self) {
        self.nodes += 1;
    }

    pub(crate) fn emit(&mut self, vertices: &[Vertex]) {
        let labels = self.graph.canonical_labels(vertices);
        if let Err(e) = self.sink.accept(&labels) {
            log::error!("Subgraph sink failed: {}", e);
            self.error = Some(e);
            return;
        }
        self.count += 1;

        let now = Instant::now();
        self.record_gap(now);
        self.last_emission = now;
    }

    pub(crate) fn emit_set(&mut self, vertices: &BitSet) {
        let collected: Vec<Vertex> = vertices.iter().collect();
        self.emit(&collected);
    }

    pub(crate) fn finish(&mut self) -> Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => self.sink.finish(),
        }
    }

    fn record_gap(&mut self, now: Instant) {
        let gap = now.saturating_duration_since(self.last_emission);
        if gap > self.max_delay {
            self.max_delay = gap;
        }
    }
}
