pub mod bdde;
pub mod context;
pub mod exgen;
pub mod kavosh;
pub mod pivot;
pub mod reverse;
pub mod simple;

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::domain::enumeration::context::{Deadline, SearchContext, SubgraphSink};
use crate::domain::enumeration::pivot::PivotVariant;
use crate::domain::enumeration::reverse::NeighbourRule;
use crate::domain::graph::Graph;
use crate::domain::utils::statistics::{StatParameter, StatisticEvent};
use crate::error::{Error, Result};

/// Algorithms for enumerating all connected induced subgraphs with exactly `k` vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EnumerationAlgorithm {
    ExgenOld,
    ExgenReturn,
    KavoshOld,
    KavoshReturn,
    SimpleOld,
    SimpleReturn,
    PivotOld,
    PivotImproved,
    PivotReturn,
    Bdde,
    DelayOld,
    DelayNew,
    ReverseOld,
    ReverseNew,
}

lazy_static! {
    static ref ALGORITHMS_BY_NAME: HashMap<&'static str, EnumerationAlgorithm> =
        EnumerationAlgorithm::ALL.iter().map(|a| (a.name(), *a)).collect();
}

impl EnumerationAlgorithm {
    pub const ALL: [EnumerationAlgorithm; 14] = [
        EnumerationAlgorithm::ExgenOld,
        EnumerationAlgorithm::ExgenReturn,
        EnumerationAlgorithm::KavoshOld,
        EnumerationAlgorithm::KavoshReturn,
        EnumerationAlgorithm::SimpleOld,
        EnumerationAlgorithm::SimpleReturn,
        EnumerationAlgorithm::PivotOld,
        EnumerationAlgorithm::PivotImproved,
        EnumerationAlgorithm::PivotReturn,
        EnumerationAlgorithm::Bdde,
        EnumerationAlgorithm::DelayOld,
        EnumerationAlgorithm::DelayNew,
        EnumerationAlgorithm::ReverseOld,
        EnumerationAlgorithm::ReverseNew,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EnumerationAlgorithm::ExgenOld => "exgen-old",
            EnumerationAlgorithm::ExgenReturn => "exgen-return",
            EnumerationAlgorithm::KavoshOld => "kavosh-old",
            EnumerationAlgorithm::KavoshReturn => "kavosh-return",
            EnumerationAlgorithm::SimpleOld => "simple-old",
            EnumerationAlgorithm::SimpleReturn => "simple-return",
            EnumerationAlgorithm::PivotOld => "pivot-old",
            EnumerationAlgorithm::PivotImproved => "pivot-improved",
            EnumerationAlgorithm::PivotReturn => "pivot-return",
            EnumerationAlgorithm::Bdde => "bdde",
            EnumerationAlgorithm::DelayOld => "delay-old",
            EnumerationAlgorithm::DelayNew => "delay-new",
            EnumerationAlgorithm::ReverseOld => "reverse-old",
            EnumerationAlgorithm::ReverseNew => "reverse-new",
        }
    }

    /// Breadth-first exchange searches over a DFS relabelling; they have no search tree.
    pub fn is_exchange_search(&self) -> bool {
        matches!(
            self,
            EnumerationAlgorithm::DelayOld
                | EnumerationAlgorithm::DelayNew
                | EnumerationAlgorithm::ReverseOld
                | EnumerationAlgorithm::ReverseNew
        )
    }
}

impl FromStr for EnumerationAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ALGORITHMS_BY_NAME.get(s.trim().to_lowercase().as_str()).copied().ok_or_else(|| Error::UnknownAlgorithm(s.to_string()))
    }
}

impl fmt::Display for EnumerationAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    Completed,
    TimeBudgetExceeded,
    ResourceLimit,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Termination::Completed => "completed",
            Termination::TimeBudgetExceeded => "timeout",
            Termination::ResourceLimit => "resource-limit",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct EnumerationConfig {
    pub algorithm: EnumerationAlgorithm,
    pub k: usize,

    /// Wall-clock budget; `None` runs to completion.
    pub time_limit: Option<Duration>,

    /// Upper bound on the seen-set of the delay variants.
    pub max_retained: Option<usize>,
}

impl EnumerationConfig {
    pub fn new(algorithm: EnumerationAlgorithm, k: usize) -> Self {
        EnumerationConfig { algorithm, k, time_limit: None, max_retained: None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumerationStats {
    pub algorithm: EnumerationAlgorithm,
    pub k: usize,

    /// Recursive calls that ran to completion; `None` for the exchange searches.
    pub search_tree_nodes: Option<u64>,

    /// Subgraphs discovered (delay) or dequeued (reverse) by the exchange searches.
    pub discovered: Option<u64>,
    pub subgraph_count: u64,
    pub max_delay: Duration,
    pub elapsed: Duration,
    pub termination: Termination,
}

impl EnumerationStats {
    /// A stopped run's output is a correct but incomplete prefix.
    pub fn is_partial(&self) -> bool {
        self.termination != Termination::Completed
    }

    /// Statistics row of this run.
    pub fn to_event(&self, network: &str, graph: &Graph) -> StatisticEvent {
        let mut event = StatisticEvent::new();
        event
            .set(StatParameter::LogDescription, "enumeration")
            .set(StatParameter::Network, network)
            .set(StatParameter::Algorithm, self.algorithm.name())
            .set(StatParameter::VertexCount, graph.vertex_count())
            .set(StatParameter::EdgeCount, graph.edge_count())
            .set(StatParameter::SubgraphSize, self.k)
            .set(StatParameter::Runtime, self.elapsed.as_secs_f64())
            .set(StatParameter::SubgraphCount, self.subgraph_count)
            .set(StatParameter::MaxDelay, self.max_delay.as_secs_f64())
            .set(StatParameter::Termination, self.termination.to_string());
        if let Some(nodes) = self.search_tree_nodes.or(self.discovered) {
            event.set(StatParameter::SearchTreeNodes, nodes);
        }
        event
    }
}

/// Runs `algorithm` for subgraph size `k` and streams every subgraph into `sink`.
pub fn enumerate(graph: &Graph, algorithm: EnumerationAlgorithm, k: usize, time_limit: Option<Duration>, sink: &mut dyn SubgraphSink) -> Result<EnumerationStats> {
    let config = EnumerationConfig { algorithm, k, time_limit, max_retained: None };
    enumerate_with(graph, &config, sink)
}

pub fn enumerate_with(graph: &Graph, config: &EnumerationConfig, sink: &mut dyn SubgraphSink) -> Result<EnumerationStats> {
    let k = config.k;
    let n = graph.vertex_count();
    if k < 2 || k > n {
        return Err(Error::InvalidArgument(format!("Subgraph size k={} must lie in 2..={} for this graph", k, n)));
    }

    log::info!("Enumerating connected induced subgraphs of size {} with {} on {} vertices.", k, config.algorithm, n);
    let started = Instant::now();
    let deadline = Deadline::after(config.time_limit);

    let (ctx_nodes, discovered, count, max_delay, termination) = if config.algorithm.is_exchange_search() {
        let (relabelled, starts) = reverse::dfs_ordering(graph, k)?;
        let mut ctx = SearchContext::new(&relabelled, sink, deadline);
        let discovered = match config.algorithm {
            EnumerationAlgorithm::DelayOld => reverse::run_delay(&mut ctx, &starts, NeighbourRule::Union, config.max_retained),
            EnumerationAlgorithm::DelayNew => reverse::run_delay(&mut ctx, &starts, NeighbourRule::Common, config.max_retained),
            EnumerationAlgorithm::ReverseOld => reverse::run_reverse(&mut ctx, &starts, NeighbourRule::Union),
            _ => reverse::run_reverse(&mut ctx, &starts, NeighbourRule::Common),
        };
        let termination = termination_of(&ctx);
        ctx.finish()?;
        (None, Some(discovered), ctx.count, ctx.max_delay, termination)
    } else {
        let mut ctx = SearchContext::new(graph, sink, deadline);
        match config.algorithm {
            EnumerationAlgorithm::ExgenOld => exgen::run(&mut ctx, k, false),
            EnumerationAlgorithm::ExgenReturn => exgen::run(&mut ctx, k, true),
            EnumerationAlgorithm::KavoshOld => kavosh::run(&mut ctx, k, false),
            EnumerationAlgorithm::KavoshReturn => kavosh::run(&mut ctx, k, true),
            EnumerationAlgorithm::SimpleOld => simple::run(&mut ctx, k, false),
            EnumerationAlgorithm::SimpleReturn => simple::run(&mut ctx, k, true),
            EnumerationAlgorithm::PivotOld => pivot::run(&mut ctx, k, PivotVariant::Old),
            EnumerationAlgorithm::PivotImproved => pivot::run(&mut ctx, k, PivotVariant::Improved),
            EnumerationAlgorithm::PivotReturn => pivot::run(&mut ctx, k, PivotVariant::Return),
            _ => bdde::run(&mut ctx, k),
        }
        let termination = termination_of(&ctx);
        ctx.finish()?;
        (Some(ctx.nodes), None, ctx.count, ctx.max_delay, termination)
    };

    let stats = EnumerationStats {
        algorithm: config.algorithm,
        k,
        search_tree_nodes: ctx_nodes,
        discovered,
        subgraph_count: count,
        max_delay,
        elapsed: started.elapsed(),
        termination,
    };

    if stats.is_partial() {
        log::warn!("{} stopped early ({}) after {} subgraphs.", stats.algorithm, stats.termination, stats.subgraph_count);
    }
    log::info!(
        "{}: {} subgraphs of size {} in {:.2?} (max delay {:.2?}).",
        stats.algorithm,
        stats.subgraph_count,
        k,
        stats.elapsed,
        stats.max_delay
    );
    Ok(stats)
}

fn termination_of(ctx: &SearchContext) -> Termination {
    if ctx.abandoned_starts > 0 {
        Termination::ResourceLimit
    } else if ctx.timed_out {
        Termination::TimeBudgetExceeded
    } else {
        Termination::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enumeration::context::CollectingSink;

    #[test]
    fn test_name_table_is_complete() {
        for algorithm in EnumerationAlgorithm::ALL {
            assert_eq!(algorithm.name().parse::<EnumerationAlgorithm>().unwrap(), algorithm);
        }
        assert!("BDDE".parse::<EnumerationAlgorithm>().is_ok());
        assert!(matches!("exgen".parse::<EnumerationAlgorithm>(), Err(Error::UnknownAlgorithm(_))));
    }

    #[test]
    fn test_k_must_fit_the_graph() {
        let g = Graph::from_unit_edges(vec![("0", "1"), ("1", "2")]).unwrap();
        let mut sink = CollectingSink::default();
        assert!(enumerate(&g, EnumerationAlgorithm::Bdde, 1, None, &mut sink).is_err());
        assert!(enumerate(&g, EnumerationAlgorithm::Bdde, 4, None, &mut sink).is_err());
        assert!(enumerate(&g, EnumerationAlgorithm::Bdde, 3, None, &mut sink).is_ok());
        assert_eq!(sink.subgraphs, vec![vec!["0", "1", "2"]]);
    }
}
