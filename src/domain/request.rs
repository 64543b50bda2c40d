use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::domain::graph::{Graph, Vertex};
use crate::domain::utils::id::RequestId;
use crate::error::{Error, Result};

/// A virtual SDN request: a set of physical switches that has to be controlled, through the
/// hypervisor layer, by one controller placed on one of the network nodes.
#[derive(Debug, Clone, Serialize)]
pub struct VsdnRequest {
    pub id: RequestId,

    /// Controller location; before acceptance this is only a preference.
    pub controller: Option<Vertex>,

    /// Requested switches, sorted and unique.
    pub switches: Vec<Vertex>,

    /// Lifetime in simulation steps.
    pub ttl: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub qos: f64,

    pub active: bool,
    pub accepted: bool,
}

impl VsdnRequest {
    pub fn new(switches: Vec<Vertex>, ttl: u64, start_time: u64) -> Result<Self> {
        let switches: Vec<Vertex> = switches.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if switches.len() < 2 {
            return Err(Error::InvalidArgument(format!("A request needs at least two distinct switches, got {}", switches.len())));
        }
        if ttl == 0 {
            return Err(Error::InvalidArgument("A request needs a ttl of at least 1".to_string()));
        }
        let end_time = start_time.checked_add(ttl).ok_or_else(|| Error::InvalidArgument(format!("Request ending at {} + {} overflows", start_time, ttl)))?;

        Ok(VsdnRequest {
            id: RequestId::next(),
            controller: None,
            switches,
            ttl,
            start_time,
            end_time,
            qos: 1.0,
            active: false,
            accepted: false,
        })
    }

    pub fn with_qos(mut self, qos: f64) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_controller(mut self, controller: Vertex) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn size(&self) -> usize {
        self.switches.len()
    }

    pub fn utilization(&self) -> f64 {
        (self.size() as u64 * self.ttl) as f64
    }

    pub fn revenue(&self) -> f64 {
        self.utilization() * self.qos
    }

    pub fn accept(&mut self, controller: Vertex) {
        self.controller = Some(controller);
        self.accepted = true;
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

impl fmt::Display for VsdnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (switches {:?}, ttl {}, controller {:?})", self.id, self.switches, self.ttl, self.controller)
    }
}

/// Value a request brings to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMetric {
    Size,
    Utilization,
    Revenue,
}

impl RequestMetric {
    pub fn evaluate(&self, request: &VsdnRequest) -> f64 {
        match self {
            RequestMetric::Size => request.size() as f64,
            RequestMetric::Utilization => request.utilization(),
            RequestMetric::Revenue => request.revenue(),
        }
    }
}

impl FromStr for RequestMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "size" => Ok(RequestMetric::Size),
            "utilization" => Ok(RequestMetric::Utilization),
            "revenue" => Ok(RequestMetric::Revenue),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Draws requests from per-size corpora of connected switch sets.
pub struct RequestGenerator {
    corpora: BTreeMap<usize, Vec<Vec<Vertex>>>,
    max_ttl: u64,
    rng: StdRng,
}

impl RequestGenerator {
    /// `seed = None` seeds from the operating system.
    pub fn new(max_ttl: u64, seed: Option<u64>) -> Result<Self> {
        if max_ttl == 0 {
            return Err(Error::InvalidArgument("max_ttl must be at least 1".to_string()));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(RequestGenerator { corpora: BTreeMap::new(), max_ttl, rng })
    }

    pub fn add_corpus(&mut self, size: usize, subgraphs: Vec<Vec<Vertex>>) {
        log::debug!("Request corpus for size {}: {} subgraphs.", size, subgraphs.len());
        self.corpora.entry(size).or_default().extend(subgraphs);
    }

    /// Adds a corpus given by vertex labels, e.g. as read from a corpus file.
    pub fn add_labelled_corpus(&mut self, graph: &Graph, size: usize, subgraphs: &[Vec<String>]) -> Result<()> {
        let resolved = subgraphs.iter().map(|labels| labels.iter().map(|l| graph.vertex(l)).collect::<Result<Vec<_>>>()).collect::<Result<Vec<_>>>()?;
        self.add_corpus(size, resolved);
        Ok(())
    }

    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.corpora.keys().copied()
    }

    pub fn corpus(&self, size: usize) -> &[Vec<Vertex>] {
        self.corpora.get(&size).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Requests for a `fraction` of the corpus of `size`, sampled without replacement.
    pub fn by_coverage(&mut self, size: usize, fraction: f64, time: u64) -> Result<Vec<VsdnRequest>> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::InvalidArgument(format!("Coverage fraction {} is not within [0, 1]", fraction)));
        }
        let count = (self.corpus(size).len() as f64 * fraction).round() as usize;
        self.by_count(size, count, time)
    }

    /// `count` requests of `size`, sampled without replacement.
    pub fn by_count(&mut self, size: usize, count: usize, time: u64) -> Result<Vec<VsdnRequest>> {
        let corpus = self.corpora.get(&size).ok_or_else(|| Error::InvalidArgument(format!("No request corpus for size {}", size)))?;
        if count > corpus.len() {
            return Err(Error::InvalidArgument(format!("Requested {} requests of size {}, corpus holds {}", count, size, corpus.len())));
        }

        let picked: Vec<Vec<Vertex>> = corpus.choose_multiple(&mut self.rng, count).cloned().collect();
        let mut requests = Vec::with_capacity(count);
        for switches in picked {
            requests.push(build_request(switches, self.max_ttl, time, &mut self.rng)?);
        }
        Ok(requests)
    }

    /// `total` requests with uniformly drawn sizes in `2..=max_size` among the available corpora.
    pub fn random_requests(&mut self, max_size: usize, total: usize, time: u64) -> Result<Vec<VsdnRequest>> {
        let sizes: Vec<usize> = self.corpora.iter().filter(|(s, c)| **s <= max_size && **s >= 2 && !c.is_empty()).map(|(s, _)| *s).collect();
        if sizes.is_empty() {
            return Err(Error::InvalidArgument(format!("No request corpus with a size in 2..={}", max_size)));
        }

        let mut requests = Vec::with_capacity(total);
        for _ in 0..total {
            let Some(&size) = sizes.choose(&mut self.rng) else {
                break;
            };
            let Some(switches) = self.corpora.get(&size).and_then(|c| c.choose(&mut self.rng)).cloned() else {
                continue;
            };
            requests.push(build_request(switches, self.max_ttl, time, &mut self.rng)?);
        }
        Ok(requests)
    }
}

fn build_request(switches: Vec<Vertex>, max_ttl: u64, time: u64, rng: &mut impl RngCore) -> Result<VsdnRequest> {
    let ttl = rng.random_range(1..=max_ttl);
    let preferred = switches.choose(rng).copied();
    let request = VsdnRequest::new(switches, ttl, time)?;
    Ok(match preferred {
        Some(c) => request.with_controller(c),
        None => request,
    })
}
