use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::domain::network_operator::NetworkOperator;
use crate::domain::request::{RequestGenerator, VsdnRequest};
use crate::domain::utils::id::SimulationId;
use crate::domain::utils::statistics::{StatParameter, StatisticEvent, StatsCollector};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    /// Place once, then offer a share of every request-size corpus.
    #[default]
    Static,
    /// Requests arrive and expire over discrete timesteps.
    Dynamic,
}

impl FromStr for SimulationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(SimulationMode::Static),
            "dynamic" => Ok(SimulationMode::Dynamic),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationMode::Static => write!(f, "static"),
            SimulationMode::Dynamic => write!(f, "dynamic"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub id: SimulationId,
    pub mode: SimulationMode,

    /// Request sizes offered in a static run.
    pub request_sizes: Vec<usize>,

    /// Share of each size's corpus offered in a static run.
    pub coverage: f64,
    pub timesteps: u64,
    pub requests_per_timestep: usize,
    pub max_request_size: usize,

    /// Requests generated up front to steer placement; never processed.
    pub held_out_requests: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub step: u64,
    pub offered: usize,
    pub accepted: usize,
    pub active: usize,
}

impl StepResult {
    pub fn acceptance_ratio(&self) -> f64 {
        if self.offered == 0 { 0.0 } else { self.accepted as f64 / self.offered as f64 }
    }
}

/// Drives a network operator through a run and logs one statistics row per step.
pub struct Simulation {
    config: SimulationConfig,
    operator: NetworkOperator,
    generator: RequestGenerator,
}

impl Simulation {
    pub fn new(config: SimulationConfig, operator: NetworkOperator, generator: RequestGenerator) -> Self {
        Simulation { config, operator, generator }
    }

    pub fn operator(&self) -> &NetworkOperator {
        &self.operator
    }

    /// Calculates control paths, places the hypervisors and runs all steps.
    pub fn run(&mut self, stats: &StatsCollector) -> Result<Vec<StepResult>> {
        let started = Instant::now();
        log::info!("Simulation {} ({}) started.", self.config.id, self.config.mode);

        self.operator.control_path_calculation()?;
        let held_out: Vec<VsdnRequest> = if self.config.held_out_requests > 0 {
            self.generator.random_requests(self.config.max_request_size, self.config.held_out_requests, 0)?
        } else {
            Vec::new()
        };
        let placement = self.operator.hypervisor_placement(&held_out, None)?;
        let active_hypervisors = placement.active_hypervisors.len();
        let heuristic = placement.heuristic.to_string();

        let mut event = self.base_event("placement");
        event
            .set(StatParameter::Heuristic, heuristic)
            .set(StatParameter::ActiveHypervisors, active_hypervisors)
            .set(StatParameter::Runtime, started.elapsed().as_secs_f64());
        stats.add_event(event);

        let results = match self.config.mode {
            SimulationMode::Static => self.run_static(stats)?,
            SimulationMode::Dynamic => self.run_dynamic(stats)?,
        };

        let offered: usize = results.iter().map(|r| r.offered).sum();
        let accepted: usize = results.iter().map(|r| r.accepted).sum();
        log::info!("Simulation {} finished in {:.2?}: {} of {} requests accepted.", self.config.id, started.elapsed(), accepted, offered);
        Ok(results)
    }

    fn run_static(&mut self, stats: &StatsCollector) -> Result<Vec<StepResult>> {
        let mut results = Vec::new();
        for size in self.config.request_sizes.clone() {
            self.operator.discard_all();
            let mut requests = self.generator.by_coverage(size, self.config.coverage, 0)?;
            let accepted = self.operator.process_requests(&mut requests)?;
            let result = StepResult { step: size as u64, offered: requests.len(), accepted, active: self.operator.active_request_count() };
            self.log_step("static-step", &result, stats);
            results.push(result);
        }
        Ok(results)
    }

    fn run_dynamic(&mut self, stats: &StatsCollector) -> Result<Vec<StepResult>> {
        let mut results = Vec::new();
        for t in 0..self.config.timesteps {
            self.operator.discard_old(t);
            let mut requests = self.generator.random_requests(self.config.max_request_size, self.config.requests_per_timestep, t)?;
            let accepted = self.operator.process_requests(&mut requests)?;
            let result = StepResult { step: t, offered: requests.len(), accepted, active: self.operator.active_request_count() };
            self.log_step("dynamic-step", &result, stats);
            results.push(result);
        }
        Ok(results)
    }

    fn base_event(&self, description: &str) -> StatisticEvent {
        let mut event = StatisticEvent::new();
        let path = &self.operator.config().path;
        event
            .set(StatParameter::LogDescription, description)
            .set(StatParameter::Network, self.config.id.to_string())
            .set(StatParameter::VertexCount, self.operator.graph().vertex_count())
            .set(StatParameter::EdgeCount, self.operator.graph().edge_count())
            .set(StatParameter::LatencyFactor, path.latency_factor)
            .set(StatParameter::ShortestK, path.shortest_k);
        event
    }

    fn log_step(&self, description: &str, result: &StepResult, stats: &StatsCollector) {
        let mut event = self.base_event(description);
        event
            .set(StatParameter::SimulationStep, result.step)
            .set(StatParameter::RequestCount, result.offered)
            .set(StatParameter::AcceptedRequests, result.accepted)
            .set(StatParameter::AcceptanceRatio, result.acceptance_ratio());
        self.operator.control_path_stats().fill(&mut event);
        stats.add_event(event);

        log::debug!("Step {}: {}/{} accepted, {} active.", result.step, result.accepted, result.offered, result.active);
    }
}
