use serde::{Deserialize, Serialize};

use crate::domain::network_operator::{AssignmentConfig, OperatorConfig, PathConfig};
use crate::domain::placement::heuristics::PlacementConfig;
use crate::domain::routing::path_index::DEFAULT_SHORTEST_K;
use crate::domain::simulation::SimulationConfig;
use crate::domain::utils::id::SimulationId;
use crate::error::{Error, Result};

/// Simulation settings as stored in a config JSON file. Strategy names are plain strings here
/// and are parsed into their enums by [`SimulationConfigDto::operator_config`].
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfigDto {
    pub id: String,
    pub latency_factor: f64,
    #[serde(default = "default_shortest_k")]
    pub shortest_k: usize,

    #[serde(default = "default_heuristic")]
    pub heuristic: String,
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    #[serde(default)]
    pub start_with_pair: bool,
    #[serde(default = "default_selection")]
    pub selection: String,
    #[serde(default = "default_relative_threshold")]
    pub relative_threshold: f64,
    #[serde(default = "default_weight")]
    pub controller_weight: f64,
    #[serde(default = "default_weight")]
    pub request_weight: f64,
    pub capacity: Option<usize>,
    pub candidate_limit: Option<usize>,

    #[serde(default = "default_assignment_strategy")]
    pub assignment_strategy: String,
    #[serde(default = "default_objective")]
    pub control_path_objective: String,
    #[serde(default = "default_controller_selection")]
    pub controller_selection: String,

    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub request_sizes: Vec<usize>,
    #[serde(default = "default_coverage")]
    pub coverage: f64,
    #[serde(default)]
    pub timesteps: u64,
    #[serde(default)]
    pub requests_per_timestep: usize,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    #[serde(default = "default_max_ttl")]
    pub max_ttl: u64,
    #[serde(default)]
    pub held_out_requests: usize,
    pub seed: Option<u64>,
}

fn default_shortest_k() -> usize {
    DEFAULT_SHORTEST_K
}

fn default_heuristic() -> String {
    "hypervisor-count".to_string()
}

fn default_repeat() -> usize {
    1
}

fn default_selection() -> String {
    "random".to_string()
}

fn default_relative_threshold() -> f64 {
    0.8
}

fn default_weight() -> f64 {
    1.0
}

fn default_assignment_strategy() -> String {
    "shortest-paths".to_string()
}

fn default_objective() -> String {
    "min-avg".to_string()
}

fn default_controller_selection() -> String {
    "random".to_string()
}

fn default_mode() -> String {
    "static".to_string()
}

fn default_coverage() -> f64 {
    1.0
}

fn default_max_request_size() -> usize {
    5
}

fn default_max_ttl() -> u64 {
    10
}

impl SimulationConfigDto {
    pub fn operator_config(&self) -> Result<OperatorConfig> {
        let placement = PlacementConfig {
            heuristic: self.heuristic.parse()?,
            repeat: self.repeat,
            start_with_pair: self.start_with_pair,
            selection: self.selection.parse()?,
            relative_threshold: self.relative_threshold,
            controller_weight: self.controller_weight,
            request_weight: self.request_weight,
            capacity: self.capacity,
        };
        placement.validate()?;

        Ok(OperatorConfig {
            path: PathConfig { latency_factor: self.latency_factor, shortest_k: self.shortest_k },
            placement,
            assignment: AssignmentConfig {
                strategy: self.assignment_strategy.parse()?,
                objective: self.control_path_objective.parse()?,
                controller_selection: self.controller_selection.parse()?,
            },
            seed: self.seed,
        })
    }

    pub fn simulation_config(&self) -> Result<SimulationConfig> {
        if !(0.0..=1.0).contains(&self.coverage) {
            return Err(Error::InvalidArgument(format!("coverage {} is not within [0, 1]", self.coverage)));
        }
        if self.max_request_size < 2 {
            return Err(Error::InvalidArgument("maxRequestSize must be at least 2".to_string()));
        }
        if let Some(size) = self.request_sizes.iter().find(|&&size| size < 2) {
            return Err(Error::InvalidArgument(format!("requestSizes holds {}, requests span at least 2 switches", size)));
        }

        Ok(SimulationConfig {
            id: SimulationId::new(self.id.clone()),
            mode: self.mode.parse()?,
            request_sizes: self.request_sizes.clone(),
            coverage: self.coverage,
            timesteps: self.timesteps,
            requests_per_timestep: self.requests_per_timestep,
            max_request_size: self.max_request_size,
            held_out_requests: self.held_out_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::placement::heuristics::PlacementHeuristic;
    use crate::domain::simulation::SimulationMode;

    #[test]
    fn test_defaults_and_parsing() {
        let json = r#"{ "id": "sim-1", "latencyFactor": 0.5, "heuristic": "main controller", "mode": "dynamic", "timesteps": 3 }"#;
        let dto: SimulationConfigDto = serde_json::from_str(json).unwrap();

        let operator = dto.operator_config().unwrap();
        assert_eq!(operator.placement.heuristic, PlacementHeuristic::MainController);
        assert_eq!(operator.placement.relative_threshold, 0.8);
        assert_eq!(operator.path.shortest_k, DEFAULT_SHORTEST_K);

        let simulation = dto.simulation_config().unwrap();
        assert_eq!(simulation.mode, SimulationMode::Dynamic);
        assert_eq!(simulation.id.to_string(), "sim-1");
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let json = r#"{ "id": "sim-2", "latencyFactor": 1.0, "controllerSelection": "closest" }"#;
        let dto: SimulationConfigDto = serde_json::from_str(json).unwrap();
        assert!(matches!(dto.operator_config(), Err(Error::UnknownAlgorithm(_))));
    }

    #[test]
    fn test_single_switch_request_size_is_rejected() {
        let json = r#"{ "id": "sim-3", "latencyFactor": 1.0, "requestSizes": [1, 2] }"#;
        let dto: SimulationConfigDto = serde_json::from_str(json).unwrap();
        assert!(matches!(dto.simulation_config(), Err(Error::InvalidArgument(_))));
    }
}
