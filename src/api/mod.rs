pub mod simulation_config_dto;
pub mod topology_dto;
