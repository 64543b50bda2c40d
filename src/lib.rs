use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::simulation_config_dto::SimulationConfigDto;
use crate::domain::graph::Graph;
use crate::domain::network_operator::NetworkOperator;
use crate::domain::placement::external::DegreeScorer;
use crate::domain::request::RequestGenerator;
use crate::domain::simulation::Simulation;
use crate::error::Result;
use crate::loader::parser::{load_topology, parse_json_file, read_subgraph_corpus};

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Builds a ready-to-run simulation from a topology file, a JSON config and a directory of
/// subgraph corpus files (as written by the enumeration, any file name).
pub fn build_simulation(topology_path: &Path, config_path: &Path, corpus_dir: &Path) -> Result<Simulation> {
    let graph = load_topology(topology_path)?;

    let config_dto: SimulationConfigDto = parse_json_file(config_path)?;
    log::info!("Simulation config '{}' parsed successfully.", config_dto.id);

    let operator_config = config_dto.operator_config()?;
    let simulation_config = config_dto.simulation_config()?;

    let mut generator = RequestGenerator::new(config_dto.max_ttl, config_dto.seed)?;
    load_corpora(&graph, corpus_dir, &mut generator)?;

    let mut operator = NetworkOperator::new(graph, operator_config)?;
    if let Some(limit) = config_dto.candidate_limit {
        operator.control_path_calculation()?;
        let corpus: Vec<Vec<usize>> = generator.sizes().flat_map(|size| generator.corpus(size).to_vec()).collect();
        operator.restrict_hypervisor_candidates(&DegreeScorer, limit, &corpus)?;
    }

    log::info!("Simulation '{}' constructed successfully.", simulation_config.id);
    Ok(Simulation::new(simulation_config, operator, generator))
}

/// Adds every corpus file in `dir` to the generator, grouping subgraphs by their size.
pub fn load_corpora(graph: &Graph, dir: &Path, generator: &mut RequestGenerator) -> Result<()> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?.filter_map(|entry| entry.ok().map(|e| e.path())).filter(|p| p.is_file()).collect();
    files.sort();

    for file in files {
        let mut by_size: BTreeMap<usize, Vec<Vec<String>>> = BTreeMap::new();
        for subgraph in read_subgraph_corpus(&file)? {
            by_size.entry(subgraph.len()).or_default().push(subgraph);
        }
        for (size, subgraphs) in by_size {
            generator.add_labelled_corpus(graph, size, &subgraphs)?;
        }
        log::debug!("Corpus file {} loaded.", file.display());
    }
    Ok(())
}
