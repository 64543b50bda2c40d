use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use vsdn_placement::domain::enumeration::context::CorpusWriter;
use vsdn_placement::domain::enumeration::{EnumerationAlgorithm, EnumerationConfig, enumerate_with};
use vsdn_placement::domain::utils::statistics::StatsCollector;
use vsdn_placement::loader::parser::load_topology;
use vsdn_placement::{build_simulation, logger};

#[derive(Parser)]
#[command(name = "vsdn-placement")]
#[command(about = "Resilient hypervisor placement for virtual SDN networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate all connected induced subgraphs of size k
    Enumerate {
        /// Topology file (JSON or edge list)
        graph: PathBuf,
        /// Subgraph size
        #[arg(short, long, conflicts_with = "inverse")]
        k: Option<usize>,
        /// Use k = |largest component| - inverse
        #[arg(long)]
        inverse: Option<usize>,
        /// Enumeration algorithm
        #[arg(short, long, default_value = "pivot-improved")]
        algorithm: String,
        /// Time limit in seconds
        #[arg(short, long)]
        time_limit: Option<u64>,
        /// Bound on retained subgraphs of the delay variants
        #[arg(long)]
        max_retained: Option<usize>,
        /// Output corpus file
        #[arg(short, long)]
        output: PathBuf,
        /// Statistics csv, one row appended per run
        #[arg(long, default_value = "logs/enumeration.csv")]
        stats: PathBuf,
    },
    /// Place hypervisors and run a request simulation
    Simulate {
        /// Topology file (JSON or edge list)
        topology: PathBuf,
        /// Simulation config (JSON)
        config: PathBuf,
        /// Directory holding subgraph corpus files
        corpus: PathBuf,
        /// Statistics csv, one row per step
        #[arg(long, default_value = "logs/simulation.csv")]
        stats: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init();

    match cli.command {
        Commands::Enumerate { graph, k, inverse, algorithm, time_limit, max_retained, output, stats } => {
            let topology = load_topology(&graph).with_context(|| format!("Failed to load {}", graph.display()))?;
            let k = match (k, inverse) {
                (Some(k), _) => k,
                (None, Some(inverse)) => topology.largest_component_size().saturating_sub(inverse),
                (None, None) => bail!("Either --k or --inverse is required"),
            };
            let algorithm: EnumerationAlgorithm = algorithm.parse()?;

            let mut config = EnumerationConfig::new(algorithm, k);
            config.time_limit = time_limit.map(Duration::from_secs);
            config.max_retained = max_retained;

            let mut writer = CorpusWriter::create(&output).with_context(|| format!("Failed to create {}", output.display()))?;
            let result = enumerate_with(&topology, &config, &mut writer)?;

            let collector = StatsCollector::init(Some(stats.as_path())).with_context(|| format!("Failed to open {}", stats.display()))?;
            let network = graph.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            collector.add_event(result.to_event(&network, &topology));
            collector.shutdown();

            println!("{} subgraphs of size {} ({}) in {:.2?}", result.subgraph_count, k, result.termination, result.elapsed);
        }
        Commands::Simulate { topology, config, corpus, stats } => {
            let mut simulation = build_simulation(&topology, &config, &corpus).context("Failed to build the simulation")?;
            let collector = StatsCollector::init(Some(stats.as_path())).with_context(|| format!("Failed to open {}", stats.display()))?;
            let results = simulation.run(&collector)?;
            collector.shutdown();

            for step in results {
                println!("step {}: {}/{} accepted, {} active", step.step, step.accepted, step.offered, step.active);
            }
        }
    }
    Ok(())
}
