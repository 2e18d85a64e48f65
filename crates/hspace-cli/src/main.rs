use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hspace_core::{InstanceTemplate, Inventory, Redundancy};
use hspace_placement::{BalanceScorer, FailoverValidator, PairAllocator, ScoringWeights};
use hspace_planner::{CapacityPlanner, PlannerConfig, plan};

mod report;

#[derive(Parser)]
#[command(
    name = "hspace",
    about = "Cluster capacity planner: how many more instances fit while staying N+1 safe",
    version
)]
struct Cli {
    /// Cluster inventory (TOML) listing nodes and running instances
    #[arg(short = 'n', long = "nodes", value_name = "FILE")]
    nodes: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Nodes to treat as offline (comma separated or repeated)
    #[arg(short = 'O', long, value_name = "NAME", value_delimiter = ',')]
    offline: Vec<String>,

    /// Memory per new instance, in MiB
    #[arg(long, default_value_t = 4096)]
    memory: u64,

    /// Disk per new instance, in MiB
    #[arg(long, default_value_t = 102_400)]
    disk: u64,

    /// Virtual CPUs per new instance
    #[arg(long, default_value_t = 1)]
    vcpus: u32,

    /// Nodes each new instance spans (1 = plain, 2 = mirrored)
    #[arg(
        short,
        long,
        default_value_t = 2,
        value_parser = clap::value_parser!(u8).range(1..=2)
    )]
    redundancy: u8,

    /// Balance score weights (TOML); unset weights default to 1.0
    #[arg(long, value_name = "FILE")]
    weights: Option<PathBuf>,

    /// Stop after placing this many instances
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Print the node tables before and after planning
    #[arg(short, long)]
    print_nodes: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    // Usage errors exit 1; --help and --version exit 0.
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        let code = i32::from(err.use_stderr());
        let _ = err.print();
        std::process::exit(code);
    });

    init_tracing(cli.verbose);
    run(cli)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let redundancy = Redundancy::try_from(cli.redundancy)?;
    let template = InstanceTemplate {
        memory: cli.memory,
        disk: cli.disk,
        vcpus: cli.vcpus,
    };

    let snapshot = Inventory::from_file(&cli.nodes)?
        .into_snapshot()
        .context("invalid cluster inventory")?;
    info!(
        nodes = snapshot.node_count(),
        instances = snapshot.instance_count(),
        "inventory loaded"
    );

    let weights = match &cli.weights {
        Some(path) => load_weights(path)?,
        None => ScoringWeights::default(),
    };
    let planner = CapacityPlanner::new(PairAllocator, BalanceScorer::new(weights))
        .with_config(PlannerConfig {
            max_depth: cli.max_depth,
        });
    let outcome = plan(
        &planner,
        &FailoverValidator,
        &snapshot,
        cli.offline.as_slice(),
        &template,
        redundancy,
    )?;

    let report = report::CapacityReport::new(&outcome, template, redundancy, cli.print_nodes);
    match cli.format {
        Format::Text => print!("{}", report::format_report(&report)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn load_weights(path: &Path) -> anyhow::Result<ScoringWeights> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read weights {}", path.display()))?;
    let weights: ScoringWeights = toml::from_str(&content)
        .with_context(|| format!("failed to parse weights {}", path.display()))?;
    info!(?weights, "scoring weights loaded");
    Ok(weights)
}
