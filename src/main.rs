use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use itertools::Itertools;
use log::info;

use louvain_community::logger::init_logger;
use louvain_community::{modularity_of, Graph, Louvain, LouvainConfig, LouvainResult, WeightedGraph};

#[derive(Parser)]
#[command(name = "louvain")]
#[command(about = "Multi-level modularity community detection")]
#[command(version)]
struct Cli {
    /// Input graph: a `.graph` file or a whitespace separated edge list
    graph: PathBuf,

    /// YAML configuration, command line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_levels: Option<usize>,

    #[arg(long)]
    max_iterations: Option<usize>,

    /// Minimum modularity gain between levels to keep coarsening
    #[arg(long)]
    tolerance: Option<f64>,

    /// Worker threads and parallel local-move tasks
    #[arg(long)]
    concurrency: Option<usize>,

    /// Node property with initial communities (`community` for `.graph` files)
    #[arg(long)]
    seed_property: Option<String>,

    /// Report the community of every level
    #[arg(long)]
    intermediate: bool,

    #[arg(short, long, value_enum, default_value_t = Format::Tsv)]
    format: Format,

    /// Write the communities here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append log lines to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Tsv,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_file.as_deref()).context("failed to initialise logging")?;

    let config = load_config(&cli)?;
    let start = Instant::now();
    let graph = load_graph(&cli.graph)?;
    info!(
        "Loaded {} nodes and {} relationships in {:?}.",
        graph.node_count(),
        graph.relationship_count(),
        start.elapsed()
    );

    let louvain = Louvain::new(graph, config).context("invalid configuration")?;
    let start = Instant::now();
    let result = louvain.compute().context("community detection failed")?;
    let check = modularity_of(louvain.graph(), result.communities())?;
    info!(
        "Found {} communities in {} levels, modularity {:.6} (recomputed {:.6}) in {:?}.",
        result.community_count(),
        result.levels(),
        result.final_modularity(),
        check,
        start.elapsed()
    );
    info!("Modularity per level: {}.", result.modularities().iter().map(|q| format!("{:.6}", q)).join(", "));

    match &cli.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
            write_result(&result, cli.format, BufWriter::new(file))?;
        }
        None => write_result(&result, cli.format, std::io::stdout().lock())?,
    }
    louvain.release();
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<LouvainConfig> {
    let mut config = match &cli.config {
        Some(path) => LouvainConfig::from_yaml_file(path)
            .with_context(|| format!("cannot load configuration {}", path.display()))?,
        None => LouvainConfig::default(),
    };
    if let Some(max_levels) = cli.max_levels {
        config.max_levels = max_levels;
    }
    if let Some(max_iterations) = cli.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if cli.seed_property.is_some() {
        config.seed_property = cli.seed_property.clone();
    }
    if cli.intermediate {
        config.include_intermediate_communities = true;
    }
    Ok(config)
}

fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    if !path.exists() {
        bail!("graph file {} does not exist", path.display());
    }
    let graph = match path.extension().and_then(|ext| ext.to_str()) {
        Some("graph") => Graph::from_graph_file(path),
        _ => Graph::from_edge_list_file(path),
    };
    graph.with_context(|| format!("cannot load graph {}", path.display()))
}

fn write_result(result: &LouvainResult, format: Format, mut out: impl Write) -> anyhow::Result<()> {
    match format {
        Format::Tsv => {
            for row in result.iter() {
                match &row.intermediate_communities {
                    Some(history) => writeln!(out, "{}\t{}\t{}", row.node_id, row.community, history.iter().join(","))?,
                    None => writeln!(out, "{}\t{}", row.node_id, row.community)?,
                }
            }
        }
        Format::Json => {
            let rows: Vec<_> = result.iter().collect();
            let document = serde_json::json!({
                "levels": result.levels(),
                "community_count": result.community_count(),
                "modularity": result.final_modularity(),
                "modularities": result.modularities(),
                "nodes": rows,
            });
            serde_json::to_writer_pretty(&mut out, &document)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
