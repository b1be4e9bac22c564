//! `grape-run` - run a vertex program over an edge list file.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grape::config::{EngineConfig, ThreadConfig};
use grape::engine::{Coordinator, RunOutcome};
use grape::graph::{partition_edges, EdgeList, GlobalId};
use grape::programs::{bfs_program, sssp_program};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Program {
    /// Weighted shortest paths
    Sssp,
    /// Unweighted hop counts
    Bfs,
}

/// Partitioned incremental graph computation
#[derive(Parser, Debug)]
#[command(name = "grape-run")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Edge list file (`src dst [weight]` per line)
    #[arg(long)]
    edges: PathBuf,

    /// Global id of the source vertex
    #[arg(long)]
    source: GlobalId,

    /// Number of fragments (workers)
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Scheduler threads per worker (overrides the config file)
    #[arg(long)]
    threads: Option<usize>,

    /// Vertex program to run
    #[arg(long, value_enum, default_value_t = Program::Sssp)]
    program: Program,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a JSON report instead of `gid value` lines
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct Report<T> {
    program: Program,
    source: GlobalId,
    workers: usize,
    #[serde(flatten)]
    outcome: RunOutcome<T>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(threads) = args.threads {
        config = config.with_threads(ThreadConfig::Fixed(threads));
    }
    config.validate().context("Invalid config")?;

    let file = File::open(&args.edges)
        .with_context(|| format!("Failed to open {}", args.edges.display()))?;
    let list = EdgeList::read(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", args.edges.display()))?;
    tracing::info!(
        vertices = list.vertices.len(),
        edges = list.edges.len(),
        "loaded edge list"
    );

    let fragments = partition_edges(&list.vertices, &list.edges, args.workers)
        .context("Failed to partition graph")?;

    match args.program {
        Program::Sssp => {
            let mut coordinator =
                Coordinator::new(fragments, &config).context("Failed to set up workers")?;
            let outcome = coordinator
                .run(sssp_program(args.source))
                .context("SSSP run failed")?;
            emit(&args, outcome, f64::is_finite)
        }
        Program::Bfs => {
            let mut coordinator =
                Coordinator::new(fragments, &config).context("Failed to set up workers")?;
            let outcome = coordinator
                .run(bfs_program(args.source))
                .context("BFS run failed")?;
            emit(&args, outcome, |hops: u64| hops != u64::MAX)
        }
    }
}

fn emit<T>(args: &Args, outcome: RunOutcome<T>, reached: impl Fn(T) -> bool) -> Result<()>
where
    T: Copy + Display + Serialize,
{
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let report = Report {
            program: args.program,
            source: args.source,
            workers: args.workers,
            outcome,
        };
        serde_json::to_writer_pretty(&mut out, &report).context("Failed to write report")?;
        writeln!(out)?;
    } else {
        for (gid, value) in outcome.snapshot.iter() {
            if reached(value) {
                writeln!(out, "{gid} {value}")?;
            } else {
                writeln!(out, "{gid} inf")?;
            }
        }
    }
    Ok(())
}
