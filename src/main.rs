//! `rangetree` command-line tool
//!
//! Partitions a file of integer records into fixed key ranges, bulk-builds
//! one B+ tree per range, and reports on the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{Table, row};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rangetree::{BPlusTree, JobConfig, PartitionReport, build_range_trees};

/// Build range-partitioned B+ tree indexes over integer records
#[derive(Parser, Debug)]
#[command(name = "rangetree", version, about)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", env = "RANGETREE_LOG")]
    log_level: String,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Partition an input file and build one tree per range
    Build {
        /// Input file, one integer per line
        input: PathBuf,

        /// Job configuration file (JSON)
        #[arg(short = 'c', long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Tree order, overriding the configuration file
        #[arg(short = 'o', long)]
        order: Option<usize>,

        /// Directory to write per-range snapshots into
        #[arg(short = 's', long, value_name = "DIR")]
        snapshot_dir: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Dump every tree's structure
        #[arg(long)]
        dump: bool,
    },

    /// Load and validate a tree snapshot
    Inspect {
        /// Snapshot file
        snapshot: PathBuf,

        /// Dump the tree's structure
        #[arg(long)]
        dump: bool,
    },
}

#[derive(Serialize)]
struct BuildSummary {
    order: usize,
    accepted: usize,
    rejected: usize,
    ranges: Vec<PartitionReport>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    match args.command {
        Command::Build {
            input,
            config,
            order,
            snapshot_dir,
            json,
            dump,
        } => {
            let config = load_config(config.as_deref(), order)?;
            build(&config, &input, snapshot_dir.as_deref(), json, dump)
        }
        Command::Inspect { snapshot, dump } => inspect(&snapshot, dump),
    }
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter =
        EnvFilter::try_new(format!("rangetree={level}")).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, order: Option<usize>) -> Result<JobConfig> {
    let mut config = match path {
        Some(path) => JobConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => JobConfig::default(),
    };

    if let Some(order) = order {
        config.order = order;
    }
    config.validate().context("invalid job configuration")?;

    Ok(config)
}

fn build(
    config: &JobConfig,
    input: &Path,
    snapshot_dir: Option<&Path>,
    json: bool,
    dump: bool,
) -> Result<()> {
    let partitioner = config.partitioner()?;
    let batch = partitioner
        .partition_file(input)
        .with_context(|| format!("failed to read records from {}", input.display()))?;

    let accepted = batch.accepted();
    let rejected = batch.rejected();
    info!(accepted, rejected, "records partitioned");

    let trees = build_range_trees(batch, config.order).context("failed to build range trees")?;

    if let Some(dir) = snapshot_dir {
        for built in &trees {
            let path = built
                .write_snapshot(dir)
                .with_context(|| format!("failed to write snapshot for {}", built.partition))?;
            info!(partition = %built.partition, path = %path.display(), "snapshot written");
        }
    }

    let summary = BuildSummary {
        order: config.order,
        accepted,
        rejected,
        ranges: trees.iter().map(|t| t.report(&partitioner)).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if dump {
        for built in &trees {
            println!("{}:", built.partition);
            print!("{}", built.tree);
        }
    }

    Ok(())
}

fn print_summary(summary: &BuildSummary) {
    let mut table = Table::new();
    table.add_row(row!["Range", "Lower", "Upper", "Keys", "Height", "Nodes"]);
    for report in &summary.ranges {
        table.add_row(row![
            report.partition,
            format_bound(report.lower),
            format_bound(report.upper),
            report.keys,
            report.height,
            report.nodes
        ]);
    }
    table.printstd();

    println!(
        "order {}, {} records accepted, {} rejected",
        summary.order, summary.accepted, summary.rejected
    );
}

fn format_bound(bound: Option<i64>) -> String {
    bound.map_or_else(|| "-".to_string(), |b| b.to_string())
}

fn inspect(path: &Path, dump: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let tree = BPlusTree::from_snapshot(&bytes)
        .with_context(|| format!("{} is not a valid tree snapshot", path.display()))?;

    println!("order:  {}", tree.order());
    println!("keys:   {}", tree.len());
    println!("height: {}", tree.height());
    println!("nodes:  {}", tree.node_count());

    if dump {
        print!("{tree}");
    }

    Ok(())
}
