use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use pruning_rs::config::{BackendKind, Fill, FloatWidth, RunConfig};
use pruning_rs::io::config::{load_config, save_config};
use pruning_rs::pipeline;
use pruning_rs::report::write_json_report;
use pruning_rs::rescale::ZeroCellPolicy;

#[derive(Parser, Debug)]
#[command(name = "pruning")]
#[command(
    about = "Fold per-site partial likelihoods over many nodes with underflow rescaling, then check against an unscaled reference",
    long_about = None
)]
struct Cli {
    #[arg(long, help = "JSON run configuration; flags below override its fields")]
    config: Option<PathBuf>,
    #[arg(long)]
    sites: Option<usize>,
    #[arg(long)]
    characters: Option<usize>,
    #[arg(long)]
    nodes: Option<usize>,
    #[arg(long, value_enum)]
    precision: Option<FloatWidth>,
    #[arg(long, help = "Underflow threshold (default depends on precision)")]
    threshold: Option<f64>,
    #[arg(long, help = "Rescale factor applied below the threshold")]
    factor: Option<f64>,
    #[arg(long, help = "Cap on rescales of one cell within one node step")]
    max_rescales: Option<u32>,
    #[arg(long, value_enum)]
    zero_cells: Option<ZeroCellPolicy>,
    #[arg(long, help = "Fold without any rescaling")]
    no_rescale: bool,
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long, value_enum)]
    fill: Option<Fill>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, help = "Number of distinct random distributions cycled over nodes")]
    distinct_nodes: Option<usize>,
    #[arg(long, help = "Substitution model matrix file (whitespace separated, .gz ok)")]
    model: Option<PathBuf>,
    #[arg(long, help = "Character distribution matrix file (sites x characters)")]
    distribution: Option<PathBuf>,
    #[arg(long, help = "Require bit-exact equality with the reference")]
    exact: bool,
    #[arg(long)]
    rel_tol: Option<f64>,
    #[arg(long)]
    abs_tol: Option<f64>,
    #[arg(long, help = "Write a JSON run report")]
    report: Option<PathBuf>,
    #[arg(long, help = "Write the effective configuration as JSON and continue")]
    save_config: Option<PathBuf>,
    #[arg(long)]
    no_progress: bool,
    #[arg(short, long, help = "Log per-node and per-cell detail")]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(v) = self.sites {
            config.sites = v;
        }
        if let Some(v) = self.characters {
            config.characters = v;
        }
        if let Some(v) = self.nodes {
            config.nodes = v;
        }
        if let Some(v) = self.precision {
            config.precision = v;
        }
        if self.threshold.is_some() {
            config.threshold = self.threshold;
        }
        if let Some(v) = self.factor {
            config.factor = v;
        }
        if self.max_rescales.is_some() {
            config.max_rescales = self.max_rescales;
        }
        if let Some(v) = self.zero_cells {
            config.zero_cells = v;
        }
        if self.no_rescale {
            config.rescale = false;
        }
        if let Some(v) = self.backend {
            config.backend = v;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if let Some(v) = self.fill {
            config.fill = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.distinct_nodes {
            config.distinct_nodes = v;
        }
        if self.model.is_some() {
            config.model_path = self.model.clone();
        }
        if self.distribution.is_some() {
            config.distribution_path = self.distribution.clone();
        }
        if self.exact {
            config.exact = true;
        }
        if self.rel_tol.is_some() {
            config.rel_tol = self.rel_tol;
        }
        if let Some(v) = self.abs_tol {
            config.abs_tol = v;
        }
        if self.no_progress {
            config.progress = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RunConfig::default(),
    };
    cli.apply(&mut config);

    if let Some(path) = &cli.save_config {
        save_config(path, &config)?;
        println!("Config: {}", path.display());
    }

    let report = pipeline::run(&config)?;
    println!(
        "{} sites x {} characters, {} nodes ({}, {}): {} rescales over {} cells, max count {}",
        report.sites,
        report.characters,
        report.nodes,
        report.precision,
        report.backend,
        report.scaling.total_rescales,
        report.scaling.rescaled_cells,
        report.scaling.max_scale_count
    );
    println!(
        "{:.3} seconds in engine, {:.3} seconds in reference",
        report.engine_seconds, report.reference_seconds
    );
    if let Some((site, character)) = report.verdict.first_mismatch {
        println!(
            "{} of {} cells differ, first at site {site} character {character} (max rel error {:e})",
            report.verdict.mismatches, report.verdict.cells, report.verdict.max_rel_error
        );
    }

    if let Some(path) = &cli.report {
        write_json_report(path, &report)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        println!("Report: {}", path.display());
    }

    println!("{}", report.verdict.label());
    Ok(report.verdict.passed)
}
