use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cycle::CycleFinder;
use crate::metric::MetricAggregator;
use crate::output;
use crate::pattern::{PatternFinder, PatternKind};
use crate::reader::DiagramReader;

fn parse_pattern_kind(s: &str) -> Result<PatternKind, String> {
    s.parse()
}

#[derive(Parser)]
#[command(
    name = "umlens",
    version,
    about = "Detects design patterns and dependency cycles in UML class diagrams, and derives structural metrics."
)]
pub struct Cli {
    /// Print the full error chain on failure and raise log verbosity
    /// to debug (unless RUST_LOG is already set).
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect design pattern occurrences.
    Patterns {
        /// UML diagram XML document.
        input: PathBuf,

        /// Restrict to these pattern kinds (default: all ten).
        #[arg(short = 'p', long = "pattern", value_parser = parse_pattern_kind)]
        pattern: Vec<PatternKind>,

        /// Write JSON to this path instead of printing text.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Detect dependency cycles.
    Cycles {
        input: PathBuf,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Compute structural metrics.
    #[command(alias = "metrics")]
    Info {
        input: PathBuf,

        /// JSON file mapping metric identifiers to remediation weights.
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if debug && std::env::var("RUST_LOG").is_err() {
        builder.filter_module("umlens", log::LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match &cli.command {
        Command::Patterns { input, pattern, output } => run_patterns(input, pattern, output.as_deref()),
        Command::Cycles { input, output } => run_cycles(input, output.as_deref()),
        Command::Info { input, config, output } => run_info(input, config.as_deref(), output.as_deref()),
    };

    if let Err(e) = &result {
        if cli.debug {
            eprintln!("error: {e:#}");
        } else {
            eprintln!("error: {e}");
        }
    }
    result
}

fn run_patterns(input: &Path, filter: &[PatternKind], output: Option<&Path>) -> Result<()> {
    let diagram = DiagramReader::read(input)?;
    let finder = PatternFinder::new(&diagram);
    let all = finder.patterns(None, None);
    log::debug!("matched {} pattern instances before filtering", all.len());
    let selected: Vec<_> = if filter.is_empty() {
        all
    } else {
        all.into_iter().filter(|p| filter.contains(&p.kind())).collect()
    };
    output::emit_patterns(&selected, &diagram, output)
}

fn run_cycles(input: &Path, output: Option<&Path>) -> Result<()> {
    let diagram = DiagramReader::read(input)?;
    let finder = CycleFinder::new(&diagram);
    let cycles: Vec<_> = finder.cycles().iter().collect();
    output::emit_cycles(&cycles, &diagram, output)
}

fn run_info(input: &Path, config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let diagram = DiagramReader::read(input)?;
    let config = output::load_metric_config(config)?;
    let aggregator = MetricAggregator::new(&diagram, config);
    let values = aggregator.compute();
    output::emit_metrics(&values, output)
}
