use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use mprof_utils::measure;
use tracing::info;

use method_profiler::{
    ProfilerConfig, ProfilerRegistry, SortKey, SortOrder, init_logging, profiled,
};

#[derive(Parser, Debug)]
#[command(
    name = "mprof",
    version,
    about = "Profile a sample workload and print per-method timings"
)]
struct Cli {
    /// Number of rounds the workload runs
    #[arg(short = 'n', long, default_value_t = 100)]
    iterations: usize,

    /// Report column to sort by (method, min, max, average, total, calls)
    #[arg(long)]
    sort_by: Option<SortKey>,

    /// Sort direction (ascending, descending)
    #[arg(long)]
    order: Option<SortOrder>,

    /// Decimal places for millisecond columns
    #[arg(long)]
    precision: Option<usize>,

    /// Print the report rows as JSON
    #[arg(long)]
    json: bool,

    /// Profiler config file (requires the toml-config feature)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Word frequency counter used as the profiled workload.
struct WordCounter {
    counts: BTreeMap<String, usize>,
}

#[profiled]
impl WordCounter {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    pub fn ingest(&mut self, text: &str) -> usize {
        let words = Self::tokenize(text);
        for word in &words {
            self.bump(word);
        }
        words.len()
    }

    fn bump(&mut self, word: &str) {
        *self.counts.entry(word.to_string()).or_default() += 1;
    }

    pub fn most_common(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(word, count)| (word.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }
}

const SAMPLE: &str = "The otter floats on its back, cracking shells on a stone. \
    The stone is kept in a pouch under the otter's arm, and the otter \
    returns to the same stone again and again.";

fn load_config(cli: &Cli) -> Result<ProfilerConfig> {
    let mut config = match &cli.config {
        Some(path) => ProfilerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .merge_with_env(),
        None => ProfilerConfig::from_env(),
    };

    if let Some(sort_by) = cli.sort_by {
        config.report.sort_by = sort_by;
    }
    if let Some(order) = cli.order {
        config.report.order = order;
    }
    if let Some(precision) = cli.precision {
        config.report.precision = precision;
    }
    Ok(config)
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut registry = ProfilerRegistry::with_config(config);
    registry
        .observe::<WordCounter>()
        .context("failed to observe WordCounter")?;

    let mut counter = WordCounter::new();
    let (elapsed, words) = measure(|| {
        (0..cli.iterations)
            .map(|_| counter.ingest(SAMPLE))
            .sum::<usize>()
    });
    let top = counter.most_common(3);
    info!(
        iterations = cli.iterations,
        words,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        ?top,
        "workload finished"
    );

    let report = registry.get_report();
    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", "Method timings".bold().green());
        println!("{report}");
    }

    Ok(())
}
