//! Report shaping and rendering

use prettytable::{Cell, Row, Table, format, row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use mprof_config::{ReportConfig, SortKey, SortOrder};
use tracing::debug;

use crate::error::Result;
use crate::stats::MethodStats;

/// One report line, times in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub method: String,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub total: f64,
    pub calls: usize,
}

impl From<&MethodStats> for ReportRow {
    fn from(stats: &MethodStats) -> Self {
        Self {
            method: stats.label(),
            min: stats.min_secs(),
            max: stats.max_secs(),
            average: stats.average_secs(),
            total: stats.total_secs(),
            calls: stats.count,
        }
    }
}

/// Sorted, labelled view over a set of [`MethodStats`].
///
/// Rows are ordered by average time, slowest first, unless configured
/// otherwise. Ties are broken by method label.
#[derive(Debug, Clone)]
pub struct Report {
    label: String,
    stats: Vec<MethodStats>,
    config: ReportConfig,
}

impl Report {
    pub fn new(stats: Vec<MethodStats>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stats,
            config: ReportConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.config.sort_by = key;
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.config.order = order;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.config.precision = precision;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Statistics in report order
    pub fn sorted(&self) -> Vec<&MethodStats> {
        let mut sorted: Vec<&MethodStats> = self.stats.iter().collect();
        sorted.sort_by(|a, b| {
            let primary = compare(a, b, self.config.sort_by);
            let primary = match self.config.order {
                SortOrder::Ascending => primary,
                SortOrder::Descending => primary.reverse(),
            };
            primary.then_with(|| a.label().cmp(&b.label()))
        });
        sorted
    }

    pub fn to_rows(&self) -> Vec<ReportRow> {
        self.sorted().into_iter().map(ReportRow::from).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        let rows = self.to_rows();
        debug!(label = %self.label, rows = rows.len(), "exporting report");
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

fn compare(a: &MethodStats, b: &MethodStats, key: SortKey) -> Ordering {
    match key {
        SortKey::Method => a.label().cmp(&b.label()),
        SortKey::Min => a.min.cmp(&b.min),
        SortKey::Max => a.max.cmp(&b.max),
        SortKey::Average => a.average.cmp(&b.average),
        SortKey::Total => a.total.cmp(&b.total),
        SortKey::Calls => a.count.cmp(&b.count),
    }
}

const HEADERS: [&str; 6] = [
    "Method",
    "Min Time",
    "Max Time",
    "Average Time",
    "Total Time",
    "Total Calls",
];

/// One rendered table line with times in milliseconds
struct StatsLine<'a> {
    stats: &'a MethodStats,
    precision: usize,
}

impl StatsLine<'_> {
    fn millis(&self, duration: Duration) -> String {
        format!("{:.*} ms", self.precision, duration.as_secs_f64() * 1000.0)
    }
}

impl From<StatsLine<'_>> for Row {
    fn from(line: StatsLine<'_>) -> Self {
        row![
            line.stats.label(),
            r->line.millis(line.stats.min),
            r->line.millis(line.stats.max),
            r->line.millis(line.stats.average),
            r->line.millis(line.stats.total),
            r->line.stats.count,
        ]
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MethodProfiler results for: {}", self.label)?;

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(Row::new(HEADERS.iter().map(|&header| Cell::new(header)).collect()));
        for stats in self.sorted() {
            table.add_row(
                StatsLine {
                    stats,
                    precision: self.config.precision,
                }
                .into(),
            );
        }

        write!(f, "{table}")?;
        write!(f, "{} rows in set", self.len())
    }
}
