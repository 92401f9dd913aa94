// Metric extraction rules and the running aggregate they feed

use crate::parser::LogRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// `attr.name` tag of a CPU sample
pub const CPU_ATTR_NAME: &str = "cpu";
/// `attr.name` tag of a memory sample
pub const MEM_ATTR_NAME: &str = "mem";
/// Component of command execution records
pub const COMMAND_COMPONENT: &str = "COMMAND";
/// A command must take strictly longer than this to count as slow
pub const SLOW_QUERY_THRESHOLD_MS: f64 = 100.0;

/// One of the metric categories a caller can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Cpu,
    Memory,
    SlowQueries,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "cpu"),
            MetricKind::Memory => write!(f, "memory"),
            MetricKind::SlowQueries => write!(f, "slow_queries"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cpu" => Ok(MetricKind::Cpu),
            "mem" | "memory" => Ok(MetricKind::Memory),
            "slow" | "slow_queries" | "slowqueries" => Ok(MetricKind::SlowQueries),
            _ => Err(format!("Invalid metric kind: {}", s)),
        }
    }
}

/// Which categories the extractor accumulates. All three by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSelection {
    pub cpu: bool,
    pub memory: bool,
    pub slow_queries: bool,
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl MetricSelection {
    pub fn all() -> Self {
        Self {
            cpu: true,
            memory: true,
            slow_queries: true,
        }
    }

    pub fn from_kinds(kinds: &[MetricKind]) -> Self {
        Self {
            cpu: kinds.contains(&MetricKind::Cpu),
            memory: kinds.contains(&MetricKind::Memory),
            slow_queries: kinds.contains(&MetricKind::SlowQueries),
        }
    }

    pub fn includes(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::SlowQueries => self.slow_queries,
        }
    }
}

/// Running, then final, result of scanning one or more log files.
///
/// While a scan is in progress `cpu_total` and `memory_total` are plain sums.
/// After [`MetricsAggregate::normalize`] they hold the mean per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsAggregate {
    #[serde(rename = "cpu")]
    pub cpu_total: f64,
    #[serde(rename = "memory")]
    pub memory_total: f64,
    pub slow_queries: Vec<Value>,
    pub slow_query_count: usize,
    #[serde(skip)]
    pub files_processed: usize,
    #[serde(skip)]
    pub lines_scanned: usize,
    #[serde(skip)]
    pub records_decoded: usize,
}

/// True for a `COMMAND` record with a namespace that ran longer than the threshold
pub fn is_slow_query(record: &LogRecord) -> bool {
    let is_command = record.component.as_deref() == Some(COMMAND_COMPONENT);
    let has_namespace = record.namespace().is_some_and(|ns| !ns.is_empty());
    let is_slow = record.millis().is_some_and(|ms| ms > SLOW_QUERY_THRESHOLD_MS);

    is_command && has_namespace && is_slow
}

impl MetricsAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every extraction rule to one record.
    ///
    /// Rules are independent: a single record can feed more than one metric.
    /// There is no deduplication, feeding a record twice counts it twice.
    pub fn record(&mut self, record: &LogRecord) {
        self.record_with(record, &MetricSelection::all());
    }

    /// Same as [`MetricsAggregate::record`], limited to the selected categories
    pub fn record_with(&mut self, record: &LogRecord, selection: &MetricSelection) {
        let name = record.attr_name();

        if selection.cpu && name == Some(CPU_ATTR_NAME) {
            self.cpu_total += record.attr_value().unwrap_or(0.0);
        }

        if selection.memory && name == Some(MEM_ATTR_NAME) {
            self.memory_total += record.attr_value().unwrap_or(0.0);
        }

        if selection.slow_queries && is_slow_query(record) {
            self.slow_queries.push(record.raw.clone());
            self.slow_query_count += 1;
        }
    }

    /// Turn the accumulated sums into per-file means.
    ///
    /// Divides by the number of files, not samples, and rounds half up.
    /// With zero files the aggregate is returned untouched.
    pub fn normalize(mut self, file_count: usize) -> Self {
        if file_count > 0 {
            let files = file_count as f64;
            self.cpu_total = round_half_up(self.cpu_total / files);
            self.memory_total = round_half_up(self.memory_total / files);
        }
        self.files_processed = file_count;
        self
    }

    /// Pretty JSON used as the narrative-generation payload
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
