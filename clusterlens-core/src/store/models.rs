// Data models for clusters, stored metrics and analysis records

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque identifiers of whoever requested an analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOwner {
    pub cluster_id: String,
    pub user_id: String,
    pub organization_id: String,
}

impl AnalysisOwner {
    pub fn new(
        cluster_id: impl Into<String>,
        user_id: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            user_id: user_id.into(),
            organization_id: organization_id.into(),
        }
    }
}

/// A database cluster that log files belong to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "storage", derive(sqlx::FromRow))]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    pub fn new(name: String, description: Option<String>, organization_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            organization_id,
            created_at: Utc::now(),
        }
    }
}

/// Status of an analysis: `pending` until the narrative call resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Complete,
    Error,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStatus::Pending => write!(f, "pending"),
            AnalysisStatus::Complete => write!(f, "complete"),
            AnalysisStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AnalysisStatus::Pending),
            "complete" => Ok(AnalysisStatus::Complete),
            "error" => Ok(AnalysisStatus::Error),
            _ => Err(format!("Invalid analysis status: {}", s)),
        }
    }
}

/// Kind of analysis requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Performance,
    SlowQueries,
    Summary,
    #[default]
    Other,
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisType::Performance => write!(f, "performance"),
            AnalysisType::SlowQueries => write!(f, "slow_queries"),
            AnalysisType::Summary => write!(f, "summary"),
            AnalysisType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "performance" => Ok(AnalysisType::Performance),
            "slow_queries" => Ok(AnalysisType::SlowQueries),
            "summary" => Ok(AnalysisType::Summary),
            "other" => Ok(AnalysisType::Other),
            _ => Err(format!("Invalid analysis type: {}", s)),
        }
    }
}

impl AnalysisType {
    /// Lenient decoding for stored rows: anything unknown reads as `Other`
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Persisted form of a finalized [`crate::MetricsAggregate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub id: String,
    pub cpu: f64,
    pub memory: f64,
    pub slow_queries: Vec<Value>,
    pub slow_query_count: i64,
    pub cluster_id: String,
    pub user_id: String,
    pub organization_id: String,
    pub created_at: DateTime<Utc>,
}

impl MetricsRecord {
    pub fn new(owner: &AnalysisOwner, aggregate: &crate::MetricsAggregate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            cpu: aggregate.cpu_total,
            memory: aggregate.memory_total,
            slow_queries: aggregate.slow_queries.clone(),
            slow_query_count: aggregate.slow_query_count as i64,
            cluster_id: owner.cluster_id.clone(),
            user_id: owner.user_id.clone(),
            organization_id: owner.organization_id.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(feature = "storage")]
impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for MetricsRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let slow_queries_str: String = row.try_get("slow_queries")?;
        let slow_queries = serde_json::from_str(&slow_queries_str).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            )))
        })?;

        Ok(MetricsRecord {
            id: row.try_get("id")?,
            cpu: row.try_get("cpu")?,
            memory: row.try_get("memory")?,
            slow_queries,
            slow_query_count: row.try_get("slow_query_count")?,
            cluster_id: row.try_get("cluster_id")?,
            user_id: row.try_get("user_id")?,
            organization_id: row.try_get("organization_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Input for creating an analysis record
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub name: String,
    pub log_metrics_id: String,
    pub owner: AnalysisOwner,
    pub analysis_type: AnalysisType,
}

/// Default name, e.g. `AI Analysis - 2024-03-01T10:00:00.000Z`
pub fn default_analysis_name(at: DateTime<Utc>) -> String {
    format!("AI Analysis - {}", at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// One completed or in-progress analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub name: String,
    pub log_metrics_id: String,
    pub cluster_id: String,
    pub user_id: String,
    pub organization_id: String,
    pub status: AnalysisStatus,
    pub analysis_type: AnalysisType,
    pub html_report: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisRecord {
    pub fn new(new: NewAnalysis) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            log_metrics_id: new.log_metrics_id,
            cluster_id: new.owner.cluster_id,
            user_id: new.owner.user_id,
            organization_id: new.owner.organization_id,
            status: AnalysisStatus::Pending,
            analysis_type: new.analysis_type,
            html_report: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != AnalysisStatus::Pending
    }
}

#[cfg(feature = "storage")]
impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for AnalysisRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let status_str: String = row.try_get("status")?;
        let status = status_str.parse::<AnalysisStatus>().map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            )))
        })?;
        let type_str: String = row.try_get("analysis_type")?;

        Ok(AnalysisRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            log_metrics_id: row.try_get("log_metrics_id")?,
            cluster_id: row.try_get("cluster_id")?,
            user_id: row.try_get("user_id")?,
            organization_id: row.try_get("organization_id")?,
            status,
            analysis_type: AnalysisType::from_stored(&type_str),
            html_report: row.try_get("html_report")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

/// Filters for listing analyses, newest first
#[derive(Debug, Clone, Default)]
pub struct AnalysisFilter {
    pub cluster_id: Option<String>,
    pub status: Option<AnalysisStatus>,
    pub limit: Option<i64>,
}
