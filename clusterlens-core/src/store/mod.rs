// Persistence boundary for metrics and analysis records
//
// The orchestrator only talks to the `AnalysisStore` trait. `SqliteStore` is
// the production adapter; `MemoryStore` keeps everything in process.

use async_trait::async_trait;
use thiserror::Error;

use crate::metrics::MetricsAggregate;

pub mod memory;
pub mod models;

#[cfg(feature = "storage")]
pub mod sqlite;

pub use memory::MemoryStore;
pub use models::{
    default_analysis_name, AnalysisFilter, AnalysisOwner, AnalysisRecord, AnalysisStatus,
    AnalysisType, Cluster, MetricsRecord, NewAnalysis,
};

#[cfg(feature = "storage")]
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "storage")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("analysis {id} is already {status}")]
    AlreadyFinalized { id: String, status: AnalysisStatus },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Persist a finalized aggregate tagged with its owner
    async fn insert_metrics(
        &self,
        owner: &AnalysisOwner,
        aggregate: &MetricsAggregate,
    ) -> Result<MetricsRecord, StoreError>;

    async fn get_metrics(&self, id: &str) -> Result<Option<MetricsRecord>, StoreError>;

    /// Remove a metrics row that no analysis refers to
    async fn delete_metrics(&self, id: &str) -> Result<(), StoreError>;

    /// Create a `pending` analysis record
    async fn create_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError>;

    /// `pending → complete`, storing the report body.
    ///
    /// Fails with [`StoreError::AlreadyFinalized`] for a record that has left
    /// `pending`, so a completed report is never rewritten.
    async fn complete_analysis(&self, id: &str, report: &str) -> Result<AnalysisRecord, StoreError>;

    /// `pending → error`, storing the fallback body
    async fn fail_analysis(&self, id: &str, report: &str) -> Result<AnalysisRecord, StoreError>;

    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>, StoreError>;

    async fn list_analyses(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRecord>, StoreError>;
}
