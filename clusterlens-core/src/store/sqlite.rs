// SQLite-backed store for clusters, log metrics and AI analyses

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, error, info};

use crate::metrics::MetricsAggregate;
use crate::store::{
    AnalysisFilter, AnalysisOwner, AnalysisRecord, AnalysisStatus, AnalysisStore, Cluster,
    MetricsRecord, NewAnalysis, StoreError,
};

const REQUIRED_TABLES: [&str; 3] = ["clusters", "log_metrics", "ai_analyses"];

/// Initialize database connection pool with WAL mode enabled
pub async fn create_pool<P: AsRef<Path>>(database_path: P) -> Result<SqlitePool> {
    let path_str = database_path
        .as_ref()
        .to_str()
        .context("Invalid database path")?;

    info!("Creating database connection pool for: {}", path_str);

    let connect_options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .context("Failed to create database connection pool")?;

    debug!("Database connection pool created successfully");
    Ok(pool)
}

/// Split a migration script into executable statements
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed.starts_with("--") && current.is_empty()) {
            continue;
        }

        match trimmed.find("--") {
            Some(pos) => current.push_str(trimmed[..pos].trim_end()),
            None => current.push_str(trimmed),
        }
        current.push(' ');

        if current.trim_end().ends_with(';') {
            let stmt = current.trim().trim_end_matches(';').trim().to_string();
            if !stmt.is_empty() {
                statements.push(stmt);
            }
            current.clear();
        }
    }

    statements
}

/// Create database schema from migration SQL
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    info!("Creating database schema");

    let schema_sql = include_str!("../../migrations/001_initial_schema.sql");

    for statement in split_statements(schema_sql) {
        debug!("Executing: {}", &statement[..statement.len().min(80)]);
        sqlx::query(&statement)
            .execute(pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to execute schema statement: {}",
                    &statement[..statement.len().min(200)]
                )
            })?;
    }

    info!("Database schema created successfully");
    Ok(())
}

/// Verify database schema is correctly initialized
pub async fn verify_schema(pool: &SqlitePool) -> Result<bool> {
    debug!("Verifying database schema");

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('clusters', 'log_metrics', 'ai_analyses')",
    )
    .fetch_all(pool)
    .await
    .context("Failed to query table existence")?;

    let has_all_tables = tables.len() == REQUIRED_TABLES.len();
    if has_all_tables {
        debug!("All required tables exist");
    } else {
        error!("Missing required tables. Found: {:?}", tables);
    }

    Ok(has_all_tables)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and make sure the schema exists
    pub async fn open<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let database_path = database_path.as_ref();
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let pool = create_pool(database_path).await?;
        create_schema(&pool).await?;

        if !verify_schema(&pool).await? {
            anyhow::bail!("Database schema verification failed");
        }

        info!("Database initialized successfully at: {:?}", database_path);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_cluster(&self, cluster: &Cluster) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO clusters (id, name, description, organization_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&cluster.id)
        .bind(&cluster.name)
        .bind(&cluster.description)
        .bind(&cluster.organization_id)
        .bind(cluster.created_at)
        .execute(&self.pool)
        .await?;

        info!("Registered cluster {} ({})", cluster.name, cluster.id);
        Ok(())
    }

    pub async fn get_cluster(&self, id: &str) -> Result<Option<Cluster>, StoreError> {
        let cluster = sqlx::query_as::<_, Cluster>("SELECT * FROM clusters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cluster)
    }

    pub async fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        let clusters = sqlx::query_as::<_, Cluster>("SELECT * FROM clusters ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(clusters)
    }

    async fn finalize(
        &self,
        id: &str,
        status: AnalysisStatus,
        report: &str,
    ) -> Result<AnalysisRecord, StoreError> {
        let result = sqlx::query(
            "UPDATE ai_analyses SET status = ?, html_report = ?, completed_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(status.to_string())
        .bind(report)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        let record = self.get_analysis(id).await?;
        match record {
            Some(record) if result.rows_affected() == 1 => {
                debug!("Analysis {} finalized as {}", id, status);
                Ok(record)
            }
            Some(record) => Err(StoreError::AlreadyFinalized { id: id.to_string(), status: record.status }),
            None => Err(StoreError::NotFound { kind: "analysis", id: id.to_string() }),
        }
    }
}

#[async_trait]
impl AnalysisStore for SqliteStore {
    async fn insert_metrics(
        &self,
        owner: &AnalysisOwner,
        aggregate: &MetricsAggregate,
    ) -> Result<MetricsRecord, StoreError> {
        let record = MetricsRecord::new(owner, aggregate);
        let slow_queries = serde_json::to_string(&record.slow_queries)?;

        sqlx::query(
            "INSERT INTO log_metrics (
                id, cpu, memory, slow_queries, slow_query_count,
                cluster_id, user_id, organization_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.cpu)
        .bind(record.memory)
        .bind(slow_queries)
        .bind(record.slow_query_count)
        .bind(&record.cluster_id)
        .bind(&record.user_id)
        .bind(&record.organization_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Stored metrics {} for cluster {}", record.id, record.cluster_id);
        Ok(record)
    }

    async fn get_metrics(&self, id: &str) -> Result<Option<MetricsRecord>, StoreError> {
        let record = sqlx::query_as::<_, MetricsRecord>("SELECT * FROM log_metrics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn delete_metrics(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM log_metrics WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError> {
        let record = AnalysisRecord::new(new);

        sqlx::query(
            "INSERT INTO ai_analyses (
                id, name, log_metrics_id, cluster_id, user_id, organization_id,
                status, analysis_type, html_report, created_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, NULL)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.log_metrics_id)
        .bind(&record.cluster_id)
        .bind(&record.user_id)
        .bind(&record.organization_id)
        .bind(record.status.to_string())
        .bind(record.analysis_type.to_string())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        info!("Created analysis {} ({})", record.id, record.name);
        Ok(record)
    }

    async fn complete_analysis(&self, id: &str, report: &str) -> Result<AnalysisRecord, StoreError> {
        self.finalize(id, AnalysisStatus::Complete, report).await
    }

    async fn fail_analysis(&self, id: &str, report: &str) -> Result<AnalysisRecord, StoreError> {
        self.finalize(id, AnalysisStatus::Error, report).await
    }

    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        let record = sqlx::query_as::<_, AnalysisRecord>("SELECT * FROM ai_analyses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_analyses(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRecord>, StoreError> {
        let mut sql = String::from("SELECT * FROM ai_analyses WHERE 1=1");
        if filter.cluster_id.is_some() {
            sql.push_str(" AND cluster_id = ?");
        }
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, AnalysisRecord>(&sql);
        if let Some(cluster_id) = &filter.cluster_id {
            query = query.bind(cluster_id);
        }
        if let Some(status) = filter.status {
            query = query.bind(status.to_string());
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }
}
