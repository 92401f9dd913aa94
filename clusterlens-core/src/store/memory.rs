use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

use crate::metrics::MetricsAggregate;
use crate::store::{
    AnalysisFilter, AnalysisOwner, AnalysisRecord, AnalysisStatus, AnalysisStore, MetricsRecord,
    NewAnalysis, StoreError,
};

#[derive(Default)]
struct MemoryState {
    metrics: Vec<MetricsRecord>,
    analyses: Vec<AnalysisRecord>,
}

/// Process-local store, handy for one-shot runs and tests
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    pub fn metrics_count(&self) -> usize {
        self.lock().map(|s| s.metrics.len()).unwrap_or(0)
    }

    pub fn analysis_count(&self) -> usize {
        self.lock().map(|s| s.analyses.len()).unwrap_or(0)
    }

    fn finalize(
        &self,
        id: &str,
        status: AnalysisStatus,
        report: &str,
    ) -> Result<AnalysisRecord, StoreError> {
        let mut state = self.lock()?;
        let record = state
            .analyses
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound { kind: "analysis", id: id.to_string() })?;

        if record.status != AnalysisStatus::Pending {
            return Err(StoreError::AlreadyFinalized { id: id.to_string(), status: record.status });
        }

        record.status = status;
        record.html_report = Some(report.to_string());
        record.completed_at = Some(Utc::now());
        Ok(record.clone())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn insert_metrics(
        &self,
        owner: &AnalysisOwner,
        aggregate: &MetricsAggregate,
    ) -> Result<MetricsRecord, StoreError> {
        let record = MetricsRecord::new(owner, aggregate);
        self.lock()?.metrics.push(record.clone());
        Ok(record)
    }

    async fn get_metrics(&self, id: &str) -> Result<Option<MetricsRecord>, StoreError> {
        Ok(self.lock()?.metrics.iter().find(|m| m.id == id).cloned())
    }

    async fn delete_metrics(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.metrics.retain(|m| m.id != id);
        Ok(())
    }

    async fn create_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError> {
        let mut state = self.lock()?;
        if !state.metrics.iter().any(|m| m.id == new.log_metrics_id) {
            return Err(StoreError::NotFound { kind: "metrics", id: new.log_metrics_id });
        }

        let record = AnalysisRecord::new(new);
        state.analyses.push(record.clone());
        Ok(record)
    }

    async fn complete_analysis(&self, id: &str, report: &str) -> Result<AnalysisRecord, StoreError> {
        self.finalize(id, AnalysisStatus::Complete, report)
    }

    async fn fail_analysis(&self, id: &str, report: &str) -> Result<AnalysisRecord, StoreError> {
        self.finalize(id, AnalysisStatus::Error, report)
    }

    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(self.lock()?.analyses.iter().find(|a| a.id == id).cloned())
    }

    async fn list_analyses(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRecord>, StoreError> {
        let state = self.lock()?;
        let mut analyses: Vec<AnalysisRecord> = state
            .analyses
            .iter()
            .filter(|a| filter.cluster_id.as_deref().map_or(true, |c| a.cluster_id == c))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();

        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            analyses.truncate(limit.max(0) as usize);
        }
        Ok(analyses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AnalysisType;

    fn owner() -> AnalysisOwner {
        AnalysisOwner::new("cluster-1", "user-1", "org-1")
    }

    async fn pending(store: &MemoryStore) -> AnalysisRecord {
        let metrics = store.insert_metrics(&owner(), &MetricsAggregate::default()).await.unwrap();
        store
            .create_analysis(NewAnalysis {
                name: "test".to_string(),
                log_metrics_id: metrics.id,
                owner: owner(),
                analysis_type: AnalysisType::Other,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_complete_is_final() {
        let store = MemoryStore::new();
        let analysis = pending(&store).await;

        let done = store.complete_analysis(&analysis.id, "<p>ok</p>").await.unwrap();
        assert_eq!(done.status, AnalysisStatus::Complete);
        assert_eq!(done.html_report.as_deref(), Some("<p>ok</p>"));
        assert!(done.completed_at.is_some());

        let again = store.complete_analysis(&analysis.id, "rewritten").await;
        assert!(matches!(again, Err(StoreError::AlreadyFinalized { .. })));
        let failed = store.fail_analysis(&analysis.id, "nope").await;
        assert!(matches!(failed, Err(StoreError::AlreadyFinalized { .. })));

        let stored = store.get_analysis(&analysis.id).await.unwrap().unwrap();
        assert_eq!(stored.html_report.as_deref(), Some("<p>ok</p>"));
    }

    #[tokio::test]
    async fn test_create_analysis_requires_metrics() {
        let store = MemoryStore::new();
        let result = store
            .create_analysis(NewAnalysis {
                name: "orphan".to_string(),
                log_metrics_id: "missing".to_string(),
                owner: owner(),
                analysis_type: AnalysisType::Other,
            })
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { kind: "metrics", .. })));
    }

    #[tokio::test]
    async fn test_list_filters_by_cluster() {
        let store = MemoryStore::new();
        pending(&store).await;
        let metrics = store
            .insert_metrics(&AnalysisOwner::new("cluster-2", "u", "o"), &MetricsAggregate::default())
            .await
            .unwrap();
        store
            .create_analysis(NewAnalysis {
                name: "other cluster".to_string(),
                log_metrics_id: metrics.id,
                owner: AnalysisOwner::new("cluster-2", "u", "o"),
                analysis_type: AnalysisType::Summary,
            })
            .await
            .unwrap();

        let filter = AnalysisFilter { cluster_id: Some("cluster-2".to_string()), ..Default::default() };
        let analyses = store.list_analyses(&filter).await.unwrap();

        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].name, "other cluster");
        assert_eq!(store.list_analyses(&AnalysisFilter::default()).await.unwrap().len(), 2);
    }
}
