// Persist metrics, open an analysis record, narrate it, finalize it

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ai_provider::prompts::{SystemPromptGenerator, NO_RESPONSE_FALLBACK};
use crate::ai_provider::AIProvider;
use crate::metrics::MetricsAggregate;
use crate::store::{
    default_analysis_name, AnalysisOwner, AnalysisRecord, AnalysisStore, AnalysisType, NewAnalysis,
    StoreError,
};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to store metrics: {0}")]
    StoreMetrics(#[source] StoreError),
    #[error("Failed to create analysis: {0}")]
    CreateAnalysis(#[source] StoreError),
    #[error("Failed to finalize analysis {id}: {source}")]
    FinalizeAnalysis {
        id: String,
        #[source]
        source: StoreError,
    },
}

/// Who asked for the analysis and how it should be labelled
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub owner: AnalysisOwner,
    pub name: Option<String>,
    pub analysis_type: AnalysisType,
}

impl AnalysisRequest {
    pub fn new(owner: AnalysisOwner) -> Self {
        Self { owner, name: None, analysis_type: AnalysisType::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = analysis_type;
        self
    }
}

pub struct AnalysisOrchestrator {
    store: Arc<dyn AnalysisStore>,
    provider: Arc<dyn AIProvider>,
}

impl AnalysisOrchestrator {
    pub fn new(store: Arc<dyn AnalysisStore>, provider: Arc<dyn AIProvider>) -> Self {
        Self { store, provider }
    }

    /// Run one analysis for a finalized aggregate.
    ///
    /// Store failures before the provider call are fatal. A provider failure
    /// is not: the record is finalized as `error` with the fallback body and
    /// returned like any other record.
    pub async fn run(
        &self,
        request: AnalysisRequest,
        aggregate: &MetricsAggregate,
    ) -> Result<AnalysisRecord, AnalysisError> {
        info!(
            "Starting {} analysis for cluster {} with {} provider",
            request.analysis_type,
            request.owner.cluster_id,
            self.provider.get_provider_name()
        );

        let metrics = self
            .store
            .insert_metrics(&request.owner, aggregate)
            .await
            .map_err(AnalysisError::StoreMetrics)?;
        debug!("Stored metrics {}", metrics.id);

        let new_analysis = NewAnalysis {
            name: request.name.unwrap_or_else(|| default_analysis_name(Utc::now())),
            log_metrics_id: metrics.id.clone(),
            owner: request.owner,
            analysis_type: request.analysis_type,
        };

        let pending = match self.store.create_analysis(new_analysis).await {
            Ok(record) => record,
            Err(e) => {
                // Leave no orphaned metrics row behind
                if let Err(cleanup) = self.store.delete_metrics(&metrics.id).await {
                    error!("Failed to remove orphaned metrics {}: {}", metrics.id, cleanup);
                }
                return Err(AnalysisError::CreateAnalysis(e));
            }
        };

        let finalized = match self.narrate(aggregate, pending.analysis_type).await {
            Some(report) => self.store.complete_analysis(&pending.id, &report).await,
            None => self.store.fail_analysis(&pending.id, NO_RESPONSE_FALLBACK).await,
        };

        let record = finalized.map_err(|source| AnalysisError::FinalizeAnalysis {
            id: pending.id.clone(),
            source,
        })?;

        info!("Analysis {} finished with status {}", record.id, record.status);
        Ok(record)
    }

    /// One provider call, no retry. `None` means nothing usable came back.
    async fn narrate(&self, aggregate: &MetricsAggregate, analysis_type: AnalysisType) -> Option<String> {
        let request = match SystemPromptGenerator::analysis_request(aggregate, analysis_type) {
            Ok(request) => request,
            Err(e) => {
                warn!("Could not serialize metrics for the prompt: {}", e);
                return None;
            }
        };

        match self.provider.complete(request).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!("{} returned an empty report", self.provider.get_provider_name());
                None
            }
            Err(e) => {
                warn!("{} analysis failed: {}", self.provider.get_provider_name(), e);
                None
            }
        }
    }
}
