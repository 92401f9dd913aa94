// ClusterLens Library - MongoDB log metrics and AI analysis
//
// Extracts CPU, memory and slow-query metrics from MongoDB structured logs,
// persists them, asks an AI provider for a diagnostic report and lets users
// chat about that report. Shared by the CLI and any embedding service.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

pub mod aggregator;
pub mod ai_provider;
pub mod analysis;
pub mod config;
pub mod conversation;
pub mod db_path;
pub mod input;
pub mod metrics;
pub mod parser;
pub mod store;

#[cfg(feature = "templating")]
pub mod report;

pub use aggregator::{aggregate_contents, aggregate_contents_with, aggregate_files};
pub use ai_provider::{
    create_provider, create_provider_with_options, AIError, AIProvider, ChatMessage, ChatRole,
    ClaudeProvider, CompletionRequest, OpenAIProvider, OpenRouterProvider, ProviderOptions,
};
pub use analysis::{AnalysisError, AnalysisOrchestrator, AnalysisRequest};
pub use config::Config;
pub use conversation::ReportConversation;
pub use input::{decode_log_bytes, read_log_file};
pub use metrics::{is_slow_query, MetricKind, MetricSelection, MetricsAggregate};
pub use parser::{classify_line, LogRecord};
pub use store::{
    AnalysisFilter, AnalysisOwner, AnalysisRecord, AnalysisStatus, AnalysisStore, AnalysisType,
    Cluster, MemoryStore, MetricsRecord, StoreError,
};

#[cfg(feature = "storage")]
pub use store::SqliteStore;

#[cfg(feature = "templating")]
pub use report::render_report_html;

/// Entry point tying configuration, providers and storage together
pub struct ClusterLens {
    config: Config,
}

impl ClusterLens {
    /// Create a ClusterLens instance from the config file (or defaults)
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self { config })
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a provider from config. `None` picks the configured default provider
    /// and its configured model.
    pub fn provider(&self, provider_name: Option<&str>, model: Option<&str>) -> Result<Arc<dyn AIProvider>> {
        let provider_name = provider_name
            .map(str::to_string)
            .unwrap_or_else(|| self.config.get_default_provider());

        let api_key = self.config.get_api_key(&provider_name).with_context(|| {
            format!(
                "No API key for provider '{}'. Set {}_API_KEY or add api_key to the config file",
                provider_name,
                provider_name.to_uppercase()
            )
        })?;

        let mut options = self.config.provider_options(&provider_name);
        if let Some(model) = model {
            options.model = Some(model.to_string());
        }

        let provider = create_provider_with_options(&provider_name, &api_key, options)?;
        debug!("Using {} with model {}", provider.get_provider_name(), provider.get_model());
        Ok(Arc::from(provider))
    }

    /// Open the configured SQLite database, creating it on first use
    #[cfg(feature = "storage")]
    pub async fn open_store(&self) -> Result<SqliteStore> {
        let path = self.config.get_database_path();
        SqliteStore::open(&path)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))
    }

    /// Read the files in order and fold them into one normalized aggregate
    pub async fn extract_metrics<P: AsRef<Path>>(
        &self,
        paths: &[P],
        selection: &MetricSelection,
    ) -> Result<MetricsAggregate> {
        let aggregate = aggregate_files(paths, selection).await?;
        info!(
            "Extracted {} slow queries from {} files",
            aggregate.slow_query_count, aggregate.files_processed
        );
        Ok(aggregate)
    }

    /// Extract metrics and run one analysis against the given store and provider
    pub async fn analyze_files<P: AsRef<Path>>(
        &self,
        store: Arc<dyn AnalysisStore>,
        provider: Arc<dyn AIProvider>,
        request: AnalysisRequest,
        paths: &[P],
        selection: &MetricSelection,
    ) -> Result<AnalysisRecord> {
        let aggregate = self.extract_metrics(paths, selection).await?;
        let record = AnalysisOrchestrator::new(store, provider)
            .run(request, &aggregate)
            .await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_requires_api_key() {
        let lens = ClusterLens::with_config(Config::default());

        // A provider name nobody sets a key for
        let err = match lens.provider(Some("nonexistent"), None) {
            Ok(_) => panic!("expected missing key error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("NONEXISTENT_API_KEY"));
    }

    #[test]
    fn test_provider_uses_configured_key_and_model_override() {
        let mut config = Config::default();
        if let Some(settings) = config.providers.openrouter.as_mut() {
            settings.api_key = Some("or-key".to_string());
        }
        let lens = ClusterLens::with_config(config);

        let provider = lens.provider(Some("openrouter"), Some("anthropic/claude-3-haiku")).unwrap();
        assert_eq!(provider.get_provider_name(), "openrouter");
        assert_eq!(provider.get_model(), "anthropic/claude-3-haiku");
    }

    #[tokio::test]
    async fn test_extract_metrics_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mongod.log");
        std::fs::write(
            &path,
            "{\"attr\":{\"name\":\"cpu\",\"value\":40}}\n{\"attr\":{\"name\":\"mem\",\"value\":200}}\n",
        )
        .unwrap();

        let lens = ClusterLens::with_config(Config::default());
        let aggregate = lens.extract_metrics(&[path], &MetricSelection::all()).await.unwrap();

        assert_eq!(aggregate.cpu_total, 40.0);
        assert_eq!(aggregate.memory_total, 200.0);
    }
}
