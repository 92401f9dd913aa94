// Pipeline integration tests: log files in, stored analysis and chat out

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use clusterlens_core::*;
use serde_json::json;
use tempfile::tempdir;

const SCENARIO: &str = r#"{"attr":{"name":"cpu","value":40}}
{"attr":{"name":"mem","value":200}}
{"component":"COMMAND","attr":{"ns":"db.coll","millis":150}}
not-json
"#;

struct FixedProvider {
    reply: Result<&'static str, ()>,
    calls: AtomicUsize,
}

impl FixedProvider {
    fn ok(reply: &'static str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(reply), calls: AtomicUsize::new(0) })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self { reply: Err(()), calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl AIProvider for FixedProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, AIError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .map(str::to_string)
            .map_err(|_| AIError::InvalidResponse("HTTP 502 Bad Gateway: upstream".to_string()))
    }

    fn get_provider_name(&self) -> &str {
        "fixed"
    }

    fn get_model(&self) -> &str {
        "fixed-1"
    }
}

fn owner() -> AnalysisOwner {
    AnalysisOwner::new("cluster-prod", "user-42", "org-7")
}

#[test]
fn test_scenario_single_file() {
    let aggregate = aggregate_contents([SCENARIO]);

    assert_eq!(aggregate.cpu_total, 40.0);
    assert_eq!(aggregate.memory_total, 200.0);
    assert_eq!(aggregate.slow_query_count, 1);
    assert_eq!(
        aggregate.slow_queries,
        vec![json!({"component": "COMMAND", "attr": {"ns": "db.coll", "millis": 150}})]
    );
}

#[test]
fn test_noise_lines_never_decode() {
    for line in ["not-json", "{", "[1,2,3]", "42", "\"text\"", "", "   ", "{\"a\":1}}"] {
        assert!(classify_line(line).is_none(), "line {:?} should not decode", line);
    }
}

#[test]
fn test_duplicate_records_are_counted_twice() {
    let record = classify_line(r#"{"component":"COMMAND","attr":{"name":"cpu","value":5,"ns":"a.b","millis":300}}"#)
        .unwrap();
    let mut aggregate = MetricsAggregate::new();

    aggregate.record(&record);
    aggregate.record(&record);

    assert_eq!(aggregate.cpu_total, 10.0);
    assert_eq!(aggregate.slow_query_count, 2);
    assert_eq!(aggregate.slow_queries.len(), 2);
}

#[test]
fn test_mean_is_per_file_not_per_sample() {
    // File A has two samples, B has one: (10 + 20 + 31) / 2 files = 30.5 -> 31
    let a = "{\"attr\":{\"name\":\"cpu\",\"value\":10}}\n{\"attr\":{\"name\":\"cpu\",\"value\":20}}\n";
    let b = "{\"attr\":{\"name\":\"cpu\",\"value\":31}}\n";

    let aggregate = aggregate_contents([a, b]);
    assert_eq!(aggregate.cpu_total, 31.0);
}

#[test]
fn test_slow_query_threshold() {
    let lines = [
        r#"{"component":"COMMAND","attr":{"ns":"db.c","millis":100}}"#,
        r#"{"component":"COMMAND","attr":{"ns":"db.c","millis":101}}"#,
        r#"{"component":"COMMAND","attr":{"millis":5000}}"#,
    ]
    .join("\n");

    let aggregate = aggregate_contents([lines]);

    assert_eq!(aggregate.slow_query_count, 1);
    assert_eq!(aggregate.slow_queries[0]["attr"]["millis"], json!(101));
}

#[test]
fn test_short_component_key_is_not_a_slow_query() {
    let aggregate = aggregate_contents([r#"{"c":"COMMAND","attr":{"ns":"db.c","millis":500}}"#]);

    assert_eq!(aggregate.slow_query_count, 0);
    assert!(aggregate.slow_queries.is_empty());
}

#[tokio::test]
async fn test_stray_byte_keeps_other_lines_intact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mongod.log");
    let mut bytes = r#"{"component":"COMMAND","attr":{"ns":"café.orders","millis":300}}"#
        .as_bytes()
        .to_vec();
    bytes.extend_from_slice(b"\n\xFF garbage\n");
    std::fs::write(&path, bytes).unwrap();

    let aggregate = aggregate_files(&[path], &MetricSelection::all()).await.unwrap();

    assert_eq!(aggregate.slow_query_count, 1);
    assert_eq!(aggregate.slow_queries[0]["attr"]["ns"], json!("café.orders"));
}

#[test]
fn test_slow_queries_keep_file_then_line_order() {
    let a = [
        r#"{"component":"COMMAND","attr":{"ns":"a.one","millis":200}}"#,
        r#"{"attr":{"name":"cpu","value":1}}"#,
        r#"{"component":"COMMAND","attr":{"ns":"a.three","millis":200}}"#,
    ]
    .join("\n");
    let b = [
        r#"{"attr":{"name":"mem","value":1}}"#,
        r#"{"component":"COMMAND","attr":{"ns":"b.two","millis":200}}"#,
    ]
    .join("\n");

    let aggregate = aggregate_contents([a, b]);
    let namespaces: Vec<&str> = aggregate
        .slow_queries
        .iter()
        .filter_map(|q| q["attr"]["ns"].as_str())
        .collect();

    assert_eq!(namespaces, vec!["a.one", "a.three", "b.two"]);
}

#[tokio::test]
async fn test_files_on_disk_pipeline() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("mongod-1.log");
    let second = dir.path().join("mongod-2.log");
    std::fs::write(&first, SCENARIO).unwrap();
    std::fs::write(&second, "{\"attr\":{\"name\":\"cpu\",\"value\":20}}\n").unwrap();

    let aggregate = aggregate_files(&[first, second], &MetricSelection::all()).await.unwrap();

    assert_eq!(aggregate.cpu_total, 30.0);
    assert_eq!(aggregate.memory_total, 100.0);
    assert_eq!(aggregate.files_processed, 2);
}

#[tokio::test]
async fn test_analysis_degrades_when_provider_fails() {
    let store = Arc::new(MemoryStore::new());
    let provider = FixedProvider::unreachable();
    let orchestrator = AnalysisOrchestrator::new(store.clone(), provider.clone());

    let record = orchestrator
        .run(AnalysisRequest::new(owner()), &aggregate_contents([SCENARIO]))
        .await
        .unwrap();

    assert_eq!(record.status, AnalysisStatus::Error);
    assert_eq!(record.html_report.as_deref(), Some("No response from AI"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let stored = store.get_analysis(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AnalysisStatus::Error);
    assert_eq!(store.metrics_count(), 1);
}

#[cfg(feature = "storage")]
#[tokio::test]
async fn test_sqlite_analysis_then_chat() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("clusterlens.db")).await.unwrap());
    let provider = FixedProvider::ok("Create an index on db.coll to avoid the 150ms scan.");
    let lens = ClusterLens::with_config(Config::default());

    let log = dir.path().join("mongod.log");
    std::fs::write(&log, SCENARIO).unwrap();

    let record = lens
        .analyze_files(
            store.clone(),
            provider.clone(),
            AnalysisRequest::new(owner()).with_type(AnalysisType::SlowQueries),
            &[log],
            &MetricSelection::all(),
        )
        .await
        .unwrap();

    assert_eq!(record.status, AnalysisStatus::Complete);
    let metrics = store.get_metrics(&record.log_metrics_id).await.unwrap().unwrap();
    assert_eq!(metrics.cpu, 40.0);
    assert_eq!(metrics.slow_query_count, 1);
    assert_eq!(metrics.cluster_id, "cluster-prod");

    let stored = store.get_analysis(&record.id).await.unwrap().unwrap();
    let mut conversation = ReportConversation::for_analysis(&stored).unwrap();
    let reply = conversation
        .send(provider.as_ref(), "Which field should the index cover?")
        .await
        .unwrap();

    assert!(reply.is_some());
    assert_eq!(conversation.transcript().len(), 2);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[cfg(feature = "templating")]
#[test]
fn test_rendered_report_escapes_model_output() {
    let mut record = AnalysisRecord::new(store::NewAnalysis {
        name: "escape check".to_string(),
        log_metrics_id: "m".to_string(),
        owner: owner(),
        analysis_type: AnalysisType::Other,
    });
    record.html_report = Some("<img src=x onerror=alert(1)>".to_string());

    let html = render_report_html(&record).unwrap();
    assert!(!html.contains("<img src=x"));
}
