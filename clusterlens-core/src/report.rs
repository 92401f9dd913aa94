// HTML rendering of stored analyses
//
// Report bodies come straight from a language model and are treated as
// untrusted text: askama escapes them like every other field.

use anyhow::Result;
use askama::Template;

use crate::store::{AnalysisRecord, AnalysisType};

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    id: String,
    name: String,
    cluster_id: String,
    log_metrics_id: String,
    status: String,
    analysis_type: String,
    type_icon: &'static str,
    created_at: String,
    completed_at: String,
    report: String,
}

pub fn type_icon(analysis_type: AnalysisType) -> &'static str {
    match analysis_type {
        AnalysisType::Performance => "⚡",
        AnalysisType::SlowQueries => "🐢",
        AnalysisType::Summary => "📋",
        AnalysisType::Other => "🔍",
    }
}

pub fn render_report_html(record: &AnalysisRecord) -> Result<String> {
    let template = ReportTemplate {
        id: record.id.clone(),
        name: record.name.clone(),
        cluster_id: record.cluster_id.clone(),
        log_metrics_id: record.log_metrics_id.clone(),
        status: record.status.to_string(),
        analysis_type: record.analysis_type.to_string(),
        type_icon: type_icon(record.analysis_type),
        created_at: record.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        completed_at: record
            .completed_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string()),
        report: record.html_report.clone().unwrap_or_default(),
    };

    template.render().map_err(|e| anyhow::anyhow!("Template rendering failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AnalysisOwner, AnalysisStatus, NewAnalysis};

    fn record(report: &str) -> AnalysisRecord {
        let mut record = AnalysisRecord::new(NewAnalysis {
            name: "nightly".to_string(),
            log_metrics_id: "metrics-1".to_string(),
            owner: AnalysisOwner::new("prod", "u", "o"),
            analysis_type: AnalysisType::SlowQueries,
        });
        record.status = AnalysisStatus::Complete;
        record.html_report = Some(report.to_string());
        record
    }

    #[test]
    fn test_report_body_is_escaped() {
        let html = render_report_html(&record("<script>alert('x')</script>")).unwrap();

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_metadata_rendered() {
        let html = render_report_html(&record("Add an index on orders.status")).unwrap();

        assert!(html.contains("nightly"));
        assert!(html.contains("Add an index on orders.status"));
        assert!(html.contains("status-complete"));
        assert!(html.contains("slow_queries"));
        assert!(html.contains(type_icon(AnalysisType::SlowQueries)));
    }
}
