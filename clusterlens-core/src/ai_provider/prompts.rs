use crate::ai_provider::{ChatMessage, CompletionRequest};
use crate::metrics::MetricsAggregate;
use crate::store::AnalysisType;

/// Report body stored when narrative generation produced nothing usable
pub const NO_RESPONSE_FALLBACK: &str = "No response from AI";

/// Sampling temperature for follow-up questions about a report
pub const CHAT_TEMPERATURE: f32 = 0.4;

pub struct SystemPromptGenerator;

impl SystemPromptGenerator {
    /// Fixed diagnostic persona for report generation
    pub fn analysis_system_prompt() -> &'static str {
        "You are a MongoDB expert helping users diagnose performance issues from MongoDB log metrics. Provide detailed findings and expert recommendations."
    }

    /// User turn carrying the serialized aggregate
    pub fn analysis_user_prompt(
        aggregate: &MetricsAggregate,
        analysis_type: AnalysisType,
    ) -> serde_json::Result<String> {
        let metrics = aggregate.to_pretty_json()?;
        let mut prompt = format!("Here are the extracted metrics from MongoDB logs:\n{}", metrics);

        if let Some(focus) = Self::focus_prompt(analysis_type) {
            prompt.push_str("\n\n");
            prompt.push_str(focus);
        }

        Ok(prompt)
    }

    fn focus_prompt(analysis_type: AnalysisType) -> Option<&'static str> {
        match analysis_type {
            AnalysisType::Performance => Some(
                "Focus on CPU and memory pressure and how it relates to the workload.",
            ),
            AnalysisType::SlowQueries => Some(
                "Focus on the slow queries: group them by namespace and suggest indexes or query changes.",
            ),
            AnalysisType::Summary => Some("Keep the findings to a short executive summary."),
            AnalysisType::Other => None,
        }
    }

    pub fn analysis_request(
        aggregate: &MetricsAggregate,
        analysis_type: AnalysisType,
    ) -> serde_json::Result<CompletionRequest> {
        Ok(CompletionRequest::new(vec![
            ChatMessage::system(Self::analysis_system_prompt()),
            ChatMessage::user(Self::analysis_user_prompt(aggregate, analysis_type)?),
        ]))
    }

    /// System directive that binds a conversation to one report, verbatim
    pub fn chat_system_prompt(report: &str) -> String {
        format!(
            "You are a senior MongoDB expert. Answer the user's questions based on this analysis context:\n\n{}\n",
            report
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_provider::ChatRole;

    #[test]
    fn test_analysis_request_embeds_metrics() {
        let aggregate = MetricsAggregate {
            cpu_total: 40.0,
            memory_total: 200.0,
            ..Default::default()
        };

        let request = SystemPromptGenerator::analysis_request(&aggregate, AnalysisType::Other).unwrap();

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert!(request.messages[0].content.contains("MongoDB expert"));
        assert_eq!(request.messages[1].role, ChatRole::User);
        assert!(request.messages[1]
            .content
            .starts_with("Here are the extracted metrics from MongoDB logs:\n"));
        assert!(request.messages[1].content.contains("\"cpu\": 40.0"));
        assert!(request.messages[1].content.contains("\"slow_query_count\": 0"));
    }

    #[test]
    fn test_focus_only_for_typed_analyses() {
        let aggregate = MetricsAggregate::default();

        let other = SystemPromptGenerator::analysis_user_prompt(&aggregate, AnalysisType::Other).unwrap();
        let slow =
            SystemPromptGenerator::analysis_user_prompt(&aggregate, AnalysisType::SlowQueries).unwrap();

        assert!(!other.contains("Focus on"));
        assert!(slow.contains("group them by namespace"));
    }

    #[test]
    fn test_chat_prompt_contains_report_verbatim() {
        let report = "<h2>Findings</h2>\n<p>Missing index on orders.status</p>";
        let prompt = SystemPromptGenerator::chat_system_prompt(report);

        assert!(prompt.starts_with("You are a senior MongoDB expert."));
        assert!(prompt.contains(report));
    }
}
