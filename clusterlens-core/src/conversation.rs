use tracing::{debug, warn};

use crate::ai_provider::prompts::{SystemPromptGenerator, CHAT_TEMPERATURE};
use crate::ai_provider::{AIError, AIProvider, ChatMessage, CompletionRequest};
use crate::store::AnalysisRecord;

/// Chat transcript bound to one report.
///
/// The report is sent as the system directive on every turn and never becomes
/// part of the transcript. Turns are appended in call order and replayed in
/// full; `&mut self` keeps turns on one transcript serialized.
#[derive(Debug, Clone)]
pub struct ReportConversation {
    analysis_id: Option<String>,
    report: String,
    transcript: Vec<ChatMessage>,
}

impl ReportConversation {
    pub fn new(report: impl Into<String>) -> Self {
        Self { analysis_id: None, report: report.into(), transcript: Vec::new() }
    }

    /// Bind to a stored analysis. Returns `None` when the record has no report body.
    pub fn for_analysis(record: &AnalysisRecord) -> Option<Self> {
        let report = record.html_report.as_ref()?;
        Some(Self {
            analysis_id: Some(record.id.clone()),
            report: report.clone(),
            transcript: Vec::new(),
        })
    }

    pub fn analysis_id(&self) -> Option<&str> {
        self.analysis_id.as_deref()
    }

    pub fn report(&self) -> &str {
        &self.report
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Append the user turn and build the request for it.
    ///
    /// Blank input is a no-op and yields `None`.
    pub fn begin_turn(&mut self, input: &str) -> Option<CompletionRequest> {
        if input.trim().is_empty() {
            return None;
        }

        self.transcript.push(ChatMessage::user(input));

        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(ChatMessage::system(SystemPromptGenerator::chat_system_prompt(&self.report)));
        messages.extend(self.transcript.iter().cloned());

        debug!("Chat turn {} with {} messages", self.transcript.len(), messages.len());
        Some(CompletionRequest::new(messages).with_temperature(CHAT_TEMPERATURE))
    }

    /// Record the outcome of the last turn. A failed turn stays unanswered.
    pub fn finish_turn(&mut self, reply: Result<String, AIError>) -> Result<&ChatMessage, AIError> {
        match reply {
            Ok(text) => {
                self.transcript.push(ChatMessage::assistant(text));
                Ok(&self.transcript[self.transcript.len() - 1])
            }
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                Err(e)
            }
        }
    }

    pub async fn send(&mut self, provider: &dyn AIProvider, input: &str) -> Result<Option<String>, AIError> {
        let Some(request) = self.begin_turn(input) else {
            return Ok(None);
        };

        let reply = provider.complete(request).await;
        let message = self.finish_turn(reply)?;
        Ok(Some(message.content.clone()))
    }
}
