//! Two-stage analysis pipeline: `analyze` (prompt → LLM → parsed JSON) then
//! `enrich` (attach reference links to each suggested solution).

use std::sync::Arc;

use crate::config::RcaConfig;
use crate::enrich::{self, SolutionEnricher};
use crate::error::RcaError;
use crate::llm::{self, LlmBackend, LlmError};
use crate::models::LogAnalysis;
use crate::prompt;

#[derive(Clone)]
pub struct AnalysisPipeline {
    llm: Arc<dyn LlmBackend>,
    enricher: Arc<dyn SolutionEnricher>,
    max_references: usize,
}

impl AnalysisPipeline {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        enricher: Arc<dyn SolutionEnricher>,
        max_references: usize,
    ) -> Self {
        Self {
            llm,
            enricher,
            max_references,
        }
    }

    pub fn from_config(config: &RcaConfig) -> Result<Self, LlmError> {
        let llm: Arc<dyn LlmBackend> = Arc::from(llm::create_backend(&config.llm)?);
        let enricher: Arc<dyn SolutionEnricher> =
            Arc::from(enrich::create_enricher(&config.enrichment));

        tracing::info!(
            backend = llm.name(),
            model = llm.model(),
            enrichment = enricher.name(),
            "Analysis pipeline ready"
        );

        Ok(Self::new(llm, enricher, config.enrichment.max_references))
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub fn backend_name(&self) -> &str {
        self.llm.name()
    }

    /// Run both stages. Blank input is rejected before the LLM is called.
    pub async fn run(&self, log_text: &str) -> Result<LogAnalysis, RcaError> {
        if log_text.trim().is_empty() {
            return Err(RcaError::Validation("log text is empty".to_string()));
        }

        let mut analysis = self.analyze(log_text).await?;
        enrich::enrich(&mut analysis, self.enricher.as_ref(), self.max_references).await;

        tracing::info!(
            errors = analysis.errors.len(),
            solutions = analysis.possible_solutions.len(),
            "Log analysis complete"
        );
        Ok(analysis)
    }

    async fn analyze(&self, log_text: &str) -> Result<LogAnalysis, LlmError> {
        let reply = self.llm.complete(&prompt::render(log_text)).await?;
        prompt::parse_reply(&reply).map_err(|e| {
            tracing::warn!(error = %e, reply_len = reply.len(), "Unparseable model reply");
            e
        })
    }
}
