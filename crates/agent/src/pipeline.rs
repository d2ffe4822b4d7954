//! Support pipeline: Triage → Technical Draft → Customer Refinement.
//!
//! Each request owns a [`PipelineState`] that advances through the phases
//! below. A failing stage aborts the request; nothing is retried here
//! (provider-level retries happen inside the generation client).
//!
//! ```text
//! Received → Triaged → Drafted → Refined → Completed
//!     └──────────┴─────────┴─────────┴──→ Failed
//! ```

use crate::generation::GenerationClient;
use crate::stages::{RefinementStage, StageKind, TechnicalStage, TriageStage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use supportdesk_core::error::Error;
use supportdesk_knowledge::Retriever;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Request body for a support question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportQuery {
    pub query: String,
}

/// The customer-facing answer with the citations it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportResponse {
    pub final_answer: String,
    pub sources: Vec<String>,
}

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Received,
    Triaged,
    Drafted,
    Refined,
    Completed,
    Failed,
}

/// Per-request working state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub request_id: Uuid,
    pub original_query: String,
    pub technical_query: Option<String>,
    pub draft_solution: Option<String>,
    pub sources: Vec<String>,
    pub final_answer: Option<String>,
    pub phase: Phase,
}

impl PipelineState {
    pub fn new(original_query: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            original_query: original_query.into(),
            technical_query: None,
            draft_solution: None,
            sources: Vec::new(),
            final_answer: None,
            phase: Phase::Received,
        }
    }
}

/// A stage failure, tagged with the stage that raised it.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: StageKind,
    #[source]
    pub source: Error,
}

impl PipelineError {
    fn at(stage: StageKind, source: Error) -> Self {
        Self { stage, source }
    }
}

/// Composes the three stages. Cheap to clone; share one per process.
#[derive(Clone)]
pub struct SupportPipeline {
    triage: TriageStage,
    technical: TechnicalStage,
    refinement: RefinementStage,
}

impl SupportPipeline {
    /// All three stages share `client`; the technical stage retrieves
    /// `top_k` chunks through `retriever`.
    pub fn new(client: GenerationClient, retriever: Arc<Retriever>, top_k: usize) -> Self {
        Self::from_stages(
            TriageStage::new(client.clone()),
            TechnicalStage::new(client.clone(), retriever, top_k),
            RefinementStage::new(client),
        )
    }

    pub fn from_stages(
        triage: TriageStage,
        technical: TechnicalStage,
        refinement: RefinementStage,
    ) -> Self {
        Self {
            triage,
            technical,
            refinement,
        }
    }

    /// Answer a customer question.
    pub async fn answer(&self, query: &str) -> Result<SupportResponse, PipelineError> {
        let (response, _) = self.answer_with_state(query).await?;
        Ok(response)
    }

    /// Answer a customer question, also returning the final state.
    pub async fn answer_with_state(
        &self,
        query: &str,
    ) -> Result<(SupportResponse, PipelineState), PipelineError> {
        let mut state = PipelineState::new(query);
        let span = info_span!("support_query", request_id = %state.request_id);

        async {
            let started = Instant::now();
            match self.run(&mut state).await {
                Ok(response) => {
                    info!(
                        sources = response.sources.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Support query answered"
                    );
                    Ok((response, state))
                }
                Err(e) => {
                    state.phase = Phase::Failed;
                    warn!(stage = %e.stage, error = %e.source, "Support query failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, state: &mut PipelineState) -> Result<SupportResponse, PipelineError> {
        if state.original_query.trim().is_empty() {
            return Err(PipelineError::at(
                StageKind::Triage,
                Error::Internal("query must not be empty".into()),
            ));
        }

        let technical_query = self
            .triage
            .rewrite(&state.original_query)
            .await
            .map_err(|e| PipelineError::at(StageKind::Triage, e))?;
        state.technical_query = Some(technical_query.clone());
        state.phase = Phase::Triaged;

        let draft = self
            .technical
            .draft(&technical_query)
            .await
            .map_err(|e| PipelineError::at(StageKind::Technical, e))?;
        state.draft_solution = Some(draft.text.clone());
        state.sources = draft.sources;
        state.phase = Phase::Drafted;

        let sources_joined = state.sources.join("\n\n");
        let final_answer = self
            .refinement
            .refine(&state.original_query, &draft.text, &sources_joined)
            .await
            .map_err(|e| PipelineError::at(StageKind::Refinement, e))?;
        state.final_answer = Some(final_answer.clone());
        state.phase = Phase::Refined;

        let response = SupportResponse {
            final_answer,
            sources: state.sources.clone(),
        };
        state.phase = Phase::Completed;
        Ok(response)
    }
}
