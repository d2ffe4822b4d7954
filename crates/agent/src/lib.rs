//! The support answer pipeline.
//!
//! A customer question flows through three generation stages:
//!
//! 1. **Triage** rewrites the question as a precise technical query
//! 2. **Technical** retrieves knowledge chunks and drafts a grounded solution
//! 3. **Refinement** turns the draft into an empathetic customer answer
//!
//! The citations of the chunks given to the technical stage are returned
//! alongside the final answer.

pub mod generation;
pub mod pipeline;
pub mod stages;

#[cfg(test)]
mod test_helpers;

pub use generation::GenerationClient;
pub use pipeline::{Phase, PipelineError, PipelineState, SupportPipeline, SupportQuery, SupportResponse};
pub use stages::{Draft, RefinementStage, StageKind, TechnicalStage, TriageStage};
