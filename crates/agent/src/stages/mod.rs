//! The three pipeline stages, each pinned to a fixed role prompt.
//!
//! - [`TriageStage`] rewrites the customer's wording into a search query
//! - [`TechnicalStage`] retrieves chunks and drafts a grounded solution
//! - [`RefinementStage`] turns the draft into the customer-facing answer

pub mod refinement;
pub mod technical;
pub mod triage;

pub use refinement::RefinementStage;
pub use technical::{Draft, TechnicalStage};
pub use triage::TriageStage;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a pipeline stage in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Triage,
    Technical,
    Refinement,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Technical => "technical",
            Self::Refinement => "refinement",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(StageKind::Triage.to_string(), "triage");
        assert_eq!(StageKind::Technical.as_str(), "technical");
        assert_eq!(
            serde_json::to_string(&StageKind::Refinement).unwrap(),
            "\"refinement\""
        );
    }
}
