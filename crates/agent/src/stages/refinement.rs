//! Refinement stage: rewrites the technical draft for the customer.

use crate::generation::GenerationClient;
use supportdesk_core::error::Error;

/// Role prompt for the customer-facing writer.
pub const REFINEMENT_PROMPT: &str = "\
You are a friendly, empathetic customer support writer.
Turn the technical draft into a clear, reassuring message with steps the customer can act on.
Rules:
- Open with one short empathy sentence.
- Give the steps as a short numbered list.
- Stay strictly grounded in the sources provided. Do NOT invent.
- If the draft asks for clarifying information, end with a brief question.
- Add a short 'Why this works' note when it helps.
- Avoid jargon; explain any necessary term plainly.
Output only the final message.";

/// Produces the final customer-facing answer.
#[derive(Clone)]
pub struct RefinementStage {
    client: GenerationClient,
}

impl RefinementStage {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    /// `sources_joined` is the draft's citations joined by blank lines.
    pub async fn refine(
        &self,
        original_query: &str,
        draft: &str,
        sources_joined: &str,
    ) -> Result<String, Error> {
        let user = refinement_message(original_query, draft, sources_joined);
        self.client.complete(REFINEMENT_PROMPT, &user).await
    }
}

pub(crate) fn refinement_message(original_query: &str, draft: &str, sources_joined: &str) -> String {
    format!(
        "Customer query: {original_query}\n\n\
         Technical draft:\n{draft}\n\n\
         (For grounding) Sources:\n{sources_joined}\n\n\
         Write the final customer-friendly answer now."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use std::sync::Arc;

    #[test]
    fn message_layout() {
        assert_eq!(
            refinement_message("help", "1. Reset", "a [x#0]\n\nb [y#1]"),
            "Customer query: help\n\nTechnical draft:\n1. Reset\n\n\
             (For grounding) Sources:\na [x#0]\n\nb [y#1]\n\n\
             Write the final customer-friendly answer now."
        );
    }

    #[tokio::test]
    async fn refine_uses_refinement_role() {
        let provider = Arc::new(ScriptedProvider::replies(&["Sorry about that! 1. Reset."]));
        let stage = RefinementStage::new(GenerationClient::new(provider.clone(), "m"));

        let answer = stage.refine("help", "1. Reset", "").await.unwrap();
        assert_eq!(answer, "Sorry about that! 1. Reset.");
        assert_eq!(provider.requests()[0].messages[0].content, REFINEMENT_PROMPT);
    }
}
