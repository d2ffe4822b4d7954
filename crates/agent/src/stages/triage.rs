//! Triage stage: rewrites a customer's question as a search query.

use crate::generation::GenerationClient;
use supportdesk_core::error::Error;
use tracing::debug;

/// Role prompt for the triage model.
pub const TRIAGE_PROMPT: &str = "\
You are a Tier-1 technical support triage specialist.
- Rewrite the customer's question as one precise technical search query.
- Keep it to a single sentence.
- Name the product and the likely subsystem (Bluetooth, Wi-Fi, battery, pairing, factory reset, and so on).
- Do NOT answer the question. Output only the rewritten query.";

/// Turns loose customer wording into a keyword-rich query for retrieval.
#[derive(Clone)]
pub struct TriageStage {
    client: GenerationClient,
}

impl TriageStage {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    /// Rewrite `raw_query`; the reply is used verbatim as the technical query.
    pub async fn rewrite(&self, raw_query: &str) -> Result<String, Error> {
        let user = triage_message(raw_query);
        let refined = self.client.complete(TRIAGE_PROMPT, &user).await?;
        debug!(refined = %refined, "Triage rewrote query");
        Ok(refined)
    }
}

pub(crate) fn triage_message(raw_query: &str) -> String {
    format!(
        "Customer query: {raw_query}\n\
         Rewrite as a single precise technical query for searching a knowledge base."
    )
}
