//! Technical stage: retrieves knowledge and drafts a grounded solution.

use crate::generation::GenerationClient;
use std::sync::Arc;
use supportdesk_core::error::Error;
use supportdesk_core::knowledge::RetrievedChunk;
use supportdesk_knowledge::Retriever;
use tracing::{debug, info};

/// Role prompt for the drafting model.
pub const TECHNICAL_PROMPT: &str = "\
You are a meticulous technical expert. Using only the knowledge chunks provided, draft a direct, step-by-step solution.
Rules:
- Cite ONLY the given chunks.
- If the chunks are insufficient, say what is missing and ask for the smallest clarifying detail.
- Use enumerated steps. Stay factual.
Output only the draft solution.";

/// Context text used when retrieval finds nothing.
pub const NO_CHUNKS_FOUND: &str = "(no knowledge chunks found)";

const CHUNK_SEPARATOR: &str = "\n---\n";

/// Output of the technical stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Enumerated, grounded solution text.
    pub text: String,

    /// Citation (`text [source#chunk_id]`) for every chunk given to the model.
    pub sources: Vec<String>,
}

/// Retrieves the top-K chunks for a technical query and drafts an answer.
#[derive(Clone)]
pub struct TechnicalStage {
    client: GenerationClient,
    retriever: Arc<Retriever>,
    top_k: usize,
}

impl TechnicalStage {
    pub fn new(client: GenerationClient, retriever: Arc<Retriever>, top_k: usize) -> Self {
        Self {
            client,
            retriever,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve, then draft. Zero chunks still produces a draft, which
    /// should say what information is missing.
    pub async fn draft(&self, technical_query: &str) -> Result<Draft, Error> {
        let chunks = self.retriever.retrieve(technical_query, self.top_k).await?;
        info!(chunks = chunks.len(), top_k = self.top_k, "Retrieved knowledge");

        let user = draft_message(technical_query, &chunks);
        let text = self.client.complete(TECHNICAL_PROMPT, &user).await?;
        debug!(draft_chars = text.len(), "Drafted technical solution");

        Ok(Draft {
            text,
            sources: chunks.iter().map(RetrievedChunk::citation).collect(),
        })
    }
}

pub(crate) fn draft_message(technical_query: &str, chunks: &[RetrievedChunk]) -> String {
    let context = if chunks.is_empty() {
        NO_CHUNKS_FOUND.to_string()
    } else {
        chunks
            .iter()
            .map(RetrievedChunk::context_block)
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR)
    };
    format!(
        "Technical query: {technical_query}\n\n\
         Knowledge chunks:\n{context}\n\n\
         Write the DRAFT solution now."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use async_trait::async_trait;
    use supportdesk_core::embedding::Embedder;
    use supportdesk_core::error::EmbeddingError;
    use supportdesk_core::knowledge::Chunk;
    use supportdesk_knowledge::InMemoryKnowledgeStore;

    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        fn model(&self) -> &str {
            "constant"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn retriever(chunks: Vec<Chunk>) -> Arc<Retriever> {
        Arc::new(Retriever::new(
            Arc::new(ConstantEmbedder),
            Arc::new(InMemoryKnowledgeStore::with_chunks(chunks)),
        ))
    }

    fn chunk(source: &str, id: u32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            source: source.into(),
            chunk_id: id,
            text: text.into(),
        }
    }

    #[test]
    fn blocks_joined_with_separator() {
        let msg = draft_message(
            "reset headset",
            &[chunk("manual.txt", 0, "Hold power."), chunk("faq.txt", 3, "Release.")],
        );
        assert_eq!(
            msg,
            "Technical query: reset headset\n\nKnowledge chunks:\n\
             [manual.txt#0]\nHold power.\n---\n[faq.txt#3]\nRelease.\n\n\
             Write the DRAFT solution now."
        );
    }

    #[test]
    fn empty_context_says_nothing_found() {
        let msg = draft_message("q", &[]);
        assert!(msg.contains(NO_CHUNKS_FOUND));
    }

    #[tokio::test]
    async fn draft_returns_citations_for_supplied_chunks() {
        let provider = Arc::new(ScriptedProvider::replies(&["1. Hold power for 10s."]));
        let stage = TechnicalStage::new(
            GenerationClient::new(provider.clone(), "m"),
            retriever(vec![
                Chunk::new("manual.txt", 0, "Hold power for 10 seconds.", vec![1.0, 0.0]),
                Chunk::new("manual.txt", 1, "Unrelated.", vec![0.0, 1.0]),
            ]),
            1,
        );

        let draft = stage.draft("factory reset").await.unwrap();
        assert_eq!(draft.text, "1. Hold power for 10s.");
        assert_eq!(draft.sources, vec!["Hold power for 10 seconds. [manual.txt#0]"]);

        let req = &provider.requests()[0];
        assert_eq!(req.messages[0].content, TECHNICAL_PROMPT);
        assert!(req.messages[1].content.contains("[manual.txt#0]\nHold power for 10 seconds."));
        assert!(!req.messages[1].content.contains("Unrelated."));
    }

    #[tokio::test]
    async fn empty_store_still_calls_model() {
        let provider = Arc::new(ScriptedProvider::replies(&["Need the model number."]));
        let stage = TechnicalStage::new(GenerationClient::new(provider.clone(), "m"), retriever(vec![]), 5);

        let draft = stage.draft("reset").await.unwrap();
        assert!(draft.sources.is_empty());
        assert_eq!(provider.call_count(), 1);
    }
}
