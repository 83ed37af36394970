//! Query engine: retrieval over the passage index, optionally followed by
//! LLM answer synthesis

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use duet_core::{ChatMessage, LlmProvider};

use crate::chunking::{ChunkingConfig, chunk_text};
use crate::documents::Document;
use crate::index::{Passage, PassageIndex, SearchHit};

/// Answer returned when retrieval finds nothing
pub const NO_RELEVANT_INFORMATION: &str =
    "I could not find any relevant information in the knowledge base.";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You answer questions using only the context passages \
     provided. If the passages do not contain the answer, say that the knowledge base has no \
     information about it. Answer concisely.";

/// Answers natural-language questions from the knowledge base
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, question: &str) -> Result<String>;
}

/// Chunk `documents` and load them into `index`, replacing its content.
///
/// Returns the number of passages indexed.
pub fn build_index(
    documents: &[Document],
    config: &ChunkingConfig,
    index: &PassageIndex,
) -> Result<usize> {
    let passages: Vec<Passage> = documents
        .iter()
        .flat_map(|doc| {
            chunk_text(&doc.content, config)
                .into_iter()
                .map(move |chunk| Passage {
                    id: format!("{}#{}", doc.id, chunk.index),
                    source: doc.id.clone(),
                    content: chunk.content,
                })
        })
        .collect();

    index
        .rebuild(&passages)
        .context("Failed to build knowledge index")?;
    info!(
        "Indexed {} passages from {} documents",
        passages.len(),
        documents.len()
    );
    Ok(passages.len())
}

/// Retrieves the `top_k` best passages and, with an LLM configured, asks it
/// to answer from them. Without an LLM the passages themselves are the answer.
pub struct RetrievalQueryEngine {
    index: Arc<PassageIndex>,
    llm: Option<Arc<dyn LlmProvider>>,
    top_k: usize,
}

impl RetrievalQueryEngine {
    pub fn new(index: Arc<PassageIndex>, top_k: usize) -> Self {
        Self {
            index,
            llm: None,
            top_k: top_k.max(1),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<SearchHit>> {
        let index = Arc::clone(&self.index);
        let question = question.to_string();
        let limit = self.top_k;
        tokio::task::spawn_blocking(move || index.search(&question, limit))
            .await
            .context("Search task panicked")?
    }
}

#[async_trait]
impl QueryEngine for RetrievalQueryEngine {
    async fn query(&self, question: &str) -> Result<String> {
        let hits = self.retrieve(question).await?;
        debug!("Retrieved {} passages for '{}'", hits.len(), question);

        if hits.is_empty() {
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }

        let Some(llm) = &self.llm else {
            return Ok(hits
                .iter()
                .map(|h| h.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"));
        };

        let prompt = synthesis_prompt(question, &hits);
        let response = llm
            .chat(&[ChatMessage::user(prompt)], &[], SYNTHESIS_SYSTEM_PROMPT)
            .await
            .with_context(|| format!("{} failed to synthesize an answer", llm.provider_name()))?;

        let answer = response.text();
        if answer.trim().is_empty() {
            Ok(NO_RELEVANT_INFORMATION.to_string())
        } else {
            Ok(answer.trim().to_string())
        }
    }
}

fn synthesis_prompt(question: &str, hits: &[SearchHit]) -> String {
    let mut context = String::new();
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("[{}] ({})\n{}\n\n", i + 1, hit.source, hit.content));
    }
    format!(
        "Context passages:\n\n{}Question: {}\nAnswer:",
        context, question
    )
}
