//! Retrieval stage and the retriever boundary.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StageFault;
use crate::events::Emitter;
use crate::state::{StateUpdate, WorkflowState};

use super::Stage;

/// # Document retrieval boundary.
///
/// The core only requires concurrent-safety and this one method; ranking
/// and storage are the implementation's concern. Failures are reported as
/// a message, captured into `memory` by the stage — never surfaced as a
/// run-level fault.
#[async_trait]
pub trait Retriever: Send + Sync + 'static {
    /// Returns documents relevant to `query`, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, String>;
}

/// In-memory retriever over a fixed document list.
///
/// Scores each document by the number of query character-bigrams it
/// contains; documents with no overlap are dropped. Deterministic, which
/// is what the default wiring and the tests want.
pub struct MemoryRetriever {
    docs: Vec<String>,
}

impl MemoryRetriever {
    /// Creates a retriever over `docs`.
    pub fn new(docs: Vec<String>) -> Self {
        Self { docs }
    }

    /// A retriever with no documents (every query retrieves nothing).
    pub fn empty() -> Self {
        Self { docs: Vec::new() }
    }
}

#[async_trait]
impl Retriever for MemoryRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, String> {
        let chars: Vec<char> = query.chars().collect();
        let bigrams: Vec<String> = chars.windows(2).map(|w| w.iter().collect()).collect();

        let mut scored: Vec<(usize, &String)> = self
            .docs
            .iter()
            .map(|doc| {
                let score = bigrams.iter().filter(|b| doc.contains(b.as_str())).count();
                (score, doc)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().map(|(_, doc)| doc.clone()).collect())
    }
}

/// Retrieval branch of the graph.
///
/// Skipped entirely (empty docs) when the decision stage said no; on
/// retriever failure the stage degrades to empty docs plus a `memory`
/// diagnostic, letting the critic decide whether missing documents matter.
pub struct RetrievalStage {
    retriever: std::sync::Arc<dyn Retriever>,
    top_k: usize,
}

impl RetrievalStage {
    /// Creates the stage with a document cap of `top_k`.
    pub fn new(retriever: std::sync::Arc<dyn Retriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }
}

#[async_trait]
impl Stage for RetrievalStage {
    fn name(&self) -> &'static str {
        "retrieval"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _scope: &Emitter,
    ) -> Result<StateUpdate, StageFault> {
        let mut update = StateUpdate::default();

        if state.need_retrieval == Some(false) {
            update.retrieved_docs = Some(Vec::new());
            return Ok(update);
        }

        match self.retriever.retrieve(&state.user_query).await {
            Ok(mut docs) => {
                docs.truncate(self.top_k);
                update
                    .memory
                    .insert("retrieval_count".into(), Value::from(docs.len()));
                update
                    .memory
                    .insert("retrieval_success".into(), Value::Bool(true));
                update.retrieved_docs = Some(docs);
            }
            Err(error) => {
                update
                    .memory
                    .insert("retrieval_error".into(), Value::String(error));
                update
                    .memory
                    .insert("retrieval_success".into(), Value::Bool(false));
                update.retrieved_docs = Some(Vec::new());
            }
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scores_by_bigram_overlap() {
        let retriever = MemoryRetriever::new(vec![
            "向量数据库是一种专门存储向量的数据库".to_string(),
            "今天天气晴朗".to_string(),
        ]);
        let docs = retriever.retrieve("什么是向量数据库").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].contains("向量数据库"));
    }

    #[tokio::test]
    async fn empty_retriever_returns_no_docs() {
        let retriever = MemoryRetriever::empty();
        assert!(retriever.retrieve("任何问题").await.unwrap().is_empty());
    }
}
