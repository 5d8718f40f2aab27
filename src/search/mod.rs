//! Semantic Search (C5): prompt -> ranked `SearchResult[]` with per-item
//! rationale, grounded on the pack's hybrid-search query path (embed, query
//! the vector store, attach an explanation per hit, preserve the store's
//! ordering).

use crate::index::embedding::EmbeddingProvider;
use crate::index::vector_store::VectorIndex;
use crate::reasoning::Reasoner;
use crate::types::{CommandEntry, SearchResult};

/// Runs one search call. Orchestration-mode search always excludes
/// `section = "org"` entries (Open Question 3 in DESIGN.md); Plan Mode
/// never calls this at all.
pub async fn search(
    embedder: &mut EmbeddingProvider,
    index: &VectorIndex,
    reasoner: &Reasoner,
    prompt: &str,
    limit: usize,
    threshold: f32,
) -> Vec<SearchResult> {
    let query_vector = embedder.embed(prompt);
    let hits = index.search(&query_vector, limit, threshold, |entry: &CommandEntry| {
        !entry.is_org()
    });

    let mut results = Vec::with_capacity(hits.len());
    for (command, score) in hits {
        let rationale = reasoner
            .selection_rationale(prompt, &command.name, &command.synopsis)
            .await;
        let rationale = if rationale == crate::reasoning::UNAVAILABLE_FALLBACK {
            command.description.clone()
        } else {
            rationale
        };
        results.push(SearchResult {
            command,
            score,
            rationale,
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::embedding::EmbeddingProvider;
    use crate::reasoning::client::{CompletionParams, ReasoningClient};
    use tempfile::tempdir;

    fn reasoner() -> Reasoner {
        let client = ReasoningClient::new("http://127.0.0.1:1").unwrap();
        let params = CompletionParams {
            model: "mistral".to_string(),
            max_tokens: 32,
            temperature: 0.0,
            stop: vec![],
        };
        Reasoner::new(client, params)
    }

    #[tokio::test]
    async fn empty_index_yields_no_results() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.json")).unwrap();
        let mut embedder = EmbeddingProvider::new("test");
        let results = search(&mut embedder, &index, &reasoner(), "turn up the volume", 10, 0.3).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn org_entries_are_excluded_from_orchestration_search() {
        let dir = tempdir().unwrap();
        let mut index = VectorIndex::open(dir.path().join("index.json")).unwrap();
        let mut embedder = EmbeddingProvider::new("test");
        let mut memo = CommandEntry {
            name: "onboarding".to_string(),
            section: "org".to_string(),
            synopsis: "memo".to_string(),
            description: "org memo".to_string(),
            embedding: embedder.embed("onboarding\nmemo\norg memo"),
        };
        memo.embedding = embedder.embed(&memo.embedding_source());
        index.upsert(vec![memo]).unwrap();

        let results = search(&mut embedder, &index, &reasoner(), "onboarding memo", 10, 0.0).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn rationale_falls_back_to_description_when_reasoning_unavailable() {
        let dir = tempdir().unwrap();
        let mut index = VectorIndex::open(dir.path().join("index.json")).unwrap();
        let mut embedder = EmbeddingProvider::new("test");
        let mut entry = CommandEntry {
            name: "pactl".to_string(),
            section: "1".to_string(),
            synopsis: "control a PulseAudio server".to_string(),
            description: "adjust volume and sinks".to_string(),
            embedding: Vec::new(),
        };
        entry.embedding = embedder.embed(&entry.embedding_source());
        index.upsert(vec![entry]).unwrap();

        let results = search(&mut embedder, &index, &reasoner(), "my volume is too low", 10, -1.0).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rationale, "adjust volume and sinks");
    }
}
