use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::embedding::EmbeddingAdapter;
use crate::core::diff_parser::AddedLine;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    #[serde(rename = "line")]
    pub line_number: usize,
    #[serde(rename = "score")]
    pub similarity_score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub best: MatchCandidate,
    /// Highest scoring lines first, at most `top_k` of them.
    pub top_candidates: Vec<MatchCandidate>,
}

/// Scores a query against the added lines of a file.
///
/// Line vectors are computed once per file path and reused for every later
/// query against the same path.
pub struct SimilarityMatcher {
    embedder: Arc<dyn EmbeddingAdapter>,
    cache: HashMap<String, Vec<Vec<f32>>>,
    top_k: usize,
}

impl SimilarityMatcher {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>, top_k: usize) -> Self {
        Self {
            embedder,
            cache: HashMap::new(),
            top_k: top_k.max(1),
        }
    }

    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    /// Callers check for added lines first; an empty slice is an error.
    pub async fn rank(&mut self, path: &str, lines: &[AddedLine], query: &str) -> Result<Ranking> {
        if lines.is_empty() {
            anyhow::bail!("No added lines to rank in {}", path);
        }

        if !self.cache.contains_key(path) {
            let texts: Vec<String> = lines.iter().map(|l| l.content.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .with_context(|| format!("Failed to embed added lines of {}", path))?;
            debug!("Embedded {} added lines for {}", vectors.len(), path);
            self.cache.insert(path.to_string(), vectors);
        }

        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .context("Failed to embed comment text")?
            .into_iter()
            .next()
            .context("Embedding model returned no vector for comment text")?;

        let line_vectors = &self.cache[path];
        let scores: Vec<f32> = line_vectors
            .iter()
            .map(|v| dot(&query_vector, v))
            .collect();

        rank_scores(lines, &scores, self.top_k)
            .with_context(|| format!("Embedding model returned no line vectors for {}", path))
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Orders by descending score; equal scores keep the earlier line first.
pub fn rank_scores(lines: &[AddedLine], scores: &[f32], top_k: usize) -> Option<Ranking> {
    let mut candidates: Vec<MatchCandidate> = lines
        .iter()
        .zip(scores.iter())
        .map(|(line, score)| MatchCandidate {
            line_number: line.line_number,
            similarity_score: *score,
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity_score
            .total_cmp(&a.similarity_score)
            .then_with(|| a.line_number.cmp(&b.line_number))
    });

    let best = *candidates.first()?;
    candidates.truncate(top_k.max(1));

    Some(Ranking {
        best,
        top_candidates: candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingAdapter for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(texts
                .iter()
                .map(|t| if t.contains("alpha") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn lines(contents: &[(usize, &str)]) -> Vec<AddedLine> {
        contents
            .iter()
            .map(|(n, c)| AddedLine {
                line_number: *n,
                content: c.to_string(),
            })
            .collect()
    }

    #[test]
    fn ties_prefer_earliest_line() {
        let added = lines(&[(3, "a"), (7, "b"), (9, "c")]);
        let ranking = rank_scores(&added, &[0.5, 0.9, 0.9], 5).unwrap();
        assert_eq!(ranking.best.line_number, 7);
        let order: Vec<usize> = ranking.top_candidates.iter().map(|c| c.line_number).collect();
        assert_eq!(order, vec![7, 9, 3]);
    }

    #[test]
    fn top_k_truncates_candidates() {
        let added = lines(&[(1, "a"), (2, "b"), (3, "c")]);
        let ranking = rank_scores(&added, &[0.1, 0.2, 0.3], 2).unwrap();
        assert_eq!(ranking.top_candidates.len(), 2);
        assert_eq!(ranking.best.line_number, 3);
    }

    #[test]
    fn empty_lines_have_no_ranking() {
        assert!(rank_scores(&[], &[], 5).is_none());
    }

    #[tokio::test]
    async fn line_vectors_are_cached_per_file() {
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let mut matcher = SimilarityMatcher::new(embedder.clone(), 5);
        let added = lines(&[(4, "beta line"), (5, "alpha line")]);

        let first = matcher.rank("a.md", &added, "alpha").await.unwrap();
        let second = matcher.rank("a.md", &added, "beta").await.unwrap();

        assert_eq!(first.best.line_number, 5);
        assert_eq!(second.best.line_number, 4);
        // one batch for the file plus one call per query
        assert_eq!(embedder.calls.load(Ordering::Relaxed), 3);
        assert_eq!(matcher.cached_files(), 1);
    }

    #[tokio::test]
    async fn ranking_without_lines_is_an_error_and_skips_the_model() {
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let mut matcher = SimilarityMatcher::new(embedder.clone(), 5);

        assert!(matcher.rank("a.md", &[], "alpha").await.is_err());
        assert_eq!(embedder.calls.load(Ordering::Relaxed), 0);
        assert_eq!(matcher.cached_files(), 0);
    }
}
