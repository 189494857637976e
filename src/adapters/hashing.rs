use anyhow::{Context, Result};
use async_trait::async_trait;
use crate::adapters::embedding::EmbeddingAdapter;

const DEFAULT_DIMENSION: usize = 256;

/// Offline embedder: hashes word tokens and character trigrams into a fixed
/// number of buckets. Deterministic across runs and platforms.
pub struct HashingEmbedder {
    model_name: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_name: format!("hash:{}", dimension),
            dimension: dimension.max(1),
        }
    }

    /// Accepts `hash` or `hash:<dimension>`.
    pub fn from_model_name(name: &str) -> Result<Self> {
        let dimension = match name.strip_prefix("hash:") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid hash embedding dimension: {}", raw))?,
            None => DEFAULT_DIMENSION,
        };
        if dimension == 0 {
            anyhow::bail!("Hash embedding dimension must be positive");
        }
        let mut embedder = Self::new(dimension);
        embedder.model_name = name.to_string();
        Ok(embedder)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();

        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a_64(token.as_bytes()) % self.dimension as u64) as usize;
            vec[bucket] += 1.0;

            let chars: Vec<char> = format!(" {} ", token).chars().collect();
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                let hash = fnv1a_64(gram.as_bytes()) ^ 0x9E37_79B9_7F4A_7C15;
                let bucket = (hash % self.dimension as u64) as usize;
                vec[bucket] += 0.5;
            }
        }

        vec
    }
}

#[async_trait]
impl EmbeddingAdapter for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
