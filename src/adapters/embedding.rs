use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "ollama:all-minilm".to_string(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Turns text into vectors. Implementations return one vector per input, in order.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn model_name(&self) -> &str;
}

/// Wraps an adapter so every vector it hands out has unit length.
pub struct NormalizedEmbedder {
    inner: Box<dyn EmbeddingAdapter>,
}

impl NormalizedEmbedder {
    pub fn new(inner: Box<dyn EmbeddingAdapter>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EmbeddingAdapter for NormalizedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.inner.embed(texts).await?;
        if vectors.len() != texts.len() {
            anyhow::bail!(
                "Embedding model {} returned {} vectors for {} inputs",
                self.inner.model_name(),
                vectors.len(),
                texts.len()
            );
        }
        if vectors.iter().any(Vec::is_empty) {
            anyhow::bail!("Embedding model {} returned an empty vector", self.inner.model_name());
        }

        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

pub fn create_adapter(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingAdapter>> {
    let adapter: Box<dyn EmbeddingAdapter> = match config.model_name.as_str() {
        // Offline feature hashing
        name if name == "hash" || name.starts_with("hash:") => {
            Box::new(crate::adapters::HashingEmbedder::from_model_name(name)?)
        }
        name if name.starts_with("ollama:") => {
            Box::new(crate::adapters::OllamaEmbedder::new(config.clone())?)
        }
        _name if config.base_url.as_ref().map_or(false, |u| u.contains("11434")) => {
            Box::new(crate::adapters::OllamaEmbedder::new(config.clone())?)
        }
        // Anything else speaks the OpenAI embeddings API
        _ => Box::new(crate::adapters::OpenAIEmbedder::new(config.clone())?),
    };

    Ok(Box::new(NormalizedEmbedder::new(adapter)))
}

pub(crate) async fn send_with_retry<F>(provider: &str, mut make_request: F) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    const MAX_RETRIES: usize = 2;
    const BASE_DELAY_MS: u64 = 250;

    for attempt in 0..=MAX_RETRIES {
        match make_request().send().await {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                }

                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if is_retryable_status(status) && attempt < MAX_RETRIES {
                    sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                    continue;
                }

                anyhow::bail!("{} API error ({}): {}", provider, status, body);
            }
            Err(err) => {
                if attempt < MAX_RETRIES {
                    sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                    continue;
                }
                return Err(err.into());
            }
        }
    }

    anyhow::bail!("{} request failed after retries", provider);
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
