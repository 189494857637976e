use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::adapters::embedding::{send_with_retry, EmbeddingAdapter, EmbeddingConfig};

pub struct OllamaEmbedder {
    client: Client,
    config: EmbeddingConfig,
    base_url: String,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let base_url = config.base_url.clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingAdapter for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model_name = self.config.model_name
            .strip_prefix("ollama:")
            .unwrap_or(&self.config.model_name);

        let request = OllamaEmbedRequest {
            model: model_name,
            input: texts,
        };

        let url = format!("{}/api/embed", self.base_url);
        let response = send_with_retry("Ollama", || {
            self.client
                .post(&url)
                .json(&request)
        })
        .await
        .context("Failed to send request to Ollama")?;

        let parsed: OllamaEmbedResponse = response.json().await
            .context("Failed to parse Ollama embed response")?;

        Ok(parsed.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn strips_prefix_and_reads_embeddings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"all-minilm"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"all-minilm","embeddings":[[0.5,0.5]]}"#)
            .create_async()
            .await;

        let embedder = OllamaEmbedder::new(EmbeddingConfig {
            model_name: "ollama:all-minilm".to_string(),
            api_key: None,
            base_url: Some(server.url()),
        })
        .unwrap();

        let vectors = embedder.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![0.5, 0.5]]);
        mock.assert_async().await;
    }
}
