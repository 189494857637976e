use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::adapters::embedding::{send_with_retry, EmbeddingAdapter, EmbeddingConfig};

pub struct OpenAIEmbedder {
    client: Client,
    config: EmbeddingConfig,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key.clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .context("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide in config")?;

        let base_url = config.base_url.clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAIEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model_name,
            input: texts,
        };

        let url = format!("{}/embeddings", self.base_url);
        let response = send_with_retry("OpenAI", || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
        })
        .await
        .context("Failed to send request to OpenAI")?;

        let mut parsed: EmbeddingResponse = response.json().await
            .context("Failed to parse OpenAI embeddings response")?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeds_batch_in_index_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
            )
            .create_async()
            .await;

        let embedder = OpenAIEmbedder::new(EmbeddingConfig {
            model_name: "text-embedding-3-small".to_string(),
            api_key: Some("test-key".to_string()),
            base_url: Some(server.url()),
        })
        .unwrap();

        let vectors = embedder
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_fatal() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(401)
            .with_body("bad key")
            .expect(1)
            .create_async()
            .await;

        let embedder = OpenAIEmbedder::new(EmbeddingConfig {
            model_name: "text-embedding-3-small".to_string(),
            api_key: Some("nope".to_string()),
            base_url: Some(server.url()),
        })
        .unwrap();

        let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("401"));
        mock.assert_async().await;
    }
}
