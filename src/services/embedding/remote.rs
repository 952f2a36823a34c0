use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ensure_count, EmbeddingError, EmbeddingProvider};
use crate::core::config::Settings;

/// OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub(crate) struct RemoteEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let embedding = settings.embedding();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(embedding.request_timeout))
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self {
            client,
            api_key: embedding.api_key.clone(),
            base_url: embedding.api_url.trim_end_matches('/').to_string(),
            model: embedding.model.clone(),
        })
    }

    /// Single attempt; a failed call fails the whole load or scoring request.
    async fn request(&self, texts: &[String]) -> Result<EmbeddingResponse, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let payload = json!({ "model": self.model, "input": texts });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| EmbeddingError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Request(format!("status {status}: {body}")));
        }

        response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|err| EmbeddingError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.request(texts).await?;
        order_by_index(response.data, texts.len())
    }
}

fn order_by_index(
    mut items: Vec<EmbeddingItem>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    ensure_count(expected, items.len())?;
    items.sort_by_key(|item| item.index);
    if items.iter().enumerate().any(|(position, item)| position != item.index) {
        return Err(EmbeddingError::InvalidResponse("embedding indices are not contiguous".into()));
    }
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, value: f32) -> EmbeddingItem {
        EmbeddingItem { index, embedding: vec![value] }
    }

    #[test]
    fn response_is_reordered_by_index() {
        let ordered = order_by_index(vec![item(1, 1.0), item(0, 0.0), item(2, 2.0)], 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn short_response_is_a_count_mismatch() {
        let err = order_by_index(vec![item(0, 0.0)], 2).unwrap_err();
        assert!(matches!(err, EmbeddingError::CountMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn duplicate_indices_are_rejected() {
        let err = order_by_index(vec![item(0, 0.0), item(0, 1.0)], 2).unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[test]
    fn payload_shape_matches_openai_schema() {
        let parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,0.25]}],"model":"m"}"#,
        )
        .unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.5, 0.25]);
    }
}
