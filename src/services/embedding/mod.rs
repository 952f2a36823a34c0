//! Sentence embedding providers. Both produce one vector per input text, in input order.

mod bert;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::{EmbeddingProviderKind, Settings};

pub(crate) use bert::BertEmbedder;
pub(crate) use remote::RemoteEmbedder;

#[derive(Debug, Error)]
pub(crate) enum EmbeddingError {
    #[error("embedding model files unavailable: {0}")]
    ModelFiles(String),
    #[error("tokenizer failure: {0}")]
    Tokenizer(String),
    #[error("model inference failed: {0}")]
    Inference(String),
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("unexpected embedding response: {0}")]
    InvalidResponse(String),
    #[error("embedding provider returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },
}

#[async_trait]
pub(crate) trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Encodes `texts` in one batch. An empty slice yields an empty result without touching
    /// the model.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

pub(crate) type SharedEmbedder = Arc<dyn EmbeddingProvider>;

pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<SharedEmbedder> {
    let embedding = settings.embedding();
    let provider: SharedEmbedder = match embedding.provider {
        EmbeddingProviderKind::Local => {
            let embedder = BertEmbedder::new(&embedding.model_dir);
            if embedding.auto_download {
                embedder.ensure_model_files(&embedding.model_repo).await?;
            }
            Arc::new(embedder)
        }
        EmbeddingProviderKind::OpenAi => Arc::new(RemoteEmbedder::from_settings(settings)?),
    };

    tracing::info!(
        provider = embedding.provider.as_str(),
        name = provider.name(),
        "Embedding provider configured"
    );
    Ok(provider)
}

pub(crate) fn ensure_count(expected: usize, actual: usize) -> Result<(), EmbeddingError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EmbeddingError::CountMismatch { expected, actual })
    }
}
