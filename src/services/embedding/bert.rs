use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use candle::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use futures_util::StreamExt;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::io::AsyncWriteExt;

use super::{ensure_count, EmbeddingError, EmbeddingProvider};

const MODEL_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];
const MAX_SEQUENCE_LENGTH: usize = 256;

type LoadedModel = (BertModel, Tokenizer);

/// Local sentence-transformer (BERT family) with masked mean pooling and L2 normalisation.
/// The model is loaded on first use and kept for the life of the process.
#[derive(Clone)]
pub(crate) struct BertEmbedder {
    model_dir: PathBuf,
    cache: Arc<Mutex<Option<LoadedModel>>>,
}

impl BertEmbedder {
    pub(crate) fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self { model_dir: model_dir.into(), cache: Arc::new(Mutex::new(None)) }
    }

    /// Fetches missing model files from the Hugging Face hub.
    pub(crate) async fn ensure_model_files(&self, repo: &str) -> Result<(), EmbeddingError> {
        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .map_err(|err| EmbeddingError::ModelFiles(err.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|err| EmbeddingError::Request(err.to_string()))?;

        for file in MODEL_FILES {
            let target = self.model_dir.join(file);
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                continue;
            }
            let url = format!("https://huggingface.co/{repo}/resolve/main/{file}");
            tracing::info!(url = %url, target = %target.display(), "Downloading embedding model file");
            download(&client, &url, &target).await?;
        }

        Ok(())
    }

    fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut guard = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            let loaded = load_model_files(&self.model_dir)?;
            tracing::info!(model_dir = %self.model_dir.display(), "Embedding model loaded");
            *guard = Some(loaded);
        }
        let Some((model, tokenizer)) = guard.as_ref() else {
            return Err(EmbeddingError::Inference("model cache is empty".to_string()));
        };
        embed_batch(model, tokenizer, texts)
    }
}

#[async_trait]
impl EmbeddingProvider for BertEmbedder {
    fn name(&self) -> &str {
        "bert"
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let embedder = self.clone();
        let owned = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || embedder.run(owned))
            .await
            .map_err(|err| EmbeddingError::Inference(err.to_string()))??;

        ensure_count(expected, vectors.len())?;
        Ok(vectors)
    }
}

impl From<candle::Error> for EmbeddingError {
    fn from(err: candle::Error) -> Self {
        EmbeddingError::Inference(err.to_string())
    }
}

fn device() -> Result<Device, EmbeddingError> {
    if candle::utils::cuda_is_available() {
        Ok(Device::new_cuda(0)?)
    } else if candle::utils::metal_is_available() {
        Ok(Device::new_metal(0)?)
    } else {
        Ok(Device::Cpu)
    }
}

fn load_model_files(dir: &Path) -> Result<LoadedModel, EmbeddingError> {
    let config_path = dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path).map_err(|err| {
        EmbeddingError::ModelFiles(format!("{}: {err}", config_path.display()))
    })?;
    let config_json: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| EmbeddingError::ModelFiles(format!("config.json: {err}")))?;
    let pad_id = config_json["pad_token_id"].as_u64().unwrap_or(0) as u32;
    let config: Config = serde_json::from_value(config_json)
        .map_err(|err| EmbeddingError::ModelFiles(format!("config.json: {err}")))?;

    let mut tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
        .map_err(|err| EmbeddingError::Tokenizer(err.to_string()))?;
    tokenizer
        .with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            pad_id,
            ..Default::default()
        }))
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..Default::default()
        }))
        .map_err(|err| EmbeddingError::Tokenizer(err.to_string()))?;

    let weights = dir.join("model.safetensors");
    if !weights.exists() {
        return Err(EmbeddingError::ModelFiles(format!("{} is missing", weights.display())));
    }
    // SAFETY: the weights file is treated as read-only for the lifetime of the mapping.
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DTYPE, &device()?)? };
    let model = BertModel::load(vb, &config)?;

    Ok((model, tokenizer))
}

fn embed_batch(
    model: &BertModel,
    tokenizer: &Tokenizer,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let encodings = tokenizer
        .encode_batch(texts, true)
        .map_err(|err| EmbeddingError::Tokenizer(err.to_string()))?;

    let ids = encodings
        .iter()
        .map(|encoding| Tensor::new(encoding.get_ids(), &model.device))
        .collect::<Result<Vec<_>, _>>()?;
    let masks = encodings
        .iter()
        .map(|encoding| Tensor::new(encoding.get_attention_mask(), &model.device))
        .collect::<Result<Vec<_>, _>>()?;

    let ids = Tensor::stack(&ids, 0)?;
    let mask = Tensor::stack(&masks, 0)?;
    let type_ids = ids.zeros_like()?;

    let hidden = model.forward(&ids, &type_ids, Some(&mask))?;

    // Mean over real tokens only, then unit length so cosine is a dot product.
    let mask = mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    let pooled = summed.broadcast_div(&counts)?;
    let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    let normalized = pooled.broadcast_div(&norms)?;

    Ok(normalized.to_dtype(DType::F32)?.to_vec2::<f32>()?)
}

async fn download(client: &reqwest::Client, url: &str, target: &Path) -> Result<(), EmbeddingError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| EmbeddingError::Request(err.to_string()))?;

    let partial = target.with_extension("part");
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(|err| EmbeddingError::ModelFiles(err.to_string()))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| EmbeddingError::Request(err.to_string()))?;
        file.write_all(&chunk).await.map_err(|err| EmbeddingError::ModelFiles(err.to_string()))?;
    }
    file.flush().await.map_err(|err| EmbeddingError::ModelFiles(err.to_string()))?;
    drop(file);

    tokio::fs::rename(&partial, target)
        .await
        .map_err(|err| EmbeddingError::ModelFiles(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_batch_skips_model_loading() {
        let embedder = BertEmbedder::new("/nonexistent/model/dir");
        let vectors = embedder.encode(&[]).await.expect("empty batch");
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn missing_model_directory_is_reported() {
        let embedder = BertEmbedder::new("/nonexistent/model/dir");
        let err = embedder.encode(&["hello".to_string()]).await.expect_err("no model files");
        assert!(matches!(err, EmbeddingError::ModelFiles(_)));
    }
}
