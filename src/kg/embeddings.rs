//! Chunk embeddings using OpenAI

use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use tracing::debug;

use crate::{Error, Result};

/// Inputs longer than this many characters are cut before embedding.
const MAX_INPUT_CHARS: usize = 8000;

/// Service for generating text embeddings
#[derive(Clone)]
pub struct EmbeddingService {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl EmbeddingService {
    pub fn new(api_key: &str, model: impl Into<String>, base_url: Option<&str>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::configuration("OPENAI_API_KEY", "API key is empty"));
        }

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = base_url {
            config = config.with_api_base(base);
        }

        Ok(Self {
            client: OpenAIClient::with_config(config),
            model: model.into(),
        })
    }

    /// Generate embeddings for multiple texts in one request.
    ///
    /// The result has one entry per input; blank inputs get an empty vector
    /// and are not sent.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let processed: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t.trim(), MAX_INPUT_CHARS))
            .filter(|t| !t.is_empty())
            .collect();

        if processed.is_empty() {
            return Ok(vec![Vec::new(); texts.len()]);
        }

        debug!("Generating embeddings for {} texts", processed.len());

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(processed))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        debug!(
            "Generated {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        let mut embed_iter = data.into_iter();

        let mut result = Vec::with_capacity(texts.len());
        for text in texts {
            if text.trim().is_empty() {
                result.push(Vec::new());
            } else {
                let embedding = embed_iter
                    .next()
                    .ok_or_else(|| Error::OpenAi("fewer embeddings than inputs".to_string()))?;
                result.push(embedding.embedding);
            }
        }

        Ok(result)
    }

    /// Embedding dimension for the current model, used to size the vector index
    pub fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
