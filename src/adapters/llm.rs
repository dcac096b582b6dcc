use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "gemini-1.5-flash-latest".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.2,
            max_output_tokens: 8192,
        }
    }
}

/// Handle to a file previously uploaded to the provider's file store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHandle {
    pub uri: String,
    pub mime_type: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub attachments: Vec<FileHandle>,
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;
    async fn upload_file(&self, path: &Path, display_name: &str) -> Result<FileHandle>;
    fn model_name(&self) -> &str;
}

pub fn create_model(config: &ModelConfig) -> Result<Box<dyn GenerativeModel>> {
    // Gemini is the only provider wired up today; the factory keeps callers
    // off the concrete type so another backend can slot in later.
    Ok(Box::new(crate::adapters::GeminiModel::new(config.clone())?))
}
