use crate::adapters::llm::{
    FileHandle, GenerationRequest, GenerationResponse, GenerativeModel, ModelConfig, Usage,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub struct GeminiModel {
    client: Client,
    config: ModelConfig,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "fileData", skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Serialize)]
struct FileData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "fileUri")]
    file_uri: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: usize,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: usize,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: usize,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: usize,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Deserialize)]
struct UploadedFile {
    uri: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

impl GeminiModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .context("Gemini API key not found. Set GEMINI_API_KEY environment variable or provide in config")?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let mut parts = vec![Part {
            text: Some(request.prompt),
            file_data: None,
        }];
        for attachment in request.attachments {
            parts.push(Part {
                text: None,
                file_data: Some(FileData {
                    mime_type: attachment.mime_type,
                    file_uri: attachment.uri,
                }),
            });
        }

        let gemini_request = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model_name
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let gemini_response: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let content = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.is_empty() {
            anyhow::bail!("Gemini returned no text candidates");
        }

        Ok(GenerationResponse {
            content,
            model: self.config.model_name.clone(),
            usage: gemini_response.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }

    async fn upload_file(&self, path: &Path, display_name: &str) -> Result<FileHandle> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read upload source {}", path.display()))?;
        let mime_type = mime_for_path(path);

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")?,
            )
            .part(
                "file",
                multipart::Part::bytes(bytes)
                    .file_name(display_name.to_string())
                    .mime_str(mime_type)?,
            );

        let url = format!("{}/upload/v1beta/files", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .header("x-goog-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload file to Gemini")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini upload error ({}): {}", status, body);
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .context("Failed to parse Gemini upload response")?;

        Ok(FileHandle {
            uri: uploaded.file.uri,
            mime_type: uploaded.file.mime_type,
            display_name: display_name.to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

// Source files go up as text/plain so the model reads them inline.
fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "text/plain",
    }
}
