use crate::adapters::llm::{FileHandle, GenerationRequest, GenerativeModel};
use crate::core::prompt::{fill, TemplateStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// The two document slots a session can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Report,
    Review,
}

impl DocumentKind {
    pub fn text_template(&self) -> &'static str {
        match self {
            DocumentKind::Report => "report.txt",
            DocumentKind::Review => "review.txt",
        }
    }

    pub fn file_template(&self) -> &'static str {
        match self {
            DocumentKind::Report => "report_file.txt",
            DocumentKind::Review => "review_file.txt",
        }
    }

    pub fn download_name(&self) -> &'static str {
        match self {
            DocumentKind::Report => "technical_report.pdf",
            DocumentKind::Review => "code_review.pdf",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Report => write!(f, "report"),
            DocumentKind::Review => write!(f, "review"),
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "report" => Ok(DocumentKind::Report),
            "review" => Ok(DocumentKind::Review),
            other => anyhow::bail!("unknown document kind '{other}', expected 'report' or 'review'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodeBlob {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Tagged input variant: which fields may be absent is explicit in the type
/// instead of being inferred from which arguments happen to be non-null.
#[derive(Debug, Clone)]
pub enum CodeInput {
    Text {
        before: Option<String>,
        after: String,
    },
    Files {
        before: Option<CodeBlob>,
        after: CodeBlob,
    },
}

pub struct ContentGenerator {
    templates: TemplateStore,
    model: Arc<dyn GenerativeModel>,
}

impl ContentGenerator {
    pub fn new(templates: TemplateStore, model: Arc<dyn GenerativeModel>) -> Self {
        Self { templates, model }
    }

    /// Fills the template for `kind` with the developer summary and the code
    /// input, sends one request to the model, returns the raw markdown.
    pub async fn generate(
        &self,
        kind: DocumentKind,
        summary: &str,
        input: CodeInput,
    ) -> Result<String> {
        match input {
            CodeInput::Text { before, after } => {
                self.generate_from_text(kind, summary, before, after).await
            }
            CodeInput::Files { before, after } => {
                self.generate_from_files(kind, summary, before, after).await
            }
        }
    }

    async fn generate_from_text(
        &self,
        kind: DocumentKind,
        summary: &str,
        before: Option<String>,
        after: String,
    ) -> Result<String> {
        anyhow::ensure!(
            !after.trim().is_empty(),
            "the AFTER code is required to generate a {kind}"
        );
        let template = self.templates.load(kind.text_template()).await?;

        let before = before.filter(|text| !text.trim().is_empty());
        let code_section = build_code_section(before.as_deref(), &after);
        let prompt = fill(
            &template,
            &[
                ("developer_summary", summary),
                ("code_section", &code_section),
            ],
        );

        info!(%kind, "generating from pasted text");
        let response = self
            .model
            .generate(GenerationRequest {
                prompt,
                attachments: Vec::new(),
            })
            .await?;
        Ok(response.content)
    }

    async fn generate_from_files(
        &self,
        kind: DocumentKind,
        summary: &str,
        before: Option<CodeBlob>,
        after: CodeBlob,
    ) -> Result<String> {
        let template = self.templates.load(kind.file_template()).await?;
        let prompt = fill(&template, &[("developer_summary", summary)]);

        info!(%kind, file = %after.filename, "generating from uploaded files");
        let after_handle = self
            .upload_blob(&after, "code_after")
            .await
            .context("failed to upload the AFTER file")?;

        let mut attachments = vec![after_handle];
        if let Some(before) = before {
            // The BEFORE attachment is best-effort; generation proceeds without it.
            match self.upload_blob(&before, "code_before").await {
                Ok(handle) => attachments.push(handle),
                Err(err) => warn!(file = %before.filename, "skipping BEFORE attachment: {err:#}"),
            }
        }

        let response = self
            .model
            .generate(GenerationRequest {
                prompt,
                attachments,
            })
            .await?;
        Ok(response.content)
    }

    async fn upload_blob(&self, blob: &CodeBlob, display_name: &str) -> Result<FileHandle> {
        // The blob lands in a named temp file only for the duration of the
        // upload; the file is removed on drop whether the upload succeeds or not.
        let suffix = std::path::Path::new(&blob.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .prefix("codedraft-upload-")
            .suffix(&suffix)
            .tempfile()
            .context("failed to create transient upload file")?;
        tmp.write_all(&blob.bytes)
            .and_then(|_| tmp.flush())
            .context("failed to write transient upload file")?;

        self.model.upload_file(tmp.path(), display_name).await
    }
}

/// Single prompt section embedding the snippets. With only an AFTER snippet
/// the section carries the review header; with both, BEFORE comes first.
pub fn build_code_section(before: Option<&str>, after: &str) -> String {
    match before {
        Some(before) => format!(
            "## Code BEFORE:\n```\n{before}\n```\n\n## Code AFTER:\n```\n{after}\n```"
        ),
        None => format!("## Code to Review:\n```\n{after}\n```"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::GenerationResponse;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeModel {
        prompts: Mutex<Vec<GenerationRequest>>,
        fail_upload_of: Option<&'static str>,
    }

    #[async_trait]
    impl GenerativeModel for FakeModel {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
            self.prompts.lock().unwrap().push(request);
            Ok(GenerationResponse {
                content: "# Generated".to_string(),
                model: "fake".to_string(),
                usage: None,
            })
        }

        async fn upload_file(&self, _path: &Path, display_name: &str) -> Result<FileHandle> {
            if self.fail_upload_of == Some(display_name) {
                anyhow::bail!("upload rejected");
            }
            Ok(FileHandle {
                uri: format!("files/{display_name}"),
                mime_type: "text/plain".to_string(),
                display_name: display_name.to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    fn store_with_templates() -> (tempfile::TempDir, TemplateStore) {
        let dir = tempfile::tempdir().unwrap();
        for name in ["report.txt", "review.txt", "report_file.txt", "review_file.txt"] {
            let body = if name.ends_with("_file.txt") {
                "Task: {developer_summary}"
            } else {
                "Task: {developer_summary}\n\n{code_section}"
            };
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let store = TemplateStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn code_section_with_after_only_has_single_header() {
        let section = build_code_section(None, "def a(): return 1");
        assert!(section.contains("## Code to Review:"));
        assert!(!section.contains("## Code BEFORE:"));
        assert!(!section.contains("## Code AFTER:"));
    }

    #[test]
    fn code_section_with_both_orders_before_then_after() {
        let section = build_code_section(Some("def a(): pass"), "def a(): return 1");
        let before_pos = section.find("## Code BEFORE:").unwrap();
        let after_pos = section.find("## Code AFTER:").unwrap();
        assert!(before_pos < after_pos);
    }

    #[tokio::test]
    async fn text_mode_embeds_both_snippets_in_prompt() {
        let (_dir, store) = store_with_templates();
        let model = Arc::new(FakeModel::default());
        let generator = ContentGenerator::new(store, model.clone());

        let markdown = generator
            .generate(
                DocumentKind::Report,
                "Refactored auth",
                CodeInput::Text {
                    before: Some("def a(): pass".to_string()),
                    after: "def a(): return 1".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(markdown, "# Generated");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0].prompt;
        assert!(prompt.contains("Refactored auth"));
        assert!(prompt.contains("def a(): pass"));
        assert!(prompt.contains("def a(): return 1"));
    }

    #[tokio::test]
    async fn empty_string_before_is_treated_as_absent() {
        let (_dir, store) = store_with_templates();
        let model = Arc::new(FakeModel::default());
        let generator = ContentGenerator::new(store, model.clone());

        generator
            .generate(
                DocumentKind::Review,
                "s",
                CodeInput::Text {
                    before: Some("  ".to_string()),
                    after: "fn main() {}".to_string(),
                },
            )
            .await
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].prompt.contains("## Code to Review:"));
        assert!(!prompts[0].prompt.contains("## Code BEFORE:"));
    }

    #[tokio::test]
    async fn empty_after_is_rejected_without_a_model_call() {
        let (_dir, store) = store_with_templates();
        let model = Arc::new(FakeModel::default());
        let generator = ContentGenerator::new(store, model.clone());

        let err = generator
            .generate(
                DocumentKind::Report,
                "s",
                CodeInput::Text {
                    before: None,
                    after: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AFTER"));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_template_aborts_before_any_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(FakeModel::default());
        let generator = ContentGenerator::new(TemplateStore::new(dir.path()), model.clone());

        let err = generator
            .generate(
                DocumentKind::Report,
                "Refactored auth",
                CodeInput::Text {
                    before: Some("def a(): pass".to_string()),
                    after: "def a(): return 1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("report.txt"));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_mode_attaches_both_handles() {
        let (_dir, store) = store_with_templates();
        let model = Arc::new(FakeModel::default());
        let generator = ContentGenerator::new(store, model.clone());

        generator
            .generate(
                DocumentKind::Report,
                "s",
                CodeInput::Files {
                    before: Some(CodeBlob {
                        filename: "before.py".to_string(),
                        bytes: b"def a(): pass".to_vec(),
                    }),
                    after: CodeBlob {
                        filename: "after.py".to_string(),
                        bytes: b"def a(): return 1".to_vec(),
                    },
                },
            )
            .await
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0].attachments.len(), 2);
        assert_eq!(prompts[0].attachments[0].display_name, "code_after");
        assert_eq!(prompts[0].attachments[1].display_name, "code_before");
    }

    #[tokio::test]
    async fn failed_before_upload_degrades_to_after_only() {
        let (_dir, store) = store_with_templates();
        let model = Arc::new(FakeModel {
            fail_upload_of: Some("code_before"),
            ..FakeModel::default()
        });
        let generator = ContentGenerator::new(store, model.clone());

        generator
            .generate(
                DocumentKind::Review,
                "s",
                CodeInput::Files {
                    before: Some(CodeBlob {
                        filename: "before.py".to_string(),
                        bytes: b"x".to_vec(),
                    }),
                    after: CodeBlob {
                        filename: "after.py".to_string(),
                        bytes: b"y".to_vec(),
                    },
                },
            )
            .await
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0].attachments.len(), 1);
        assert_eq!(prompts[0].attachments[0].display_name, "code_after");
    }

    #[tokio::test]
    async fn failed_after_upload_aborts_generation() {
        let (_dir, store) = store_with_templates();
        let model = Arc::new(FakeModel {
            fail_upload_of: Some("code_after"),
            ..FakeModel::default()
        });
        let generator = ContentGenerator::new(store, model.clone());

        let err = generator
            .generate(
                DocumentKind::Review,
                "s",
                CodeInput::Files {
                    before: None,
                    after: CodeBlob {
                        filename: "after.py".to_string(),
                        bytes: b"y".to_vec(),
                    },
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AFTER"));
        assert!(model.prompts.lock().unwrap().is_empty());
    }
}
