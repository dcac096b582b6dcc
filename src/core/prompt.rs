use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Loads prompt templates from a directory of plain-text files with
/// `{name}` substitution placeholders.
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn load(&self, name: &str) -> Result<String> {
        load_template(&self.dir.join(name)).await
    }
}

pub async fn load_template(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("prompt template '{}' is missing or unreadable", path.display()))
}

pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = template.to_string();
    for (name, value) in values {
        filled = filled.replace(&format!("{{{name}}}"), value);
    }
    filled
}
