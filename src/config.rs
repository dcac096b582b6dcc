use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    pub gemini_api_key: Option<String>,
    pub github_token: Option<String>,
    pub gemini_base_url: Option<String>,
    pub github_base_url: Option<String>,

    #[serde(default = "default_prompt_dir")]
    pub prompt_dir: PathBuf,

    #[serde(default = "default_scratch_file")]
    pub scratch_file: PathBuf,

    #[serde(default = "default_pdf_renderer")]
    pub pdf_renderer: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            gemini_api_key: None,
            github_token: None,
            gemini_base_url: None,
            github_base_url: None,
            prompt_dir: default_prompt_dir(),
            scratch_file: default_scratch_file(),
            pdf_renderer: default_pdf_renderer(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Try .codedraft.yml in the current directory first
        for name in [".codedraft.yml", ".codedraft.yaml"] {
            let config_path = PathBuf::from(name);
            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // Then in the home directory
        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".codedraft.yml");
            if home_config.exists() {
                let content = std::fs::read_to_string(&home_config)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    pub fn merge_with_cli(&mut self, cli_model: Option<String>) {
        if let Some(model) = cli_model {
            self.model = model;
        }
    }

    /// Required credential for every generation path. Checked at startup so
    /// a missing key halts the process with guidance instead of failing on
    /// the first request.
    pub fn require_gemini_api_key(&self) -> Result<String> {
        self.gemini_api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .context(
                "GEMINI_API_KEY is not set. Export it (or add gemini_api_key to .codedraft.yml) and restart.",
            )
    }

    /// Required credential for the GitHub input mode.
    pub fn require_github_token(&self) -> Result<String> {
        self.github_token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .context(
                "GITHUB_TOKEN is not set. Export it (or add github_token to .codedraft.yml) and restart.",
            )
    }
}

fn default_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> usize {
    8192
}

fn default_prompt_dir() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_scratch_file() -> PathBuf {
    PathBuf::from("latest_commit.txt")
}

fn default_pdf_renderer() -> Vec<String> {
    vec!["weasyprint".to_string(), "-".to_string(), "-".to_string()]
}
