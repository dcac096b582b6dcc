pub mod gemini;
pub mod github;
pub mod llm;

pub use gemini::GeminiModel;
pub use github::{GithubClient, GithubError};
