pub mod commit_diff;
pub mod export;
pub mod generator;
pub mod pointer;
pub mod prompt;

pub use commit_diff::{ChangedFile, CommitDiffer, FileStatus};
pub use export::DocumentExporter;
pub use generator::{CodeBlob, CodeInput, ContentGenerator, DocumentKind};
pub use pointer::{CommitPointerStore, LatestCommit};
pub use prompt::TemplateStore;
