mod adapters;
mod config;
mod core;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::llm::{create_model, ModelConfig};
use crate::adapters::GithubClient;
use crate::core::{
    CodeInput, CommitDiffer, CommitPointerStore, ContentGenerator, DocumentExporter, DocumentKind,
    TemplateStore,
};
use crate::server::session::SessionStore;
use crate::server::AppState;

#[derive(Parser)]
#[command(name = "codedraft")]
#[command(about = "AI-assisted technical reports and code reviews with PDF export", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    model: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the interactive interface")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
    #[command(about = "Run the push-webhook listener process")]
    Webhook {
        #[arg(long, default_value = "0.0.0.0:5001")]
        addr: SocketAddr,
    },
    #[command(about = "One-shot generation from files on disk")]
    Generate {
        #[arg(long, help = "Developer summary of the change")]
        summary: String,

        #[arg(long, help = "Path to the BEFORE version (optional)")]
        before: Option<PathBuf>,

        #[arg(long, help = "Path to the AFTER version")]
        after: PathBuf,

        #[arg(long, value_enum, default_value = "report")]
        kind: KindArg,

        #[arg(short, long, help = "Output file (stdout if not provided)")]
        output: Option<PathBuf>,

        #[arg(long, help = "Export as PDF instead of markdown (requires --output)")]
        pdf: bool,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum KindArg {
    Report,
    Review,
}

impl From<KindArg> for DocumentKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Report => DocumentKind::Report,
            KindArg::Review => DocumentKind::Review,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = config::Config::load().unwrap_or_default();
    config.merge_with_cli(cli.model.clone());

    match cli.command {
        Commands::Serve { addr } => serve_command(config, addr).await?,
        Commands::Webhook { addr } => webhook_command(config, addr).await?,
        Commands::Generate {
            summary,
            before,
            after,
            kind,
            output,
            pdf,
        } => generate_command(config, summary, before, after, kind.into(), output, pdf).await?,
    }

    Ok(())
}

fn model_config(config: &config::Config, api_key: String) -> ModelConfig {
    ModelConfig {
        model_name: config.model.clone(),
        api_key: Some(api_key),
        base_url: config.gemini_base_url.clone(),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    }
}

async fn serve_command(config: config::Config, addr: SocketAddr) -> Result<()> {
    // Credentials are checked before binding so a misconfigured deploy
    // halts with guidance instead of failing on the first request.
    let gemini_key = config.require_gemini_api_key()?;
    let github_token = config.require_github_token()?;

    info!("starting interface with model: {}", config.model);
    let model = create_model(&model_config(&config, gemini_key))?;
    let github = GithubClient::new(github_token, config.github_base_url.clone())?;

    let state = Arc::new(AppState {
        generator: ContentGenerator::new(
            TemplateStore::new(config.prompt_dir.clone()),
            Arc::from(model),
        ),
        differ: CommitDiffer::new(github),
        exporter: DocumentExporter::new(config.pdf_renderer.clone()),
        sessions: SessionStore::new(),
        pointer: CommitPointerStore::new(config.scratch_file.clone()),
    });

    server::serve(addr, state).await
}

async fn webhook_command(config: config::Config, addr: SocketAddr) -> Result<()> {
    let store = Arc::new(CommitPointerStore::new(config.scratch_file.clone()));
    server::webhook::serve(addr, store).await
}

async fn generate_command(
    config: config::Config,
    summary: String,
    before: Option<PathBuf>,
    after: PathBuf,
    kind: DocumentKind,
    output: Option<PathBuf>,
    pdf: bool,
) -> Result<()> {
    let gemini_key = config.require_gemini_api_key()?;

    let after_text = tokio::fs::read_to_string(&after)
        .await
        .with_context(|| format!("failed to read {}", after.display()))?;
    let before_text = match &before {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let model = create_model(&model_config(&config, gemini_key))?;
    let generator = ContentGenerator::new(
        TemplateStore::new(config.prompt_dir.clone()),
        Arc::from(model),
    );

    let markdown = generator
        .generate(
            kind,
            &summary,
            CodeInput::Text {
                before: before_text,
                after: after_text,
            },
        )
        .await?;

    if pdf {
        let path = output.context("--pdf needs --output to name the file")?;
        let exporter = DocumentExporter::new(config.pdf_renderer.clone());
        let bytes = exporter.to_pdf(&markdown).await?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    } else if let Some(path) = output {
        tokio::fs::write(&path, markdown)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    } else {
        println!("{markdown}");
    }

    Ok(())
}
