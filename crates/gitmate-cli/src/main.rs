//! GitMate - ask about your repository and your team's knowledge base
//!
//! - `gitmate chat --user <id>` - interactive session with tool use
//! - `gitmate ask <question>` - one knowledge-base answer with citations
//! - `gitmate ingest <folder>` - index .txt/.md files into the knowledge store

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use gitmate_core::agent::{AgentOrchestrator, OrchestratorConfig};
use gitmate_core::ai::AiClient;
use gitmate_core::auth::{CredentialManager, GitHubAppIssuer};
use gitmate_core::github::GitHubClient;
use gitmate_core::index::{
    ingest_folder, ChunkConfig, KnowledgeAssistant, OllamaEmbedder, Retriever, SqliteVectorStore,
};
use gitmate_core::storage::HistoryStore;
use gitmate_core::tools::{register_all_tools, ToolRegistry, ToolServices};
use gitmate_core::{paths, AppConfig};

mod chat;

#[derive(Parser)]
#[command(name = "gitmate")]
#[command(about = "Chat with your GitHub repository and knowledge base", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat; history is kept per user between runs
    Chat {
        /// Identifies whose conversation history to load and save
        #[arg(short, long, default_value = "default")]
        user: String,
    },

    /// Answer one question from the knowledge base
    Ask { question: String },

    /// Chunk, embed and store every .txt/.md file in a folder
    Ingest { folder: PathBuf },
}

fn init_logging(log_dir: &std::path::Path) -> Result<()> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join("gitmate.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to create log file: {}, falling back to null device",
                e
            );
            std::fs::File::create(null_device)
                .with_context(|| format!("Failed to open null device {}", null_device))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Wire the configured collaborators into an orchestrator
fn build_agent(config: &AppConfig, backend: Arc<AiClient>) -> Result<AgentOrchestrator> {
    let github = match &config.github {
        Some(settings) => {
            let issuer = GitHubAppIssuer::new(
                &settings.api_url,
                &settings.app_id,
                &settings.private_key_pem,
                settings.installation.clone(),
            )
            .context("Failed to load GitHub App credentials")?;
            let credentials = Arc::new(CredentialManager::with_ttl(
                Arc::new(issuer),
                settings.token_ttl,
            ));
            Some(Arc::new(GitHubClient::new(
                &settings.api_url,
                &settings.repository,
                credentials,
            )))
        }
        None => {
            tracing::warn!("GitHub App not configured; repository tools disabled");
            None
        }
    };

    let retriever = if config.retrieval_configured() {
        Some(Arc::new(
            Retriever::from_settings(&config.rag).context("Failed to open knowledge store")?,
        ))
    } else {
        tracing::warn!("Knowledge store not configured; knowledge_lookup disabled");
        None
    };

    let mut registry = ToolRegistry::new();
    register_all_tools(
        &mut registry,
        &ToolServices {
            github,
            retriever,
            youtube_api_key: config.youtube_api_key.clone(),
        },
    )?;
    tracing::info!(tools = registry.len(), "Tool registry ready");

    Ok(AgentOrchestrator::new(
        backend,
        Arc::new(registry),
        OrchestratorConfig {
            max_iterations: config.max_iterations,
            tool_timeout: Some(config.tool_timeout),
            model_timeout: config.llm.timeout,
            ..OrchestratorConfig::default()
        },
    ))
}

async fn ask(config: &AppConfig, backend: Arc<AiClient>, question: &str) -> Result<()> {
    let retriever =
        Arc::new(Retriever::from_settings(&config.rag).context("Knowledge store unavailable")?);
    let assistant = KnowledgeAssistant::new(retriever, backend);
    let answer = assistant.answer(question, &[]).await?;
    println!("{}", answer.text);
    Ok(())
}

async fn ingest(config: &AppConfig, folder: &std::path::Path) -> Result<()> {
    let model = config
        .rag
        .embedding_model
        .clone()
        .context("RAG_EMBEDDING_MODEL must be set to ingest documents")?;
    let db_path = config
        .rag
        .db_path
        .clone()
        .unwrap_or_else(paths::knowledge_db_path);

    let embedder = OllamaEmbedder::new(&config.rag.ollama_url, model);
    let store = SqliteVectorStore::open(&db_path)?;
    let report = ingest_folder(
        folder,
        &embedder,
        &store,
        &config.rag.collection,
        ChunkConfig::default(),
    )
    .await?;

    println!(
        "Indexed {} chunks from {} documents into {} ({} skipped)",
        report.chunks,
        report.documents,
        db_path.display(),
        report.skipped.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_logging(&config.log_dir)?;
    tracing::info!(model = %config.llm.model, "Starting GitMate");

    match cli.command {
        Commands::Chat { user } => {
            let backend = Arc::new(AiClient::new(config.llm.client_config()));
            let agent = build_agent(&config, backend)?;
            let history = HistoryStore::new(&config.history_dir);
            chat::run(&agent, &history, &user).await?;
        }
        Commands::Ask { question } => {
            let backend = Arc::new(AiClient::new(config.llm.client_config()));
            ask(&config, backend, &question).await?;
        }
        Commands::Ingest { folder } => ingest(&config, &folder).await?,
    }

    Ok(())
}
