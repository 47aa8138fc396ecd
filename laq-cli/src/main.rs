mod app;
mod cli;
mod display;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use laq_rag::{CommandConverter, LaqConfig, LaqPipeline, OllamaClient, SqliteVectorStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "laq_rag=debug,laq=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Environment configuration with command-line flags taking precedence.
fn load_config(cli: &Cli) -> Result<LaqConfig> {
    let config = LaqConfig::from_lookup(|key| {
        let flag = match key {
            "LAQ_DB_PATH" => cli.db_path.as_ref().map(|p| p.display().to_string()),
            "LAQ_COLLECTION" => cli.collection.clone(),
            "LAQ_OLLAMA_HOST" => cli.ollama_host.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })?;
    Ok(config)
}

async fn build_pipeline(config: LaqConfig) -> Result<LaqPipeline> {
    let ollama = Arc::new(OllamaClient::from_config(&config));
    let store = Arc::new(SqliteVectorStore::open_dir(&config.db_path)?);
    let converter = Arc::new(CommandConverter::pdftotext(config.converter_program.clone()));

    info!(
        db_path = %config.db_path.display(),
        collection = %config.collection_name,
        host = %config.ollama_host,
        "starting pipeline"
    );

    let pipeline = LaqPipeline::builder()
        .config(config)
        .converter(converter)
        .generator(ollama.clone())
        .embedding_provider(ollama)
        .vector_store(store)
        .build()?;
    pipeline.ensure_collection().await?;
    Ok(pipeline)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut app = App::new(build_pipeline(config).await?)?;

    match cli.command.unwrap_or(Command::Shell) {
        Command::Upload { path, yes } => app.upload(&path, yes).await,
        Command::Search { query, top_k } => app.search(&query, top_k).await,
        Command::Chat { query } => app.chat(&query).await,
        Command::Info => app.info().await,
        Command::Clear { yes } => app.clear(yes).await,
        Command::Shell => app.shell().await,
    }
}
