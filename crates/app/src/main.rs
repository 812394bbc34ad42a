mod config;
mod routes;

use chrono::Utc;
use clap::Parser;
use config::DataDirs;
use dataset_forge_core::{
    select_strategies, ArtifactStore, ExtractionPipeline, MetadataStore, OllamaClient,
    UploadStore, DEFAULT_OLLAMA_URL,
};
use routes::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dataset-forge-server", version)]
struct Cli {
    /// Address to bind the HTTP server on.
    #[arg(long, env = "DATASET_FORGE_BIND", default_value = "0.0.0.0:8000")]
    bind: String,

    /// Root directory for uploads, extraction artifacts, datasets, and models.
    #[arg(long, env = "DATASET_FORGE_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Ollama base URL.
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Directory holding the noun and verb wordlists. Defaults to
    /// `<data-dir>/lexicon`; when the lists are absent the rule-based
    /// segmentation and filtering strategies are used instead.
    #[arg(long, env = "DATASET_FORGE_LEXICON_DIR")]
    lexicon_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let dirs = DataDirs::create(&cli.data_dir)?;
    let lexicon_dir = cli
        .lexicon_dir
        .unwrap_or_else(|| cli.data_dir.join("lexicon"));

    // Strategy selection happens once; the choice is fixed for the process.
    let strategies = select_strategies(Some(&lexicon_dir))
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let pipeline = ExtractionPipeline::new(&dirs.uploads, strategies.clone())
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let state = AppState {
        uploads: Arc::new(UploadStore::new(&dirs.uploads)),
        metadata: Arc::new(MetadataStore::new(&dirs.uploads)),
        extraction: Arc::new(ArtifactStore::new(&dirs.extraction)),
        datasets: Arc::new(ArtifactStore::new(&dirs.datasets)),
        pipeline: Arc::new(pipeline),
        llm: Arc::new(OllamaClient::new(&cli.ollama_url, &dirs.models)),
        models_dir: dirs.models.clone(),
    };

    info!(
        version = app_version,
        bind = %cli.bind,
        data_dir = %cli.data_dir.display(),
        syntactic = strategies.syntactic,
        started_at = %Utc::now().to_rfc3339(),
        "dataset-forge-server boot"
    );

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
