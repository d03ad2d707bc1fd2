//! Quicktalog — catalogue generation and publishing server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("QUICKTALOG_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = quicktalog_core::ServerConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = quicktalog_store::CatalogueStore::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let generator_config = quicktalog_generate::GeneratorConfig::from_env();
    let completion = quicktalog_generate::OpenAiCompletion::new(&generator_config)
        .map_err(|e| anyhow::anyhow!("Failed to build completion client: {}", e))?;
    let images = quicktalog_generate::images::create_backend(&generator_config);

    let pipeline = quicktalog_generate::CataloguePipeline::new(
        Arc::new(completion),
        images,
        quicktalog_generate::PipelineOptions {
            max_concurrency: generator_config.max_concurrency,
        },
    );

    let state = Arc::new(AppState::new(config, store, pipeline));
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Quicktalog server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
