use custody_brief::{
    api::{start_server, ApiState},
    client::GeminiAnalysisClient,
    config::AppConfig,
    flow::AnalysisFlow,
    profile::{FileProfileStore, InMemoryProfileStore, ProfileStore},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables before the filter reads RUST_LOG
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    if !config.gemini.has_credential() {
        warn!("GEMINI_API_KEY not set; every analysis will fail with MissingCredential");
    }

    info!("Document Analysis - API Server");
    info!("Port: {}", config.port);
    info!("Model: {}", config.gemini.model);

    let profiles: Arc<dyn ProfileStore> = match &config.profile_store_path {
        Some(path) => {
            info!("Profile store: {}", path.display());
            Arc::new(FileProfileStore::new(path.clone()))
        }
        None => Arc::new(InMemoryProfileStore::new()),
    };

    let client = Arc::new(GeminiAnalysisClient::new(config.gemini.clone())?);
    let flow = AnalysisFlow::new(client, config.flow)?;

    info!("Analysis flow initialized");

    start_server(ApiState { flow, profiles }, config.port).await?;

    Ok(())
}
