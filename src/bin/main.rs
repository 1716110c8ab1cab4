use clap::Parser;
use custody_brief::{
    client::{AnalysisClient, GeminiAnalysisClient, MockAnalysisClient},
    config::AppConfig,
    encoder::UploadCandidate,
    flow::AnalysisFlow,
    models::AnalysisStatus,
    profile::{FileProfileStore, ProfileStore},
    report::format_cad,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Analyze one family-law document and print the report as JSON.
#[derive(Parser, Debug)]
#[command(name = "custody-brief", version)]
struct Cli {
    /// Document to analyze (.pdf, .jpg, .jpeg, .png, .webp)
    #[arg(value_name = "DOCUMENT")]
    path: PathBuf,

    /// Use the built-in sample response instead of calling the model
    #[arg(long)]
    mock: bool,

    /// Jurisdiction id for the prompt, e.g. british-columbia (overrides the stored profile)
    #[arg(long, value_name = "ID")]
    jurisdiction: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;

    let client: Arc<dyn AnalysisClient> = if cli.mock {
        Arc::new(MockAnalysisClient::new(Duration::from_millis(500)))
    } else {
        Arc::new(GeminiAnalysisClient::new(config.gemini.clone())?)
    };
    let flow = AnalysisFlow::new(client, config.flow)?;

    let jurisdiction = match (cli.jurisdiction, &config.profile_store_path) {
        (Some(id), _) => Some(id),
        (None, Some(store_path)) => FileProfileStore::new(store_path.clone())
            .load()
            .await?
            .and_then(|p| p.jurisdiction().map(str::to_string)),
        (None, None) => None,
    };

    let candidate = UploadCandidate::from_path(&cli.path)?;
    info!(file = %cli.path.display(), "Submitting document");
    flow.submit_with_jurisdiction(candidate, jurisdiction)?;

    let mut rx = flow.subscribe();
    let mut last_stage = None;
    loop {
        let session = rx.borrow_and_update().clone();
        if !session.is_analyzing() {
            break;
        }
        if session.stage() != last_stage {
            last_stage = session.stage();
            if let Some(stage) = last_stage {
                eprintln!("[{:>3}%] {}", session.progress, stage);
            }
        }
        if rx.changed().await.is_err() {
            break;
        }
    }

    let session = flow.session();
    match (session.status, flow.report()) {
        (AnalysisStatus::Complete, Some(report)) => {
            eprintln!(
                "Applicant {} / Respondent {}",
                format_cad(report.summary.applicant_income),
                format_cad(report.summary.respondent_income)
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        _ => {
            eprintln!(
                "Analysis failed ({}): {}",
                session.error_kind.as_deref().unwrap_or("Unknown"),
                session
                    .error_reason
                    .as_deref()
                    .unwrap_or("An unexpected error occurred during analysis.")
            );
            std::process::exit(1);
        }
    }
}
