//! verifa - command-line document verification.
//!
//! Logs go to stderr (filtered by `RUST_LOG`); the verification outcome is
//! printed to stdout as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use verifa::{create_pipeline, Registries};
use verifa_core::events::TracingObserver;
use verifa_core::resilience::DispatchQueue;
use verifa_core::types::{DocumentType, RawDocument};
use verifa_core::validation::SiblingDocuments;
use verifa_core::VerifaConfig;
use verifa_extractors::image::sniff_mime;

/// Verify administrative documents.
#[derive(Parser)]
#[command(name = "verifa")]
#[command(version)]
#[command(about = "Extract, validate and decide on administrative documents")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (.toml, .json or .yaml); environment overrides apply on top
    #[arg(long, global = true, env = "VERIFA_CONFIG")]
    config: Option<PathBuf>,

    /// Registry fixture (.json) or SQLite database
    #[arg(long, global = true, env = "VERIFA_REGISTRY")]
    registry: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a single document
    Verify {
        /// Declared document type (identity, diploma, transcript, application_letter, statement_letter)
        #[arg(long = "type", value_parser = parse_doc_type)]
        doc_type: DocumentType,

        /// Path to the document (PDF or image)
        #[arg(long)]
        file: PathBuf,
    },
    /// Verify a submission; documents are checked against each other
    Bundle {
        #[arg(long)]
        identity: Option<PathBuf>,
        #[arg(long)]
        diploma: Option<PathBuf>,
        #[arg(long)]
        transcript: Option<PathBuf>,
        #[arg(long)]
        application_letter: Option<PathBuf>,
        #[arg(long)]
        statement_letter: Option<PathBuf>,
    },
}

fn parse_doc_type(value: &str) -> Result<DocumentType, String> {
    value
        .parse()
        .map_err(|_| format!("unknown document type: {}", value))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let registries = match &cli.registry {
        Some(path) => Registries::from_path(path)
            .with_context(|| format!("opening registry {}", path.display()))?,
        None => {
            tracing::warn!("no registry given; registry checks will fail");
            Registries::empty()
        }
    };

    let queue = DispatchQueue::from_config(&config.dispatch);
    let pipeline = create_pipeline(&config, registries, Arc::new(TracingObserver), &queue)?;

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, cancelling in-flight calls");
        cancel.cancel();
    });

    let output = match cli.command {
        Commands::Verify { doc_type, file } => {
            let doc = read_document(doc_type, &file)?;
            let outcome = pipeline.verify(&doc, &SiblingDocuments::new()).await?;
            serde_json::to_value(outcome)?
        }
        Commands::Bundle {
            identity,
            diploma,
            transcript,
            application_letter,
            statement_letter,
        } => {
            let documents = [
                (DocumentType::Identity, identity),
                (DocumentType::Diploma, diploma),
                (DocumentType::Transcript, transcript),
                (DocumentType::ApplicationLetter, application_letter),
                (DocumentType::StatementLetter, statement_letter),
            ]
            .into_iter()
            .filter_map(|(doc_type, path)| path.map(|p| read_document(doc_type, &p)))
            .collect::<Result<Vec<_>>>()?;
            anyhow::ensure!(!documents.is_empty(), "bundle needs at least one document");

            let outcomes = pipeline.verify_bundle(documents).await?;
            serde_json::to_value(outcomes)?
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<VerifaConfig> {
    let mut config = match path {
        Some(path) => VerifaConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VerifaConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn read_document(doc_type: DocumentType, path: &Path) -> Result<RawDocument> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime_type = guess_mime(&bytes, path)
        .with_context(|| format!("cannot tell the file type of {}", path.display()))?;
    tracing::debug!(document = %doc_type, path = %path.display(), %mime_type, "read document");
    Ok(RawDocument::new(doc_type, bytes, mime_type))
}

/// Magic bytes first, extension second.
fn guess_mime(bytes: &[u8], path: &Path) -> Option<String> {
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf".to_string());
    }
    if let Ok(mime) = sniff_mime(bytes) {
        return Some(mime.to_string());
    }
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}
