use anyhow::Result;
use clap::Parser;
use docdex::db::{migrate, Db};
use docdex::embeddings::HttpEmbedder;
use docdex::ingest::{scan_and_ingest, FileStatus, IngestOptions, Ingestor, ParserRegistry};
use docdex::scan::ScanOptions;
use docdex::Config;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Scan a directory and ingest every matched document (dedup-aware)")]
struct Args {
    /// Directory to ingest; defaults to the configured watch directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Glob pattern relative to the directory (e.g. "**/*.pdf")
    #[arg(short, long)]
    pattern: Option<String>,

    /// Extensions to include (repeatable), e.g. -e pdf -e docx
    #[arg(short, long = "ext")]
    extensions: Vec<String>,

    /// Do not descend into subdirectories
    #[arg(long)]
    no_recursive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    log::info!("Starting Docdex batch ingestion");

    let config = Config::load()?;
    log::info!("Watch directory: {}", config.watch_dir().display());
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| migrate::run_migrations(conn, migrations_dir))
        .await?;

    let registry = ParserRegistry::from_config(&config.parser);
    let embedder = HttpEmbedder::from_config(&config.embeddings)?;
    let ingestor = Ingestor::new(&db, &registry, &embedder, &config);

    let root = args
        .dir
        .unwrap_or_else(|| config.watch_dir().to_path_buf());
    let scan_options = ScanOptions {
        extensions: (!args.extensions.is_empty())
            .then(|| args.extensions.iter().cloned().collect()),
        pattern: args.pattern.clone(),
        recursive: !args.no_recursive,
        compute_hash: false,
    };

    let report = scan_and_ingest(
        &ingestor,
        &root,
        &scan_options,
        &IngestOptions::from_config(&config),
    )
    .await?;

    log::info!("=== Batch Ingest Complete ===");
    log::info!("Files matched: {}", report.total);
    log::info!("  Success: {}", report.success);
    log::info!("  Skipped (already indexed): {}", report.skipped);
    log::info!("  Failed: {}", report.failed);
    for detail in report.details.iter().filter(|d| d.status == FileStatus::Error) {
        log::warn!(
            "  ✗ {}: {}",
            detail.file,
            detail.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}
