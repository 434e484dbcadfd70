use anyhow::Result;
use clap::Parser;
use docdex::db::{migrate, Db};
use docdex::embeddings::HttpEmbedder;
use docdex::ingest::{Ingestor, ParserRegistry};
use docdex::sync::run_sync;
use docdex::Config;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "sync")]
#[command(about = "Run one reconciliation pass between the watch directory and the catalog")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let _args = Args::parse();

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

    let report = run_sync(&ingestor).await?;

    log::info!("=== Sync Complete ===");
    log::info!("{}", report);
    if report.errors > 0 {
        log::warn!("Some paths failed; see errors above and the documents table error_msg column.");
    }

    Ok(())
}
