use anyhow::Result;
use clap::Parser;
use docdex::db::{catalog, chunks, jobs, migrate, Db};
use docdex::sync::SYNC_JOB_NAME;
use docdex::Config;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Show catalog counters and the last sync run")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let _args = Args::parse();

    let config = Config::load()?;
    let db = Db::new(config.db_path());
    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| migrate::run_migrations(conn, migrations_dir))
        .await?;

    let by_status = catalog::count_by_status(&db).await?;
    let total: i64 = by_status.iter().map(|(_, n)| n).sum();
    let chunk_count = chunks::count_all(&db).await?;

    println!("Documents: {}", total);
    for (status, count) in &by_status {
        println!("  {}: {}", status, count);
    }
    println!("Chunks: {}", chunk_count);

    match jobs::last_run(&db, SYNC_JOB_NAME).await? {
        Some(job) => {
            println!("Last sync: {} ({})", job.last_run_at.as_deref().unwrap_or("-"), job.status);
            if let Some(err) = job.last_error {
                println!("  {}", err);
            }
        }
        None => println!("Last sync: never"),
    }

    Ok(())
}
