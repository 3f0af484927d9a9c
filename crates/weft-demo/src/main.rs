use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing::{debug, info};
use weft::{LoaderConfig, PerformerField, PerformerResolver, RequestContext};
use weft_sqlite::{Db, SqliteStore, init_sqlite, seed_demo};
use weft_types::PerformerId;

const DB_ENV: &str = "WEFT_DB";
const BASE_URL_ENV: &str = "WEFT_BASE_URL";
const DEFAULT_DB: &str = "weft-demo.sqlite";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9999";

#[derive(Parser, Debug)]
#[command(version, about = "Resolve performer fields from a weft SQLite database")]
struct Cli {
    /// Performer ids to resolve
    #[arg(required = true)]
    ids: Vec<i64>,
    /// Comma-separated field names; every field when omitted
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    /// Database path (default: $WEFT_DB, then weft-demo.sqlite)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Prefix for image URLs (default: $WEFT_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
    /// Read the whole request from a single snapshot
    #[arg(long)]
    pinned: bool,
    /// Fill an empty database with demo rows first
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = cli.db.clone().unwrap_or_else(|| {
        PathBuf::from(std::env::var(DB_ENV).unwrap_or_else(|_| DEFAULT_DB.into()))
    });
    let base_url = cli.base_url.clone().unwrap_or_else(|| {
        std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.into())
    });
    let fields = parse_fields(&cli.fields)?;
    let ids: Vec<PerformerId> = cli.ids.iter().copied().map(PerformerId).collect();

    let db = Db::new(db_path);
    init_sqlite(&db).map_err(|e| format!("failed to init sqlite at {:?}: {e}", db.path()))?;
    if cli.seed {
        let seeded = seed_demo(&db).map_err(|e| format!("failed to seed {:?}: {e}", db.path()))?;
        debug!(seeded, "seed step finished");
    }

    let config = LoaderConfig::from_env();
    info!(
        path = ?db.path(),
        max_batch_size = config.max_batch_size,
        batch_wait_us = config.batch_wait.as_micros() as u64,
        pinned = cli.pinned,
        "resolving {} performer(s)",
        ids.len()
    );

    let store = Arc::new(SqliteStore::new(db));
    let ctx = if cli.pinned {
        RequestContext::pinned(Arc::clone(&store), &config)
            .await
            .map_err(|e| format!("failed to open read scope: {e}"))?
    } else {
        RequestContext::new(Arc::clone(&store), &config)
    };
    let ctx = ctx.with_base_url(base_url);

    let results = PerformerResolver::new(&ctx).resolve_many(&ids, &fields).await;
    let output: Vec<Value> = ids
        .iter()
        .zip(results)
        .map(|(id, outcome)| match outcome {
            Ok(Some(fields)) => fields.to_json(),
            Ok(None) => Value::Null,
            Err(err) => serde_json::json!({
                "data": null,
                "errors": [{ "performer": id.get(), "message": err.to_string() }],
            }),
        })
        .collect();

    let loaders = ctx.loaders();
    info!(
        performer_batches = loaders.performer_by_id.stats().batches,
        tag_batches = loaders.tag_by_id.stats().batches,
        scene_count_batches = loaders.scene_count_by_performer.stats().batches,
        queries = store.total_queries(),
        "done"
    );

    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| format!("failed to render output: {e}"))?;
    println!("{rendered}");
    Ok(())
}

fn parse_fields(names: &[String]) -> Result<Vec<PerformerField>, String> {
    if names.is_empty() {
        return Ok(PerformerField::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| name.trim().parse::<PerformerField>().map_err(|e| e.to_string()))
        .collect()
}
