use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imprint_catalog_client::CatalogClient;
use imprint_sync::jobs::{self, ClassifyUntaggedJob};
use imprint_sync::reads::releases_by_label;
use imprint_sync::store::postgres;
use imprint_sync::store::{PgCatalogStore, PgLabelStore};
use imprint_sync::sync::LabelImportReport;
use imprint_sync::{CatalogImporter, ClassificationEngine, LabelCache, LabelMatcher, SyncConfig};
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "imprint-sync", about = "Sync label catalogs and classify tracks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every release of one label
    Import {
        label_id: Uuid,
    },
    /// Import all labels one after another
    ImportAll,
    /// Classify tracks that have no taxonomy yet
    Classify {
        /// Tracks to classify (defaults to SYNC_CLASSIFY_BATCH)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List a label's releases, showing which read path served them
    Releases {
        label_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imprint_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = SyncConfig::from_env().context("Failed to load configuration")?;

    tracing::info!(
        environment = %config.common.environment,
        database = %config.common.database.redacted_url(),
        "Starting Imprint sync"
    );

    let pool = postgres::connect(&config.common.database)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Command::Import { label_id } => {
            let importer = build_importer(&config, &pool)?;
            let summary = importer.run(label_id).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::ImportAll => {
            let importer = build_importer(&config, &pool)?;
            let outcomes = importer.import_all().await?;
            let reports: Vec<LabelImportReport> =
                outcomes.iter().map(LabelImportReport::from).collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Command::Classify { limit } => {
            let engine = ClassificationEngine::new(config.classification()?)?;
            let job = ClassifyUntaggedJob {
                batch_size: limit.unwrap_or(config.classify_batch_size),
            };
            let store = PgCatalogStore::new(pool.clone());
            let report = jobs::classify_untagged::execute(&store, &engine, &job).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Releases { label_id } => {
            let fetched = releases_by_label(&pool).fetch_list(&label_id).await?;
            tracing::info!(
                label_id = %label_id,
                source = %fetched.meta.source,
                count = fetched.data.len(),
                "Releases read"
            );
            println!("{}", serde_json::to_string_pretty(&fetched)?);
        }
    }

    Ok(())
}

fn build_importer(config: &SyncConfig, pool: &PgPool) -> Result<CatalogImporter> {
    let catalog = CatalogClient::from_config(config.catalog()?)
        .context("Failed to create catalog client")?;
    let labels = LabelCache::new(
        Arc::new(PgLabelStore::new(pool.clone())),
        config.label_cache_ttl(),
    );
    let matcher = LabelMatcher::new(config.aliases()?);

    Ok(CatalogImporter::new(
        Arc::new(catalog),
        Arc::new(PgCatalogStore::new(pool.clone())),
        labels,
        matcher,
    )
    .with_options(config.import_options()))
}
