use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use portfolio_media::api::auth::{SessionClaims, SessionKeys};
use portfolio_media::api::handlers::store_check_report;
use portfolio_media::api::models::{BatchMigrationResponse, LazyMigrateResponse};
use portfolio_media::api::AppState;
use portfolio_media::config::{AuthConfig, Settings};
use portfolio_media::content::{ContentStore, MemoryContentStore, PgContentStore};
use portfolio_media::telemetry::init_tracing;
use portfolio_media::util::db::Db;
use portfolio_media::util::env as env_util;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "portfolio-media", version, about = "Portfolio media migration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Move every external CDN image into the media store
    Migrate {
        /// Run against a JSON array of projects instead of the database
        #[arg(long)]
        seed_file: Option<PathBuf>,
        /// With --seed-file, write the rewritten projects here
        #[arg(long, requires = "seed_file")]
        out: Option<PathBuf>,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Migrate one image of one project, printing the migrated or fallback result
    Lazy {
        #[arg(long)]
        image_url: String,
        #[arg(long)]
        record_id: String,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Upload a test image to verify media store credentials
    CheckStore,
    /// Sign a session token for calling the admin endpoints
    MintToken {
        #[arg(long)]
        sub: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "admin")]
        role: String,
        /// Lifetime in days
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

async fn pg_store(db_url: Option<String>) -> Result<Arc<dyn ContentStore>> {
    let url = match db_url {
        Some(url) => url,
        None => env_util::db_url()?,
    };
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 5u32);
    let db = Db::connect(&url, max_connections).await?;
    Ok(Arc::new(PgContentStore::new(db)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,sqlx=warn")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            seed_file,
            out,
            db_url,
        } => {
            let settings = Settings::from_env()?;
            let (store, memory) = match seed_file {
                Some(path) => {
                    let memory = Arc::new(MemoryContentStore::from_json_file(&path)?);
                    info!(path = %path.display(), "migrating seed file");
                    (memory.clone() as Arc<dyn ContentStore>, Some(memory))
                }
                None => (pg_store(db_url).await?, None),
            };
            let state = AppState::build(&settings, store)?;
            let report = state.migrator.run_batch().await?;
            info!(
                projects = report.summary.projects_processed,
                migrated = report.summary.successful_migrations,
                failed = report.summary.failed_migrations,
                "{}",
                report.message()
            );
            if let (Some(memory), Some(out)) = (memory, out) {
                let records = memory.snapshot().await;
                let json = serde_json::to_string_pretty(&records)?;
                std::fs::write(&out, json)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                info!(path = %out.display(), records = records.len(), "wrote rewritten projects");
            }
            print_json(&BatchMigrationResponse::from(report))?;
        }
        Commands::Lazy {
            image_url,
            record_id,
            db_url,
        } => {
            let settings = Settings::from_env()?;
            let state = AppState::build(&settings, pg_store(db_url).await?)?;
            let outcome = state
                .migrator
                .lazy_migrate(image_url.trim(), record_id.trim())
                .await?;
            print_json(&LazyMigrateResponse::from(outcome))?;
        }
        Commands::CheckStore => {
            let settings = Settings::from_env()?;
            let state = AppState::build(&settings, Arc::new(MemoryContentStore::default()))?;
            let report = store_check_report(&state).await;
            print_json(&report)?;
            if !report.success {
                bail!("media store check failed");
            }
        }
        Commands::MintToken {
            sub,
            email,
            username,
            role,
            days,
        } => {
            if days <= 0 {
                bail!("--days must be positive");
            }
            let keys = SessionKeys::new(&AuthConfig::from_env());
            let claims =
                SessionClaims::new(sub, email, username, role, chrono::Duration::days(days));
            println!("{}", keys.issue(&claims)?);
            eprintln!(
                "send as cookie `{}` or `Authorization: Bearer <token>`",
                keys.cookie_name()
            );
        }
    }

    Ok(())
}
