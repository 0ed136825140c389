// HTTP API server binary for the portfolio media pipeline

use anyhow::Result;
use portfolio_media::api::ApiServer;
use portfolio_media::content::PgContentStore;
use portfolio_media::telemetry::init_tracing;
use portfolio_media::util::db::Db;
use portfolio_media::util::env as env_util;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<()> {
    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();
    init_tracing("info,sqlx=warn,actix_web=info")?;

    tracing::info!("Initializing portfolio media API server");

    // Load configuration from environment
    let server = ApiServer::from_env()?;

    let database_url = env_util::db_url()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_connections).await?;

    tracing::info!("Database connected successfully");

    server.run(Arc::new(PgContentStore::new(db))).await?;

    Ok(())
}
