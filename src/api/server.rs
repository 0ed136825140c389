// API server implementation using actix-web

use crate::api::auth::SessionKeys;
use crate::api::state::AppState;
use crate::api::{middleware, routes};
use crate::config::Settings;
use crate::content::ContentStore;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

pub struct ApiServer {
    pub settings: Settings,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            settings: Settings::from_env()?,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, store: Arc<dyn ContentStore>) -> Result<()> {
        let server = &self.settings.server;
        let bind_addr = server.bind_addr();

        tracing::info!(
            host = %server.host,
            port = %server.port,
            site = %server.public_base_url,
            "Starting portfolio media API server"
        );

        let state = web::Data::new(AppState::build(&self.settings, store)?);
        let keys = web::Data::new(SessionKeys::new(&self.settings.auth));

        let mut allowed_origins = server.allowed_origins.clone();
        if !allowed_origins.contains(&server.public_base_url) {
            allowed_origins.push(server.public_base_url.clone());
        }

        let throttle = state.throttle.clone();
        let window = Duration::from_secs(self.settings.throttle.window_secs.max(1));
        actix_web::rt::spawn(async move {
            let mut ticker = tokio::time::interval(window);
            loop {
                ticker.tick().await;
                throttle.purge_expired();
            }
        });

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(state.clone())
                .app_data(keys.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
