// Shared application state handed to every handler

use crate::config::{MediaStoreConfig, Settings};
use crate::content::ContentStore;
use crate::media::{CloudinaryRehoster, Fetcher, HttpFetcher, RehostOptions, Rehoster};
use crate::orchestrator::Migrator;
use crate::throttle::{ClientRateLimiter, RequestCounter};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub migrator: Migrator,
    pub fetcher: Arc<dyn Fetcher>,
    pub rehoster: Arc<dyn Rehoster>,
    pub media_store: MediaStoreConfig,
    pub throttle: Arc<dyn RequestCounter>,
    /// Throttle on forwarded client addresses rather than the socket peer.
    pub trust_forwarded: bool,
}

impl AppState {
    /// Wire the production collaborators around `store`.
    pub fn build(settings: &Settings, store: Arc<dyn ContentStore>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&settings.fetch)?);
        let rehoster: Arc<dyn Rehoster> =
            Arc::new(CloudinaryRehoster::new(settings.media_store.clone())?);
        let throttle: Arc<dyn RequestCounter> = Arc::new(ClientRateLimiter::new(
            settings.throttle.max_requests,
            Duration::from_secs(settings.throttle.window_secs),
        ));
        let mut state = Self::with_parts(
            store,
            fetcher,
            rehoster,
            throttle,
            settings.media_store.clone(),
            settings.migration.clone(),
        );
        state.trust_forwarded = settings.throttle.trust_forwarded;
        Ok(state)
    }

    pub fn with_parts(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<dyn Fetcher>,
        rehoster: Arc<dyn Rehoster>,
        throttle: Arc<dyn RequestCounter>,
        media_store: MediaStoreConfig,
        migration: crate::config::MigrationConfig,
    ) -> Self {
        let migrator = Migrator::new(
            store,
            fetcher.clone(),
            rehoster.clone(),
            migration,
            RehostOptions::for_migration(&media_store),
        );
        Self {
            migrator,
            fetcher,
            rehoster,
            media_store,
            throttle,
            trust_forwarded: false,
        }
    }
}
