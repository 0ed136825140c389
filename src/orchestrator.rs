//! Remote media migration: moves externally hosted project images into the
//! managed media store and rewrites each project's image list.
//!
//! Runs are strictly sequential (one record, then one image at a time) and
//! resumable: only records still holding external URLs are matched, so an
//! interrupted run picks up where it stopped.

use crate::config::MigrationConfig;
use crate::content::{ContentRecord, ContentStore};
use crate::error::{MigrationError, PipelineResult};
use crate::media::{
    is_external, proxy_url_for, public_id_for, Fetcher, RehostOptions, RehostSource,
    RehostedAsset, Rehoster,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome for one image reference in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub original_url: String,
    /// Equals `original_url` for skipped and failed images.
    pub new_url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationResult {
    fn unchanged(url: &str) -> Self {
        Self {
            original_url: url.to_string(),
            new_url: url.to_string(),
            success: true,
            error: None,
        }
    }

    fn migrated(url: &str, new_url: String) -> Self {
        Self {
            original_url: url.to_string(),
            new_url,
            success: true,
            error: None,
        }
    }

    fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            original_url: url.to_string(),
            new_url: url.to_string(),
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn is_migration(&self) -> bool {
        self.success && self.new_url != self.original_url
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReport {
    pub project_title: String,
    pub project_id: String,
    pub images: Vec<MigrationResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub projects_processed: usize,
    pub total_images: usize,
    pub successful_migrations: usize,
    pub failed_migrations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub summary: MigrationSummary,
    pub results: Vec<RecordReport>,
}

impl BatchReport {
    fn from_records(results: Vec<RecordReport>) -> Self {
        let summary = MigrationSummary {
            projects_processed: results.len(),
            total_images: results.iter().map(|r| r.images.len()).sum(),
            successful_migrations: results
                .iter()
                .flat_map(|r| &r.images)
                .filter(|i| i.is_migration())
                .count(),
            failed_migrations: results
                .iter()
                .flat_map(|r| &r.images)
                .filter(|i| !i.success)
                .count(),
        };
        Self { summary, results }
    }

    /// One-line human readable result.
    pub fn message(&self) -> String {
        if self.results.is_empty() {
            return "No projects with external images found".to_string();
        }
        format!(
            "Migration completed! {} images migrated to the media store, {} failed",
            self.summary.successful_migrations, self.summary.failed_migrations
        )
    }
}

/// Result of an on-demand single image migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LazyOutcome {
    Migrated {
        original_url: String,
        new_url: String,
    },
    /// Migration did not happen; `proxy_url` renders the image meanwhile.
    Fallback {
        original_url: String,
        proxy_url: String,
        reason: String,
    },
}

pub struct Migrator {
    store: Arc<dyn ContentStore>,
    fetcher: Arc<dyn Fetcher>,
    rehoster: Arc<dyn Rehoster>,
    config: MigrationConfig,
    rehost_options: RehostOptions,
}

impl Migrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<dyn Fetcher>,
        rehoster: Arc<dyn Rehoster>,
        config: MigrationConfig,
        rehost_options: RehostOptions,
    ) -> Self {
        Self {
            store,
            fetcher,
            rehoster,
            config,
            rehost_options,
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn is_external(&self, url: &str) -> bool {
        is_external(url, &self.config.cdn_markers)
    }

    pub fn proxy_url(&self, url: &str) -> String {
        proxy_url_for(&self.config.proxy_path, url)
    }

    /// Migrate every record that still references an external CDN.
    ///
    /// Per-image failures are recorded, never raised; only the initial store
    /// query can fail the whole run.
    #[instrument(skip(self))]
    pub async fn run_batch(&self) -> PipelineResult<BatchReport> {
        let records = self
            .store
            .find_with_external_images(&self.config.cdn_markers)
            .await?;
        info!(records = records.len(), "media migration run starting");

        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            results.push(self.migrate_record(record).await);
        }

        let report = BatchReport::from_records(results);
        info!(
            projects = report.summary.projects_processed,
            images = report.summary.total_images,
            migrated = report.summary.successful_migrations,
            failed = report.summary.failed_migrations,
            "media migration run finished"
        );
        Ok(report)
    }

    /// Process one record's images in order and persist the rewritten list once.
    #[instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn migrate_record(&self, record: &ContentRecord) -> RecordReport {
        let mut images = Vec::with_capacity(record.images.len());
        for (index, url) in record.images.iter().enumerate() {
            if !self.is_external(url) {
                images.push(MigrationResult::unchanged(url));
                continue;
            }
            let public_id = public_id_for(record, index);
            match self.migrate_image(url, &public_id).await {
                Ok(asset) => images.push(MigrationResult::migrated(url, asset.secure_url)),
                Err(e) => {
                    warn!(%url, %public_id, error = %e, "image migration failed");
                    images.push(MigrationResult::failed(url, e.to_string()));
                }
            }
        }

        if !images.is_empty() {
            let new_list: Vec<String> = images.iter().map(|r| r.new_url.clone()).collect();
            if let Err(e) = self.store.replace_images(&record.id, &new_list).await {
                warn!(error = %e, "failed to persist migrated image list");
                let reason = format!("Failed to save project: {e}");
                for result in images.iter_mut().filter(|r| r.is_migration()) {
                    *result = MigrationResult::failed(&result.original_url, reason.clone());
                }
            }
        }

        RecordReport {
            project_title: record.title.clone(),
            project_id: record.id.clone(),
            images,
        }
    }

    /// Migrate one image of one record on demand.
    ///
    /// Lookup problems are errors; fetch, upload and save failures become a
    /// [`LazyOutcome::Fallback`] carrying a proxy URL.
    #[instrument(skip(self))]
    pub async fn lazy_migrate(
        &self,
        image_url: &str,
        record_id: &str,
    ) -> PipelineResult<LazyOutcome> {
        if !self.is_external(image_url) {
            return Err(MigrationError::NotExternal(image_url.to_string()));
        }
        let record = self
            .store
            .get(record_id)
            .await?
            .ok_or_else(|| MigrationError::RecordNotFound(record_id.to_string()))?;
        let index = record
            .images
            .iter()
            .position(|u| u == image_url)
            .ok_or_else(|| MigrationError::ReferenceNotFound {
                record_id: record_id.to_string(),
                url: image_url.to_string(),
            })?;

        let public_id = public_id_for(&record, index);
        let attempt = match self.migrate_image(image_url, &public_id).await {
            Ok(asset) => {
                let mut images = record.images.clone();
                images[index] = asset.secure_url.clone();
                self.store
                    .replace_images(&record.id, &images)
                    .await
                    .map(|_| asset.secure_url)
            }
            Err(e) => Err(e),
        };

        Ok(match attempt {
            Ok(new_url) => {
                info!(%new_url, "lazy migration ok");
                LazyOutcome::Migrated {
                    original_url: image_url.to_string(),
                    new_url,
                }
            }
            Err(e) => {
                warn!(error = %e, "lazy migration failed; falling back to proxy");
                LazyOutcome::Fallback {
                    original_url: image_url.to_string(),
                    proxy_url: self.proxy_url(image_url),
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Pre-flight fetch, then upload the fetched bytes under `public_id`.
    async fn migrate_image(&self, url: &str, public_id: &str) -> PipelineResult<RehostedAsset> {
        let fetched = self.fetcher.fetch(url).await?;
        let content_type = fetched.content_type.clone();
        let data = fetched.into_bytes().await?;
        self.rehoster
            .rehost(
                RehostSource::Bytes { data, content_type },
                Some(public_id),
                &self.rehost_options,
            )
            .await
    }
}
