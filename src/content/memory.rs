use super::{ContentRecord, ContentStore};
use crate::error::{MigrationError, PipelineResult};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::sync::RwLock;

/// In-process store, used for dry runs from a JSON export and in tests.
/// Preserves insertion order.
#[derive(Default)]
pub struct MemoryContentStore {
    records: RwLock<Vec<ContentRecord>>,
}

impl MemoryContentStore {
    pub fn new(records: Vec<ContentRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load a JSON array of project documents.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        let records: Vec<ContentRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid project JSON in {}", path.display()))?;
        Ok(Self::new(records))
    }

    pub async fn snapshot(&self) -> Vec<ContentRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn find_with_external_images(
        &self,
        markers: &[String],
    ) -> PipelineResult<Vec<ContentRecord>> {
        let markers: Vec<String> = markers.iter().map(|m| m.to_ascii_lowercase()).collect();
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| {
                r.images.iter().any(|url| {
                    let lc = url.to_ascii_lowercase();
                    markers.iter().any(|m| lc.contains(m.as_str()))
                })
            })
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> PipelineResult<Option<ContentRecord>> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn replace_images(&self, id: &str, images: &[String]) -> PipelineResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MigrationError::RecordNotFound(id.to_string()))?;
        record.images = images.to_vec();
        Ok(())
    }

    async fn ping(&self) -> PipelineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, images: &[&str]) -> ContentRecord {
        ContentRecord {
            id: id.into(),
            title: format!("Project {id}"),
            slug: None,
            images: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn filter_is_case_insensitive_and_skips_clean_records() {
        let store = MemoryContentStore::new(vec![
            record("p1", &["https://SCONTENT.CDNINSTAGRAM.COM/a.jpg"]),
            record("p2", &["https://images.unsplash.com/b.jpg"]),
            record("p3", &[]),
        ]);
        let markers = vec!["cdninstagram.com".to_string()];
        let found = store.find_with_external_images(&markers).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p1");
    }

    #[tokio::test]
    async fn replace_images_on_missing_record_fails() {
        let store = MemoryContentStore::default();
        let err = store
            .replace_images("nope", &["https://x/y.jpg".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::RecordNotFound(id) if id == "nope"));
    }

    #[test]
    fn seed_file_is_normalized() {
        let dir = std::env::temp_dir().join(format!("seed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("projects.json");
        std::fs::write(
            &path,
            r#"[{"_id":"p1","title":"Cedar chest","slug":"cedar-chest","Images":["https://cdninstagram.com/a.jpg"]}]"#,
        )
        .unwrap();
        let store = MemoryContentStore::from_json_file(&path).unwrap();
        let records = store.records.try_read().unwrap();
        assert_eq!(records[0].images.len(), 1);
        assert_eq!(records[0].slug.as_deref(), Some("cedar-chest"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
