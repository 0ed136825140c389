//! Project records and the stores that hold them.
//!
//! The migration pipeline only ever reads a record's image list and replaces
//! it wholesale; everything else on a project belongs to the admin panel.

use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};

mod memory;
mod postgres;

pub use memory::MemoryContentStore;
pub use postgres::PgContentStore;

/// A persisted project as seen by the migration pipeline.
///
/// Alternate key spellings found in exported documents are folded into the
/// canonical fields here, once, at deserialization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, alias = "Images", alias = "imageUrls")]
    pub images: Vec<String>,
}

impl ContentRecord {
    /// Identifier used to derive media store ids; prefers the slug.
    pub fn media_key(&self) -> &str {
        match self.slug.as_deref() {
            Some(slug) if !slug.trim().is_empty() => slug,
            _ => &self.id,
        }
    }
}

#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Records holding at least one image URL that contains any of `markers`,
    /// filtered by the store rather than in memory.
    async fn find_with_external_images(
        &self,
        markers: &[String],
    ) -> PipelineResult<Vec<ContentRecord>>;

    async fn get(&self, id: &str) -> PipelineResult<Option<ContentRecord>>;

    /// Overwrite the record's image list. Fails with `RecordNotFound` when
    /// the record no longer exists.
    async fn replace_images(&self, id: &str, images: &[String]) -> PipelineResult<()>;

    async fn ping(&self) -> PipelineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_keys_are_normalized() {
        let raw = r#"{"_id":"p1","name":"Oak bench","imageUrls":["https://a/b.jpg"]}"#;
        let record: ContentRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id, "p1");
        assert_eq!(record.title, "Oak bench");
        assert_eq!(record.images, vec!["https://a/b.jpg".to_string()]);
        assert_eq!(record.slug, None);
    }

    #[test]
    fn media_key_prefers_slug() {
        let mut record = ContentRecord {
            id: "64f0c2".into(),
            title: "Walnut table".into(),
            slug: Some("walnut-table-x1y2".into()),
            images: vec![],
        };
        assert_eq!(record.media_key(), "walnut-table-x1y2");
        record.slug = Some("  ".into());
        assert_eq!(record.media_key(), "64f0c2");
    }
}
