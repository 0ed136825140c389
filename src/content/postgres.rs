use super::{ContentRecord, ContentStore};
use crate::error::{MigrationError, PipelineResult};
use crate::util::db::Db;

/// `projects` table backed store.
#[derive(Clone)]
pub struct PgContentStore {
    db: Db,
}

impl PgContentStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

/// Turn CDN markers into `ILIKE` patterns, escaping the pattern metacharacters.
fn ilike_patterns(markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .map(|m| {
            let escaped = m
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
        .collect()
}

#[async_trait::async_trait]
impl ContentStore for PgContentStore {
    async fn find_with_external_images(
        &self,
        markers: &[String],
    ) -> PipelineResult<Vec<ContentRecord>> {
        if markers.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ContentRecord>(
            "SELECT id, title, slug, images FROM projects \
             WHERE EXISTS (SELECT 1 FROM unnest(images) AS img WHERE img ILIKE ANY($1)) \
             ORDER BY created_at DESC",
        )
        .persistent(false)
        .bind(ilike_patterns(markers))
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: &str) -> PipelineResult<Option<ContentRecord>> {
        let row = sqlx::query_as::<_, ContentRecord>(
            "SELECT id, title, slug, images FROM projects WHERE id = $1",
        )
        .persistent(false)
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row)
    }

    async fn replace_images(&self, id: &str, images: &[String]) -> PipelineResult<()> {
        let done = sqlx::query("UPDATE projects SET images = $2, updated_at = now() WHERE id = $1")
            .persistent(false)
            .bind(id)
            .bind(images)
            .execute(&self.db.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(MigrationError::RecordNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> PipelineResult<()> {
        sqlx::query_scalar::<_, bool>("SELECT true")
            .persistent(false)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_wrap_and_escape_markers() {
        let markers = vec!["cdninstagram.com".to_string(), "odd_host%".to_string()];
        assert_eq!(
            ilike_patterns(&markers),
            vec![
                "%cdninstagram.com%".to_string(),
                "%odd\\_host\\%%".to_string()
            ]
        );
    }
}
