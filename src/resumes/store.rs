//! Resume persistence over the key-value store

use crate::error::Result;
use crate::kv::KvStore;

use super::types::{resume_key, ResumeRecord};

/// Store for resume records in the `resume:` keyspace
#[derive(Clone)]
pub struct ResumeStore {
    kv: KvStore,
}

impl ResumeStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub async fn save(&self, record: &ResumeRecord) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.kv.set(&resume_key(&record.id), &value).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<ResumeRecord>> {
        match self.kv.get(&resume_key(id)).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.kv.delete(&resume_key(id)).await
    }

    /// List all resume records in store (key) order.
    ///
    /// A record that fails to decode is logged and skipped so one corrupt
    /// entry cannot break the whole listing.
    pub async fn list(&self) -> Result<Vec<ResumeRecord>> {
        let items = self.kv.list("resume:*", true).await?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let Some(value) = item.value else {
                continue;
            };
            match serde_json::from_str::<ResumeRecord>(&value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(key = %item.key, "Skipping malformed resume record: {}", e);
                }
            }
        }

        Ok(records)
    }

    /// Attach feedback JSON to a record. Returns the updated record, or
    /// `None` when the id is unknown.
    pub async fn set_feedback(
        &self,
        id: &str,
        feedback: serde_json::Value,
    ) -> Result<Option<ResumeRecord>> {
        let Some(mut record) = self.get(id).await? else {
            return Ok(None);
        };

        record.feedback = Some(feedback);
        self.save(&record).await?;

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::initialize_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> ResumeStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_schema(&pool).await.unwrap();
        ResumeStore::new(KvStore::new(pool))
    }

    fn record(id: &str) -> ResumeRecord {
        let mut r = ResumeRecord::new(
            None,
            None,
            format!("resumes/{}/cv.pdf", id),
            format!("resumes/{}/cv.png", id),
        );
        r.id = id.to_string();
        r
    }

    #[tokio::test]
    async fn test_save_get_roundtrip() {
        let store = store().await;
        let r = record("one");

        store.save(&r).await.unwrap();
        assert_eq!(store.get("one").await.unwrap().unwrap(), r);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_returns_store_order() {
        let store = store().await;

        store.save(&record("b")).await.unwrap();
        store.save(&record("a")).await.unwrap();
        store.save(&record("c")).await.unwrap();

        let records = store.list().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let store = store().await;
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_malformed_records() {
        let store = store().await;

        store.save(&record("good")).await.unwrap();
        store.kv.set("resume:bad", "{ not json").await.unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "good");
    }

    #[tokio::test]
    async fn test_set_feedback() {
        let store = store().await;
        store.save(&record("one")).await.unwrap();

        let feedback = serde_json::json!({ "overallScore": 91, "ATS": { "score": 88 } });
        let updated = store
            .set_feedback("one", feedback.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.feedback, Some(feedback));
        assert_eq!(updated.overall_score(), Some(91));

        // Persisted, not just returned
        let reloaded = store.get("one").await.unwrap().unwrap();
        assert_eq!(reloaded.overall_score(), Some(91));

        assert!(store
            .set_feedback("missing", serde_json::json!({}))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        store.save(&record("one")).await.unwrap();

        assert!(store.delete("one").await.unwrap());
        assert!(!store.delete("one").await.unwrap());
        assert!(store.get("one").await.unwrap().is_none());
    }
}
