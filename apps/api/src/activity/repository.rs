//! Activity storage: trait-based so the server runs with or without Postgres.
//!
//! `AppState` holds an `Arc<dyn ActivityRepository>`, chosen at startup from
//! whether `DATABASE_URL` is configured.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::activity::ActivityRow;
use crate::notifications::ActivityEntry;

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn append(&self, entry: &ActivityEntry) -> Result<ActivityRow, AppError>;

    /// Most recent first.
    async fn list_recent(
        &self,
        limit: i64,
        activity_type: Option<&str>,
    ) -> Result<Vec<ActivityRow>, AppError>;
}

pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    async fn append(&self, entry: &ActivityEntry) -> Result<ActivityRow, AppError> {
        // Append-only: rows are never updated
        let row = sqlx::query_as::<_, ActivityRow>(
            r#"
            INSERT INTO activity_log (id, type, description, metadata, created_by, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.activity_type)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .bind(&entry.created_by)
        .bind(entry.timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_recent(
        &self,
        limit: i64,
        activity_type: Option<&str>,
    ) -> Result<Vec<ActivityRow>, AppError> {
        Ok(sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT * FROM activity_log
            WHERE ($1::text IS NULL OR type = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(activity_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Process-local activity store used when no database is configured.
#[derive(Default)]
pub struct InMemoryActivityRepository {
    rows: RwLock<Vec<ActivityRow>>,
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn append(&self, entry: &ActivityEntry) -> Result<ActivityRow, AppError> {
        let row = ActivityRow {
            id: Uuid::new_v4(),
            activity_type: entry.activity_type.clone(),
            description: entry.description.clone(),
            metadata: entry.metadata.clone(),
            created_by: entry.created_by.clone(),
            timestamp: entry.timestamp,
            created_at: Utc::now(),
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn list_recent(
        &self,
        limit: i64,
        activity_type: Option<&str>,
    ) -> Result<Vec<ActivityRow>, AppError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .rev()
            .filter(|row| activity_type.map_or(true, |t| row.activity_type == t))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(activity_type: &str, description: &str) -> ActivityEntry {
        ActivityEntry {
            activity_type: activity_type.to_string(),
            description: description.to_string(),
            metadata: json!({}),
            created_by: "tester".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_lists_newest_first() {
        let repo = InMemoryActivityRepository::new();
        repo.append(&entry("NOTIFICATION_SHOW", "first")).await.unwrap();
        repo.append(&entry("RESUME_UPDATE", "second")).await.unwrap();
        repo.append(&entry("NOTIFICATION_SHOW", "third")).await.unwrap();

        let all = repo.list_recent(10, None).await.unwrap();
        let descriptions: Vec<_> = all.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_in_memory_filters_and_limits() {
        let repo = InMemoryActivityRepository::new();
        for i in 0..5 {
            repo.append(&entry("NOTIFICATION_SHOW", &format!("n{i}"))).await.unwrap();
        }
        repo.append(&entry("LOGIN", "login")).await.unwrap();

        let shown = repo.list_recent(2, Some("NOTIFICATION_SHOW")).await.unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].description, "n4");
        assert!(repo.list_recent(10, Some("LOGOUT")).await.unwrap().is_empty());
    }
}
