use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRow {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub activity_type: String,
    pub description: String,
    pub metadata: Value,
    pub created_by: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
