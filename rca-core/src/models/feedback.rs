use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub record_id: i64,
    pub helpful: bool,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
