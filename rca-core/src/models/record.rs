use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::{DetectedError, LogAnalysis, Solution};
use super::feedback::Feedback;

/// A persisted analysis. Rows are written once and never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub raw_log: String,
    pub parsed_error: Vec<DetectedError>,
    pub suggestion: Vec<Solution>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    /// Latest feedback, if any has been left on this record
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

impl AnalysisRecord {
    pub fn analysis(&self) -> LogAnalysis {
        LogAnalysis {
            errors: self.parsed_error.clone(),
            possible_solutions: self.suggestion.clone(),
        }
    }
}

/// Insert payload; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub raw_log: String,
    pub analysis: LogAnalysis,
    pub model: String,
}
