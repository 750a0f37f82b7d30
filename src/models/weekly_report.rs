use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub week_of: NaiveDate,
    pub file_url: String,
    pub file_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// The id is chosen before upload so the file lands under the report's own prefix.
#[derive(Debug, Clone)]
pub struct NewWeeklyReport {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub week_of: NaiveDate,
    pub file_url: String,
    pub file_name: String,
    pub created_by: String,
}
