use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Candidate identity plus a denormalized roll-up of the first-stage
/// screening result, read by later stages to gate access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub general_competencies_completed: bool,
    pub general_competencies_score: Option<f64>,
    pub general_competencies_passed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            email: email.into(),
            phone: None,
            general_competencies_completed: false,
            general_competencies_score: None,
            general_competencies_passed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
