use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditActionType {
    StageChange,
    StatusChange,
    AssessmentRecorded,
    EmailSent,
}

impl AuditActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditActionType::StageChange => "STAGE_CHANGE",
            AuditActionType::StatusChange => "STATUS_CHANGE",
            AuditActionType::AssessmentRecorded => "ASSESSMENT_RECORDED",
            AuditActionType::EmailSent => "EMAIL_SENT",
        }
    }
}

impl std::str::FromStr for AuditActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STAGE_CHANGE" => Ok(AuditActionType::StageChange),
            "STATUS_CHANGE" => Ok(AuditActionType::StatusChange),
            "ASSESSMENT_RECORDED" => Ok(AuditActionType::AssessmentRecorded),
            "EMAIL_SENT" => Ok(AuditActionType::EmailSent),
            other => Err(format!("unknown audit action type: {}", other)),
        }
    }
}

/// Append-only history row. Never updated or deleted after insertion.
/// `actor_id = None` marks a change made by the system itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub action_type: AuditActionType,
    pub person_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
    pub rationale: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn system(action: impl Into<String>, action_type: AuditActionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            action_type,
            person_id: None,
            application_id: None,
            actor_id: None,
            before: None,
            after: None,
            rationale: None,
            created_at: Utc::now(),
        }
    }
}
