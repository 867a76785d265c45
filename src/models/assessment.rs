use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::application::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentType {
    GeneralCompetencies,
    SpecializedCompetencies,
}

impl AssessmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentType::GeneralCompetencies => "GENERAL_COMPETENCIES",
            AssessmentType::SpecializedCompetencies => "SPECIALIZED_COMPETENCIES",
        }
    }

    /// Stages an application may legitimately sit in when this assessment's
    /// webhook arrives. Each type also accepts the stage immediately before
    /// its own, to tolerate a submission racing the previous stage advance.
    pub fn accepted_stages(self) -> &'static [Stage] {
        match self {
            AssessmentType::GeneralCompetencies => {
                &[Stage::GeneralCompetencies, Stage::Application]
            }
            AssessmentType::SpecializedCompetencies => {
                &[Stage::SpecializedCompetencies, Stage::GeneralCompetencies]
            }
        }
    }

    /// Stage a passing result advances the application to.
    pub fn stage_on_pass(self) -> Stage {
        match self {
            AssessmentType::GeneralCompetencies => Stage::SpecializedCompetencies,
            AssessmentType::SpecializedCompetencies => Stage::Interview,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AssessmentType::GeneralCompetencies => "General competencies",
            AssessmentType::SpecializedCompetencies => "Specialized competencies",
        }
    }
}

impl std::str::FromStr for AssessmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERAL_COMPETENCIES" => Ok(AssessmentType::GeneralCompetencies),
            "SPECIALIZED_COMPETENCIES" => Ok(AssessmentType::SpecializedCompetencies),
            other => Err(format!("unknown assessment type: {}", other)),
        }
    }
}

/// One completed third-party assessment. Threshold and scale are copied from
/// the configuration snapshot at creation time and never recomputed, so past
/// pass/fail decisions stay explainable after policy changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub application_id: Uuid,
    pub assessment_type: AssessmentType,
    pub score: f64,
    pub threshold: f64,
    pub scale: f64,
    pub passed: bool,
    pub external_submission_id: String,
    pub raw_payload: JsonValue,
    pub completed_at: DateTime<Utc>,
}
