use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of a candidate in the fixed hiring sequence. Forward-only:
/// transitions may only move to a later variant, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Application,
    GeneralCompetencies,
    SpecializedCompetencies,
    Interview,
    Agreement,
    Signed,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Application => Some(Stage::GeneralCompetencies),
            Stage::GeneralCompetencies => Some(Stage::SpecializedCompetencies),
            Stage::SpecializedCompetencies => Some(Stage::Interview),
            Stage::Interview => Some(Stage::Agreement),
            Stage::Agreement => Some(Stage::Signed),
            Stage::Signed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Application => "APPLICATION",
            Stage::GeneralCompetencies => "GENERAL_COMPETENCIES",
            Stage::SpecializedCompetencies => "SPECIALIZED_COMPETENCIES",
            Stage::Interview => "INTERVIEW",
            Stage::Agreement => "AGREEMENT",
            Stage::Signed => "SIGNED",
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPLICATION" => Ok(Stage::Application),
            "GENERAL_COMPETENCIES" => Ok(Stage::GeneralCompetencies),
            "SPECIALIZED_COMPETENCIES" => Ok(Stage::SpecializedCompetencies),
            "INTERVIEW" => Ok(Stage::Interview),
            "AGREEMENT" => Ok(Stage::Agreement),
            "SIGNED" => Ok(Stage::Signed),
            other => Err(format!("unknown stage: {}", other)),
        }
    }
}

/// Liveness of an application, orthogonal to the stage axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Active,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Active => "ACTIVE",
            ApplicationStatus::Accepted => "ACCEPTED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ApplicationStatus::Active),
            "ACCEPTED" => Ok(ApplicationStatus::Accepted),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            "WITHDRAWN" => Ok(ApplicationStatus::Withdrawn),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub person_id: Uuid,
    pub position: String,
    pub current_stage: Stage,
    pub status: ApplicationStatus,
    pub resume_uploaded: bool,
    pub cover_letter_uploaded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(person_id: Uuid, position: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            person_id,
            position: position.into(),
            current_stage: Stage::Application,
            status: ApplicationStatus::Active,
            resume_uploaded: false,
            cover_letter_uploaded: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_sequence_is_fixed_and_forward_only() {
        let mut stage = Stage::Application;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage, "next stage must come later in the sequence");
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(stage, Stage::Signed);
        assert_eq!(Stage::Signed.next(), None);
    }

    #[test]
    fn stage_codes_round_trip() {
        for stage in [
            Stage::Application,
            Stage::GeneralCompetencies,
            Stage::SpecializedCompetencies,
            Stage::Interview,
            Stage::Agreement,
            Stage::Signed,
        ] {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
    }
}
