use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::store::{AssessmentInsert, Store};
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, Stage};
use crate::models::assessment::{Assessment, AssessmentType};
use crate::models::audit_log::{AuditActionType, AuditLogEntry};
use crate::models::person::Person;

/// Postgres-backed store. The unique index on
/// `assessments.external_submission_id` is the authoritative exactly-once
/// guard: a concurrent duplicate writer fails its insert with 23505 and is
/// handed the winner's row instead.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_enum<T>(raw: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse()
        .map_err(|e| Error::Internal(format!("corrupt {} column: {}", what, e)))
}

fn person_from_row(row: &PgRow) -> Result<Person> {
    Ok(Person {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        general_competencies_completed: row.try_get("general_competencies_completed")?,
        general_competencies_score: row.try_get("general_competencies_score")?,
        general_competencies_passed_at: row.try_get("general_competencies_passed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn application_from_row(row: &PgRow) -> Result<Application> {
    let stage: String = row.try_get("current_stage")?;
    let status: String = row.try_get("status")?;
    Ok(Application {
        id: row.try_get("id")?,
        person_id: row.try_get("person_id")?,
        position: row.try_get("position")?,
        current_stage: parse_enum::<Stage>(&stage, "current_stage")?,
        status: parse_enum::<ApplicationStatus>(&status, "status")?,
        resume_uploaded: row.try_get("resume_uploaded")?,
        cover_letter_uploaded: row.try_get("cover_letter_uploaded")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn assessment_from_row(row: &PgRow) -> Result<Assessment> {
    let assessment_type: String = row.try_get("assessment_type")?;
    Ok(Assessment {
        id: row.try_get("id")?,
        application_id: row.try_get("application_id")?,
        assessment_type: parse_enum::<AssessmentType>(&assessment_type, "assessment_type")?,
        score: row.try_get("score")?,
        threshold: row.try_get("threshold")?,
        scale: row.try_get("scale")?,
        passed: row.try_get("passed")?,
        external_submission_id: row.try_get("external_submission_id")?,
        raw_payload: row.try_get("raw_payload")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn audit_entry_from_row(row: &PgRow) -> Result<AuditLogEntry> {
    let action_type: String = row.try_get("action_type")?;
    Ok(AuditLogEntry {
        id: row.try_get("id")?,
        action: row.try_get("action")?,
        action_type: parse_enum::<AuditActionType>(&action_type, "action_type")?,
        person_id: row.try_get("person_id")?,
        application_id: row.try_get("application_id")?,
        actor_id: row.try_get("actor_id")?,
        before: row.try_get("before_value")?,
        after: row.try_get("after_value")?,
        rationale: row.try_get("rationale")?,
        created_at: row.try_get("created_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl Store for PgStore {
    async fn insert_person(&self, person: Person) -> Result<Person> {
        sqlx::query(
            r#"
            INSERT INTO persons (id, full_name, email, phone, general_competencies_completed,
                                 general_competencies_score, general_competencies_passed_at,
                                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(person.id)
        .bind(&person.full_name)
        .bind(&person.email)
        .bind(&person.phone)
        .bind(person.general_competencies_completed)
        .bind(person.general_competencies_score)
        .bind(person.general_competencies_passed_at)
        .bind(person.created_at)
        .bind(person.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(person)
    }

    async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
        let row = sqlx::query(r#"SELECT * FROM persons WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    async fn update_person_screening(
        &self,
        person_id: Uuid,
        score: f64,
        passed: bool,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE persons
            SET general_competencies_completed = TRUE,
                general_competencies_score = $1,
                general_competencies_passed_at = CASE WHEN $2 THEN $3 ELSE NULL END,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(score)
        .bind(passed)
        .bind(completed_at)
        .bind(person_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Person {} not found", person_id)));
        }
        Ok(())
    }

    async fn insert_application(&self, application: Application) -> Result<Application> {
        sqlx::query(
            r#"
            INSERT INTO applications (id, person_id, position, current_stage, status,
                                      resume_uploaded, cover_letter_uploaded, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(application.id)
        .bind(application.person_id)
        .bind(&application.position)
        .bind(application.current_stage.as_str())
        .bind(application.status.as_str())
        .bind(application.resume_uploaded)
        .bind(application.cover_letter_uploaded)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(application)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let row = sqlx::query(r#"SELECT * FROM applications WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn update_application_state(
        &self,
        id: Uuid,
        stage: Stage,
        status: ApplicationStatus,
    ) -> Result<Application> {
        let row = sqlx::query(
            r#"
            UPDATE applications
            SET current_stage = $1, status = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(stage.as_str())
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(ref row) => application_from_row(row),
            None => Err(Error::NotFound(format!("Application {} not found", id))),
        }
    }

    async fn find_assessment_by_submission_id(
        &self,
        external_submission_id: &str,
    ) -> Result<Option<Assessment>> {
        let row = sqlx::query(r#"SELECT * FROM assessments WHERE external_submission_id = $1"#)
            .bind(external_submission_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(assessment_from_row).transpose()
    }

    async fn insert_assessment(&self, assessment: Assessment) -> Result<AssessmentInsert> {
        let insert = sqlx::query(
            r#"
            INSERT INTO assessments (id, application_id, assessment_type, score, threshold,
                                     scale, passed, external_submission_id, raw_payload, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(assessment.id)
        .bind(assessment.application_id)
        .bind(assessment.assessment_type.as_str())
        .bind(assessment.score)
        .bind(assessment.threshold)
        .bind(assessment.scale)
        .bind(assessment.passed)
        .bind(&assessment.external_submission_id)
        .bind(&assessment.raw_payload)
        .bind(assessment.completed_at)
        .execute(&self.pool)
        .await;

        match insert {
            Ok(_) => Ok(AssessmentInsert::Created(assessment)),
            Err(err) if is_unique_violation(&err) => {
                // Lost the race to a concurrent duplicate delivery; hand the
                // caller the row the winner committed.
                let existing = self
                    .find_assessment_by_submission_id(&assessment.external_submission_id)
                    .await?
                    .ok_or_else(|| {
                        Error::Internal(
                            "duplicate submission insert failed but no existing row found"
                                .to_string(),
                        )
                    })?;
                Ok(AssessmentInsert::Duplicate(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_audit_entry(&self, entry: AuditLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, action, action_type, person_id, application_id,
                                   actor_id, before_value, after_value, rationale, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.action)
        .bind(entry.action_type.as_str())
        .bind(entry.person_id)
        .bind(entry.application_id)
        .bind(entry.actor_id)
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(&entry.rationale)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit_entries(&self, application_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"SELECT * FROM audit_log WHERE application_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(audit_entry_from_row).collect()
    }
}
