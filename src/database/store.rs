use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::application::{Application, ApplicationStatus, Stage};
use crate::models::assessment::Assessment;
use crate::models::audit_log::AuditLogEntry;
use crate::models::person::Person;

/// Outcome of an assessment insert. The uniqueness of
/// `external_submission_id` is enforced by the store itself, so a second
/// concurrent writer of the same submission gets `Duplicate` with the row
/// the first writer created.
#[derive(Debug, Clone)]
pub enum AssessmentInsert {
    Created(Assessment),
    Duplicate(Assessment),
}

/// Persistence boundary for the pipeline. Two implementations exist:
/// [`MemoryStore`](crate::database::memory::MemoryStore) for tests and
/// single-instance deployments, and
/// [`PgStore`](crate::database::postgres::PgStore) for production.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_person(&self, person: Person) -> Result<Person>;

    async fn get_person(&self, id: Uuid) -> Result<Option<Person>>;

    /// Denormalized roll-up of the first-stage screening result.
    async fn update_person_screening(
        &self,
        person_id: Uuid,
        score: f64,
        passed: bool,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn insert_application(&self, application: Application) -> Result<Application>;

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>>;

    async fn update_application_state(
        &self,
        id: Uuid,
        stage: Stage,
        status: ApplicationStatus,
    ) -> Result<Application>;

    /// Idempotency ledger lookup. Returning `Some` means the submission was
    /// already processed and the caller must perform no further side effects.
    async fn find_assessment_by_submission_id(
        &self,
        external_submission_id: &str,
    ) -> Result<Option<Assessment>>;

    async fn insert_assessment(&self, assessment: Assessment) -> Result<AssessmentInsert>;

    async fn insert_audit_entry(&self, entry: AuditLogEntry) -> Result<()>;

    async fn list_audit_entries(&self, application_id: Uuid) -> Result<Vec<AuditLogEntry>>;
}
