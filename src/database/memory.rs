use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::store::{AssessmentInsert, Store};
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, Stage};
use crate::models::assessment::Assessment;
use crate::models::audit_log::AuditLogEntry;
use crate::models::person::Person;

#[derive(Default)]
struct Inner {
    persons: HashMap<Uuid, Person>,
    applications: HashMap<Uuid, Application>,
    // Keyed by external submission id: the in-process uniqueness guard.
    assessments: HashMap<String, Assessment>,
    audit_log: Vec<AuditLogEntry>,
}

/// In-process store. Correct for a single serving instance only; production
/// multi-instance deployments use [`PgStore`](crate::database::postgres::PgStore).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_person(&self, person: Person) -> Result<Person> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        inner.persons.insert(person.id, person.clone());
        Ok(person)
    }

    async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner.persons.get(&id).cloned())
    }

    async fn update_person_screening(
        &self,
        person_id: Uuid,
        score: f64,
        passed: bool,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        let person = inner
            .persons
            .get_mut(&person_id)
            .ok_or_else(|| Error::NotFound(format!("Person {} not found", person_id)))?;
        person.general_competencies_completed = true;
        person.general_competencies_score = Some(score);
        person.general_competencies_passed_at = passed.then_some(completed_at);
        person.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_application(&self, application: Application) -> Result<Application> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        inner
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner.applications.get(&id).cloned())
    }

    async fn update_application_state(
        &self,
        id: Uuid,
        stage: Stage,
        status: ApplicationStatus,
    ) -> Result<Application> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        let application = inner
            .applications
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))?;
        application.current_stage = stage;
        application.status = status;
        application.updated_at = Utc::now();
        Ok(application.clone())
    }

    async fn find_assessment_by_submission_id(
        &self,
        external_submission_id: &str,
    ) -> Result<Option<Assessment>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner.assessments.get(external_submission_id).cloned())
    }

    async fn insert_assessment(&self, assessment: Assessment) -> Result<AssessmentInsert> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        if let Some(existing) = inner.assessments.get(&assessment.external_submission_id) {
            return Ok(AssessmentInsert::Duplicate(existing.clone()));
        }
        inner.assessments.insert(
            assessment.external_submission_id.clone(),
            assessment.clone(),
        );
        Ok(AssessmentInsert::Created(assessment))
    }

    async fn insert_audit_entry(&self, entry: AuditLogEntry) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        inner.audit_log.push(entry);
        Ok(())
    }

    async fn list_audit_entries(&self, application_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner
            .audit_log
            .iter()
            .filter(|e| e.application_id == Some(application_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_assessment(submission_id: &str) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            assessment_type: crate::models::assessment::AssessmentType::GeneralCompetencies,
            score: 75.0,
            threshold: 60.0,
            scale: 100.0,
            passed: true,
            external_submission_id: submission_id.to_string(),
            raw_payload: json!({}),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_submission_id_returns_first_row() {
        let store = MemoryStore::new();
        let first = sample_assessment("sub-1");
        let second = sample_assessment("sub-1");

        let created = store.insert_assessment(first.clone()).await.unwrap();
        assert!(matches!(created, AssessmentInsert::Created(_)));

        match store.insert_assessment(second).await.unwrap() {
            AssessmentInsert::Duplicate(existing) => assert_eq!(existing.id, first.id),
            AssessmentInsert::Created(_) => panic!("second insert must not create a row"),
        }
    }

    #[tokio::test]
    async fn screening_rollup_updates_person() {
        let store = MemoryStore::new();
        let person = store
            .insert_person(Person::new("Alice", "alice@example.com"))
            .await
            .unwrap();

        let completed_at = Utc::now();
        store
            .update_person_screening(person.id, 81.0, true, completed_at)
            .await
            .unwrap();

        let stored = store.get_person(person.id).await.unwrap().unwrap();
        assert!(stored.general_competencies_completed);
        assert_eq!(stored.general_competencies_score, Some(81.0));
        assert_eq!(stored.general_competencies_passed_at, Some(completed_at));
    }
}
