use std::sync::{Arc, Mutex};

use serde_json::json;
use uuid::Uuid;

use hiring_pipeline::{
    config::ThresholdConfig,
    database::{memory::MemoryStore, store::Store},
    dto::webhook_dto::SubmissionData,
    error::Error,
    models::application::{Application, ApplicationStatus, Stage},
    models::assessment::AssessmentType,
    models::audit_log::AuditActionType,
    models::email_queue::{EmailPriority, QueuedEmail},
    models::person::Person,
    services::audit_service::AuditService,
    services::email_transport::EmailTransport,
    services::notification_service::{DispatchLimits, NotificationService},
    services::pipeline_service::{PipelineService, PipelineThresholds},
};

#[derive(Clone, Default)]
struct NullTransport {
    sent: Arc<Mutex<Vec<QueuedEmail>>>,
}

#[async_trait::async_trait]
impl EmailTransport for NullTransport {
    async fn send(&self, email: &QueuedEmail) -> hiring_pipeline::error::Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    pipeline: PipelineService,
    notifications: NotificationService,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let audit = AuditService::new(store.clone() as Arc<dyn Store>);
    let notifications = NotificationService::new(
        audit.clone(),
        Arc::new(NullTransport::default()),
        None,
        DispatchLimits {
            hourly_cap: 100,
            daily_cap: 100,
            max_attempts: 3,
            retry_delay_secs: 0,
        },
    );
    let pipeline = PipelineService::new(
        store.clone() as Arc<dyn Store>,
        audit,
        notifications.clone(),
        PipelineThresholds {
            general: ThresholdConfig {
                threshold: 60.0,
                scale: 100.0,
            },
            specialized: ThresholdConfig {
                threshold: 70.0,
                scale: 100.0,
            },
        },
    );
    Harness {
        store,
        pipeline,
        notifications,
    }
}

async fn seed(store: &MemoryStore, stage: Stage) -> Application {
    let person = store
        .insert_person(Person::new("Bea Candidate", "bea@example.com"))
        .await
        .unwrap();
    let mut application = Application::new(person.id, "Data Engineer");
    application.current_stage = stage;
    store.insert_application(application).await.unwrap()
}

fn submission(submission_id: &str, application_id: Uuid, score: f64) -> SubmissionData {
    serde_json::from_value(json!({
        "submissionId": submission_id,
        "formId": "form-1",
        "formName": "Assessment",
        "fields": [
            { "key": "application_id", "value": application_id.to_string() },
            { "key": "score", "value": score },
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn application_progresses_monotonically_through_both_assessments() {
    let h = harness();
    let application = seed(&h.store, Stage::GeneralCompetencies).await;

    let general = h
        .pipeline
        .process_submission(
            AssessmentType::GeneralCompetencies,
            &submission("sub-g", application.id, 65.0),
        )
        .await
        .unwrap();
    assert_eq!(general.stage, Stage::SpecializedCompetencies);
    assert_eq!(general.status, ApplicationStatus::Active);
    assert!(general.passed);

    let specialized = h
        .pipeline
        .process_submission(
            AssessmentType::SpecializedCompetencies,
            &submission("sub-s", application.id, 82.0),
        )
        .await
        .unwrap();
    assert_eq!(specialized.stage, Stage::Interview);
    assert!(specialized.stage > general.stage);

    // One audit entry per committed transition, in order.
    let audit = h.store.list_audit_entries(application.id).await.unwrap();
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].action, "general_competencies_passed");
    assert_eq!(audit[0].action_type, AuditActionType::StageChange);
    assert_eq!(audit[1].action, "specialized_competencies_passed");

    // Entries carry the full before/after snapshots.
    assert_eq!(
        audit[1].before.as_ref().unwrap()["stage"],
        json!("SPECIALIZED_COMPETENCIES")
    );
    assert_eq!(
        audit[1].after.as_ref().unwrap()["stage"],
        json!("INTERVIEW")
    );
}

#[tokio::test]
async fn replayed_submission_is_absorbed_without_a_second_transition() {
    let h = harness();
    let application = seed(&h.store, Stage::GeneralCompetencies).await;

    let first = h
        .pipeline
        .process_submission(
            AssessmentType::GeneralCompetencies,
            &submission("sub-replay", application.id, 65.0),
        )
        .await
        .unwrap();
    assert!(!first.duplicate);

    let second = h
        .pipeline
        .process_submission(
            AssessmentType::GeneralCompetencies,
            &submission("sub-replay", application.id, 65.0),
        )
        .await
        .unwrap();
    assert!(second.duplicate);
    assert_eq!(second.assessment_id, first.assessment_id);
    assert_eq!(second.score, first.score);

    let audit = h.store.list_audit_entries(application.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    // The replay enqueues no second candidate email.
    assert_eq!(h.notifications.queue_len(), 1);
}

#[tokio::test]
async fn failing_score_rejects_and_blocks_later_webhooks() {
    let h = harness();
    let application = seed(&h.store, Stage::SpecializedCompetencies).await;

    let outcome = h
        .pipeline
        .process_submission(
            AssessmentType::SpecializedCompetencies,
            &submission("sub-low", application.id, 69.9),
        )
        .await
        .unwrap();
    assert!(!outcome.passed);
    assert_eq!(outcome.status, ApplicationStatus::Rejected);
    assert_eq!(outcome.stage, Stage::SpecializedCompetencies);

    // A later delivery for the now-rejected application is refused.
    let err = h
        .pipeline
        .process_submission(
            AssessmentType::SpecializedCompetencies,
            &submission("sub-after-reject", application.id, 95.0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn threshold_tie_passes() {
    let h = harness();
    let application = seed(&h.store, Stage::SpecializedCompetencies).await;

    let outcome = h
        .pipeline
        .process_submission(
            AssessmentType::SpecializedCompetencies,
            &submission("sub-tie", application.id, 70.0),
        )
        .await
        .unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.stage, Stage::Interview);
}

#[tokio::test]
async fn general_pass_updates_person_screening_rollup() {
    let h = harness();
    let application = seed(&h.store, Stage::GeneralCompetencies).await;

    h.pipeline
        .process_submission(
            AssessmentType::GeneralCompetencies,
            &submission("sub-rollup", application.id, 88.0),
        )
        .await
        .unwrap();

    let person = h
        .store
        .get_person(application.person_id)
        .await
        .unwrap()
        .unwrap();
    assert!(person.general_competencies_completed);
    assert_eq!(person.general_competencies_score, Some(88.0));
    assert!(person.general_competencies_passed_at.is_some());
}

#[tokio::test]
async fn interview_invitation_is_high_priority() {
    let h = harness();
    let application = seed(&h.store, Stage::SpecializedCompetencies).await;

    h.pipeline
        .process_submission(
            AssessmentType::SpecializedCompetencies,
            &submission("sub-invite", application.id, 90.0),
        )
        .await
        .unwrap();

    let email = h.notifications.dequeue(chrono::Utc::now()).unwrap();
    assert_eq!(email.recipient, "bea@example.com");
    assert_eq!(email.template, "interview_invitation");
    assert_eq!(email.priority, EmailPriority::High);
}

#[tokio::test]
async fn rejection_email_uses_normal_priority() {
    let h = harness();
    let application = seed(&h.store, Stage::GeneralCompetencies).await;

    h.pipeline
        .process_submission(
            AssessmentType::GeneralCompetencies,
            &submission("sub-reject-mail", application.id, 10.0),
        )
        .await
        .unwrap();

    let email = h.notifications.dequeue(chrono::Utc::now()).unwrap();
    assert_eq!(email.template, "application_rejected");
    assert_eq!(email.priority, EmailPriority::Normal);
}

#[tokio::test]
async fn submission_without_score_field_is_rejected() {
    let h = harness();
    let application = seed(&h.store, Stage::GeneralCompetencies).await;

    let data: SubmissionData = serde_json::from_value(json!({
        "submissionId": "sub-noscore",
        "formId": "form-1",
        "fields": [
            { "key": "application_id", "value": application.id.to_string() },
        ]
    }))
    .unwrap();

    let err = h
        .pipeline
        .process_submission(AssessmentType::GeneralCompetencies, &data)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    // Nothing was recorded for the malformed delivery.
    let stored = h
        .store
        .get_application(application.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_stage, Stage::GeneralCompetencies);
    assert!(h
        .store
        .find_assessment_by_submission_id("sub-noscore")
        .await
        .unwrap()
        .is_none());
}
