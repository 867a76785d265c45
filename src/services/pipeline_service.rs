use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::ThresholdConfig;
use crate::database::store::{AssessmentInsert, Store};
use crate::dto::webhook_dto::SubmissionData;
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, Stage};
use crate::models::assessment::{Assessment, AssessmentType};
use crate::models::email_queue::{EmailPriority, QueuedEmail};
use crate::services::audit_service::AuditService;
use crate::services::eval_service;
use crate::services::extract_service::{self, ExtractedSubmission};
use crate::services::notification_service::NotificationService;

/// Frozen per-assessment-type scoring rules, snapshotted from configuration
/// at service construction.
#[derive(Debug, Clone, Copy)]
pub struct PipelineThresholds {
    pub general: ThresholdConfig,
    pub specialized: ThresholdConfig,
}

impl PipelineThresholds {
    pub fn for_type(&self, assessment_type: AssessmentType) -> ThresholdConfig {
        match assessment_type {
            AssessmentType::GeneralCompetencies => self.general,
            AssessmentType::SpecializedCompetencies => self.specialized,
        }
    }
}

/// Result of one webhook submission, used for response construction.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub application_id: Uuid,
    pub assessment_id: Uuid,
    pub stage: Stage,
    pub status: ApplicationStatus,
    pub passed: bool,
    pub score: f64,
    pub threshold: f64,
    pub scale: f64,
    pub duplicate: bool,
    pub missing_fields: Vec<String>,
}

/// Advances or terminates a candidate's application on assessment
/// completion. Processing is synchronous end-to-end; audit and email are
/// post-commit hooks that never unwind the committed transition.
#[derive(Clone)]
pub struct PipelineService {
    store: Arc<dyn Store>,
    audit: AuditService,
    notifications: NotificationService,
    thresholds: PipelineThresholds,
}

impl PipelineService {
    pub fn new(
        store: Arc<dyn Store>,
        audit: AuditService,
        notifications: NotificationService,
        thresholds: PipelineThresholds,
    ) -> Self {
        Self {
            store,
            audit,
            notifications,
            thresholds,
        }
    }

    pub async fn process_submission(
        &self,
        assessment_type: AssessmentType,
        data: &SubmissionData,
    ) -> Result<TransitionOutcome> {
        // Idempotency ledger: at-least-once delivery from the form provider
        // is absorbed here, before any extraction or state mutation.
        if let Some(existing) = self
            .store
            .find_assessment_by_submission_id(data.submission_id.trim())
            .await?
        {
            tracing::info!(submission_id = %data.submission_id, assessment_id = %existing.id, "duplicate webhook delivery short-circuited");
            return self.duplicate_outcome(existing).await;
        }

        let snapshot = self.thresholds.for_type(assessment_type);
        let extracted = extract_service::extract(data, snapshot.scale)?;

        let application = self
            .store
            .get_application(extracted.application_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Application {} not found",
                    extracted.application_id
                ))
            })?;

        if application.status != ApplicationStatus::Active {
            return Err(Error::Conflict(format!(
                "application {} is {}, not ACTIVE",
                application.id,
                application.status.as_str()
            )));
        }
        if !assessment_type
            .accepted_stages()
            .contains(&application.current_stage)
        {
            return Err(Error::Conflict(format!(
                "{} webhook is not valid for stage {}",
                assessment_type.as_str(),
                application.current_stage.as_str()
            )));
        }

        let passed = eval_service::passed(extracted.score, snapshot.threshold);
        let assessment = Assessment {
            id: Uuid::new_v4(),
            application_id: application.id,
            assessment_type,
            score: extracted.score,
            threshold: snapshot.threshold,
            scale: snapshot.scale,
            passed,
            external_submission_id: extracted.external_submission_id.clone(),
            raw_payload: extracted.raw_payload.clone(),
            completed_at: Utc::now(),
        };

        let assessment = match self.store.insert_assessment(assessment).await? {
            AssessmentInsert::Created(assessment) => assessment,
            // A concurrent delivery won the insert race; treat ours as the
            // duplicate it is.
            AssessmentInsert::Duplicate(existing) => {
                tracing::info!(submission_id = %existing.external_submission_id, "concurrent duplicate insert absorbed");
                return self.duplicate_outcome(existing).await;
            }
        };

        let (new_stage, new_status) = if passed {
            (assessment_type.stage_on_pass(), ApplicationStatus::Active)
        } else {
            // Stage freezes where the candidate failed.
            (application.current_stage, ApplicationStatus::Rejected)
        };

        let updated = self
            .store
            .update_application_state(application.id, new_stage, new_status)
            .await?;
        tracing::info!(
            application_id = %updated.id,
            submission_id = %assessment.external_submission_id,
            stage = updated.current_stage.as_str(),
            status = updated.status.as_str(),
            score = assessment.score,
            "pipeline transition committed"
        );

        self.run_post_commit_hooks(&application, &updated, &assessment, &extracted)
            .await;

        Ok(TransitionOutcome {
            application_id: updated.id,
            assessment_id: assessment.id,
            stage: updated.current_stage,
            status: updated.status,
            passed,
            score: assessment.score,
            threshold: assessment.threshold,
            scale: assessment.scale,
            duplicate: false,
            missing_fields: extracted.missing_fields,
        })
    }

    /// Second and later deliveries of a submission return the first
    /// delivery's result and perform no further side effects.
    async fn duplicate_outcome(&self, existing: Assessment) -> Result<TransitionOutcome> {
        let application = self
            .store
            .get_application(existing.application_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "assessment {} references missing application {}",
                    existing.id, existing.application_id
                ))
            })?;
        Ok(TransitionOutcome {
            application_id: application.id,
            assessment_id: existing.id,
            stage: application.current_stage,
            status: application.status,
            passed: existing.passed,
            score: existing.score,
            threshold: existing.threshold,
            scale: existing.scale,
            duplicate: true,
            missing_fields: Vec::new(),
        })
    }

    /// Audit write, screening roll-up and email enqueue run after the
    /// transition is durable. Each has independent failure handling.
    async fn run_post_commit_hooks(
        &self,
        before: &Application,
        after: &Application,
        assessment: &Assessment,
        extracted: &ExtractedSubmission,
    ) {
        let rationale = format!(
            "{} {} with score {}",
            assessment.assessment_type.display_name(),
            if assessment.passed { "passed" } else { "failed" },
            eval_service::summary(assessment.score, assessment.threshold, assessment.scale)
        );
        self.audit
            .record(AuditService::transition_entry(
                before,
                after,
                assessment,
                rationale.clone(),
            ))
            .await;

        if assessment.assessment_type == AssessmentType::GeneralCompetencies {
            if let Err(err) = self
                .store
                .update_person_screening(
                    before.person_id,
                    assessment.score,
                    assessment.passed,
                    assessment.completed_at,
                )
                .await
            {
                tracing::warn!(error = ?err, person_id = %before.person_id, "screening roll-up update failed");
            }
        }

        if !extracted.missing_fields.is_empty() {
            tracing::warn!(
                application_id = %before.id,
                missing = ?extracted.missing_fields,
                "submission claimed documents that were not uploaded"
            );
        }

        match self.store.get_person(before.person_id).await {
            Ok(Some(person)) => {
                self.notifications
                    .enqueue(candidate_email(&person.email, after, assessment, &rationale));
            }
            Ok(None) => {
                tracing::warn!(person_id = %before.person_id, "no person row for application; candidate email skipped");
            }
            Err(err) => {
                tracing::warn!(error = ?err, person_id = %before.person_id, "person lookup failed; candidate email skipped");
            }
        }
    }
}

fn candidate_email(
    recipient: &str,
    after: &Application,
    assessment: &Assessment,
    rationale: &str,
) -> QueuedEmail {
    if !assessment.passed {
        return QueuedEmail::new(
            recipient,
            "application_rejected",
            "Update on your application",
            format!(
                "Thank you for your interest in the {} position. Unfortunately we will \
                 not be moving forward with your application. Result: {}.",
                after.position, rationale
            ),
            EmailPriority::Normal,
        );
    }
    if after.current_stage == Stage::Interview {
        return QueuedEmail::new(
            recipient,
            "interview_invitation",
            "Interview invitation",
            format!(
                "Congratulations! You have passed the assessments for the {} position \
                 and are invited to an interview. We will contact you shortly to \
                 schedule it. Result: {}.",
                after.position, rationale
            ),
            EmailPriority::High,
        );
    }
    QueuedEmail::new(
        recipient,
        "assessment_passed",
        "Assessment result",
        format!(
            "Good news! {}. You have advanced to the next step for the {} position.",
            rationale, after.position
        ),
        EmailPriority::Normal,
    )
}
