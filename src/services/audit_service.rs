use std::sync::Arc;

use serde_json::json;

use crate::database::store::Store;
use crate::error::Result;
use crate::models::application::Application;
use crate::models::assessment::Assessment;
use crate::models::audit_log::{AuditActionType, AuditLogEntry};

/// Append-only audit trail recorder. Writes are fire-and-forget relative to
/// the primary transaction: a failed write is logged and never rolls back an
/// already-committed state change.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn Store>,
}

impl AuditService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: AuditLogEntry) {
        let action = entry.action.clone();
        if let Err(err) = self.store.insert_audit_entry(entry).await {
            tracing::error!(error = ?err, action = %action, "audit write failed; pipeline state is already committed");
        }
    }

    /// Strict variant for callers that need the write to succeed.
    pub async fn record_strict(&self, entry: AuditLogEntry) -> Result<()> {
        self.store.insert_audit_entry(entry).await
    }

    /// Exactly one entry per assessment-driven transition, carrying the
    /// score, threshold and the stage/status pair before and after.
    pub fn transition_entry(
        before: &Application,
        after: &Application,
        assessment: &Assessment,
        rationale: String,
    ) -> AuditLogEntry {
        let action_type = if assessment.passed {
            AuditActionType::StageChange
        } else {
            AuditActionType::StatusChange
        };
        let action = if assessment.passed {
            format!("{}_passed", assessment.assessment_type.as_str().to_lowercase())
        } else {
            format!("{}_failed", assessment.assessment_type.as_str().to_lowercase())
        };
        AuditLogEntry {
            person_id: Some(before.person_id),
            application_id: Some(before.id),
            before: Some(json!({
                "stage": before.current_stage,
                "status": before.status,
            })),
            after: Some(json!({
                "stage": after.current_stage,
                "status": after.status,
                "score": assessment.score,
                "threshold": assessment.threshold,
            })),
            rationale: Some(rationale),
            ..AuditLogEntry::system(action, action_type)
        }
    }

    pub fn email_sent_entry(recipient: &str, template: &str, transport: &str) -> AuditLogEntry {
        AuditLogEntry {
            after: Some(json!({
                "recipient": recipient,
                "template": template,
                "transport": transport,
            })),
            rationale: Some(format!("Sent '{}' email to {}", template, recipient)),
            ..AuditLogEntry::system("email_sent", AuditActionType::EmailSent)
        }
    }
}
