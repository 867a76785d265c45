use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

/// Inbound form-provider event. The provider wraps the submission in a
/// `data` envelope; field values arrive as a loosely-typed key/value list
/// and are only trusted after extraction (see `extract_service`).
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub data: SubmissionData,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmissionData {
    #[serde(rename = "submissionId")]
    #[validate(length(min = 1, message = "submission id is required"))]
    pub submission_id: String,
    #[serde(rename = "formId")]
    pub form_id: String,
    #[serde(rename = "formName", default)]
    pub form_name: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    #[serde(default)]
    pub value: JsonValue,
}

impl SubmissionData {
    pub fn field(&self, key: &str) -> Option<&JsonValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}
