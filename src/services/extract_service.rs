use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::dto::webhook_dto::SubmissionData;
use crate::error::{Error, Result};

/// Static field-key mapping for the third-party assessment forms. The form
/// builder guarantees these keys; anything else in the payload is opaque.
pub const FIELD_APPLICATION_ID: &str = "application_id";
pub const FIELD_SCORE: &str = "score";

/// Pairs of (claim flag, upload field, display name). When the flag is set
/// but the upload field is empty the document is reported as missing without
/// blocking processing.
const UPLOAD_FIELDS: &[(&str, &str, &str)] = &[
    ("resume_provided", "resume_files", "resume"),
    ("certificates_provided", "certificate_files", "certificates"),
];

#[derive(Debug, Clone)]
pub struct ExtractedSubmission {
    pub application_id: Uuid,
    pub score: f64,
    pub external_submission_id: String,
    pub raw_payload: JsonValue,
    /// Documents claimed by the candidate but absent from the payload.
    /// Non-fatal; surfaced for downstream display only.
    pub missing_fields: Vec<String>,
}

/// Turns the loosely-typed field list into a typed record, failing closed on
/// any unexpected shape. `scale` bounds the accepted score range.
pub fn extract(data: &SubmissionData, scale: f64) -> Result<ExtractedSubmission> {
    let submission_id = data.submission_id.trim();
    if submission_id.is_empty() {
        return Err(Error::BadRequest("submission id is required".to_string()));
    }

    let application_id = data
        .field(FIELD_APPLICATION_ID)
        .ok_or_else(|| Error::BadRequest(format!("missing field '{}'", FIELD_APPLICATION_ID)))?;
    let application_id = as_str(application_id)
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| {
            Error::BadRequest(format!(
                "field '{}' is not a valid application id",
                FIELD_APPLICATION_ID
            ))
        })?;

    let score_value = data
        .field(FIELD_SCORE)
        .ok_or_else(|| Error::BadRequest(format!("missing field '{}'", FIELD_SCORE)))?;
    let score = parse_score(score_value)?;
    if !score.is_finite() || score < 0.0 || score > scale {
        return Err(Error::BadRequest(format!(
            "score {} is outside the valid range [0, {}]",
            score, scale
        )));
    }

    let mut missing_fields = Vec::new();
    for (flag_key, upload_key, name) in UPLOAD_FIELDS {
        let claimed = data.field(flag_key).map(is_truthy).unwrap_or(false);
        if claimed && data.field(upload_key).map(is_empty_value).unwrap_or(true) {
            missing_fields.push((*name).to_string());
        }
    }

    Ok(ExtractedSubmission {
        application_id,
        score,
        external_submission_id: submission_id.to_string(),
        raw_payload: serde_json::to_value(data)?,
        missing_fields,
    })
}

fn as_str(value: &JsonValue) -> Option<&str> {
    value.as_str()
}

fn parse_score(value: &JsonValue) -> Result<f64> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|s| s.is_finite())
        .ok_or_else(|| Error::BadRequest(format!("field '{}' is not a number", FIELD_SCORE)))
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        JsonValue::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn is_empty_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::webhook_dto::FormField;
    use serde_json::json;

    fn submission(fields: Vec<(&str, JsonValue)>) -> SubmissionData {
        SubmissionData {
            submission_id: "sub-123".to_string(),
            form_id: "form-1".to_string(),
            form_name: "Specialized competencies".to_string(),
            fields: fields
                .into_iter()
                .map(|(key, value)| FormField {
                    key: key.to_string(),
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn extracts_typed_record() {
        let app_id = Uuid::new_v4();
        let data = submission(vec![
            (FIELD_APPLICATION_ID, json!(app_id.to_string())),
            (FIELD_SCORE, json!(82)),
        ]);

        let extracted = extract(&data, 100.0).unwrap();
        assert_eq!(extracted.application_id, app_id);
        assert_eq!(extracted.score, 82.0);
        assert_eq!(extracted.external_submission_id, "sub-123");
        assert!(extracted.missing_fields.is_empty());
    }

    #[test]
    fn accepts_string_scores() {
        let data = submission(vec![
            (FIELD_APPLICATION_ID, json!(Uuid::new_v4().to_string())),
            (FIELD_SCORE, json!("64.5")),
        ]);
        assert_eq!(extract(&data, 100.0).unwrap().score, 64.5);
    }

    #[test]
    fn rejects_missing_application_id() {
        let data = submission(vec![(FIELD_SCORE, json!(50))]);
        assert!(matches!(
            extract(&data, 100.0),
            Err(crate::error::Error::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_score() {
        let data = submission(vec![
            (FIELD_APPLICATION_ID, json!(Uuid::new_v4().to_string())),
            (FIELD_SCORE, json!(140)),
        ]);
        assert!(extract(&data, 100.0).is_err());

        let data = submission(vec![
            (FIELD_APPLICATION_ID, json!(Uuid::new_v4().to_string())),
            (FIELD_SCORE, json!(-1)),
        ]);
        assert!(extract(&data, 100.0).is_err());
    }

    #[test]
    fn rejects_non_numeric_score() {
        let data = submission(vec![
            (FIELD_APPLICATION_ID, json!(Uuid::new_v4().to_string())),
            (FIELD_SCORE, json!("eighty")),
        ]);
        assert!(extract(&data, 100.0).is_err());
    }

    #[test]
    fn claimed_but_missing_upload_is_non_fatal() {
        let data = submission(vec![
            (FIELD_APPLICATION_ID, json!(Uuid::new_v4().to_string())),
            (FIELD_SCORE, json!(70)),
            ("resume_provided", json!(true)),
            ("resume_files", json!([])),
        ]);

        let extracted = extract(&data, 100.0).unwrap();
        assert_eq!(extracted.missing_fields, vec!["resume".to_string()]);
    }

    #[test]
    fn present_upload_is_not_reported() {
        let data = submission(vec![
            (FIELD_APPLICATION_ID, json!(Uuid::new_v4().to_string())),
            (FIELD_SCORE, json!(70)),
            ("resume_provided", json!("yes")),
            ("resume_files", json!(["cv.pdf"])),
        ]);
        assert!(extract(&data, 100.0).unwrap().missing_fields.is_empty());
    }
}
