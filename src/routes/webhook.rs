use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use validator::Validate;

use crate::{
    config::{get_config, AppEnv},
    dto::webhook_dto::WebhookEnvelope,
    error::{Error, Result},
    middleware::rate_limit::client_ip,
    models::assessment::AssessmentType,
    utils::crypto,
    AppState,
};

pub async fn handle_general_competencies(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    process(state, headers, body, AssessmentType::GeneralCompetencies).await
}

pub async fn handle_specialized_competencies(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    process(state, headers, body, AssessmentType::SpecializedCompetencies).await
}

pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "content-type, x-webhook-secret, x-forwarded-for",
            ),
        ],
    )
}

async fn process(
    state: AppState,
    headers: HeaderMap,
    body: Bytes,
    assessment_type: AssessmentType,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    verify_source_ip(&headers)?;
    verify_secret(&headers, &body)?;

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| Error::BadRequest(format!("invalid webhook payload: {}", e)))?;
    envelope.data.validate()?;

    let outcome = state
        .pipeline_service
        .process_submission(assessment_type, &envelope.data)
        .await?;

    let message = if outcome.duplicate {
        "Duplicate submission; returning previously recorded result"
    } else if outcome.passed {
        "Assessment recorded; application advanced"
    } else {
        "Assessment recorded; application rejected"
    };

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": message,
            "data": {
                "applicationId": outcome.application_id,
                "assessmentId": outcome.assessment_id,
                "stage": outcome.stage,
                "status": outcome.status,
                "passed": outcome.passed,
                "duplicate": outcome.duplicate,
                "missingFields": outcome.missing_fields,
            }
        })),
    ))
}

/// Keyed-hash check over the exact raw body. The header may carry either the
/// hex HMAC-SHA256 digest or, for callers that cannot sign, the raw shared
/// secret; both are compared in constant time. Outside production a missing
/// header is bypassed for local testing.
fn verify_secret(headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let config = get_config();
    let Some(secret_hdr) = headers.get("x-webhook-secret") else {
        if config.app_env == AppEnv::Production {
            return Err(Error::Unauthorized("missing_webhook_secret".into()));
        }
        tracing::debug!("webhook secret missing; check bypassed outside production");
        return Ok(());
    };
    let provided = secret_hdr
        .to_str()
        .map_err(|_| Error::Unauthorized("invalid_secret_header".into()))?;

    if crypto::verify_body_signature(&config.webhook_secret, body, provided)
        || crypto::constant_time_eq(provided.as_bytes(), config.webhook_secret.as_bytes())
    {
        Ok(())
    } else {
        Err(Error::Unauthorized("invalid_webhook_secret".into()))
    }
}

/// Production-only gate: the caller's forwarded IP must fall inside one of
/// the configured CIDR ranges.
fn verify_source_ip(headers: &HeaderMap) -> Result<()> {
    let config = get_config();
    if config.app_env != AppEnv::Production {
        return Ok(());
    }
    let ip = client_ip(headers).ok_or_else(|| Error::Unauthorized("missing_client_ip".into()))?;
    if config
        .webhook_allowed_cidrs
        .iter()
        .any(|network| network.contains(ip))
    {
        Ok(())
    } else {
        tracing::warn!(%ip, "webhook request from IP outside the allow-list");
        Err(Error::Unauthorized("ip_not_allowed".into()))
    }
}
