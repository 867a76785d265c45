pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};

use crate::database::store::Store;
use crate::middleware::rate_limit::RateLimiter;
use crate::services::{
    audit_service::AuditService,
    email_transport::EmailTransport,
    notification_service::{DispatchLimits, NotificationService},
    pipeline_service::{PipelineService, PipelineThresholds},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pipeline_service: PipelineService,
    pub audit_service: AuditService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        transport: Arc<dyn EmailTransport>,
        alternate_transport: Option<Arc<dyn EmailTransport>>,
    ) -> Self {
        let config = crate::config::get_config();

        let audit_service = AuditService::new(store.clone());
        let notification_service = NotificationService::new(
            audit_service.clone(),
            transport,
            alternate_transport,
            DispatchLimits {
                hourly_cap: config.email_hourly_cap,
                daily_cap: config.email_daily_cap,
                max_attempts: config.email_max_attempts,
                retry_delay_secs: config.email_retry_delay_secs,
            },
        );
        let pipeline_service = PipelineService::new(
            store.clone(),
            audit_service.clone(),
            notification_service.clone(),
            PipelineThresholds {
                general: config.general_threshold,
                specialized: config.specialized_threshold,
            },
        );

        Self {
            store,
            pipeline_service,
            audit_service,
            notification_service,
        }
    }
}

/// Full application router: webhook endpoints behind the per-IP rate
/// limiter, plus the unthrottled health probe.
pub fn app_router(state: AppState) -> Router {
    let config = crate::config::get_config();
    let limiter = RateLimiter::in_memory(
        config.webhook_rate_limit,
        Duration::from_secs(config.webhook_rate_window_secs),
    );

    let webhook_api = Router::new()
        .route(
            "/api/webhook/assessments/general-competencies",
            post(routes::webhook::handle_general_competencies).options(routes::webhook::preflight),
        )
        .route(
            "/api/webhook/assessments/specialized-competencies",
            post(routes::webhook::handle_specialized_competencies)
                .options(routes::webhook::preflight),
        )
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::webhook_rate_limit,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(webhook_api)
        .with_state(state)
}
