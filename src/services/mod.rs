pub mod audit_service;
pub mod email_transport;
pub mod eval_service;
pub mod extract_service;
pub mod notification_service;
pub mod pipeline_service;
