pub mod application;
pub mod assessment;
pub mod audit_log;
pub mod email_queue;
pub mod person;
