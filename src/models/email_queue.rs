use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dispatch priority. Ordering matters: higher variants are drained first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailPriority {
    Low,
    Normal,
    High,
}

impl EmailPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            EmailPriority::Low => "low",
            EmailPriority::Normal => "normal",
            EmailPriority::High => "high",
        }
    }
}

/// Transient queue item. Removed on terminal success or once the attempt
/// counter reaches the configured maximum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEmail {
    pub id: Uuid,
    pub recipient: String,
    pub template: String,
    pub subject: String,
    pub body: String,
    pub priority: EmailPriority,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    /// When true the dispatcher tries the per-recipient alternate transport
    /// first and only falls back to the shared one on failure.
    pub use_alternate_transport: bool,
}

impl QueuedEmail {
    pub fn new(
        recipient: impl Into<String>,
        template: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        priority: EmailPriority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            template: template.into(),
            subject: subject.into(),
            body: body.into(),
            priority,
            attempts: 0,
            created_at: now,
            scheduled_for: now,
            use_alternate_transport: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_puts_high_first() {
        assert!(EmailPriority::High > EmailPriority::Normal);
        assert!(EmailPriority::Normal > EmailPriority::Low);
    }
}
