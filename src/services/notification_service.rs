use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::models::email_queue::QueuedEmail;
use crate::services::audit_service::AuditService;
use crate::services::email_transport::EmailTransport;

/// Admission caps for the shared transport, from configuration.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    pub hourly_cap: u32,
    pub daily_cap: u32,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DispatcherStatus {
    pub sent_last_hour: u32,
    pub sent_last_day: u32,
    pub can_send: bool,
}

struct QueueSlot {
    seq: u64,
    email: QueuedEmail,
}

#[derive(Default)]
struct DispatchState {
    queue: Vec<QueueSlot>,
    next_seq: u64,
    /// Timestamps of successful shared-transport sends within the last day.
    sent_log: VecDeque<DateTime<Utc>>,
}

/// Priority, rate-limited, retrying email dispatcher. Queue and counters are
/// in-process; a multi-instance deployment must back them with a shared
/// store, which is an acknowledged scaling limitation.
#[derive(Clone)]
pub struct NotificationService {
    state: Arc<Mutex<DispatchState>>,
    transport: Arc<dyn EmailTransport>,
    alternate: Option<Arc<dyn EmailTransport>>,
    audit: AuditService,
    limits: DispatchLimits,
}

impl NotificationService {
    pub fn new(
        audit: AuditService,
        transport: Arc<dyn EmailTransport>,
        alternate: Option<Arc<dyn EmailTransport>>,
        limits: DispatchLimits,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(DispatchState::default())),
            transport,
            alternate,
            audit,
            limits,
        }
    }

    pub fn enqueue(&self, email: QueuedEmail) {
        let mut state = self.state.lock().expect("dispatch state mutex poisoned");
        let seq = state.next_seq;
        state.next_seq += 1;
        tracing::debug!(recipient = %email.recipient, template = %email.template, priority = ?email.priority, "email enqueued");
        state.queue.push(QueueSlot { seq, email });
    }

    /// Yields the next item ordered by priority then enqueue order, but only
    /// when the rolling counters have headroom and the item is due. Returns
    /// `None` when the caller should retry later.
    pub fn dequeue(&self, now: DateTime<Utc>) -> Option<QueuedEmail> {
        let mut state = self.state.lock().expect("dispatch state mutex poisoned");
        if !Self::has_headroom(&mut state, self.limits, now) {
            return None;
        }
        let best = state
            .queue
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.email.scheduled_for <= now)
            .max_by(|(_, a), (_, b)| {
                a.email
                    .priority
                    .cmp(&b.email.priority)
                    // Stable FIFO within a tier: lower seq wins.
                    .then(b.seq.cmp(&a.seq))
            })
            .map(|(idx, _)| idx)?;
        Some(state.queue.remove(best).email)
    }

    /// Counts one successful shared-transport delivery against the rolling
    /// windows. Idempotent per attempt: called once per delivery, not per
    /// retry.
    pub fn record_sent(&self, at: DateTime<Utc>) {
        let mut state = self.state.lock().expect("dispatch state mutex poisoned");
        state.sent_log.push_back(at);
        Self::prune(&mut state, at);
    }

    pub fn status(&self, now: DateTime<Utc>) -> DispatcherStatus {
        let mut state = self.state.lock().expect("dispatch state mutex poisoned");
        Self::prune(&mut state, now);
        let sent_last_hour = Self::count_since(&state, now - Duration::hours(1));
        let sent_last_day = state.sent_log.len() as u32;
        DispatcherStatus {
            sent_last_hour,
            sent_last_day,
            can_send: sent_last_hour < self.limits.hourly_cap
                && sent_last_day < self.limits.daily_cap,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.state
            .lock()
            .expect("dispatch state mutex poisoned")
            .queue
            .len()
    }

    /// One drain step: dequeue, send, account. Returns `Ok(false)` when
    /// there was nothing eligible to send.
    pub async fn run_once(&self) -> Result<bool> {
        let now = Utc::now();
        let Some(mut email) = self.dequeue(now) else {
            return Ok(false);
        };

        // The personally connected mailbox is tried first when requested;
        // its sends do not count against the shared-transport quota.
        if email.use_alternate_transport {
            if let Some(alternate) = &self.alternate {
                match alternate.send(&email).await {
                    Ok(()) => {
                        tracing::info!(recipient = %email.recipient, template = %email.template, "email sent via alternate transport");
                        self.audit
                            .record(AuditService::email_sent_entry(
                                &email.recipient,
                                &email.template,
                                alternate.name(),
                            ))
                            .await;
                        return Ok(true);
                    }
                    Err(err) => {
                        tracing::warn!(error = ?err, recipient = %email.recipient, "alternate transport failed; falling back to shared transport");
                    }
                }
            }
        }

        match self.transport.send(&email).await {
            Ok(()) => {
                self.record_sent(Utc::now());
                tracing::info!(recipient = %email.recipient, template = %email.template, "email sent");
                self.audit
                    .record(AuditService::email_sent_entry(
                        &email.recipient,
                        &email.template,
                        self.transport.name(),
                    ))
                    .await;
            }
            Err(err) => {
                email.attempts += 1;
                if email.attempts >= self.limits.max_attempts {
                    tracing::error!(error = ?err, recipient = %email.recipient, attempts = email.attempts, "email dropped after exhausting retries");
                } else {
                    email.scheduled_for =
                        now + Duration::seconds(self.limits.retry_delay_secs as i64);
                    tracing::warn!(error = ?err, recipient = %email.recipient, attempts = email.attempts, retry_at = %email.scheduled_for, "email send failed; scheduled for retry");
                    self.enqueue(email);
                }
            }
        }
        Ok(true)
    }

    fn has_headroom(state: &mut DispatchState, limits: DispatchLimits, now: DateTime<Utc>) -> bool {
        Self::prune(state, now);
        let hourly = Self::count_since(state, now - Duration::hours(1));
        let daily = state.sent_log.len() as u32;
        hourly < limits.hourly_cap && daily < limits.daily_cap
    }

    fn prune(state: &mut DispatchState, now: DateTime<Utc>) {
        let day_ago = now - Duration::days(1);
        while state.sent_log.front().is_some_and(|&t| t <= day_ago) {
            state.sent_log.pop_front();
        }
    }

    fn count_since(state: &DispatchState, cutoff: DateTime<Utc>) -> u32 {
        state.sent_log.iter().filter(|&&t| t > cutoff).count() as u32
    }
}
