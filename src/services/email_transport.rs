use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde_json::json;

use crate::error::{Error, Result};
use crate::models::email_queue::QueuedEmail;

/// Outbound mail channel. The dispatcher treats every failure as transient
/// and schedules a retry, so implementations just report success or failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &QueuedEmail) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Shared SMTP transport. The blocking lettre client runs on the blocking
/// pool so a slow relay never stalls request handling.
pub struct SmtpEmailTransport {
    server: String,
    user: String,
    pass: String,
    from: String,
}

impl SmtpEmailTransport {
    pub fn new(server: String, user: String, pass: String, from: String) -> Self {
        Self {
            server,
            user,
            pass,
            from,
        }
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send(&self, email: &QueuedEmail) -> Result<()> {
        let server = self.server.clone();
        let creds = Credentials::new(self.user.clone(), self.pass.clone());
        let from = self.from.clone();
        let recipient = email.recipient.clone();
        let subject = email.subject.clone();
        let body = email.body.clone();

        let sent = tokio::task::spawn_blocking(move || {
            let message = Message::builder()
                .from(
                    from.parse()
                        .map_err(|e| Error::Delivery(format!("bad sender address: {}", e)))?,
                )
                .to(recipient
                    .parse()
                    .map_err(|e| Error::Delivery(format!("bad recipient address: {}", e)))?)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body)
                .map_err(|e| Error::Delivery(format!("message build failed: {}", e)))?;

            let mailer = SmtpTransport::relay(&server)
                .map_err(|e| Error::Delivery(format!("smtp relay setup failed: {}", e)))?
                .credentials(creds)
                .build();

            mailer
                .send(&message)
                .map_err(|e| Error::Delivery(format!("smtp send failed: {}", e)))?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Delivery(format!("send task panicked: {}", e)))?;
        sent
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Alternate per-recipient channel that relays through a provider API (a
/// personally connected mailbox). Posts the message as JSON and treats any
/// non-2xx response as a transient failure.
pub struct ProviderApiTransport {
    client: reqwest::Client,
    target_url: String,
}

impl ProviderApiTransport {
    pub fn new(target_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            target_url,
        }
    }
}

#[async_trait]
impl EmailTransport for ProviderApiTransport {
    async fn send(&self, email: &QueuedEmail) -> Result<()> {
        let payload = json!({
            "recipient": email.recipient,
            "subject": email.subject,
            "body": email.body,
            "template": email.template,
        });
        let response = self
            .client
            .post(&self.target_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("provider request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Delivery(format!(
                "provider responded with {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "provider_api"
    }
}
