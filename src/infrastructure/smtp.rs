use crate::config::Settings;
use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use crate::error::Result;
use crate::interfaces::email::{OutboundEmail, TemplateContext, render};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::info;

/// Renders intents and transmits them over SMTP (STARTTLS).
///
/// Incomplete SMTP credentials are a logged skip, not an error: the job keeps
/// resolving rounds even when mail is unconfigured. A configured sandbox
/// address redirects every message there instead.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    context: TemplateContext,
    sandbox: Option<String>,
    configured: bool,
}

impl SmtpNotifier {
    pub fn new(settings: &Settings) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.smtp_user.clone(),
                settings.smtp_pass.clone(),
            ))
            .timeout(Some(Duration::from_secs(20)))
            .build();
        Ok(Self {
            transport,
            from: Mailbox::new(Some(settings.smtp_name.clone()), settings.smtp_from.parse()?),
            context: TemplateContext::from_settings(settings),
            sandbox: settings.sandbox_recipient().map(str::to_string),
            configured: settings.smtp_configured(),
        })
    }

    fn build_message(&self, email: &OutboundEmail, to: &str) -> Result<Message> {
        Ok(Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(email.to_name.clone(), to.parse()?))
            .subject(email.subject.clone())
            .body(email.body.clone())?)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let Some(email) = render(notification, &self.context) else {
            info!(kind = notification.kind(), "no recipient for message; skipping");
            return Ok(());
        };
        if !self.configured {
            info!(
                kind = notification.kind(),
                to = %email.to,
                "SMTP config incomplete; skipping send"
            );
            return Ok(());
        }
        let to = match &self.sandbox {
            Some(sandbox) => {
                info!(original = %email.to, sandbox = %sandbox, "sandbox active; redirecting");
                sandbox.clone()
            }
            None => email.to.clone(),
        };
        info!(kind = notification.kind(), to = %to, subject = %email.subject, "sending email");
        let message = self.build_message(&email, &to)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Dry-run notifier: renders every intent and logs it without transmitting.
pub struct LogNotifier {
    context: TemplateContext,
}

impl LogNotifier {
    pub fn new(context: TemplateContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        match render(notification, &self.context) {
            Some(email) => info!(
                kind = notification.kind(),
                to = %email.to,
                subject = %email.subject,
                "dry-run: delivery blocked"
            ),
            None => info!(
                kind = notification.kind(),
                "dry-run: intent without recipient"
            ),
        }
        Ok(())
    }
}
