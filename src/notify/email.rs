use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationEvent, Notifier};

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    pub fn from_env() -> Self {
        let host = std::env::var("SMTP_HOST").expect("SMTP_HOST missing");
        let user = std::env::var("SMTP_USER").expect("SMTP_USER missing");
        let pass = std::env::var("SMTP_PASS").expect("SMTP_PASS missing");
        let from_addr = std::env::var("NOTIFY_EMAIL_FROM").expect("NOTIFY_EMAIL_FROM missing");
        let to_addr = std::env::var("NOTIFY_EMAIL_TO").expect("NOTIFY_EMAIL_TO missing");

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .expect("invalid SMTP_HOST")
            .credentials(creds)
            .build();

        let from = from_addr.parse().expect("invalid NOTIFY_EMAIL_FROM");
        let to = to_addr.parse().expect("invalid NOTIFY_EMAIL_TO");

        Self { mailer, from, to }
    }
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let subject = format!("Quote source switch: {:?} → {}", ev.kind, ev.to_source);
        let body = format!(
            "Kind: {:?}\nFrom: {}\nTo: {}\nDetail: {}\nTimestamp: {}\n",
            ev.kind,
            ev.from_source.as_deref().unwrap_or("—"),
            ev.to_source,
            ev.message,
            ev.ts.to_rfc3339()
        );

        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
