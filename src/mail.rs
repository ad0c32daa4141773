//! Report delivery over an SMTP relay.

use crate::engine::ReportMailer;
use crate::model::MailSettings;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),

    #[error("no recipients configured")]
    NoRecipients,

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

pub struct SmtpMailer {
    settings: MailSettings,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: MailSettings) -> Result<Self, MailError> {
        // No SMTP auth: the relay is trusted by source address.
        let tls = if settings.starttls {
            Tls::Opportunistic(TlsParameters::new(settings.smtp_server.clone())?)
        } else {
            Tls::None
        };
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_server)
            .port(settings.smtp_port)
            .timeout(Some(settings.timeout))
            .tls(tls)
            .build();
        Ok(Self {
            settings,
            transport,
        })
    }
}

#[async_trait]
impl ReportMailer for SmtpMailer {
    async fn send_report(&self, body: &str) -> Result<(), MailError> {
        let message = build_message(&self.settings, body)?;
        tracing::debug!(
            relay = %self.settings.smtp_server,
            port = self.settings.smtp_port,
            "sending report email"
        );
        self.transport.send(message).await?;
        Ok(())
    }

    fn recipients(&self) -> String {
        self.settings.to.clone()
    }
}

pub(crate) fn build_message(settings: &MailSettings, body: &str) -> Result<Message, MailError> {
    let from: Mailbox = settings.from.trim().parse()?;
    let mut builder = Message::builder()
        .from(from)
        .subject(settings.subject.clone())
        .header(ContentType::TEXT_PLAIN);
    for to in parse_recipients(&settings.to)? {
        builder = builder.to(to);
    }
    Ok(builder.body(body.to_string())?)
}

/// Comma-separated recipient list, as written in the config file.
pub(crate) fn parse_recipients(list: &str) -> Result<Vec<Mailbox>, MailError> {
    let boxes = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Mailbox>())
        .collect::<Result<Vec<_>, _>>()?;
    if boxes.is_empty() {
        return Err(MailError::NoRecipients);
    }
    Ok(boxes)
}
