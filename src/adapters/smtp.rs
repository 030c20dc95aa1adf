use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::domain::model::{format_ratio, Direction, ReportArtifact};
use crate::domain::ports::ReportMailer;
use crate::utils::error::{ReportError, Result};

/// Content-ID linking the inline chart to the `<img>` tag in the body.
pub const CHART_CONTENT_ID: &str = "graph_image";

pub fn report_html(ratio: f64, direction: Direction) -> String {
    format!(
        r#"<html>
    <body>
        <p>La variación de cobros para la compañia ayer fue de {ratio}% {arrow}.</p>
        <p>
            <img src="cid:{cid}" alt="Gráfica de Cobros" style="width:100%; height:auto;">
        </p>
    </body>
</html>"#,
        ratio = format_ratio(ratio),
        arrow = direction.arrow(),
        cid = CHART_CONTENT_ID,
    )
}

/// Sends over implicit TLS, authenticating as the sender address.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, recipients: &[String]) -> Result<Self> {
        let from = parse_mailbox("smtp.address", &config.address)?;
        let recipients = recipients
            .iter()
            .map(|address| parse_mailbox("smtp.recipients", address))
            .collect::<Result<Vec<_>>>()?;
        if recipients.is_empty() {
            return Err(ReportError::MissingConfig {
                field: "smtp.recipients".to_string(),
            });
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| ReportError::config(format!("SMTP relay {}: {}", config.server, e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.address.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .build();

        Ok(Self {
            transport,
            from,
            recipients,
        })
    }

    pub fn build_message(&self, artifact: &ReportArtifact, chart_png: &[u8]) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(artifact.subject.clone());
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        let png = ContentType::parse("image/png")
            .map_err(|e| ReportError::delivery(format!("image content type: {}", e)))?;
        let chart = Attachment::new_inline(CHART_CONTENT_ID.to_string()).body(chart_png.to_vec(), png);

        builder
            .multipart(
                MultiPart::related()
                    .singlepart(SinglePart::html(report_html(
                        artifact.ratio,
                        artifact.direction,
                    )))
                    .singlepart(chart),
            )
            .map_err(|e| ReportError::delivery(format!("cannot build the message: {}", e)))
    }

    fn recipient_summary(&self) -> String {
        self.recipients
            .iter()
            .map(|m| m.email.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl ReportMailer for SmtpMailer {
    async fn send_report(&self, artifact: &ReportArtifact, chart_png: &[u8]) -> Result<()> {
        let message = self.build_message(artifact, chart_png)?;

        match self.transport.send(message).await {
            Ok(_) => {
                tracing::info!(
                    "Email sent successfully to {} with subject: {}",
                    self.recipient_summary(),
                    artifact.subject
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error connecting or sending the email: {}", e);
                Err(ReportError::delivery(e.to_string()))
            }
        }
    }
}

fn parse_mailbox(field: &str, address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| ReportError::InvalidConfigValue {
            field: field.to_string(),
            value: address.to_string(),
            reason: e.to_string(),
        })
}
