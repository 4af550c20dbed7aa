// src/notify/email.rs
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationMessage, Notifier};
use crate::config::env::EmailConfig;
use crate::error::DispatchError;

struct Transport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

/// SMTP with STARTTLS, logging in as the sender. Disabled when the email
/// settings are missing (already reported by the config loader) or unusable.
pub struct EmailNotifier {
    transport: Option<Transport>,
}

impl EmailNotifier {
    pub fn from_config(cfg: Option<&EmailConfig>) -> Self {
        let Some(cfg) = cfg else {
            tracing::debug!("email channel not configured");
            return Self::disabled();
        };
        match Self::build(cfg) {
            Ok(t) => Self { transport: Some(t) },
            Err(e) => {
                tracing::warn!(error = %e, "email channel disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { transport: None }
    }

    fn build(cfg: &EmailConfig) -> Result<Transport, DispatchError> {
        let build_err = |message: String| DispatchError::Build {
            channel: "email",
            message,
        };
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| build_err(format!("EMAIL_FROM: {e}")))?;
        let to: Mailbox = cfg
            .to
            .parse()
            .map_err(|e| build_err(format!("EMAIL_TO: {e}")))?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_server)
            .map_err(|e| build_err(format!("SMTP_SERVER: {e}")))?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(cfg.from.clone(), cfg.password.clone()))
            .timeout(Some(Duration::from_secs(30)))
            .build();
        Ok(Transport { mailer, from, to })
    }

    /// Escaped body with `<br>` line breaks; metadata as a trailing block.
    pub fn render_html(msg: &NotificationMessage) -> String {
        let body = html_escape::encode_text(&msg.body).replace('\n', "<br>");
        let mut html = format!("<html><body>{body}");
        if let Some(meta) = msg.metadata_inline() {
            html.push_str(&format!(
                "<hr><p><small>Metadata: {}</small></p>",
                html_escape::encode_text(&meta)
            ));
        }
        html.push_str("</body></html>");
        html
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    async fn send(&self, msg: &NotificationMessage) -> Result<(), DispatchError> {
        let Some(t) = &self.transport else {
            return Err(DispatchError::Disabled { channel: "email" });
        };
        let email = Message::builder()
            .from(t.from.clone())
            .to(t.to.clone())
            .subject(msg.subject.clone())
            .header(header::ContentType::TEXT_HTML)
            .body(Self::render_html(msg))
            .map_err(|e| DispatchError::Build {
                channel: "email",
                message: e.to_string(),
            })?;

        t.mailer
            .send(email)
            .await
            .map_err(|e| DispatchError::Transport {
                channel: "email",
                message: e.to_string(),
            })?;
        tracing::info!("email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_body_escapes_and_breaks_lines() {
        let msg = NotificationMessage::new("s", "a < b\nc & d").with_meta("source", "BOP");
        let html = EmailNotifier::render_html(&msg);
        assert_eq!(
            html,
            "<html><body>a &lt; b<br>c &amp; d<hr><p><small>Metadata: source: BOP</small></p></body></html>"
        );
    }

    #[test]
    fn missing_config_disables_channel() {
        assert!(!EmailNotifier::from_config(None).is_enabled());
    }

    #[test]
    fn invalid_address_disables_channel() {
        let cfg = EmailConfig {
            smtp_server: "smtp.example.org".into(),
            smtp_port: 587,
            from: "not an address".into(),
            to: "ops@example.org".into(),
            password: "x".into(),
        };
        assert!(!EmailNotifier::from_config(Some(&cfg)).is_enabled());
    }
}
