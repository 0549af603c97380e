//! Email background job.
//!
//! Verification and password-reset mails are queued as `EmailJob`s and
//! delivered by the `jobs work` process over SMTP. Without `SMTP_HOST` the
//! worker logs each message instead of sending it.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use std::env;

use crate::errors::AppError;

/// Email job payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    /// Recipient email address
    pub to: String,
    pub subject: String,
    /// Plain text body
    pub body: String,
    /// Optional sender override (defaults to SMTP_FROM)
    #[serde(default)]
    pub from: Option<String>,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            from: None,
        }
    }

    /// Account verification mail pointing at `link`.
    pub fn verification(to: &str, username: &str, link: &str) -> Self {
        Self::new(
            to,
            "Confirm your email",
            format!(
                "Hi {},\n\n\
                 Thanks for signing up. Confirm your email address by opening:\n\n\
                 {}\n\n\
                 The link is valid for 7 days.",
                username, link
            ),
        )
    }

    /// Password reset mail pointing at `link`, valid for `ttl_minutes`.
    pub fn password_reset(to: &str, username: &str, link: &str, ttl_minutes: i64) -> Self {
        Self::new(
            to,
            "Reset your password",
            format!(
                "Hi {},\n\n\
                 Someone asked to reset the password for this account. \
                 If it was you, open:\n\n\
                 {}\n\n\
                 The link expires in {} minutes. Otherwise you can ignore this message.",
                username, link, ttl_minutes
            ),
        )
    }

    /// Set custom sender address
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// SMTP settings from the environment.
struct EmailConfig {
    smtp_host: Option<String>,
    smtp_port: u16,
    smtp_user: Option<String>,
    smtp_pass: Option<String>,
    smtp_from: String,
    smtp_tls: bool,
}

impl EmailConfig {
    fn from_env() -> Self {
        Self {
            smtp_host: env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_pass: env::var("SMTP_PASS").ok(),
            smtp_from: env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@example.com".to_string()),
            smtp_tls: env::var("SMTP_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }

    /// Transport for `host`: implicit TLS on 465, STARTTLS otherwise,
    /// plain text only when `SMTP_TLS` is off.
    fn transport(&self, host: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>, AppError> {
        let builder = if !self.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        } else if self.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(smtp_error)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(smtp_error)?
        };

        let builder = builder.port(self.smtp_port);
        let builder = match (&self.smtp_user, &self.smtp_pass) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

fn smtp_error(e: lettre::transport::smtp::Error) -> AppError {
    AppError::Internal(format!("SMTP error: {}", e))
}

/// Build the plain-text message for `job`, sent from `from`.
fn build_message(job: &EmailJob, from: &str) -> Result<Message, AppError> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid sender address {}: {}", from, e)))?;
    let to: Mailbox = job
        .to
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid recipient address {}: {}", job.to, e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(job.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(job.body.clone())
        .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
}

/// Email job handler - processes email sending jobs
pub async fn email_job_handler(job: EmailJob) -> Result<(), AppError> {
    let config = EmailConfig::from_env();
    let from = job.from.as_deref().unwrap_or(&config.smtp_from);

    tracing::info!(
        to = %job.to,
        from = %from,
        subject = %job.subject,
        "Processing email job"
    );

    let Some(host) = config.smtp_host.as_deref() else {
        tracing::warn!("SMTP not configured - logging email instead of sending");
        tracing::info!(
            "=== EMAIL (not sent) ===\n\
             From: {}\n\
             To: {}\n\
             Subject: {}\n\
             Body:\n{}\n\
             ========================",
            from,
            job.to,
            job.subject,
            job.body
        );
        return Ok(());
    };

    let message = build_message(&job, from)?;
    let mailer = config.transport(host)?;

    // An error here fails the job so the worker retries it
    mailer.send(message).await.map_err(|e| {
        tracing::error!(error = %e, host, to = %job.to, "SMTP delivery failed");
        smtp_error(e)
    })?;

    tracing::info!(to = %job.to, "Email sent");
    Ok(())
}
