//! Outbound email for sweep results.

mod smtp;

pub use smtp::SmtpNotifier;

use async_trait::async_trait;
use common::AlertSeverity;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid email address '{0}'")]
    Address(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// A plain-text email with an optional HTML alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), NotifyError>;
}

/// Used when SMTP is disabled: mail is logged and dropped.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), NotifyError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "SMTP disabled, email not sent"
        );
        Ok(())
    }
}

/// Owner notification for a newly raised automated alert.
pub fn alert_email(
    to: &str,
    plot_name: &str,
    severity: AlertSeverity,
    percent_change: f64,
) -> EmailMessage {
    let severity = severity.as_str();
    EmailMessage {
        to: to.to_string(),
        subject: format!(
            "Landwatch Alert: {} change detected",
            severity.to_uppercase()
        ),
        text: format!(
            "A {severity} change ({percent_change}%) was detected on your plot: {plot_name}. \
             Please review your dashboard for details."
        ),
        html: Some(format!(
            "<p>A <strong>{severity}</strong> change ({percent_change}%) was detected on your \
             plot: <strong>{}</strong>.</p><p>Please review your dashboard for details.</p>",
            escape_html(plot_name)
        )),
    }
}

/// Operator notification for a plot the sweep could not process.
pub fn sweep_failure_email(
    to: &str,
    plot_id: i32,
    plot_name: &str,
    error: &str,
) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Landwatch Cron Failure: Plot {plot_id}"),
        text: format!("Failed to process plot {plot_id} ({plot_name}): {error}"),
        html: None,
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
