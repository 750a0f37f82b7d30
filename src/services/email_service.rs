use crate::config::EmailConfig;
use crate::models::{
    consultation::ConsultationRequest, trade_alert::TradeAlert, user::User, weekly_report::WeeklyReport,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    AccountConfirmation,
    ConsultationConfirmation,
    ConsultationLink,
    TradeAlert,
    WeeklyReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub kind: EmailKind,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Result of one delivery attempt. Callers decide whether a failure matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> EmailOutcome;
}

/// Posts each email to a transactional email HTTP API.
#[derive(Clone)]
pub struct HttpEmailSender {
    client: Client,
    config: EmailConfig,
}

impl HttpEmailSender {
    pub fn new(client: Client, config: EmailConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, email: OutboundEmail) -> EmailOutcome {
        let body = json!({
            "from": self.config.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
        });

        let res = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await;

        match res {
            Ok(resp) if resp.status().is_success() => {
                info!(kind = ?email.kind, to = %email.to, "Email sent");
                EmailOutcome::sent()
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!(kind = ?email.kind, to = %email.to, %status, body = %text, "Email API rejected message");
                EmailOutcome::failed(format!("email API returned {}: {}", status, text))
            }
            Err(err) => {
                warn!(kind = ?email.kind, to = %email.to, error = %err, "Email request failed");
                EmailOutcome::failed(err.to_string())
            }
        }
    }
}

/// Minimal HTML escaping for user-supplied text placed into templates.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl OutboundEmail {
    pub fn account_confirmation(user: &User) -> Self {
        Self {
            kind: EmailKind::AccountConfirmation,
            to: user.email.clone(),
            subject: "Welcome - your account is ready".to_string(),
            html: format!(
                "<p>Hi {},</p><p>Your account has been created. You can now sign in to message our team, \
                 schedule consultations and follow our published research.</p>",
                escape(&user.display_name)
            ),
        }
    }

    pub fn consultation_confirmation(request: &ConsultationRequest) -> Self {
        Self {
            kind: EmailKind::ConsultationConfirmation,
            to: request.user_email.clone(),
            subject: "Your consultation request has been received".to_string(),
            html: format!(
                "<p>Hi {},</p><p>We received your consultation request for <strong>{}</strong> at \
                 <strong>{}</strong>. A member of our team will send you a meeting link shortly.</p>",
                escape(&request.user_name),
                request.date.format("%B %-d, %Y"),
                escape(&request.time)
            ),
        }
    }

    pub fn consultation_link(request: &ConsultationRequest, meet_link: &str) -> Self {
        Self {
            kind: EmailKind::ConsultationLink,
            to: request.user_email.clone(),
            subject: "Your consultation meeting link".to_string(),
            html: format!(
                "<p>Hi {},</p><p>Your consultation on <strong>{}</strong> at <strong>{}</strong> is \
                 confirmed.</p><p>Join here: <a href=\"{link}\">{link}</a></p>",
                escape(&request.user_name),
                request.date.format("%B %-d, %Y"),
                escape(&request.time),
                link = escape(meet_link)
            ),
        }
    }

    pub fn trade_alert(recipient: &User, alert: &TradeAlert) -> Self {
        Self {
            kind: EmailKind::TradeAlert,
            to: recipient.email.clone(),
            subject: format!("Trade alert: {} {}", alert.action.as_str().to_uppercase(), alert.symbol),
            html: format!(
                "<p>Hi {},</p><p>A new trade alert has been published: <strong>{}</strong> \
                 ({} {}).</p><p>Sign in to view the full details.</p>",
                escape(&recipient.display_name),
                escape(&alert.title),
                alert.action.as_str(),
                escape(&alert.symbol)
            ),
        }
    }

    pub fn weekly_report(recipient: &User, report: &WeeklyReport) -> Self {
        Self {
            kind: EmailKind::WeeklyReport,
            to: recipient.email.clone(),
            subject: format!("Weekly report: {}", report.title),
            html: format!(
                "<p>Hi {},</p><p>The weekly report for the week of {} is available: \
                 <a href=\"{url}\">{}</a></p>",
                escape(&recipient.display_name),
                report.week_of.format("%B %-d, %Y"),
                escape(&report.title),
                url = escape(&report.file_url)
            ),
        }
    }
}
